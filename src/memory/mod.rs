//! 记忆层：只追加的会话日志与有界上下文窗口

pub mod conversation;
pub mod window;

pub use conversation::{Message, MessageLog, Role};
pub use window::{dialogue_window, summarize, window};
