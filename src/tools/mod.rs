//! 工具：计算器、日期时间，供 tools_api 检索分支使用

pub mod calculator;
pub mod datetime;
pub mod executor;
pub mod registry;

pub use calculator::CalculatorTool;
pub use datetime::DateTimeTool;
pub use executor::ToolExecutor;
pub use registry::{Tool, ToolRegistry};

/// 注册默认工具（calculator / datetime）
pub fn default_registry() -> ToolRegistry {
    let mut tools = ToolRegistry::new();
    tools.register(CalculatorTool);
    tools.register(DateTimeTool);
    tools
}
