//! 上下文窗口：取日志末尾 n 条送入 LLM，不修改日志本身

use std::collections::BTreeMap;

use crate::memory::{Message, Role};

/// 返回 `log` 最后 `n` 条（保持原顺序）；`log.len() <= n` 时原样返回
pub fn window(log: &[Message], n: usize) -> &[Message] {
    &log[log.len().saturating_sub(n)..]
}

/// 送入模型的对话历史：先去掉 system 轨迹，再取最后 `n` 条 user / assistant 消息
pub fn dialogue_window(log: &[Message], n: usize) -> Vec<Message> {
    let dialogue: Vec<Message> = log
        .iter()
        .filter(|m| m.role != Role::System)
        .cloned()
        .collect();
    window(&dialogue, n).to_vec()
}

/// 按角色计数，用于日志输出，如 `assistant=2 system=5 user=2`
pub fn summarize(log: &[Message]) -> String {
    let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    for m in log {
        *counts.entry(m.role.as_str()).or_insert(0) += 1;
    }
    counts
        .iter()
        .map(|(role, n)| format!("{}={}", role, n))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(n: usize) -> Vec<Message> {
        (0..n).map(|i| Message::user(format!("m{}", i))).collect()
    }

    #[test]
    fn test_window_identity_when_short() {
        let l = log(4);
        assert_eq!(window(&l, 10), &l[..]);
        assert_eq!(window(&l, 4), &l[..]);
    }

    #[test]
    fn test_window_suffix_in_order() {
        let l = log(15);
        let w = window(&l, 10);
        assert_eq!(w.len(), 10);
        assert_eq!(w[0].content, "m5");
        assert_eq!(w[9].content, "m14");
    }

    #[test]
    fn test_window_idempotent() {
        let l = log(15);
        let once = window(&l, 10);
        assert_eq!(window(once, 10), once);
    }

    #[test]
    fn test_window_zero() {
        let l = log(3);
        assert!(window(&l, 0).is_empty());
    }

    #[test]
    fn test_dialogue_window_skips_traces() {
        let l = vec![
            Message::user("q1"),
            Message::system("Rewritten query: q1"),
            Message::assistant("a1"),
            Message::system("Answer is relevant: true (Iteration: 1)"),
            Message::user("q2"),
            Message::system("Needs retrieval: true"),
            Message::system("Selected source: web_search"),
        ];
        let w = dialogue_window(&l, 10);
        let contents: Vec<&str> = w.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["q1", "a1", "q2"]);

        let w = dialogue_window(&l, 2);
        assert_eq!(w.len(), 2);
        assert_eq!(w[0].content, "a1");
        assert_eq!(l.len(), 7);
    }

    #[test]
    fn test_summarize() {
        let l = vec![Message::user("a"), Message::system("b"), Message::system("c")];
        assert_eq!(summarize(&l), "system=2 user=1");
    }
}
