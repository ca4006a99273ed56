//! 工具执行器
//!
//! 持有 ToolRegistry 与全局超时，execute(tool_name, args) 在超时内调用工具；结果一律为字符串：
//! 未注册 → "Tool '<name>' is not available."，失败或超时 → "Error executing tool: ..."。
//! 每次调用输出结构化审计日志（JSON）。

use std::time::{Duration, Instant};

use tokio::time::timeout;

use crate::tools::{calculator, ToolRegistry};

const DATE_WORDS: [&str; 8] = [
    "date", "time", "today", "tomorrow", "yesterday", "now", "day", "year",
];

pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        for name in registry.tool_names() {
            if let Some(tool) = registry.get(&name) {
                tracing::debug!(tool = %name, description = tool.description(), "tool registered");
            }
        }
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// 执行指定工具；输出 JSON 审计日志
    pub async fn execute(&self, tool_name: &str, args: serde_json::Value) -> String {
        let Some(tool) = self.registry.get(tool_name) else {
            tracing::warn!(tool = tool_name, "tool not found");
            return format!("Tool '{}' is not available.", tool_name);
        };

        let start = Instant::now();
        let args_preview = args_preview(&args);
        let result = timeout(self.timeout, tool.execute(args)).await;

        let outcome = match &result {
            Ok(Ok(_)) => "ok",
            Ok(Err(_)) => "error",
            Err(_) => "timeout",
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "ok": outcome == "ok",
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        match result {
            Ok(Ok(content)) => content,
            Ok(Err(e)) => format!("Error executing tool: {}", e),
            Err(_) => format!(
                "Error executing tool: timed out after {}s",
                self.timeout.as_secs()
            ),
        }
    }

    /// "Available tools: a, b"
    pub fn tools_info(&self) -> String {
        format!("Available tools: {}", self.registry.tool_names().join(", "))
    }

    /// tools_api 检索分支：按查询内容挑选工具执行，结果与工具清单拼接为上下文
    pub async fn gather_context(&self, query: &str) -> String {
        let mut sections = Vec::new();

        if let Some(expr) = calculator::extract_expression(query) {
            sections.push(
                self.execute("calculator", serde_json::json!({ "expression": expr }))
                    .await,
            );
        }

        if mentions_date(query) {
            sections.push(self.execute("datetime", serde_json::json!({})).await);
        }

        sections.push(self.tools_info());
        sections.join("\n\n")
    }
}

fn mentions_date(query: &str) -> bool {
    query
        .split(|c: char| !c.is_alphanumeric())
        .map(|w| w.to_lowercase())
        .any(|w| DATE_WORDS.contains(&w.as_str()))
}

fn args_preview(args: &serde_json::Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{default_registry, Tool};
    use async_trait::async_trait;
    use serde_json::Value;

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }
        fn description(&self) -> &str {
            "sleeps"
        }
        async fn execute(&self, _args: Value) -> Result<String, String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("late".into())
        }
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let exec = ToolExecutor::new(default_registry(), 5);
        assert_eq!(
            exec.execute("weather", serde_json::json!({})).await,
            "Tool 'weather' is not available."
        );
    }

    #[tokio::test]
    async fn test_failure_is_rendered() {
        let exec = ToolExecutor::new(default_registry(), 5);
        let out = exec
            .execute("calculator", serde_json::json!({"expression": "1/0"}))
            .await;
        assert_eq!(out, "Error executing tool: division by zero");
    }

    #[tokio::test]
    async fn test_timeout_is_rendered() {
        let mut registry = ToolRegistry::new();
        registry.register(SlowTool);
        let exec = ToolExecutor { registry, timeout: Duration::from_millis(20) };
        let out = exec.execute("slow", serde_json::json!({})).await;
        assert!(out.starts_with("Error executing tool: timed out"));
    }

    #[tokio::test]
    async fn test_gather_context() {
        let exec = ToolExecutor::new(default_registry(), 5);
        let ctx = exec.gather_context("What is 2 + 2?").await;
        assert_eq!(ctx, "Result: 4\n\nAvailable tools: calculator, datetime");

        let ctx = exec.gather_context("what date is it today").await;
        assert!(ctx.starts_with("Current date and time: "));
        assert!(ctx.ends_with("Available tools: calculator, datetime"));

        let ctx = exec.gather_context("hello").await;
        assert_eq!(ctx, "Available tools: calculator, datetime");
    }
}
