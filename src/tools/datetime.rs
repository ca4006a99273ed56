//! 日期时间工具

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::Tool;

pub struct DateTimeTool;

#[async_trait]
impl Tool for DateTimeTool {
    fn name(&self) -> &str {
        "datetime"
    }

    fn description(&self) -> &str {
        "Current local date and time. Args: {}"
    }

    async fn execute(&self, _args: Value) -> Result<String, String> {
        let now = chrono::Local::now();
        Ok(format!(
            "Current date and time: {}",
            now.format("%Y-%m-%d %H:%M:%S")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_format() {
        let out = DateTimeTool.execute(serde_json::json!({})).await.unwrap();
        let stamp = out.strip_prefix("Current date and time: ").unwrap();
        assert!(chrono::NaiveDateTime::parse_from_str(stamp, "%Y-%m-%d %H:%M:%S").is_ok());
    }
}
