//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Mock）

pub mod mock;
pub mod openai;
pub mod traits;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::core::RagError;

pub use mock::{MockLlmClient, MockReply};
pub use openai::OpenAiClient;
pub use traits::{LlmClient, LlmError};

pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com/v1";

/// provider 预设：(默认 base_url, API Key 环境变量)
fn provider_preset(provider: &str) -> Option<(Option<&'static str>, &'static str)> {
    match provider {
        "groq" => Some((Some(GROQ_BASE_URL), "GROQ_API_KEY")),
        "openai" => Some((None, "OPENAI_API_KEY")),
        "deepseek" => Some((Some(DEEPSEEK_BASE_URL), "DEEPSEEK_API_KEY")),
        _ => None,
    }
}

/// 按配置创建 LLM 客户端
///
/// provider 为 mock 时返回 MockLlmClient；其余 provider 需要 API Key（配置或对应环境变量），
/// 缺失时返回 Configuration 错误。
pub fn create_llm_from_config(cfg: &AppConfig) -> Result<Arc<dyn LlmClient>, RagError> {
    let provider = cfg.llm.provider.to_lowercase();
    if provider == "mock" {
        tracing::warn!("Using Mock LLM");
        return Ok(Arc::new(MockLlmClient::new()));
    }

    let (preset_base, key_var) = provider_preset(&provider).ok_or_else(|| {
        RagError::Configuration(format!("unknown llm provider: {}", cfg.llm.provider))
    })?;
    let api_key = cfg
        .llm
        .api_key
        .clone()
        .or_else(|| std::env::var(key_var).ok())
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| RagError::Configuration(format!("{} is not set", key_var)))?;
    let base_url = cfg.llm.base_url.as_deref().or(preset_base);

    tracing::info!(provider = %provider, model = %cfg.llm.model, "Using OpenAI-compatible LLM");
    Ok(Arc::new(OpenAiClient::new(
        base_url,
        &cfg.llm.model,
        &api_key,
        cfg.llm.temperature,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_provider() {
        let mut cfg = AppConfig::default();
        cfg.llm.provider = "MOCK".into();
        let llm = create_llm_from_config(&cfg).unwrap();
        assert_eq!(llm.name(), "mock");
    }

    #[test]
    fn test_unknown_provider_is_configuration_error() {
        let mut cfg = AppConfig::default();
        cfg.llm.provider = "nope".into();
        assert!(matches!(
            create_llm_from_config(&cfg),
            Err(RagError::Configuration(_))
        ));
    }

    #[test]
    fn test_explicit_key_builds_client() {
        let mut cfg = AppConfig::default();
        cfg.llm.provider = "openai".into();
        cfg.llm.api_key = Some("sk-test".into());
        let llm = create_llm_from_config(&cfg).unwrap();
        assert_eq!(llm.name(), "openai-compatible");
    }
}
