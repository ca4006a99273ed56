//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `RAG__*` 覆盖（双下划线表示嵌套，如 `RAG__LLM__PROVIDER=openai`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub workflow: WorkflowSection,
    #[serde(default)]
    pub retrieval: RetrievalSection,
    #[serde(default)]
    pub web_search: WebSearchSection,
    #[serde(default)]
    pub storage: StorageSection,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
}

/// [llm] 段：后端选择、模型与温度
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：groq / openai / deepseek / mock
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// 覆盖 provider 预设的 API 地址
    pub base_url: Option<String>,
    /// 未设置时按 provider 读取 GROQ_API_KEY / OPENAI_API_KEY / DEEPSEEK_API_KEY
    pub api_key: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            api_key: None,
            temperature: default_temperature(),
        }
    }
}

fn default_provider() -> String {
    "groq".to_string()
}

fn default_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}

fn default_temperature() -> f32 {
    0.4
}

/// [workflow] 段：重试预算、上下文窗口、单次协作方调用超时
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowSection {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// 发给 Generate / Evaluate 的历史消息条数上限
    #[serde(default = "default_max_context_messages")]
    pub max_context_messages: usize,
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
}

impl Default for WorkflowSection {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_context_messages: default_max_context_messages(),
            call_timeout_secs: default_call_timeout_secs(),
        }
    }
}

fn default_max_iterations() -> u32 {
    3
}

fn default_max_context_messages() -> usize {
    10
}

fn default_call_timeout_secs() -> u64 {
    60
}

/// [retrieval] 段
#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalSection {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// 单次工具调用超时（秒）
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
}

impl Default for RetrievalSection {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            tool_timeout_secs: default_tool_timeout_secs(),
        }
    }
}

fn default_top_k() -> usize {
    5
}

fn default_tool_timeout_secs() -> u64 {
    30
}

/// [web_search] 段：provider 为 tavily 且有 Key 时走真实搜索，否则返回占位结果
#[derive(Debug, Clone, Deserialize)]
pub struct WebSearchSection {
    #[serde(default = "default_search_provider")]
    pub provider: String,
    pub api_key: Option<String>,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for WebSearchSection {
    fn default() -> Self {
        Self {
            provider: default_search_provider(),
            api_key: None,
            max_results: default_max_results(),
            timeout_secs: default_search_timeout_secs(),
        }
    }
}

fn default_search_provider() -> String {
    "tavily".to_string()
}

fn default_max_results() -> usize {
    5
}

fn default_search_timeout_secs() -> u64 {
    15
}

/// [storage] 段：检查点后端 memory / sqlite
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSection {
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: PathBuf,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            sqlite_path: default_sqlite_path(),
        }
    }
}

fn default_backend() -> String {
    "memory".to_string()
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("data/checkpoints.db")
}

/// 从 config 目录加载配置，环境变量 RAG__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 RAG__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    if let Some(name) = default_names
        .into_iter()
        .find(|name| std::path::Path::new(&format!("{}.toml", name)).exists())
    {
        builder = builder.add_source(config::File::with_name(name).required(false));
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("RAG")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.workflow.max_iterations, 3);
        assert_eq!(cfg.workflow.max_context_messages, 10);
        assert_eq!(cfg.retrieval.top_k, 5);
        assert_eq!(cfg.llm.provider, "groq");
        assert_eq!(cfg.storage.backend, "memory");
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[workflow]\nmax_iterations = 5\n\n[storage]\nbackend = \"sqlite\"\nsqlite_path = \"/tmp/x.db\""
        )
        .unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.workflow.max_iterations, 5);
        assert_eq!(cfg.workflow.max_context_messages, 10);
        assert_eq!(cfg.storage.backend, "sqlite");
        assert_eq!(cfg.storage.sqlite_path, PathBuf::from("/tmp/x.db"));
    }
}
