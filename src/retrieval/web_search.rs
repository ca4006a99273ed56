//! Web 搜索
//!
//! TavilySearch 调用 Tavily JSON API（POST /search，带超时）；未配置 Key 时使用 PlaceholderSearch，
//! 返回显式的占位文本而不是报错，保证 web_search 分支始终有上下文。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::WebSearchSection;

const TAVILY_ENDPOINT: &str = "https://api.tavily.com/search";

#[async_trait]
pub trait WebSearch: Send + Sync {
    /// 返回已格式化的结果文本
    async fn search(&self, query: &str, max_results: usize) -> Result<String, String>;
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
    search_depth: &'a str,
}

pub fn format_results(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return "No web search results found.".to_string();
    }
    let mut out = String::from("Web Search Results:\n");
    for (i, r) in results.iter().enumerate() {
        out.push_str(&format!(
            "\n[Result {}]\nTitle: {}\nContent: {}\nURL: {}\n",
            i + 1,
            r.title,
            r.content,
            r.url
        ));
    }
    out
}

pub struct TavilySearch {
    client: Client,
    api_key: String,
}

impl TavilySearch {
    pub fn new(api_key: impl Into<String>, timeout_secs: u64) -> Result<Self, String> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| e.to_string())?;
        Ok(Self {
            client,
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl WebSearch for TavilySearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<String, String> {
        let body = TavilyRequest {
            api_key: &self.api_key,
            query,
            max_results,
            search_depth: "basic",
        };
        let resp = self
            .client
            .post(TAVILY_ENDPOINT)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("web search request failed: {}", e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(format!("web search returned HTTP {}", status.as_u16()));
        }
        let parsed: TavilyResponse = resp
            .json()
            .await
            .map_err(|e| format!("web search response parse failed: {}", e))?;
        tracing::info!(results = parsed.results.len(), "web search done");
        Ok(format_results(&parsed.results))
    }
}

/// 未配置搜索服务时的占位实现
#[derive(Debug, Default, Clone)]
pub struct PlaceholderSearch;

#[async_trait]
impl WebSearch for PlaceholderSearch {
    async fn search(&self, query: &str, _max_results: usize) -> Result<String, String> {
        Ok(format!(
            "[Mock Web Search Results for: {}]\n\n\
             Note: No web search provider configured. Set TAVILY_API_KEY to enable real web search.\n\n\
             This is a placeholder for web search results.",
            query
        ))
    }
}

/// 按配置选择实现：provider=tavily 且 Key（配置或 TAVILY_API_KEY）存在时走 Tavily
pub fn create_web_search_from_config(cfg: &WebSearchSection) -> Box<dyn WebSearch> {
    let api_key = cfg
        .api_key
        .clone()
        .or_else(|| std::env::var("TAVILY_API_KEY").ok())
        .filter(|k| !k.trim().is_empty());

    match (cfg.provider.to_lowercase().as_str(), api_key) {
        ("tavily", Some(key)) => match TavilySearch::new(key, cfg.timeout_secs) {
            Ok(search) => {
                tracing::info!("Using Tavily web search");
                Box::new(search)
            }
            Err(e) => {
                tracing::warn!("Tavily client init failed ({}), using placeholder search", e);
                Box::new(PlaceholderSearch)
            }
        },
        _ => {
            tracing::warn!("No web search provider configured, using placeholder search");
            Box::new(PlaceholderSearch)
        }
    }
}
