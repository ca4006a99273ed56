//! 向量检索
//!
//! VectorRetriever 是对向量库的窄接口（query + top_k → 文档列表）。当前实现 InMemoryVectorStore
//! 按关键词重叠打分（无真实向量），后续可接 Qdrant/LanceDB 等真实向量库。

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// 检索到的文档片段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    pub source: String,
    pub score: f32,
}

#[async_trait]
pub trait VectorRetriever: Send + Sync {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<Document>, String>;
}

/// 将文档列表渲染为生成阶段使用的上下文文本
pub fn format_documents(docs: &[Document]) -> String {
    if docs.is_empty() {
        return "No relevant documents found.".to_string();
    }
    docs.iter()
        .enumerate()
        .map(|(i, d)| format!("[Document {} - Source: {}]\n{}", i + 1, d.source, d.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// 将文本切分为小写词集合，去掉标点与单字符词
fn tokenize_lower(s: &str) -> HashSet<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .map(|w| w.to_lowercase())
        .filter(|w| w.chars().count() > 1)
        .collect()
}

struct Entry {
    content: String,
    source: String,
    tokens: HashSet<String>,
}

/// 内存实现：按查询词覆盖率打分（交集 / 查询词数）
#[derive(Clone, Default)]
pub struct InMemoryVectorStore {
    entries: Arc<RwLock<Vec<Entry>>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, content: &str, source: &str) {
        let content = content.trim();
        if content.is_empty() {
            return;
        }
        let entry = Entry {
            content: content.to_string(),
            source: source.to_string(),
            tokens: tokenize_lower(content),
        };
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl VectorRetriever for InMemoryVectorStore {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<Document>, String> {
        let query_tokens = tokenize_lower(query);
        if query_tokens.is_empty() {
            return Ok(Vec::new());
        }
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut scored: Vec<Document> = entries
            .iter()
            .filter_map(|e| {
                let hits = query_tokens.intersection(&e.tokens).count();
                (hits > 0).then(|| Document {
                    content: e.content.clone(),
                    source: e.source.clone(),
                    score: hits as f32 / query_tokens.len() as f32,
                })
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_empty() {
        assert_eq!(format_documents(&[]), "No relevant documents found.");
    }

    #[test]
    fn test_format_numbered() {
        let docs = vec![
            Document { content: "alpha".into(), source: "a.md".into(), score: 1.0 },
            Document { content: "beta".into(), source: "b.md".into(), score: 0.5 },
        ];
        assert_eq!(
            format_documents(&docs),
            "[Document 1 - Source: a.md]\nalpha\n\n[Document 2 - Source: b.md]\nbeta"
        );
    }

    #[tokio::test]
    async fn test_search_ranks_by_overlap() {
        let store = InMemoryVectorStore::new();
        store.add("Rust ownership and borrowing rules", "rust.md");
        store.add("Python garbage collection", "py.md");
        store.add("Rust async runtimes like tokio", "async.md");

        let hits = store.search("rust ownership", 5).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].source, "rust.md");
        assert!(hits[0].score > hits[1].score);

        let top1 = store.search("rust", 1).await.unwrap();
        assert_eq!(top1.len(), 1);
    }

    #[tokio::test]
    async fn test_search_no_match() {
        let store = InMemoryVectorStore::new();
        store.add("something else", "x");
        assert!(store.search("quantum", 5).await.unwrap().is_empty());
        assert!(store.search("?", 5).await.unwrap().is_empty());
    }
}
