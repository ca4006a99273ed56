//! 检索协作方：向量库与 Web 搜索

pub mod vector;
pub mod web_search;

pub use vector::{format_documents, Document, InMemoryVectorStore, VectorRetriever};
pub use web_search::{
    create_web_search_from_config, format_results, PlaceholderSearch, SearchResult, TavilySearch,
    WebSearch,
};
