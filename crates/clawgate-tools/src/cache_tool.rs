//! `clear_web_cache` tool.

use std::sync::Arc;

use async_trait::async_trait;
use clawgate_types::ToolError;
use serde_json::{Value, json};
use tracing::info;

use crate::fetch_cache::FetchCache;
use crate::registry::Tool;

/// Empties the shared [`FetchCache`].
pub struct ClearWebCacheTool {
    cache: Arc<FetchCache>,
}

impl ClearWebCacheTool {
    pub fn new(cache: Arc<FetchCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl Tool for ClearWebCacheTool {
    fn name(&self) -> &str {
        "clear_web_cache"
    }

    fn description(&self) -> &str {
        "Clear the cache of fetched web pages so the next fetch goes to the network."
    }

    fn parameters(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _args: Value) -> Result<Value, ToolError> {
        let cleared = self.cache.clear();
        info!(cleared, "web cache cleared");
        Ok(json!({
            "cleared": cleared,
            "message": format!("Cleared {cleared} cached entries"),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch_cache::FetchedPage;

    fn page(url: &str) -> FetchedPage {
        FetchedPage {
            final_url: url.into(),
            title: None,
            content: "body".into(),
            content_type: "text/plain".into(),
        }
    }

    #[tokio::test]
    async fn reports_removed_count() {
        let cache = Arc::new(FetchCache::new());
        cache.insert("https://a.example/", page("https://a.example/"));
        cache.insert("https://b.example/", page("https://b.example/"));
        let tool = ClearWebCacheTool::new(cache.clone());

        let out = tool.execute(json!({})).await.unwrap();
        assert_eq!(out["cleared"], 2);
        assert_eq!(out["message"], "Cleared 2 cached entries");
        assert!(cache.is_empty());

        let again = tool.execute(Value::Null).await.unwrap();
        assert_eq!(again["cleared"], 0);
    }
}
