//! Web search tool.
//!
//! Queries the DuckDuckGo HTML interface (or a configured endpoint that
//! serves the same markup) and scrapes titles, URLs and snippets from the
//! result page. The endpoint goes through the [`NetworkGuard`] like any
//! other outbound request.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use clawgate_platform::Platform;
use clawgate_platform::http::HttpError;
use clawgate_types::ToolError;
use clawgate_types::config::WebToolsConfig;
use regex::Regex;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, warn};
use url::Url;

use crate::file_tools::{optional_u64, required_str};
use crate::html::{decode_entities, html_to_text};
use crate::registry::Tool;
use crate::url_safety::NetworkGuard;

/// DuckDuckGo's JavaScript-free result page.
pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://html.duckduckgo.com/html/";

pub const DEFAULT_NUM_RESULTS: u64 = 5;
pub const MAX_NUM_RESULTS: u64 = 10;

static RESULT_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\b([^>]*\bclass="[^"]*\bresult__a\b[^"]*"[^>]*)>(.*?)</a\s*>"#)
        .expect("hard-coded pattern compiles")
});

static RESULT_SNIPPET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)<(a|div|td)\b[^>]*\bclass="[^"]*\bresult__snippet\b[^"]*"[^>]*>(.*?)</(?:a|div|td)\s*>"#,
    )
    .expect("hard-coded pattern compiles")
});

static HREF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\bhref="([^"]*)""#).expect("hard-coded pattern compiles"));

/// One scraped search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Turn a result `href` into the destination URL.
///
/// DuckDuckGo wraps targets as `//duckduckgo.com/l/?uddg=<encoded>`; the
/// wrapper is unwrapped, other links are returned absolute.
pub fn decode_result_url(href: &str) -> String {
    let href = decode_entities(href.trim());
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else if href.starts_with('/') {
        format!("https://duckduckgo.com{href}")
    } else {
        href.clone()
    };
    let Ok(parsed) = Url::parse(&absolute) else {
        return href;
    };
    parsed
        .query_pairs()
        .find(|(k, _)| k == "uddg")
        .map(|(_, v)| v.into_owned())
        .unwrap_or(absolute)
}

/// Sponsored links point back into duckduckgo.com after unwrapping.
fn is_ad(url: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.ends_with("duckduckgo.com")))
        .unwrap_or(false)
}

/// Scrape up to `limit` results from a result page.
pub fn parse_results(page: &str, limit: usize) -> Vec<SearchResult> {
    let links: Vec<_> = RESULT_LINK.captures_iter(page).collect();
    let snippets: Vec<_> = RESULT_SNIPPET.captures_iter(page).collect();

    let mut results = Vec::new();
    for (i, link) in links.iter().enumerate() {
        if results.len() >= limit {
            break;
        }
        let Some(whole) = link.get(0) else { continue };
        let Some(href) = HREF.captures(&link[1]).and_then(|c| c.get(1)) else {
            continue;
        };
        let url = decode_result_url(href.as_str());
        if url.is_empty() || is_ad(&url) {
            continue;
        }

        let next_start = links
            .get(i + 1)
            .and_then(|l| l.get(0))
            .map_or(page.len(), |m| m.start());
        let snippet = snippets
            .iter()
            .filter_map(|s| s.get(0).map(|m| (m.start(), s)))
            .find(|(start, _)| *start >= whole.end() && *start < next_start)
            .map(|(_, s)| html_to_text(&s[2]).replace('\n', " "))
            .unwrap_or_default();

        results.push(SearchResult {
            title: html_to_text(&link[2]).replace('\n', " "),
            url,
            snippet,
        });
    }
    results
}

/// Search the web.
pub struct WebSearchTool<P: Platform> {
    platform: Arc<P>,
    guard: NetworkGuard,
    endpoint: String,
    timeout_secs: u64,
}

impl<P: Platform> WebSearchTool<P> {
    pub fn new(platform: Arc<P>, guard: NetworkGuard) -> Self {
        Self {
            platform,
            guard,
            endpoint: DEFAULT_SEARCH_ENDPOINT.to_string(),
            timeout_secs: WebToolsConfig::default().fetch_timeout_secs,
        }
    }

    /// Take the endpoint and the reported timeout from `cfg`.
    pub fn configured(mut self, cfg: &WebToolsConfig) -> Self {
        if let Some(endpoint) = &cfg.search_endpoint {
            self.endpoint = endpoint.clone();
        }
        self.timeout_secs = cfg.fetch_timeout_secs;
        self
    }

    /// Use a different endpoint that serves DuckDuckGo-style HTML.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn search_url(&self, query: &str) -> Result<Url, ToolError> {
        let mut url = Url::parse(&self.endpoint).map_err(|e| {
            ToolError::Failed(format!("invalid search endpoint {}: {e}", self.endpoint))
        })?;
        url.query_pairs_mut().append_pair("q", query);
        Ok(url)
    }
}

#[async_trait]
impl<P: Platform + 'static> Tool for WebSearchTool<P> {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web and return result titles, URLs and snippets."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query"
                },
                "num_results": {
                    "type": "integer",
                    "description": "Number of results (1-10, default 5)"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let query = required_str(&args, "query")?.trim();
        if query.is_empty() {
            return Err(ToolError::InvalidArgs("query is empty".into()));
        }
        let limit = optional_u64(&args, "num_results")?
            .unwrap_or(DEFAULT_NUM_RESULTS)
            .clamp(1, MAX_NUM_RESULTS) as usize;

        let url = self.search_url(query)?;
        let approved = self.guard.validate_async(url.as_str()).await.map_err(|e| {
            warn!(endpoint = %self.endpoint, error = %e, "search endpoint rejected");
            ToolError::from(e)
        })?;

        debug!(query, limit, "searching");
        let response = self
            .platform
            .http()
            .get(approved.url.as_str(), &HashMap::new())
            .await
            .map_err(|e| match e {
                HttpError::Timeout { .. } => ToolError::TimedOut {
                    operation: "web_search".into(),
                    secs: self.timeout_secs,
                },
                other => ToolError::Failed(format!("search failed: {other}")),
            })?;
        if !response.is_success() {
            return Err(ToolError::Failed(format!(
                "search endpoint returned HTTP {}",
                response.status
            )));
        }

        let results = parse_results(&response.text_lossy(), limit);
        debug!(query, count = results.len(), "search complete");

        Ok(json!({
            "query": query,
            "count": results.len(),
            "results": results,
        }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
