//! Web fetch tool.
//!
//! Retrieves a page through the platform HTTP client and returns readable
//! text. The target, and every redirect hop, is checked by the
//! [`NetworkGuard`] before it is requested. Successful fetches are
//! memoized in the shared [`FetchCache`] with their full text; the
//! per-call `max_chars` truncation is applied afterwards.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use clawgate_platform::Platform;
use clawgate_platform::http::{HttpError, HttpResponse};
use clawgate_types::ToolError;
use clawgate_types::config::{DEFAULT_MAX_CHARS, WebToolsConfig};
use serde_json::{Value, json};
use tracing::{debug, warn};
use url::Url;

use crate::fetch_cache::{FetchCache, FetchedPage};
use crate::file_tools::{optional_u64, required_str};
use crate::html;
use crate::registry::Tool;
use crate::url_safety::{NetworkGuard, resolve_redirect};

/// Redirect hops followed before giving up.
pub const MAX_REDIRECTS: usize = 10;

const ACCEPT: &str = "text/html,application/xhtml+xml,text/plain;q=0.9,*/*;q=0.8";

/// Fetch a URL and return its readable text.
pub struct WebFetchTool<P: Platform> {
    platform: Arc<P>,
    guard: NetworkGuard,
    cache: Arc<FetchCache>,
    max_chars: usize,
    timeout_secs: u64,
}

impl<P: Platform> WebFetchTool<P> {
    pub fn new(platform: Arc<P>, guard: NetworkGuard, cache: Arc<FetchCache>) -> Self {
        Self {
            platform,
            guard,
            cache,
            max_chars: DEFAULT_MAX_CHARS,
            timeout_secs: WebToolsConfig::default().fetch_timeout_secs,
        }
    }

    /// Take the default `max_chars` and the reported timeout from `cfg`.
    pub fn configured(mut self, cfg: &WebToolsConfig) -> Self {
        self.max_chars = cfg.max_chars.max(1);
        self.timeout_secs = cfg.fetch_timeout_secs;
        self
    }

    fn http_error(&self, url: &str, err: HttpError) -> ToolError {
        warn!(url, error = %err, "fetch failed");
        match err {
            HttpError::Timeout { .. } => ToolError::TimedOut {
                operation: format!("fetching {url}"),
                secs: self.timeout_secs,
            },
            other => ToolError::Failed(format!("fetch failed: {other}")),
        }
    }

    /// GET `start`, following redirects that pass the guard.
    async fn fetch_page(&self, start: Url) -> Result<FetchedPage, ToolError> {
        let headers = HashMap::from([("Accept".to_string(), ACCEPT.to_string())]);
        let mut current = start;

        for hop in 0..=MAX_REDIRECTS {
            let response = self
                .platform
                .http()
                .get(current.as_str(), &headers)
                .await
                .map_err(|e| self.http_error(current.as_str(), e))?;

            let Some(location) = response.redirect_location() else {
                if !response.is_success() {
                    return Err(ToolError::Failed(format!(
                        "HTTP {} from {current}",
                        response.status
                    )));
                }
                return Ok(extract_page(current, &response));
            };

            if hop == MAX_REDIRECTS {
                break;
            }
            let next = resolve_redirect(&current, location)?;
            let approved = self.guard.validate_async(next.as_str()).await.map_err(|e| {
                warn!(from = %current, to = %next, error = %e, "redirect rejected");
                ToolError::from(e)
            })?;
            debug!(from = %current, to = %approved.url, hop = hop + 1, "following redirect");
            current = approved.url;
        }

        Err(ToolError::Failed(format!(
            "too many redirects (more than {MAX_REDIRECTS})"
        )))
    }
}

fn extract_page(url: Url, response: &HttpResponse) -> FetchedPage {
    let content_type = response.content_type().to_string();
    let body = response.text_lossy();
    let (title, content) = if html::is_html(&content_type, &body) {
        (html::extract_title(&body), html::html_to_text(&body))
    } else {
        (None, body)
    };
    FetchedPage {
        final_url: url.to_string(),
        title,
        content,
        content_type,
    }
}

/// Cut `text` to `max_chars` characters.
fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => (&text[..idx], true),
        None => (text, false),
    }
}

#[async_trait]
impl<P: Platform + 'static> Tool for WebFetchTool<P> {
    fn name(&self) -> &str {
        "web_fetch"
    }

    fn description(&self) -> &str {
        "Fetch a web page and return its title and readable text. Private networks and metadata endpoints are blocked."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL to fetch (https:// is assumed when no scheme is given)"
                },
                "max_chars": {
                    "type": "integer",
                    "description": format!("Maximum characters to return (default {})", self.max_chars)
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let url = required_str(&args, "url")?;
        let max_chars = optional_u64(&args, "max_chars")?
            .map(|n| n.max(1) as usize)
            .unwrap_or(self.max_chars);

        let approved = self.guard.validate_async(url).await.map_err(|e| {
            warn!(url, error = %e, "URL rejected by safety policy");
            ToolError::from(e)
        })?;

        let target = approved.url.clone();
        let lookup = self
            .cache
            .get_or_fetch(approved.url.as_str(), || self.fetch_page(target))
            .await?;

        let page = &lookup.page;
        let (content, truncated) = truncate_chars(&page.content, max_chars);
        debug!(
            url = %approved.url,
            cached = lookup.is_cached(),
            length = page.content.len(),
            truncated,
            "fetched page"
        );

        Ok(json!({
            "url": approved.url.as_str(),
            "final_url": page.final_url,
            "title": page.title,
            "content": content,
            "content_type": page.content_type,
            "length": page.content.chars().count(),
            "truncated": truncated,
            "cached": lookup.is_cached(),
            "fetched_at": lookup.fetched_at.to_rfc3339(),
        }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::url_safety::Resolver;
    use clawgate_platform::env::{Environment, NativeEnvironment};
    use clawgate_platform::http::HttpClient;
    use clawgate_types::ErrorKind;
    use clawgate_types::security::UrlPolicy;
    use std::net::IpAddr;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Resolves every name to a public documentation address.
    struct PublicResolver;

    impl Resolver for PublicResolver {
        fn resolve(&self, _host: &str, _port: u16) -> std::io::Result<Vec<IpAddr>> {
            Ok(vec!["93.184.216.34".parse().unwrap()])
        }
    }

    enum Scripted {
        Page(u16, &'static str, &'static str),
        Redirect(&'static str),
        Error(fn() -> HttpError),
    }

    #[derive(Default)]
    struct ScriptedHttp {
        routes: Mutex<HashMap<String, Scripted>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl HttpClient for ScriptedHttp {
        async fn request(
            &self,
            _method: &str,
            url: &str,
            _headers: &HashMap<String, String>,
            _body: Option<&[u8]>,
        ) -> Result<HttpResponse, HttpError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let routes = self.routes.lock().unwrap();
            match routes.get(url) {
                Some(Scripted::Page(status, ct, body)) => Ok(HttpResponse {
                    status: *status,
                    headers: HashMap::from([("content-type".to_string(), ct.to_string())]),
                    body: body.as_bytes().to_vec(),
                }),
                Some(Scripted::Redirect(location)) => Ok(HttpResponse {
                    status: 302,
                    headers: HashMap::from([("location".to_string(), location.to_string())]),
                    body: Vec::new(),
                }),
                Some(Scripted::Error(make)) => Err(make()),
                None => Ok(HttpResponse {
                    status: 404,
                    headers: HashMap::new(),
                    body: Vec::new(),
                }),
            }
        }
    }

    struct MockPlatform {
        http: ScriptedHttp,
        env: NativeEnvironment,
    }

    impl Platform for MockPlatform {
        fn http(&self) -> &dyn HttpClient {
            &self.http
        }
        fn env(&self) -> &dyn Environment {
            &self.env
        }
    }

    const PAGE: &str = "<html><head><title>Guide</title></head><body><nav>menu</nav><p>Hello &amp; welcome</p></body></html>";

    fn make_tool(routes: Vec<(&str, Scripted)>) -> (WebFetchTool<MockPlatform>, Arc<MockPlatform>) {
        let http = ScriptedHttp::default();
        {
            let mut map = http.routes.lock().unwrap();
            for (url, scripted) in routes {
                map.insert(url.to_string(), scripted);
            }
        }
        let platform = Arc::new(MockPlatform {
            http,
            env: NativeEnvironment,
        });
        let guard = NetworkGuard::with_resolver(UrlPolicy::default(), Arc::new(PublicResolver));
        let tool = WebFetchTool::new(platform.clone(), guard, Arc::new(FetchCache::new()));
        (tool, platform)
    }

    fn calls(platform: &MockPlatform) -> usize {
        platform.http.calls.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn html_page_is_extracted_and_cached() {
        let (tool, platform) = make_tool(vec![(
            "https://example.com/guide",
            Scripted::Page(200, "text/html; charset=utf-8", PAGE),
        )]);

        let first = tool
            .execute(json!({"url": "https://example.com/guide"}))
            .await
            .unwrap();
        assert_eq!(first["title"], "Guide");
        assert_eq!(first["content"], "Hello & welcome");
        assert_eq!(first["cached"], false);
        assert_eq!(first["truncated"], false);

        let second = tool
            .execute(json!({"url": "example.com/guide#intro"}))
            .await
            .unwrap();
        assert_eq!(second["cached"], true);
        assert_eq!(second["content"], first["content"]);
        assert_eq!(second["fetched_at"], first["fetched_at"]);
        assert_eq!(calls(&platform), 1);
    }

    #[tokio::test]
    async fn truncation_keeps_full_text_in_cache() {
        let (tool, _platform) = make_tool(vec![(
            "https://example.com/long",
            Scripted::Page(200, "text/plain", "abcdefghij"),
        )]);

        let short = tool
            .execute(json!({"url": "https://example.com/long", "max_chars": 4}))
            .await
            .unwrap();
        assert_eq!(short["content"], "abcd");
        assert_eq!(short["truncated"], true);
        assert_eq!(short["length"], 10);

        let full = tool
            .execute(json!({"url": "https://example.com/long"}))
            .await
            .unwrap();
        assert_eq!(full["content"], "abcdefghij");
        assert_eq!(full["cached"], true);
        assert_eq!(full["truncated"], false);
    }

    #[tokio::test]
    async fn private_targets_never_reach_the_client() {
        let (tool, platform) = make_tool(vec![]);
        for url in [
            "http://127.0.0.1/",
            "http://10.1.2.3/admin",
            "http://169.254.169.254/latest/meta-data/",
            "http://localhost:8080/",
            "file:///etc/passwd",
        ] {
            let err = tool.execute(json!({ "url": url })).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NetworkDenied, "{url}");
        }
        assert_eq!(calls(&platform), 0);
    }

    #[tokio::test]
    async fn redirect_into_private_range_denied() {
        let (tool, platform) = make_tool(vec![(
            "https://example.com/go",
            Scripted::Redirect("http://192.168.1.1/router"),
        )]);
        let err = tool
            .execute(json!({"url": "https://example.com/go"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NetworkDenied { .. }));
        assert_eq!(calls(&platform), 1);
    }

    #[tokio::test]
    async fn public_redirect_followed() {
        let (tool, _platform) = make_tool(vec![
            ("https://example.com/old", Scripted::Redirect("/new")),
            (
                "https://example.com/new",
                Scripted::Page(200, "text/plain", "moved here"),
            ),
        ]);
        let out = tool
            .execute(json!({"url": "https://example.com/old"}))
            .await
            .unwrap();
        assert_eq!(out["url"], "https://example.com/old");
        assert_eq!(out["final_url"], "https://example.com/new");
        assert_eq!(out["content"], "moved here");
    }

    #[tokio::test]
    async fn redirect_loop_fails() {
        let (tool, platform) = make_tool(vec![(
            "https://example.com/loop",
            Scripted::Redirect("https://example.com/loop"),
        )]);
        let err = tool
            .execute(json!({"url": "https://example.com/loop"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Failed);
        assert!(err.to_string().contains("too many redirects"));
        assert_eq!(calls(&platform), MAX_REDIRECTS + 1);
    }

    #[tokio::test]
    async fn http_error_status_fails_and_is_not_cached() {
        let (tool, platform) = make_tool(vec![(
            "https://example.com/broken",
            Scripted::Page(500, "text/plain", "oops"),
        )]);
        for _ in 0..2 {
            let err = tool
                .execute(json!({"url": "https://example.com/broken"}))
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Failed);
            assert!(err.to_string().contains("HTTP 500"));
        }
        assert_eq!(calls(&platform), 2);
    }

    #[tokio::test]
    async fn transport_errors_map_to_kinds() {
        let (tool, _platform) = make_tool(vec![
            (
                "https://example.com/slow",
                Scripted::Error(|| HttpError::Timeout {
                    url: "https://example.com/slow".into(),
                }),
            ),
            (
                "https://example.com/huge",
                Scripted::Error(|| HttpError::BodyTooLarge { limit: 5 * 1024 * 1024 }),
            ),
        ]);
        let err = tool
            .execute(json!({"url": "https://example.com/slow"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::TimedOut { secs: 30, .. }));

        let err = tool
            .execute(json!({"url": "https://example.com/huge"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Failed);
    }

    #[tokio::test]
    async fn missing_url_is_invalid_args() {
        let (tool, _platform) = make_tool(vec![]);
        let err = tool.execute(json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArgs(_)));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), ("hé", true));
        assert_eq!(truncate_chars("héllo", 5), ("héllo", false));
        assert_eq!(truncate_chars("", 1), ("", false));
    }
}
