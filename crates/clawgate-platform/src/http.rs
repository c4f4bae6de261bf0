//! HTTP client abstraction and native implementation.
//!
//! Provides a platform-agnostic [`HttpClient`] trait and a native
//! implementation backed by [`reqwest`]. The native client never follows
//! redirects on its own: a 3xx response is handed back to the caller so the
//! next hop can be checked against the URL policy before it is requested.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use clawgate_types::config::WebToolsConfig;
use thiserror::Error;

/// HTTP response from a request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code (e.g., 200, 404, 500).
    pub status: u16,
    /// Response headers; names are lower-case.
    pub headers: HashMap<String, String>,
    /// Raw response body bytes.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Parse body as UTF-8 text, replacing invalid sequences.
    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Look up a header by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers.get(&name).map(String::as_str)
    }

    /// The `content-type` header, or an empty string.
    pub fn content_type(&self) -> &str {
        self.header("content-type").unwrap_or("")
    }

    /// Check if status is success (2xx).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Check if status is a redirect that carries a `Location`.
    pub fn redirect_location(&self) -> Option<&str> {
        if (300..400).contains(&self.status) {
            self.header("location")
        } else {
            None
        }
    }
}

/// Transport-level failures.
#[derive(Debug, Error)]
pub enum HttpError {
    /// The request did not complete before the client timeout.
    #[error("request to {url} timed out")]
    Timeout { url: String },

    /// The connection could not be established.
    #[error("connection to {url} failed: {reason}")]
    Connect { url: String, reason: String },

    /// The declared or received body exceeds the configured ceiling.
    #[error("response body exceeds {limit} bytes")]
    BodyTooLarge { limit: u64 },

    /// The method, URL or client configuration was rejected.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Any other transport error.
    #[error("http error: {0}")]
    Other(String),
}

impl HttpError {
    fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else if err.is_connect() {
            Self::Connect {
                url: url.to_string(),
                reason: err.to_string(),
            }
        } else if err.is_builder() {
            Self::InvalidRequest(err.to_string())
        } else {
            Self::Other(err.to_string())
        }
    }
}

/// Platform-agnostic HTTP client.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Send an HTTP request with the given method, URL, headers, and optional body.
    async fn request(
        &self,
        method: &str,
        url: &str,
        headers: &HashMap<String, String>,
        body: Option<&[u8]>,
    ) -> Result<HttpResponse, HttpError>;

    /// Send an HTTP GET request.
    async fn get(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
    ) -> Result<HttpResponse, HttpError> {
        self.request("GET", url, headers, None).await
    }
}

/// Construction options for [`NativeHttpClient`].
#[derive(Debug, Clone)]
pub struct HttpClientOptions {
    /// Whole-request timeout.
    pub timeout: Duration,
    /// `User-Agent` header value.
    pub user_agent: String,
    /// Largest body accepted, in bytes.
    pub max_body_bytes: u64,
}

impl HttpClientOptions {
    pub fn from_config(web: &WebToolsConfig) -> Self {
        Self {
            timeout: Duration::from_secs(web.fetch_timeout_secs),
            user_agent: web.user_agent.clone(),
            max_body_bytes: web.max_content_bytes,
        }
    }
}

impl Default for HttpClientOptions {
    fn default() -> Self {
        Self::from_config(&WebToolsConfig::default())
    }
}

/// Native HTTP client using [`reqwest`].
pub struct NativeHttpClient {
    client: reqwest::Client,
    max_body_bytes: u64,
}

impl NativeHttpClient {
    /// Build a client. Redirect following is disabled.
    pub fn new(options: HttpClientOptions) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .pool_idle_timeout(Duration::from_secs(30))
            .user_agent(options.user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| HttpError::InvalidRequest(format!("failed to build client: {e}")))?;
        Ok(Self {
            client,
            max_body_bytes: options.max_body_bytes,
        })
    }
}

#[async_trait]
impl HttpClient for NativeHttpClient {
    async fn request(
        &self,
        method: &str,
        url: &str,
        headers: &HashMap<String, String>,
        body: Option<&[u8]>,
    ) -> Result<HttpResponse, HttpError> {
        let reqwest_method = method
            .parse::<reqwest::Method>()
            .map_err(|e| HttpError::InvalidRequest(format!("bad method {method}: {e}")))?;
        let mut builder = self.client.request(reqwest_method, url);

        for (key, value) in headers {
            builder = builder.header(key.as_str(), value.as_str());
        }

        if let Some(body_bytes) = body {
            builder = builder.body(body_bytes.to_vec());
        }

        let mut response = builder
            .send()
            .await
            .map_err(|e| HttpError::from_reqwest(url, e))?;

        if response
            .content_length()
            .is_some_and(|len| len > self.max_body_bytes)
        {
            return Err(HttpError::BodyTooLarge {
                limit: self.max_body_bytes,
            });
        }

        let status = response.status().as_u16();
        let mut resp_headers = HashMap::new();
        for (key, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                resp_headers.insert(key.as_str().to_string(), v.to_string());
            }
        }

        // Stream the body so an undeclared oversize payload is cut off
        // instead of buffered.
        let mut resp_body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| HttpError::from_reqwest(url, e))?
        {
            if resp_body.len() as u64 + chunk.len() as u64 > self.max_body_bytes {
                return Err(HttpError::BodyTooLarge {
                    limit: self.max_body_bytes,
                });
            }
            resp_body.extend_from_slice(&chunk);
        }

        tracing::debug!(url, status, bytes = resp_body.len(), "http response");

        Ok(HttpResponse {
            status,
            headers: resp_headers,
            body: resp_body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, headers: &[(&str, &str)], body: &[u8]) -> HttpResponse {
        HttpResponse {
            status,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: body.to_vec(),
        }
    }

    #[test]
    fn text_lossy_replaces_invalid_utf8() {
        let resp = response(200, &[], &[b'o', b'k', 0xFF]);
        assert_eq!(resp.text_lossy(), "ok\u{FFFD}");
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let resp = response(200, &[("content-type", "text/html; charset=utf-8")], b"");
        assert_eq!(resp.header("Content-Type"), Some("text/html; charset=utf-8"));
        assert_eq!(resp.content_type(), "text/html; charset=utf-8");
        assert_eq!(response(200, &[], b"").content_type(), "");
    }

    #[test]
    fn success_range() {
        for status in [200, 204, 299] {
            assert!(response(status, &[], b"").is_success(), "{status}");
        }
        for status in [101, 301, 404, 500] {
            assert!(!response(status, &[], b"").is_success(), "{status}");
        }
    }

    #[test]
    fn redirect_location_only_for_3xx() {
        let moved = response(302, &[("location", "/next")], b"");
        assert_eq!(moved.redirect_location(), Some("/next"));

        let ok = response(200, &[("location", "/next")], b"");
        assert_eq!(ok.redirect_location(), None);

        let not_modified = response(304, &[], b"");
        assert_eq!(not_modified.redirect_location(), None);
    }

    #[test]
    fn http_error_display() {
        let err = HttpError::BodyTooLarge { limit: 5 };
        assert_eq!(err.to_string(), "response body exceeds 5 bytes");
        let err = HttpError::Timeout {
            url: "https://example.com".into(),
        };
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn options_follow_config() {
        let web = WebToolsConfig {
            fetch_timeout_secs: 7,
            max_content_bytes: 99,
            ..Default::default()
        };
        let opts = HttpClientOptions::from_config(&web);
        assert_eq!(opts.timeout, Duration::from_secs(7));
        assert_eq!(opts.max_body_bytes, 99);
        assert!(opts.user_agent.contains("clawgate"));
    }

    #[tokio::test]
    async fn invalid_method_rejected_before_sending() {
        let client = NativeHttpClient::new(HttpClientOptions::default()).unwrap();
        let err = client
            .request("NOT A METHOD", "https://example.com", &HashMap::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, HttpError::InvalidRequest(_)));
    }
}
