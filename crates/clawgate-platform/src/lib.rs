//! Platform abstraction layer for clawgate.
//!
//! Provides traits for the platform-dependent operations the tools need
//! (outbound HTTP, environment access) so guard and tool logic can be
//! exercised against in-memory doubles in tests.
//!
//! # Architecture
//!
//! The [`Platform`] trait bundles the capabilities via accessor methods.
//! Each sub-capability has its own trait ([`http::HttpClient`],
//! [`env::Environment`]) with a corresponding native implementation.
//! Configuration discovery lives in [`config_loader`].
//!
//! # Example
//!
//! ```rust,no_run
//! use clawgate_platform::{Platform, NativePlatform};
//! use clawgate_platform::http::HttpClient;
//! use clawgate_types::config::WebToolsConfig;
//! use std::collections::HashMap;
//!
//! # async fn example() {
//! let platform = NativePlatform::new(&WebToolsConfig::default()).unwrap();
//! let response = platform.http()
//!     .get("https://example.com", &HashMap::new())
//!     .await
//!     .unwrap();
//! assert!(response.is_success());
//! # }
//! ```

pub mod config_loader;
pub mod env;
pub mod http;

use clawgate_types::config::WebToolsConfig;

/// Bundle of platform capabilities.
pub trait Platform: Send + Sync {
    /// HTTP client for outbound requests. Redirects are never followed
    /// automatically; callers re-validate each hop.
    fn http(&self) -> &dyn http::HttpClient;

    /// Environment variable access.
    fn env(&self) -> &dyn env::Environment;
}

/// Native platform implementation using std and reqwest.
pub struct NativePlatform {
    http: http::NativeHttpClient,
    env: env::NativeEnvironment,
}

impl NativePlatform {
    /// Create a native platform whose HTTP client honours the timeout,
    /// user agent and body ceiling from `web`.
    pub fn new(web: &WebToolsConfig) -> Result<Self, http::HttpError> {
        Ok(Self {
            http: http::NativeHttpClient::new(http::HttpClientOptions::from_config(web))?,
            env: env::NativeEnvironment,
        })
    }
}

impl Platform for NativePlatform {
    fn http(&self) -> &dyn http::HttpClient {
        &self.http
    }

    fn env(&self) -> &dyn env::Environment {
        &self.env
    }
}
