//! Configuration schema types.
//!
//! All structs accept both `snake_case` and `camelCase` field names in JSON
//! via `#[serde(alias)]`. Unknown fields are silently ignored so older
//! binaries keep loading newer config files.
//!
//! # Module Structure
//!
//! - [`policies`] -- Security policy configurations (command execution, URL safety)

pub mod policies;

pub use policies::*;

use serde::{Deserialize, Serialize};

use crate::error::{ClawgateError, Result};

/// Default size ceiling for file reads and writes (10 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Default command timeout in seconds.
pub const DEFAULT_EXEC_TIMEOUT_SECS: u64 = 30;

/// Default upper bound a caller may request for a command timeout.
pub const DEFAULT_EXEC_MAX_TIMEOUT_SECS: u64 = 300;

/// Default maximum response body accepted by `web_fetch` (5 MiB).
pub const DEFAULT_MAX_CONTENT_BYTES: u64 = 5 * 1024 * 1024;

/// Default number of characters `web_fetch` returns.
pub const DEFAULT_MAX_CHARS: usize = 50_000;

// ── Root config ──────────────────────────────────────────────────────────

/// Root configuration for clawgate.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Tool configuration.
    #[serde(default)]
    pub tools: ToolsConfig,
}

impl Config {
    /// Check semantic constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let exec = &self.tools.exec;
        if exec.timeout_secs == 0 {
            return Err(ClawgateError::ConfigInvalid {
                reason: "tools.exec.timeout_secs must be at least 1".into(),
            });
        }
        if exec.max_timeout_secs < exec.timeout_secs {
            return Err(ClawgateError::ConfigInvalid {
                reason: format!(
                    "tools.exec.max_timeout_secs ({}) is below timeout_secs ({})",
                    exec.max_timeout_secs, exec.timeout_secs
                ),
            });
        }
        if self.tools.files.max_file_size == 0 {
            return Err(ClawgateError::ConfigInvalid {
                reason: "tools.files.max_file_size must be positive".into(),
            });
        }
        if self.tools.web.cache.max_entries == Some(0) {
            return Err(ClawgateError::ConfigInvalid {
                reason: "tools.web.cache.max_entries must be positive when set".into(),
            });
        }
        Ok(())
    }
}

/// Per-tool configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolsConfig {
    /// Filesystem tools and the path guard.
    #[serde(default)]
    pub files: FileToolsConfig,

    /// Shell execution.
    #[serde(default)]
    pub exec: ExecToolConfig,

    /// Web fetch / search.
    #[serde(default)]
    pub web: WebToolsConfig,

    /// Command execution policy.
    #[serde(default, alias = "commandPolicy")]
    pub command_policy: CommandPolicyConfig,

    /// URL safety policy for outbound requests.
    #[serde(default, alias = "urlPolicy")]
    pub url_policy: UrlPolicyConfig,
}

/// Filesystem tool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileToolsConfig {
    /// Size ceiling in bytes for reading or overwriting a file.
    #[serde(default = "default_max_file_size", alias = "maxFileSize")]
    pub max_file_size: u64,

    /// Denied directory prefixes. Overrides the built-in deny-list when
    /// non-empty.
    #[serde(default, alias = "deniedPaths")]
    pub denied_paths: Vec<String>,

    /// Directory relative paths are resolved against. Defaults to the
    /// process working directory.
    #[serde(default, alias = "baseDir")]
    pub base_dir: Option<String>,
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

impl Default for FileToolsConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
            denied_paths: Vec::new(),
            base_dir: None,
        }
    }
}

/// Shell execution configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecToolConfig {
    /// Timeout applied when the caller does not pass one.
    #[serde(default = "default_exec_timeout", alias = "timeoutSecs")]
    pub timeout_secs: u64,

    /// Largest timeout a caller may request.
    #[serde(default = "default_exec_max_timeout", alias = "maxTimeoutSecs")]
    pub max_timeout_secs: u64,

    /// Default working directory for commands.
    #[serde(default, alias = "workingDir")]
    pub working_dir: Option<String>,
}

fn default_exec_timeout() -> u64 {
    DEFAULT_EXEC_TIMEOUT_SECS
}

fn default_exec_max_timeout() -> u64 {
    DEFAULT_EXEC_MAX_TIMEOUT_SECS
}

impl Default for ExecToolConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_exec_timeout(),
            max_timeout_secs: default_exec_max_timeout(),
            working_dir: None,
        }
    }
}

/// Web fetch and search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebToolsConfig {
    /// HTTP request timeout in seconds.
    #[serde(default = "default_fetch_timeout", alias = "fetchTimeoutSecs")]
    pub fetch_timeout_secs: u64,

    /// Largest response body accepted, in bytes.
    #[serde(default = "default_max_content_bytes", alias = "maxContentBytes")]
    pub max_content_bytes: u64,

    /// Default number of characters returned by `web_fetch`.
    #[serde(default = "default_max_chars", alias = "maxChars")]
    pub max_chars: usize,

    /// User-Agent header sent with outbound requests.
    #[serde(default = "default_user_agent", alias = "userAgent")]
    pub user_agent: String,

    /// Search endpoint (DuckDuckGo HTML interface when unset).
    #[serde(default, alias = "searchEndpoint")]
    pub search_endpoint: Option<String>,

    /// Fetch cache bounds.
    #[serde(default)]
    pub cache: FetchCacheConfig,
}

fn default_fetch_timeout() -> u64 {
    30
}

fn default_max_content_bytes() -> u64 {
    DEFAULT_MAX_CONTENT_BYTES
}

fn default_max_chars() -> usize {
    DEFAULT_MAX_CHARS
}

fn default_user_agent() -> String {
    format!(
        "Mozilla/5.0 (compatible; clawgate/{})",
        env!("CARGO_PKG_VERSION")
    )
}

impl Default for WebToolsConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: default_fetch_timeout(),
            max_content_bytes: default_max_content_bytes(),
            max_chars: default_max_chars(),
            user_agent: default_user_agent(),
            search_endpoint: None,
            cache: FetchCacheConfig::default(),
        }
    }
}

/// Optional bounds for the webpage fetch cache.
///
/// Both unset (the default) means entries live until cleared.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct FetchCacheConfig {
    /// Maximum number of entries; the least recently inserted is evicted.
    #[serde(default, alias = "maxEntries")]
    pub max_entries: Option<usize>,

    /// Entry lifetime in seconds.
    #[serde(default, alias = "ttlSecs")]
    pub ttl_secs: Option<u64>,
}
