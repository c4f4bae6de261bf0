//! Configuration file discovery and loading.
//!
//! The discovery order is:
//! 1. `CLAWGATE_CONFIG` environment variable (path to a JSON file).
//! 2. `~/.clawgate/config.json`
//! 3. If none found, defaults.
//!
//! JSON keys are normalized from camelCase to snake_case before
//! deserialization. Environment overrides are applied last, then the
//! result is validated.

use std::path::{Path, PathBuf};

use clawgate_types::config::Config;
use clawgate_types::{ClawgateError, Result};
use serde_json::Value;

use crate::env::Environment;

/// Names the config file path.
pub const CONFIG_ENV_VAR: &str = "CLAWGATE_CONFIG";
/// Overrides `tools.exec.timeout_secs`.
pub const EXEC_TIMEOUT_ENV_VAR: &str = "CLAWGATE_EXEC_TIMEOUT";
/// Overrides `tools.files.max_file_size`.
pub const MAX_FILE_SIZE_ENV_VAR: &str = "CLAWGATE_MAX_FILE_SIZE";
/// Replaces `tools.files.denied_paths` (platform path-list separator).
pub const DENIED_PATHS_ENV_VAR: &str = "CLAWGATE_DENIED_PATHS";

/// A loaded configuration and the file it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    /// `None` when defaults were used.
    pub source: Option<PathBuf>,
}

/// Discover the config file path.
///
/// The env var wins even if the file it names does not exist; the loader
/// then falls back to defaults with a warning. The home-directory
/// candidate is only returned when it exists.
pub fn discover_config_path(env: &dyn Environment) -> Option<PathBuf> {
    if let Some(env_path) = env.get_var(CONFIG_ENV_VAR)
        && !env_path.trim().is_empty()
    {
        return Some(PathBuf::from(env_path));
    }

    let candidate = env.home_dir()?.join(".clawgate").join("config.json");
    candidate.exists().then_some(candidate)
}

/// Load configuration from an explicit path, or via discovery when
/// `explicit` is `None`.
pub async fn load_config(env: &dyn Environment, explicit: Option<&Path>) -> Result<LoadedConfig> {
    let path = match explicit {
        Some(p) => Some(p.to_path_buf()),
        None => discover_config_path(env),
    };

    let (raw, source) = match path {
        None => {
            tracing::info!("no config file found, using defaults");
            (Value::Object(serde_json::Map::new()), None)
        }
        Some(path) if explicit.is_none() && !path.exists() => {
            tracing::warn!(
                path = %path.display(),
                "config path does not exist, using defaults"
            );
            (Value::Object(serde_json::Map::new()), None)
        }
        Some(path) => {
            tracing::info!(path = %path.display(), "loading config file");
            let contents = tokio::fs::read_to_string(&path).await.map_err(|e| {
                ClawgateError::ConfigInvalid {
                    reason: format!("failed to read {}: {e}", path.display()),
                }
            })?;
            let value: Value =
                serde_json::from_str(&contents).map_err(|e| ClawgateError::ConfigInvalid {
                    reason: format!("failed to parse {}: {e}", path.display()),
                })?;
            (value, Some(path))
        }
    };

    let mut config = parse_config(raw)?;
    apply_env_overrides(&mut config, env)?;
    config.validate()?;

    Ok(LoadedConfig { config, source })
}

/// Deserialize a raw JSON value (any key casing) into [`Config`].
pub fn parse_config(raw: Value) -> Result<Config> {
    if !raw.is_object() {
        return Err(ClawgateError::ConfigInvalid {
            reason: "top-level config must be a JSON object".into(),
        });
    }
    Ok(serde_json::from_value(normalize_keys(raw))?)
}

/// Apply `CLAWGATE_*` environment overrides on top of the file config.
///
/// An override that is set but unparseable is an error rather than
/// being silently ignored.
pub fn apply_env_overrides(config: &mut Config, env: &dyn Environment) -> Result<()> {
    if let Some(raw) = env.get_var(EXEC_TIMEOUT_ENV_VAR) {
        let secs = parse_u64(EXEC_TIMEOUT_ENV_VAR, &raw)?;
        tracing::debug!(secs, "exec timeout overridden from environment");
        config.tools.exec.timeout_secs = secs;
        // A larger default timeout raises the cap with it.
        if config.tools.exec.max_timeout_secs < secs {
            config.tools.exec.max_timeout_secs = secs;
        }
    }

    if let Some(raw) = env.get_var(MAX_FILE_SIZE_ENV_VAR) {
        let bytes = parse_u64(MAX_FILE_SIZE_ENV_VAR, &raw)?;
        tracing::debug!(bytes, "max file size overridden from environment");
        config.tools.files.max_file_size = bytes;
    }

    if let Some(raw) = env.get_var(DENIED_PATHS_ENV_VAR) {
        let paths: Vec<String> = std::env::split_paths(&raw)
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        tracing::debug!(count = paths.len(), "denied paths overridden from environment");
        config.tools.files.denied_paths = paths;
    }

    Ok(())
}

fn parse_u64(name: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|e| ClawgateError::ConfigInvalid {
            reason: format!("{name}={raw:?} is not a non-negative integer: {e}"),
        })
}

/// Convert camelCase JSON keys to snake_case recursively.
pub fn normalize_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, val)| (camel_to_snake(&key), normalize_keys(val)))
                .collect(),
        ),
        Value::Array(arr) => Value::Array(arr.into_iter().map(normalize_keys).collect()),
        other => other,
    }
}

/// Convert a single camelCase string to snake_case.
///
/// A run of uppercase letters (an acronym) stays together; an underscore
/// goes before its last letter only when a lowercase letter follows.
///
/// # Examples
/// ```
/// # use clawgate_platform::config_loader::camel_to_snake;
/// assert_eq!(camel_to_snake("maxFileSize"), "max_file_size");
/// assert_eq!(camel_to_snake("already_snake"), "already_snake");
/// assert_eq!(camel_to_snake("HTTPTimeout"), "http_timeout");
/// assert_eq!(camel_to_snake("maxURL"), "max_url");
/// ```
pub fn camel_to_snake(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut result = String::with_capacity(name.len() + 4);

    for (i, &ch) in chars.iter().enumerate() {
        if ch.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next = chars.get(i + 1).copied();
            if prev.is_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_uppercase() && next.is_some_and(|c| c.is_lowercase()))
            {
                result.push('_');
            }
        }
        result.extend(ch.to_lowercase());
    }
    result
}
