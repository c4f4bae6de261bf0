//! Runtime security policy types.
//!
//! Defines [`CommandPolicy`], [`UrlPolicy`] and [`PathPolicy`] -- the
//! runtime representations of the command, URL and filesystem policies.
//! They are constructed from the config-level types in [`crate::config`]
//! at startup time.
//!
//! [`CommandPolicy::validate`] holds the command validation logic. Path
//! matching lives in `clawgate-tools::path_guard` and CIDR / DNS checks in
//! `clawgate-tools::url_safety`; the structs here are the shared data.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::{CommandPolicyConfig, FileToolsConfig, UrlPolicyConfig};

// ── Command Policy ──────────────────────────────────────────────────────

/// Whether the command policy operates in allowlist or denylist mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PolicyMode {
    /// Only commands whose basename appears in the allowlist are permitted.
    Allowlist,
    /// All commands are permitted unless they match a denylist pattern.
    #[default]
    Denylist,
}

/// Errors returned when a command fails policy validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandPolicyError {
    /// The command's executable is not on the allowlist.
    #[error("command not allowed: {command}")]
    NotAllowed { command: String },

    /// The command matched a denylist pattern.
    #[error("command blocked: {command} (matched pattern: {pattern})")]
    Blocked { command: String, pattern: String },

    /// The command matched a pattern that is rejected in every mode.
    #[error("dangerous command: {command} (matched pattern: {pattern})")]
    DangerousPattern { command: String, pattern: String },
}

/// Configurable command execution policy (runtime representation).
///
/// Validates commands against an allowlist or denylist, and always checks
/// a set of dangerous patterns regardless of mode.
#[derive(Debug, Clone)]
pub struct CommandPolicy {
    /// Operating mode for the policy.
    pub mode: PolicyMode,
    /// Set of permitted executable basenames (used in `Allowlist` mode).
    pub allowlist: HashSet<String>,
    /// Patterns to block (substring match, case-insensitive; used in `Denylist` mode).
    pub denylist: Vec<String>,
    /// Patterns that are always checked regardless of mode.
    pub dangerous_patterns: Vec<String>,
}

/// The default set of safe executable basenames for allowlist mode.
pub const DEFAULT_COMMAND_ALLOWLIST: &[&str] = &[
    "echo", "cat", "ls", "pwd", "head", "tail", "wc", "grep", "find", "sort", "uniq", "diff",
    "date", "env", "true", "false", "test", "sleep",
];

/// The default set of dangerous patterns.
pub const DEFAULT_DANGEROUS_PATTERNS: &[&str] = &[
    "rm -rf /",
    "sudo ",
    "mkfs",
    "dd if=",
    ":(){ :|:& };:",
    "chmod 777 /",
    "> /dev/sd",
    "shutdown",
    "reboot",
    "halt",
    "poweroff",
    "format c:",
];

impl Default for CommandPolicy {
    fn default() -> Self {
        Self::safe_defaults()
    }
}

impl CommandPolicy {
    /// Create a policy with safe defaults.
    ///
    /// - Mode: `Denylist`
    /// - Allowlist: common read-only / informational commands (used when
    ///   the mode is switched to `Allowlist`)
    /// - Dangerous patterns and denylist: [`DEFAULT_DANGEROUS_PATTERNS`]
    pub fn safe_defaults() -> Self {
        let allowlist = DEFAULT_COMMAND_ALLOWLIST
            .iter()
            .map(|s| (*s).to_string())
            .collect();
        let dangerous_patterns = default_dangerous_patterns();
        let denylist = dangerous_patterns.clone();

        Self {
            mode: PolicyMode::Denylist,
            allowlist,
            denylist,
            dangerous_patterns,
        }
    }

    /// Create a new policy with explicit configuration.
    pub fn new(mode: PolicyMode, allowlist: HashSet<String>, denylist: Vec<String>) -> Self {
        Self {
            mode,
            allowlist,
            denylist,
            dangerous_patterns: default_dangerous_patterns(),
        }
    }

    /// Build the runtime policy from its config representation.
    ///
    /// Empty config lists keep the defaults. An unrecognised mode string
    /// falls back to `Allowlist`, the stricter of the two.
    pub fn from_config(cfg: &CommandPolicyConfig) -> Self {
        let defaults = Self::safe_defaults();
        let mode = match cfg.mode.trim().to_ascii_lowercase().as_str() {
            "denylist" => PolicyMode::Denylist,
            _ => PolicyMode::Allowlist,
        };
        let allowlist = if cfg.allowlist.is_empty() {
            defaults.allowlist
        } else {
            cfg.allowlist.iter().cloned().collect()
        };
        let denylist = if cfg.denylist.is_empty() {
            defaults.denylist
        } else {
            cfg.denylist.clone()
        };
        Self::new(mode, allowlist, denylist)
    }

    /// Validate a command string against this policy.
    ///
    /// 1. Always checks dangerous patterns first.
    /// 2. In `Allowlist` mode, extracts the executable basename and checks
    ///    the allowlist.
    /// 3. In `Denylist` mode, checks all denylist patterns (case-insensitive
    ///    substring match).
    pub fn validate(&self, command: &str) -> Result<(), CommandPolicyError> {
        // Tabs and other whitespace become spaces so "sudo\tx" still
        // matches the "sudo " pattern.
        let normalized: String = command
            .chars()
            .map(|c| if c.is_whitespace() { ' ' } else { c })
            .collect();
        let lower = normalized.to_lowercase();

        for pattern in &self.dangerous_patterns {
            if lower.contains(&pattern.to_lowercase()) {
                return Err(CommandPolicyError::DangerousPattern {
                    command: command.to_string(),
                    pattern: pattern.clone(),
                });
            }
        }

        match self.mode {
            PolicyMode::Allowlist => {
                let token = extract_first_token(command);
                if !self.allowlist.contains(token) {
                    return Err(CommandPolicyError::NotAllowed {
                        command: command.to_string(),
                    });
                }
            }
            PolicyMode::Denylist => {
                for pattern in &self.denylist {
                    if lower.contains(&pattern.to_lowercase()) {
                        return Err(CommandPolicyError::Blocked {
                            command: command.to_string(),
                            pattern: pattern.clone(),
                        });
                    }
                }
            }
        }

        Ok(())
    }
}

fn default_dangerous_patterns() -> Vec<String> {
    DEFAULT_DANGEROUS_PATTERNS
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}

/// Extract the first whitespace-delimited token from a command string,
/// stripping any leading path components (basename extraction).
///
/// ```text
/// "echo foo"        -> "echo"
/// "/usr/bin/ls -la"  -> "ls"
/// "  cat file"      -> "cat"
/// ""                -> ""
/// ```
pub fn extract_first_token(command: &str) -> &str {
    let token = command.split_whitespace().next().unwrap_or("");
    match token.rfind(['/', '\\']) {
        Some(pos) => &token[pos + 1..],
        None => token,
    }
}

// ── URL Policy ──────────────────────────────────────────────────────────

/// Runtime URL safety policy for SSRF protection.
///
/// Constructed from [`UrlPolicyConfig`] at startup. The validation logic
/// (scheme check, DNS resolution, CIDR tables) lives in
/// `clawgate-tools::url_safety`.
#[derive(Debug, Clone)]
pub struct UrlPolicy {
    /// Whether URL safety checks are active.
    pub enabled: bool,
    /// Whether to allow requests to private/reserved IP ranges.
    pub allow_private: bool,
    /// Domains that bypass all safety checks.
    pub allowed_domains: HashSet<String>,
    /// Domains that are always blocked.
    pub blocked_domains: HashSet<String>,
}

impl Default for UrlPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            allow_private: false,
            allowed_domains: HashSet::new(),
            blocked_domains: HashSet::new(),
        }
    }
}

impl UrlPolicy {
    /// Create a new policy with the given settings.
    pub fn new(
        enabled: bool,
        allow_private: bool,
        allowed_domains: HashSet<String>,
        blocked_domains: HashSet<String>,
    ) -> Self {
        Self {
            enabled,
            allow_private,
            allowed_domains,
            blocked_domains,
        }
    }

    /// Build the runtime policy from its config representation.
    /// Domain names are lower-cased so lookups match parsed URL hosts.
    pub fn from_config(cfg: &UrlPolicyConfig) -> Self {
        let lower = |domains: &[String]| {
            domains
                .iter()
                .map(|d| d.trim().trim_end_matches('.').to_ascii_lowercase())
                .filter(|d| !d.is_empty())
                .collect()
        };
        Self::new(
            cfg.enabled,
            cfg.allow_private,
            lower(&cfg.allowed_domains),
            lower(&cfg.blocked_domains),
        )
    }

    /// Create a permissive policy that disables all checks.
    ///
    /// Intended for testing and development only.
    pub fn permissive() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }
}

// ── Path Policy ─────────────────────────────────────────────────────────

/// How a [`PathRule`] prefix matches a candidate path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Only the directory itself is denied.
    Exact,
    /// The directory and everything beneath it is denied.
    Subtree,
}

/// One deny-list entry: an absolute directory plus its match mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathRule {
    pub prefix: PathBuf,
    pub mode: MatchMode,
}

impl PathRule {
    /// Deny `prefix` and everything nested under it.
    pub fn subtree(prefix: impl Into<PathBuf>) -> Self {
        Self {
            prefix: prefix.into(),
            mode: MatchMode::Subtree,
        }
    }

    /// Deny `prefix` itself only.
    pub fn exact(prefix: impl Into<PathBuf>) -> Self {
        Self {
            prefix: prefix.into(),
            mode: MatchMode::Exact,
        }
    }

    /// Build a rule from a configured path string. A filesystem root gets
    /// an `Exact` rule; any other directory denies its whole subtree.
    pub fn from_config_entry(entry: &str) -> Self {
        let path = PathBuf::from(entry.trim());
        if path.parent().is_none() {
            Self::exact(path)
        } else {
            Self::subtree(path)
        }
    }
}

/// System directories denied by default.
#[cfg(unix)]
pub const DEFAULT_DENIED_DIRS: &[&str] = &[
    "/etc", "/usr", "/bin", "/sbin", "/boot", "/dev", "/proc", "/sys", "/var", "/root", "/lib",
    "/lib64",
];

/// System directories denied by default.
#[cfg(windows)]
pub const DEFAULT_DENIED_DIRS: &[&str] = &[
    "C:\\Windows",
    "C:\\Program Files",
    "C:\\Program Files (x86)",
];

#[cfg(not(any(unix, windows)))]
pub const DEFAULT_DENIED_DIRS: &[&str] = &[];

/// The built-in deny-list, root first.
pub fn default_path_rules() -> Vec<PathRule> {
    let mut rules = Vec::with_capacity(DEFAULT_DENIED_DIRS.len() + 1);
    #[cfg(unix)]
    rules.push(PathRule::exact("/"));
    #[cfg(windows)]
    rules.push(PathRule::exact("C:\\"));
    rules.extend(DEFAULT_DENIED_DIRS.iter().map(|d| PathRule::subtree(*d)));
    rules
}

/// Filesystem policy: ordered deny rules plus the file size ceiling.
#[derive(Debug, Clone)]
pub struct PathPolicy {
    /// Ordered deny rules; the first match is reported.
    pub rules: Vec<PathRule>,
    /// Largest file (in bytes) that may be read or overwritten.
    pub max_file_size: u64,
    /// Directory relative paths are joined onto. `None` means the process
    /// working directory.
    pub base_dir: Option<PathBuf>,
}

impl Default for PathPolicy {
    fn default() -> Self {
        Self {
            rules: default_path_rules(),
            max_file_size: crate::config::DEFAULT_MAX_FILE_SIZE,
            base_dir: None,
        }
    }
}

impl PathPolicy {
    /// Build the runtime policy from its config representation.
    /// A non-empty `denied_paths` replaces the built-in deny-list.
    pub fn from_config(cfg: &FileToolsConfig) -> Self {
        let rules = if cfg.denied_paths.is_empty() {
            default_path_rules()
        } else {
            cfg.denied_paths
                .iter()
                .filter(|p| !p.trim().is_empty())
                .map(|p| PathRule::from_config_entry(p))
                .collect()
        };
        Self {
            rules,
            max_file_size: cfg.max_file_size,
            base_dir: cfg.base_dir.as_deref().map(PathBuf::from),
        }
    }

    /// Replace the size ceiling.
    pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    /// Resolve relative paths against `dir` instead of the working directory.
    pub fn with_base_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.base_dir = Some(dir.as_ref().to_path_buf());
        self
    }
}

// ── Tests ───────────────────────────────────────────────────────────────
