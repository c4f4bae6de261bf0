//! Security policy configuration types.
//!
//! Defines [`CommandPolicyConfig`] (command execution allowlist/denylist)
//! and [`UrlPolicyConfig`] (SSRF protection for outbound requests).

use serde::{Deserialize, Serialize};

/// Command execution security policy configuration.
///
/// In denylist mode (default) any command not matching a blocked pattern may
/// run. In allowlist mode only explicitly permitted executables can run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandPolicyConfig {
    /// Policy mode: "denylist" (default) or "allowlist".
    #[serde(default = "default_policy_mode")]
    pub mode: String,

    /// Permitted command basenames when in allowlist mode.
    /// Overrides defaults when non-empty.
    #[serde(default)]
    pub allowlist: Vec<String>,

    /// Blocked command patterns when in denylist mode.
    /// Overrides defaults when non-empty.
    #[serde(default)]
    pub denylist: Vec<String>,
}

fn default_policy_mode() -> String {
    "denylist".to_string()
}

impl Default for CommandPolicyConfig {
    fn default() -> Self {
        Self {
            mode: default_policy_mode(),
            allowlist: Vec::new(),
            denylist: Vec::new(),
        }
    }
}

/// URL safety policy configuration for SSRF protection.
///
/// When enabled (default), requests to private networks, loopback
/// addresses, and cloud metadata endpoints are blocked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlPolicyConfig {
    /// Whether URL safety validation is enabled.
    #[serde(default = "default_url_policy_enabled")]
    pub enabled: bool,

    /// Allow requests to private/internal IP ranges.
    #[serde(default, alias = "allowPrivate")]
    pub allow_private: bool,

    /// Domains that bypass all safety checks.
    #[serde(default, alias = "allowedDomains")]
    pub allowed_domains: Vec<String>,

    /// Domains that are always blocked.
    #[serde(default, alias = "blockedDomains")]
    pub blocked_domains: Vec<String>,
}

fn default_url_policy_enabled() -> bool {
    true
}

impl Default for UrlPolicyConfig {
    fn default() -> Self {
        Self {
            enabled: default_url_policy_enabled(),
            allow_private: false,
            allowed_domains: Vec::new(),
            blocked_domains: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_policy_defaults_to_denylist() {
        let cfg: CommandPolicyConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.mode, "denylist");
        assert!(cfg.allowlist.is_empty());
    }

    #[test]
    fn url_policy_defaults_enabled() {
        let cfg: UrlPolicyConfig = serde_json::from_str("{}").unwrap();
        assert!(cfg.enabled);
        assert!(!cfg.allow_private);
    }

    #[test]
    fn url_policy_camel_case() {
        let cfg: UrlPolicyConfig = serde_json::from_str(
            r#"{"allowedDomains": ["docs.rs"], "blockedDomains": ["evil.com"]}"#,
        )
        .unwrap();
        assert_eq!(cfg.allowed_domains, vec!["docs.rs".to_string()]);
        assert_eq!(cfg.blocked_domains, vec!["evil.com".to_string()]);
    }
}
