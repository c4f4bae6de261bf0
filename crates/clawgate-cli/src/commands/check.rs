//! `clawgate check` -- dry-run the guards.
//!
//! Prints a JSON verdict and exits non-zero when the target is denied.
//! Nothing is read, written or fetched.

use clap::Subcommand;
use serde_json::{Value, json};

use clawgate_tools::Guards;
use clawgate_tools::path_guard::Operation;
use clawgate_types::ToolError;
use clawgate_types::config::Config;

/// Subcommands for `clawgate check`.
#[derive(Subcommand)]
pub enum CheckAction {
    /// Resolve a path and check it against the deny-list and size ceiling.
    Path {
        /// Path to check.
        path: String,

        /// Intended operation: read, write, delete, list or create.
        #[arg(long, default_value = "read")]
        op: String,
    },

    /// Check an outbound URL (DNS is resolved, nothing is fetched).
    Url {
        /// URL or bare host.
        url: String,
    },
}

fn denied(err: ToolError) -> Value {
    json!({
        "allowed": false,
        "kind": err.kind().as_str(),
        "reason": err.to_string(),
    })
}

pub async fn run(action: CheckAction, config: &Config) -> anyhow::Result<bool> {
    let guards = Guards::from_config(&config.tools);
    let verdict = match action {
        CheckAction::Path { path, op } => {
            let op: Operation = op.parse().map_err(anyhow::Error::msg)?;
            match guards.paths.validate(&path, op) {
                Ok(resolved) => json!({
                    "allowed": true,
                    "operation": op.as_str(),
                    "path": resolved.path.display().to_string(),
                    "exists": resolved.exists,
                    "is_dir": resolved.is_dir,
                    "size": resolved.size,
                }),
                Err(e) => denied(e.into()),
            }
        }
        CheckAction::Url { url } => match guards.network.validate_async(&url).await {
            Ok(approved) => json!({
                "allowed": true,
                "url": approved.url.as_str(),
                "host": approved.host,
                "addresses": approved
                    .addresses
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>(),
            }),
            Err(e) => denied(e.into()),
        },
    };

    super::print_json(&verdict)?;
    Ok(verdict["allowed"] == true)
}
