//! CLI command implementations for `clawgate`.
//!
//! - [`tools_cmd`] -- `tools list` / `tools show`.
//! - [`run`] -- invoke a tool through the registry boundary.
//! - [`check`] -- guard dry-runs.
//! - [`config_cmd`] -- resolved configuration.
//!
//! Every handler returns `Ok(true)` on success and `Ok(false)` when the
//! process should exit non-zero after printing its output.

pub mod check;
pub mod config_cmd;
pub mod run;
pub mod tools_cmd;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clawgate_platform::NativePlatform;
use clawgate_platform::config_loader::{self, LoadedConfig};
use clawgate_platform::env::NativeEnvironment;
use clawgate_tools::registry::ToolRegistry;
use clawgate_types::config::Config;

/// Load configuration from `explicit` or via auto-discovery
/// (`CLAWGATE_CONFIG`, then `~/.clawgate/config.json`).
pub async fn load_config(explicit: Option<&Path>) -> anyhow::Result<LoadedConfig> {
    config_loader::load_config(&NativeEnvironment, explicit)
        .await
        .context("failed to load config")
}

/// Build the full tool registry for `config`.
pub fn build_registry(config: &Config) -> anyhow::Result<ToolRegistry> {
    let platform =
        NativePlatform::new(&config.tools.web).context("failed to build HTTP client")?;
    Ok(clawgate_tools::build_registry(
        Arc::new(platform),
        &config.tools,
    ))
}

/// Pretty-print a JSON value to stdout.
pub fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
