//! `clawgate config show` -- print the resolved configuration (file plus
//! environment overrides) as JSON.

use clap::Subcommand;
use serde_json::json;

use clawgate_platform::config_loader::LoadedConfig;

/// Subcommands for `clawgate config`.
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the full resolved configuration.
    Show,
}

pub fn run(action: ConfigAction, loaded: &LoadedConfig) -> anyhow::Result<bool> {
    match action {
        ConfigAction::Show => {
            super::print_json(&json!({
                "source": loaded.source.as_ref().map(|p| p.display().to_string()),
                "config": loaded.config,
            }))?;
            Ok(true)
        }
    }
}
