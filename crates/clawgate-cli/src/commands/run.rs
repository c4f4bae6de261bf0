//! `clawgate run <tool> [--args JSON]` -- invoke a tool through the
//! registry boundary and print the resulting payload.

use anyhow::Context;
use clap::Args;
use serde_json::Value;

use clawgate_tools::registry::is_error_payload;
use clawgate_types::config::Config;

/// Arguments for `clawgate run`.
#[derive(Args)]
pub struct RunArgs {
    /// Tool name (see `clawgate tools list`).
    pub tool: String,

    /// Tool arguments as a JSON object.
    #[arg(long, default_value = "{}")]
    pub args: String,
}

/// Parse `--args`, which must be a JSON object.
fn parse_args(raw: &str) -> anyhow::Result<Value> {
    let value: Value = serde_json::from_str(raw).context("--args is not valid JSON")?;
    if !value.is_object() {
        anyhow::bail!("--args must be a JSON object");
    }
    Ok(value)
}

pub async fn run(args: RunArgs, config: &Config) -> anyhow::Result<bool> {
    let tool_args = parse_args(&args.args)?;
    let registry = super::build_registry(config)?;
    let payload = registry.invoke(&args.tool, tool_args).await;
    super::print_json(&payload)?;
    Ok(!is_error_payload(&payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_args_accepts_objects_only() {
        assert!(parse_args(r#"{"path": "/tmp"}"#).is_ok());
        assert!(parse_args("{}").is_ok());
        assert!(parse_args("[1, 2]").is_err());
        assert!(parse_args("not json").is_err());
    }
}
