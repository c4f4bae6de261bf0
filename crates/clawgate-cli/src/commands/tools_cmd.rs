//! `clawgate tools` -- tool discovery.
//!
//! - `clawgate tools list` -- table of registered tools.
//! - `clawgate tools show <name>` -- function-calling schema as JSON.

use clap::Subcommand;
use comfy_table::{Table, presets};

use clawgate_tools::registry::{ToolRegistry, schema_of};
use clawgate_types::config::Config;

/// Subcommands for `clawgate tools`.
#[derive(Subcommand)]
pub enum ToolsAction {
    /// List all registered tools.
    List,

    /// Show the parameter schema for one tool.
    Show {
        /// Tool name to inspect.
        name: String,
    },
}

pub fn run(action: ToolsAction, config: &Config) -> anyhow::Result<bool> {
    let registry = super::build_registry(config)?;
    match action {
        ToolsAction::List => {
            tools_list(&registry);
            Ok(true)
        }
        ToolsAction::Show { name } => tools_show(&registry, &name),
    }
}

/// Truncate a string to `max_chars` characters, appending "..." if truncated.
fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

fn tools_list(registry: &ToolRegistry) {
    let names = registry.list();
    if names.is_empty() {
        println!("No tools registered.");
        return;
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_header(["NAME", "DESCRIPTION"]);
    for name in &names {
        let desc = registry
            .get(name)
            .map(|t| truncate(t.description(), 70))
            .unwrap_or_default();
        table.add_row([name.as_str(), desc.as_str()]);
    }

    println!("{table}");
    println!();
    println!("Total: {} tool(s)", names.len());
}

fn tools_show(registry: &ToolRegistry, name: &str) -> anyhow::Result<bool> {
    let Some(tool) = registry.get(name) else {
        eprintln!("Tool '{name}' not found. Run `clawgate tools list` to see available tools.");
        return Ok(false);
    };
    super::print_json(&schema_of(tool.as_ref()))?;
    Ok(true)
}
