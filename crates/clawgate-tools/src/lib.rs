//! Guarded agent tools for clawgate.
//!
//! The safety layer sits between an agent and the host: every path,
//! outbound URL and shell command an agent asks for is checked before any
//! side effect happens.
//!
//! # Guards
//!
//! - [`path_guard`]: canonicalizes paths and enforces the system-directory
//!   deny-list and the file size ceiling.
//! - [`url_safety`]: SSRF protection; rejects private, loopback,
//!   link-local and cloud-metadata destinations, checked per redirect hop.
//! - [`command_runner`]: runs commands with a clamped timeout and kills
//!   the whole process group afterwards.
//! - [`fetch_cache`]: memoizes fetched pages by normalized URL.
//!
//! # Tools
//!
//! - **File tools** ([`file_tools`]): `read_file`, `write_file`,
//!   `list_directory`, `delete_file`, `create_directory`
//! - **Shell tool** ([`shell_tool`]): `exec_shell`
//! - **Web tools** ([`web_fetch`], [`web_search`], [`cache_tool`]):
//!   `web_fetch`, `web_search`, `clear_web_cache`
//!
//! [`registry::ToolRegistry::invoke`] turns every failure into an
//! `{"error": {"kind", "message"}}` payload.

pub mod cache_tool;
pub mod command_runner;
pub mod fetch_cache;
pub mod file_tools;
pub mod html;
pub mod path_guard;
pub mod registry;
pub mod shell_tool;
pub mod url_safety;
pub mod web_fetch;
pub mod web_search;

use std::sync::Arc;

use clawgate_platform::Platform;
use clawgate_types::config::ToolsConfig;
use clawgate_types::security::{CommandPolicy, PathPolicy, UrlPolicy};

use crate::command_runner::CommandRunner;
use crate::fetch_cache::FetchCache;
use crate::path_guard::PathGuard;
use crate::registry::ToolRegistry;
use crate::url_safety::NetworkGuard;

/// The guards and shared state the tools are built on.
#[derive(Clone)]
pub struct Guards {
    pub paths: Arc<PathGuard>,
    pub network: NetworkGuard,
    pub commands: CommandPolicy,
    pub runner: CommandRunner,
    pub cache: Arc<FetchCache>,
}

impl Guards {
    /// Build every guard from the tool configuration.
    pub fn from_config(cfg: &ToolsConfig) -> Self {
        Self {
            paths: Arc::new(PathGuard::new(PathPolicy::from_config(&cfg.files))),
            network: NetworkGuard::new(UrlPolicy::from_config(&cfg.url_policy)),
            commands: CommandPolicy::from_config(&cfg.command_policy),
            runner: CommandRunner::from_config(&cfg.exec),
            cache: Arc::new(FetchCache::from_config(&cfg.web.cache)),
        }
    }
}

/// Register all built-in tools with the given registry.
///
/// File tools share `guards.paths`; `exec_shell` is gated by
/// `guards.commands`; the web tools share `guards.network` and the fetch
/// cache, which `clear_web_cache` empties.
pub fn register_all<P: Platform + 'static>(
    registry: &mut ToolRegistry,
    platform: Arc<P>,
    guards: &Guards,
    cfg: &ToolsConfig,
) {
    registry.register(Arc::new(file_tools::ReadFileTool::new(guards.paths.clone())));
    registry.register(Arc::new(file_tools::WriteFileTool::new(guards.paths.clone())));
    registry.register(Arc::new(file_tools::ListDirectoryTool::new(
        guards.paths.clone(),
    )));
    registry.register(Arc::new(file_tools::DeleteFileTool::new(guards.paths.clone())));
    registry.register(Arc::new(file_tools::CreateDirectoryTool::new(
        guards.paths.clone(),
    )));

    let mut shell = shell_tool::ShellExecTool::new(
        guards.commands.clone(),
        guards.runner.clone(),
        guards.paths.clone(),
    );
    if let Some(dir) = &cfg.exec.working_dir {
        shell = shell.with_working_dir(dir.clone());
    }
    registry.register(Arc::new(shell));

    registry.register(Arc::new(
        web_fetch::WebFetchTool::new(platform.clone(), guards.network.clone(), guards.cache.clone())
            .configured(&cfg.web),
    ));
    registry.register(Arc::new(
        web_search::WebSearchTool::new(platform, guards.network.clone()).configured(&cfg.web),
    ));
    registry.register(Arc::new(cache_tool::ClearWebCacheTool::new(
        guards.cache.clone(),
    )));
}

/// Registry with every built-in tool, configured from `cfg`.
pub fn build_registry<P: Platform + 'static>(platform: Arc<P>, cfg: &ToolsConfig) -> ToolRegistry {
    let guards = Guards::from_config(cfg);
    let mut registry = ToolRegistry::new();
    register_all(&mut registry, platform, &guards, cfg);
    registry
}
