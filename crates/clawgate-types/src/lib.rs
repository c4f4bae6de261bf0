//! # clawgate-types
//!
//! Core type definitions shared by every clawgate crate.
//!
//! - **[`error`]** -- [`ClawgateError`], the tool-level [`ToolError`] and its
//!   coarse [`ErrorKind`]
//! - **[`config`]** -- Configuration schema (file tools, exec, web, policies)
//! - **[`security`]** -- Runtime policy types built from config at startup:
//!   [`security::CommandPolicy`], [`security::UrlPolicy`] and the
//!   filesystem deny-list [`security::PathPolicy`]

pub mod config;
pub mod error;
pub mod security;

pub use error::{ClawgateError, ErrorKind, Result, ToolError, ToolFailure};
