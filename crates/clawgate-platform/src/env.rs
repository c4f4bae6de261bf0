//! Environment access abstraction and native implementation.
//!
//! Config discovery and overrides read through [`Environment`] rather than
//! `std::env` directly so tests can supply an in-memory map instead of
//! mutating process-global state.

use std::path::PathBuf;

/// Read-only view of environment-style configuration.
pub trait Environment: Send + Sync {
    /// Get the value of an environment variable, or `None` if it is unset
    /// or not valid Unicode.
    fn get_var(&self, name: &str) -> Option<String>;

    /// The current user's home directory, if one can be determined.
    fn home_dir(&self) -> Option<PathBuf>;
}

/// Native environment backed by [`std::env`] and [`dirs`].
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeEnvironment;

impl Environment for NativeEnvironment {
    fn get_var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }

    fn home_dir(&self) -> Option<PathBuf> {
        dirs::home_dir()
    }
}
