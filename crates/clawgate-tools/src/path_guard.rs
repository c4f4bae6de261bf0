//! Filesystem path validation.
//!
//! Every file tool resolves its `path` argument through [`PathGuard`]
//! before touching the disk. The guard expands `~`, anchors relative paths
//! on the base directory, resolves symlinks and `..` to a canonical
//! absolute path, and rejects anything equal to or under a denied system
//! directory. Files larger than the size ceiling are refused for reads and
//! overwrites.
//!
//! Paths that do not exist yet (write targets, new directories) are
//! resolved by canonicalizing their deepest existing ancestor and applying
//! the remaining components lexically, so a `..` or symlink in the
//! existing part of the path cannot be used to escape the deny-list. A
//! dangling symlink counts as its target, not as a new file.

use std::ffi::OsString;
use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf, Prefix};
use std::str::FromStr;

use clawgate_types::ToolError;
use clawgate_types::security::{MatchMode, PathPolicy, PathRule};
use thiserror::Error;
use tracing::{debug, warn};

/// What the caller intends to do with the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Write,
    Delete,
    List,
    Create,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Delete => "delete",
            Self::List => "list",
            Self::Create => "create",
        }
    }

    /// Whether the size ceiling applies to an existing target.
    fn checks_size(&self) -> bool {
        matches!(self, Self::Read | Self::Write)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            "delete" => Ok(Self::Delete),
            "list" => Ok(Self::List),
            "create" => Ok(Self::Create),
            other => Err(format!(
                "unknown operation '{other}' (expected read, write, delete, list or create)"
            )),
        }
    }
}

/// Errors produced by [`PathGuard::validate`].
#[derive(Debug, Error)]
pub enum PathGuardError {
    #[error("path is empty")]
    Empty,

    /// The canonical path matched a deny rule.
    #[error("{path} is inside protected location {rule}")]
    Denied { path: PathBuf, rule: PathBuf },

    /// The path could not be resolved for a reason other than "does not exist".
    #[error("cannot resolve {path}: {reason}")]
    Unresolvable { path: String, reason: String },

    /// The existing target exceeds the size ceiling.
    #[error("{path} is {size} bytes (limit {limit} bytes)")]
    TooLarge { path: PathBuf, size: u64, limit: u64 },
}

impl From<PathGuardError> for ToolError {
    fn from(err: PathGuardError) -> Self {
        match err {
            PathGuardError::TooLarge { path, size, limit } => ToolError::TooLarge {
                path: path.display().to_string(),
                size,
                limit,
            },
            PathGuardError::Denied { ref path, .. } => ToolError::PathDenied {
                path: path.display().to_string(),
                reason: err.to_string(),
            },
            PathGuardError::Unresolvable { ref path, .. } => ToolError::PathDenied {
                path: path.clone(),
                reason: err.to_string(),
            },
            PathGuardError::Empty => ToolError::PathDenied {
                path: String::new(),
                reason: err.to_string(),
            },
        }
    }
}

/// A path that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Canonical absolute path; use this for all I/O.
    pub path: PathBuf,
    pub exists: bool,
    pub is_dir: bool,
    /// Regular file, as opposed to a directory, FIFO, socket or device.
    pub is_file: bool,
    /// Size in bytes when the target is an existing file.
    pub size: Option<u64>,
}

/// A deny rule together with the comparable forms of its prefix.
#[derive(Debug, Clone)]
struct CompiledRule {
    rule: PathRule,
    /// The prefix as written, plus its canonical form when that differs
    /// (e.g. `/bin` -> `/usr/bin` on merged-usr systems).
    forms: Vec<Vec<String>>,
}

/// Validates user-supplied paths against a [`PathPolicy`].
#[derive(Debug, Clone)]
pub struct PathGuard {
    policy: PathPolicy,
    rules: Vec<CompiledRule>,
}

impl PathGuard {
    pub fn new(policy: PathPolicy) -> Self {
        let rules = policy
            .rules
            .iter()
            .map(|rule| {
                let mut forms = vec![comparable(&rule.prefix)];
                if let Ok(canon) = std::fs::canonicalize(&rule.prefix) {
                    let canon = comparable(&canon);
                    if !forms.contains(&canon) {
                        forms.push(canon);
                    }
                }
                CompiledRule {
                    rule: rule.clone(),
                    forms,
                }
            })
            .collect();
        Self { policy, rules }
    }

    pub fn policy(&self) -> &PathPolicy {
        &self.policy
    }

    /// Resolve `raw` and check it against the deny-list and, for reads and
    /// writes of existing files, the size ceiling.
    pub fn validate(&self, raw: &str, op: Operation) -> Result<ResolvedPath, PathGuardError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(PathGuardError::Empty);
        }
        if trimmed.contains('\0') {
            return Err(unresolvable(raw, "path contains a NUL byte"));
        }

        let expanded = expand_tilde(trimmed, dirs::home_dir())
            .ok_or_else(|| unresolvable(raw, "home directory is unknown"))?;
        let absolute = self.absolutize(expanded, raw)?;
        let canonical =
            canonicalize_lenient(&absolute).map_err(|e| unresolvable(raw, &e.to_string()))?;

        if let Some(rule) = self.matching_rule(&canonical) {
            warn!(
                path = %canonical.display(),
                rule = %rule.prefix.display(),
                op = %op,
                "path denied"
            );
            return Err(PathGuardError::Denied {
                path: canonical,
                rule: rule.prefix.clone(),
            });
        }

        let resolved = match std::fs::metadata(&canonical) {
            Ok(meta) => ResolvedPath {
                exists: true,
                is_dir: meta.is_dir(),
                is_file: meta.is_file(),
                size: meta.is_file().then(|| meta.len()),
                path: canonical,
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => ResolvedPath {
                path: canonical,
                exists: false,
                is_dir: false,
                is_file: false,
                size: None,
            },
            Err(e) => return Err(unresolvable(raw, &e.to_string())),
        };

        if op.checks_size()
            && let Some(size) = resolved.size
        {
            self.check_size(&resolved.path, size)?;
        }

        debug!(
            path = %resolved.path.display(),
            op = %op,
            exists = resolved.exists,
            "path approved"
        );
        Ok(resolved)
    }

    /// Reject `size` bytes destined for `path` if it exceeds the ceiling.
    /// A size exactly at the ceiling passes.
    pub fn check_size(&self, path: &Path, size: u64) -> Result<(), PathGuardError> {
        let limit = self.policy.max_file_size;
        if size > limit {
            warn!(path = %path.display(), size, limit, "file exceeds size ceiling");
            return Err(PathGuardError::TooLarge {
                path: path.to_path_buf(),
                size,
                limit,
            });
        }
        Ok(())
    }

    fn absolutize(&self, path: PathBuf, raw: &str) -> Result<PathBuf, PathGuardError> {
        if path.is_absolute() {
            return Ok(path);
        }
        let base = match &self.policy.base_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => current_dir(raw)?.join(dir),
            None => current_dir(raw)?,
        };
        Ok(base.join(path))
    }

    fn matching_rule(&self, canonical: &Path) -> Option<&PathRule> {
        let candidate = comparable(canonical);
        self.rules
            .iter()
            .find(|compiled| {
                compiled.forms.iter().any(|prefix| match compiled.rule.mode {
                    MatchMode::Exact => candidate == *prefix,
                    MatchMode::Subtree => candidate.starts_with(prefix),
                })
            })
            .map(|compiled| &compiled.rule)
    }
}

impl Default for PathGuard {
    fn default() -> Self {
        Self::new(PathPolicy::default())
    }
}

fn unresolvable(raw: &str, reason: &str) -> PathGuardError {
    PathGuardError::Unresolvable {
        path: raw.to_string(),
        reason: reason.to_string(),
    }
}

fn current_dir(raw: &str) -> Result<PathBuf, PathGuardError> {
    std::env::current_dir().map_err(|e| unresolvable(raw, &format!("no working directory: {e}")))
}

/// Replace a leading `~` with `home`. Returns `None` when the path starts
/// with `~` and no home directory is known. `~user` forms are left alone.
pub fn expand_tilde(raw: &str, home: Option<PathBuf>) -> Option<PathBuf> {
    if raw == "~" {
        return home;
    }
    let rest = raw
        .strip_prefix("~/")
        .or_else(|| raw.strip_prefix("~\\").filter(|_| cfg!(windows)));
    match rest {
        Some(rest) => home.map(|h| h.join(rest)),
        None => Some(PathBuf::from(raw)),
    }
}

enum Pending {
    Name(OsString),
    Parent,
}

/// Symlink hops followed while resolving a dangling link, matching the
/// usual kernel limit.
const MAX_LINK_HOPS: usize = 40;

/// Canonicalize `path`, tolerating a non-existent tail.
///
/// Walks up to the deepest ancestor that exists, canonicalizes it, then
/// re-applies the missing components lexically. A dangling symlink met on
/// the way is not a missing component: its target is substituted and
/// resolved in turn, since opening the link would create that target.
/// Errors other than `NotFound` are returned as-is.
fn canonicalize_lenient(path: &Path) -> io::Result<PathBuf> {
    let mut existing = path.to_path_buf();
    let mut pending = Vec::new();
    let mut hops = 0;

    let mut canonical = loop {
        match std::fs::canonicalize(&existing) {
            Ok(canon) => break canon,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if let Some(target) = dangling_link_target(&existing)? {
                    hops += 1;
                    if hops > MAX_LINK_HOPS {
                        return Err(io::Error::other("too many levels of symbolic links"));
                    }
                    existing = target;
                    continue;
                }
                match existing.components().next_back() {
                    Some(Component::Normal(name)) => pending.push(Pending::Name(name.to_owned())),
                    Some(Component::ParentDir) => pending.push(Pending::Parent),
                    Some(Component::CurDir) => {}
                    _ => return Err(e),
                }
                if !existing.pop() {
                    return Err(e);
                }
            }
            Err(e) => return Err(e),
        }
    };

    for part in pending.into_iter().rev() {
        match part {
            Pending::Name(name) => canonical.push(name),
            Pending::Parent => {
                canonical.pop();
            }
        }
    }
    Ok(canonical)
}

/// Target of `path` when it is itself a symlink, anchored on the link's
/// directory when relative.
fn dangling_link_target(path: &Path) -> io::Result<Option<PathBuf>> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_symlink() => {
            let target = std::fs::read_link(path)?;
            let parent = path.parent().unwrap_or(Path::new("/"));
            Ok(Some(parent.join(target)))
        }
        Ok(_) => Ok(None),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Component list used for rule comparison. Windows verbatim prefixes
/// (`\\?\C:`) compare equal to plain drive prefixes.
fn comparable(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|c| {
            let part = match c {
                Component::Prefix(prefix) => match prefix.kind() {
                    Prefix::VerbatimDisk(d) | Prefix::Disk(d) => {
                        format!("{}:", (d as char).to_ascii_uppercase())
                    }
                    _ => prefix.as_os_str().to_string_lossy().into_owned(),
                },
                Component::RootDir => "/".to_string(),
                Component::Normal(name) => name.to_string_lossy().into_owned(),
                Component::CurDir | Component::ParentDir => return None,
            };
            Some(fold_case(part))
        })
        .collect()
}

#[cfg(any(windows, target_os = "macos"))]
fn fold_case(s: String) -> String {
    s.to_lowercase()
}

#[cfg(not(any(windows, target_os = "macos")))]
fn fold_case(s: String) -> String {
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    /// Fresh directory under the system temp dir. Canonicalized so
    /// assertions hold where temp is a symlink (macOS `/var` -> `/private/var`).
    fn temp_dir() -> PathBuf {
        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let dir = std::env::temp_dir().join(format!(
            "clawgate_path_guard_{}_{id}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::canonicalize(&dir).unwrap()
    }

    fn cleanup(dir: &Path) {
        let _ = std::fs::remove_dir_all(dir);
    }

    fn guard_with_limit(limit: u64) -> PathGuard {
        PathGuard::new(PathPolicy::default().with_max_file_size(limit))
    }

    #[test]
    fn operation_parse() {
        assert_eq!("READ".parse::<Operation>().unwrap(), Operation::Read);
        assert_eq!(" create ".parse::<Operation>().unwrap(), Operation::Create);
        assert!("chmod".parse::<Operation>().is_err());
    }

    #[test]
    fn empty_path_rejected() {
        let guard = PathGuard::default();
        assert!(matches!(
            guard.validate("   ", Operation::Read),
            Err(PathGuardError::Empty)
        ));
    }

    #[test]
    fn nul_byte_rejected() {
        let guard = PathGuard::default();
        let err = guard.validate("/tmp/a\0b", Operation::Read).unwrap_err();
        assert!(matches!(err, PathGuardError::Unresolvable { .. }));
    }

    #[test]
    fn expand_tilde_forms() {
        let home = PathBuf::from("/home/alice");
        assert_eq!(expand_tilde("~", Some(home.clone())), Some(home.clone()));
        assert_eq!(
            expand_tilde("~/notes.txt", Some(home.clone())),
            Some(home.join("notes.txt"))
        );
        assert_eq!(
            expand_tilde("~bob/x", Some(home.clone())),
            Some(PathBuf::from("~bob/x"))
        );
        assert_eq!(expand_tilde("~/x", None), None);
        assert_eq!(expand_tilde("/abs", None), Some(PathBuf::from("/abs")));
    }

    #[test]
    fn temp_file_allowed() {
        let dir = temp_dir();
        let file = dir.join("ok.txt");
        std::fs::write(&file, "hi").unwrap();

        let resolved = PathGuard::default()
            .validate(file.to_str().unwrap(), Operation::Read)
            .unwrap();
        assert_eq!(resolved.path, file);
        assert!(resolved.exists);
        assert!(!resolved.is_dir);
        assert_eq!(resolved.size, Some(2));
        cleanup(&dir);
    }

    #[test]
    fn missing_target_resolves_lexically() {
        let dir = temp_dir();
        let raw = dir.join("new/sub/../file.txt");
        let resolved = PathGuard::default()
            .validate(raw.to_str().unwrap(), Operation::Write)
            .unwrap();
        assert_eq!(resolved.path, dir.join("new").join("file.txt"));
        assert!(!resolved.exists);
        assert_eq!(resolved.size, None);
        cleanup(&dir);
    }

    #[test]
    fn relative_path_uses_base_dir() {
        let dir = temp_dir();
        std::fs::write(dir.join("rel.txt"), "x").unwrap();
        let guard = PathGuard::new(PathPolicy::default().with_base_dir(&dir));
        let resolved = guard.validate("rel.txt", Operation::Read).unwrap();
        assert_eq!(resolved.path, dir.join("rel.txt"));
        cleanup(&dir);
    }

    #[test]
    fn file_at_ceiling_accepted_one_over_rejected() {
        let dir = temp_dir();
        let at = dir.join("at.bin");
        let over = dir.join("over.bin");
        std::fs::write(&at, vec![0u8; 64]).unwrap();
        std::fs::write(&over, vec![0u8; 65]).unwrap();

        let guard = guard_with_limit(64);
        assert!(guard.validate(at.to_str().unwrap(), Operation::Read).is_ok());

        let err = guard
            .validate(over.to_str().unwrap(), Operation::Read)
            .unwrap_err();
        assert!(matches!(
            err,
            PathGuardError::TooLarge {
                size: 65,
                limit: 64,
                ..
            }
        ));
        // Overwrites are bounded the same way.
        assert!(guard.validate(over.to_str().unwrap(), Operation::Write).is_err());
        // Listing or deleting a large file is fine.
        assert!(guard.validate(over.to_str().unwrap(), Operation::Delete).is_ok());
        cleanup(&dir);
    }

    #[test]
    fn custom_subtree_rule_denies_nested() {
        let dir = temp_dir();
        let guard = PathGuard::new(PathPolicy {
            rules: vec![PathRule::subtree(&dir)],
            ..PathPolicy::default()
        });
        let err = guard
            .validate(dir.join("a/b.txt").to_str().unwrap(), Operation::Write)
            .unwrap_err();
        match err {
            PathGuardError::Denied { rule, .. } => assert_eq!(rule, dir),
            other => panic!("expected Denied, got {other:?}"),
        }
        assert!(guard.validate(dir.to_str().unwrap(), Operation::List).is_err());
        cleanup(&dir);
    }

    #[test]
    fn exact_rule_denies_only_itself() {
        let dir = temp_dir();
        let guard = PathGuard::new(PathPolicy {
            rules: vec![PathRule::exact(&dir)],
            ..PathPolicy::default()
        });
        assert!(guard.validate(dir.to_str().unwrap(), Operation::List).is_err());
        assert!(
            guard
                .validate(dir.join("child").to_str().unwrap(), Operation::Create)
                .is_ok()
        );
        cleanup(&dir);
    }

    #[test]
    fn sibling_with_shared_prefix_not_denied() {
        let dir = temp_dir();
        let denied = dir.join("data");
        let sibling = dir.join("database");
        let guard = PathGuard::new(PathPolicy {
            rules: vec![PathRule::subtree(&denied)],
            ..PathPolicy::default()
        });
        assert!(
            guard
                .validate(sibling.to_str().unwrap(), Operation::Create)
                .is_ok()
        );
        cleanup(&dir);
    }

    #[cfg(unix)]
    #[test]
    fn system_paths_denied() {
        let guard = PathGuard::default();
        for raw in ["/etc/passwd", "/etc", "/usr/bin/env", "/proc/self/status", "/"] {
            let err = guard.validate(raw, Operation::Read).unwrap_err();
            assert!(
                matches!(err, PathGuardError::Denied { .. }),
                "{raw} should be denied, got {err:?}"
            );
        }
    }

    #[cfg(unix)]
    #[test]
    fn dotdot_traversal_denied() {
        let dir = temp_dir();
        let raw = format!("{}/../../../../../../etc/passwd", dir.display());
        let err = PathGuard::default()
            .validate(&raw, Operation::Read)
            .unwrap_err();
        assert!(matches!(err, PathGuardError::Denied { .. }));

        // Through a directory that does not exist.
        let err = PathGuard::default()
            .validate("/nonexistent-clawgate/../etc/shadow", Operation::Read)
            .unwrap_err();
        assert!(matches!(err, PathGuardError::Denied { .. }));
        cleanup(&dir);
    }

    #[cfg(unix)]
    #[test]
    fn symlink_into_denied_dir_rejected() {
        let dir = temp_dir();
        let link = dir.join("sneaky");
        std::os::unix::fs::symlink("/etc", &link).unwrap();

        let guard = PathGuard::default();
        let err = guard
            .validate(link.join("passwd").to_str().unwrap(), Operation::Read)
            .unwrap_err();
        assert!(matches!(err, PathGuardError::Denied { .. }));

        // Writing a new file through the link is caught as well.
        let err = guard
            .validate(link.join("new.conf").to_str().unwrap(), Operation::Write)
            .unwrap_err();
        assert!(matches!(err, PathGuardError::Denied { .. }));
        cleanup(&dir);
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_resolved_to_its_target() {
        let dir = temp_dir();
        let protected = dir.join("protected");
        let ws = dir.join("ws");
        std::fs::create_dir_all(&protected).unwrap();
        std::fs::create_dir_all(&ws).unwrap();
        let guard = PathGuard::new(PathPolicy {
            rules: vec![PathRule::subtree(&protected)],
            ..PathPolicy::default()
        });

        // Absolute target that does not exist yet.
        std::os::unix::fs::symlink(protected.join("evil.conf"), ws.join("link")).unwrap();
        let err = guard
            .validate(ws.join("link").to_str().unwrap(), Operation::Write)
            .unwrap_err();
        assert!(matches!(err, PathGuardError::Denied { .. }));

        // Relative target, reached through a second dangling link and a
        // missing directory.
        std::os::unix::fs::symlink("../protected/new/x.conf", ws.join("rel")).unwrap();
        std::os::unix::fs::symlink(ws.join("rel"), ws.join("chain")).unwrap();
        for name in ["rel", "chain"] {
            let err = guard
                .validate(ws.join(name).to_str().unwrap(), Operation::Write)
                .unwrap_err();
            assert!(matches!(err, PathGuardError::Denied { .. }), "{name}");
        }

        // A dangling link to an allowed location resolves to the target.
        std::os::unix::fs::symlink(ws.join("real.txt"), ws.join("ok")).unwrap();
        let resolved = guard
            .validate(ws.join("ok").to_str().unwrap(), Operation::Write)
            .unwrap();
        assert_eq!(resolved.path, ws.join("real.txt"));
        assert!(!resolved.exists);
        cleanup(&dir);
    }

    #[cfg(unix)]
    #[test]
    fn fifo_is_not_a_regular_file() {
        let dir = temp_dir();
        let fifo = dir.join("pipe");
        nix::unistd::mkfifo(&fifo, nix::sys::stat::Mode::S_IRWXU).unwrap();
        let resolved = PathGuard::default()
            .validate(fifo.to_str().unwrap(), Operation::Read)
            .unwrap();
        assert!(resolved.exists);
        assert!(!resolved.is_file);
        assert!(!resolved.is_dir);
        assert_eq!(resolved.size, None);
        cleanup(&dir);
    }

    #[cfg(unix)]
    #[test]
    fn symlink_loop_fails_closed() {
        let dir = temp_dir();
        std::os::unix::fs::symlink(dir.join("b"), dir.join("a")).unwrap();
        std::os::unix::fs::symlink(dir.join("a"), dir.join("b")).unwrap();

        let err = PathGuard::default()
            .validate(dir.join("a/file").to_str().unwrap(), Operation::Read)
            .unwrap_err();
        assert!(matches!(err, PathGuardError::Unresolvable { .. }));
        cleanup(&dir);
    }

    #[test]
    fn tool_error_conversion() {
        let err: ToolError = PathGuardError::TooLarge {
            path: PathBuf::from("/tmp/x"),
            size: 2,
            limit: 1,
        }
        .into();
        assert_eq!(err.kind(), clawgate_types::ErrorKind::Failed);

        let err: ToolError = PathGuardError::Empty.into();
        assert_eq!(err.kind(), clawgate_types::ErrorKind::PathDenied);
    }
}
