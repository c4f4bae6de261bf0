//! File tools: read, write, list, delete and create directories.
//!
//! Every tool resolves its `path` argument through the shared
//! [`PathGuard`] and performs I/O only on the canonical path the guard
//! returns.

use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clawgate_types::ToolError;
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

use crate::path_guard::{Operation, PathGuard};
use crate::registry::Tool;

/// Lines returned by `read_file` when the caller does not pass `max_lines`.
pub const DEFAULT_MAX_LINES: usize = 1000;

/// Extract a required string field from a JSON arguments object.
pub(crate) fn required_str<'a>(args: &'a Value, field: &str) -> Result<&'a str, ToolError> {
    args.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::InvalidArgs(format!("missing required field: {field}")))
}

/// Extract an optional non-negative integer field.
pub(crate) fn optional_u64(args: &Value, field: &str) -> Result<Option<u64>, ToolError> {
    match args.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .map(Some)
            .ok_or_else(|| {
                ToolError::InvalidArgs(format!("{field} must be a non-negative number"))
            }),
    }
}

/// Map an I/O error on `path` to the tool taxonomy.
fn io_error(path: &Path, err: std::io::Error) -> ToolError {
    match err.kind() {
        std::io::ErrorKind::NotFound => ToolError::NotFound(path.display().to_string()),
        _ => ToolError::Failed(format!("{}: {err}", path.display())),
    }
}

fn rfc3339(time: std::io::Result<SystemTime>) -> Option<String> {
    time.ok().map(|t| DateTime::<Utc>::from(t).to_rfc3339())
}

/// Look up an optional `encoding` argument by its WHATWG label
/// (`utf-8`, `latin1`, `shift_jis`, ...).
fn optional_encoding(args: &Value) -> Result<Option<&'static Encoding>, ToolError> {
    match args.get("encoding") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(label)) => Encoding::for_label(label.trim().as_bytes())
            .map(Some)
            .ok_or_else(|| ToolError::InvalidArgs(format!("unknown encoding: {label}"))),
        Some(_) => Err(ToolError::InvalidArgs("encoding must be a string".into())),
    }
}

struct Decoded {
    text: String,
    encoding: &'static Encoding,
    fallback: bool,
}

/// Decode file bytes. Without an explicit encoding a byte-order mark picks
/// one, otherwise UTF-8 is assumed. Input the chosen encoding rejects is
/// decoded as Windows-1252, which maps every byte.
fn decode_text(bytes: &[u8], requested: Option<&'static Encoding>) -> Decoded {
    let (encoding, body) = match requested {
        Some(enc) => (enc, bytes),
        None => match Encoding::for_bom(bytes) {
            Some((enc, bom_len)) => (enc, &bytes[bom_len..]),
            None => (UTF_8, bytes),
        },
    };
    match encoding.decode_without_bom_handling_and_without_replacement(body) {
        Some(text) => Decoded {
            text: text.into_owned(),
            encoding,
            fallback: false,
        },
        None => {
            let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
            Decoded {
                text: text.into_owned(),
                encoding: WINDOWS_1252,
                fallback: true,
            }
        }
    }
}

/// Open options that refuse to follow a symlink in the final component.
/// Guarded paths are canonical, so a link there was swapped in after
/// validation.
fn no_follow(options: &mut tokio::fs::OpenOptions) -> &mut tokio::fs::OpenOptions {
    #[cfg(unix)]
    options.custom_flags(nix::fcntl::OFlag::O_NOFOLLOW.bits());
    options
}

/// Read at most `limit + 1` bytes, so growth past the ceiling after
/// validation is seen without buffering the whole file.
async fn read_capped(path: &Path, limit: u64) -> std::io::Result<Vec<u8>> {
    let file = no_follow(tokio::fs::OpenOptions::new().read(true))
        .open(path)
        .await?;
    if !file.metadata().await?.is_file() {
        return Err(std::io::Error::other("not a regular file"));
    }
    let mut bytes = Vec::new();
    file.take(limit.saturating_add(1))
        .read_to_end(&mut bytes)
        .await?;
    Ok(bytes)
}

async fn write_no_follow(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = no_follow(
        tokio::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true),
    )
    .open(path)
    .await?;
    file.write_all(bytes).await?;
    file.flush().await
}

#[cfg(unix)]
fn permission_string(meta: &std::fs::Metadata) -> String {
    use std::os::unix::fs::PermissionsExt;
    let mode = meta.permissions().mode();
    let mut out = String::with_capacity(9);
    for shift in [6, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    out
}

#[cfg(not(unix))]
fn permission_string(meta: &std::fs::Metadata) -> String {
    if meta.permissions().readonly() {
        "r--".to_string()
    } else {
        "rw-".to_string()
    }
}

// ---------------------------------------------------------------------------
// ReadFileTool
// ---------------------------------------------------------------------------

/// Read a text file.
///
/// The encoding is taken from the `encoding` argument or detected (BOM,
/// then UTF-8). Undecodable bytes fall back to Windows-1252 and are flagged
/// with `fallback: true`. Output is limited to `max_lines` lines (default
/// [`DEFAULT_MAX_LINES`]).
pub struct ReadFileTool {
    guard: Arc<PathGuard>,
}

impl ReadFileTool {
    pub fn new(guard: Arc<PathGuard>) -> Self {
        Self { guard }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a text file. System directories are off limits and files over the size limit are refused."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path (absolute, relative, or starting with ~)"
                },
                "max_lines": {
                    "type": "integer",
                    "description": "Maximum number of lines to return (default 1000)"
                },
                "encoding": {
                    "type": "string",
                    "description": "Text encoding label, e.g. utf-8, latin1, shift_jis (detected if omitted)"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let raw = required_str(&args, "path")?;
        let max_lines = optional_u64(&args, "max_lines")?
            .map(|n| n.max(1) as usize)
            .unwrap_or(DEFAULT_MAX_LINES);
        let requested = optional_encoding(&args)?;

        let resolved = self.guard.validate(raw, Operation::Read)?;
        if !resolved.exists {
            return Err(ToolError::NotFound(resolved.path.display().to_string()));
        }
        if resolved.is_dir {
            return Err(ToolError::Failed(format!(
                "not a file: {}",
                resolved.path.display()
            )));
        }
        if !resolved.is_file {
            return Err(ToolError::Failed(format!(
                "not a regular file: {}",
                resolved.path.display()
            )));
        }

        let limit = self.guard.policy().max_file_size;
        let bytes = read_capped(&resolved.path, limit)
            .await
            .map_err(|e| io_error(&resolved.path, e))?;
        self.guard.check_size(&resolved.path, bytes.len() as u64)?;

        let size = bytes.len();
        let Decoded {
            text,
            encoding,
            fallback,
        } = decode_text(&bytes, requested);

        let total_lines = text.lines().count();
        let truncated = total_lines > max_lines;
        let content = if truncated {
            text.lines().take(max_lines).collect::<Vec<_>>().join("\n")
        } else {
            text
        };

        debug!(
            path = %resolved.path.display(),
            size,
            encoding = encoding.name(),
            fallback,
            truncated,
            "read file"
        );

        Ok(json!({
            "path": resolved.path.display().to_string(),
            "content": content,
            "bytes": size,
            "encoding": encoding.name(),
            "fallback": fallback,
            "total_lines": total_lines,
            "truncated": truncated,
        }))
    }
}

// ---------------------------------------------------------------------------
// WriteFileTool
// ---------------------------------------------------------------------------

/// Write content to a file, creating parent directories as needed.
///
/// Content is encoded as `encoding` (default UTF-8). Characters the target
/// encoding cannot represent are an argument error rather than being
/// replaced.
pub struct WriteFileTool {
    guard: Arc<PathGuard>,
}

impl WriteFileTool {
    pub fn new(guard: Arc<PathGuard>) -> Self {
        Self { guard }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write text content to a file, creating parent directories if needed. Overwrites existing files."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path to write"
                },
                "content": {
                    "type": "string",
                    "description": "Content to write"
                },
                "encoding": {
                    "type": "string",
                    "description": "Text encoding label (default utf-8)"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let raw = required_str(&args, "path")?;
        let content = required_str(&args, "content")?;
        let requested = optional_encoding(&args)?.unwrap_or(UTF_8);

        // UTF-16 labels encode as UTF-8; `encoding` reports what was used.
        let (encoded, encoding, unmappable) = requested.encode(content);
        if unmappable {
            return Err(ToolError::InvalidArgs(format!(
                "content cannot be represented in {}",
                encoding.name()
            )));
        }

        let resolved = self.guard.validate(raw, Operation::Write)?;
        self.guard
            .check_size(&resolved.path, encoded.len() as u64)?;
        if resolved.is_dir {
            return Err(ToolError::Failed(format!(
                "is a directory: {}",
                resolved.path.display()
            )));
        }
        if resolved.exists && !resolved.is_file {
            return Err(ToolError::Failed(format!(
                "not a regular file: {}",
                resolved.path.display()
            )));
        }

        if let Some(parent) = resolved.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, e))?;
        }
        write_no_follow(&resolved.path, &encoded)
            .await
            .map_err(|e| io_error(&resolved.path, e))?;

        debug!(
            path = %resolved.path.display(),
            bytes = encoded.len(),
            encoding = encoding.name(),
            "wrote file"
        );

        Ok(json!({
            "path": resolved.path.display().to_string(),
            "bytes": encoded.len(),
            "encoding": encoding.name(),
            "created": !resolved.exists,
        }))
    }
}

// ---------------------------------------------------------------------------
// ListDirectoryTool
// ---------------------------------------------------------------------------

/// List a directory: directories first, then files, each group sorted by
/// case-insensitive name.
pub struct ListDirectoryTool {
    guard: Arc<PathGuard>,
}

impl ListDirectoryTool {
    pub fn new(guard: Arc<PathGuard>) -> Self {
        Self { guard }
    }
}

struct Listed {
    name: String,
    is_dir: bool,
    entry: Value,
}

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List directory contents with sizes, modification times and permissions."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory path (default: current directory)"
                }
            }
        })
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let raw = args.get("path").and_then(Value::as_str).unwrap_or(".");
        let resolved = self.guard.validate(raw, Operation::List)?;
        if !resolved.exists {
            return Err(ToolError::NotFound(resolved.path.display().to_string()));
        }
        if !resolved.is_dir {
            return Err(ToolError::Failed(format!(
                "not a directory: {}",
                resolved.path.display()
            )));
        }

        let mut reader = tokio::fs::read_dir(&resolved.path)
            .await
            .map_err(|e| io_error(&resolved.path, e))?;

        let mut listed = Vec::new();
        while let Some(item) = reader
            .next_entry()
            .await
            .map_err(|e| io_error(&resolved.path, e))?
        {
            let name = item.file_name().to_string_lossy().into_owned();
            // Follows symlinks, so a link to a directory lists as one.
            let listed_entry = match tokio::fs::metadata(item.path()).await {
                Ok(meta) => Listed {
                    is_dir: meta.is_dir(),
                    entry: json!({
                        "name": name,
                        "type": if meta.is_dir() { "dir" } else { "file" },
                        "size": if meta.is_dir() { None } else { Some(meta.len()) },
                        "modified": rfc3339(meta.modified()),
                        "permissions": permission_string(&meta),
                    }),
                    name,
                },
                Err(e) => Listed {
                    is_dir: false,
                    entry: json!({ "name": name, "error": e.to_string() }),
                    name,
                },
            };
            listed.push(listed_entry);
        }

        listed.sort_by(|a, b| {
            b.is_dir
                .cmp(&a.is_dir)
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        });

        let directories = listed.iter().filter(|l| l.is_dir).count();
        let files = listed
            .iter()
            .filter(|l| l.entry.get("type").and_then(Value::as_str) == Some("file"))
            .count();
        let total_size: u64 = listed
            .iter()
            .filter_map(|l| l.entry.get("size").and_then(Value::as_u64))
            .sum();

        Ok(json!({
            "path": resolved.path.display().to_string(),
            "entries": listed.into_iter().map(|l| l.entry).collect::<Vec<_>>(),
            "directories": directories,
            "files": files,
            "total_size": total_size,
        }))
    }
}

// ---------------------------------------------------------------------------
// DeleteFileTool
// ---------------------------------------------------------------------------

/// Delete a single file. Directories are refused.
pub struct DeleteFileTool {
    guard: Arc<PathGuard>,
}

impl DeleteFileTool {
    pub fn new(guard: Arc<PathGuard>) -> Self {
        Self { guard }
    }
}

#[async_trait]
impl Tool for DeleteFileTool {
    fn name(&self) -> &str {
        "delete_file"
    }

    fn description(&self) -> &str {
        "Delete a file. Directories cannot be deleted with this tool."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path to delete"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let raw = required_str(&args, "path")?;
        let resolved = self.guard.validate(raw, Operation::Delete)?;
        if !resolved.exists {
            return Err(ToolError::NotFound(resolved.path.display().to_string()));
        }
        if resolved.is_dir {
            return Err(ToolError::Failed(format!(
                "not a file: {}",
                resolved.path.display()
            )));
        }

        tokio::fs::remove_file(&resolved.path)
            .await
            .map_err(|e| io_error(&resolved.path, e))?;
        debug!(path = %resolved.path.display(), "deleted file");

        Ok(json!({
            "path": resolved.path.display().to_string(),
            "deleted": true,
        }))
    }
}

// ---------------------------------------------------------------------------
// CreateDirectoryTool
// ---------------------------------------------------------------------------

/// Create a directory and any missing parents.
pub struct CreateDirectoryTool {
    guard: Arc<PathGuard>,
}

impl CreateDirectoryTool {
    pub fn new(guard: Arc<PathGuard>) -> Self {
        Self { guard }
    }
}

#[async_trait]
impl Tool for CreateDirectoryTool {
    fn name(&self) -> &str {
        "create_directory"
    }

    fn description(&self) -> &str {
        "Create a directory, including missing parent directories."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory path to create"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let raw = required_str(&args, "path")?;
        let resolved = self.guard.validate(raw, Operation::Create)?;
        let path = resolved.path.display().to_string();

        if resolved.exists {
            if resolved.is_dir {
                return Ok(json!({ "path": path, "created": false }));
            }
            return Err(ToolError::Failed(format!(
                "a file with this name already exists: {path}"
            )));
        }

        tokio::fs::create_dir_all(&resolved.path)
            .await
            .map_err(|e| io_error(&resolved.path, e))?;
        debug!(path = %path, "created directory");

        Ok(json!({ "path": path, "created": true }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
