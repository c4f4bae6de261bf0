//! Bounded command execution.
//!
//! [`CommandRunner`] runs a shell command line (`sh -c` / `cmd /C`) or an
//! argument vector with a wall-clock deadline. The child is placed in its
//! own process group; stdout and stderr are drained concurrently so a
//! chatty process cannot block on a full pipe.
//!
//! The whole group is killed on every way out of [`CommandRunner::run`]:
//! normal exit (stray background jobs), timeout, wait error, and the
//! future being dropped. A non-zero exit code is data, not an error.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use clawgate_types::ToolError;
use clawgate_types::config::ExecToolConfig;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

/// How long to wait for the child to be reaped and the pipes to drain
/// after the group has been killed.
pub const KILL_GRACE: Duration = Duration::from_secs(2);

/// Captured bytes per stream; the rest is drained and dropped.
pub const MAX_CAPTURE_BYTES: usize = 1024 * 1024;

/// What to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandSpec {
    /// A command line handed to the platform shell.
    Shell(String),
    /// Program and arguments, executed without a shell.
    Argv(Vec<String>),
}

/// One execution request.
#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub spec: CommandSpec,
    /// Requested timeout in seconds; `None` uses the runner default.
    pub timeout_secs: Option<u64>,
    pub cwd: Option<PathBuf>,
    /// Extra environment variables layered over the inherited environment.
    pub env: Vec<(String, String)>,
}

impl CommandRequest {
    pub fn shell(command: impl Into<String>) -> Self {
        Self {
            spec: CommandSpec::Shell(command.into()),
            timeout_secs: None,
            cwd: None,
            env: Vec::new(),
        }
    }

    pub fn argv<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            spec: CommandSpec::Argv(args.into_iter().map(Into::into).collect()),
            timeout_secs: None,
            cwd: None,
            env: Vec::new(),
        }
    }

    pub fn timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// Result of a command that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, or -1 when the process was terminated by a signal.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub stdout_truncated: bool,
    pub stderr_truncated: bool,
    pub elapsed: Duration,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("command is empty")]
    EmptyCommand,

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed waiting for process: {0}")]
    Wait(#[source] std::io::Error),

    #[error("command timed out after {secs}s")]
    TimedOut { secs: u64, elapsed: Duration },
}

impl From<CommandError> for ToolError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::EmptyCommand => ToolError::InvalidArgs(err.to_string()),
            CommandError::TimedOut { secs, .. } => ToolError::TimedOut {
                operation: "command".into(),
                secs,
            },
            CommandError::Spawn { .. } | CommandError::Wait(_) => {
                ToolError::Failed(err.to_string())
            }
        }
    }
}

/// Runs commands under a clamped timeout.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    default_timeout_secs: u64,
    max_timeout_secs: u64,
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self::from_config(&ExecToolConfig::default())
    }
}

impl CommandRunner {
    pub fn new(default_timeout_secs: u64, max_timeout_secs: u64) -> Self {
        let max_timeout_secs = max_timeout_secs.max(1);
        Self {
            default_timeout_secs: default_timeout_secs.clamp(1, max_timeout_secs),
            max_timeout_secs,
        }
    }

    pub fn from_config(cfg: &ExecToolConfig) -> Self {
        Self::new(cfg.timeout_secs, cfg.max_timeout_secs)
    }

    pub fn max_timeout_secs(&self) -> u64 {
        self.max_timeout_secs
    }

    /// Effective timeout for a request: the default when unset, always
    /// within `[1, max]`.
    pub fn clamp_timeout(&self, requested: Option<u64>) -> u64 {
        requested
            .unwrap_or(self.default_timeout_secs)
            .clamp(1, self.max_timeout_secs)
    }

    /// Run a command to completion or until its deadline.
    pub async fn run(&self, request: CommandRequest) -> Result<CommandOutput, CommandError> {
        let timeout_secs = self.clamp_timeout(request.timeout_secs);
        let (mut std_cmd, program) = build_command(&request.spec)?;

        std_cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &request.cwd {
            std_cmd.current_dir(dir);
        }
        std_cmd.envs(request.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            std_cmd.process_group(0);
        }
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            std_cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);
        }

        let mut cmd = tokio::process::Command::from(std_cmd);
        cmd.kill_on_drop(true);

        debug!(program = %program, timeout_secs, cwd = ?request.cwd, "spawning command");
        let start = Instant::now();
        let deadline = start + Duration::from_secs(timeout_secs);

        let mut child = cmd.spawn().map_err(|source| CommandError::Spawn {
            program: program.clone(),
            source,
        })?;
        let mut group = ProcessGroup::new(child.id());

        let stdout_task = CaptureTask::spawn(child.stdout.take());
        let stderr_task = CaptureTask::spawn(child.stderr.take());

        let status = match tokio::time::timeout_at(deadline, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                group.kill();
                stdout_task.handle.abort();
                stderr_task.handle.abort();
                return Err(CommandError::Wait(e));
            }
            Err(_) => {
                warn!(program = %program, timeout_secs, "command timed out, killing process group");
                group.kill();
                let _ = child.start_kill();
                if tokio::time::timeout(KILL_GRACE, child.wait()).await.is_err() {
                    warn!(program = %program, "child not reaped within grace period");
                }
                stdout_task.handle.abort();
                stderr_task.handle.abort();
                return Err(CommandError::TimedOut {
                    secs: timeout_secs,
                    elapsed: start.elapsed(),
                });
            }
        };

        // The leader is gone; anything it left behind in the group would
        // otherwise keep the pipes open.
        group.kill();

        let (stdout, stdout_truncated) = stdout_task.join().await;
        let (stderr, stderr_truncated) = stderr_task.join().await;
        let elapsed = start.elapsed();
        let exit_code = status.code().unwrap_or(-1);

        debug!(
            program = %program,
            exit_code,
            elapsed_ms = elapsed.as_millis() as u64,
            "command finished"
        );

        Ok(CommandOutput {
            exit_code,
            stdout,
            stderr,
            stdout_truncated,
            stderr_truncated,
            elapsed,
        })
    }
}

#[cfg(windows)]
const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;

fn build_command(spec: &CommandSpec) -> Result<(std::process::Command, String), CommandError> {
    match spec {
        CommandSpec::Shell(line) => {
            if line.trim().is_empty() {
                return Err(CommandError::EmptyCommand);
            }
            let (shell, flag) = if cfg!(windows) { ("cmd", "/C") } else { ("sh", "-c") };
            let mut cmd = std::process::Command::new(shell);
            cmd.arg(flag).arg(line);
            Ok((cmd, shell.to_string()))
        }
        CommandSpec::Argv(args) => {
            let (program, rest) = args.split_first().ok_or(CommandError::EmptyCommand)?;
            if program.trim().is_empty() {
                return Err(CommandError::EmptyCommand);
            }
            let mut cmd = std::process::Command::new(program);
            cmd.args(rest);
            Ok((cmd, program.clone()))
        }
    }
}

/// Bytes kept from one output stream.
#[derive(Debug, Default)]
struct Captured {
    bytes: Vec<u8>,
    truncated: bool,
}

fn lock(sink: &Mutex<Captured>) -> MutexGuard<'_, Captured> {
    sink.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Read a pipe to EOF into `sink`, keeping at most [`MAX_CAPTURE_BYTES`].
async fn capture<R: AsyncRead + Unpin>(pipe: Option<R>, sink: Arc<Mutex<Captured>>) {
    let Some(mut pipe) = pipe else {
        return;
    };
    let mut buf = [0u8; 8192];
    loop {
        match pipe.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let mut captured = lock(&sink);
                let room = MAX_CAPTURE_BYTES.saturating_sub(captured.bytes.len());
                if n > room {
                    captured.truncated = true;
                }
                captured.bytes.extend_from_slice(&buf[..n.min(room)]);
            }
        }
    }
}

/// A reader task draining one pipe into a buffer shared with the runner.
struct CaptureTask {
    handle: JoinHandle<()>,
    sink: Arc<Mutex<Captured>>,
}

impl CaptureTask {
    fn spawn<R>(pipe: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let sink = Arc::new(Mutex::new(Captured::default()));
        let handle = tokio::spawn(capture(pipe, sink.clone()));
        Self { handle, sink }
    }

    /// Wait for EOF, giving up after [`KILL_GRACE`] if a process outside
    /// the group still holds the pipe. Output read up to that point is
    /// kept and reported as truncated.
    async fn join(self) -> (String, bool) {
        let abort = self.handle.abort_handle();
        let timed_out = tokio::time::timeout(KILL_GRACE, self.handle).await.is_err();
        if timed_out {
            abort.abort();
            warn!("output pipe still open after process exit, keeping output read so far");
        }
        let captured = lock(&self.sink);
        (
            String::from_utf8_lossy(&captured.bytes).into_owned(),
            captured.truncated || timed_out,
        )
    }
}

/// Kills the child's process group when told to or when dropped.
struct ProcessGroup {
    #[cfg_attr(not(unix), allow(dead_code))]
    pgid: Option<u32>,
}

impl ProcessGroup {
    fn new(pid: Option<u32>) -> Self {
        Self { pgid: pid }
    }

    /// Best-effort SIGKILL to every member. Idempotent.
    fn kill(&mut self) {
        #[cfg(unix)]
        if let Some(pgid) = self.pgid.take()
            && let Ok(raw) = i32::try_from(pgid)
        {
            use nix::sys::signal::{Signal, killpg};
            use nix::unistd::Pid;
            match killpg(Pid::from_raw(raw), Signal::SIGKILL) {
                Ok(()) | Err(nix::errno::Errno::ESRCH) => {}
                Err(e) => warn!(pgid, error = %e, "failed to kill process group"),
            }
        }
        #[cfg(not(unix))]
        {
            // The child itself is covered by kill_on_drop.
            self.pgid = None;
        }
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}
