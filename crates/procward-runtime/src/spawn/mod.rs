//! Spawning stdio-supervised children.
//!
//! `StdioSpawner` turns a `SpawnRequest` into a running child with all three
//! stdio streams piped. Standard input is wrapped by [`ChildProcess`], which is
//! what a `ProcessLifecycleSupervisor` drives; stdout and stderr are handed
//! back to the caller, who must keep draining them (see
//! [`SpawnedProcess::forward_output`]).

mod args;
mod child;
mod path;

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use procward_core::{ChildControl, OutputSink, SpawnError};
use tokio::process::{ChildStderr, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::stream::spawn_line_reader;

pub use args::{FormattedCommand, format_for_platform, format_subprocess_arguments};
pub use child::{ChildProcess, ExitOutcome};
pub use path::{build_effective_path, validate_working_dir};

/// What to start.
#[derive(Debug, Clone, Default)]
pub struct SpawnRequest {
    /// Program name or path. Bare names are resolved through PATH.
    pub program: String,
    pub args: Vec<String>,
    /// Working directory; inherits the parent's when `None`.
    pub cwd: Option<PathBuf>,
    /// Variables added on top of the inherited environment.
    pub env: Vec<(String, String)>,
    /// Extra PATH entries appended after the inherited PATH.
    pub path_extra: Option<String>,
}

impl SpawnRequest {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// A freshly spawned child.
///
/// `stdout` and `stderr` must stay open and be read for as long as the child
/// runs. Dropping either one closes the pipe, and a child that then writes to
/// it dies of `SIGPIPE` without ever seeing the shutdown sequence. Use
/// [`forward_output`](Self::forward_output) unless the caller consumes the
/// streams itself.
pub struct SpawnedProcess {
    /// Control handle; clone the `Arc` to hand it to a supervisor.
    pub process: Arc<ChildProcess>,
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
}

/// Reader tasks draining a child's output pipes.
///
/// Each resolves to the number of lines it forwarded once its pipe hits EOF.
pub struct OutputReaders {
    pub stdout: JoinHandle<usize>,
    pub stderr: JoinHandle<usize>,
}

impl SpawnedProcess {
    /// Drain stdout and stderr in background tasks, forwarding every line to
    /// `sink` (if any) and to `tracing`.
    pub fn forward_output(
        self,
        sink: Option<Arc<dyn OutputSink>>,
    ) -> (Arc<ChildProcess>, OutputReaders) {
        let pid = self.process.pid();
        let stdout = spawn_line_reader(self.stdout, pid, "stdout", sink.clone());
        let stderr = spawn_line_reader(self.stderr, pid, "stderr", sink);
        (self.process, OutputReaders { stdout, stderr })
    }
}

/// Starts stdio children.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdioSpawner;

impl StdioSpawner {
    pub const fn new() -> Self {
        Self
    }

    /// Spawn `request` with piped stdio.
    ///
    /// Must be called from within a Tokio runtime; the stdin pump and the
    /// reaper run as background tasks.
    pub fn spawn(&self, request: &SpawnRequest) -> Result<SpawnedProcess, SpawnError> {
        if let Some(cwd) = &request.cwd {
            validate_working_dir(cwd)?;
        }

        let formatted = format_subprocess_arguments(
            &request.program,
            &request.args,
            request.cwd.as_deref(),
            &request.env,
        );

        let base_path = request
            .env
            .iter()
            .rev()
            .find(|(key, _)| key.eq_ignore_ascii_case("PATH"))
            .map(|(_, value)| value.as_str());
        let effective_path = build_effective_path(
            formatted.program_path(),
            base_path,
            request.path_extra.as_deref(),
        );

        let mut command = build_command(&formatted);
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(cwd) = &request.cwd {
            command.current_dir(cwd);
        }

        for (key, value) in &request.env {
            if !key.eq_ignore_ascii_case("PATH") {
                command.env(key, value);
            }
        }
        command.env("PATH", &effective_path);

        let mut child = command.spawn().map_err(|source| SpawnError::Spawn {
            program: request.program.clone(),
            source,
        })?;

        let stdin = child.stdin.take().ok_or(SpawnError::MissingPipe("stdin"))?;
        let stdout = child.stdout.take().ok_or(SpawnError::MissingPipe("stdout"))?;
        let stderr = child.stderr.take().ok_or(SpawnError::MissingPipe("stderr"))?;

        debug!(
            program = %request.program,
            pid = ?child.id(),
            shell = formatted.shell,
            "spawned stdio child"
        );

        Ok(SpawnedProcess {
            process: Arc::new(ChildProcess::start(child, stdin)),
            stdout,
            stderr,
        })
    }
}

#[cfg(windows)]
fn build_command(formatted: &FormattedCommand) -> Command {
    if formatted.shell {
        // Same shape Node uses for shell mode: cmd /d /s /c "<line>"
        let mut line = formatted.executable.clone();
        for arg in &formatted.args {
            line.push(' ');
            line.push_str(arg);
        }
        let mut command = Command::new("cmd.exe");
        command.args(["/d", "/s", "/c"]).raw_arg(format!("\"{line}\""));
        return command;
    }

    let mut command = Command::new(&formatted.executable);
    command.args(&formatted.args);
    command
}

#[cfg(not(windows))]
fn build_command(formatted: &FormattedCommand) -> Command {
    let mut command = Command::new(&formatted.executable);
    command.args(&formatted.args);
    command
}
