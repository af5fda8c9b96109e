//! Tokio-backed `ChildControl` implementation.
//!
//! Two background tasks are started per child:
//! - a stdin pump that drains an unbounded channel into the pipe, so writes
//!   never block the caller and stay ordered ahead of EOF
//! - a reaper that owns the `tokio::process::Child`, waits for exit and
//!   delivers direct signals

use std::io;
use std::process::ExitStatus;
use std::sync::Mutex;

use procward_core::{ChildControl, TerminationSignal};
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin};
use tokio::sync::{mpsc, watch};
use tracing::{debug, trace};

/// How a supervised child ended.
#[derive(Debug, Clone)]
pub enum ExitOutcome {
    /// The OS reported an exit status.
    Exited(ExitStatus),
    /// Waiting on the child failed; the process state is unknown.
    WaitFailed(String),
}

impl ExitOutcome {
    /// Exit code, if the process exited normally.
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Exited(status) => status.code(),
            Self::WaitFailed(_) => None,
        }
    }

    pub fn success(&self) -> bool {
        matches!(self, Self::Exited(status) if status.success())
    }
}

/// Handle to a spawned stdio child.
///
/// Obtained from [`StdioSpawner::spawn`](super::StdioSpawner::spawn).
pub struct ChildProcess {
    pid: Option<u32>,
    stdin: Mutex<Option<mpsc::UnboundedSender<String>>>,
    signals: mpsc::UnboundedSender<TerminationSignal>,
    exit: watch::Receiver<Option<ExitOutcome>>,
}

impl ChildProcess {
    /// Take ownership of a freshly spawned child and start its background tasks.
    ///
    /// All three stdio pipes must already have been taken from `child`; the
    /// reaper owns the child from here on.
    pub(crate) fn start(child: Child, stdin: ChildStdin) -> Self {
        let pid = child.id();

        let (stdin_tx, stdin_rx) = mpsc::unbounded_channel();
        tokio::spawn(pump_stdin(stdin, stdin_rx, pid));

        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (exit_tx, exit_rx) = watch::channel(None);
        tokio::spawn(reap(child, signal_rx, exit_tx, pid));

        Self {
            pid,
            stdin: Mutex::new(Some(stdin_tx)),
            signals: signal_tx,
            exit: exit_rx,
        }
    }

    /// Wait for the child to exit.
    ///
    /// Can be called any number of times, from any number of tasks.
    pub async fn wait(&self) -> ExitOutcome {
        let mut exit = self.exit.clone();
        let outcome = match exit.wait_for(Option::is_some).await {
            Ok(value) => value.clone(),
            Err(_) => None,
        };
        outcome.unwrap_or_else(|| ExitOutcome::WaitFailed("exit monitor stopped".to_string()))
    }

    /// Exit outcome, if the child has already exited.
    pub fn try_exit(&self) -> Option<ExitOutcome> {
        self.exit.borrow().clone()
    }

    fn stdin_sender(&self) -> std::sync::MutexGuard<'_, Option<mpsc::UnboundedSender<String>>> {
        self.stdin
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl ChildControl for ChildProcess {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn write_line(&self, line: &str) -> io::Result<()> {
        let guard = self.stdin_sender();
        let sender = guard
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "stdin already ended"))?;

        sender
            .send(format!("{line}\n"))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "stdin pipe is closed"))
    }

    fn end_stdin(&self) -> io::Result<()> {
        let sender = self
            .stdin_sender()
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "stdin already ended"))?;

        if sender.is_closed() {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "stdin pipe is closed"));
        }

        // Dropping the last sender lets the pump flush queued lines, then close
        drop(sender);
        Ok(())
    }

    fn signal(&self, signal: TerminationSignal) -> io::Result<()> {
        self.signals
            .send(signal)
            .map_err(|_| io::Error::new(io::ErrorKind::NotFound, "process already exited"))
    }

    fn has_exited(&self) -> bool {
        self.exit.borrow().is_some()
    }
}

async fn pump_stdin(
    mut stdin: ChildStdin,
    mut lines: mpsc::UnboundedReceiver<String>,
    pid: Option<u32>,
) {
    while let Some(line) = lines.recv().await {
        if let Err(e) = stdin.write_all(line.as_bytes()).await {
            debug!(?pid, error = %e, "stdin write failed, closing pump");
            return;
        }
        if let Err(e) = stdin.flush().await {
            debug!(?pid, error = %e, "stdin flush failed, closing pump");
            return;
        }
    }

    if let Err(e) = stdin.shutdown().await {
        trace!(?pid, error = %e, "stdin shutdown reported an error");
    }
    debug!(?pid, "stdin closed");
}

async fn reap(
    mut child: Child,
    mut signals: mpsc::UnboundedReceiver<TerminationSignal>,
    exit_tx: watch::Sender<Option<ExitOutcome>>,
    pid: Option<u32>,
) {
    let outcome = loop {
        tokio::select! {
            status = child.wait() => {
                break match status {
                    Ok(status) => ExitOutcome::Exited(status),
                    Err(e) => ExitOutcome::WaitFailed(e.to_string()),
                };
            }
            Some(signal) = signals.recv() => deliver_signal(&mut child, signal),
        }
    };

    debug!(?pid, ?outcome, "child exited");
    exit_tx.send_replace(Some(outcome));
}

fn deliver_signal(child: &mut Child, signal: TerminationSignal) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        if let Some(pid) = child.id() {
            let sig = match signal {
                TerminationSignal::Polite => Signal::SIGTERM,
                TerminationSignal::Forceful => Signal::SIGKILL,
            };
            if let Err(e) = kill(Pid::from_raw(pid as i32), sig) {
                debug!(pid, %signal, error = %e, "direct signal failed");
            }
            return;
        }
    }

    // No graceful equivalent outside POSIX; both map to TerminateProcess
    if let Err(e) = child.start_kill() {
        debug!(pid = ?child.id(), %signal, error = %e, "direct kill failed");
    }
}
