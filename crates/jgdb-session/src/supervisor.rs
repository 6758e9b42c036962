//! Subprocess supervision.
//!
//! Spawns the debugger with piped stdio, runs a writer task that drains a
//! line queue into stdin, and reader tasks that forward stdout/stderr
//! chunks, in arrival order, into one channel the session loop consumes.
//! Signals are delivered by pid so they work regardless of what the input
//! queue is doing.

use std::path::Path;
use std::process::Stdio;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command as TokioCommand};
use tokio::sync::mpsc;

use crate::error::SessionError;

/// Capacity of the stdin line queue.
const WRITER_QUEUE: usize = 64;

/// Capacity of the output chunk queue.
const CHUNK_QUEUE: usize = 256;

/// Read buffer size for the output pumps.
const READ_BUF: usize = 4096;

/// A handle to the spawned debugger process.
///
/// Cloneable so packet handlers can send follow-up commands; the
/// underlying stdin is still written by a single task.
#[derive(Debug, Clone)]
pub struct GdbProcess {
    pid: Option<Pid>,
    writer_tx: mpsc::Sender<String>,
}

impl GdbProcess {
    /// Queue one line for stdin; a newline is appended on write.
    ///
    /// Fire-and-forget: a closed or saturated queue drops the line with a
    /// diagnostic. Subprocess exit is the sole liveness signal.
    pub fn send_line(&self, line: &str) {
        if let Err(e) = self.writer_tx.try_send(line.to_string()) {
            tracing::debug!("dropping line to subprocess stdin: {e}");
        }
    }

    /// Deliver SIGINT (user-initiated break). Safe at any time; a signal
    /// to an exited process is a no-op.
    pub fn interrupt(&self) {
        self.signal(Signal::SIGINT);
    }

    /// Deliver SIGTERM to end the process.
    pub fn terminate(&self) {
        self.signal(Signal::SIGTERM);
    }

    fn signal(&self, sig: Signal) {
        if let Some(pid) = self.pid {
            if let Err(e) = signal::kill(pid, sig) {
                tracing::debug!("signal {sig:?} to {pid:?} failed: {e}");
            }
        }
    }
}

/// The result of a successful spawn.
pub struct SpawnedProcess {
    /// Handle for writes and signals.
    pub process: GdbProcess,
    /// Combined stdout/stderr chunks, in arrival order.
    pub chunks: mpsc::Receiver<Vec<u8>>,
    /// The child handle; the session loop awaits its exit.
    pub child: Child,
}

/// Spawn the debugger and wire up its stdio.
///
/// Must be called within a tokio runtime. Returning `Ok` confirms the
/// process has launched.
///
/// # Errors
///
/// [`SessionError::SpawnFailed`] when the process cannot start or a
/// stdio handle cannot be captured.
pub fn spawn(path: &Path, args: &[String]) -> Result<SpawnedProcess, SessionError> {
    let mut child = TokioCommand::new(path)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| SessionError::SpawnFailed(format!("{}: {}", path.display(), e)))?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| SessionError::SpawnFailed("could not capture stdin".into()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| SessionError::SpawnFailed("could not capture stdout".into()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| SessionError::SpawnFailed("could not capture stderr".into()))?;

    // Writer task: drains the line queue into stdin.
    let (writer_tx, mut writer_rx) = mpsc::channel::<String>(WRITER_QUEUE);
    tokio::spawn(async move {
        let mut stdin = stdin;
        while let Some(line) = writer_rx.recv().await {
            if stdin.write_all(line.as_bytes()).await.is_err() {
                break;
            }
            if stdin.write_all(b"\n").await.is_err() {
                break;
            }
            if stdin.flush().await.is_err() {
                break;
            }
        }
    });

    // Reader tasks: both pipes feed one channel, so the session loop sees
    // chunks in arrival order. The channel closes when both pumps end.
    let (chunk_tx, chunk_rx) = mpsc::channel::<Vec<u8>>(CHUNK_QUEUE);
    tokio::spawn(pump(stdout, chunk_tx.clone()));
    tokio::spawn(pump(stderr, chunk_tx));

    let pid = child.id().map(|id| Pid::from_raw(id as i32));

    Ok(SpawnedProcess {
        process: GdbProcess { pid, writer_tx },
        chunks: chunk_rx,
        child,
    })
}

/// Forward everything a pipe produces into the chunk channel.
async fn pump<R>(mut reader: R, tx: mpsc::Sender<Vec<u8>>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; READ_BUF];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if tx.send(buf[..n].to_vec()).await.is_err() {
                    break;
                }
            }
        }
    }
}
