//! Transcoder process supervision
//!
//! Each spawned child is owned by a monitor task. The caller gets a
//! [`ProcessHandle`] that can request a kill and observe the exit, while output
//! and exit are reported as [`ProcessEvent`]s on the supervisor's channel.
//!
//! ```text
//!   spawn() ──► Child ──stderr──► reader task ──► Output { generation, chunk }
//!                 │                                           │
//!                 └──────────► monitor task ──► Exited { generation, exit }
//!                                 ▲                           │
//!   ProcessHandle::kill() ────────┘                           ▼
//!                                                      events channel
//! ```

use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::{mpsc, oneshot, watch};

use super::command::TranscodeCommand;
use super::event::{ExitInfo, ProcessEvent};
use crate::registry::StreamIdentity;

/// How long output is drained after the child exited before the reader is dropped
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Read size for the child's stderr
const READ_CHUNK: usize = 8 * 1024;

/// Log target for passthrough of transcoder output
pub const TRANSCODER_LOG_TARGET: &str = "hls_restream::transcoder";

/// The transcoder could not be launched
#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    /// The binary does not exist or is not on `PATH`
    #[error("transcoder binary not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Any other launch failure (permissions, resource limits)
    #[error("failed to launch {}: {source}", program.display())]
    Io {
        program: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SpawnError {
    fn from_io(program: PathBuf, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            SpawnError::NotFound(program)
        } else {
            SpawnError::Io {
                program,
                source: err,
            }
        }
    }
}

/// Caller-side handle to one supervised child
#[derive(Debug)]
pub struct ProcessHandle {
    generation: u64,
    pid: Option<u32>,
    kill: Option<oneshot::Sender<oneshot::Sender<()>>>,
    exit: watch::Receiver<Option<ExitInfo>>,
}

impl ProcessHandle {
    /// Generation number, unique per supervisor
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// OS process id at spawn time
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Forcefully kill the child
    ///
    /// Resolves once the signal has been sent, not when the child has exited;
    /// the exit is still reported asynchronously as an event. Returns `false`
    /// if the child had already exited or a kill was already requested.
    pub async fn kill(&mut self) -> bool {
        let Some(kill) = self.kill.take() else {
            return false;
        };

        let (ack_tx, ack_rx) = oneshot::channel();
        if kill.send(ack_tx).is_err() {
            return false;
        }

        ack_rx.await.is_ok()
    }

    /// Whether the exit has been observed
    pub fn has_exited(&self) -> bool {
        self.exit.borrow().is_some()
    }

    /// Wait for the child to exit
    pub async fn wait_exit(&mut self) -> Option<ExitInfo> {
        match self.exit.wait_for(Option::is_some).await {
            Ok(exit) => *exit,
            Err(_) => None,
        }
    }
}

/// Spawns transcoder children and reports their lifecycle
pub struct ProcessSupervisor {
    events: mpsc::UnboundedSender<ProcessEvent>,
    next_generation: AtomicU64,
    spawned: AtomicU64,
    live: Arc<AtomicUsize>,
}

impl ProcessSupervisor {
    /// Create a supervisor reporting to `events`
    pub fn new(events: mpsc::UnboundedSender<ProcessEvent>) -> Self {
        Self {
            events,
            next_generation: AtomicU64::new(1),
            spawned: AtomicU64::new(0),
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Launch `command` for `identity`
    ///
    /// Returns as soon as the OS has created the process.
    pub fn spawn(
        &self,
        identity: &StreamIdentity,
        command: &TranscodeCommand,
    ) -> Result<ProcessHandle, SpawnError> {
        let mut child = Command::new(command.program())
            .args(command.get_args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SpawnError::from_io(command.program().to_path_buf(), e))?;

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let pid = child.id();
        self.spawned.fetch_add(1, Ordering::Relaxed);
        self.live.fetch_add(1, Ordering::SeqCst);

        tracing::info!(
            stream = %identity,
            generation = generation,
            pid = ?pid,
            program = %command.program().display(),
            "Transcoder spawned"
        );

        let reader = child.stderr.take().map(|stderr| {
            tokio::spawn(forward_output(
                stderr,
                identity.clone(),
                generation,
                self.events.clone(),
            ))
        });

        let (kill_tx, kill_rx) = oneshot::channel();
        let (exit_tx, exit_rx) = watch::channel(None);

        tokio::spawn(monitor(
            child,
            identity.clone(),
            generation,
            kill_rx,
            exit_tx,
            reader,
            self.events.clone(),
            Arc::clone(&self.live),
        ));

        Ok(ProcessHandle {
            generation,
            pid,
            kill: Some(kill_tx),
            exit: exit_rx,
        })
    }

    /// Total number of children spawned
    pub fn spawned(&self) -> u64 {
        self.spawned.load(Ordering::Relaxed)
    }

    /// Number of children not yet reaped
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

#[allow(clippy::too_many_arguments)]
async fn monitor(
    mut child: Child,
    identity: StreamIdentity,
    generation: u64,
    mut kill_rx: oneshot::Receiver<oneshot::Sender<()>>,
    exit_tx: watch::Sender<Option<ExitInfo>>,
    reader: Option<tokio::task::JoinHandle<()>>,
    events: mpsc::UnboundedSender<ProcessEvent>,
    live: Arc<AtomicUsize>,
) {
    let status = tokio::select! {
        status = child.wait() => status,
        Ok(ack) = &mut kill_rx => {
            if let Err(e) = child.start_kill() {
                tracing::warn!(stream = %identity, generation = generation, error = %e, "Failed to kill transcoder");
            }
            let _ = ack.send(());
            child.wait().await
        }
    };

    let exit = match status {
        Ok(status) => ExitInfo::from_status(status),
        Err(e) => {
            tracing::warn!(stream = %identity, generation = generation, error = %e, "Failed to wait for transcoder");
            ExitInfo::default()
        }
    };

    live.fetch_sub(1, Ordering::SeqCst);
    let _ = exit_tx.send(Some(exit));

    // keep Output events ahead of Exited
    if let Some(mut reader) = reader {
        if tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, &mut reader)
            .await
            .is_err()
        {
            reader.abort();
        }
    }

    let _ = events.send(ProcessEvent::Exited {
        identity,
        generation,
        exit,
    });
}

async fn forward_output(
    mut stderr: ChildStderr,
    identity: StreamIdentity,
    generation: u64,
    events: mpsc::UnboundedSender<ProcessEvent>,
) {
    let mut buf = BytesMut::with_capacity(READ_CHUNK);

    loop {
        buf.reserve(READ_CHUNK);
        match stderr.read_buf(&mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let chunk = buf.split().freeze();

                tracing::debug!(
                    target: TRANSCODER_LOG_TARGET,
                    stream = %identity,
                    generation = generation,
                    "{}",
                    String::from_utf8_lossy(&chunk).trim_end()
                );

                // Keep draining even if nobody listens, or the child blocks on a full pipe
                let _ = events.send(ProcessEvent::Output {
                    identity: identity.clone(),
                    generation,
                    chunk,
                });
            }
            Err(e) => {
                tracing::debug!(stream = %identity, generation = generation, error = %e, "Transcoder output closed");
                break;
            }
        }
    }
}
