//! Stream entry and state types
//!
//! This module defines the per-stream state stored in the registry.

use std::path::PathBuf;
use std::time::Instant;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::process::ProcessHandle;
use crate::readiness::{ManifestOpenProbe, ReadinessProbe};

use super::identity::StreamIdentity;

/// Lifecycle state of a stream entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamState {
    /// Transcoder spawned, no playlist yet
    Starting,
    /// Playlist is being written
    Running,
    /// Transcoder exited, restart scheduled
    Restarting,
    /// No transcoder and no restart pending
    Stopped,
}

/// Entry for a single stream in the registry
pub struct StreamEntry {
    /// Registry key
    pub identity: StreamIdentity,

    /// Source being restreamed; fixed for the entry's lifetime
    pub source_url: String,

    /// Manifest location on disk
    pub output_path: PathBuf,

    /// Manifest URL path served to players
    pub output_url: String,

    /// Current transcoder, absent between exit and restart
    pub(super) process: Option<ProcessHandle>,

    /// Readiness detection for the current generation
    probe: Box<dyn ReadinessProbe>,

    /// Playlist observed for the current generation
    pub ready: bool,

    /// Generation of the most recently attached process
    pub generation: u64,

    /// Pending restart timer
    pub(super) restart: Option<CancellationToken>,

    /// Current lifecycle state
    pub state: StreamState,

    /// Automatic restarts performed so far
    pub restarts: u32,

    /// When the entry was created by a start
    pub started_at: Instant,
}

impl StreamEntry {
    /// Create an entry without a process
    pub(super) fn new(
        identity: StreamIdentity,
        source_url: String,
        output_path: PathBuf,
        output_url: String,
    ) -> Self {
        let probe = Box::new(ManifestOpenProbe::new(&manifest_name(&output_path)));

        Self {
            identity,
            source_url,
            output_path,
            output_url,
            process: None,
            probe,
            ready: false,
            generation: 0,
            restart: None,
            state: StreamState::Stopped,
            restarts: 0,
            started_at: Instant::now(),
        }
    }

    /// Whether a transcoder is attached
    pub fn has_process(&self) -> bool {
        self.process.is_some()
    }

    /// Process id of the attached transcoder
    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().and_then(ProcessHandle::pid)
    }

    /// Attach a freshly spawned process as the new generation
    pub(super) fn attach(&mut self, handle: ProcessHandle) {
        self.generation = handle.generation();
        self.process = Some(handle);
        self.probe = Box::new(ManifestOpenProbe::new(&manifest_name(&self.output_path)));
        self.ready = false;
        self.state = StreamState::Starting;
    }

    /// Detach the process after it exited
    ///
    /// Returns `false` for a stale generation, leaving the entry untouched.
    pub(super) fn detach(&mut self, generation: u64) -> bool {
        if !self.is_current(generation) {
            return false;
        }

        self.process = None;
        self.ready = false;
        self.state = StreamState::Stopped;
        true
    }

    /// Whether `generation` is the attached process
    pub(super) fn is_current(&self, generation: u64) -> bool {
        self.process.is_some() && self.generation == generation
    }

    /// Feed output of `generation` to the readiness probe
    ///
    /// Returns `true` when this chunk made the stream ready.
    pub(super) fn observe_output(&mut self, generation: u64, chunk: &[u8]) -> bool {
        if !self.is_current(generation) || self.probe.is_ready() {
            return false;
        }

        if self.probe.inspect(chunk).is_some() {
            self.ready = true;
            self.state = StreamState::Running;
            return true;
        }

        false
    }

    /// Cancel a pending restart; returns whether one was pending
    pub(super) fn cancel_restart(&mut self) -> bool {
        match self.restart.take() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Point-in-time snapshot
    pub fn status(&self) -> StreamStatus {
        StreamStatus {
            identity: self.identity.clone(),
            url: Some(self.source_url.clone()),
            output: Some(self.output_url.clone()),
            streaming: self.state != StreamState::Stopped,
            process_alive: self.has_process(),
            ready: self.ready,
            state: self.state,
            pid: self.pid(),
            generation: self.generation,
            restarts: self.restarts,
            uptime_secs: self.started_at.elapsed().as_secs(),
        }
    }
}

fn manifest_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Snapshot of one stream, as reported by status queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamStatus {
    pub identity: StreamIdentity,
    /// Source URL, `None` when nothing is configured
    pub url: Option<String>,
    /// Manifest URL path
    pub output: Option<String>,
    /// A source is configured (running, starting or about to restart)
    pub streaming: bool,
    /// A transcoder process is currently attached
    pub process_alive: bool,
    /// The current generation has started writing its playlist
    pub ready: bool,
    pub state: StreamState,
    pub pid: Option<u32>,
    pub generation: u64,
    pub restarts: u32,
    pub uptime_secs: u64,
}

impl StreamStatus {
    /// Status of an identity with no entry
    pub fn idle(identity: StreamIdentity) -> Self {
        Self {
            identity,
            url: None,
            output: None,
            streaming: false,
            process_alive: false,
            ready: false,
            state: StreamState::Stopped,
            pid: None,
            generation: 0,
            restarts: 0,
            uptime_secs: 0,
        }
    }
}
