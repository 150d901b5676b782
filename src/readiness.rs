//! Readiness detection from transcoder output
//!
//! ffmpeg's HLS muxer writes the playlist to `<manifest>.tmp` and renames it
//! into place; the first `Opening '...m3u8.tmp' for writing` line therefore
//! means a playlist with at least one segment is about to appear. This is a
//! heuristic: it says nothing about whether downstream players can actually
//! decode the stream.
//!
//! The registry only talks to [`ReadinessProbe`], so the text heuristic can be
//! swapped for something structural (e.g. polling for the manifest file).

/// Signal that a stream became playable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessEvent {
    /// The first playlist is being written
    ManifestOpened,
}

/// Inspects diagnostic output of one process generation
pub trait ReadinessProbe: Send {
    /// Feed a chunk of output; returns an event at most once per probe
    fn inspect(&mut self, chunk: &[u8]) -> Option<ReadinessEvent>;

    /// Whether readiness has been reported
    fn is_ready(&self) -> bool;
}

/// Partial lines longer than this are discarded
const MAX_CARRY: usize = 4 * 1024;

const OPENING: &str = "Opening";

/// Looks for ffmpeg opening the temporary manifest for writing
#[derive(Debug, Clone)]
pub struct ManifestOpenProbe {
    marker: String,
    carry: String,
    ready: bool,
}

impl ManifestOpenProbe {
    /// Probe for the manifest named `manifest_name` (e.g. `index.m3u8`)
    pub fn new(manifest_name: &str) -> Self {
        Self {
            marker: format!("{}.tmp", manifest_name),
            carry: String::new(),
            ready: false,
        }
    }

    fn matches(&self, line: &str) -> bool {
        line.contains(OPENING) && line.contains(&self.marker)
    }
}

impl ReadinessProbe for ManifestOpenProbe {
    fn inspect(&mut self, chunk: &[u8]) -> Option<ReadinessEvent> {
        if self.ready {
            return None;
        }

        self.carry.push_str(&String::from_utf8_lossy(chunk));

        // ffmpeg ends progress lines with '\r' and log lines with '\n'
        let complete = match self.carry.rfind(['\n', '\r']) {
            Some(pos) => pos + 1,
            None => 0,
        };

        let found = self.carry[..complete]
            .split(['\n', '\r'])
            .any(|line| self.matches(line))
            || self.matches(&self.carry[complete..]);

        if found {
            self.ready = true;
            self.carry.clear();
            return Some(ReadinessEvent::ManifestOpened);
        }

        self.carry.drain(..complete);
        if self.carry.len() > MAX_CARRY {
            self.carry.clear();
        }

        None
    }

    fn is_ready(&self) -> bool {
        self.ready
    }
}
