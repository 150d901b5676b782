//! Registry configuration

use std::path::PathBuf;
use std::time::Duration;

/// Stream multiplicity policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Exactly one stream; starting another replaces it
    #[default]
    Single,
    /// Many streams keyed by source URL; starts are idempotent
    Multi,
}

impl Mode {
    /// Restart policy used when none is configured explicitly
    pub fn default_restart_policy(self) -> RestartPolicy {
        match self {
            Mode::Single => RestartPolicy::After(DEFAULT_RESTART_DELAY),
            Mode::Multi => RestartPolicy::Never,
        }
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "single" => Ok(Mode::Single),
            "multi" => Ok(Mode::Multi),
            other => Err(format!("unknown mode `{}`, expected single or multi", other)),
        }
    }
}

/// What happens when a transcoder exits on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartPolicy {
    /// Drop the stream
    Never,
    /// Restart the same source after a delay
    After(Duration),
}

/// Delay before a crashed single-stream transcoder is restarted
pub const DEFAULT_RESTART_DELAY: Duration = Duration::from_secs(5);

/// Registry configuration options
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Single or multi-stream operation
    pub mode: Mode,

    /// Restart policy after an unrequested exit
    pub restart_policy: RestartPolicy,

    /// Directory the transcoder writes manifests and segments into
    pub output_dir: PathBuf,

    /// Transcoder binary
    pub ffmpeg_path: PathBuf,

    /// Target HLS segment duration in seconds
    pub hls_time: u32,

    /// Number of segments kept in the playlist
    pub hls_list_size: u32,

    /// Upper bound on waiting for a killed transcoder to be reaped before
    /// its replacement is spawned
    pub reap_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Single,
            restart_policy: Mode::Single.default_restart_policy(),
            output_dir: PathBuf::from("public/stream"),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            hls_time: 4,
            hls_list_size: 6,
            reap_timeout: Duration::from_secs(2),
        }
    }
}

impl RegistryConfig {
    /// Create a config for the given mode with that mode's restart policy
    pub fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            restart_policy: mode.default_restart_policy(),
            ..Default::default()
        }
    }

    /// Set the mode, resetting the restart policy to the mode's default
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self.restart_policy = mode.default_restart_policy();
        self
    }

    /// Override the restart policy
    pub fn restart_policy(mut self, policy: RestartPolicy) -> Self {
        self.restart_policy = policy;
        self
    }

    /// Set the output directory
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Set the transcoder binary
    pub fn ffmpeg_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffmpeg_path = path.into();
        self
    }

    /// Set segment duration (at least one second)
    pub fn hls_time(mut self, secs: u32) -> Self {
        self.hls_time = secs.max(1);
        self
    }

    /// Set playlist length (at least one segment)
    pub fn hls_list_size(mut self, size: u32) -> Self {
        self.hls_list_size = size.max(1);
        self
    }

    /// Set the reap timeout
    pub fn reap_timeout(mut self, timeout: Duration) -> Self {
        self.reap_timeout = timeout;
        self
    }
}
