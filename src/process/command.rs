//! Transcoder command lines
//!
//! The transcoder is treated as an opaque program with a fixed argument
//! template per mode. Single-stream sources get ffmpeg's reconnect flags so a
//! flaky upstream does not immediately end the process.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// Where and how the HLS output is written
#[derive(Debug, Clone)]
pub struct HlsOutput {
    /// Manifest path (`.m3u8`)
    pub manifest: PathBuf,
    /// Segment file pattern with a printf-style counter
    pub segment_pattern: PathBuf,
    /// Segment duration in seconds
    pub hls_time: u32,
    /// Playlist length in segments
    pub hls_list_size: u32,
}

/// A program plus its arguments, ready to be spawned
#[derive(Debug, Clone)]
pub struct TranscodeCommand {
    program: PathBuf,
    args: Vec<OsString>,
}

impl TranscodeCommand {
    /// Start an empty command line for `program`
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_owned());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_owned()));
        self
    }

    /// ffmpeg restream template: copy video, re-encode audio to AAC, write HLS
    ///
    /// `reconnect` adds the HTTP reconnect options used for the single long-lived
    /// stream.
    pub fn hls_restream(
        program: impl Into<PathBuf>,
        source_url: &str,
        output: &HlsOutput,
        reconnect: bool,
    ) -> Self {
        let mut cmd = Self::new(program);

        if reconnect {
            cmd = cmd.args([
                "-reconnect",
                "1",
                "-reconnect_streamed",
                "1",
                "-reconnect_delay_max",
                "10",
            ]);
        }

        cmd.arg("-i")
            .arg(source_url)
            .args(["-c:v", "copy", "-c:a", "aac", "-f", "hls"])
            .arg("-hls_time")
            .arg(output.hls_time.to_string())
            .arg("-hls_list_size")
            .arg(output.hls_list_size.to_string())
            .args(["-hls_flags", "delete_segments"])
            .arg("-hls_segment_filename")
            .arg(&output.segment_pattern)
            .arg(&output.manifest)
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }
}
