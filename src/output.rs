//! Output directory management
//!
//! The transcoder writes manifests and segments into one directory which is
//! served under `/stream/`. In single-stream mode the directory is purged before
//! every start; in multi-stream mode it is shared and only ever created.

use std::io;
use std::path::{Path, PathBuf};

use crate::registry::StreamIdentity;

/// URL prefix under which the output directory is served
pub const PUBLIC_PREFIX: &str = "/stream";

/// Handle to the directory holding generated HLS files
#[derive(Debug, Clone)]
pub struct OutputDir {
    root: PathBuf,
}

impl OutputDir {
    /// Create a handle; nothing is touched on disk until [`prepare`](Self::prepare)
    /// or [`ensure`](Self::ensure) is called
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory path on disk
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Purge or create the directory
    ///
    /// Every regular file directly inside an existing directory is removed.
    /// Failing to remove a single file is logged and skipped. A missing
    /// directory is created with its parents; failure to do so is returned.
    pub async fn prepare(&self) -> io::Result<()> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return tokio::fs::create_dir_all(&self.root).await;
            }
            Err(e) => return Err(e),
        };

        let mut removed = 0usize;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(dir = %self.root.display(), error = %e, "Failed to read output directory entry");
                    break;
                }
            };

            match entry.file_type().await {
                Ok(ft) if ft.is_file() => {}
                _ => continue,
            }

            let path = entry.path();
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "Failed to remove output file");
                }
            }
        }

        tracing::debug!(dir = %self.root.display(), removed, "Output directory purged");
        Ok(())
    }

    /// Create the directory if missing, leaving existing files alone
    ///
    /// Safe to call concurrently: `create_dir_all` succeeds when another caller
    /// won the race.
    pub async fn ensure(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    /// Manifest file name for a stream
    pub fn manifest_name(identity: &StreamIdentity) -> String {
        format!("{}.m3u8", identity)
    }

    /// Manifest location on disk
    pub fn manifest_path(&self, identity: &StreamIdentity) -> PathBuf {
        self.root.join(Self::manifest_name(identity))
    }

    /// Segment file pattern on disk, scoped to the identity so streams sharing
    /// the directory never overwrite each other
    ///
    /// Identities never contain `.`, so `<identity>.` is an unambiguous prefix.
    pub fn segment_pattern(&self, identity: &StreamIdentity) -> PathBuf {
        self.root.join(format!("{}.%05d.ts", identity))
    }

    /// Externally reachable manifest URL path
    pub fn public_url(identity: &StreamIdentity) -> String {
        format!("{}/{}", PUBLIC_PREFIX, Self::manifest_name(identity))
    }

    /// Remove the manifest and segments belonging to one identity
    ///
    /// Best-effort: errors are logged. Other streams' files are untouched.
    pub async fn remove_stream_files(&self, identity: &StreamIdentity) {
        let prefix = format!("{}.", identity);

        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(_) => return,
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };

            if !name.starts_with(&prefix) {
                continue;
            }

            if let Err(e) = tokio::fs::remove_file(entry.path()).await {
                tracing::warn!(file = name, error = %e, "Failed to remove stream file");
            }
        }
    }
}
