//! Registry error types
//!
//! Errors surfaced synchronously by registry operations. Everything that happens
//! after a transcoder has been spawned is asynchronous and only shows up in
//! status snapshots and logs.

use std::path::PathBuf;

use crate::process::SpawnError;

/// Reasons a source URL is refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlError {
    /// No URL was supplied
    #[error("URL is empty")]
    Empty,
    /// The string is not an absolute URL
    #[error("URL could not be parsed: {0}")]
    Unparseable(String),
    /// Only http and https sources are accepted
    #[error("unsupported scheme `{0}`, expected http or https")]
    UnsupportedScheme(String),
    /// The URL has no host component
    #[error("URL has no host")]
    MissingHost,
    /// Single-stream sources must point at a playlist or transport stream
    #[error("URL must end in .m3u8 or .ts")]
    UnsupportedSuffix,
    /// The derived identity would not fit in a file name
    #[error("URL is too long to derive a stream name ({0} characters)")]
    IdentityTooLong(usize),
}

/// Error type for registry operations
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Malformed or disallowed source URL; never retried
    #[error("invalid source URL: {0}")]
    InvalidInput(#[from] UrlError),

    /// The transcoder could not be launched; never retried
    #[error(transparent)]
    Spawn(#[from] SpawnError),

    /// The output directory could not be created
    #[error("failed to prepare output directory {}: {source}", path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The request needs a source URL in the current mode
    #[error("a source URL is required in multi-stream mode")]
    UrlRequired,
}
