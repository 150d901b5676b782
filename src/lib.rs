//! Local HLS restreaming of remote live sources
//!
//! `hls-restream` takes a remote `.m3u8` or `.ts` URL and republishes it as a
//! local HLS stream by supervising an `ffmpeg` child process. The interesting
//! part is the lifecycle: starting, replacing, restarting and tearing down
//! transcoders while concurrent control requests arrive.
//!
//! # Architecture
//!
//! ```text
//!        HTTP (axum)                          Arc<StreamRegistry>
//!   POST /start, /restream  ──────────►  ┌──────────────────────────┐
//!   POST /stop, GET /status              │ Mutex<HashMap<Identity,  │
//!                                        │   StreamEntry>>          │
//!                                        └─────┬──────────▲─────────┘
//!                                  spawn / kill│          │ ProcessEvent
//!                                              ▼          │ (generation tagged)
//!                                      ProcessSupervisor ─┘
//!                                              │
//!                                        ffmpeg children ──► OutputDir ──► GET /stream/*
//! ```
//!
//! Two modes exist:
//!
//! - [`Mode::Single`]: one stream at a time, a new start replaces the old one,
//!   crashes restart the same source after a delay.
//! - [`Mode::Multi`]: many streams keyed by an identity derived from the URL,
//!   idempotent starts, exited streams are dropped.
//!
//! # Example
//!
//! ```no_run
//! use hls_restream::{RegistryConfig, RestreamServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> hls_restream::Result<()> {
//!     let server = RestreamServer::new(ServerConfig::default(), RegistryConfig::default());
//!     server.run().await
//! }
//! ```

pub mod error;
pub mod output;
pub mod process;
pub mod readiness;
pub mod registry;
pub mod server;

#[cfg(all(test, unix))]
mod test_util;

pub use error::{Error, Result};
pub use output::OutputDir;
pub use process::{ExitInfo, ProcessEvent, ProcessHandle, ProcessSupervisor, TranscodeCommand};
pub use readiness::{ManifestOpenProbe, ReadinessEvent, ReadinessProbe};
pub use registry::{
    Mode, RegistryConfig, RegistryError, RestartPolicy, StartOutcome, StreamIdentity,
    StreamRegistry, StreamRequest, StreamState, StreamStatus, UrlError,
};
pub use server::{RestreamServer, ServerConfig};
