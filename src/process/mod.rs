//! Transcoder process supervision
//!
//! Launches the external transcoder, forwards its output and reports its exit
//! as generation-tagged events. Restart policy lives in the registry; this
//! module only knows about individual children.

pub mod command;
pub mod event;
pub mod supervisor;

pub use command::{HlsOutput, TranscodeCommand};
pub use event::{ExitInfo, ProcessEvent};
pub use supervisor::{ProcessHandle, ProcessSupervisor, SpawnError, TRANSCODER_LOG_TARGET};
