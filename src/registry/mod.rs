//! Stream registry: the control core
//!
//! The registry maps a [`StreamIdentity`] to the transcoder serving it and
//! enforces the single or multi-stream policy. Starts, stops, status queries
//! and process events all go through one lock, so entries are never observed
//! half-updated and two transcoders never race for the same output.
//!
//! # Architecture
//!
//! ```text
//!                          Arc<StreamRegistry>
//!                     ┌─────────────────────────┐
//!                     │ streams: HashMap<Id,    │
//!                     │   StreamEntry {         │
//!                     │     process, ready,     │
//!                     │     generation, restart │
//!                     │   }                     │
//!                     │ >                       │
//!                     └──────┬───────────▲──────┘
//!                            │           │
//!            start()/stop()  │           │  event task
//!                            ▼           │
//!                   ProcessSupervisor ───┘ Output / Exited { generation }
//! ```
//!
//! # Generations
//!
//! Every spawned transcoder gets a new generation number. Exit events and
//! restart timers carry the generation they belong to; anything that does not
//! match the entry's current generation is ignored, so a killed or replaced
//! transcoder can never tear down or resurrect its successor.

pub mod config;
pub mod entry;
pub mod error;
pub mod identity;
pub mod store;

pub use config::{Mode, RegistryConfig, RestartPolicy, DEFAULT_RESTART_DELAY};
pub use entry::{StreamEntry, StreamState, StreamStatus};
pub use error::{RegistryError, UrlError};
pub use identity::{StreamIdentity, StreamRequest, SINGLE_STREAM_IDENTITY};
pub use store::{StartOutcome, StreamRegistry};
