//! HTTP control interface
//!
//! ```text
//!   GET  /                  HTML form
//!   POST /restream          form field inputUrl, HTML response
//!   POST /start             {"url": ...}
//!   POST /stop              {"url": ...} (optional in single-stream mode)
//!   GET  /status            current stream or all streams
//!   GET  /status/{identity} one stream
//!   GET  /stream/*          manifests and segments
//! ```

pub mod config;
pub mod listener;
pub mod page;
pub mod routes;

pub use config::ServerConfig;
pub use listener::RestreamServer;
pub use routes::router;
