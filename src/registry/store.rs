//! Stream registry implementation
//!
//! The central registry that owns every supervised transcoder. All mutation,
//! including the handling of asynchronous process events, happens under one
//! `tokio::sync::Mutex`, so a status snapshot never sees a half-applied change.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::output::OutputDir;
use crate::process::{HlsOutput, ProcessEvent, ProcessSupervisor, TranscodeCommand};

use super::config::{Mode, RegistryConfig, RestartPolicy};
use super::entry::{StreamEntry, StreamState, StreamStatus};
use super::error::RegistryError;
use super::identity::{StreamIdentity, StreamRequest};

/// Result of an accepted start request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartOutcome {
    pub identity: StreamIdentity,
    /// Normalized source URL
    pub url: String,
    /// Manifest URL path served to players
    pub output: String,
    /// Manifest location on disk
    #[serde(skip)]
    pub manifest_path: PathBuf,
    /// The stream was already running and nothing was spawned
    pub already_running: bool,
    /// Generation of the transcoder serving the stream
    pub generation: u64,
}

impl StartOutcome {
    fn from_entry(entry: &StreamEntry, already_running: bool) -> Self {
        Self {
            identity: entry.identity.clone(),
            url: entry.source_url.clone(),
            output: entry.output_url.clone(),
            manifest_path: entry.output_path.clone(),
            already_running,
            generation: entry.generation,
        }
    }
}

/// Central registry for all restreamed sources
pub struct StreamRegistry {
    /// Map of identity to entry; the single serialization point
    streams: Mutex<HashMap<StreamIdentity, StreamEntry>>,

    supervisor: ProcessSupervisor,

    output: OutputDir,

    /// Process events, taken by [`spawn_event_task`](Self::spawn_event_task)
    events: std::sync::Mutex<Option<mpsc::UnboundedReceiver<ProcessEvent>>>,

    config: RegistryConfig,
}

impl StreamRegistry {
    /// Create a new stream registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new stream registry with custom configuration
    ///
    /// Process events are buffered until [`spawn_event_task`](Self::spawn_event_task)
    /// takes the receiver; without it nothing is ever marked ready or restarted,
    /// and transcoder output accumulates in memory.
    pub fn with_config(config: RegistryConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        Self {
            streams: Mutex::new(HashMap::new()),
            supervisor: ProcessSupervisor::new(tx),
            output: OutputDir::new(config.output_dir.clone()),
            events: std::sync::Mutex::new(Some(rx)),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Directory the transcoders write into
    pub fn output_dir(&self) -> &OutputDir {
        &self.output
    }

    /// Process supervisor (spawn and live counters)
    pub fn supervisor(&self) -> &ProcessSupervisor {
        &self.supervisor
    }

    /// Start restreaming `raw_url`
    ///
    /// Single-stream mode replaces whatever is running: the pending restart is
    /// cancelled, the old transcoder killed, the output directory purged and a
    /// new transcoder spawned. Multi-stream mode returns the existing output
    /// when the source is already running.
    ///
    /// Invalid URLs are rejected before any state is touched.
    pub async fn start(&self, raw_url: &str) -> Result<StartOutcome, RegistryError> {
        let request = StreamRequest::parse(raw_url, self.config.mode)?;

        let mut streams = self.streams.lock().await;
        match self.config.mode {
            Mode::Single => self.replace(&mut streams, &request).await,
            Mode::Multi => self.start_multi(&mut streams, &request).await,
        }
    }

    async fn replace(
        &self,
        streams: &mut HashMap<StreamIdentity, StreamEntry>,
        request: &StreamRequest,
    ) -> Result<StartOutcome, RegistryError> {
        for (_, mut old) in streams.drain() {
            old.cancel_restart();
            self.terminate(&mut old).await;
            tracing::info!(
                stream = %old.identity,
                url = %old.source_url,
                "Replacing active stream"
            );
        }

        self.prepare_output().await?;

        let mut entry = self.new_entry(request);
        self.spawn_into(&mut entry)?;

        let outcome = StartOutcome::from_entry(&entry, false);
        streams.insert(entry.identity.clone(), entry);

        tracing::info!(
            stream = %outcome.identity,
            url = %outcome.url,
            generation = outcome.generation,
            "Restream started"
        );

        Ok(outcome)
    }

    async fn start_multi(
        &self,
        streams: &mut HashMap<StreamIdentity, StreamEntry>,
        request: &StreamRequest,
    ) -> Result<StartOutcome, RegistryError> {
        if let Some(entry) = streams.get_mut(request.identity()) {
            if entry.has_process() {
                tracing::debug!(stream = %entry.identity, "Stream already running");
                return Ok(StartOutcome::from_entry(entry, true));
            }

            // exited with a restart pending; an explicit start wins
            entry.cancel_restart();
            let result = match self.prepare_output().await {
                Ok(()) => self.spawn_into(entry),
                Err(e) => Err(e),
            };

            return match result {
                Ok(_) => Ok(StartOutcome::from_entry(entry, false)),
                Err(e) => {
                    // the restart is cancelled, nothing would revive the entry
                    streams.remove(request.identity());
                    tracing::warn!(stream = %request.identity(), error = %e, "Start failed, dropping stream");
                    Err(e)
                }
            };
        }

        self.prepare_output().await?;

        let mut entry = self.new_entry(request);
        self.spawn_into(&mut entry)?;

        let outcome = StartOutcome::from_entry(&entry, false);
        streams.insert(entry.identity.clone(), entry);

        tracing::info!(
            stream = %outcome.identity,
            url = %outcome.url,
            generation = outcome.generation,
            streams = streams.len(),
            "Restream started"
        );

        Ok(outcome)
    }

    /// Stop a stream and remove it from the registry
    ///
    /// Returns `false` if no such stream exists.
    pub async fn stop(&self, identity: &StreamIdentity) -> bool {
        let mut streams = self.streams.lock().await;

        let Some(mut entry) = streams.remove(identity) else {
            return false;
        };

        entry.cancel_restart();
        self.terminate(&mut entry).await;

        match self.config.mode {
            Mode::Single => {
                if let Err(e) = self.output.prepare().await {
                    tracing::warn!(error = %e, "Failed to purge output directory");
                }
            }
            Mode::Multi => self.output.remove_stream_files(identity).await,
        }

        tracing::info!(stream = %identity, url = %entry.source_url, "Restream stopped");
        true
    }

    /// Stop by source URL
    ///
    /// Single-stream mode stops the active stream and ignores `url`;
    /// multi-stream mode needs the URL to derive the identity.
    pub async fn stop_source(&self, url: Option<&str>) -> Result<bool, RegistryError> {
        let identity = match (self.config.mode, url) {
            (Mode::Single, _) => StreamIdentity::single(),
            (Mode::Multi, Some(url)) => StreamRequest::parse(url, Mode::Multi)?.identity().clone(),
            (Mode::Multi, None) => return Err(RegistryError::UrlRequired),
        };

        Ok(self.stop(&identity).await)
    }

    /// Stop every stream
    pub async fn shutdown(&self) {
        let mut streams = self.streams.lock().await;

        for (_, mut entry) in streams.drain() {
            entry.cancel_restart();
            self.terminate(&mut entry).await;
        }

        tracing::info!("All restreams stopped");
    }

    /// Snapshot of one stream
    pub async fn status(&self, identity: &StreamIdentity) -> Option<StreamStatus> {
        self.streams.lock().await.get(identity).map(StreamEntry::status)
    }

    /// Snapshot of the single stream (idle if none)
    pub async fn current(&self) -> StreamStatus {
        let streams = self.streams.lock().await;

        streams
            .values()
            .next()
            .map(StreamEntry::status)
            .unwrap_or_else(|| StreamStatus::idle(StreamIdentity::single()))
    }

    /// Snapshots of all streams, ordered by identity
    pub async fn status_all(&self) -> Vec<StreamStatus> {
        let streams = self.streams.lock().await;

        let mut all: Vec<StreamStatus> = streams.values().map(StreamEntry::status).collect();
        all.sort_by(|a, b| a.identity.as_str().cmp(b.identity.as_str()));
        all
    }

    /// Get total number of streams
    pub async fn stream_count(&self) -> usize {
        self.streams.lock().await.len()
    }

    /// Spawn the task applying process events to the registry
    ///
    /// Must be called once from within a tokio runtime. The task holds only a
    /// weak reference and ends when the registry is dropped.
    pub fn spawn_event_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let receiver = self
            .events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        let registry = Arc::downgrade(self);

        tokio::spawn(async move {
            let Some(mut receiver) = receiver else {
                tracing::warn!("Registry event task already running");
                return;
            };

            while let Some(event) = receiver.recv().await {
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                registry.handle_event(event).await;
            }
        })
    }

    /// Apply one process event
    pub async fn handle_event(self: &Arc<Self>, event: ProcessEvent) {
        let mut streams = self.streams.lock().await;

        match event {
            ProcessEvent::Output {
                identity,
                generation,
                chunk,
            } => {
                if let Some(entry) = streams.get_mut(&identity) {
                    if entry.observe_output(generation, &chunk) {
                        tracing::info!(
                            stream = %identity,
                            generation = generation,
                            output = %entry.output_url,
                            "Local HLS stream ready for playback"
                        );
                    }
                }
            }
            ProcessEvent::Exited {
                identity,
                generation,
                exit,
            } => {
                let Some(entry) = streams.get_mut(&identity) else {
                    tracing::debug!(stream = %identity, generation = generation, "Exit of removed stream ignored");
                    return;
                };

                if !entry.detach(generation) {
                    tracing::debug!(
                        stream = %identity,
                        generation = generation,
                        current = entry.generation,
                        "Exit of superseded transcoder ignored"
                    );
                    return;
                }

                if exit.success() {
                    tracing::info!(stream = %identity, generation = generation, %exit, "Transcoder exited");
                } else {
                    tracing::warn!(stream = %identity, generation = generation, %exit, "Transcoder exited");
                }

                match self.config.restart_policy {
                    RestartPolicy::After(delay) => {
                        let token = CancellationToken::new();
                        entry.restart = Some(token.clone());
                        entry.state = StreamState::Restarting;

                        tracing::info!(
                            stream = %identity,
                            delay_ms = delay.as_millis() as u64,
                            "Restart scheduled"
                        );

                        schedule_restart(Arc::downgrade(self), identity, generation, delay, token);
                    }
                    RestartPolicy::Never => {
                        streams.remove(&identity);
                        tracing::info!(stream = %identity, "Stream removed after exit");
                    }
                }
            }
        }
    }

    /// Restart `identity` if `generation` is still its latest, exited process
    async fn restart(&self, identity: &StreamIdentity, generation: u64, token: &CancellationToken) {
        let mut streams = self.streams.lock().await;

        if token.is_cancelled() {
            return;
        }

        let Some(entry) = streams.get_mut(identity) else {
            return;
        };

        if entry.generation != generation || entry.has_process() {
            tracing::debug!(stream = %identity, generation = generation, "Stale restart ignored");
            return;
        }

        entry.restart = None;
        entry.restarts += 1;

        tracing::info!(
            stream = %identity,
            url = %entry.source_url,
            attempt = entry.restarts,
            "Restarting transcoder"
        );

        let result = match self.prepare_output().await {
            Ok(()) => self.spawn_into(entry).map(|_| ()),
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            tracing::error!(stream = %identity, error = %e, "Restart failed, dropping stream");
            streams.remove(identity);
        }
    }

    fn new_entry(&self, request: &StreamRequest) -> StreamEntry {
        let identity = request.identity().clone();
        StreamEntry::new(
            identity.clone(),
            request.source_url().to_string(),
            self.output.manifest_path(&identity),
            OutputDir::public_url(&identity),
        )
    }

    async fn prepare_output(&self) -> Result<(), RegistryError> {
        let result = match self.config.mode {
            Mode::Single => self.output.prepare().await,
            Mode::Multi => self.output.ensure().await,
        };

        result.map_err(|source| RegistryError::Directory {
            path: self.output.path().to_path_buf(),
            source,
        })
    }

    fn spawn_into(&self, entry: &mut StreamEntry) -> Result<u64, RegistryError> {
        if self.events_pending() {
            tracing::warn!(
                stream = %entry.identity,
                "Spawning transcoder without a registry event task; output is buffered unread"
            );
        }

        let output = HlsOutput {
            manifest: entry.output_path.clone(),
            segment_pattern: self.output.segment_pattern(&entry.identity),
            hls_time: self.config.hls_time,
            hls_list_size: self.config.hls_list_size,
        };
        let command = TranscodeCommand::hls_restream(
            &self.config.ffmpeg_path,
            &entry.source_url,
            &output,
            self.config.mode == Mode::Single,
        );

        let handle = self.supervisor.spawn(&entry.identity, &command)?;
        entry.attach(handle);
        Ok(entry.generation)
    }

    /// Whether the event receiver has not been taken yet
    fn events_pending(&self) -> bool {
        self.events
            .lock()
            .map(|events| events.is_some())
            .unwrap_or(false)
    }

    /// Kill the entry's process and wait (bounded) until it is reaped
    async fn terminate(&self, entry: &mut StreamEntry) {
        let Some(mut handle) = entry.process.take() else {
            entry.ready = false;
            entry.state = StreamState::Stopped;
            return;
        };

        entry.ready = false;
        entry.state = StreamState::Stopped;

        handle.kill().await;
        if tokio::time::timeout(self.config.reap_timeout, handle.wait_exit())
            .await
            .is_err()
        {
            tracing::warn!(
                stream = %entry.identity,
                generation = handle.generation(),
                "Killed transcoder not reaped in time"
            );
        }
    }
}

impl Default for StreamRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn schedule_restart(
    registry: Weak<StreamRegistry>,
    identity: StreamIdentity,
    generation: u64,
    delay: Duration,
    token: CancellationToken,
) {
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }

        if let Some(registry) = registry.upgrade() {
            registry.restart(&identity, generation, &token).await;
        }
    });
}

#[cfg(all(test, unix))]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::registry::UrlError;
    use crate::test_util::{eventually, write_fake_ffmpeg, ALWAYS_CRASH, CRASH_ONCE, LONG_RUNNING};

    const URL_A: &str = "https://example.com/a.m3u8";
    const URL_B: &str = "https://example.com/b.m3u8";

    struct Fixture {
        dir: TempDir,
        registry: Arc<StreamRegistry>,
    }

    impl Fixture {
        fn new(mode: Mode, body: &str, policy: RestartPolicy) -> Self {
            let dir = TempDir::new().unwrap();
            let ffmpeg = write_fake_ffmpeg(dir.path(), body);

            let config = RegistryConfig::with_mode(mode)
                .restart_policy(policy)
                .output_dir(dir.path().join("stream"))
                .ffmpeg_path(ffmpeg);
            let registry = Arc::new(StreamRegistry::with_config(config));
            registry.spawn_event_task();

            Self { dir, registry }
        }

        fn invocations(&self) -> Vec<String> {
            std::fs::read_to_string(self.dir.path().join("invocations.log"))
                .unwrap_or_default()
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    #[tokio::test]
    async fn test_invalid_url_spawns_nothing() {
        let fx = Fixture::new(Mode::Single, LONG_RUNNING, RestartPolicy::Never);
        let registry = &fx.registry;

        let err = registry.start("https://example.com/a.mp4").await.unwrap_err();
        assert!(matches!(
            err,
            RegistryError::InvalidInput(UrlError::UnsupportedSuffix)
        ));
        let err = registry.start("example.com/a.m3u8").await.unwrap_err();
        assert!(matches!(err, RegistryError::InvalidInput(_)));

        assert_eq!(registry.supervisor().spawned(), 0);
        assert_eq!(registry.stream_count().await, 0);
        // the output directory is not even created
        assert!(!registry.output_dir().path().exists());
    }

    #[tokio::test]
    async fn test_invalid_url_leaves_running_stream_untouched() {
        let fx = Fixture::new(Mode::Single, LONG_RUNNING, RestartPolicy::Never);
        let registry = &fx.registry;

        registry.start(URL_A).await.unwrap();
        eventually("ready", || async move { registry.current().await.ready }).await;
        let before = registry.current().await;

        let err = registry.start("https://example.com/b.mp4").await.unwrap_err();
        assert!(matches!(err, RegistryError::InvalidInput(_)));

        let after = registry.current().await;
        assert_eq!(after.url.as_deref(), Some(URL_A));
        assert_eq!(after.generation, before.generation);
        assert_eq!(after.pid, before.pid);
        assert!(after.ready);
        assert_eq!(registry.supervisor().spawned(), 1);
        assert_eq!(registry.supervisor().live(), 1);
    }

    #[tokio::test]
    async fn test_single_start_spawns_with_source_and_becomes_ready() {
        let fx = Fixture::new(Mode::Single, LONG_RUNNING, RestartPolicy::Never);
        let registry = &fx.registry;

        let outcome = registry.start(URL_A).await.unwrap();
        assert_eq!(outcome.output, "/stream/index.m3u8");
        assert!(!outcome.already_running);

        let status = registry.current().await;
        assert!(status.streaming);
        assert_eq!(status.url.as_deref(), Some(URL_A));

        eventually("readiness", || async move { registry.current().await.ready }).await;
        assert_eq!(registry.current().await.state, StreamState::Running);

        let invocations = fx.invocations();
        assert_eq!(invocations.len(), 1);
        assert!(invocations[0].contains(&format!("-i {}", URL_A)));
        assert!(invocations[0].contains("-reconnect 1"));

        registry.shutdown().await;
        assert_eq!(registry.supervisor().live(), 0);
    }

    #[tokio::test]
    async fn test_replace_kills_previous_before_spawning() {
        let fx = Fixture::new(Mode::Single, LONG_RUNNING, RestartPolicy::After(Duration::from_millis(100)));
        let registry = &fx.registry;

        let first = registry.start(URL_A).await.unwrap();
        let second = registry.start(URL_B).await.unwrap();

        assert!(second.generation > first.generation);
        assert_eq!(registry.supervisor().spawned(), 2);
        assert_eq!(registry.supervisor().live(), 1);

        // the killed generation must not trigger a restart
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(registry.supervisor().spawned(), 2);

        let status = registry.current().await;
        assert_eq!(status.url.as_deref(), Some(URL_B));
        assert_eq!(status.generation, second.generation);
        assert!(status.process_alive);

        registry.shutdown().await;
    }

    #[tokio::test]
    async fn test_concurrent_single_starts_leave_one_process() {
        let fx = Fixture::new(Mode::Single, LONG_RUNNING, RestartPolicy::Never);
        let registry = &fx.registry;

        let (a, b, c) = tokio::join!(
            registry.start(URL_A),
            registry.start(URL_B),
            registry.start("https://example.com/c.ts"),
        );
        assert!(a.is_ok() && b.is_ok() && c.is_ok());

        assert_eq!(registry.stream_count().await, 1);
        assert_eq!(registry.supervisor().spawned(), 3);
        assert_eq!(registry.supervisor().live(), 1);

        registry.shutdown().await;
    }

    #[tokio::test]
    async fn test_single_start_purges_output_directory() {
        let fx = Fixture::new(Mode::Single, LONG_RUNNING, RestartPolicy::Never);
        let registry = &fx.registry;
        let stale = registry.output_dir().path().join("index.00042.ts");
        std::fs::create_dir_all(registry.output_dir().path()).unwrap();
        std::fs::write(&stale, b"old").unwrap();

        registry.start(URL_A).await.unwrap();

        assert!(!stale.exists());
        registry.shutdown().await;
    }

    #[tokio::test]
    async fn test_crash_restarts_same_source() {
        let fx = Fixture::new(
            Mode::Single,
            CRASH_ONCE,
            RestartPolicy::After(Duration::from_secs(2)),
        );
        let registry = &fx.registry;

        let outcome = registry.start(URL_A).await.unwrap();

        eventually("restart scheduled", || async move {
            registry.current().await.state == StreamState::Restarting
        })
        .await;

        let gap = registry.current().await;
        assert!(gap.streaming);
        assert!(!gap.ready);
        assert!(!gap.process_alive);
        assert_eq!(gap.url.as_deref(), Some(URL_A));

        eventually("second spawn", || async move {
            registry.supervisor().spawned() == 2
        })
        .await;

        let status = registry.current().await;
        assert!(status.streaming);
        assert_eq!(status.restarts, 1);
        assert!(status.generation > outcome.generation);

        eventually("ready after restart", || async move { registry.current().await.ready }).await;

        let invocations = fx.invocations();
        assert_eq!(invocations.len(), 2);
        assert!(invocations.iter().all(|args| args.contains(URL_A)));

        registry.shutdown().await;
    }

    #[tokio::test]
    async fn test_replacement_cancels_pending_restart() {
        let fx = Fixture::new(
            Mode::Single,
            CRASH_ONCE,
            RestartPolicy::After(Duration::from_secs(2)),
        );
        let registry = &fx.registry;

        registry.start(URL_A).await.unwrap();
        eventually("restart scheduled", || async move {
            registry.current().await.state == StreamState::Restarting
        })
        .await;

        registry.start(URL_B).await.unwrap();

        // well past the restart delay of the crashed stream
        tokio::time::sleep(Duration::from_millis(600)).await;

        assert_eq!(registry.supervisor().spawned(), 2);
        assert_eq!(registry.supervisor().live(), 1);
        let status = registry.current().await;
        assert_eq!(status.url.as_deref(), Some(URL_B));
        assert_eq!(status.restarts, 0);

        let invocations = fx.invocations();
        assert!(invocations[1].contains(URL_B));

        registry.shutdown().await;
    }

    #[tokio::test]
    async fn test_stale_restart_is_ignored() {
        let fx = Fixture::new(Mode::Single, LONG_RUNNING, RestartPolicy::Never);
        let registry = &fx.registry;

        let outcome = registry.start(URL_A).await.unwrap();

        // a timer from an older generation firing after the token was left uncancelled
        let token = CancellationToken::new();
        registry
            .restart(&StreamIdentity::single(), outcome.generation - 1, &token)
            .await;
        // a cancelled timer for the current generation
        token.cancel();
        registry
            .restart(&StreamIdentity::single(), outcome.generation, &token)
            .await;

        assert_eq!(registry.supervisor().spawned(), 1);
        assert_eq!(registry.current().await.restarts, 0);

        registry.shutdown().await;
    }

    #[tokio::test]
    async fn test_multi_start_is_idempotent() {
        let fx = Fixture::new(Mode::Multi, LONG_RUNNING, RestartPolicy::Never);
        let registry = &fx.registry;
        let url = "https://example.com/live/channel.mp4";

        let (a, b) = tokio::join!(registry.start(url), registry.start(url));
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(a.output, b.output);
        assert_eq!(a.identity, b.identity);
        assert!(a.already_running ^ b.already_running);
        assert_eq!(registry.supervisor().spawned(), 1);
        assert_eq!(a.output, format!("/stream/{}.m3u8", StreamIdentity::for_url(url)));

        let fx = &fx;
        eventually("invocation", || async move { !fx.invocations().is_empty() }).await;
        assert!(!fx.invocations()[0].contains("-reconnect"));

        registry.shutdown().await;
    }

    #[tokio::test]
    async fn test_multi_streams_share_directory() {
        let fx = Fixture::new(Mode::Multi, LONG_RUNNING, RestartPolicy::Never);
        let registry = &fx.registry;

        let a = registry.start(URL_A).await.unwrap();
        let kept = registry.output_dir().path().join(format!("{}.00001.ts", a.identity));
        std::fs::write(&kept, b"segment").unwrap();

        let b = registry.start(URL_B).await.unwrap();

        assert_ne!(a.identity, b.identity);
        assert!(kept.exists());
        assert_eq!(registry.supervisor().live(), 2);
        assert_eq!(registry.status_all().await.len(), 2);

        assert!(registry.stop(&a.identity).await);
        assert!(!kept.exists());
        assert!(registry.status(&a.identity).await.is_none());
        assert!(registry.status(&b.identity).await.is_some());

        registry.shutdown().await;
    }

    #[tokio::test]
    async fn test_multi_exit_removes_entry() {
        let fx = Fixture::new(Mode::Multi, ALWAYS_CRASH, RestartPolicy::Never);
        let registry = &fx.registry;

        registry.start(URL_A).await.unwrap();

        eventually("entry removal", || async move { registry.stream_count().await == 0 }).await;
        assert_eq!(registry.supervisor().spawned(), 1);
    }

    #[tokio::test]
    async fn test_stop_single_stream() {
        let fx = Fixture::new(Mode::Single, LONG_RUNNING, RestartPolicy::After(Duration::from_millis(100)));
        let registry = &fx.registry;

        registry.start(URL_A).await.unwrap();
        assert!(registry.stop(&StreamIdentity::single()).await);
        assert!(!registry.stop(&StreamIdentity::single()).await);

        tokio::time::sleep(Duration::from_millis(300)).await;

        let status = registry.current().await;
        assert!(!status.streaming);
        assert_eq!(status.url, None);
        assert_eq!(registry.supervisor().live(), 0);
        assert_eq!(registry.supervisor().spawned(), 1);
    }

    #[tokio::test]
    async fn test_stop_source_by_url() {
        let fx = Fixture::new(Mode::Multi, LONG_RUNNING, RestartPolicy::Never);
        let registry = &fx.registry;

        registry.start(URL_A).await.unwrap();

        assert!(matches!(
            registry.stop_source(None).await,
            Err(RegistryError::UrlRequired)
        ));
        assert!(!registry.stop_source(Some(URL_B)).await.unwrap());
        assert!(registry.stop_source(Some(URL_A)).await.unwrap());
        assert_eq!(registry.stream_count().await, 0);
    }

    #[tokio::test]
    async fn test_spawn_failure_leaves_no_entry() {
        let dir = TempDir::new().unwrap();
        let config = RegistryConfig::default()
            .output_dir(dir.path().join("stream"))
            .ffmpeg_path(dir.path().join("missing-ffmpeg"));
        let registry = Arc::new(StreamRegistry::with_config(config));
        registry.spawn_event_task();

        let err = registry.start(URL_A).await.unwrap_err();

        assert!(matches!(err, RegistryError::Spawn(_)));
        assert_eq!(registry.stream_count().await, 0);
        assert!(!registry.current().await.streaming);
    }

    #[tokio::test]
    async fn test_failed_start_during_restart_gap_drops_entry() {
        let fx = Fixture::new(
            Mode::Multi,
            ALWAYS_CRASH,
            RestartPolicy::After(Duration::from_secs(2)),
        );
        let registry = &fx.registry;

        let outcome = registry.start(URL_A).await.unwrap();
        let identity = outcome.identity.clone();
        eventually("restart scheduled", || {
            let identity = identity.clone();
            async move {
                matches!(
                    registry.status(&identity).await,
                    Some(StreamStatus { state: StreamState::Restarting, .. })
                )
            }
        })
        .await;

        std::fs::remove_file(fx.dir.path().join("fake-ffmpeg")).unwrap();
        let err = registry.start(URL_A).await.unwrap_err();

        assert!(matches!(err, RegistryError::Spawn(_)));
        assert_eq!(registry.status(&identity).await, None);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(registry.stream_count().await, 0);
        assert_eq!(registry.supervisor().spawned(), 1);
    }

    #[tokio::test]
    async fn test_event_task_takes_receiver_once() {
        let registry = Arc::new(StreamRegistry::new());
        assert!(registry.events_pending());

        registry.spawn_event_task();
        assert!(!registry.events_pending());

        // a second task finds no receiver and ends immediately
        registry.spawn_event_task().await.unwrap();
        assert!(!registry.events_pending());
    }

    #[tokio::test]
    async fn test_directory_failure_aborts_start() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        let ffmpeg = write_fake_ffmpeg(dir.path(), LONG_RUNNING);

        let config = RegistryConfig::default()
            .output_dir(blocker.join("stream"))
            .ffmpeg_path(ffmpeg);
        let registry = StreamRegistry::with_config(config);

        let err = registry.start(URL_A).await.unwrap_err();

        assert!(matches!(err, RegistryError::Directory { .. }));
        assert_eq!(registry.supervisor().spawned(), 0);
    }
}
