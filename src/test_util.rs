//! Fake transcoder scripts for tests
//!
//! The scripts log their arguments to `invocations.log` next to themselves and
//! can announce readiness with the same stderr line ffmpeg prints when it opens
//! the temporary playlist.

use std::future::Future;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Announces readiness, then runs until killed
pub const LONG_RUNNING: &str = "announce\nexec sleep 30";

/// Crashes on first launch, runs on every later one
pub const CRASH_ONCE: &str = "if [ ! -f \"$DIR/crashed\" ]; then\n  touch \"$DIR/crashed\"\n  exit 1\nfi\nannounce\nexec sleep 30";

/// Exits with an error immediately
pub const ALWAYS_CRASH: &str = "exit 1";

/// Write an executable `fake-ffmpeg` into `dir` running `body`
pub fn write_fake_ffmpeg(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("fake-ffmpeg");
    let script = format!(
        "#!/bin/sh\n\
         DIR='{dir}'\n\
         for last; do :; done\n\
         echo \"$@\" >> \"$DIR/invocations.log\"\n\
         announce() {{ echo \"[hls @ 0x1] Opening '$last.tmp' for writing\" >&2; }}\n\
         {body}\n",
        dir = dir.display(),
        body = body,
    );
    std::fs::write(&path, script).unwrap();

    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

/// Poll `check` until it holds, panicking after ten seconds
pub async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + Duration::from_secs(10);
    while !check().await {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
