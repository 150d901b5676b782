//! Lifecycle events reported by supervised processes
//!
//! Every event carries the generation of the process that produced it so the
//! registry can tell a current process from one it already replaced.

use std::process::ExitStatus;

use bytes::Bytes;

use crate::registry::StreamIdentity;

/// How a process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExitInfo {
    /// Exit code, if the process exited normally
    pub code: Option<i32>,
    /// Terminating signal, if the process was killed (unix only)
    pub signal: Option<i32>,
}

impl ExitInfo {
    pub fn from_status(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }

    /// Exit code zero
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl std::fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {}", code),
            (None, Some(signal)) => write!(f, "signal {}", signal),
            (None, None) => f.write_str("unknown status"),
        }
    }
}

/// Event emitted by the supervisor for one child process
#[derive(Debug, Clone)]
pub enum ProcessEvent {
    /// A chunk of the child's diagnostic output (stderr)
    Output {
        identity: StreamIdentity,
        generation: u64,
        chunk: Bytes,
    },
    /// The child exited; sent exactly once, after all of its output
    Exited {
        identity: StreamIdentity,
        generation: u64,
        exit: ExitInfo,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_info_display() {
        let exited = ExitInfo {
            code: Some(1),
            signal: None,
        };
        let killed = ExitInfo {
            code: None,
            signal: Some(9),
        };

        assert_eq!(exited.to_string(), "exit code 1");
        assert_eq!(killed.to_string(), "signal 9");
        assert_eq!(ExitInfo::default().to_string(), "unknown status");
        assert!(!exited.success());
        assert!(ExitInfo { code: Some(0), signal: None }.success());
    }
}
