//! Error types for Glassbox

use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

/// Result type alias using Glassbox Error
pub type Result<T> = std::result::Result<T, Error>;

/// Glassbox error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Server already running (pid {pid})")]
    AlreadyRunning { pid: u32 },

    #[error("{operation} is only supported on Linux/X11, not on {platform} (the native display is used instead)")]
    UnsupportedPlatform { platform: String, operation: String },

    #[error("No free {resource} in range {first}..{last}")]
    ResourceExhausted {
        resource: String,
        first: u32,
        last: u32,
    },

    #[error("Virtual display helper failed to start on {display} ({status})")]
    HelperStartup { display: String, status: String },

    #[error("Endpoint {endpoint} not ready after {:.1}s", .elapsed.as_secs_f64())]
    ReadinessTimeout { endpoint: String, elapsed: Duration },

    #[error("Invalid process: {0}")]
    InvalidProcess(String),

    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{label} process exited unexpectedly ({status})")]
    ProcessExited { label: String, status: ExitStatus },

    #[error("Server is not running")]
    NotRunning,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readiness_timeout_names_elapsed_time() {
        let err = Error::ReadinessTimeout {
            endpoint: "ws://127.0.0.1:9/".to_string(),
            elapsed: Duration::from_millis(1500),
        };
        let msg = err.to_string();
        assert!(msg.contains("1.5s"), "{msg}");
        assert!(msg.contains("ws://127.0.0.1:9/"), "{msg}");
    }

    #[test]
    fn unsupported_platform_names_platform() {
        let err = Error::UnsupportedPlatform {
            platform: "Windows".to_string(),
            operation: "Display allocation".to_string(),
        };
        assert!(err.to_string().contains("Windows"));
    }

    #[test]
    fn resource_exhausted_names_range() {
        let err = Error::ResourceExhausted {
            resource: "X11 display".to_string(),
            first: 100,
            last: 10000,
        };
        assert_eq!(err.to_string(), "No free X11 display in range 100..10000");
    }
}
