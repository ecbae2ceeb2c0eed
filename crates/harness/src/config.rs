//! Harness configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use glassbox_common::DEFAULT_SCHEME;

/// Harness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Host the server binds its endpoint to
    pub host: String,

    /// Endpoint port (None = allocate a free one)
    pub port: Option<u16>,

    /// Scheme published in the endpoint URI
    pub scheme: String,

    /// Main server process
    pub server: ServerConfig,

    /// Virtual display helper
    pub display: DisplayConfig,

    /// Wait ceilings
    pub timeouts: TimeoutConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: None,
            scheme: DEFAULT_SCHEME.to_string(),
            server: ServerConfig::default(),
            display: DisplayConfig::default(),
            timeouts: TimeoutConfig::default(),
        }
    }
}

/// Main server process configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server binary
    pub binary: PathBuf,

    /// Positional mode token
    pub mode: String,

    /// Option name receiving `host:port`
    pub bind_option: String,

    /// Keeps the server in the foreground so its output can be captured
    pub foreground_flag: String,

    pub audio_flags: Vec<String>,

    /// Environment variable pointing at the private log directory
    pub log_dir_env: String,

    /// Environment variable marking the session as non-interactive
    pub non_interactive_env: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("xpra"),
            mode: "seamless".to_string(),
            bind_option: "bind-ws".to_string(),
            foreground_flag: "--no-daemon".to_string(),
            audio_flags: vec!["--speaker=no".to_string(), "--microphone=no".to_string()],
            log_dir_env: "XPRA_LOG_DIR".to_string(),
            non_interactive_env: "XPRA_NOTTY".to_string(),
        }
    }
}

/// Virtual display configuration (Linux/X11 only)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Path to the Xvfb binary
    pub helper_binary: PathBuf,

    /// Screen geometry and depth, `WxHxD`
    pub screen: String,

    /// Directory holding the X11 display sockets
    pub socket_dir: PathBuf,

    /// First display number tried
    pub first: u32,

    /// Upper bound (exclusive) of the display scan
    pub last: u32,

    /// Delay before checking the helper is still alive
    pub settle_ms: u64,

    /// Extra delay after the helper passed its liveness check
    pub warmup_ms: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            helper_binary: PathBuf::from("Xvfb"),
            screen: "1280x1024x24".to_string(),
            socket_dir: PathBuf::from("/tmp/.X11-unix"),
            first: 100,
            last: 10000,
            settle_ms: 500,
            warmup_ms: 1000,
        }
    }
}

impl DisplayConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn warmup(&self) -> Duration {
        Duration::from_millis(self.warmup_ms)
    }
}

/// Timeouts bounding every wait performed by the supervisor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub readiness_secs: u64,
    pub stop_secs: u64,
    pub helper_stop_secs: u64,
    pub capture_grace_ms: u64,
    pub probe_connect_ms: u64,
    pub probe_interval_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            readiness_secs: 10,
            stop_secs: 10,
            helper_stop_secs: 5,
            capture_grace_ms: 2000,
            probe_connect_ms: 1000,
            probe_interval_ms: 200,
        }
    }
}

impl TimeoutConfig {
    pub fn readiness(&self) -> Duration {
        Duration::from_secs(self.readiness_secs)
    }

    pub fn stop(&self) -> Duration {
        Duration::from_secs(self.stop_secs)
    }

    pub fn helper_stop(&self) -> Duration {
        Duration::from_secs(self.helper_stop_secs)
    }

    pub fn capture_grace(&self) -> Duration {
        Duration::from_millis(self.capture_grace_ms)
    }

    pub fn probe_connect(&self) -> Duration {
        Duration::from_millis(self.probe_connect_ms)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }
}

impl HarnessConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = self.to_toml()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> glassbox_common::Result<()> {
        use glassbox_common::Error;

        if self.host.is_empty() {
            return Err(Error::InvalidConfig("host must not be empty".to_string()));
        }
        if self.display.first >= self.display.last {
            return Err(Error::InvalidConfig(format!(
                "display range {}..{} is empty",
                self.display.first, self.display.last
            )));
        }
        if self.server.bind_option.is_empty() {
            return Err(Error::InvalidConfig("server.bind_option must not be empty".to_string()));
        }
        Ok(())
    }
}
