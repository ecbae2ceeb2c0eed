//! Core types for Glassbox

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scheme published for display-server endpoints
pub const DEFAULT_SCHEME: &str = "ws";

/// Network address at which a main process becomes reachable.
///
/// Computed once when a supervisor is built and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EndpointAddress {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl EndpointAddress {
    pub fn new(scheme: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
            port,
        }
    }

    /// `host:port` as passed to the server's bind option
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for EndpointAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}/", self.scheme, self.host, self.port)
    }
}

/// X11 display number claimed for one helper process
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DisplayId(pub u32);

impl DisplayId {
    pub fn number(&self) -> u32 {
        self.0
    }

    /// Name of the socket file the X server creates for this display
    pub fn socket_name(&self) -> String {
        format!("X{}", self.0)
    }

    /// Parse a socket file name such as `X101` back into a display id.
    pub fn from_socket_name(name: &str) -> Option<Self> {
        name.strip_prefix('X')?.parse().ok().map(DisplayId)
    }
}

impl fmt::Display for DisplayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":{}", self.0)
    }
}

/// Output stream a captured line arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamTag {
    Out,
    Err,
}

impl StreamTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamTag::Out => "STDOUT",
            StreamTag::Err => "STDERR",
        }
    }
}

impl fmt::Display for StreamTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One captured line, without its trailing newline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub stream: StreamTag,
    pub text: String,
}

impl LogLine {
    pub fn new(stream: StreamTag, text: impl Into<String>) -> Self {
        Self {
            stream,
            text: text.into(),
        }
    }
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.stream, self.text)
    }
}

/// Observable lifecycle of a server session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Starting,
    Running,
    Stopping,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Idle
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Starting => write!(f, "starting"),
            SessionState::Running => write!(f, "running"),
            SessionState::Stopping => write!(f, "stopping"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_renders_as_uri() {
        let ep = EndpointAddress::new(DEFAULT_SCHEME, "127.0.0.1", 14500);
        assert_eq!(ep.to_string(), "ws://127.0.0.1:14500/");
        assert_eq!(ep.bind_addr(), "127.0.0.1:14500");
    }

    #[test]
    fn display_socket_names() {
        assert_eq!(DisplayId(101).to_string(), ":101");
        assert_eq!(DisplayId(101).socket_name(), "X101");
        assert_eq!(DisplayId::from_socket_name("X42"), Some(DisplayId(42)));
        assert_eq!(DisplayId::from_socket_name("X42-lock"), None);
        assert_eq!(DisplayId::from_socket_name("Y42"), None);
        assert_eq!(DisplayId::from_socket_name("X"), None);
    }

    #[test]
    fn log_line_has_stream_prefix() {
        assert_eq!(LogLine::new(StreamTag::Out, "hello").to_string(), "[STDOUT] hello");
        assert_eq!(LogLine::new(StreamTag::Err, "").to_string(), "[STDERR] ");
    }

    #[test]
    fn session_state_serializes_snake_case() {
        let json = serde_json::to_string(&SessionState::Running).unwrap();
        assert_eq!(json, "\"running\"");
    }
}
