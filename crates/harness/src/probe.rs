//! TCP readiness probing

use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use glassbox_common::{Error, Result};

/// Polling behaviour of [`wait_for_endpoint`]
#[derive(Debug, Clone, Copy)]
pub struct ProbeSettings {
    /// Ceiling for a single connection attempt
    pub connect_timeout: Duration,
    /// Pause between attempts
    pub interval: Duration,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(1),
            interval: Duration::from_millis(200),
        }
    }
}

/// Block until `host:port` accepts a TCP connection or `timeout` elapses.
///
/// Refused and reset connections are expected while the server is still
/// binding and are retried.
pub fn wait_for_endpoint(host: &str, port: u16, timeout: Duration) -> Result<()> {
    wait_for_endpoint_with(host, port, timeout, ProbeSettings::default())
}

pub fn wait_for_endpoint_with(
    host: &str,
    port: u16,
    timeout: Duration,
    settings: ProbeSettings,
) -> Result<()> {
    let start = Instant::now();
    let deadline = start + timeout;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let remaining = deadline.saturating_duration_since(Instant::now());
        let attempt_timeout = settings.connect_timeout.min(remaining);

        if !attempt_timeout.is_zero() && try_connect(host, port, attempt_timeout) {
            info!(host, port, attempts, "Endpoint is ready");
            return Ok(());
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        std::thread::sleep(settings.interval.min(remaining));
    }

    Err(Error::ReadinessTimeout {
        endpoint: format!("{host}:{port}"),
        elapsed: start.elapsed(),
    })
}

fn try_connect(host: &str, port: u16, timeout: Duration) -> bool {
    let addrs: Vec<SocketAddr> = match (host, port).to_socket_addrs() {
        Ok(addrs) => addrs.collect(),
        Err(e) => {
            debug!(host, port, "Could not resolve endpoint: {}", e);
            return false;
        }
    };

    addrs.iter().any(|addr| match TcpStream::connect_timeout(addr, timeout) {
        Ok(_) => true,
        Err(e) => {
            debug!(%addr, "Endpoint not ready: {}", e);
            false
        }
    })
}
