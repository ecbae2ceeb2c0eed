//! Port and display allocation
//!
//! Ports come from the OS: bind port 0, read the assigned port back, release
//! it. Nothing holds the port between release and the server's own bind, so
//! another process may grab it first; the readiness probe then times out.
//! Displays are found by scanning the X11 socket directory.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::net::{Ipv4Addr, TcpListener};
use std::path::{Path, PathBuf};
use tracing::debug;

use glassbox_common::{DisplayId, DisplayOperation, Error, Platform, Result};

use crate::config::DisplayConfig;

/// Ask the OS for a currently unused TCP port.
pub fn allocate_port() -> Result<u16> {
    let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, 0))?;
    let port = listener.local_addr()?.port();
    drop(listener);
    debug!(port, "Allocated port");
    Ok(port)
}

/// Finds unused X11 display numbers
#[derive(Debug, Clone)]
pub struct DisplayAllocator {
    socket_dir: PathBuf,
    first: u32,
    last: u32,
}

impl Default for DisplayAllocator {
    fn default() -> Self {
        Self::from_config(&DisplayConfig::default())
    }
}

impl DisplayAllocator {
    /// Scan `first..last` for sockets in `socket_dir`.
    pub fn new(socket_dir: impl Into<PathBuf>, first: u32, last: u32) -> Self {
        Self {
            socket_dir: socket_dir.into(),
            first,
            last,
        }
    }

    pub fn from_config(config: &DisplayConfig) -> Self {
        Self::new(config.socket_dir.clone(), config.first, config.last)
    }

    pub fn socket_dir(&self) -> &Path {
        &self.socket_dir
    }

    /// Display numbers with a socket file present
    pub fn used_displays(&self) -> Result<BTreeSet<u32>> {
        let entries = match std::fs::read_dir(&self.socket_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(e) => return Err(e.into()),
        };

        let mut used = BTreeSet::new();
        for entry in entries {
            let entry = entry?;
            if let Some(id) = entry.file_name().to_str().and_then(DisplayId::from_socket_name) {
                used.insert(id.number());
            }
        }
        Ok(used)
    }

    /// First display number in range whose socket does not exist.
    ///
    /// Fails with `UnsupportedPlatform` anywhere but Linux/X11.
    pub fn allocate(&self, platform: Platform) -> Result<DisplayId> {
        platform.require(DisplayOperation::AllocateDisplay)?;

        let used = self.used_displays()?;
        for number in self.first..self.last {
            if used.contains(&number) {
                continue;
            }
            let id = DisplayId(number);
            // The socket may have appeared since the directory was listed.
            if !self.socket_dir.join(id.socket_name()).exists() {
                debug!(display = %id, "Allocated display");
                return Ok(id);
            }
        }

        Err(Error::ResourceExhausted {
            resource: "X11 display".to_string(),
            first: self.first,
            last: self.last,
        })
    }
}
