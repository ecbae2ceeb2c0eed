//! Glassbox harness
//!
//! Runs a display server (Xpra-style) for remote GUI testing:
//! - Allocates a free port and, on Linux/X11, a free display number
//! - Launches an optional Xvfb helper and the server with captured output
//! - Blocks until the published endpoint accepts connections
//! - Tears both processes down, escalating from terminate to kill
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  Supervisor                                              │
//! │    ├── start(app, extra_args, use_virtual_display)       │
//! │    │     ├── Platform::supports(..)     (common)         │
//! │    │     ├── allocate_port / DisplayAllocator            │
//! │    │     ├── launch_helper  -> ManagedProcess (Xvfb)     │
//! │    │     ├── ManagedProcess (server) + OutputCapture     │
//! │    │     └── wait_for_endpoint -> EndpointAddress        │
//! │    ├── stop(timeout) -> StopReport                       │
//! │    ├── logs() / is_running()                             │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod allocator;
pub mod capture;
pub mod config;
pub mod display;
pub mod probe;
pub mod process;
pub mod supervisor;

pub use allocator::{allocate_port, DisplayAllocator};
pub use capture::{CaptureBuffer, OutputCapture};
pub use config::HarnessConfig;
pub use probe::wait_for_endpoint;
pub use process::{ManagedProcess, ShutdownOutcome};
pub use supervisor::{StopReport, Supervisor};

pub use glassbox_common::{EndpointAddress, Error, Platform, Result};
