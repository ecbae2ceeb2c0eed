//! Glassbox Common Library
//!
//! Shared types, errors and platform policy for the Glassbox harness.

pub mod error;
pub mod platform;
pub mod types;

// Re-export commonly used types
pub use error::{Error, Result};
pub use platform::{Capabilities, DisplayOperation, Platform};
pub use types::*;

/// Glassbox version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
