//! Host platform policy
//!
//! Virtual displays (an X11 display number plus an `Xvfb` helper process)
//! only exist on the Linux/X11 family. macOS and Windows servers forward the
//! native desktop instead, so the display operations are gated here once and
//! the callers decide whether a refusal is an error or a warning.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Host operating-system family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// Linux and the other X11 unixes
    Linux,
    MacOs,
    Windows,
}

/// Operations whose availability depends on the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayOperation {
    AllocateDisplay,
    LaunchHelper,
}

impl DisplayOperation {
    fn describe(&self) -> &'static str {
        match self {
            DisplayOperation::AllocateDisplay => "Display allocation",
            DisplayOperation::LaunchHelper => "Xvfb",
        }
    }
}

/// What a platform supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub virtual_display: bool,
    pub helper_process: bool,
}

impl Capabilities {
    pub fn supports(&self, op: DisplayOperation) -> bool {
        match op {
            DisplayOperation::AllocateDisplay => self.virtual_display,
            DisplayOperation::LaunchHelper => self.helper_process,
        }
    }
}

impl Platform {
    /// Platform of the running binary
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Linux
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Platform::Linux => "Linux",
            Platform::MacOs => "macOS",
            Platform::Windows => "Windows",
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        let x11 = matches!(self, Platform::Linux);
        Capabilities {
            virtual_display: x11,
            helper_process: x11,
        }
    }

    pub fn supports(&self, op: DisplayOperation) -> bool {
        self.capabilities().supports(op)
    }

    /// Strict gate: fails with `UnsupportedPlatform` naming this platform.
    pub fn require(&self, op: DisplayOperation) -> Result<()> {
        if self.supports(op) {
            Ok(())
        } else {
            Err(Error::UnsupportedPlatform {
                platform: self.name().to_string(),
                operation: op.describe().to_string(),
            })
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::current()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(Platform::Linux, true ; "linux has virtual displays")]
    #[test_case(Platform::MacOs, false ; "macos uses the native display")]
    #[test_case(Platform::Windows, false ; "windows uses the native display")]
    fn virtual_display_capability(platform: Platform, expected: bool) {
        let caps = platform.capabilities();
        assert_eq!(caps.virtual_display, expected);
        assert_eq!(caps.helper_process, expected);
    }

    #[test_case(Platform::MacOs)]
    #[test_case(Platform::Windows)]
    fn require_names_platform(platform: Platform) {
        let err = platform.require(DisplayOperation::AllocateDisplay).unwrap_err();
        match &err {
            Error::UnsupportedPlatform { platform: name, .. } => {
                assert_eq!(name, platform.name())
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains(platform.name()));
    }

    #[test]
    fn linux_allows_display_operations() {
        assert!(Platform::Linux.require(DisplayOperation::AllocateDisplay).is_ok());
        assert!(Platform::Linux.require(DisplayOperation::LaunchHelper).is_ok());
    }

    #[test]
    fn current_platform_is_stable() {
        assert_eq!(Platform::current(), Platform::default());
    }
}
