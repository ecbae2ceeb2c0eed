//! Virtual display helper (Xvfb)

use std::process::{Command, Stdio};
use tracing::{debug, info};

use glassbox_common::{DisplayId, DisplayOperation, Error, Platform, Result};

use crate::config::DisplayConfig;
use crate::process::ManagedProcess;

/// Build helper arguments: display, screen geometry, no access control, no reset.
pub fn helper_args(display_id: DisplayId, screen: &str) -> Vec<String> {
    vec![
        display_id.to_string(),
        "-screen".to_string(),
        "0".to_string(),
        screen.to_string(),
        "-ac".to_string(),
        "-noreset".to_string(),
    ]
}

/// Launch the helper for `display_id` and confirm it survived the settle delay.
///
/// A helper that already exited is reaped and reported as `HelperStartup`.
pub fn launch_helper(
    config: &DisplayConfig,
    display_id: DisplayId,
    platform: Platform,
) -> Result<ManagedProcess> {
    platform.require(DisplayOperation::LaunchHelper)?;

    let args = helper_args(display_id, &config.screen);
    debug!("Helper command: {} {}", config.helper_binary.display(), args.join(" "));

    let mut cmd = Command::new(&config.helper_binary);
    cmd.args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    let process = ManagedProcess::spawn("xvfb", &mut cmd)?;

    std::thread::sleep(config.settle());
    if let Some(status) = process.exit_status() {
        return Err(Error::HelperStartup {
            display: display_id.to_string(),
            status: status.to_string(),
        });
    }

    info!(display = %display_id, pid = process.pid(), "Virtual display is up");
    Ok(process)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn args_follow_xvfb_conventions() {
        assert_eq!(
            helper_args(DisplayId(100), "1280x1024x24"),
            vec![":100", "-screen", "0", "1280x1024x24", "-ac", "-noreset"]
        );
    }

    #[test]
    fn refused_off_linux() {
        let err = launch_helper(&DisplayConfig::default(), DisplayId(100), Platform::Windows)
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedPlatform { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn helper_that_exits_is_a_startup_error() {
        let config = DisplayConfig {
            helper_binary: "false".into(),
            settle_ms: 200,
            ..Default::default()
        };
        let err = launch_helper(&config, DisplayId(150), Platform::Linux).unwrap_err();
        match err {
            Error::HelperStartup { display, .. } => assert_eq!(display, ":150"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn surviving_helper_is_returned() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-xvfb");
        std::fs::write(&script, "#!/bin/sh\nexec sleep 30\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let config = DisplayConfig {
            helper_binary: script,
            settle_ms: 100,
            ..Default::default()
        };
        let helper = launch_helper(&config, DisplayId(151), Platform::Linux).unwrap();
        assert!(helper.is_alive());
        assert!(!helper.shutdown(Duration::from_secs(5)).was_forced());
    }
}
