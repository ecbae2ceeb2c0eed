//! Server session supervision
//!
//! A [`Supervisor`] owns at most one main server process and one optional
//! virtual-display helper. `start` allocates what the server needs, launches
//! it with its output captured and blocks until the endpoint accepts TCP
//! connections. `stop` is the single cleanup path: when `start` fails after a
//! process was spawned (readiness timeout, capture failure) the processes are
//! left alive and recorded so the caller can inspect logs before calling it.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use glassbox_common::{
    DisplayId, DisplayOperation, EndpointAddress, Error, LogLine, Platform, Result, SessionState,
};

use crate::allocator::{allocate_port, DisplayAllocator};
use crate::capture::OutputCapture;
use crate::config::HarnessConfig;
use crate::display::launch_helper;
use crate::probe::{wait_for_endpoint_with, ProbeSettings};
use crate::process::{ManagedProcess, ShutdownOutcome};

/// Processes and resources of one started session
struct ActiveSession {
    main: ManagedProcess,
    helper: Option<ManagedProcess>,
    display: Option<DisplayId>,
    log_dir: TempDir,
}

enum Slot {
    Idle,
    Active(ActiveSession),
}

/// What `stop` had to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopReport {
    pub main: Option<ShutdownOutcome>,
    pub helper: Option<ShutdownOutcome>,
}

impl StopReport {
    pub fn was_forced(&self) -> bool {
        self.main.is_some_and(|o| o.was_forced()) || self.helper.is_some_and(|o| o.was_forced())
    }
}

/// Supervises one display server (plus optional Xvfb helper) at a time
pub struct Supervisor {
    id: Uuid,
    config: HarnessConfig,
    platform: Platform,
    endpoint: EndpointAddress,
    capture: OutputCapture,
    slot: Slot,
    state: SessionState,
    warnings: Vec<String>,
}

impl Supervisor {
    /// Create a supervisor for the current platform.
    ///
    /// The endpoint is fixed here; a free port is allocated when the
    /// configuration does not name one.
    pub fn new(config: HarnessConfig) -> Result<Self> {
        config.validate()?;

        let port = match config.port {
            Some(port) => port,
            None => allocate_port()?,
        };
        let endpoint = EndpointAddress::new(config.scheme.clone(), config.host.clone(), port);
        let capture = OutputCapture::with_grace(config.timeouts.capture_grace());

        Ok(Self {
            id: Uuid::new_v4(),
            config,
            platform: Platform::current(),
            endpoint,
            capture,
            slot: Slot::Idle,
            state: SessionState::Idle,
            warnings: Vec::new(),
        })
    }

    /// Make platform decisions as if running on `platform`.
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn endpoint(&self) -> &EndpointAddress {
        &self.endpoint
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Non-fatal warnings raised by the last `start`
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn display(&self) -> Option<DisplayId> {
        match &self.slot {
            Slot::Active(active) => active.display,
            Slot::Idle => None,
        }
    }

    /// Private log directory handed to the server, while a session is active
    pub fn log_dir(&self) -> Option<&Path> {
        match &self.slot {
            Slot::Active(active) => Some(active.log_dir.path()),
            Slot::Idle => None,
        }
    }

    pub fn main_pid(&self) -> Option<u32> {
        match &self.slot {
            Slot::Active(active) => Some(active.main.pid()),
            Slot::Idle => None,
        }
    }

    pub fn helper_pid(&self) -> Option<u32> {
        match &self.slot {
            Slot::Active(active) => active.helper.as_ref().map(ManagedProcess::pid),
            Slot::Idle => None,
        }
    }

    /// Start the server running `app_command`.
    ///
    /// `extra_args` are appended after every default argument. With
    /// `use_virtual_display` a display and Xvfb helper are set up on
    /// Linux/X11; elsewhere the request is ignored with a warning.
    pub fn start(
        &mut self,
        app_command: &str,
        extra_args: &[String],
        use_virtual_display: bool,
    ) -> Result<EndpointAddress> {
        let span = info_span!("session", id = %self.id);
        let _guard = span.enter();

        if let Slot::Active(active) = &self.slot {
            return Err(Error::AlreadyRunning {
                pid: active.main.pid(),
            });
        }

        self.warnings.clear();
        self.capture.clear();
        self.state = SessionState::Starting;

        let result = self.launch(app_command, extra_args, use_virtual_display);
        match &result {
            Ok(_) => {
                self.state = SessionState::Running;
                info!(endpoint = %self.endpoint, "Server is ready");
            }
            Err(e) if matches!(self.slot, Slot::Idle) => {
                self.state = SessionState::Idle;
                warn!("Server failed to start: {}", e);
            }
            Err(e) => {
                warn!("Server started but is not ready: {} (call stop to reap it)", e);
            }
        }
        result
    }

    fn launch(
        &mut self,
        app_command: &str,
        extra_args: &[String],
        use_virtual_display: bool,
    ) -> Result<EndpointAddress> {
        let log_dir = tempfile::Builder::new().prefix("glassbox-logs-").tempdir()?;

        let (display, helper) = self.prepare_display(use_virtual_display)?;

        let args = build_server_args(&self.config, &self.endpoint, app_command, display, extra_args);
        debug!("Server command: {} {}", self.config.server.binary.display(), args.join(" "));

        let mut cmd = Command::new(&self.config.server.binary);
        cmd.args(&args)
            .env(&self.config.server.log_dir_env, log_dir.path())
            .env(&self.config.server.non_interactive_env, "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut main = match ManagedProcess::spawn("server", &mut cmd) {
            Ok(main) => main,
            Err(e) => {
                // Nothing records the helper yet, so it cannot be left to stop.
                if let Some(helper) = helper {
                    helper.shutdown(self.config.timeouts.helper_stop());
                }
                return Err(e);
            }
        };

        let attached = self.capture.attach_process(&mut main);
        self.slot = Slot::Active(ActiveSession {
            main,
            helper,
            display,
            log_dir,
        });
        attached?;

        let settings = ProbeSettings {
            connect_timeout: self.config.timeouts.probe_connect(),
            interval: self.config.timeouts.probe_interval(),
        };
        wait_for_endpoint_with(
            &self.endpoint.host,
            self.endpoint.port,
            self.config.timeouts.readiness(),
            settings,
        )
        .map_err(|e| match e {
            Error::ReadinessTimeout { elapsed, .. } => Error::ReadinessTimeout {
                endpoint: self.endpoint.to_string(),
                elapsed,
            },
            other => other,
        })?;

        Ok(self.endpoint.clone())
    }

    /// Allocate a display and launch the helper when the platform allows it.
    fn prepare_display(
        &mut self,
        use_virtual_display: bool,
    ) -> Result<(Option<DisplayId>, Option<ManagedProcess>)> {
        if !use_virtual_display {
            return Ok((None, None));
        }

        if !self.platform.supports(DisplayOperation::AllocateDisplay) {
            let message = format!(
                "virtual display request ignored on {} (native display is used instead)",
                self.platform
            );
            warn!("{}", message);
            self.warnings.push(message);
            return Ok((None, None));
        }

        let display = DisplayAllocator::from_config(&self.config.display).allocate(self.platform)?;
        let helper = launch_helper(&self.config.display, display, self.platform)?;
        std::thread::sleep(self.config.display.warmup());

        Ok((Some(display), Some(helper)))
    }

    /// Stop the session with the configured timeout.
    pub fn stop_default(&mut self) -> StopReport {
        let timeout = self.config.timeouts.stop();
        self.stop(timeout)
    }

    /// Terminate the server (escalating to a kill after `timeout`), collect
    /// its remaining output, stop the helper and return to idle.
    ///
    /// Never fails; calling it while idle is a no-op.
    pub fn stop(&mut self, timeout: Duration) -> StopReport {
        let span = info_span!("session", id = %self.id);
        let _guard = span.enter();

        let Slot::Active(active) = std::mem::replace(&mut self.slot, Slot::Idle) else {
            self.capture.stop();
            self.state = SessionState::Idle;
            return StopReport {
                main: None,
                helper: None,
            };
        };
        self.state = SessionState::Stopping;
        info!(pid = active.main.pid(), "Stopping server");

        let main = active.main.shutdown(timeout);
        self.capture.drain();

        let helper = active
            .helper
            .map(|helper| helper.shutdown(self.config.timeouts.helper_stop()));

        if let Err(e) = active.log_dir.close() {
            debug!("Could not remove log directory: {}", e);
        }

        self.state = SessionState::Idle;
        let report = StopReport {
            main: Some(main),
            helper,
        };
        info!(forced = report.was_forced(), "Server stopped");
        report
    }

    /// True while the main process exists and has not exited.
    pub fn is_running(&self) -> bool {
        match &self.slot {
            Slot::Active(active) => active.main.is_alive(),
            Slot::Idle => false,
        }
    }

    /// Fail if the server is not running, naming its exit status if it died.
    pub fn ensure_running(&self) -> Result<()> {
        match &self.slot {
            Slot::Idle => Err(Error::NotRunning),
            Slot::Active(active) => match active.main.exit_status() {
                None => Ok(()),
                Some(status) => Err(Error::ProcessExited {
                    label: active.main.label().to_string(),
                    status,
                }),
            },
        }
    }

    /// Captured server output, one `[STREAM] line` per line
    pub fn logs(&self) -> String {
        self.capture.output()
    }

    pub fn log_lines(&self) -> Vec<LogLine> {
        self.capture.lines()
    }

    pub fn clear_logs(&self) {
        self.capture.clear();
    }

    /// Persist captured output, e.g. when a test fails.
    pub fn write_logs(&self, path: &Path) -> Result<PathBuf> {
        self.capture.buffer().write_to(path)?;
        Ok(path.to_path_buf())
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        if matches!(self.slot, Slot::Active(_)) {
            self.stop_default();
        }
    }
}

/// Arguments for the main server process.
///
/// Caller-supplied `extra_args` go last so last-wins parsers let them
/// override the defaults.
pub fn build_server_args(
    config: &HarnessConfig,
    endpoint: &EndpointAddress,
    app_command: &str,
    display: Option<DisplayId>,
    extra_args: &[String],
) -> Vec<String> {
    let server = &config.server;
    let mut args = vec![
        server.mode.clone(),
        format!("--start={app_command}"),
        format!("--{}={}", server.bind_option, endpoint.bind_addr()),
        server.foreground_flag.clone(),
    ];
    args.extend(server.audio_flags.iter().cloned());

    if let Some(display) = display {
        args.push(format!("--display={display}"));
    }

    args.extend(extra_args.iter().cloned());
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> EndpointAddress {
        EndpointAddress::new("ws", "127.0.0.1", 14500)
    }

    #[test]
    fn server_args_follow_contract() {
        let args = build_server_args(&HarnessConfig::default(), &endpoint(), "xeyes", None, &[]);
        assert_eq!(
            args,
            vec![
                "seamless",
                "--start=xeyes",
                "--bind-ws=127.0.0.1:14500",
                "--no-daemon",
                "--speaker=no",
                "--microphone=no",
            ]
        );
    }

    #[test]
    fn display_precedes_extra_args() {
        let extra = vec!["--speaker=yes".to_string()];
        let args = build_server_args(
            &HarnessConfig::default(),
            &endpoint(),
            "xcalc",
            Some(DisplayId(101)),
            &extra,
        );
        let n = args.len();
        assert_eq!(args[n - 2], "--display=:101");
        assert_eq!(args[n - 1], "--speaker=yes");
    }

    #[test]
    fn fixed_port_is_used_as_endpoint() {
        let config = HarnessConfig {
            port: Some(14999),
            ..Default::default()
        };
        let supervisor = Supervisor::new(config).unwrap();
        assert_eq!(supervisor.endpoint().to_string(), "ws://127.0.0.1:14999/");
        assert_eq!(supervisor.state(), SessionState::Idle);
        assert!(!supervisor.is_running());
    }

    #[test]
    fn stop_while_idle_is_a_no_op() {
        let mut supervisor = Supervisor::new(HarnessConfig::default()).unwrap();
        let report = supervisor.stop(Duration::from_secs(1));
        assert!(report.main.is_none());
        assert!(report.helper.is_none());
        assert!(matches!(supervisor.ensure_running(), Err(Error::NotRunning)));
    }

    #[test]
    fn spawn_failure_leaves_session_idle() {
        let mut config = HarnessConfig::default();
        config.server.binary = PathBuf::from("/nonexistent/glassbox-server");
        let mut supervisor = Supervisor::new(config)
            .unwrap()
            .with_platform(Platform::Windows);

        let err = supervisor.start("xeyes", &[], false).unwrap_err();
        assert!(matches!(err, Error::Spawn { .. }));
        assert_eq!(supervisor.state(), SessionState::Idle);
        assert!(supervisor.main_pid().is_none());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = HarnessConfig {
            host: String::new(),
            ..Default::default()
        };
        assert!(matches!(Supervisor::new(config), Err(Error::InvalidConfig(_))));
    }
}
