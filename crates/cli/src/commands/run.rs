//! Run a display-server session in the foreground

use anyhow::Context;
use clap::Args;
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use glassbox_harness::{HarnessConfig, StopReport, Supervisor};

use crate::output::{
    print_error, print_info, print_ready, print_server_logs, print_stop_report, print_warning,
};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Application command the server starts (e.g. xeyes)
    pub app: String,

    /// Run on a private Xvfb display (Linux/X11 only)
    #[arg(long)]
    pub xvfb: bool,

    /// Host to bind the endpoint to
    #[arg(long)]
    pub host: Option<String>,

    /// Endpoint port (default: allocate a free one)
    #[arg(long)]
    pub port: Option<u16>,

    /// Server binary to launch
    #[arg(long)]
    pub server_binary: Option<PathBuf>,

    /// Seconds to wait for the endpoint to accept connections
    #[arg(long)]
    pub ready_timeout: Option<u64>,

    /// Seconds to wait for a graceful shutdown before killing
    #[arg(long)]
    pub stop_timeout: Option<u64>,

    /// Print the captured server output after shutdown
    #[arg(long)]
    pub print_logs: bool,

    /// Write the captured server output to this file after shutdown
    #[arg(long)]
    pub logs_out: Option<PathBuf>,

    /// Extra server arguments, appended last (after `--`)
    #[arg(last = true)]
    pub extra: Vec<String>,
}

impl RunArgs {
    fn apply(&self, config: &mut HarnessConfig) {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if self.port.is_some() {
            config.port = self.port;
        }
        if let Some(binary) = &self.server_binary {
            config.server.binary = binary.clone();
        }
        if let Some(secs) = self.ready_timeout {
            config.timeouts.readiness_secs = secs;
        }
        if let Some(secs) = self.stop_timeout {
            config.timeouts.stop_secs = secs;
        }
    }
}

pub async fn execute(args: RunArgs, config_path: &Path) -> anyhow::Result<()> {
    let mut config = HarnessConfig::load(config_path)
        .with_context(|| format!("load {}", config_path.display()))?;
    args.apply(&mut config);
    debug!(?config, "Effective configuration");

    let supervisor = Supervisor::new(config)?;
    print_info(&format!(
        "Starting {} on {}",
        args.app.bold(),
        supervisor.endpoint()
    ));

    let app = args.app.clone();
    let extra = args.extra.clone();
    let xvfb = args.xvfb;
    let (supervisor, started) = tokio::task::spawn_blocking(move || {
        let mut supervisor = supervisor;
        let started = supervisor.start(&app, &extra, xvfb);
        (supervisor, started)
    })
    .await?;

    for warning in supervisor.warnings() {
        print_warning(warning);
    }

    let endpoint = match started {
        Ok(endpoint) => endpoint,
        Err(e) => {
            print_error(&format!("Server failed to start: {}", e));
            let (supervisor, _) = stop(supervisor).await?;
            dump_logs(&supervisor, &args, true)?;
            return Err(e.into());
        }
    };

    print_ready(&endpoint, supervisor.display());
    println!("   Press Ctrl-C to stop");

    wait_for_exit(&supervisor).await;

    let (supervisor, report) = stop(supervisor).await?;
    print_stop_report(&report);
    dump_logs(&supervisor, &args, false)?;

    Ok(())
}

/// Return on Ctrl-C or when the server exits on its own.
async fn wait_for_exit(supervisor: &Supervisor) {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut ticker = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Received shutdown signal");
                return;
            }
            _ = ticker.tick() => {
                if !supervisor.is_running() {
                    print_warning("Server exited on its own");
                    return;
                }
            }
        }
    }
}

async fn stop(mut supervisor: Supervisor) -> anyhow::Result<(Supervisor, StopReport)> {
    let stopped = tokio::task::spawn_blocking(move || {
        let report = supervisor.stop_default();
        (supervisor, report)
    })
    .await?;
    Ok(stopped)
}

fn dump_logs(supervisor: &Supervisor, args: &RunArgs, failed: bool) -> anyhow::Result<()> {
    if let Some(path) = &args.logs_out {
        let path = supervisor.write_logs(path)?;
        print_info(&format!("Server logs written to {}", path.display()));
    }

    if args.print_logs || failed {
        print_server_logs(&supervisor.logs());
    }
    Ok(())
}
