//! Minimal stand-in for a display server.
//!
//! Accepts the same arguments the supervisor passes to the real server,
//! binds the published address and greets every connection. Used by the
//! integration tests to exercise the full start/stop cycle.

use clap::Parser;
use std::io::Write;
use std::net::TcpListener;
use std::time::Duration;

/// Banner printed on stdout once the endpoint is bound
const READY_BANNER: &str = "stub display server listening on";

#[derive(Parser, Debug)]
#[command(name = "stub-display-server")]
#[command(args_override_self = true)]
struct Args {
    /// Server mode token
    mode: String,

    /// Application to host
    #[arg(long)]
    start: Option<String>,

    /// Address to bind, `host:port`
    #[arg(long = "bind-ws", visible_alias = "bind")]
    bind: String,

    /// Stay in the foreground
    #[arg(long)]
    no_daemon: bool,

    #[arg(long)]
    speaker: Option<String>,

    #[arg(long)]
    microphone: Option<String>,

    /// X11 display to attach to
    #[arg(long)]
    display: Option<String>,

    /// Ignore the graceful termination signal
    #[arg(long)]
    ignore_term: bool,

    /// Wait before binding the endpoint
    #[arg(long, default_value_t = 0)]
    bind_delay_ms: u64,

    /// Print the banner but never bind
    #[arg(long)]
    no_listen: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.ignore_term {
        ignore_term()?;
    }

    println!(
        "starting {} mode, app={}, foreground={}",
        args.mode,
        args.start.as_deref().unwrap_or("-"),
        args.no_daemon
    );
    if let Some(display) = &args.display {
        println!("using display {display}");
    }
    if let Ok(dir) = std::env::var("XPRA_LOG_DIR") {
        println!("log dir {dir}");
    }
    eprintln!(
        "audio: speaker={} microphone={}",
        args.speaker.as_deref().unwrap_or("default"),
        args.microphone.as_deref().unwrap_or("default")
    );

    if args.no_listen {
        loop {
            std::thread::sleep(Duration::from_secs(60));
        }
    }

    std::thread::sleep(Duration::from_millis(args.bind_delay_ms));
    let listener = TcpListener::bind(&args.bind)?;
    println!("{} {}", READY_BANNER, listener.local_addr()?);

    for stream in listener.incoming() {
        match stream {
            Ok(mut stream) => {
                let _ = stream.write_all(b"hello\n");
            }
            Err(e) => eprintln!("accept failed: {e}"),
        }
    }
    Ok(())
}

#[cfg(unix)]
fn ignore_term() -> anyhow::Result<()> {
    use nix::sys::signal::{signal, SigHandler, Signal};

    // SAFETY: installs SIG_IGN before any other thread exists.
    unsafe { signal(Signal::SIGTERM, SigHandler::SigIgn) }?;
    Ok(())
}

#[cfg(not(unix))]
fn ignore_term() -> anyhow::Result<()> {
    Ok(())
}
