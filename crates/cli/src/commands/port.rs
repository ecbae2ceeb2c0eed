//! Port allocation command

use serde::Serialize;

use glassbox_harness::allocate_port;

use crate::output::{print_item, OutputFormat, TableDisplay};

#[derive(Serialize)]
struct PortAllocation {
    port: u16,
}

impl TableDisplay for PortAllocation {
    fn headers() -> Vec<&'static str> {
        vec!["Port"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.port.to_string()]
    }
}

/// Print a port that is free right now. Nothing reserves it afterwards.
pub fn execute(format: OutputFormat) -> anyhow::Result<()> {
    let port = allocate_port()?;
    match format {
        OutputFormat::Plain => println!("{}", port),
        _ => print_item(&PortAllocation { port }, format),
    }
    Ok(())
}
