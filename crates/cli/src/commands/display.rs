//! Display allocation command

use clap::Args;
use serde::Serialize;
use std::path::{Path, PathBuf};

use glassbox_common::Platform;
use glassbox_harness::{DisplayAllocator, HarnessConfig};

use crate::output::{print_item, OutputFormat, TableDisplay};

#[derive(Args, Debug)]
pub struct DisplayArgs {
    /// X11 socket directory to scan
    #[arg(long)]
    pub socket_dir: Option<PathBuf>,

    /// First display number to try
    #[arg(long)]
    pub first: Option<u32>,
}

#[derive(Serialize)]
struct DisplayAllocation {
    display: String,
    number: u32,
    in_use: usize,
}

impl TableDisplay for DisplayAllocation {
    fn headers() -> Vec<&'static str> {
        vec!["Display", "Number", "In use"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.display.clone(),
            self.number.to_string(),
            self.in_use.to_string(),
        ]
    }
}

pub fn execute(args: DisplayArgs, config_path: &Path, format: OutputFormat) -> anyhow::Result<()> {
    let mut config = HarnessConfig::load(config_path)?.display;
    if let Some(dir) = args.socket_dir {
        config.socket_dir = dir;
    }
    if let Some(first) = args.first {
        config.first = first;
    }

    let allocator = DisplayAllocator::from_config(&config);
    let display = allocator.allocate(Platform::current())?;
    let in_use = allocator.used_displays()?.len();

    let allocation = DisplayAllocation {
        display: display.to_string(),
        number: display.number(),
        in_use,
    };
    match format {
        OutputFormat::Plain => println!("{}", allocation.display),
        _ => print_item(&allocation, format),
    }
    Ok(())
}
