//! Configuration file commands

use anyhow::Context;
use clap::Subcommand;
use std::path::Path;

use glassbox_harness::HarnessConfig;

use crate::output::{print_error, print_success};

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write the default configuration
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

pub fn execute(cmd: ConfigCommands, path: &Path) -> anyhow::Result<()> {
    match cmd {
        ConfigCommands::Init { force } => {
            if path.exists() && !force {
                print_error(&format!("{} already exists", path.display()));
                anyhow::bail!("refusing to overwrite {} without --force", path.display());
            }
            HarnessConfig::default().save(path)?;
            print_success(&format!("Wrote {}", path.display()));
        }
        ConfigCommands::Show => {
            let config = HarnessConfig::load(path)
                .with_context(|| format!("load {}", path.display()))?;
            print!("{}", config.to_toml()?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("glassbox.toml");

        execute(ConfigCommands::Init { force: false }, &path).unwrap();
        assert!(HarnessConfig::load(&path).is_ok());

        std::fs::write(&path, "port = 15000\n").unwrap();
        assert!(execute(ConfigCommands::Init { force: false }, &path).is_err());
        assert_eq!(HarnessConfig::load(&path).unwrap().port, Some(15000));

        execute(ConfigCommands::Init { force: true }, &path).unwrap();
        assert_eq!(HarnessConfig::load(&path).unwrap().port, None);
    }
}
