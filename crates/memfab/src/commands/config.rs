//! Config file commands.

use anyhow::{Result, bail};
use colored::Colorize;

use crate::cli::{ConfigAction, ConfigCommand};
use crate::config::Config;

/// Execute config command.
pub fn execute(cmd: ConfigCommand, config: &Config) -> Result<()> {
    match cmd.action {
        ConfigAction::Show => {
            print!("{}", toml::to_string_pretty(config)?);
            Ok(())
        }
        ConfigAction::Init { force } => {
            let path = Config::config_path();
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            let written = config.save()?;
            println!("{} Wrote {}", "✓".green(), written.display());
            Ok(())
        }
        ConfigAction::Path => {
            println!("{}", Config::config_path().display());
            Ok(())
        }
    }
}
