//! Config command implementation.

use anyhow::Result;

use ticketshare_core::config::Config;

use super::{ConfigAction, ConfigArgs};

/// Run the config command.
pub fn run(args: &ConfigArgs) -> Result<()> {
    match args.action {
        ConfigAction::Show => {
            let config = Config::load()?;
            println!("# {}", Config::config_path().display());
            print!("{}", config.to_toml()?);
        }
        ConfigAction::Path => {
            println!("{}", Config::config_path().display());
        }
        ConfigAction::Reset => {
            let path = Config::config_path();
            Config::default().save_to(&path)?;
            println!("Wrote default configuration to {}", path.display());
        }
    }

    Ok(())
}
