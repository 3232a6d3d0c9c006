//! Configuration view and validation commands: `taskdeck config`.

use anyhow::Result;
use std::path::Path;

use taskdeck::config::{DeckConfig, DeckToml};

use super::super::ConfigCommands;

pub fn cmd_config(project_dir: &Path, command: Option<ConfigCommands>) -> Result<()> {
    let config = DeckConfig::load(project_dir)?;
    let config_path = config.config_path();

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No taskdeck.toml found at {}", config_path.display());
                println!("Run 'taskdeck config init' to create one.");
            }
            println!();
            println!("Effective values (with env overrides):");
            println!();
            print!("{}", config.toml.to_toml()?);
            println!();
            println!("Database: {}", config.resolved_db_path().display());
            println!();
        }
        Some(ConfigCommands::Validate) => {
            let warnings = config.toml.validate();
            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("taskdeck.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }
            std::fs::create_dir_all(&config.deck_dir)?;
            DeckToml::default().save(&config_path)?;

            println!("Created taskdeck.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [storage] db_path");
            println!("  - [session] unknown_id_policy, save_retries, retry_backoff_ms");
            println!("  - [generator] command, args, timeout_secs");
        }
    }

    Ok(())
}
