//! Configuration view and validation commands: `flowboard config`.

use anyhow::Result;

use flowboard::config::{ENV_BASE_URL, ENV_TOKEN, FlowboardConfig, FlowboardToml};

use super::print_json;
use crate::{Cli, ConfigCommands};

pub fn cmd_config(
    cli: &Cli,
    config: &FlowboardConfig,
    command: Option<ConfigCommands>,
) -> Result<()> {
    let config_path = &config.config_path;

    match command {
        None | Some(ConfigCommands::Show) => {
            if cli.json {
                return print_json(&config.toml);
            }
            println!();
            println!("Flowboard Configuration");
            println!("=======================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No flowboard.toml found at {}", config_path.display());
                println!("Using default configuration.");
            }
            println!();

            let toml = &config.toml;
            println!("[server]");
            match &toml.server.base_url {
                Some(url) => println!("  base_url = \"{}\"", url),
                None => println!("  base_url = (unset)"),
            }
            println!("  timeout_secs = {}", toml.server.timeout_secs);
            println!();
            println!("[board]");
            println!("  page_size = {}", toml.board.page_size);
            println!("  click_threshold_ms = {}", toml.board.click_threshold_ms);
            if let Some(project) = &toml.board.default_project {
                println!("  default_project = \"{}\"", project);
            }
            println!();

            println!("Effective values (with env/CLI overrides):");
            println!(
                "  base_url = {}",
                config.base_url().unwrap_or_else(|| "(unset)".to_string())
            );
            println!(
                "  token = {}",
                if config.access_token().is_some() {
                    "(set)"
                } else {
                    "(unset)"
                }
            );
            println!();
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            let warnings = config.validate();
            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init { force }) => {
            if config_path.exists() && !force {
                println!("flowboard.toml already exists at {}", config_path.display());
                println!("Pass --force to overwrite it.");
                return Ok(());
            }

            let mut toml = FlowboardToml::default();
            toml.server.base_url = config.base_url();
            toml.save(config_path)?;

            println!("Created flowboard.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [server] base_url, timeout_secs");
            println!("  - [board] page_size, click_threshold_ms, default_project");
            println!();
            println!("Set {} (or pass --token) to authenticate.", ENV_TOKEN);
            if config.base_url().is_none() {
                println!("Set base_url here, {} or --base-url to pick a server.", ENV_BASE_URL);
            }
            println!();
        }
    }

    Ok(())
}
