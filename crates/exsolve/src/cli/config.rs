//! The `exsolve config` command for configuration management.

use clap::{Args, Subcommand};
use dialoguer::Password;
use exsolve_core::Config;
use std::path::Path;

/// Arguments for the `config` command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Subcommands for configuration management.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,

    /// Show config file path
    Path,

    /// Initialize a new config file with defaults
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },

    /// Save the Gemini API key to the config file
    SetKey {
        /// The key; prompted for when omitted
        key: Option<String>,
    },
}

/// Execute the config command.
pub async fn execute(args: ConfigArgs) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show => {
            let mut config = Config::load()?;
            config.gemini.api_key = mask_key(&config.gemini.api_key);
            println!("{}", config.to_toml()?);
        }

        ConfigCommand::Path => {
            let path = Config::default_path();
            println!("{}", path.display());
        }

        ConfigCommand::Init { force } => {
            let path = Config::default_path();

            if path.exists() && !force {
                anyhow::bail!(
                    "Config file already exists at: {}\nUse --force to overwrite.",
                    path.display()
                );
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let toml = Config::default().to_toml()?;
            std::fs::write(&path, toml)?;

            tracing::info!("Config file created at: {}", path.display());
            println!("Configuration initialized at: {}", path.display());
        }

        ConfigCommand::SetKey { key } => {
            let key = match key {
                Some(key) => key,
                None => Password::new()
                    .with_prompt("Enter your Gemini API key")
                    .interact()?,
            };
            let key = key.trim();
            if key.is_empty() {
                anyhow::bail!("Please enter API key");
            }

            let path = Config::default_path();
            save_key_to_config(&path, key)?;
            println!("Key saved to {}", path.display());
        }
    }

    Ok(())
}

/// Store `key` as `gemini.api_key` in the config file at `path`, preserving
/// existing comments and settings.
fn save_key_to_config(path: &Path, key: &str) -> anyhow::Result<()> {
    let content = if path.exists() {
        std::fs::read_to_string(path)?
    } else {
        String::new()
    };

    let mut doc: toml_edit::DocumentMut = content
        .parse()
        .map_err(|e| anyhow::anyhow!("Cannot edit {}: {e}", path.display()))?;

    if !doc.contains_key("gemini") {
        doc["gemini"] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    doc["gemini"]["api_key"] = toml_edit::value(key);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, doc.to_string())?;

    tracing::debug!("Saved API key to {}", path.display());
    Ok(())
}

/// Hide all but the first four characters of a literal key.
///
/// `${VAR}` references are shown as-is.
fn mask_key(key: &str) -> String {
    if key.is_empty() || (key.starts_with("${") && key.ends_with('}')) {
        return key.to_string();
    }
    let visible: String = key.chars().take(4).collect();
    format!("{visible}****")
}
