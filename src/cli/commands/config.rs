use anyhow::{Context, Result};
use clap::Subcommand;
use std::path::Path;

use crate::cli::output::{Formatter, get_formatter};
use crate::models::{Config, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    #[command(about = "Initialize configuration file")]
    Init {
        #[arg(long, help = "Force overwrite existing config")]
        force: bool,
    },
    #[command(about = "Show current configuration (secrets masked)")]
    Show,
    #[command(about = "Show configuration file paths")]
    Path,
}

pub async fn handle_config(
    cmd: ConfigCommand,
    config: &Config,
    explicit: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let formatter = get_formatter(format);

    match cmd {
        ConfigCommand::Init { force } => handle_init(force, formatter.as_ref()),
        ConfigCommand::Show => handle_show(config, format),
        ConfigCommand::Path => handle_path(explicit, format),
    }
}

fn handle_init(force: bool, formatter: &dyn Formatter) -> Result<()> {
    let path = Config::init(force).context("failed to create config")?;
    println!(
        "{}",
        formatter.format_message(&format!("Created config at: {}", path.display()))
    );
    Ok(())
}

fn handle_show(config: &Config, format: OutputFormat) -> Result<()> {
    let redacted = config.redacted();
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&redacted)?);
    } else {
        print!("{}", toml::to_string_pretty(&redacted)?);
    }
    Ok(())
}

fn handle_path(explicit: Option<&Path>, format: OutputFormat) -> Result<()> {
    let default_path = Config::config_path();
    let active = explicit
        .map(Path::to_path_buf)
        .or_else(|| default_path.clone().filter(|p| p.exists()));
    let env_path = std::env::current_dir().ok().map(|cwd| cwd.join(".env"));

    if format == OutputFormat::Json {
        let output = serde_json::json!({
            "active": active,
            "default": default_path,
            "env_file": env_path.filter(|p| p.exists()),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Configuration paths:");
    println!();
    match active {
        Some(ref path) => println!("Config (active): {}", path.display()),
        None => println!("Config (active): none, using defaults"),
    }
    if let Some(ref path) = default_path {
        println!("Config (default location): {}", path.display());
    }
    if let Some(path) = env_path {
        let state = if path.exists() { "active" } else { "would be" };
        println!(".env file ({}): {}", state, path.display());
    }
    Ok(())
}
