use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use paperpipe::cli::commands::{
    handle_config, handle_embed, handle_fetch, handle_ingest, handle_matrix, handle_status,
};
use paperpipe::cli::{Cli, Commands};
use paperpipe::models::{Config, OutputFormat};

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "paperpipe=debug"
    } else {
        "paperpipe=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; credentials may come from the environment.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    config.validate()?;
    let format = cli.format.unwrap_or(config.output.format);

    tokio::select! {
        result = run_command(cli, config, format) => {
            result?;
        }
        _ = shutdown_signal() => {
            eprintln!("\nReceived shutdown signal, cleaning up...");
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
        }
    }

    Ok(())
}

async fn run_command(cli: Cli, config: Config, format: OutputFormat) -> Result<()> {
    let verbose = cli.verbose;
    let explicit = cli.config.as_deref();

    match cli.command {
        Commands::Fetch(args) => {
            handle_fetch(args, &config, format, verbose).await?;
        }
        Commands::Matrix(args) => {
            handle_matrix(args, format, verbose).await?;
        }
        Commands::Embed(args) => {
            handle_embed(args, &config, format, verbose).await?;
        }
        Commands::Ingest(args) => {
            handle_ingest(args, &config, format, verbose).await?;
        }
        Commands::Config(cmd) => {
            handle_config(cmd, &config, explicit, format).await?;
        }
        Commands::Status => {
            handle_status(&config, explicit, format, verbose).await?;
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
