//! `flux` -- command-line client for a Flux image generation service.
//!
//! Without a subcommand it watches the service: health, the image list,
//! the job queue and the model catalog are polled in the background and
//! every notification is printed until Ctrl-C. The other subcommands run
//! one action against live state and exit.
//!
//! Configuration comes from the environment (and `.env`); see
//! [`CliConfig::from_env`].

use clap::Parser;
use flux_cli::cli::{Cli, Command};
use flux_cli::commands;
use flux_cli::config::CliConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flux_cli=info,flux_sync=info,flux_gateway=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = CliConfig::from_env();
    if let Some(api_url) = cli.api_url {
        config.api_url = api_url;
    }
    if let Some(download_dir) = cli.download_dir {
        config.download_dir = download_dir;
    }

    tracing::info!(api_url = %config.api_url, "Starting flux client");

    let orchestrator = match commands::build_orchestrator(&config) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start");
            std::process::exit(1);
        }
    };

    let command = cli.command.unwrap_or(Command::Watch);
    if let Err(e) = commands::run(&orchestrator, command).await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
