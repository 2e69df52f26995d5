use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use flux_core::generation::ModelVariant;

#[derive(Debug, Parser)]
#[command(name = "flux", about = "Client for a Flux image generation service")]
pub struct Cli {
    /// Base URL of the service; overrides `FLUX_API_URL`.
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Directory downloads are saved to; overrides `DOWNLOAD_DIR`.
    #[arg(long, global = true)]
    pub download_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Keep polling the service and print notifications until Ctrl-C.
    Watch,
    /// Submit a single generation request.
    Generate(GenerateArgs),
    /// Submit a JSON array of generation records.
    Bulk(BulkArgs),
    /// List images known to the service.
    Images,
    /// Show pending and running job counts.
    Queue,
    /// Delete one image.
    Delete { id: String },
    /// Delete every image.
    DeleteAll {
        /// Confirm the deletion.
        #[arg(long)]
        yes: bool,
    },
    /// Download one image.
    Download { id: String },
    /// Download every image as a zip archive.
    DownloadAll,
    /// List models and their install state.
    Models,
    /// Start installing a model on the service host.
    Install { name: String },
    /// Remove an installed model.
    Remove { name: String },
}

#[derive(Debug, Args)]
pub struct GenerateArgs {
    #[arg(long, value_parser = parse_model)]
    pub model: ModelVariant,
    #[arg(long)]
    pub prompt: String,
    #[arg(long)]
    pub width: Option<u32>,
    #[arg(long)]
    pub height: Option<u32>,
    #[arg(long)]
    pub batch_size: Option<u32>,
    /// Defaults to the model's own step count.
    #[arg(long)]
    pub steps: Option<u32>,
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Debug, Args)]
pub struct BulkArgs {
    #[arg(long, value_parser = parse_model)]
    pub model: ModelVariant,
    /// File holding the JSON array of records.
    pub file: PathBuf,
}

fn parse_model(value: &str) -> Result<ModelVariant, String> {
    value.parse().map_err(|e: flux_core::error::CoreError| e.to_string())
}
