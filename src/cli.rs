// Command-line surface: argument parsing, logging setup and dispatch.

use crate::commands::{self, categorize::OutputFormat};
use crate::config::{Overrides, Settings};
use crate::error::AppError;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "wallpaper-lense")]
#[command(about = "Tag wallpapers listed by a file backend with an image classifier")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// TOML config file (default: ./wallpaper-lense.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Listing endpoint of the file backend
    #[arg(long, global = true, env = "WALLPAPER_LENSE_BACKEND_URL")]
    pub backend_url: Option<String>,

    /// Value sent in the x-api-key header
    #[arg(long, global = true, env = "WALLPAPER_LENSE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Directory holding the ONNX model and its label config
    #[arg(long, global = true, env = "WALLPAPER_LENSE_MODEL_DIR")]
    pub model_dir: Option<PathBuf>,

    /// Try GPU execution providers before the CPU
    #[arg(long, global = true)]
    pub gpu: bool,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify every image the backend lists (default)
    Categorize {
        /// Print all results as one JSON array instead of per-image lines
        #[arg(long)]
        json: bool,
    },

    /// Manage the classification model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },

    /// Query the backend's health endpoint
    Health,
}

#[derive(Subcommand, Debug)]
pub enum ModelAction {
    /// Show where the model lives and whether it is downloaded
    Status,
    /// Download the model and label config if missing
    Download,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            backend_url: self.backend_url.clone(),
            api_key: self.api_key.clone(),
            model_dir: self.model_dir.clone(),
            use_gpu: self.gpu,
        }
    }
}

/// Directive used when `RUST_LOG` is unset.
pub fn default_log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

pub fn init_logging(verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_level(verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

pub async fn run(cli: Cli) -> Result<(), AppError> {
    let settings = Settings::load(cli.config.as_deref(), cli.overrides())?;

    match cli.command {
        None => {
            commands::categorize::run(&settings, OutputFormat::Text).await?;
        }
        Some(Commands::Categorize { json }) => {
            let format = if json { OutputFormat::Json } else { OutputFormat::Text };
            commands::categorize::run(&settings, format).await?;
        }
        Some(Commands::Model { action }) => {
            let status = match action {
                ModelAction::Status => commands::model::get_model_status(&settings),
                ModelAction::Download => commands::model::download_model(&settings).await?,
            };
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Some(Commands::Health) => {
            let body = commands::backend::check_health(&settings).await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
    }

    Ok(())
}
