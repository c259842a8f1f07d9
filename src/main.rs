use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

mod cli;
mod client;
mod config;
mod media;
mod site;
mod utils;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: cli::Command,
}

fn init_logging(format: &str) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    if format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = config::get_config_path(args.config.as_deref());
    let config = match &config_path {
        Some(path) => config::Config::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path))?,
        None => config::Config::default(),
    };

    init_logging(config.get_logging_format());

    match &config_path {
        Some(path) => info!("Loaded config from: {}", path),
        None => info!("No config file found, using defaults"),
    }
    debug!("{:?}", config);

    let app = cli::App::new(config)?;
    app.run(args.command).await
}
