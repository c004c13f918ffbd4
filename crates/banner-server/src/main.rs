//! Consent banner gateway binary.
//!
//! Commands:
//! - `banner-gateway serve` - Run the HTTP service (default)
//! - `banner-gateway hash` - Print the SRI hashes of the configured assets

use std::path::PathBuf;

use anyhow::{Context, Result};
use banner_core::GatewayConfig;
use banner_observability::{init_tracing, LogFormat, DEFAULT_DIRECTIVE};
use clap::{Args, Parser, Subcommand};

/// Security and asset integrity gateway for the consent banner
#[derive(Parser)]
#[command(name = "banner-gateway")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Config file path (TOML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit JSON logs
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service
    Serve(ServeArgs),

    /// Print SRI hashes and version of the configured assets
    Hash(HashArgs),
}

#[derive(Args, Default)]
struct ServeArgs {
    /// Port to listen on (overrides config and PORT)
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Args)]
struct HashArgs {
    /// Print machine-readable JSON
    #[arg(long)]
    json: bool,
}

fn load_config(cli: &Cli) -> Result<GatewayConfig> {
    let mut config = GatewayConfig::load(cli.config.as_deref())
        .context("failed to load configuration")?
        .with_process_env()
        .context("invalid environment configuration")?;

    if cli.json_logs {
        config.json_logs = true;
    }
    if let Some(Commands::Serve(ServeArgs { port: Some(port) })) = &cli.command {
        config.port = *port;
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    init_tracing(LogFormat::from_json_flag(config.json_logs), DEFAULT_DIRECTIVE)
        .context("failed to initialize logging")?;

    match cli.command.unwrap_or(Commands::Serve(ServeArgs::default())) {
        Commands::Serve(_) => banner_server::startup::serve(config).await,
        Commands::Hash(args) => hash(&config, args.json).await,
    }
}

async fn hash(config: &GatewayConfig, json: bool) -> Result<()> {
    let report = banner_server::startup::asset_report(&config.assets)
        .await
        .with_context(|| format!("failed to load assets from {}", config.assets.dir.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("version {}", report.version);
        for asset in &report.assets {
            println!("{:<20} {:>7} bytes  {}", asset.file, asset.bytes, asset.integrity);
        }
    }
    Ok(())
}
