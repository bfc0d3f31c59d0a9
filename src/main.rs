//! catalog-harvest command line interface
//!
//! - `run`: collect links from a listing page and harvest every product page
//! - `extract`: extract one product page and print its canonical record
//! - `links`: print the product links found on a listing page
//! - `init-config` / `show-config`: manage the configuration file

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use catalog_harvest_lib::application::{HarvestSession, SchemaMapper};
use catalog_harvest_lib::infrastructure::logging::{init_logging_with_config, log_system_info};
use catalog_harvest_lib::infrastructure::parsing::ListParseContext;
use catalog_harvest_lib::infrastructure::{
    AppConfig, ConfigManager, CsvRecordStore, DocumentSource, FileDocumentSource, HttpClient,
    ProductDetailParser, ProductListParser,
};

#[derive(Parser)]
#[command(author, version, about = "Extract product attributes into a canonical schema", long_about = None)]
struct Cli {
    /// Configuration file (default: user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Harvest product pages linked from a listing page
    Run(RunArgs),

    /// Extract a single product page and print the canonical record
    Extract(ExtractArgs),

    /// Print product links found on a listing page
    Links(LinksArgs),

    /// Write the default configuration file
    InitConfig(InitConfigArgs),

    /// Print the effective configuration
    ShowConfig,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Listing page URL (overrides configuration)
    #[arg(short, long)]
    listing_url: Option<String>,

    /// Maximum number of product pages
    #[arg(short, long)]
    target: Option<usize>,

    /// Output CSV file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Serve pages saved in this directory instead of fetching them
    #[arg(long)]
    pages_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// Product page URL or saved HTML file
    #[arg(required = true)]
    source: String,

    /// URL to record for a saved file
    #[arg(short, long)]
    url: Option<String>,

    /// Print the merged raw attributes instead of the canonical record
    #[arg(long)]
    raw: bool,
}

#[derive(Args, Debug)]
struct LinksArgs {
    /// Listing page URL or saved HTML file (default: configured listing URL)
    source: Option<String>,

    /// Maximum number of links
    #[arg(short, long)]
    target: Option<usize>,
}

#[derive(Args, Debug)]
struct InitConfigArgs {
    /// Overwrite an existing file
    #[arg(short, long)]
    force: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new()?,
    };

    match cli.command {
        Commands::InitConfig(args) => init_config(&manager, args).await,
        Commands::ShowConfig => {
            let config = manager.load_config().await?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Commands::Run(args) => {
            let config = load_with_logging(&manager).await?;
            run(config, args).await
        }
        Commands::Extract(args) => {
            let config = load_with_logging(&manager).await?;
            extract(&config, args).await
        }
        Commands::Links(args) => {
            let config = load_with_logging(&manager).await?;
            links(&config, args).await
        }
    }
}

async fn load_with_logging(manager: &ConfigManager) -> Result<AppConfig> {
    let config = manager.load_config().await?;
    init_logging_with_config(&config.logging).context("Failed to initialize logging")?;
    log_system_info();
    info!("Using configuration {:?}", manager.config_path());
    Ok(config)
}

async fn init_config(manager: &ConfigManager, args: InitConfigArgs) -> Result<()> {
    if manager.config_path().exists() && !args.force {
        anyhow::bail!(
            "{:?} already exists (use --force to overwrite)",
            manager.config_path()
        );
    }
    manager.reset_to_defaults().await?;
    println!("Wrote default configuration to {:?}", manager.config_path());
    Ok(())
}

async fn run(mut config: AppConfig, args: RunArgs) -> Result<()> {
    if let Some(url) = args.listing_url {
        config.scrape.listing_url = url;
    }
    if let Some(target) = args.target {
        config.scrape.target_count = target;
    }
    if let Some(output) = args.output {
        config.scrape.output_path = output;
    }

    let source: Arc<dyn DocumentSource> = match args.pages_dir {
        Some(dir) => Arc::new(FileDocumentSource::new(dir)),
        None => Arc::new(HttpClient::from_scrape_config(&config.scrape)?),
    };
    let store = Box::new(CsvRecordStore::new(&config.scrape.output_path));

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current page");
            ctrl_c_token.cancel();
        }
    });

    let session = HarvestSession::new(&config, source, store, cancel)?;
    let summary = session.run().await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Read a saved file when `source` names one, otherwise fetch it.
async fn load_source(config: &AppConfig, source: &str) -> Result<String> {
    if Path::new(source).is_file() {
        return tokio::fs::read_to_string(source)
            .await
            .with_context(|| format!("Failed to read {source}"));
    }
    let client = HttpClient::from_scrape_config(&config.scrape)?;
    let html = client.fetch(source).await?;
    client.close().await?;
    Ok(html)
}

async fn extract(config: &AppConfig, args: ExtractArgs) -> Result<()> {
    config.validate()?;
    let html = load_source(config, &args.source).await?;
    let url = args.url.unwrap_or_else(|| args.source.clone());

    let parser = ProductDetailParser::from_config(config)?;
    let product = parser.parse_document(&html, &url)?;

    let pairs: Vec<(String, String)> = if args.raw {
        product
            .attributes
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    } else {
        SchemaMapper::from_config(&config.schema)
            .map_product(&product)
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    };

    let object: Map<String, Value> = pairs.into_iter().map(|(k, v)| (k, Value::String(v))).collect();
    println!("{}", serde_json::to_string_pretty(&object)?);
    Ok(())
}

async fn links(config: &AppConfig, args: LinksArgs) -> Result<()> {
    let source = args.source.unwrap_or_else(|| config.scrape.listing_url.clone());
    let html = load_source(config, &source).await?;

    let parser = ProductListParser::new(&config.link_collector)?;
    let context = ListParseContext::new(
        config.scrape.base_url.clone(),
        args.target.unwrap_or(config.scrape.target_count),
    );
    for link in parser.collect_links(&html, &context)? {
        println!("{link}");
    }
    Ok(())
}
