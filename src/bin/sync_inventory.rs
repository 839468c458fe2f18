use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use beer_sync::config;
use beer_sync::inventory::DabcClient;
use beer_sync::pipeline;
use beer_sync::store::WpClient;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Update every product's store list from the liquor inventory"
)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;

    let store = WpClient::from_config(&cfg)?;
    let inventory = DabcClient::from_config(&cfg)?;

    let report = pipeline::sync_inventory(&store, &inventory, &cfg.pools).await?;
    info!(
        pages = report.pages,
        processed = report.processed,
        updated = report.updated,
        "inventory sync finished"
    );
    Ok(())
}
