use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

use beer_sync::config;
use beer_sync::feed::UntappdClient;
use beer_sync::pipeline::{self, RunOutcome};
use beer_sync::rotator::TokenRotator;
use beer_sync::store::WpClient;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Backfill checkins for every venue in the venue list into the store"
)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Venue list to use instead of `app.venues_file`
    #[arg(long)]
    venues: Option<PathBuf>,
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
    let venues = match &args.venues {
        Some(path) => config::load_venues(path)?,
        None => cfg.load_venues()?,
    };

    let store = WpClient::from_config(&cfg)?;
    let feed = UntappdClient::from_config(&cfg)?;
    let tokens = TokenRotator::new(cfg.untappd.tokens.clone())?;

    info!(venues = venues.len(), "starting venue checkin sync");
    match pipeline::sync_venues(&store, &feed, &tokens, &cfg.pools, &venues).await? {
        RunOutcome::Completed(report) => {
            info!(
                venues = report.targets,
                pages = report.pages,
                written = report.writes.written,
                "venue checkin sync finished"
            );
        }
        RunOutcome::Halted(reason) => {
            warn!(%reason, feed_calls = tokens.calls(), "venue checkin sync stopped by feed");
        }
    }
    Ok(())
}
