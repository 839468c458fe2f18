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
    about = "Backfill checkins around the configured locations into the store"
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
    let feed = UntappdClient::from_config(&cfg)?;
    let tokens = TokenRotator::new(cfg.untappd.tokens.clone())?;
    let locations = pipeline::default_locations();

    info!(locations = locations.len(), tokens = cfg.untappd.tokens.len(), "starting checkin sync");
    match pipeline::sync_locations(&store, &feed, &tokens, &cfg.pools, &locations).await? {
        RunOutcome::Completed(report) => {
            info!(
                pages = report.pages,
                written = report.writes.written,
                skipped = report.writes.skipped,
                "checkin sync finished"
            );
        }
        RunOutcome::Halted(reason) => {
            warn!(%reason, feed_calls = tokens.calls(), "checkin sync stopped by feed; exiting cleanly");
        }
    }
    Ok(())
}
