//! Job drivers: wire the fetchers, walkers and pools for each sync job.
//!
//! Feed quota/parameter errors surface as [`RunOutcome::Halted`] so the
//! binaries decide how to stop; every other error is returned as is.
use anyhow::{Context, Result};
use tracing::{debug, error, info, instrument};

use crate::config::Pools;
use crate::feed::{CheckinFeed, FeedError, FeedTarget};
use crate::inventory::InventorySource;
use crate::limiter::TaskPool;
use crate::mapping::{ProductMapping, StoreMarkerMap};
use crate::model::{CatalogProduct, Location, StoreRecord, Venue};
use crate::pagination::fetch_all;
use crate::rotator::TokenRotator;
use crate::store::model::NewStoreMarker;
use crate::store::RemoteStore;
use crate::walker::{BackfillWalker, UnderfullPolicy, WalkSummary};
use crate::writer::{CheckinWriter, WriteReport};

/// Result of a job that talks to the checkin feed.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome<R> {
    Completed(R),
    /// The feed refused further requests; the run stopped early.
    Halted(FeedError),
}

/// The four points the location job walks, in order.
pub fn default_locations() -> Vec<Location> {
    vec![
        Location::new("Salt Lake City / Park City", 40.611763, -111.692505),
        Location::new("Ogden", 41.405450, -111.928711),
        Location::new("St George", 37.326052, -113.532715),
        Location::new("Moab", 38.824303, -109.632568),
    ]
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CheckinReport {
    pub targets: usize,
    pub pages: usize,
    pub writes: WriteReport,
}

impl CheckinReport {
    fn add(&mut self, walk: &WalkSummary) {
        self.targets += 1;
        self.pages += walk.pages;
        self.writes.merge(walk.writes);
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InventoryReport {
    pub pages: usize,
    pub processed: usize,
    pub updated: usize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StoreReport {
    pub processed: usize,
    pub created: usize,
    pub existing: usize,
}

/// Turn a feed quota/parameter error into [`RunOutcome::Halted`].
pub fn halt_on_feed_error<R>(res: Result<R>) -> Result<RunOutcome<R>> {
    match res {
        Ok(report) => Ok(RunOutcome::Completed(report)),
        Err(err) => match err.downcast_ref::<FeedError>() {
            Some(feed_err) => {
                match feed_err {
                    FeedError::RateLimited { .. } => {
                        error!(error = %feed_err, "***** Hit Untappd Rate Limit *****")
                    }
                    FeedError::InvalidParam { .. } => {
                        error!(error = %feed_err, "checkin feed rejected the request; stopping")
                    }
                }
                Ok(RunOutcome::Halted(feed_err.clone()))
            }
            None => Err(err),
        },
    }
}

/// Full scan of destination products into a beer id mapping.
pub async fn load_product_mapping(store: &dyn RemoteStore) -> Result<ProductMapping> {
    let products = fetch_all(|page| store.products_page(page))
        .await
        .context("failed to load destination products")?;
    let mapping = ProductMapping::from_products(&products);
    info!(products = products.len(), mapped = mapping.len(), "product mapping built");
    Ok(mapping)
}

/// Id of the newest checkin already stored at the destination.
pub async fn load_checkpoint(store: &dyn RemoteStore) -> Result<Option<u64>> {
    let checkpoint = store
        .latest_checkin()
        .await
        .context("failed to read last stored checkin")?
        .map(|c| c.checkin_id);
    info!(checkpoint = ?checkpoint, "checkpoint loaded");
    Ok(checkpoint)
}

/// Location job: walk each location in turn, each walk finishing before the
/// next starts.
#[instrument(skip_all, fields(locations = locations.len()))]
pub async fn sync_locations(
    store: &dyn RemoteStore,
    feed: &dyn CheckinFeed,
    tokens: &TokenRotator,
    pools: &Pools,
    locations: &[Location],
) -> Result<RunOutcome<CheckinReport>> {
    let mapping = load_product_mapping(store).await?;
    let checkpoint = load_checkpoint(store).await?;
    let writer = CheckinWriter::new(store, &mapping, TaskPool::new(pools.checkin_writes));
    let walker = BackfillWalker::new(feed, tokens, writer, UnderfullPolicy::ByMode);

    let mut report = CheckinReport::default();
    for location in locations {
        info!(location = %location.label, "backfilling location");
        let target = FeedTarget::Location { lat: location.lat, lng: location.lng };
        match halt_on_feed_error(walker.walk(&target, checkpoint).await)? {
            RunOutcome::Completed(walk) => report.add(&walk),
            RunOutcome::Halted(err) => return Ok(RunOutcome::Halted(err)),
        }
    }
    info!(
        targets = report.targets,
        pages = report.pages,
        written = report.writes.written,
        skipped = report.writes.skipped,
        "location sync complete"
    );
    Ok(RunOutcome::Completed(report))
}

/// Venue job: venues go through the venue pool, every walk starting from the
/// same checkpoint.
#[instrument(skip_all, fields(venues = venues.len()))]
pub async fn sync_venues(
    store: &dyn RemoteStore,
    feed: &dyn CheckinFeed,
    tokens: &TokenRotator,
    pools: &Pools,
    venues: &[Venue],
) -> Result<RunOutcome<CheckinReport>> {
    let mapping = load_product_mapping(store).await?;
    let checkpoint = load_checkpoint(store).await?;
    let writer = CheckinWriter::new(store, &mapping, TaskPool::new(pools.checkin_writes));
    let walker = BackfillWalker::new(feed, tokens, writer, UnderfullPolicy::AlwaysOldest);
    let walker = &walker;

    let walks = TaskPool::new(pools.venues)
        .run(venues, |venue| async move {
            info!(venue = %venue.label, id = venue.id, "backfilling venue");
            walker.walk(&FeedTarget::Venue(venue.id), checkpoint).await
        })
        .await;

    let outcome = halt_on_feed_error(walks.map(|walks| {
        let mut report = CheckinReport::default();
        for walk in &walks {
            report.add(walk);
        }
        report
    }))?;
    if let RunOutcome::Completed(report) = &outcome {
        info!(
            targets = report.targets,
            pages = report.pages,
            written = report.writes.written,
            "venue sync complete"
        );
    }
    Ok(outcome)
}

/// Inventory job: for each catalog product, look up which stores carry it
/// and write the matching map marker ids back onto the product.
#[instrument(skip_all)]
pub async fn sync_inventory(
    store: &dyn RemoteStore,
    inventory: &dyn InventorySource,
    pools: &Pools,
) -> Result<InventoryReport> {
    let markers = fetch_all(|page| store.store_markers_page(page))
        .await
        .context("failed to load store map markers")?;
    let marker_map = StoreMarkerMap::from_markers(&markers);
    info!(markers = markers.len(), mapped = marker_map.len(), "store marker map built");

    let pool = TaskPool::new(pools.inventory);
    let marker_map = &marker_map;
    let mut report = InventoryReport::default();
    let mut page_no = 1;
    loop {
        let page = store
            .catalog_page(page_no)
            .await
            .with_context(|| format!("failed to load catalog page {}", page_no))?;
        let updated = pool
            .run(&page.products, |product| {
                update_product_stores(store, inventory, marker_map, product)
            })
            .await?;
        info!("{} beers processed.", updated.len());
        report.pages += 1;
        report.processed += updated.len();
        report.updated += updated.iter().filter(|u| **u).count();

        if !page.has_next {
            break;
        }
        page_no += 1;
    }
    Ok(report)
}

async fn update_product_stores(
    store: &dyn RemoteStore,
    inventory: &dyn InventorySource,
    marker_map: &StoreMarkerMap,
    product: &CatalogProduct,
) -> Result<bool> {
    if product.sku.trim().is_empty() {
        debug!(product = product.id, "product has no sku");
        return Ok(false);
    }
    info!("Processing {}.", product.name);
    let numbers = inventory
        .beer_inventory(&product.sku)
        .await
        .with_context(|| format!("failed to read inventory for sku {}", product.sku))?;
    let listed: Vec<String> = numbers.iter().map(ToString::to_string).collect();
    info!("{} available in stores: {}", product.name, listed.join(", "));

    let marker_ids = marker_map.marker_ids(&numbers);
    store
        .update_product_stores(product.id, &marker_ids)
        .await
        .with_context(|| format!("failed to update stores of product {}", product.id))?;
    info!("{} stores updated.", product.name);
    Ok(true)
}

/// Store job: create a map marker for every store that does not have one.
#[instrument(skip_all)]
pub async fn sync_stores(
    store: &dyn RemoteStore,
    inventory: &dyn InventorySource,
    pools: &Pools,
) -> Result<StoreReport> {
    let stores = inventory.all_stores().await.context("failed to list stores")?;
    info!("Found {} stores, syncing..", stores.len());

    let created = TaskPool::new(pools.stores)
        .run(&stores, |record| ensure_store_marker(store, record))
        .await?;
    info!("{} stores processed.", created.len());

    let created_count = created.iter().filter(|c| **c).count();
    Ok(StoreReport {
        processed: created.len(),
        created: created_count,
        existing: created.len() - created_count,
    })
}

/// Returns whether a marker was created.
async fn ensure_store_marker(store: &dyn RemoteStore, record: &StoreRecord) -> Result<bool> {
    info!("Processing {}", record.label);
    let slug = record.slug();
    let existing = store
        .find_store_markers(&slug)
        .await
        .with_context(|| format!("failed to look up {}", slug))?;
    if !existing.is_empty() {
        info!("{} already exists.", record.label);
        return Ok(false);
    }

    info!("Creating map for {}", record.label);
    store
        .create_store_marker(&NewStoreMarker::from(record))
        .await
        .with_context(|| format!("failed to create map marker {}", slug))?;
    Ok(true)
}
