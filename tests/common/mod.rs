#![allow(dead_code)]

use anyhow::{anyhow, Result};
use beer_sync::feed::{CheckinFeed, Cursor, FeedTarget};
use beer_sync::inventory::InventorySource;
use beer_sync::limiter::PoolSettings;
use beer_sync::config::Pools;
use beer_sync::model::{Beer, CatalogProduct, Checkin, StoreMarker, StoreRecord};
use beer_sync::pagination::Page;
use beer_sync::store::model::{CatalogPage, CheckinPost, NewStoreMarker, WpProduct};
use beer_sync::store::RemoteStore;
use chrono::{Duration, Utc};
use serde_json::{json, Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::sync::Mutex;

pub fn checkin(id: u64, bid: u64, age_days: i64) -> Checkin {
    Checkin {
        checkin_id: id,
        created_at: Utc::now() - Duration::days(age_days),
        beer: Beer { bid, beer_name: format!("Beer {}", bid), extra: Map::new() },
        extra: Map::new(),
    }
}

/// `len` checkins newest first, ids counting down from `top`, all for `bid`.
/// The last (oldest) one is `oldest_age_days` old, the rest one day old.
pub fn feed_page(top: u64, len: usize, bid: u64, oldest_age_days: i64) -> Vec<Checkin> {
    (0..len)
        .map(|i| {
            let age = if i + 1 == len { oldest_age_days } else { 1 };
            checkin(top - i as u64, bid, age)
        })
        .collect()
}

pub fn product(id: u64, title: &str, bid: Option<u64>) -> WpProduct {
    let meta = match bid {
        Some(bid) => json!({ "untappd_id": bid.to_string() }),
        None => json!({ "untappd_id": "" }),
    };
    serde_json::from_value(json!({ "id": id, "title": { "rendered": title }, "meta": meta }))
        .unwrap()
}

pub fn store_record(number: u32, label: &str) -> StoreRecord {
    StoreRecord {
        store_number: number,
        label: label.to_string(),
        latitude: 40.7,
        longitude: -111.9,
        address01: format!("{} Main St", number),
        address02: "Salt Lake City, UT".into(),
        phone: "801-555-0100".into(),
        manager: "Sam".into(),
        hours: "11am-10pm".into(),
    }
}

/// Pools generous enough that tests are not paced, with small concurrency.
pub fn fast_pools() -> Pools {
    let fast = PoolSettings { concurrency: 4, frequency_limit: 1000, window_ms: 1 };
    Pools { checkin_writes: fast, venues: fast, inventory: fast, stores: fast }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedCall {
    pub token: String,
    pub target: FeedTarget,
    pub cursor: Cursor,
}

/// Feed answering from a scripted queue; an exhausted script yields empty pages.
#[derive(Clone, Default)]
pub struct ScriptedFeed {
    responses: Arc<Mutex<VecDeque<Result<Vec<Checkin>>>>>,
    calls: Arc<Mutex<Vec<FeedCall>>>,
    latency: StdDuration,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

impl ScriptedFeed {
    pub fn with_pages(pages: Vec<Result<Vec<Checkin>>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::from(pages))),
            ..Default::default()
        }
    }

    /// Every request takes `latency` before it answers.
    pub fn with_latency(mut self, latency: StdDuration) -> Self {
        self.latency = latency;
        self
    }

    pub async fn calls(&self) -> Vec<FeedCall> {
        self.calls.lock().await.clone()
    }

    /// Most requests that were ever outstanding at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl CheckinFeed for ScriptedFeed {
    async fn checkins(
        &self,
        token: &str,
        target: &FeedTarget,
        cursor: Cursor,
    ) -> Result<Vec<Checkin>> {
        self.calls.lock().await.push(FeedCall {
            token: token.to_string(),
            target: target.clone(),
            cursor,
        });
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let mut guard = self.responses.lock().await;
        guard.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// In-memory destination store recording every write.
#[derive(Clone, Default)]
pub struct RecordingStore {
    pub product_pages: Arc<Mutex<Vec<Vec<WpProduct>>>>,
    pub latest: Arc<Mutex<Option<Checkin>>>,
    pub checkin_posts: Arc<Mutex<Vec<CheckinPost>>>,
    pub fail_checkin_ids: Arc<Mutex<Vec<u64>>>,
    pub markers: Arc<Mutex<Vec<StoreMarker>>>,
    pub catalog: Arc<Mutex<Vec<Vec<CatalogProduct>>>>,
    pub catalog_requests: Arc<Mutex<Vec<u32>>>,
    pub store_updates: Arc<Mutex<Vec<(u64, Vec<u64>)>>>,
    pub created_markers: Arc<Mutex<Vec<NewStoreMarker>>>,
}

impl RecordingStore {
    pub fn with_products(pages: Vec<Vec<WpProduct>>) -> Self {
        Self { product_pages: Arc::new(Mutex::new(pages)), ..Default::default() }
    }

    pub async fn posts(&self) -> Vec<CheckinPost> {
        self.checkin_posts.lock().await.clone()
    }

    pub async fn posted_checkin_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .posts()
            .await
            .iter()
            .map(|p| serde_json::from_str::<Checkin>(&p.content).unwrap().checkin_id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub async fn updates(&self) -> HashMap<u64, Vec<u64>> {
        self.store_updates.lock().await.iter().cloned().collect()
    }

    pub async fn created(&self) -> Vec<NewStoreMarker> {
        self.created_markers.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl RemoteStore for RecordingStore {
    async fn products_page(&self, page: u32) -> Result<Page<WpProduct>> {
        let pages = self.product_pages.lock().await;
        let items = pages.get(page as usize - 1).cloned().unwrap_or_default();
        Ok(Page { items, total_pages: pages.len().max(1) as u32 })
    }

    async fn latest_checkin(&self) -> Result<Option<Checkin>> {
        Ok(self.latest.lock().await.clone())
    }

    async fn create_checkin(&self, post: &CheckinPost) -> Result<Value> {
        let stored: Checkin = serde_json::from_str(&post.content)?;
        if self.fail_checkin_ids.lock().await.contains(&stored.checkin_id) {
            return Err(anyhow!("store rejected checkin {}", stored.checkin_id));
        }
        self.checkin_posts.lock().await.push(post.clone());
        Ok(json!({ "id": stored.checkin_id }))
    }

    async fn store_markers_page(&self, page: u32) -> Result<Page<StoreMarker>> {
        let markers = self.markers.lock().await;
        // two markers per page
        let chunks: Vec<Vec<StoreMarker>> = markers.chunks(2).map(|c| c.to_vec()).collect();
        let items = chunks.get(page as usize - 1).cloned().unwrap_or_default();
        Ok(Page { items, total_pages: chunks.len().max(1) as u32 })
    }

    async fn catalog_page(&self, page: u32) -> Result<CatalogPage> {
        self.catalog_requests.lock().await.push(page);
        let catalog = self.catalog.lock().await;
        let products = catalog.get(page as usize - 1).cloned().unwrap_or_default();
        Ok(CatalogPage { page, products, has_next: (page as usize) < catalog.len() })
    }

    async fn update_product_stores(&self, product_id: u64, marker_ids: &[u64]) -> Result<Value> {
        self.store_updates.lock().await.push((product_id, marker_ids.to_vec()));
        Ok(json!({ "id": product_id }))
    }

    async fn find_store_markers(&self, slug: &str) -> Result<Vec<StoreMarker>> {
        let markers = self.markers.lock().await;
        Ok(markers.iter().filter(|m| m.slug == slug).cloned().collect())
    }

    async fn create_store_marker(&self, marker: &NewStoreMarker) -> Result<Value> {
        let mut markers = self.markers.lock().await;
        let id = 1000 + markers.len() as u64;
        markers.push(StoreMarker { id, slug: marker.slug.clone() });
        self.created_markers.lock().await.push(marker.clone());
        Ok(json!({ "id": id, "slug": marker.slug }))
    }
}

#[derive(Clone, Default)]
pub struct FakeInventory {
    pub stores: Vec<StoreRecord>,
    pub stock: HashMap<String, Vec<u32>>,
    pub lookups: Arc<Mutex<Vec<String>>>,
}

#[async_trait::async_trait]
impl InventorySource for FakeInventory {
    async fn all_stores(&self) -> Result<Vec<StoreRecord>> {
        Ok(self.stores.clone())
    }

    async fn beer_inventory(&self, sku: &str) -> Result<Vec<u32>> {
        self.lookups.lock().await.push(sku.to_string());
        self.stock
            .get(sku)
            .cloned()
            .ok_or_else(|| anyhow!("unknown sku {}", sku))
    }
}
