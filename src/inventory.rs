//! Liquor-control inventory collaborator.
//!
//! The wire format belongs to the upstream service; [`DabcClient`] expects a
//! JSON front for it exposing `stores` and `inventory/{sku}`.
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::model::StoreRecord;

#[async_trait]
pub trait InventorySource: Send + Sync {
    async fn all_stores(&self) -> Result<Vec<StoreRecord>>;

    /// Numbers of the stores currently stocking `sku`.
    async fn beer_inventory(&self, sku: &str) -> Result<Vec<u32>>;
}

#[derive(Deserialize, Debug)]
struct InventoryResp {
    #[serde(default)]
    stores: Vec<InventoryStore>,
}

#[derive(Deserialize, Debug)]
struct InventoryStore {
    store: serde_json::Value,
}

impl InventoryStore {
    fn number(&self) -> Option<u32> {
        match &self.store {
            serde_json::Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct DabcClient {
    http: Client,
    base_url: Url,
}

impl fmt::Debug for DabcClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DabcClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl DabcClient {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .user_agent("beer-sync/0.1")
            .timeout(timeout)
            .build()
            .context("failed to build inventory http client")?;
        Ok(Self { http, base_url })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        let base_url = Url::parse(&cfg.inventory.url).context("invalid inventory.url")?;
        Self::new(base_url, cfg.app.request_timeout())
    }

    /// Endpoint below the base url; each segment is percent-encoded.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("inventory base URL cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_text(&self, segments: &[&str]) -> Result<String> {
        let url = self.endpoint(segments)?;
        debug!(%url, "inventory request");
        let res = self
            .http
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("failed to reach inventory at {}", url))?
            .error_for_status()
            .context("inventory request failed")?;
        res.text().await.context("failed to read inventory response")
    }
}

#[async_trait]
impl InventorySource for DabcClient {
    async fn all_stores(&self) -> Result<Vec<StoreRecord>> {
        let body = self.get_text(&["stores"]).await?;
        serde_json::from_str(&body).map_err(|err| {
            warn!(body = %body, "inventory returned unreadable store list");
            anyhow::Error::new(err).context("invalid inventory store list")
        })
    }

    async fn beer_inventory(&self, sku: &str) -> Result<Vec<u32>> {
        let body = self.get_text(&["inventory", sku]).await?;
        parse_store_numbers(&body).map_err(|err| {
            warn!(sku, body = %body, "inventory returned unreadable stock list");
            err
        })
    }
}

/// Store numbers from an inventory response; unparseable entries are dropped.
pub fn parse_store_numbers(body: &str) -> Result<Vec<u32>> {
    let resp: InventoryResp = serde_json::from_str(body).context("invalid inventory JSON")?;
    Ok(resp.stores.iter().filter_map(InventoryStore::number).collect())
}
