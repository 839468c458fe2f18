use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{CatalogProduct, Checkin, StoreRecord};

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct Rendered {
    #[serde(default)]
    pub rendered: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct ProductMeta {
    #[serde(default)]
    pub untappd_id: Option<Value>,
}

/// Product as listed by `wp/v2/products` with the untappd meta field.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct WpProduct {
    pub id: u64,
    #[serde(default)]
    pub title: Rendered,
    #[serde(default)]
    pub meta: Option<ProductMeta>,
}

impl WpProduct {
    /// Beer id the product is linked to. Accepts a number or a numeric
    /// string; anything else means the product is not linked.
    pub fn untappd_id(&self) -> Option<u64> {
        match self.meta.as_ref()?.untappd_id.as_ref()? {
            Value::Number(n) => n.as_u64().filter(|id| *id > 0),
            Value::String(s) => s.trim().parse().ok().filter(|id| *id > 0),
            _ => None,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct RawContent {
    #[serde(default)]
    pub raw: String,
}

/// Stored checkin post as returned with `context=edit`.
#[derive(Deserialize, Debug, Clone)]
pub struct StoredCheckin {
    #[serde(default)]
    pub content: RawContent,
}

impl StoredCheckin {
    pub fn checkin(&self) -> Result<Checkin> {
        serde_json::from_str(&self.content.raw).context("stored checkin content is not a checkin")
    }
}

/// Checkin stored in the first post of a newest-first listing; no posts
/// means nothing has been synced yet.
pub fn latest_stored_checkin(stored: &[StoredCheckin]) -> Result<Option<Checkin>> {
    stored.first().map(StoredCheckin::checkin).transpose()
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct MetaEntry {
    pub key: String,
    pub value: Value,
}

/// Body of a `POST checkins` request.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CheckinPost {
    pub title: String,
    pub content: String,
    pub meta_data: Vec<MetaEntry>,
    pub parent: u64,
    pub status: String,
}

impl CheckinPost {
    pub fn new(checkin: &Checkin, parent: u64) -> Result<Self> {
        let content = serde_json::to_string(checkin).context("failed to serialize checkin")?;
        Ok(Self {
            title: checkin.post_title(),
            content,
            meta_data: vec![
                MetaEntry { key: "untappd_id".into(), value: Value::from(checkin.beer.bid) },
                MetaEntry {
                    key: "untappd_checkin_id".into(),
                    value: Value::from(checkin.checkin_id),
                },
            ],
            parent,
            status: "publish".into(),
        })
    }
}

/// Body of a `POST stores` request.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct NewStoreMarker {
    pub name: String,
    pub slug: String,
    pub latitude: f64,
    pub longitude: f64,
    pub info_window: String,
}

impl From<&StoreRecord> for NewStoreMarker {
    fn from(store: &StoreRecord) -> Self {
        let info_window = [
            format!("<strong>Address:</strong> {}<br/>{}", store.address01, store.address02),
            format!("<strong>Phone:</strong> {}", store.phone),
            format!("<strong>Manager:</strong> {}", store.manager),
            format!("<strong>Store Hours:</strong> {}", store.hours),
        ]
        .join("<br/>");
        Self {
            name: store.label.clone(),
            slug: store.slug(),
            latitude: store.latitude,
            longitude: store.longitude,
            info_window,
        }
    }
}

/// One page of the storefront catalog; `has_next` comes from the `Link` header.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogPage {
    pub page: u32,
    pub products: Vec<CatalogProduct>,
    pub has_next: bool,
}
