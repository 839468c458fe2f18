use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A checkin as returned by the feed. Fields the sync does not interpret are
/// kept in `extra` so the record can be stored verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Checkin {
    pub checkin_id: u64,
    #[serde(with = "rfc2822")]
    pub created_at: DateTime<Utc>,
    pub beer: Beer,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Beer {
    pub bid: u64,
    pub beer_name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Checkin {
    /// Title used for the destination post: `"{checkin_id} - {beer_name}"`.
    pub fn post_title(&self) -> String {
        format!("{} - {}", self.checkin_id, self.beer.beer_name)
    }
}

/// A named geographic point the location feed is queried around.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub label: String,
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    pub fn new(label: &str, lat: f64, lng: f64) -> Self {
        Self {
            label: label.to_string(),
            lat,
            lng,
        }
    }
}

/// Entry of the venue fixture.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Venue {
    pub id: u64,
    pub label: String,
}

/// Store as reported by the liquor-inventory collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoreRecord {
    pub store_number: u32,
    pub label: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub address01: String,
    #[serde(default)]
    pub address02: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub manager: String,
    #[serde(default)]
    pub hours: String,
}

impl StoreRecord {
    /// Natural key of the destination map marker.
    pub fn slug(&self) -> String {
        format!("store-{}", self.store_number)
    }
}

/// Destination map marker. The store number is the numeric suffix of `slug`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreMarker {
    pub id: u64,
    pub slug: String,
}

impl StoreMarker {
    pub fn store_number(&self) -> Option<u32> {
        self.slug.rsplit('-').next()?.parse().ok()
    }
}

/// Product from the storefront catalog, as needed by the inventory sync.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogProduct {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub sku: String,
}

mod rfc2822 {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&dt.to_rfc2822())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc2822(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
