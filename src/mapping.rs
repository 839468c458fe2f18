use std::collections::HashMap;

use crate::model::StoreMarker;
use crate::store::model::WpProduct;

/// Destination product a beer id maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRef {
    pub id: u64,
    pub title: String,
}

/// Beer id -> destination product. Built once per run, read-only after.
#[derive(Debug, Clone, Default)]
pub struct ProductMapping {
    by_bid: HashMap<u64, ProductRef>,
}

impl ProductMapping {
    pub fn from_products<'a>(products: impl IntoIterator<Item = &'a WpProduct>) -> Self {
        let by_bid = products
            .into_iter()
            .filter_map(|p| {
                let bid = p.untappd_id()?;
                Some((bid, ProductRef { id: p.id, title: p.title.rendered.clone() }))
            })
            .collect();
        Self { by_bid }
    }

    pub fn get(&self, bid: u64) -> Option<&ProductRef> {
        self.by_bid.get(&bid)
    }

    pub fn len(&self) -> usize {
        self.by_bid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_bid.is_empty()
    }
}

impl FromIterator<(u64, ProductRef)> for ProductMapping {
    fn from_iter<I: IntoIterator<Item = (u64, ProductRef)>>(iter: I) -> Self {
        Self { by_bid: iter.into_iter().collect() }
    }
}

/// Store number -> destination map marker id.
#[derive(Debug, Clone, Default)]
pub struct StoreMarkerMap {
    by_number: HashMap<u32, u64>,
}

impl StoreMarkerMap {
    /// Markers whose slug has no numeric suffix are ignored.
    pub fn from_markers<'a>(markers: impl IntoIterator<Item = &'a StoreMarker>) -> Self {
        let by_number = markers
            .into_iter()
            .filter_map(|m| Some((m.store_number()?, m.id)))
            .collect();
        Self { by_number }
    }

    /// Marker ids for the given store numbers, dropping unknown stores.
    pub fn marker_ids(&self, store_numbers: &[u32]) -> Vec<u64> {
        store_numbers
            .iter()
            .filter_map(|n| self.by_number.get(n).copied())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_number.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_number.is_empty()
    }
}
