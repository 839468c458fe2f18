//! Page-count driven collection fetching.
//!
//! A collection endpoint reports how many pages it has; [`fetch_all`] reads
//! page 1, then requests every remaining page at once and accumulates the
//! items. Result order is not meaningful.
use std::future::Future;

use anyhow::Result;
use futures::future::try_join_all;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::HeaderMap;
use tracing::debug;

pub const TOTAL_PAGES_HEADER: &str = "x-wp-totalpages";

/// One page of a collection plus the total page count the server reported.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_pages: u32,
}

/// Fetch every page of a collection. `fetch_page` is called with 1-based page
/// numbers. The first failing page aborts the whole fetch.
pub async fn fetch_all<T, F, Fut>(fetch_page: F) -> Result<Vec<T>>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let first = fetch_page(1).await?;
    let total = first.total_pages;
    let mut items = first.items;
    if total <= 1 {
        return Ok(items);
    }

    debug!(total_pages = total, "fetching remaining pages");
    let rest = try_join_all((2..=total).map(&fetch_page)).await?;
    for page in rest {
        items.extend(page.items);
    }
    Ok(items)
}

/// Total page count from the `x-wp-totalpages` header. A missing or garbled
/// header means a single page.
pub fn total_pages(headers: &HeaderMap) -> u32 {
    headers
        .get(TOTAL_PAGES_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u32>().ok())
        .unwrap_or(1)
        .max(1)
}

static NEXT_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<([^>]*)>\s*;\s*rel="?next"?(\s*[;,]|\s*$)"#).expect("valid link regex")
});

/// Whether an RFC 8288 `Link` header advertises a `rel="next"` page.
pub fn has_next_link(headers: &HeaderMap) -> bool {
    headers
        .get_all(reqwest::header::LINK)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.split(',').any(|part| NEXT_LINK.is_match(part)))
}
