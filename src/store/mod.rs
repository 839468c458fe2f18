use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::model::{CatalogProduct, Checkin, StoreMarker};
use crate::pagination::{has_next_link, total_pages, Page};
use crate::store::model::{
    latest_stored_checkin, CatalogPage, CheckinPost, NewStoreMarker, StoredCheckin, WpProduct,
};

pub mod model;

const PER_PAGE: u32 = 100;
const WP_API: &str = "wp-json/wp/v2/";
const WC_API: &str = "wp-json/wc/v2/";

/// Destination store: WordPress content API plus the WooCommerce catalog.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Products carrying the untappd meta field.
    async fn products_page(&self, page: u32) -> Result<Page<WpProduct>>;

    /// Checkin most recently stored at the destination, if any.
    async fn latest_checkin(&self) -> Result<Option<Checkin>>;

    async fn create_checkin(&self, post: &CheckinPost) -> Result<Value>;

    async fn store_markers_page(&self, page: u32) -> Result<Page<StoreMarker>>;

    async fn catalog_page(&self, page: u32) -> Result<CatalogPage>;

    async fn update_product_stores(&self, product_id: u64, marker_ids: &[u64]) -> Result<Value>;

    async fn find_store_markers(&self, slug: &str) -> Result<Vec<StoreMarker>>;

    async fn create_store_marker(&self, marker: &NewStoreMarker) -> Result<Value>;
}

#[derive(Clone)]
pub struct WpClient {
    http: Client,
    base_url: Url,
    consumer_key: String,
    consumer_secret: String,
}

impl fmt::Debug for WpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WpClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl WpClient {
    pub fn new(
        base_url: Url,
        consumer_key: String,
        consumer_secret: String,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .user_agent("beer-sync/0.1")
            .timeout(timeout)
            .build()
            .context("failed to build remote store http client")?;
        Ok(Self {
            http,
            base_url,
            consumer_key,
            consumer_secret,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        let base_url = Url::parse(&cfg.store.url).context("invalid store.url")?;
        Self::new(
            base_url,
            cfg.store.consumer_key.clone(),
            cfg.store.consumer_secret.clone(),
            cfg.app.request_timeout(),
        )
    }

    fn endpoint(&self, api: &str, path: &str) -> Result<Url> {
        self.base_url
            .join(api)
            .and_then(|u| u.join(path))
            .context("invalid remote store base URL")
    }

    pub fn build_request<B: Serialize>(
        &self,
        method: Method,
        api: &str,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<reqwest::Request> {
        let mut builder = self
            .http
            .request(method, self.endpoint(api, path)?)
            .basic_auth(&self.consumer_key, Some(&self.consumer_secret))
            .query(query);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        builder.build().context("failed to build remote store request")
    }

    async fn execute<T: DeserializeOwned>(&self, request: reqwest::Request) -> Result<(HeaderMap, T)> {
        let method = request.method().clone();
        let url = request.url().clone();
        debug!(%method, %url, "remote store request");
        let res = self
            .http
            .execute(request)
            .await
            .with_context(|| format!("failed to reach remote store at {}", url))?;

        let status = res.status();
        let headers = res.headers().clone();
        let body = res.text().await.context("failed to read remote store response")?;
        if !status.is_success() {
            warn!(%method, %url, %status, body = %body, "remote store error");
            return Err(anyhow!("remote store error {}: {}", status, body));
        }
        match serde_json::from_str(&body) {
            Ok(parsed) => Ok((headers, parsed)),
            Err(err) => {
                warn!(%method, %url, body = %body, "remote store returned non-JSON body");
                Err(err).context("invalid remote store response JSON")
            }
        }
    }

    /// Newest checkin post first, with the raw stored content.
    fn latest_checkin_query() -> [(&'static str, String); 4] {
        [
            ("per_page", "1".to_string()),
            ("orderby", "date".to_string()),
            ("order", "desc".to_string()),
            ("context", "edit".to_string()),
        ]
    }

    fn page_query(page: u32) -> Vec<(&'static str, String)> {
        vec![("per_page", PER_PAGE.to_string()), ("page", page.to_string())]
    }
}

#[async_trait]
impl RemoteStore for WpClient {
    async fn products_page(&self, page: u32) -> Result<Page<WpProduct>> {
        let mut query = Self::page_query(page);
        for field in ["id", "title", "meta.untappd_id"] {
            query.push(("fields", field.to_string()));
        }
        let request = self.build_request::<()>(Method::GET, WP_API, "products", &query, None)?;
        let (headers, items) = self.execute(request).await?;
        Ok(Page { items, total_pages: total_pages(&headers) })
    }

    async fn latest_checkin(&self) -> Result<Option<Checkin>> {
        let request = self.build_request::<()>(
            Method::GET,
            WP_API,
            "checkins",
            &Self::latest_checkin_query(),
            None,
        )?;
        let (_, stored): (_, Vec<StoredCheckin>) = self.execute(request).await?;
        latest_stored_checkin(&stored)
    }

    async fn create_checkin(&self, post: &CheckinPost) -> Result<Value> {
        let request = self.build_request(Method::POST, WP_API, "checkins", &[], Some(post))?;
        let (_, created) = self.execute(request).await?;
        Ok(created)
    }

    async fn store_markers_page(&self, page: u32) -> Result<Page<StoreMarker>> {
        let query = Self::page_query(page);
        let request = self.build_request::<()>(Method::GET, WP_API, "stores", &query, None)?;
        let (headers, items) = self.execute(request).await?;
        Ok(Page { items, total_pages: total_pages(&headers) })
    }

    async fn catalog_page(&self, page: u32) -> Result<CatalogPage> {
        let query = Self::page_query(page);
        let request = self.build_request::<()>(Method::GET, WC_API, "products", &query, None)?;
        let (headers, products): (_, Vec<CatalogProduct>) = self.execute(request).await?;
        Ok(CatalogPage { page, products, has_next: has_next_link(&headers) })
    }

    async fn update_product_stores(&self, product_id: u64, marker_ids: &[u64]) -> Result<Value> {
        let body = json!({ "stores": marker_ids });
        let path = format!("product/{}", product_id);
        let request = self.build_request(Method::PUT, WP_API, &path, &[], Some(&body))?;
        let (_, updated) = self.execute(request).await?;
        Ok(updated)
    }

    async fn find_store_markers(&self, slug: &str) -> Result<Vec<StoreMarker>> {
        let query = [("slug", slug.to_string())];
        let request = self.build_request::<()>(Method::GET, WP_API, "stores", &query, None)?;
        let (_, found) = self.execute(request).await?;
        Ok(found)
    }

    async fn create_store_marker(&self, marker: &NewStoreMarker) -> Result<Value> {
        let request = self.build_request(Method::POST, WP_API, "stores", &[], Some(marker))?;
        let (_, created) = self.execute(request).await?;
        Ok(created)
    }
}
