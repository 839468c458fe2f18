use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::feed::model::Envelope;
use crate::model::Checkin;

pub mod model;

/// Checkins per feed page. A page shorter than this is the last one.
pub const PAGE_LIMIT: usize = 25;
const LOCATION_RADIUS: u32 = 25;
const DIST_PREF: &str = "m";

/// In-band feed failures that must stop the whole run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FeedError {
    #[error("checkin feed rate limit reached: {detail}")]
    RateLimited { detail: String },
    #[error("checkin feed rejected a parameter: {detail}")]
    InvalidParam { detail: String },
}

/// What the feed is queried for.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedTarget {
    Location { lat: f64, lng: f64 },
    Venue(u64),
}

impl fmt::Display for FeedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedTarget::Location { lat, lng } => write!(f, "{},{}", lat, lng),
            FeedTarget::Venue(id) => write!(f, "venue {}", id),
        }
    }
}

/// Pagination boundary for the next feed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    /// Most recent page.
    Latest,
    /// Checkins newer than the id.
    MinId(u64),
    /// Checkins older than the id.
    MaxId(u64),
}

#[async_trait]
pub trait CheckinFeed: Send + Sync {
    /// Fetch one page (at most [`PAGE_LIMIT`] checkins, newest first).
    async fn checkins(&self, token: &str, target: &FeedTarget, cursor: Cursor)
        -> Result<Vec<Checkin>>;
}

#[derive(Clone)]
pub struct UntappdClient {
    http: Client,
    base_url: Url,
}

impl fmt::Debug for UntappdClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UntappdClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl UntappdClient {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .user_agent("beer-sync/0.1")
            .timeout(timeout)
            .build()
            .context("failed to build checkin feed http client")?;
        Ok(Self { http, base_url })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        let base_url = Url::parse(&cfg.untappd.url).context("invalid untappd.url")?;
        Self::new(base_url, cfg.app.request_timeout())
    }

    pub fn build_request(
        &self,
        token: &str,
        target: &FeedTarget,
        cursor: Cursor,
    ) -> Result<reqwest::Request> {
        let path = match target {
            FeedTarget::Location { .. } => "thepub/local".to_string(),
            FeedTarget::Venue(id) => format!("venue/checkins/{}", id),
        };
        let endpoint = self
            .base_url
            .join(&path)
            .context("invalid checkin feed base URL")?;
        self.http
            .get(endpoint)
            .query(&query_params(target, cursor))
            .query(&[("access_token", token)])
            .build()
            .context("failed to build checkin feed request")
    }
}

#[async_trait]
impl CheckinFeed for UntappdClient {
    async fn checkins(
        &self,
        token: &str,
        target: &FeedTarget,
        cursor: Cursor,
    ) -> Result<Vec<Checkin>> {
        let request = self.build_request(token, target, cursor)?;
        debug!(%target, ?cursor, "requesting checkin page");
        let res = self
            .http
            .execute(request)
            .await
            .context("failed to reach checkin feed")?;
        let status = res.status();
        let body = res
            .text()
            .await
            .context("failed to read checkin feed response")?;
        if !status.is_success() {
            debug!(%status, "checkin feed returned non-success status");
        }
        parse_checkins(&body)
    }
}

/// Query parameters for a feed page, without the access token.
pub fn query_params(target: &FeedTarget, cursor: Cursor) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();
    if let FeedTarget::Location { lat, lng } = target {
        params.push(("lat", lat.to_string()));
        params.push(("lng", lng.to_string()));
        params.push(("radius", LOCATION_RADIUS.to_string()));
        params.push(("dist_pref", DIST_PREF.to_string()));
    }
    params.push(("limit", PAGE_LIMIT.to_string()));
    match cursor {
        Cursor::Latest => {}
        Cursor::MinId(id) => params.push(("min_id", id.to_string())),
        Cursor::MaxId(id) => params.push(("max_id", id.to_string())),
    }
    params
}

/// Decode a feed response body. Quota and parameter errors come back as
/// [`FeedError`]; other in-band errors yield whatever items are present.
pub fn parse_checkins(body: &str) -> Result<Vec<Checkin>> {
    let envelope: Envelope = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(err) => {
            warn!(body, "checkin feed returned non-JSON body");
            return Err(err).context("invalid checkin feed response JSON");
        }
    };

    let detail = envelope.meta.error_detail.clone().unwrap_or_default();
    match envelope.meta.error_type.as_deref() {
        Some("invalid_limit") => return Err(FeedError::RateLimited { detail }.into()),
        Some("invalid_param") => return Err(FeedError::InvalidParam { detail }.into()),
        Some(other) => {
            error!(
                error_type = other,
                detail = %detail,
                "checkin feed reported an error; page treated as empty"
            )
        }
        None => {}
    }

    match envelope.response.pointer("/checkins/items") {
        Some(items) => serde_json::from_value(items.clone())
            .context("invalid checkin items in feed response"),
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> UntappdClient {
        UntappdClient::new(
            Url::parse("https://api.untappd.com/v4/").unwrap(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn query(request: &reqwest::Request) -> Vec<(String, String)> {
        request
            .url()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[test]
    fn location_request_carries_geo_params_and_token() {
        let target = FeedTarget::Location { lat: 40.611763, lng: -111.692505 };
        let request = client()
            .build_request("tok-1", &target, Cursor::MinId(900))
            .unwrap();
        assert_eq!(request.method(), reqwest::Method::GET);
        assert_eq!(request.url().path(), "/v4/thepub/local");
        let q = query(&request);
        assert!(q.contains(&("lat".into(), "40.611763".into())));
        assert!(q.contains(&("lng".into(), "-111.692505".into())));
        assert!(q.contains(&("radius".into(), "25".into())));
        assert!(q.contains(&("dist_pref".into(), "m".into())));
        assert!(q.contains(&("limit".into(), "25".into())));
        assert!(q.contains(&("min_id".into(), "900".into())));
        assert!(q.contains(&("access_token".into(), "tok-1".into())));
        assert!(!q.iter().any(|(k, _)| k == "max_id"));
    }

    #[test]
    fn venue_request_uses_path_id() {
        let request = client()
            .build_request("tok-2", &FeedTarget::Venue(1222), Cursor::MaxId(77))
            .unwrap();
        assert_eq!(request.url().path(), "/v4/venue/checkins/1222");
        let q = query(&request);
        assert!(q.contains(&("max_id".into(), "77".into())));
        assert!(!q.iter().any(|(k, _)| k == "lat" || k == "radius"));
    }

    #[test]
    fn parses_items_from_envelope() {
        let body = json!({
            "meta": { "code": 200 },
            "response": { "checkins": { "count": 1, "items": [{
                "checkin_id": 5,
                "created_at": "Sat, 20 Oct 2018 01:23:45 +0000",
                "beer": { "bid": 7, "beer_name": "Wasatch Apricot" }
            }] } }
        })
        .to_string();
        let items = parse_checkins(&body).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].beer.bid, 7);
    }

    #[test]
    fn quota_and_param_errors_are_typed() {
        let body = json!({
            "meta": { "code": 429, "error_type": "invalid_limit", "error_detail": "hourly limit" },
            "response": []
        })
        .to_string();
        let err = parse_checkins(&body).unwrap_err();
        assert_eq!(
            err.downcast_ref::<FeedError>(),
            Some(&FeedError::RateLimited { detail: "hourly limit".into() })
        );

        let body = json!({
            "meta": { "code": 400, "error_type": "invalid_param", "error_detail": "bad venue" },
            "response": []
        })
        .to_string();
        let err = parse_checkins(&body).unwrap_err();
        assert!(matches!(err.downcast_ref::<FeedError>(), Some(FeedError::InvalidParam { .. })));
    }

    #[test]
    fn other_errors_and_missing_items_yield_empty_page() {
        let body = json!({ "meta": { "code": 500, "error_type": "server_error" }, "response": {} })
            .to_string();
        assert!(parse_checkins(&body).unwrap().is_empty());

        let body = json!({
            "meta": { "code": 401, "error_type": "invalid_auth", "error_detail": "token revoked" },
            "response": []
        })
        .to_string();
        let items = parse_checkins(&body).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn non_json_body_is_an_error() {
        let err = parse_checkins("<html>bad gateway</html>").unwrap_err();
        assert!(err.downcast_ref::<FeedError>().is_none());
    }
}
