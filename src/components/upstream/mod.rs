//! Typed clients for the favorites and event services.

mod feed;
pub mod models;

pub use feed::{FeedDate, FeedDocument, FeedEntry};
pub use models::{FavoritesList, FavoritesPayload, RawEventPayload};

use crate::components::cache::ResponseCache;
use crate::config::Config;
use crate::error::{Error, GatewayError, GatewayResult};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Suffix that turns an event website URL into its feed URL
pub const FEED_SUFFIX: &str = ".ics";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const READ_TIMEOUT: Duration = Duration::from_secs(15);

/// Derive the feed URL of an event from its website URL
pub fn feed_url(website_url: &str) -> Option<String> {
    let website_url = website_url.trim();
    if website_url.is_empty() {
        return None;
    }
    Some(format!("{}{}", website_url, FEED_SUFFIX))
}

/// Gateway to the upstream services.
///
/// Event details and feeds go through their caches, favorites never do.
#[derive(Debug, Clone)]
pub struct UpstreamGateway {
    client: Client,
    favorites_base: Url,
    events_base: Url,
    event_cache: ResponseCache,
    feed_cache: ResponseCache,
}

impl UpstreamGateway {
    /// Create a gateway with in-memory caches from the configuration
    pub fn new(config: &Config) -> Result<Self, Error> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(READ_TIMEOUT)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Server(format!("Failed to build HTTP client: {}", e)))?;

        Self::with_caches(
            client,
            &config.favorites_base_url,
            &config.events_base_url,
            ResponseCache::new("events", config.cache_ttl)?,
            ResponseCache::new("ics", config.cache_ttl)?,
        )
    }

    /// Create a gateway with explicit caches
    pub fn with_caches(
        client: Client,
        favorites_base_url: &str,
        events_base_url: &str,
        event_cache: ResponseCache,
        feed_cache: ResponseCache,
    ) -> Result<Self, Error> {
        let parse = |url: &str| {
            Url::parse(url).map_err(|e| Error::Config(format!("Invalid base URL {}: {}", url, e)))
        };
        Ok(Self {
            client,
            favorites_base: parse(favorites_base_url)?,
            events_base: parse(events_base_url)?,
            event_cache,
            feed_cache,
        })
    }

    pub fn event_cache(&self) -> &ResponseCache {
        &self.event_cache
    }

    pub fn feed_cache(&self) -> &ResponseCache {
        &self.feed_cache
    }

    /// Export the metrics of both caches through `registry`
    pub fn register_metrics(&self, registry: &prometheus::Registry) -> Result<(), Error> {
        self.event_cache.register_metrics(registry)?;
        self.feed_cache.register_metrics(registry)
    }

    /// URL of the favorites of a user: `<favorites-base>/<user>`
    pub fn favorites_url(&self, user_id: &str) -> GatewayResult<Url> {
        append_segments(&self.favorites_base, &[user_id])
    }

    /// URL of the details of an event: `<events-base>/<event_id>/`
    pub fn event_url(&self, event_id: &str) -> GatewayResult<Url> {
        append_segments(&self.events_base, &[event_id, ""])
    }

    /// Look up the favorites of a user. Never cached.
    pub async fn resolve_favorites(&self, user_id: &str) -> GatewayResult<FavoritesList> {
        let url = self.favorites_url(user_id)?;
        let body = self.get_text(url).await?;
        let payload: FavoritesPayload = serde_json::from_str(&body)?;
        let favorites = FavoritesList::from(payload);
        debug!(user_id, count = favorites.len(), "resolved favorites");
        Ok(favorites)
    }

    /// Fetch the details of one event through the event cache
    pub async fn fetch_event_detail(&self, event_id: &str) -> GatewayResult<RawEventPayload> {
        let url = self.event_url(event_id)?;
        self.fetch_cached(&self.event_cache, url, |body| {
            serde_json::from_str::<RawEventPayload>(body).map_err(GatewayError::from)
        })
        .await
    }

    /// Fetch and parse the feed document at `url` through the feed cache
    pub async fn fetch_event_feed(&self, url: &str) -> GatewayResult<FeedDocument> {
        let url = Url::parse(url)
            .map_err(|e| GatewayError::MalformedPayload(format!("invalid feed URL {}: {}", url, e)))?;
        self.fetch_cached(&self.feed_cache, url, FeedDocument::parse)
            .await
    }

    /// Fetch through `cache`; only bodies that `parse` accepts are cached
    async fn fetch_cached<T>(
        &self,
        cache: &ResponseCache,
        url: Url,
        parse: impl FnOnce(&str) -> GatewayResult<T>,
    ) -> GatewayResult<T> {
        let key = url.to_string();
        cache
            .get_or_fetch_parsed(&key, move || self.get_text(url), parse)
            .await
    }

    /// GET a URL and classify the response
    async fn get_text(&self, url: Url) -> GatewayResult<String> {
        debug!(url = %url, "fetching upstream resource");
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(GatewayError::NotFound);
        }
        if !status.is_success() {
            return Err(GatewayError::UpstreamUnavailable(format!(
                "{} returned HTTP {}",
                url, status
            )));
        }
        Ok(response.text().await?)
    }
}

/// Append path segments to a base URL, percent-encoding each one
fn append_segments(base: &Url, segments: &[&str]) -> GatewayResult<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| GatewayError::UpstreamUnavailable(format!("cannot extend base URL {}", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
