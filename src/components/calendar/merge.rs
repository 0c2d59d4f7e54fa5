use super::models::{CanonicalEvent, OutputCalendar};
use super::normalize::normalize;
use crate::components::cache::{Clock, SystemClock};
use crate::components::upstream::{feed_url, UpstreamGateway};
use crate::config::Config;
use crate::error::{GatewayError, GatewayResult};
use chrono_tz::Tz;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

/// Which upstream data goes into a calendar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// One entry per event, built from the event details alone
    DetailsOnly,
    /// Event details merged with each event's own feed
    WithFeeds,
}

/// Builds calendars from a user's favorites
#[derive(Clone)]
pub struct CalendarBuilder {
    gateway: UpstreamGateway,
    clock: Arc<dyn Clock>,
    creator: String,
    name: String,
    timezone: Tz,
    concurrency: usize,
    deadline: Duration,
    refresh_interval: Duration,
}

impl std::fmt::Debug for CalendarBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalendarBuilder")
            .field("creator", &self.creator)
            .field("name", &self.name)
            .field("timezone", &self.timezone)
            .field("concurrency", &self.concurrency)
            .field("deadline", &self.deadline)
            .finish()
    }
}

impl CalendarBuilder {
    pub fn new(config: &Config, gateway: UpstreamGateway) -> Self {
        Self {
            refresh_interval: gateway.event_cache().ttl(),
            gateway,
            clock: Arc::new(SystemClock),
            creator: config.creator.clone(),
            name: config.calendar_name.clone(),
            timezone: config.timezone,
            concurrency: config.fetch_concurrency.max(1),
            deadline: config.request_timeout,
        }
    }

    /// Use `clock` for calendar timestamps
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn gateway(&self) -> &UpstreamGateway {
        &self.gateway
    }

    /// Build the calendar of a user.
    ///
    /// Failing to resolve the favorites fails the whole calendar. Any failure
    /// while fetching a single event only drops that event.
    pub async fn build_calendar(&self, user_id: &str, mode: MergeMode) -> GatewayResult<OutputCalendar> {
        let deadline = Instant::now() + self.deadline;

        let favorites = timeout_at(deadline, self.gateway.resolve_favorites(user_id))
            .await
            .map_err(|_| GatewayError::UpstreamUnavailable("favorites lookup timed out".to_string()))??;

        let events: Vec<Option<CanonicalEvent>> = stream::iter(favorites.ids().to_vec())
            .map(move |event_id: String| async move {
                match timeout_at(deadline, self.build_event(&event_id, mode)).await {
                    Ok(Ok(event)) => Some(event),
                    Ok(Err(e)) => {
                        warn!(user_id, event_id = %event_id, error = %e, "skipping event");
                        None
                    }
                    Err(_) => {
                        warn!(user_id, event_id = %event_id, "skipping event, deadline exceeded");
                        None
                    }
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut calendar = self.new_calendar();
        for event in events.into_iter().flatten() {
            calendar.add_event(event);
        }

        info!(
            user_id,
            favorites = favorites.len(),
            entries = calendar.len(),
            ?mode,
            "built calendar"
        );
        debug!(
            event_cache = ?self.gateway.event_cache().stats(),
            feed_cache = ?self.gateway.feed_cache().stats(),
            "cache stats"
        );
        Ok(calendar)
    }

    /// Build a calendar holding a single event, merged with its feed.
    ///
    /// Unlike [`build_calendar`](Self::build_calendar), failures of the event
    /// are returned to the caller.
    pub async fn build_event_calendar(&self, event_id: &str) -> GatewayResult<OutputCalendar> {
        let deadline = Instant::now() + self.deadline;
        let event = timeout_at(deadline, self.build_event(event_id, MergeMode::WithFeeds))
            .await
            .map_err(|_| GatewayError::UpstreamUnavailable("event lookup timed out".to_string()))??;

        let mut calendar = self.new_calendar();
        calendar.add_event(event);
        Ok(calendar)
    }

    /// Fetch and normalize one event, absorbing its feed when asked to
    async fn build_event(&self, event_id: &str, mode: MergeMode) -> GatewayResult<CanonicalEvent> {
        let raw = self.gateway.fetch_event_detail(event_id).await?;
        let mut event = normalize(event_id, raw, &self.timezone)?;

        if mode == MergeMode::WithFeeds {
            if let Some(url) = feed_url(&event.url) {
                match self.gateway.fetch_event_feed(&url).await {
                    Ok(feed) => event.absorb_feed(feed, &self.timezone),
                    Err(e) => debug!(event_id, url = %url, error = %e, "feed unavailable, using event details"),
                }
            }
        }

        Ok(event)
    }

    fn new_calendar(&self) -> OutputCalendar {
        OutputCalendar::new(&self.creator, &self.name, self.refresh_interval, self.clock.now())
    }
}
