//! Calendar feed fetching and timeline construction.

use async_trait::async_trait;
use calblock_core::{CalBlockError, CalBlockResult, Timeline, ics};
use chrono::{DateTime, Duration, Utc};
use tracing::warn;
use url::Url;

/// Where raw ICS text comes from. The scheduler only sees this trait;
/// tests feed it canned text.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self) -> CalBlockResult<String>;
}

/// ICS subscription feed over HTTP.
pub struct WebcalFeed {
    url: Url,
    client: reqwest::Client,
}

impl WebcalFeed {
    /// `webcal://` is the subscription-link convention calendar apps hand
    /// out; it is plain HTTPS underneath.
    pub fn new(feed_url: &str) -> CalBlockResult<Self> {
        let mut url: Url = feed_url
            .parse()
            .map_err(|e| CalBlockError::Config(format!("Invalid feed_url '{}': {}", feed_url, e)))?;

        if url.scheme() == "webcal" {
            url.set_scheme("https")
                .map_err(|_| CalBlockError::Config("Cannot rewrite webcal:// URL".into()))?;
        }

        Ok(WebcalFeed {
            url,
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl FeedSource for WebcalFeed {
    async fn fetch(&self) -> CalBlockResult<String> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| CalBlockError::FeedFetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CalBlockError::FeedFetch(format!(
                "feed returned HTTP {}",
                response.status()
            )));
        }

        response
            .text()
            .await
            .map_err(|e| CalBlockError::FeedFetch(e.to_string()))
    }
}

/// Fetch the feed and build a fresh Timeline for `now ± lookahead_days`.
///
/// Dropped events and directive recovery warnings are logged here, with the
/// event identifier, and never fail the sync.
pub async fn load_timeline(
    source: &dyn FeedSource,
    now: DateTime<Utc>,
    lookahead_days: i64,
) -> CalBlockResult<Timeline> {
    let content = source.fetch().await?;

    let range_start = now - Duration::days(lookahead_days);
    let range_end = now + Duration::days(lookahead_days);
    let feed = ics::parse_feed(&content, range_start, range_end)?;

    for skipped in &feed.skipped {
        warn!(event = %skipped, "dropped unschedulable event");
    }
    for (uid, warning) in &feed.warnings {
        warn!(event = %uid, warning = %warning, "directive markup recovered");
    }

    Ok(Timeline::new(feed.events, now))
}
