//! Front-page heading scraper.
//!
//! Every configured site is handled the same way: one GET with a hard
//! timeout, then every `h1`, `h2` and `h3` on the page, trimmed and filtered
//! to those longer than [`MIN_HEADLINE_CHARS`] characters.

use crate::models::{MIN_HEADLINE_CHARS, Source};
use crate::scrapers::{FetchError, FetchHeadlines, SourceOutcome};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const USER_AGENT: &str = concat!("awful_sentiment_tracker/", env!("CARGO_PKG_VERSION"));

static HEADING_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("h1, h2, h3").unwrap());

/// Pull headline candidates out of an HTML document, in document order.
pub fn extract_headlines(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(&HEADING_SELECTOR)
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|text| text.chars().count() > MIN_HEADLINE_CHARS)
        .collect()
}

/// Scrapes headlines over HTTP with a shared client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    /// Build a fetcher whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(FetchError::Request)?;
        Ok(Self { client, timeout })
    }

    /// Use a preconfigured client. `timeout` should match the client's own.
    pub fn with_client(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Fetch `url` and return its headlines, or the reason it failed.
    ///
    /// A non-2xx response is logged and its body scraped like any other page.
    ///
    /// # Arguments
    ///
    /// * `url` - Front page to download
    ///
    /// # Returns
    ///
    /// The headings longer than [`MIN_HEADLINE_CHARS`], in document order, or
    /// a [`FetchError`] for a timeout, connection failure or unreadable body.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch_headlines(&self, url: &str) -> Result<Vec<String>, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.request_error(e, FetchError::Request))?;

        let status = response.status();
        if !status.is_success() {
            warn!(%url, %status, "Non-success status; scraping the page anyway");
        }

        let body = response
            .text()
            .await
            .map_err(|e| self.request_error(e, FetchError::Body))?;

        let headlines = extract_headlines(&body);
        debug!(bytes = body.len(), count = headlines.len(), "Parsed headlines");
        Ok(headlines)
    }

    /// Fetch `url`, folding any failure into a single pseudo-headline.
    ///
    /// Never fails; a broken source yields `["Error fetching <url>: <error>"]`.
    pub async fn fetch(&self, url: &str) -> Vec<String> {
        let outcome = SourceOutcome::from(self.fetch_headlines(url).await);
        if let SourceOutcome::Failed(e) = &outcome {
            warn!(%url, error = %e, "Fetch failed");
        }
        outcome.into_headlines(url)
    }

    fn request_error(&self, e: reqwest::Error, wrap: fn(reqwest::Error) -> FetchError) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            wrap(e)
        }
    }
}

impl FetchHeadlines for HttpFetcher {
    #[instrument(level = "info", skip_all, fields(source = %source.name, host = ?source.host()))]
    async fn fetch_source(&self, source: &Source) -> SourceOutcome {
        let outcome: SourceOutcome = self.fetch_headlines(&source.url).await.into();
        match &outcome {
            SourceOutcome::Fetched(headlines) => {
                info!(count = headlines.len(), "Fetched headlines")
            }
            SourceOutcome::Failed(e) => warn!(error = %e, "Source fetch failed"),
        }
        outcome
    }
}
