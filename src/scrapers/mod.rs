//! Headline scraping.
//!
//! A fetch turns one [`Source`] into a [`SourceOutcome`]: either the ordered
//! headlines found on the page or the reason the page could not be read.
//! Nothing below this boundary is allowed to abort a cycle.
//!
//! The [`headlines`] module holds the HTTP implementation; anything else that
//! can produce headlines for a source (a stub in tests, say) implements
//! [`FetchHeadlines`].

pub mod headlines;

use crate::models::Source;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub use headlines::HttpFetcher;

/// Why a source produced no headlines this cycle.
///
/// An HTTP error status is not in this list: the page that came back is
/// still scraped, and a block page usually just yields no headlines.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("could not read response body: {0}")]
    Body(#[source] reqwest::Error),
}

/// Result of fetching one source.
#[derive(Debug)]
pub enum SourceOutcome {
    /// Headlines in document order; may be empty.
    Fetched(Vec<String>),
    Failed(FetchError),
}

impl SourceOutcome {
    /// Whether the fetch failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, SourceOutcome::Failed(_))
    }

    /// Collapse to a plain headline list, turning a failure into a single
    /// pseudo-headline that names the URL and the error.
    pub fn into_headlines(self, url: &str) -> Vec<String> {
        match self {
            SourceOutcome::Fetched(headlines) => headlines,
            SourceOutcome::Failed(e) => vec![pseudo_headline(url, &e)],
        }
    }
}

impl From<Result<Vec<String>, FetchError>> for SourceOutcome {
    fn from(result: Result<Vec<String>, FetchError>) -> Self {
        match result {
            Ok(headlines) => SourceOutcome::Fetched(headlines),
            Err(e) => SourceOutcome::Failed(e),
        }
    }
}

/// The text a failed source contributes when failures are classified.
///
/// # Examples
///
/// ```ignore
/// let text = pseudo_headline("https://www.reuters.com/", &FetchError::Timeout(Duration::from_secs(5)));
/// assert_eq!(text, "Error fetching https://www.reuters.com/: timed out after 5s");
/// ```
pub fn pseudo_headline(url: &str, error: &dyn fmt::Display) -> String {
    format!("Error fetching {url}: {error}")
}

/// Anything that can scrape headlines for a [`Source`].
///
/// Implementations must not fail: errors are reported through
/// [`SourceOutcome::Failed`].
pub trait FetchHeadlines {
    /// Fetch one source's headlines.
    ///
    /// # Arguments
    ///
    /// * `source` - The site to scrape
    ///
    /// # Returns
    ///
    /// [`SourceOutcome::Fetched`] with the headlines in document order
    /// (possibly none), or [`SourceOutcome::Failed`] with the reason.
    async fn fetch_source(&self, source: &Source) -> SourceOutcome;
}
