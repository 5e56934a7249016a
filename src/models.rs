//! Data models shared by the scrape → classify → chart pipeline.
//!
//! - [`Source`]: a news site the tracker polls every cycle
//! - [`SentimentLabel`]: a discrete tag produced by the classifier
//! - [`FrequencyTable`]: label counts for a single cycle
//! - [`CycleReport`]: the table plus what went wrong while producing it
//!
//! Nothing here outlives a cycle except the static site list.

use chrono::{DateTime, Local};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Headings whose trimmed text is this short or shorter are navigation chrome.
pub const MIN_HEADLINE_CHARS: usize = 20;

pub const POSITIVE: &str = "POSITIVE";
pub const NEGATIVE: &str = "NEGATIVE";
pub const NEUTRAL: &str = "NEUTRAL";

/// Sites polled every cycle, as `(display name, front page URL)`.
pub const SITES: [(&str, &str); 3] = [
    ("BBC", "https://www.bbc.com/news"),
    ("Reuters", "https://www.reuters.com/"),
    ("CNN", "https://edition.cnn.com/"),
];

/// A news site to scrape headlines from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Display name used in logs and failure reports.
    pub name: String,
    /// Page whose heading markup is scraped.
    pub url: String,
}

impl Source {
    /// Create a source from a display name and a front page URL.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let bbc = Source::new("BBC", "https://www.bbc.com/news");
    /// assert_eq!(bbc.host().as_deref(), Some("www.bbc.com"));
    /// ```
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }

    /// Host portion of the URL, e.g. `"www.bbc.com"`.
    pub fn host(&self) -> Option<String> {
        url::Url::parse(&self.url)
            .ok()
            .and_then(|parsed| parsed.host_str().map(str::to_string))
    }
}

/// The built-in site list as owned [`Source`] values.
pub fn default_sources() -> Vec<Source> {
    SITES
        .iter()
        .map(|(name, url)| Source::new(*name, *url))
        .collect()
}

/// A sentiment tag. The vocabulary belongs to whichever classifier produced it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SentimentLabel(String);

impl SentimentLabel {
    /// Wrap a label, trimming surrounding whitespace.
    pub fn new(label: impl AsRef<str>) -> Self {
        Self(label.as_ref().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SentimentLabel {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

/// Count of headlines per sentiment label for one cycle.
///
/// Labels iterate in sorted order so consecutive frames keep their bars in the
/// same place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FrequencyTable {
    counts: BTreeMap<SentimentLabel, u64>,
}

impl FrequencyTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a sequence of labels.
    ///
    /// # Arguments
    ///
    /// * `labels` - Labels in any order; duplicates are counted
    ///
    /// # Returns
    ///
    /// A table with one entry per distinct label.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let table = FrequencyTable::from_labels(["POSITIVE", "NEUTRAL", "POSITIVE"].map(SentimentLabel::new));
    /// assert_eq!(table.get("POSITIVE"), 2);
    /// assert_eq!(table.total(), 3);
    /// ```
    pub fn from_labels<I>(labels: I) -> Self
    where
        I: IntoIterator<Item = SentimentLabel>,
    {
        let mut table = Self::new();
        table.add_labels(labels);
        table
    }

    /// Fold a batch of labels into the running counts.
    pub fn add_labels<I>(&mut self, labels: I)
    where
        I: IntoIterator<Item = SentimentLabel>,
    {
        for (label, n) in labels.into_iter().counts() {
            *self.counts.entry(label).or_insert(0) += n as u64;
        }
    }

    /// Add every count from `other` into `self`.
    ///
    /// Merging is commutative and associative, so per-source tables can be
    /// folded in any order.
    pub fn merge(&mut self, other: &FrequencyTable) {
        for (label, n) in &other.counts {
            *self.counts.entry(label.clone()).or_insert(0) += n;
        }
    }

    /// Count for `label`, or 0 if it never occurred.
    pub fn get(&self, label: &str) -> u64 {
        self.counts
            .get(&SentimentLabel::new(label))
            .copied()
            .unwrap_or(0)
    }

    /// Sum of all counts; equals the number of classified headlines.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Number of distinct labels.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// `(label, count)` pairs in label order.
    pub fn iter(&self) -> impl Iterator<Item = (&SentimentLabel, u64)> {
        self.counts.iter().map(|(label, n)| (label, *n))
    }

    /// Distinct labels in sorted order; index-aligned with [`counts`](Self::counts).
    pub fn labels(&self) -> Vec<String> {
        self.counts.keys().map(|l| l.to_string()).collect()
    }

    /// Counts in the same order as [`labels`](Self::labels).
    pub fn counts(&self) -> Vec<u64> {
        self.counts.values().copied().collect()
    }
}

/// Which step a source failed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureStage {
    Fetch,
    Classify,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureStage::Fetch => f.write_str("fetch"),
            FailureStage::Classify => f.write_str("classify"),
        }
    }
}

/// A source that did not contribute cleanly to a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFailure {
    pub source: String,
    pub url: String,
    pub stage: FailureStage,
    pub reason: String,
}

impl SourceFailure {
    /// Record that `source` failed at `stage` for `reason`.
    pub fn new(source: &Source, stage: FailureStage, reason: impl fmt::Display) -> Self {
        Self {
            source: source.name.clone(),
            url: source.url.clone(),
            stage,
            reason: reason.to_string(),
        }
    }
}

/// Everything one cycle produced.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub started_at: DateTime<Local>,
    pub elapsed: Duration,
    /// Number of sources attempted.
    pub sources: usize,
    /// Number of headlines that received a label.
    pub classified: usize,
    pub table: FrequencyTable,
    pub failures: Vec<SourceFailure>,
}

impl CycleReport {
    /// Sources whose page could not be fetched.
    pub fn fetch_failures(&self) -> usize {
        self.failures_at(FailureStage::Fetch)
    }

    /// Sources whose batch the classifier failed or timed out on.
    pub fn classifier_failures(&self) -> usize {
        self.failures_at(FailureStage::Classify)
    }

    fn failures_at(&self, stage: FailureStage) -> usize {
        self.failures.iter().filter(|f| f.stage == stage).count()
    }
}
