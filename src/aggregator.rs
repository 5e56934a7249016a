//! One scrape-classify-count cycle across every configured source.
//!
//! Fetches fan out concurrently (bounded by [`AggregatorSettings::max_workers`])
//! and all of them finish before any classification starts. Each source's
//! headlines are then cut to the first `max_headlines`, classified in a single
//! call, and folded into the cycle's [`FrequencyTable`].
//!
//! A failed fetch or classification never aborts the cycle; it is recorded in
//! the [`CycleReport`] and the remaining sources carry on.

use crate::classifier::{Classify, ClassifyError};
use crate::models::{CycleReport, FailureStage, FrequencyTable, SentimentLabel, Source, SourceFailure};
use crate::scrapers::{FetchHeadlines, SourceOutcome, pseudo_headline};
use chrono::Local;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

/// Upper bound on concurrent fetches regardless of how many sources exist.
pub const MAX_FETCH_WORKERS: usize = 8;

/// What to do with a source whose fetch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Leave it out of the table; it only shows up in the report's failures.
    #[default]
    Exclude,
    /// Classify the `"Error fetching …"` pseudo-headline and count it like
    /// any other headline.
    Classify,
}

/// Per-cycle knobs for an [`Aggregator`].
///
/// The defaults poll with up to [`MAX_FETCH_WORKERS`] concurrent fetches,
/// classify the first 10 headlines per source, give each classifier call 60
/// seconds, and exclude failed sources from the counts.
#[derive(Debug, Clone)]
pub struct AggregatorSettings {
    /// Headlines per source sent to the classifier; the rest are dropped.
    pub max_headlines: usize,
    /// Budget for one classifier call.
    pub classify_timeout: Duration,
    /// How a failed fetch is accounted for.
    pub failure_policy: FailurePolicy,
    /// Concurrent fetch limit; capped again by the number of sources.
    pub max_workers: usize,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            max_headlines: 10,
            classify_timeout: Duration::from_secs(60),
            failure_policy: FailurePolicy::default(),
            max_workers: MAX_FETCH_WORKERS,
        }
    }
}

/// Keep the first `cap` headlines in document order.
///
/// # Arguments
///
/// * `headlines` - One source's headlines, as scraped
/// * `cap` - Maximum number to keep
///
/// # Returns
///
/// The leading `cap` headlines, or all of them if there are fewer.
///
/// # Examples
///
/// ```ignore
/// let kept = truncate_headlines(vec!["a".into(), "b".into(), "c".into()], 2);
/// assert_eq!(kept, vec!["a", "b"]);
/// ```
pub fn truncate_headlines(mut headlines: Vec<String>, cap: usize) -> Vec<String> {
    headlines.truncate(cap);
    headlines
}

/// Runs scrape-classify-count cycles over a fixed list of sources.
///
/// The fetcher, classifier and sources are fixed at construction; every
/// [`run_cycle`](Aggregator::run_cycle) starts from an empty table, so
/// nothing carries over between cycles.
pub struct Aggregator<F, C> {
    fetcher: F,
    classifier: Arc<C>,
    sources: Vec<Source>,
    settings: AggregatorSettings,
}

impl<F, C> Aggregator<F, C>
where
    F: FetchHeadlines,
    C: Classify,
{
    /// Build an aggregator.
    ///
    /// # Arguments
    ///
    /// * `fetcher` - Turns a [`Source`] into headlines or a failure
    /// * `classifier` - Shared, read-only for the life of the process
    /// * `sources` - Sites polled every cycle
    /// * `settings` - Batch cap, classifier timeout and failure policy
    ///
    /// # Example
    ///
    /// ```ignore
    /// let aggregator = Aggregator::new(
    ///     HttpFetcher::new(Duration::from_secs(5))?,
    ///     Arc::new(LexiconClassifier::new()),
    ///     default_sources(),
    ///     AggregatorSettings::default(),
    /// );
    /// let report = aggregator.run_cycle().await;
    /// ```
    pub fn new(fetcher: F, classifier: Arc<C>, sources: Vec<Source>, settings: AggregatorSettings) -> Self {
        Self {
            fetcher,
            classifier,
            sources,
            settings,
        }
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn settings(&self) -> &AggregatorSettings {
        &self.settings
    }

    /// Run one full cycle and return its table and failures.
    ///
    /// Every source is fetched before any is classified. Each source's batch
    /// gets exactly one classifier call, and the per-source counts are summed
    /// into the cycle's table, so the result does not depend on which fetch
    /// finished first.
    ///
    /// # Returns
    ///
    /// A [`CycleReport`] whose `table` holds one count per classified
    /// headline and whose `failures` list every source that was skipped or
    /// counted as a pseudo-headline.
    #[instrument(level = "info", skip_all, fields(sources = self.sources.len()))]
    pub async fn run_cycle(&self) -> CycleReport {
        let started_at = Local::now();
        let t0 = Instant::now();

        let workers = self.settings.max_workers.min(self.sources.len()).max(1);
        let fetcher = &self.fetcher;
        let outcomes: Vec<(&Source, SourceOutcome)> = stream::iter(self.sources.iter())
            .map(move |source| async move { (source, fetcher.fetch_source(source).await) })
            .buffer_unordered(workers)
            .collect()
            .await;
        debug!(workers, elapsed_ms = t0.elapsed().as_millis(), "All fetches joined");

        let mut table = FrequencyTable::new();
        let mut failures = Vec::new();
        let mut classified = 0usize;

        for (source, outcome) in outcomes {
            let headlines = match outcome {
                SourceOutcome::Fetched(headlines) => headlines,
                SourceOutcome::Failed(e) => {
                    warn!(source = %source.name, url = %source.url, error = %e, "Source failed this cycle");
                    crate::publish_error!(
                        "awful_sentiment_tracker",
                        event_kind = "source.failed",
                        source = source.name.clone(),
                        url = source.url.clone(),
                        reason = e.to_string(),
                        "Source fetch failed"
                    );
                    let pseudo = pseudo_headline(&source.url, &e);
                    failures.push(SourceFailure::new(source, FailureStage::Fetch, e));
                    match self.settings.failure_policy {
                        FailurePolicy::Exclude => continue,
                        FailurePolicy::Classify => vec![pseudo],
                    }
                }
            };

            let fetched = headlines.len();
            let batch = truncate_headlines(headlines, self.settings.max_headlines);
            if batch.is_empty() {
                debug!(source = %source.name, "No headlines to classify");
                continue;
            }

            match self.classify_batch(&batch).await {
                Ok(labels) => {
                    let source_table = FrequencyTable::from_labels(labels);
                    debug!(source = %source.name, fetched, classified = source_table.total(), "Classified source");
                    classified += source_table.total() as usize;
                    table.merge(&source_table);
                }
                Err(e) => {
                    error!(source = %source.name, batch = batch.len(), error = %e, "Classification failed; skipping source this cycle");
                    crate::publish_error!(
                        "awful_sentiment_tracker",
                        event_kind = "classifier.failed",
                        source = source.name.clone(),
                        reason = e.to_string(),
                        "Classification failed"
                    );
                    failures.push(SourceFailure::new(source, FailureStage::Classify, e));
                }
            }
        }

        let report = CycleReport {
            started_at,
            elapsed: t0.elapsed(),
            sources: self.sources.len(),
            classified,
            table,
            failures,
        };
        info!(
            classified = report.classified,
            labels = report.table.len(),
            fetch_failures = report.fetch_failures(),
            classifier_failures = report.classifier_failures(),
            elapsed_ms = report.elapsed.as_millis(),
            "Cycle aggregated"
        );
        report
    }

    /// One classifier call under the configured timeout, checked for length.
    async fn classify_batch(&self, batch: &[String]) -> Result<Vec<SentimentLabel>, ClassifyError> {
        let limit = self.settings.classify_timeout;
        let labels = tokio::time::timeout(limit, self.classifier.classify(batch))
            .await
            .map_err(|_| ClassifyError::Timeout(limit))??;
        if labels.len() != batch.len() {
            return Err(ClassifyError::LengthMismatch {
                expected: batch.len(),
                got: labels.len(),
            });
        }
        Ok(labels)
    }
}
