//! The refresh loop: aggregate, push, idle, repeat until cancelled.

use crate::aggregator::Aggregator;
use crate::classifier::Classify;
use crate::outputs::{ChartFrame, RenderError, RenderSink};
use crate::scrapers::FetchHeadlines;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

/// Pacing for [`run`].
#[derive(Debug, Clone)]
pub struct LoopSettings {
    /// Pause between the end of one push and the start of the next cycle.
    pub interval: Duration,
    /// Stop after this many completed cycles; `None` runs until cancelled.
    pub max_cycles: Option<u64>,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
            max_cycles: None,
        }
    }
}

/// Drive `aggregator` into `sink` until `cancel` fires or the cycle limit is hit.
///
/// Cancellation is observed before each cycle, while a cycle is in flight,
/// and during the idle period. The sink gets to watch for input during both
/// of the latter, so a quit key never waits for a slow classifier.
///
/// # Arguments
///
/// * `aggregator` - Produces one [`CycleReport`](crate::models::CycleReport) per cycle
/// * `sink` - Receives a [`ChartFrame`] after every cycle
/// * `settings` - Idle interval and optional cycle limit
/// * `cancel` - Stops the loop when fired; the sink may fire it too
///
/// # Returns
///
/// The number of frames pushed, or the first [`RenderError`] from the sink.
#[instrument(level = "info", skip_all, fields(interval_secs = settings.interval.as_secs(), max_cycles = ?settings.max_cycles))]
pub async fn run<F, C, S>(
    aggregator: &Aggregator<F, C>,
    sink: &mut S,
    settings: &LoopSettings,
    cancel: &CancellationToken,
) -> Result<u64, RenderError>
where
    F: FetchHeadlines,
    C: Classify,
    S: RenderSink,
{
    let mut completed = 0u64;

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let report = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            watched = sink.watch(cancel) => {
                watched?;
                break;
            }
            report = aggregator.run_cycle() => report,
        };
        completed += 1;

        info!(
            cycle = completed,
            total = report.table.total(),
            failures = report.failures.len(),
            "Cycle complete"
        );
        crate::publish_info!(
            "awful_sentiment_tracker",
            event_kind = "cycle.completed",
            cycle = completed,
            counts = &report.table,
            fetch_failures = report.fetch_failures(),
            classifier_failures = report.classifier_failures(),
            "Sentiment cycle completed"
        );

        sink.push(ChartFrame::from_report(completed, &report)).await?;
        // Give the sink a turn to flush before settling into the idle period.
        tokio::task::yield_now().await;

        if settings.max_cycles.is_some_and(|max| completed >= max) {
            info!(cycles = completed, "Cycle limit reached");
            break;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            idled = sink.idle(settings.interval, cancel) => idled?,
        }
    }

    info!(cycles = completed, "Render loop stopped");
    Ok(completed)
}
