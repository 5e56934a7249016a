//! Rendering surfaces for the sentiment chart.
//!
//! The render loop hands every cycle's counts to a [`RenderSink`] as a
//! [`ChartFrame`] and then lets the sink idle until the next cycle.
//!
//! # Submodules
//!
//! - [`terminal`]: full-screen bar chart (ratatui + crossterm) that keeps
//!   handling resize and key events while idle
//! - [`headless`]: plain-text chart written to any `io::Write`, for pipes,
//!   logs and machines without a TTY

pub mod headless;
pub mod terminal;

use crate::models::CycleReport;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Static chart text; every frame carries these.
pub const CHART_TITLE: &str = "Live News Sentiment Tracker";
pub const X_AXIS_LABEL: &str = "Sentiment";
pub const Y_AXIS_LABEL: &str = "Count";

/// Why a sink could not show a frame.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("terminal I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// One complete chart. Each push replaces the previous frame outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartFrame {
    pub title: &'static str,
    pub x_label: &'static str,
    pub y_label: &'static str,
    /// Bar labels; `counts[i]` belongs to `labels[i]`.
    pub labels: Vec<String>,
    pub counts: Vec<u64>,
    /// One-line summary of the cycle.
    pub status: String,
}

impl ChartFrame {
    /// Build the frame for one finished cycle.
    ///
    /// # Arguments
    ///
    /// * `cycle` - 1-based cycle number, shown in the status line
    /// * `report` - The cycle's counts and failures
    ///
    /// # Returns
    ///
    /// A frame with one bar per label in the report's table and a status
    /// line like
    /// `cycle 3 | 2 of 3 sources ok | 20 headlines | 812 ms | updated 14:05:11 | failed: Reuters (fetch)`.
    pub fn from_report(cycle: u64, report: &CycleReport) -> Self {
        let failed = report.failures.len();
        let status = format!(
            "cycle {cycle} | {} of {} sources ok | {} headlines | {} ms | updated {}",
            report.sources.saturating_sub(report.fetch_failures()),
            report.sources,
            report.classified,
            report.elapsed.as_millis(),
            report.started_at.format("%H:%M:%S"),
        );
        let status = if failed > 0 {
            let names: Vec<String> = report
                .failures
                .iter()
                .map(|f| format!("{} ({})", f.source, f.stage))
                .collect();
            format!("{status} | failed: {}", names.join(", "))
        } else {
            status
        };

        Self {
            title: CHART_TITLE,
            x_label: X_AXIS_LABEL,
            y_label: Y_AXIS_LABEL,
            labels: report.table.labels(),
            counts: report.table.counts(),
            status,
        }
    }

    /// `(label, count)` pairs in display order.
    pub fn bars(&self) -> impl Iterator<Item = (&str, u64)> {
        self.labels
            .iter()
            .map(String::as_str)
            .zip(self.counts.iter().copied())
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Where frames go.
pub trait RenderSink {
    /// Show `frame`, replacing whatever was shown before.
    async fn push(&mut self, frame: ChartFrame) -> Result<(), RenderError>;

    /// Stay responsive for `period`, or until `cancel` fires.
    ///
    /// A sink may cancel the token itself, e.g. when the user presses `q`.
    async fn idle(&mut self, period: Duration, cancel: &CancellationToken) -> Result<(), RenderError>;

    /// Handle input while a cycle is in flight.
    ///
    /// Resolves once `cancel` has fired, whether the sink cancelled it or
    /// something else did. Sinks without input just wait for the token.
    async fn watch(&mut self, cancel: &CancellationToken) -> Result<(), RenderError> {
        cancel.cancelled().await;
        Ok(())
    }
}
