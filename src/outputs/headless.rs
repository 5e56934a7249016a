//! Plain-text chart for when there is no terminal to take over.

use crate::outputs::{ChartFrame, RenderError, RenderSink};
use std::io::Write;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Widest bar, in block characters.
const BAR_WIDTH: u64 = 40;

/// Render `frame` as a horizontal text bar chart.
///
/// The longest bar is [`BAR_WIDTH`] blocks wide and the rest scale to it;
/// any non-zero count gets at least one block.
///
/// # Examples
///
/// ```ignore
/// let text = render_text(&frame);
/// // Live News Sentiment Tracker
/// // NEGATIVE | ███ 1
/// // POSITIVE | ████████████████████████████████████████ 13
/// // Sentiment (x) / Count (y)
/// // cycle 1 | 3 of 3 sources ok | ...
/// ```
pub fn render_text(frame: &ChartFrame) -> String {
    let mut out = format!("{}\n", frame.title);
    if frame.is_empty() {
        out.push_str("(no headlines classified)\n");
    } else {
        let label_width = frame.labels.iter().map(|l| l.chars().count()).max().unwrap_or(0);
        let max = frame.counts.iter().copied().max().unwrap_or(0).max(1);
        for (label, count) in frame.bars() {
            let len = if count == 0 { 0 } else { (count * BAR_WIDTH).div_ceil(max) };
            out.push_str(&format!(
                "{label:<label_width$} | {} {count}\n",
                "█".repeat(len as usize)
            ));
        }
    }
    out.push_str(&format!("{} (x) / {} (y)\n{}\n", frame.x_label, frame.y_label, frame.status));
    out
}

/// [`RenderSink`] that writes each frame as text to `out`.
///
/// Frames are appended, not redrawn, so a log of stdout keeps every cycle.
/// There is no input to handle; idling is a plain cancellable sleep.
pub struct HeadlessSink<W> {
    out: W,
}

impl<W: Write> HeadlessSink<W> {
    /// Write frames to `out`, typically stdout.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Take back the writer, e.g. to inspect what was written.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> RenderSink for HeadlessSink<W> {
    async fn push(&mut self, frame: ChartFrame) -> Result<(), RenderError> {
        info!(labels = ?frame.labels, counts = ?frame.counts, "Rendering frame");
        writeln!(self.out, "{}", render_text(&frame))?;
        self.out.flush()?;
        Ok(())
    }

    async fn idle(&mut self, period: Duration, cancel: &CancellationToken) -> Result<(), RenderError> {
        tokio::select! {
            _ = tokio::time::sleep(period) => {}
            _ = cancel.cancelled() => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outputs::{CHART_TITLE, X_AXIS_LABEL, Y_AXIS_LABEL};

    fn frame(labels: &[&str], counts: &[u64]) -> ChartFrame {
        ChartFrame {
            title: CHART_TITLE,
            x_label: X_AXIS_LABEL,
            y_label: Y_AXIS_LABEL,
            labels: labels.iter().map(|l| l.to_string()).collect(),
            counts: counts.to_vec(),
            status: "cycle 1".to_string(),
        }
    }

    #[test]
    fn test_render_text_scales_to_largest_bar() {
        let text = render_text(&frame(&["NEGATIVE", "POSITIVE"], &[1, 4]));
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], CHART_TITLE);
        assert_eq!(lines[1], format!("NEGATIVE | {} 1", "█".repeat(10)));
        assert_eq!(lines[2], format!("POSITIVE | {} 4", "█".repeat(40)));
        assert_eq!(lines[3], "Sentiment (x) / Count (y)");
        assert_eq!(lines[4], "cycle 1");
    }

    #[test]
    fn test_render_text_empty_frame() {
        let text = render_text(&frame(&[], &[]));
        assert!(text.contains("(no headlines classified)"));
    }

    #[tokio::test]
    async fn test_push_writes_chart() {
        let mut sink = HeadlessSink::new(Vec::new());
        sink.push(frame(&["NEUTRAL"], &[2])).await.unwrap();
        let written = String::from_utf8(sink.into_inner()).unwrap();
        assert!(written.contains("NEUTRAL | "));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_returns_early_on_cancel() {
        let mut sink = HeadlessSink::new(Vec::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let t0 = tokio::time::Instant::now();
        sink.idle(Duration::from_secs(15), &cancel).await.unwrap();
        assert!(t0.elapsed() < Duration::from_secs(15));
    }
}
