//! Full-screen terminal bar chart.
//!
//! Takes over the terminal (alternate screen, raw mode) for its lifetime and
//! restores it on drop. Raw mode swallows SIGINT, so terminal events are read
//! both while idle and while a cycle is in flight: the chart is redrawn on
//! resize, and `q`, `Esc` or `Ctrl-C` cancel the loop.

use crate::outputs::{ChartFrame, RenderError, RenderSink};
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::StreamExt;
use ratatui::DefaultTerminal;
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout};
use ratatui::style::{Color, Style, Stylize};
use ratatui::text::Line;
use ratatui::widgets::{Bar, BarChart, BarGroup, Block, Paragraph};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// [`RenderSink`] that owns the terminal until dropped.
///
/// Holds the last pushed frame so it can be redrawn on resize.
pub struct TerminalSink {
    terminal: DefaultTerminal,
    events: EventStream,
    current: Option<ChartFrame>,
}

impl TerminalSink {
    /// Enter the alternate screen and start listening for terminal events.
    ///
    /// # Returns
    ///
    /// The sink, or [`RenderError::Io`] when stdout is not a usable terminal.
    pub fn start() -> Result<Self, RenderError> {
        let terminal = ratatui::try_init()?;
        Ok(Self {
            terminal,
            events: EventStream::new(),
            current: None,
        })
    }

    fn redraw(&mut self) -> Result<(), RenderError> {
        let current = &self.current;
        self.terminal.draw(|f| draw(f, current.as_ref()))?;
        Ok(())
    }
}

impl Drop for TerminalSink {
    fn drop(&mut self) {
        ratatui::restore();
    }
}

impl RenderSink for TerminalSink {
    async fn push(&mut self, frame: ChartFrame) -> Result<(), RenderError> {
        self.current = Some(frame);
        self.redraw()
    }

    async fn idle(&mut self, period: Duration, cancel: &CancellationToken) -> Result<(), RenderError> {
        tokio::select! {
            _ = tokio::time::sleep(period) => Ok(()),
            watched = self.watch(cancel) => watched,
        }
    }

    async fn watch(&mut self, cancel: &CancellationToken) -> Result<(), RenderError> {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                event = self.events.next() => match event {
                    Some(Ok(Event::Resize(width, height))) => {
                        debug!(width, height, "Terminal resized");
                        self.redraw()?;
                    }
                    Some(Ok(Event::Key(key))) if is_quit(&key) => {
                        info!("Quit requested from terminal");
                        cancel.cancel();
                        return Ok(());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                    None => {
                        // Event source is gone; only the token can end this now.
                        cancel.cancelled().await;
                        return Ok(());
                    }
                },
            }
        }
    }
}

/// `q`, `Esc` or `Ctrl-C`, on key press only.
fn is_quit(key: &KeyEvent) -> bool {
    if key.kind != KeyEventKind::Press {
        return false;
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => true,
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

/// Bar colour by label: green for positive, red for negative, blue otherwise.
fn bar_color(label: &str) -> Color {
    match label.to_ascii_uppercase().as_str() {
        "POSITIVE" => Color::Green,
        "NEGATIVE" => Color::Red,
        _ => Color::Blue,
    }
}

/// Widest bar that still fits `bars` bars (plus gaps) in `width` columns.
fn bar_width(width: u16, bars: usize, gap: u16) -> u16 {
    if bars == 0 {
        return 1;
    }
    let bars = bars as u16;
    let usable = width.saturating_sub(2).saturating_sub(gap * bars.saturating_sub(1));
    (usable / bars).clamp(1, 20)
}

/// Chart above, status line below. `None` shows a placeholder until the
/// first cycle has been pushed.
fn draw(f: &mut Frame, frame: Option<&ChartFrame>) {
    let [chart_area, status_area] =
        Layout::vertical([Constraint::Min(5), Constraint::Length(1)]).areas(f.area());

    let Some(frame) = frame else {
        f.render_widget(
            Paragraph::new("Waiting for the first cycle…").block(Block::bordered()),
            chart_area,
        );
        return;
    };

    let block = Block::bordered()
        .title(Line::from(frame.title).bold().centered())
        .title_bottom(Line::from(format!("{} (x) / {} (y)", frame.x_label, frame.y_label)).centered());

    if frame.is_empty() {
        f.render_widget(Paragraph::new("No headlines classified this cycle").block(block), chart_area);
    } else {
        let bars: Vec<Bar> = frame
            .bars()
            .map(|(label, count)| {
                Bar::default()
                    .label(Line::from(label))
                    .value(count)
                    .style(Style::default().fg(bar_color(label)))
            })
            .collect();
        let gap = 2;
        let chart = BarChart::default()
            .block(block)
            .data(BarGroup::default().bars(&bars))
            .bar_width(bar_width(chart_area.width, bars.len(), gap))
            .bar_gap(gap);
        f.render_widget(chart, chart_area);
    }

    f.render_widget(Paragraph::new(frame.status.as_str()).dim(), status_area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outputs::{CHART_TITLE, X_AXIS_LABEL, Y_AXIS_LABEL};
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn test_quit_keys() {
        assert!(is_quit(&key(KeyCode::Char('q'), KeyModifiers::NONE)));
        assert!(is_quit(&key(KeyCode::Esc, KeyModifiers::NONE)));
        assert!(is_quit(&key(KeyCode::Char('c'), KeyModifiers::CONTROL)));
        assert!(!is_quit(&key(KeyCode::Char('c'), KeyModifiers::NONE)));
        assert!(!is_quit(&key(KeyCode::Enter, KeyModifiers::NONE)));
    }

    #[test]
    fn test_bar_colors() {
        assert_eq!(bar_color("POSITIVE"), Color::Green);
        assert_eq!(bar_color("negative"), Color::Red);
        assert_eq!(bar_color("NEUTRAL"), Color::Blue);
    }

    #[test]
    fn test_bar_width_fits_area() {
        assert_eq!(bar_width(80, 3, 2), 20);
        assert_eq!(bar_width(20, 3, 2), 4);
        assert_eq!(bar_width(4, 5, 2), 1);
        assert_eq!(bar_width(80, 0, 2), 1);
    }

    #[test]
    fn test_draw_renders_title_and_labels() {
        let mut terminal = Terminal::new(TestBackend::new(60, 20)).unwrap();
        let frame = ChartFrame {
            title: CHART_TITLE,
            x_label: X_AXIS_LABEL,
            y_label: Y_AXIS_LABEL,
            labels: vec!["NEGATIVE".into(), "POSITIVE".into()],
            counts: vec![1, 13],
            status: "cycle 1 | 3 of 3 sources ok".into(),
        };
        terminal.draw(|f| draw(f, Some(&frame))).unwrap();

        let buffer = terminal.backend().buffer();
        let text: String = buffer.content().iter().map(|cell| cell.symbol()).collect();
        assert!(text.contains(CHART_TITLE));
        assert!(text.contains("NEGATIVE"));
        assert!(text.contains("POSITIVE"));
        assert!(text.contains("cycle 1"));
    }

    #[test]
    fn test_draw_before_first_frame() {
        let mut terminal = Terminal::new(TestBackend::new(40, 8)).unwrap();
        terminal.draw(|f| draw(f, None)).unwrap();

        let text: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect();
        assert!(text.contains("Waiting for the first cycle"));
    }
}
