//! Command-line interface definitions for the sentiment tracker.
//!
//! Every option has a default, so running the binary bare polls the built-in
//! sites every 15 seconds and charts them in the terminal. The site list is
//! fixed; the options only tune timing, classification and output.

use crate::aggregator::{AggregatorSettings, FailurePolicy, MAX_FETCH_WORKERS};
use crate::render_loop::LoopSettings;
use clap::{Parser, ValueEnum};
use std::time::Duration;

/// Which classifier labels the headlines.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClassifierKind {
    /// OpenAI-compatible chat model configured through `config.yaml`
    Llm,
    /// Built-in word lists; no network calls
    Lexicon,
}

/// Command-line arguments for the sentiment tracker.
///
/// # Examples
///
/// ```sh
/// # Live terminal chart using the configured model
/// awful_sentiment_tracker
///
/// # Offline classifier, text output, three cycles then exit
/// awful_sentiment_tracker --classifier lexicon --headless --cycles 3
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Seconds to wait between cycles
    #[arg(short, long, env = "SENTIMENT_INTERVAL_SECS", default_value_t = 15, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval_secs: u64,

    /// Per-site request timeout in seconds
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    pub fetch_timeout_secs: u64,

    /// Headlines per site sent to the classifier each cycle
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    pub max_headlines: u64,

    /// Seconds a single classifier call may take before the site is skipped
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
    pub classify_timeout_secs: u64,

    /// Classifier backend
    #[arg(long, value_enum, default_value_t = ClassifierKind::Llm)]
    pub classifier: ClassifierKind,

    /// Optional path to the model config.yaml
    #[arg(short, long)]
    pub config: Option<String>,

    /// Chat template used by the LLM classifier
    #[arg(short, long, default_value = "sentiment_classifier")]
    pub template: String,

    /// Print a text chart to stdout instead of taking over the terminal
    #[arg(long)]
    pub headless: bool,

    /// Stop after this many cycles
    #[arg(long)]
    pub cycles: Option<u64>,

    /// Classify and count a failed site's error message as a headline
    #[arg(long)]
    pub count_fetch_errors: bool,

    /// Write logs to this file (defaults to sentiment_tracker.log in terminal mode)
    #[arg(long, env = "SENTIMENT_LOG_FILE")]
    pub log_file: Option<String>,

    /// AMQP URL for message bus (optional, enables event publishing when `publish` feature is enabled)
    #[arg(long, env = "AMQP_URL")]
    pub amqp_url: Option<String>,

    /// Message bus exchange name (only used when `publish` feature is enabled)
    #[arg(long, env = "MESSAGE_BUS_EXCHANGE", default_value = "events")]
    pub message_bus_exchange: String,
}

impl Cli {
    /// Request timeout handed to the HTTP fetcher.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Collect the per-cycle knobs for the [`Aggregator`](crate::aggregator::Aggregator).
    ///
    /// `--count-fetch-errors` selects [`FailurePolicy::Classify`]; otherwise
    /// failed sites are excluded from the counts.
    pub fn aggregator_settings(&self) -> AggregatorSettings {
        AggregatorSettings {
            max_headlines: usize::try_from(self.max_headlines).unwrap_or(usize::MAX),
            classify_timeout: Duration::from_secs(self.classify_timeout_secs),
            failure_policy: if self.count_fetch_errors {
                FailurePolicy::Classify
            } else {
                FailurePolicy::Exclude
            },
            max_workers: MAX_FETCH_WORKERS,
        }
    }

    /// Interval and optional cycle limit for the render loop.
    pub fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            interval: Duration::from_secs(self.interval_secs),
            max_cycles: self.cycles,
        }
    }

    /// Log destination: the explicit file, else a default file when the
    /// terminal chart owns stdout, else `None` for stderr.
    pub fn log_destination(&self) -> Option<String> {
        match (&self.log_file, self.headless) {
            (Some(path), _) => Some(path.clone()),
            (None, false) => Some("sentiment_tracker.log".to_string()),
            (None, true) => None,
        }
    }
}
