//! # Awful Sentiment Tracker
//!
//! Scrapes front-page headlines from a handful of news sites, classifies the
//! sentiment of each one, and keeps a live bar chart of the counts.
//!
//! ## Usage
//!
//! ```sh
//! awful_sentiment_tracker                      # terminal chart, LLM classifier
//! awful_sentiment_tracker --classifier lexicon --headless --cycles 1
//! ```
//!
//! ## Architecture
//!
//! Every cycle runs the same pipeline:
//! 1. **Fetching**: all sites concurrently, one request each, 5 second timeout
//! 2. **Classifying**: first 10 headlines per site, one classifier call per site
//! 3. **Aggregating**: labels folded into one count table for the cycle
//! 4. **Rendering**: the table replaces the chart, then the loop idles 15 seconds
//!
//! The loop runs until Ctrl-C (or `q` in the terminal chart).

use clap::Parser;
use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, fmt as tfmt};

use awful_sentiment_tracker::aggregator::Aggregator;
use awful_sentiment_tracker::classifier::{Classifier, LexiconClassifier, LlmClassifier};
use awful_sentiment_tracker::cli::{ClassifierKind, Cli};
use awful_sentiment_tracker::models::default_sources;
use awful_sentiment_tracker::outputs::headless::HeadlessSink;
use awful_sentiment_tracker::outputs::terminal::TerminalSink;
use awful_sentiment_tracker::publish;
use awful_sentiment_tracker::render_loop::run;
use awful_sentiment_tracker::scrapers::HttpFetcher;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Cli::parse();
    let _log_guard = init_tracing(args.log_destination().as_deref())?;

    let start_time = std::time::Instant::now();
    info!(version = env!("CARGO_PKG_VERSION"), "sentiment tracker starting up");

    publish::init(args.amqp_url.as_ref(), &args.message_bus_exchange).await;
    awful_sentiment_tracker::publish_info!(
        "awful_sentiment_tracker",
        event_kind = "application.started",
        version = env!("CARGO_PKG_VERSION"),
        classifier = format!("{:?}", args.classifier),
        "Application starting"
    );

    // The classifier is loaded once and shared for the life of the process.
    let classifier = match build_classifier(&args).await {
        Ok(classifier) => Arc::new(classifier),
        Err(e) => {
            error!(error = %e, "Failed to set up classifier");
            awful_sentiment_tracker::publish_error!(
                "awful_sentiment_tracker",
                event_kind = "application.failed",
                reason = e.to_string(),
                "Application failed: classifier setup"
            );
            return Err(e);
        }
    };

    let fetcher = HttpFetcher::new(args.fetch_timeout())?;
    let aggregator = Aggregator::new(fetcher, classifier, default_sources(), args.aggregator_settings());
    info!(
        sources = ?aggregator.sources().iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
        policy = ?aggregator.settings().failure_policy,
        "Configured sources"
    );

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Interrupt received; shutting down"),
            Err(e) => warn!(error = %e, "Could not listen for Ctrl-C"),
        }
        on_signal.cancel();
    });

    let settings = args.loop_settings();
    let cycles = if args.headless {
        let mut sink = HeadlessSink::new(std::io::stdout());
        run(&aggregator, &mut sink, &settings, &cancel).await?
    } else {
        let mut sink = match TerminalSink::start() {
            Ok(sink) => sink,
            Err(e) => {
                error!(error = %e, "Failed to initialise terminal; try --headless");
                return Err(e.into());
            }
        };
        run(&aggregator, &mut sink, &settings, &cancel).await?
    };

    let elapsed = start_time.elapsed();
    info!(cycles, ?elapsed, "Execution complete");
    awful_sentiment_tracker::publish_info!(
        "awful_sentiment_tracker",
        event_kind = "application.stopped",
        cycles = cycles,
        duration_secs = elapsed.as_secs(),
        "Application stopped"
    );

    Ok(())
}

/// Load the classifier picked on the command line.
///
/// The LLM backend reads its config and template here, once; a missing file
/// is a startup error rather than a per-cycle failure.
async fn build_classifier(args: &Cli) -> Result<Classifier, Box<dyn Error>> {
    match args.classifier {
        ClassifierKind::Llm => {
            let llm = LlmClassifier::load(args.config.as_deref(), &args.template).await?;
            Ok(Classifier::Llm(llm))
        }
        ClassifierKind::Lexicon => {
            info!("Using built-in lexicon classifier");
            Ok(Classifier::Lexicon(LexiconClassifier::new()))
        }
    }
}

/// Install the fmt subscriber, writing to `log_file` when given and stderr
/// otherwise. The returned guard flushes the file writer on drop.
fn init_tracing(log_file: Option<&str>) -> Result<Option<WorkerGuard>, Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (writer, guard, ansi) = match log_file {
        Some(path) => {
            let path = Path::new(path);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .ok_or_else(|| format!("log file path has no file name: {}", path.display()))?;
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(non_blocking), Some(guard), false)
        }
        None => (BoxMakeWriter::new(std::io::stderr), None, true),
    };

    tfmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    Ok(guard)
}
