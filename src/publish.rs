//! Event publishing abstraction with feature-gated implementation.
//!
//! With the `publish` feature enabled, events go to RabbitMQ via the
//! `awful_publish` crate. Without it, [`init`] returns `false` and the
//! [`publish_info!`] / [`publish_error!`] macros expand to nothing, so call
//! sites need no `#[cfg]` of their own.
//!
//! Events are sent with `awful_publish::publish()` directly rather than through
//! the tracing subscriber, so they never interleave with the log output.
//!
//! # Events Published
//!
//! | Event Kind | Description |
//! |------------|-------------|
//! | `application.started` | Startup with version and classifier backend |
//! | `application.failed` | Startup error (classifier or terminal setup) |
//! | `application.stopped` | Clean shutdown with the number of cycles run |
//! | `cycle.completed` | Label counts and failure totals for one cycle |
//! | `source.failed` | A site could not be fetched this cycle |
//! | `classifier.failed` | A site's batch could not be classified this cycle |
//!
//! # Usage
//!
//! ```ignore
//! publish::init(args.amqp_url.as_ref(), &args.message_bus_exchange).await;
//!
//! crate::publish_error!(
//!     "awful_sentiment_tracker",
//!     event_kind = "source.failed",
//!     source = source.name.clone(),
//!     reason = e.to_string(),
//!     "Source fetch failed"
//! );
//! ```
//!
//! Field values go through `serde_json::json!`, so anything `Serialize`
//! (a whole [`FrequencyTable`](crate::models::FrequencyTable), say) can be
//! attached to an event.
//!
//! # Feature Flag
//!
//! Enable with: `cargo build --features publish`
//!
//! Requires access to the private `awful_publish` repository.

/// Connect to the message bus and start the background publisher.
///
/// # Arguments
///
/// * `amqp_url` - Broker URL such as `amqp://localhost:5672`; `None` skips
///   the connection entirely
/// * `exchange` - Exchange the events are published to
///
/// # Returns
///
/// `true` when connected. A failed connection is logged and the tracker
/// keeps running without events. Always `false` when the `publish` feature
/// is disabled.
#[cfg(feature = "publish")]
pub async fn init(amqp_url: Option<&String>, exchange: &str) -> bool {
    use awful_publish::BusConfig;
    use tracing::{info, warn};

    let Some(url) = amqp_url else {
        return false;
    };
    let config = BusConfig::new(url.clone(), exchange.to_string());
    match awful_publish::init_global(config).await {
        Ok(_) => {
            info!(exchange = %exchange, "Message bus initialized");
            true
        }
        Err(e) => {
            warn!(error = %e, "Failed to initialize message bus; continuing without event publishing");
            false
        }
    }
}

/// Connect to the message bus (no-op when `publish` feature is disabled).
#[cfg(not(feature = "publish"))]
pub async fn init(_amqp_url: Option<&String>, _exchange: &str) -> bool {
    false
}

/// Publish an info-level event.
///
/// ```ignore
/// publish_info!(
///     "awful_sentiment_tracker",
///     event_kind = "cycle.completed",
///     cycle = 3,
///     "Sentiment cycle completed"
/// );
/// ```
#[cfg(feature = "publish")]
#[macro_export]
macro_rules! publish_info {
    ($service:expr, $($($k:ident).+ = $val:expr),+ , $msg:literal) => {
        awful_publish::publish(
            $service,
            tracing::Level::INFO,
            $msg,
            vec![$(
                (stringify!($($k).+), serde_json::json!($val)),
            )+],
        )
    };
    ($service:expr, $msg:literal) => {
        awful_publish::publish($service, tracing::Level::INFO, $msg, vec![])
    };
}

/// Publish an info-level event (no-op when `publish` feature is disabled).
#[cfg(not(feature = "publish"))]
#[macro_export]
macro_rules! publish_info {
    ($service:expr, $($tt:tt)*) => {};
}

/// Publish an error-level event; same syntax as [`publish_info!`].
#[cfg(feature = "publish")]
#[macro_export]
macro_rules! publish_error {
    ($service:expr, $($($k:ident).+ = $val:expr),+ , $msg:literal) => {
        awful_publish::publish(
            $service,
            tracing::Level::ERROR,
            $msg,
            vec![$(
                (stringify!($($k).+), serde_json::json!($val)),
            )+],
        )
    };
    ($service:expr, $msg:literal) => {
        awful_publish::publish($service, tracing::Level::ERROR, $msg, vec![])
    };
}

/// Publish an error-level event (no-op when `publish` feature is disabled).
#[cfg(not(feature = "publish"))]
#[macro_export]
macro_rules! publish_error {
    ($service:expr, $($tt:tt)*) => {};
}
