//! Headline sentiment tracking: scrape news front pages, label each headline,
//! and chart the label counts cycle after cycle.
//!
//! - [`scrapers`]: fetch a site and pull out its headlines
//! - [`classifier`]: headline batch → sentiment labels
//! - [`aggregator`]: one concurrent fetch/classify/count cycle
//! - [`render_loop`]: repeat cycles into an [`outputs::RenderSink`] until cancelled

// Futures from these traits are only ever awaited in place, never spawned.
#![allow(async_fn_in_trait)]

pub mod aggregator;
pub mod api;
pub mod classifier;
pub mod cli;
pub mod models;
pub mod outputs;
pub mod publish;
pub mod render_loop;
pub mod scrapers;
pub mod utils;
