#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo,
        clippy::indexing_slicing
    )
)]

//! # dep2p Telemetry
//!
//! Observability infrastructure for the secure-transport core: structured
//! logging initialization and abstract sinks that decouple counter
//! instrumentation from the metrics backend.

/// The initialization routine for global structured logging.
pub mod init;
/// Abstract traits (`*MetricsSink`) that define the contract for metrics reporting.
pub mod sinks;
/// A simple RAII timer for measuring the duration of a scope.
pub mod time;

pub use sinks::{transport_metrics, AtomicSink, NopSink, TransportMetricsSink};
