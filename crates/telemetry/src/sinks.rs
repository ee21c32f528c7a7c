//! Defines abstract traits for metrics reporting, decoupling core logic from the backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use once_cell::sync::OnceCell;

// --- Static Sink Access ---

/// A no-op sink for use in tests or when telemetry is disabled.
#[derive(Debug, Clone, Copy)]
pub struct NopSink;

/// A lazily-initialized static reference to the global `TransportMetricsSink`.
pub static SINK: OnceCell<&'static dyn TransportMetricsSink> = OnceCell::new();
static NOP_SINK: NopSink = NopSink;

/// Returns a static reference to the configured transport metrics sink.
/// If no sink has been initialized, it returns a no-op sink.
pub fn transport_metrics() -> &'static dyn TransportMetricsSink {
    SINK.get().copied().unwrap_or(&NOP_SINK)
}

// --- Trait Definitions ---

/// A sink for metrics related to connection upgrades.
pub trait TransportMetricsSink: Send + Sync + std::fmt::Debug {
    /// Increments the counter of upgrades that passed access control and
    /// identity verification.
    fn inc_upgrades_allowed(&self);
    /// Increments the counter of upgrades denied by access control.
    fn inc_upgrades_denied(&self);
    /// Increments a per-kind counter of failed upgrades.
    fn inc_upgrade_failure(&self, kind: &str);
    /// Increments the counter of failed protocol negotiations.
    fn inc_negotiation_failure(&self);
    /// Observes the wall-clock duration of a completed handshake.
    fn observe_handshake_duration(&self, duration_secs: f64);
}

impl TransportMetricsSink for NopSink {
    fn inc_upgrades_allowed(&self) {}
    fn inc_upgrades_denied(&self) {}
    fn inc_upgrade_failure(&self, _kind: &str) {}
    fn inc_negotiation_failure(&self) {}
    fn observe_handshake_duration(&self, _duration_secs: f64) {}
}

/// An in-process sink backed by atomics, usable as a backend in embedders
/// that scrape counters directly and in tests.
#[derive(Debug, Default)]
pub struct AtomicSink {
    allowed: AtomicU64,
    denied: AtomicU64,
    negotiation_failures: AtomicU64,
    failures: Mutex<HashMap<String, u64>>,
}

impl AtomicSink {
    /// Creates a zeroed sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Upgrades allowed so far.
    pub fn allowed(&self) -> u64 {
        self.allowed.load(Ordering::Relaxed)
    }

    /// Upgrades denied so far.
    pub fn denied(&self) -> u64 {
        self.denied.load(Ordering::Relaxed)
    }

    /// Failed negotiations so far.
    pub fn negotiation_failures(&self) -> u64 {
        self.negotiation_failures.load(Ordering::Relaxed)
    }

    /// Failure count for one error kind.
    pub fn failures_of_kind(&self, kind: &str) -> u64 {
        self.failures
            .lock()
            .map(|m| m.get(kind).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

impl TransportMetricsSink for AtomicSink {
    fn inc_upgrades_allowed(&self) {
        self.allowed.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_upgrades_denied(&self) {
        self.denied.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_upgrade_failure(&self, kind: &str) {
        if let Ok(mut m) = self.failures.lock() {
            *m.entry(kind.to_string()).or_insert(0) += 1;
        }
    }

    fn inc_negotiation_failure(&self) {
        self.negotiation_failures.fetch_add(1, Ordering::Relaxed);
    }

    fn observe_handshake_duration(&self, _duration_secs: f64) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_sink_counts() {
        let sink = AtomicSink::new();
        sink.inc_upgrades_allowed();
        sink.inc_upgrades_allowed();
        sink.inc_upgrades_denied();
        sink.inc_upgrade_failure("peer_id_mismatch");
        sink.inc_upgrade_failure("peer_id_mismatch");
        sink.inc_negotiation_failure();

        assert_eq!(sink.allowed(), 2);
        assert_eq!(sink.denied(), 1);
        assert_eq!(sink.negotiation_failures(), 1);
        assert_eq!(sink.failures_of_kind("peer_id_mismatch"), 2);
        assert_eq!(sink.failures_of_kind("timeout"), 0);
    }

    #[test]
    fn unset_global_falls_back_to_nop() {
        // Must not panic.
        transport_metrics().inc_upgrades_allowed();
    }
}
