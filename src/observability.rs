//! Dispatch counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics handle shared by the dispatcher and every lifecycle router
#[derive(Debug, Default)]
pub struct Metrics {
    requests_dispatched: AtomicU64,
    requests_rejected: AtomicU64,
    advisories_emitted: AtomicU64,
    requests_succeeded: AtomicU64,
    requests_failed: AtomicU64,
    requests_aborted: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_dispatched(&self) {
        self.requests_dispatched.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "requests_dispatched", "Metric incremented");
    }

    /// Options failed validation or encoding
    pub fn request_rejected(&self) {
        self.requests_rejected.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "requests_rejected", "Metric incremented");
    }

    pub fn advisory_emitted(&self) {
        self.advisories_emitted.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "advisories_emitted", "Metric incremented");
    }

    pub fn request_succeeded(&self) {
        self.requests_succeeded.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "requests_succeeded", "Metric incremented");
    }

    pub fn request_failed(&self) {
        self.requests_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "requests_failed", "Metric incremented");
    }

    pub fn request_aborted(&self) {
        self.requests_aborted.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "requests_aborted", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_dispatched: self.requests_dispatched.load(Ordering::Relaxed),
            requests_rejected: self.requests_rejected.load(Ordering::Relaxed),
            advisories_emitted: self.advisories_emitted.load(Ordering::Relaxed),
            requests_succeeded: self.requests_succeeded.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            requests_aborted: self.requests_aborted.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub requests_dispatched: u64,
    pub requests_rejected: u64,
    pub advisories_emitted: u64,
    pub requests_succeeded: u64,
    pub requests_failed: u64,
    pub requests_aborted: u64,
}
