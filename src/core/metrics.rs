//! Logger metrics for observability
//!
//! Counters for the emit pipeline and for the remote flush path. Everything
//! here is a relaxed atomic: the numbers are advisory and never gate
//! behaviour.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for the emit pipeline
///
/// # Example
///
/// ```
/// use fleet_log::LoggerMetrics;
///
/// let metrics = LoggerMetrics::new();
/// metrics.record_logged();
/// metrics.record_sink_error();
///
/// assert_eq!(metrics.total_logged(), 1);
/// assert_eq!(metrics.sink_errors(), 1);
/// ```
#[derive(Debug)]
pub struct LoggerMetrics {
    /// Entries that reached the sinks
    total_logged: AtomicU64,

    /// Log calls whose entry failed validation
    rejected: AtomicU64,

    /// Individual sink failures (errors or panics)
    sink_errors: AtomicU64,
}

impl LoggerMetrics {
    /// Create a new metrics instance with all counters at zero
    pub const fn new() -> Self {
        Self {
            total_logged: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            sink_errors: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn total_logged(&self) -> u64 {
        self.total_logged.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn sink_errors(&self) -> u64 {
        self.sink_errors.load(Ordering::Relaxed)
    }

    /// Record an entry handed to the sinks, returning the previous count
    #[inline]
    pub fn record_logged(&self) -> u64 {
        self.total_logged.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_rejected(&self) -> u64 {
        self.rejected.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_sink_error(&self) -> u64 {
        self.sink_errors.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for LoggerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for LoggerMetrics {
    /// Create a snapshot of the current metrics values
    fn clone(&self) -> Self {
        Self {
            total_logged: AtomicU64::new(self.total_logged()),
            rejected: AtomicU64::new(self.rejected()),
            sink_errors: AtomicU64::new(self.sink_errors()),
        }
    }
}

/// Metrics for the remote buffer and its flusher
#[derive(Debug)]
pub struct FlushMetrics {
    /// Entries accepted into the buffer
    enqueued: AtomicU64,

    /// Flushes requested by the threshold or severity trigger
    flush_requests: AtomicU64,

    /// Requests folded into an already pending flush
    coalesced_requests: AtomicU64,

    /// Flush passes actually executed
    flush_runs: AtomicU64,

    /// Events delivered to the shipper
    shipped: AtomicU64,

    /// Entries drained without being delivered
    dropped: AtomicU64,

    /// Batches the shipper rejected or panicked on
    ship_failures: AtomicU64,
}

impl FlushMetrics {
    pub const fn new() -> Self {
        Self {
            enqueued: AtomicU64::new(0),
            flush_requests: AtomicU64::new(0),
            coalesced_requests: AtomicU64::new(0),
            flush_runs: AtomicU64::new(0),
            shipped: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            ship_failures: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn flush_requests(&self) -> u64 {
        self.flush_requests.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn coalesced_requests(&self) -> u64 {
        self.coalesced_requests.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn flush_runs(&self) -> u64 {
        self.flush_runs.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn shipped(&self) -> u64 {
        self.shipped.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn ship_failures(&self) -> u64 {
        self.ship_failures.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn record_enqueued(&self) -> u64 {
        self.enqueued.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn record_flush_request(&self) -> u64 {
        self.flush_requests.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn record_coalesced(&self) -> u64 {
        self.coalesced_requests.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn record_flush_run(&self) -> u64 {
        self.flush_runs.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn record_shipped(&self, count: u64) -> u64 {
        self.shipped.fetch_add(count, Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn record_dropped(&self, count: u64) -> u64 {
        self.dropped.fetch_add(count, Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn record_ship_failure(&self) -> u64 {
        self.ship_failures.fetch_add(1, Ordering::Relaxed)
    }

    /// Share of drained entries that were dropped, as a percentage
    pub fn drop_rate(&self) -> f64 {
        let dropped = self.dropped() as f64;
        let total = self.shipped() as f64 + dropped;
        if total == 0.0 {
            0.0
        } else {
            (dropped / total) * 100.0
        }
    }
}

impl Default for FlushMetrics {
    fn default() -> Self {
        Self::new()
    }
}
