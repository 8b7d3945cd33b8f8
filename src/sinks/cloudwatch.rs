//! Buffered remote logging
//!
//! Entries bound for the remote log service are queued in an unbounded
//! multi-producer FIFO. A single background flusher drains the queue in
//! batches and hands each batch to a [`LogShipper`], the external capability
//! that owns the network transport. The flusher wakes on a timer and on
//! explicit signals raised when the queue reaches its threshold or an
//! Error/Critical entry arrives.
//!
//! Delivery is best effort: a batch the shipper rejects is dropped and
//! counted, never retried.

use crate::core::error::Result;
use crate::core::log_entry::LogEntry;
use crate::core::log_level::LogLevel;
use crate::core::logger::{panic_message, DEFAULT_SHUTDOWN_TIMEOUT};
use crate::core::metrics::FlushMetrics;
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Default queue length that triggers a flush
pub const DEFAULT_BUFFER_THRESHOLD: usize = 25;

/// Default maximum events per shipped batch
pub const DEFAULT_BATCH_LIMIT: usize = 1000;

/// Default interval of the timer-driven flush
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);

/// Default remote log group
pub const DEFAULT_LOG_GROUP: &str = "/fleet-ops/automation";

/// Flush requests that may be pending at once; further requests coalesce
const MAX_PENDING_FLUSHES: usize = 2;

/// One event in the remote sink's wire format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEvent {
    /// Epoch milliseconds, UTC
    pub timestamp: i64,
    /// The entry's structured line
    pub message: String,
}

impl RemoteEvent {
    pub fn from_entry(entry: &LogEntry) -> Result<Self> {
        Ok(Self {
            timestamp: entry.timestamp().timestamp_millis(),
            message: entry.serialize_structured()?,
        })
    }
}

/// External capability that delivers batches to the remote log service
///
/// # Example
///
/// ```
/// use fleet_log::sinks::{LogShipper, RemoteEvent};
/// use fleet_log::Result;
///
/// struct StdoutShipper;
///
/// impl LogShipper for StdoutShipper {
///     fn ship(&self, log_group: &str, events: &[RemoteEvent]) -> Result<()> {
///         for event in events {
///             println!("{} {} {}", log_group, event.timestamp, event.message);
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait LogShipper: Send + Sync {
    fn ship(&self, log_group: &str, events: &[RemoteEvent]) -> Result<()>;

    fn name(&self) -> &str {
        "log-shipper"
    }
}

/// Settings for the remote buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferConfig {
    pub threshold: usize,
    pub batch_limit: usize,
    pub log_group: String,
    pub flush_interval: Duration,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_BUFFER_THRESHOLD,
            batch_limit: DEFAULT_BATCH_LIMIT,
            log_group: DEFAULT_LOG_GROUP.to_string(),
            flush_interval: DEFAULT_FLUSH_INTERVAL,
        }
    }
}

impl BufferConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold.max(1);
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_batch_limit(mut self, limit: usize) -> Self {
        self.batch_limit = limit.max(1);
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_log_group(mut self, group: impl Into<String>) -> Self {
        self.log_group = group.into();
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }
}

/// Outcome of one flush call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub drained: usize,
    pub shipped: usize,
    pub dropped: usize,
    pub batches: usize,
}

impl FlushReport {
    pub fn is_empty(&self) -> bool {
        self.drained == 0
    }
}

enum FlushSignal {
    Flush,
}

/// State shared between producers and the flusher thread
struct BufferShared {
    sender: Sender<LogEntry>,
    receiver: Receiver<LogEntry>,
    config: BufferConfig,
    shipper: Option<Arc<dyn LogShipper>>,
    metrics: FlushMetrics,
    /// Serializes flush passes so batches leave in queue order
    flush_lock: Mutex<()>,
}

impl BufferShared {
    fn flush(&self, force: bool) -> FlushReport {
        let _guard = self.flush_lock.lock();
        let mut report = FlushReport::default();

        if self.receiver.is_empty() {
            return report;
        }
        self.metrics.record_flush_run();

        loop {
            let batch: Vec<LogEntry> = self
                .receiver
                .try_iter()
                .take(self.config.batch_limit)
                .collect();
            if batch.is_empty() {
                break;
            }

            report.drained += batch.len();
            report.batches += 1;
            self.ship_batch(batch, &mut report);

            if !force {
                break;
            }
        }

        report
    }

    fn ship_batch(&self, batch: Vec<LogEntry>, report: &mut FlushReport) {
        let Some(shipper) = self.shipper.as_ref() else {
            // No client: drop rather than hold entries indefinitely
            report.dropped += batch.len();
            self.metrics.record_dropped(batch.len() as u64);
            return;
        };

        let mut events = Vec::with_capacity(batch.len());
        for entry in &batch {
            match RemoteEvent::from_entry(entry) {
                Ok(event) => events.push(event),
                Err(e) => {
                    eprintln!("[LOGGER WARNING] Dropping entry from remote batch: {}", e);
                    report.dropped += 1;
                    self.metrics.record_dropped(1);
                }
            }
        }
        if events.is_empty() {
            return;
        }

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            shipper.ship(&self.config.log_group, &events)
        }));

        let failure = match result {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(panic_info) => Some(format!("panicked: {}", panic_message(&panic_info))),
        };

        match failure {
            None => {
                report.shipped += events.len();
                self.metrics.record_shipped(events.len() as u64);
            }
            Some(reason) => {
                eprintln!(
                    "[LOGGER WARNING] Shipper '{}' failed for log group '{}': {}. \
                     Dropping {} events.",
                    shipper.name(),
                    self.config.log_group,
                    reason,
                    events.len()
                );
                report.dropped += events.len();
                self.metrics.record_ship_failure();
                self.metrics.record_dropped(events.len() as u64);
            }
        }
    }
}

/// Concurrent queue of entries awaiting remote delivery
pub struct CloudWatchBuffer {
    shared: Arc<BufferShared>,
    wake: Mutex<Option<Sender<FlushSignal>>>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
}

impl CloudWatchBuffer {
    /// Create a buffer and start its flusher thread
    ///
    /// Passing `None` for the shipper models an unavailable remote client:
    /// flushes then drain and drop.
    pub fn new(config: BufferConfig, shipper: Option<Arc<dyn LogShipper>>) -> Self {
        let (sender, receiver) = unbounded();
        let shared = Arc::new(BufferShared {
            sender,
            receiver,
            config,
            shipper,
            metrics: FlushMetrics::new(),
            flush_lock: Mutex::new(()),
        });

        let (wake_tx, wake_rx) = bounded(MAX_PENDING_FLUSHES);
        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("fleet-log-flusher".to_string())
            .spawn(move || Self::run_flusher(worker_shared, wake_rx));

        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(e) => {
                eprintln!(
                    "[LOGGER WARNING] Could not start remote flusher thread: {}. \
                     Remote entries are flushed on the writing thread.",
                    e
                );
                None
            }
        };

        Self {
            shared,
            wake: Mutex::new(worker.as_ref().map(|_| wake_tx)),
            worker: Mutex::new(worker),
        }
    }

    fn run_flusher(shared: Arc<BufferShared>, wake: Receiver<FlushSignal>) {
        let interval = shared.config.flush_interval;
        loop {
            match wake.recv_timeout(interval) {
                Ok(FlushSignal::Flush) => {
                    shared.flush(false);
                    while shared.receiver.len() >= shared.config.threshold {
                        shared.flush(false);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    shared.flush(false);
                }
                Err(RecvTimeoutError::Disconnected) => {
                    // Final best-effort drain on shutdown
                    shared.flush(true);
                    break;
                }
            }
        }
    }

    /// Append an entry; never blocks
    pub fn enqueue(&self, entry: LogEntry) {
        // The receiver lives as long as `shared`, so the send cannot fail
        let _ = self.shared.sender.send(entry);
        self.shared.metrics.record_enqueued();
    }

    /// Schedule a background flush when the threshold or severity trigger fires
    ///
    /// Returns whether a flush was requested.
    pub fn maybe_flush(&self, level: LogLevel) -> bool {
        if self.len() < self.shared.config.threshold && !level.is_severe() {
            return false;
        }

        self.shared.metrics.record_flush_request();
        let sent = self
            .wake
            .lock()
            .as_ref()
            .map(|tx| tx.try_send(FlushSignal::Flush));
        match sent {
            Some(Ok(())) => {}
            Some(Err(TrySendError::Full(_))) => {
                self.shared.metrics.record_coalesced();
            }
            Some(Err(TrySendError::Disconnected(_))) | None => {
                // No flusher running (after shutdown): flush here so the
                // queue stays bounded
                self.shared.flush(false);
            }
        }
        true
    }

    /// Enqueue and run the flush trigger in one step
    pub fn push(&self, entry: LogEntry) -> bool {
        let level = entry.level();
        self.enqueue(entry);
        self.maybe_flush(level)
    }

    /// Drain and ship on the calling thread
    ///
    /// Without `force` at most one batch is shipped; with `force` the queue is
    /// drained completely.
    pub fn flush(&self, force: bool) -> FlushReport {
        self.shared.flush(force)
    }

    pub fn len(&self) -> usize {
        self.shared.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.receiver.is_empty()
    }

    pub fn config(&self) -> &BufferConfig {
        &self.shared.config
    }

    pub fn metrics(&self) -> &FlushMetrics {
        &self.shared.metrics
    }

    /// Stop the flusher, letting it drain the queue, within `timeout`
    ///
    /// Returns `true` when the flusher finished in time. Calling this more
    /// than once is harmless.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        drop(self.wake.lock().take());

        let Some(handle) = self.worker.lock().take() else {
            // Never started or already stopped: drain here
            self.shared.flush(true);
            return true;
        };

        let start = Instant::now();
        loop {
            if handle.is_finished() {
                if let Err(e) = handle.join() {
                    eprintln!("[LOGGER ERROR] Remote flusher panicked during shutdown: {:?}", e);
                    return false;
                }
                return true;
            }

            if start.elapsed() >= timeout {
                eprintln!(
                    "[LOGGER WARNING] Remote flusher did not finish within {:?}. \
                     Buffered entries may be lost.",
                    timeout
                );
                return false;
            }

            thread::sleep(Duration::from_millis(10));
        }
    }
}

impl Drop for CloudWatchBuffer {
    fn drop(&mut self) {
        self.shutdown(DEFAULT_SHUTDOWN_TIMEOUT);
    }
}
