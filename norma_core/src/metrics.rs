//! Sent-transaction counters shared between workers and readers.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// One counter per worker. Each worker only increments its own slot.
#[derive(Debug, Clone)]
pub struct SentCounters {
    counters: Arc<Vec<AtomicU64>>,
}

impl SentCounters {
    pub fn new(workers: usize) -> Self {
        Self {
            counters: Arc::new((0..workers).map(|_| AtomicU64::new(0)).collect()),
        }
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    pub fn increment(&self, worker: usize) {
        if let Some(counter) = self.counters.get(worker) {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Sent count of one worker, `None` when out of range.
    pub fn get(&self, worker: usize) -> Option<u64> {
        self.counters.get(worker).map(|c| c.load(Ordering::Relaxed))
    }

    pub fn total(&self) -> u64 {
        self.counters.iter().map(|c| c.load(Ordering::Relaxed)).sum()
    }
}

/// Cloneable read-only view of a controller's progress.
#[derive(Debug, Clone)]
pub struct ControllerStats {
    pub(crate) sent: SentCounters,
    pub(crate) missed: Arc<AtomicU64>,
    pub(crate) received: Arc<AtomicU64>,
}

impl ControllerStats {
    pub(crate) fn new(workers: usize) -> Self {
        Self {
            sent: SentCounters::new(workers),
            missed: Arc::new(AtomicU64::new(0)),
            received: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn workers(&self) -> usize {
        self.sent.len()
    }

    pub fn sent(&self, worker: usize) -> Option<u64> {
        self.sent.get(worker)
    }

    pub fn total_sent(&self) -> u64 {
        self.sent.total()
    }

    /// Messages dropped because every worker was busy.
    pub fn missed(&self) -> u64 {
        self.missed.load(Ordering::Relaxed)
    }

    /// Last received count observed through the probe.
    pub fn last_received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            sent_per_worker: (0..self.workers()).filter_map(|w| self.sent(w)).collect(),
            total_sent: self.total_sent(),
            missed: self.missed(),
            last_received: self.last_received(),
        }
    }
}

/// Point-in-time copy of [`ControllerStats`], for reports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub sent_per_worker: Vec<u64>,
    pub total_sent: u64,
    pub missed: u64,
    pub last_received: u64,
}
