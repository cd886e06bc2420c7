use crate::events::{TransferDirection, TransferProgress};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Share of the total that must pass between two progress notifications.
const NOTICE_FRACTION: f64 = 0.01;

/// Percentage of `total` covered by `transferred`; an empty total counts as
/// complete.
pub fn percent(transferred: u64, total: u64) -> f64 {
    if total == 0 {
        100.0
    } else {
        transferred as f64 * 100.0 / total as f64
    }
}

/// Running byte count of one transfer. The counter is shared so the
/// transfer's owner can read it while the copy loop runs elsewhere.
#[derive(Debug)]
pub struct ProgressTracker {
    direction: TransferDirection,
    total_bytes: u64,
    transferred: Arc<AtomicU64>,
    since_notice: u64,
}

impl ProgressTracker {
    pub fn new(
        direction: TransferDirection,
        total_bytes: u64,
        start: u64,
        transferred: Arc<AtomicU64>,
    ) -> Self {
        transferred.store(start, Ordering::Relaxed);
        Self {
            direction,
            total_bytes,
            transferred,
            since_notice: 0,
        }
    }

    /// Accounts for `n` more bytes. Returns a progress snapshot once more
    /// than 1% of the total has passed since the previous one.
    pub fn advance(&mut self, n: u64) -> Option<TransferProgress> {
        self.transferred.fetch_add(n, Ordering::Relaxed);
        self.since_notice += n;
        if self.since_notice as f64 > self.total_bytes as f64 * NOTICE_FRACTION {
            self.since_notice = 0;
            Some(self.snapshot())
        } else {
            None
        }
    }

    pub fn transferred(&self) -> u64 {
        self.transferred.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> TransferProgress {
        let transferred = self.transferred();
        TransferProgress {
            direction: self.direction,
            transferred_bytes: transferred,
            total_bytes: self.total_bytes,
            percent: percent(transferred, self.total_bytes),
        }
    }
}
