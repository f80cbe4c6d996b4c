//! Per-file progress aggregation.
//!
//! Segment workers push byte counts into an unbounded channel; one
//! [`ProgressAggregator`] per file folds them into a running total and, once
//! per interval, publishes a [`ProgressSnapshot`] into a [`ProgressSlot`].
//! The slot keeps only the newest snapshot, so a slow or absent reader never
//! holds the producer back.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Sending half used by segment workers to report newly received bytes.
pub type ProgressSender = mpsc::UnboundedSender<u64>;
pub type ProgressReceiver = mpsc::UnboundedReceiver<u64>;

pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    mpsc::unbounded_channel()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Pending,
    Transferring,
    Done,
    /// Written to disk, but at least one segment exhausted its retries.
    Incomplete,
    /// The total size could not be determined; nothing was downloaded.
    SizeUnknown,
    Failed,
    Cancelled,
}

/// State of one file at one sampling tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub filename: String,
    pub downloaded_bytes: u64,
    pub total_bytes: u64,
    /// Bytes received during the last sampling interval.
    pub speed: u64,
    pub status: FileStatus,
}

impl ProgressSnapshot {
    pub fn pending(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            downloaded_bytes: 0,
            total_bytes: 0,
            speed: 0,
            status: FileStatus::Pending,
        }
    }

    pub fn size_unknown(filename: impl Into<String>) -> Self {
        Self {
            status: FileStatus::SizeUnknown,
            ..Self::pending(filename)
        }
    }

    pub fn is_size_unknown(&self) -> bool {
        self.status == FileStatus::SizeUnknown
    }

    /// Completed fraction in `[0, 1]`; zero when the total is unknown.
    pub fn ratio(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        (self.downloaded_bytes as f64 / self.total_bytes as f64).clamp(0.0, 1.0)
    }
}

/// Producer side of a single-slot mailbox holding the latest snapshot of one file.
#[derive(Debug, Clone)]
pub struct ProgressSlot {
    tx: Arc<watch::Sender<ProgressSnapshot>>,
}

/// Reader side of a [`ProgressSlot`].
#[derive(Debug, Clone)]
pub struct ProgressView {
    rx: watch::Receiver<ProgressSnapshot>,
}

impl ProgressSlot {
    pub fn new(initial: ProgressSnapshot) -> (Self, ProgressView) {
        let (tx, rx) = watch::channel(initial);
        (Self { tx: Arc::new(tx) }, ProgressView { rx })
    }

    /// Replaces the stored snapshot. Never blocks, even with no reader.
    pub fn publish(&self, snapshot: ProgressSnapshot) {
        self.tx.send_replace(snapshot);
    }

    pub fn current(&self) -> ProgressSnapshot {
        self.tx.borrow().clone()
    }
}

impl ProgressView {
    /// Most recent snapshot, marking it as seen.
    pub fn latest(&mut self) -> ProgressSnapshot {
        self.rx.borrow_and_update().clone()
    }

    /// Whether a snapshot newer than the last [`latest`](Self::latest) call
    /// may exist. Once the producer is gone this stays `true`: the channel
    /// still holds its final snapshot.
    pub fn has_update(&self) -> bool {
        self.rx.has_changed().unwrap_or(true)
    }
}

/// Folds one file's byte increments into periodic snapshots.
#[derive(Debug, Clone)]
pub struct ProgressAggregator {
    filename: String,
    total_bytes: u64,
    interval: Duration,
}

impl ProgressAggregator {
    pub fn new(filename: impl Into<String>, total_bytes: u64, interval: Duration) -> Self {
        Self {
            filename: filename.into(),
            total_bytes,
            interval,
        }
    }

    fn snapshot(&self, downloaded_bytes: u64, speed: u64) -> ProgressSnapshot {
        ProgressSnapshot {
            filename: self.filename.clone(),
            downloaded_bytes,
            total_bytes: self.total_bytes,
            speed,
            status: FileStatus::Transferring,
        }
    }

    /// Runs until every sender of `increments` is dropped or `cancel` fires.
    ///
    /// Returns the sum of all increments observed. When the channel closes, a
    /// final snapshot reporting the full size is published; cancellation
    /// publishes nothing.
    pub async fn run(
        self,
        mut increments: ProgressReceiver,
        slot: ProgressSlot,
        cancel: CancellationToken,
    ) -> u64 {
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut downloaded: u64 = 0;
        let mut at_previous_tick: u64 = 0;

        slot.publish(self.snapshot(0, 0));

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(file = %self.filename, downloaded, "progress aggregation cancelled");
                    return downloaded;
                }
                // Ticks go before increments so a busy channel cannot
                // starve the snapshots.
                _ = ticker.tick() => {
                    let speed = downloaded - at_previous_tick;
                    at_previous_tick = downloaded;
                    slot.publish(self.snapshot(downloaded, speed));
                }
                received = increments.recv() => match received {
                    Some(n) => downloaded += n,
                    None => {
                        slot.publish(self.snapshot(self.total_bytes, 0));
                        return downloaded;
                    }
                },
            }
        }
    }
}
