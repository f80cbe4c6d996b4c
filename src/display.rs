//! Text progress display for a whole batch.

use std::io::{self, Write};
use std::time::Duration;

use indicatif::HumanBytes;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::progress::{FileStatus, ProgressSnapshot, ProgressView};

pub const PROGRESS_BAR_WIDTH: usize = 50;

const CLEAR_SCREEN: &str = "\x1B[H\x1B[2J";

/// Periodically redraws one progress line per file from the latest snapshots.
pub struct ProgressDisplay {
    views: Vec<ProgressView>,
    states: Vec<ProgressSnapshot>,
    interval: Duration,
}

impl ProgressDisplay {
    pub fn new(mut views: Vec<ProgressView>, interval: Duration) -> Self {
        let states = views.iter_mut().map(ProgressView::latest).collect();
        Self {
            views,
            states,
            interval,
        }
    }

    /// Takes the newest snapshot of every file that published one since the
    /// last refresh; files without news keep their previous state.
    pub fn refresh(&mut self) -> &[ProgressSnapshot] {
        for (view, state) in self.views.iter_mut().zip(self.states.iter_mut()) {
            if view.has_update() {
                *state = view.latest();
            }
        }
        &self.states
    }

    /// Redraws to stdout once per interval until `cancel` fires, then returns
    /// the display so the caller can draw a final frame.
    pub async fn run(mut self, cancel: CancellationToken) -> Self {
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return self,
                _ = ticker.tick() => {
                    let frame = render_frame(self.refresh());
                    // A closed stdout is not worth failing the batch over.
                    let _ = write_frame(&frame);
                }
            }
        }
    }
}

pub fn write_frame(frame: &str) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    stdout.write_all(CLEAR_SCREEN.as_bytes())?;
    stdout.write_all(frame.as_bytes())?;
    stdout.flush()
}

pub fn render_frame(snapshots: &[ProgressSnapshot]) -> String {
    let mut frame = String::new();
    for snapshot in snapshots {
        frame.push_str(&render_bar(snapshot));
        frame.push('\n');
    }
    frame
}

/// One line: name, bar, percentage, speed and byte counts.
pub fn render_bar(snapshot: &ProgressSnapshot) -> String {
    let ratio = snapshot.ratio();
    let filled = ((ratio * PROGRESS_BAR_WIDTH as f64) as usize).min(PROGRESS_BAR_WIDTH);
    let bar = format!(
        "{}{}",
        "█".repeat(filled),
        "-".repeat(PROGRESS_BAR_WIDTH - filled)
    );

    let mut line = format!(
        "{}: |{}| {:.2}%, Speed: {}/s, Downloaded: {} / {}",
        snapshot.filename,
        bar,
        ratio * 100.0,
        HumanBytes(snapshot.speed),
        HumanBytes(snapshot.downloaded_bytes),
        HumanBytes(snapshot.total_bytes)
    );

    let suffix = match snapshot.status {
        FileStatus::SizeUnknown => Some("[size unknown]"),
        FileStatus::Incomplete => Some("[incomplete]"),
        FileStatus::Failed => Some("[failed]"),
        FileStatus::Cancelled => Some("[cancelled]"),
        FileStatus::Pending | FileStatus::Transferring | FileStatus::Done => None,
    };
    if let Some(suffix) = suffix {
        line.push(' ');
        line.push_str(suffix);
    }
    line
}
