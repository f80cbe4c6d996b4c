use futures::StreamExt;
use reqwest::{header, Client};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::config::RetryPolicy;
use crate::error::SegmentError;
use crate::progress::ProgressSender;
use crate::segment::Segment;

/// How a segment worker finished.
#[derive(Debug)]
pub enum SegmentOutcome {
    Complete { attempts: u32 },
    /// Every permitted attempt failed; `error` is the last failure.
    Exhausted { attempts: u32, error: SegmentError },
    Cancelled { attempts: u32 },
}

enum Attempt {
    Done,
    Failed(SegmentError),
    Cancelled,
}

/// Downloads `segment` from `url` into its buffer, retrying per `policy`.
///
/// Each attempt re-requests the whole range and overwrites the buffer from
/// its first byte. Progress is reported against a high-water mark, so bytes
/// received again by a retry are never counted twice and the increments for
/// one segment never add up to more than its length.
pub async fn fetch_segment(
    client: &Client,
    url: &str,
    segment: &mut Segment,
    policy: &RetryPolicy,
    progress: &ProgressSender,
    cancel: &CancellationToken,
) -> SegmentOutcome {
    let mut reported: usize = 0;
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;

        let result = tokio::select! {
            _ = cancel.cancelled() => Attempt::Cancelled,
            r = fetch_once(client, url, segment, &mut reported, progress) => match r {
                Ok(()) => Attempt::Done,
                Err(e) => Attempt::Failed(e),
            },
        };

        match result {
            Attempt::Done => {
                debug!(url, segment = segment.index, attempt, "segment complete");
                return SegmentOutcome::Complete { attempts: attempt };
            }
            Attempt::Cancelled => {
                debug!(url, segment = segment.index, attempt, "segment cancelled");
                return SegmentOutcome::Cancelled { attempts: attempt };
            }
            Attempt::Failed(e) if attempt >= policy.max_attempts => {
                error!(
                    url,
                    segment = segment.index,
                    attempts = attempt,
                    "failed to download segment: {}",
                    e
                );
                return SegmentOutcome::Exhausted {
                    attempts: attempt,
                    error: e,
                };
            }
            Attempt::Failed(e) => {
                warn!(
                    url,
                    segment = segment.index,
                    attempt,
                    "error downloading segment: {}. Retrying in {:?}",
                    e,
                    policy.delay
                );
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(url, segment = segment.index, attempt, "cancelled while waiting to retry");
                return SegmentOutcome::Cancelled { attempts: attempt };
            }
            _ = tokio::time::sleep(policy.delay) => {}
        }
    }
}

async fn fetch_once(
    client: &Client,
    url: &str,
    segment: &mut Segment,
    reported: &mut usize,
    progress: &ProgressSender,
) -> Result<(), SegmentError> {
    let response = client
        .get(url)
        .header(header::RANGE, segment.range_header())
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(SegmentError::Status(status));
    }

    let capacity = segment.buffer.len();
    let mut stream = response.bytes_stream();
    let mut offset = 0usize;

    while let Some(item) = stream.next().await {
        let chunk = item?;
        if chunk.is_empty() {
            continue;
        }

        let end = offset + chunk.len();
        if end > capacity {
            return Err(SegmentError::Overflow { capacity });
        }
        segment.buffer[offset..end].copy_from_slice(&chunk);
        offset = end;

        if offset > *reported {
            // A closed channel only means nobody is watching any more.
            let _ = progress.send((offset - *reported) as u64);
            *reported = offset;
        }
    }

    if offset < capacity {
        return Err(SegmentError::ShortBody {
            expected: capacity,
            received: offset,
        });
    }

    Ok(())
}
