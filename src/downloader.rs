use std::path::Path;

use reqwest::{header, Client, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::assembler;
use crate::config::DownloadConfig;
use crate::error::{DownloadError, DownloadResult};
use crate::progress::{
    progress_channel, FileStatus, ProgressAggregator, ProgressSlot, ProgressSnapshot,
};
use crate::segment::{self, Segment};
use crate::worker::{self, SegmentOutcome};

/// How a file download ended when it did not fail outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Complete {
        bytes: u64,
    },
    /// The file was written, but the listed segments exhausted their retries
    /// and their bytes may be missing or stale.
    Incomplete {
        bytes: u64,
        failed_segments: Vec<usize>,
    },
    Cancelled,
}

struct Transfer {
    /// Sorted by index.
    segments: Vec<Segment>,
    failed_segments: Vec<usize>,
    cancelled: bool,
}

/// Downloads single files by splitting them into concurrent range requests.
///
/// Cheap to clone; clones share the HTTP connection pool.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
    config: DownloadConfig,
}

impl Downloader {
    pub fn new(config: DownloadConfig) -> Self {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self::with_client(client, config)
    }

    pub fn with_client(client: Client, config: DownloadConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Downloads `url` into `output`, publishing progress into `slot`.
    ///
    /// Segment failures do not fail the file: it is assembled regardless and
    /// reported as [`FileOutcome::Incomplete`]. Size discovery and assembly
    /// failures are returned as errors. On cancellation nothing is written.
    pub async fn download_file(
        &self,
        url: &str,
        output: &Path,
        slot: &ProgressSlot,
        cancel: &CancellationToken,
    ) -> DownloadResult<FileOutcome> {
        let filename = display_name(output);

        let total_size = match self.discover_size(url, cancel).await {
            Ok(Some(size)) => size,
            Ok(None) => {
                slot.publish(final_snapshot(slot, FileStatus::Cancelled));
                return Ok(FileOutcome::Cancelled);
            }
            Err(e) => {
                error!(url, "error getting file size: {}", e);
                slot.publish(ProgressSnapshot::size_unknown(filename));
                return Err(e);
            }
        };

        let segments = match segment::plan(total_size, self.config.segments_per_file) {
            Ok(segments) => segments,
            Err(e) => {
                slot.publish(ProgressSnapshot::size_unknown(filename));
                return Err(DownloadError::SizeDiscovery {
                    url: url.to_string(),
                    reason: e.to_string(),
                });
            }
        };
        info!(url, total_size, segments = segments.len(), "starting download");

        let Transfer {
            segments,
            failed_segments,
            cancelled,
        } = self
            .transfer(url, &filename, total_size, segments, slot, cancel)
            .await;

        if cancelled {
            info!(url, "download cancelled before assembly");
            slot.publish(final_snapshot(slot, FileStatus::Cancelled));
            return Ok(FileOutcome::Cancelled);
        }

        let bytes = match assembler::write_segments(output, &segments).await {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(url, path = ?output, "error writing file: {}", e);
                slot.publish(final_snapshot(slot, FileStatus::Failed));
                return Err(e.into());
            }
        };

        let status = if failed_segments.is_empty() {
            FileStatus::Done
        } else {
            FileStatus::Incomplete
        };
        slot.publish(ProgressSnapshot {
            filename,
            downloaded_bytes: total_size,
            total_bytes: total_size,
            speed: 0,
            status,
        });

        if failed_segments.is_empty() {
            info!(url, path = ?output, bytes, "download complete");
            Ok(FileOutcome::Complete { bytes })
        } else {
            warn!(url, path = ?output, ?failed_segments, "file written with missing segments");
            Ok(FileOutcome::Incomplete {
                bytes,
                failed_segments,
            })
        }
    }

    /// Runs one worker per segment plus the aggregator and waits for all of them.
    async fn transfer(
        &self,
        url: &str,
        filename: &str,
        total_size: u64,
        segments: Vec<Segment>,
        slot: &ProgressSlot,
        cancel: &CancellationToken,
    ) -> Transfer {
        let (progress_tx, progress_rx) = progress_channel();
        let aggregator =
            ProgressAggregator::new(filename, total_size, self.config.progress_interval);
        let aggregator_handle =
            tokio::spawn(aggregator.run(progress_rx, slot.clone(), cancel.clone()));

        let policy = self.config.retry_policy();
        let mut handles = Vec::with_capacity(segments.len());
        for mut segment in segments {
            let client = self.client.clone();
            let url = url.to_string();
            let progress_tx = progress_tx.clone();
            let cancel = cancel.clone();
            let range = (segment.index, segment.start, segment.end);

            let handle = tokio::spawn(async move {
                let outcome = worker::fetch_segment(
                    &client,
                    &url,
                    &mut segment,
                    &policy,
                    &progress_tx,
                    &cancel,
                )
                .await;
                (segment, outcome)
            });
            handles.push((range, handle));
        }
        drop(progress_tx);

        let mut finished = Vec::with_capacity(handles.len());
        let mut failed = Vec::new();
        let mut cancelled = false;

        for ((index, start, end), handle) in handles {
            match handle.await {
                Ok((segment, outcome)) => {
                    match &outcome {
                        SegmentOutcome::Complete { .. } => {}
                        SegmentOutcome::Exhausted { .. } => failed.push(index),
                        SegmentOutcome::Cancelled { .. } => cancelled = true,
                    }
                    finished.push(segment);
                }
                Err(e) => {
                    // The buffer went down with the task; a zeroed stand-in
                    // keeps the layout contiguous.
                    error!(url, segment = index, "segment task failed: {}", e);
                    failed.push(index);
                    finished.push(Segment::new(index, start, end));
                }
            }
        }

        if let Err(e) = aggregator_handle.await {
            warn!(url, "progress aggregator task failed: {}", e);
        }

        finished.sort_by_key(|s| s.index);
        Transfer {
            segments: finished,
            failed_segments: failed,
            cancelled: cancelled || cancel.is_cancelled(),
        }
    }

    /// Finds the total size with a `HEAD` request, falling back to a one-byte
    /// range request. Returns `Ok(None)` if cancelled.
    async fn discover_size(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> DownloadResult<Option<u64>> {
        let lookup = async {
            match self.size_from_head(url).await {
                Ok(size) => Ok(size),
                Err(head_err) => {
                    debug!(url, "HEAD gave no size ({}), trying a range request", head_err);
                    self.size_from_range_request(url)
                        .await
                        .map_err(|range_err| DownloadError::SizeDiscovery {
                            url: url.to_string(),
                            reason: format!("{}; range request: {}", head_err, range_err),
                        })
                }
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => Ok(None),
            size = lookup => size.map(Some),
        }
    }

    async fn size_from_head(&self, url: &str) -> Result<u64, String> {
        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("HEAD returned {}", response.status()));
        }

        response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|&size| size > 0)
            .ok_or_else(|| "missing Content-Length".to_string())
    }

    async fn size_from_range_request(&self, url: &str) -> Result<u64, String> {
        let response = self
            .client
            .get(url)
            .header(header::RANGE, "bytes=0-0")
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if response.status() != StatusCode::PARTIAL_CONTENT {
            return Err(format!("range request returned {}", response.status()));
        }

        response
            .headers()
            .get(header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total)
            .filter(|&size| size > 0)
            .ok_or_else(|| "missing Content-Range total".to_string())
    }
}

/// Extracts the complete length from a `Content-Range: bytes a-b/total` value.
pub fn parse_content_range_total(value: &str) -> Option<u64> {
    let (unit, rest) = value.trim().split_once(' ')?;
    if !unit.eq_ignore_ascii_case("bytes") {
        return None;
    }
    let (_, total) = rest.split_once('/')?;
    total.trim().parse().ok()
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn final_snapshot(slot: &ProgressSlot, status: FileStatus) -> ProgressSnapshot {
    ProgressSnapshot {
        speed: 0,
        status,
        ..slot.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_content_range_total() {
        assert_eq!(parse_content_range_total("bytes 0-0/1234"), Some(1234));
        assert_eq!(parse_content_range_total("bytes 0-0/ 77 "), Some(77));
        assert_eq!(parse_content_range_total("bytes 0-0/*"), None);
        assert_eq!(parse_content_range_total("items 0-0/10"), None);
        assert_eq!(parse_content_range_total("garbage"), None);
    }

    #[test]
    fn test_display_name_uses_file_name() {
        assert_eq!(display_name(Path::new("/tmp/dl/file.iso")), "file.iso");
    }
}
