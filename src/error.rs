//! Error types for the download engine.
//!
//! Segment-level failures never leave the worker as errors; they are
//! retried and summarised in a [`SegmentOutcome`](crate::worker::SegmentOutcome).
//! Only file-level failures surface as [`DownloadError`].

use std::io;
use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("segments per file must be at least 1")]
    ZeroSegments,

    #[error("max retries must be at least 1")]
    ZeroRetries,

    #[error("progress interval must be greater than zero")]
    ZeroProgressInterval,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("cannot segment an empty resource")]
    EmptyResource,

    #[error("segment count must be at least 1")]
    NoSegments,
}

/// Why a single range-request attempt failed.
#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(StatusCode),

    #[error("server sent more than the {capacity} bytes requested (range ignored?)")]
    Overflow { capacity: usize },

    #[error("body ended after {received} of {expected} bytes")]
    ShortBody { expected: usize, received: usize },
}

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("failed to create {path:?}: {source}")]
    Create { path: PathBuf, source: io::Error },

    #[error("failed to write {path:?}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("segments out of order: expected index {expected_index}, found {found_index}")]
    OutOfOrder {
        expected_index: usize,
        found_index: usize,
    },
}

/// File-level failures reported by [`Downloader::download_file`](crate::downloader::Downloader::download_file).
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("could not determine size of {url}: {reason}")]
    SizeDiscovery { url: String, reason: String },

    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    #[error("download task for {url} did not finish: {reason}")]
    Task { url: String, reason: String },
}

pub type DownloadResult<T> = Result<T, DownloadError>;
