//! # rangedl
//!
//! Concurrent HTTP range downloader. Each file is split into byte-range
//! segments fetched in parallel with bounded retries, progress is sampled
//! once per second, and the segments are assembled into the output file.
//! Several files download at the same time.

pub mod assembler;
pub mod cli;
pub mod commands;
pub mod config;
pub mod display;
pub mod downloader;
pub mod error;
pub mod logging;
pub mod progress;
pub mod segment;
pub mod utils;
pub mod worker;

pub use config::DownloadConfig;
pub use downloader::{Downloader, FileOutcome};
