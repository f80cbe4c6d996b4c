use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_SEGMENTS_PER_FILE: usize = 4;
pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// Settings for one download batch.
///
/// Built once (normally from the command line) and handed to the
/// orchestrators by value; nothing mutates it while a batch is running.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Number of range requests each file is split into.
    pub segments_per_file: usize,
    /// Total attempt budget for a single segment.
    pub max_retries: u32,
    /// Fixed pause between two attempts of the same segment.
    pub retry_delay: Duration,
    /// Name output files after the last URL path segment instead of `downloaded_<i>`.
    pub use_url_filename: bool,
    /// Sampling period of the progress aggregator and the display.
    pub progress_interval: Duration,
    pub user_agent: String,
    pub connect_timeout: Duration,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            segments_per_file: DEFAULT_SEGMENTS_PER_FILE,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            use_url_filename: true,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            user_agent: format!("rangedl/{}", env!("CARGO_PKG_VERSION")),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl DownloadConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.segments_per_file == 0 {
            return Err(ConfigError::ZeroSegments);
        }
        if self.max_retries == 0 {
            return Err(ConfigError::ZeroRetries);
        }
        if self.progress_interval.is_zero() {
            return Err(ConfigError::ZeroProgressInterval);
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries,
            delay: self.retry_delay,
        }
    }
}

/// How a segment worker retries: a bounded number of attempts with a fixed
/// delay in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}
