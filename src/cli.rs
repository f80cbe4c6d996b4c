use std::path::PathBuf;
use std::time::Duration;

use clap::builder::TypedValueParser;
use clap::Parser;

use crate::config::{
    DownloadConfig, DEFAULT_MAX_RETRIES, DEFAULT_PROGRESS_INTERVAL, DEFAULT_SEGMENTS_PER_FILE,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// URLs to download, separated by ','
    #[arg(short = 'u', long = "urls", value_delimiter = ',', required = true)]
    pub urls: Vec<String>,

    /// Number of concurrent range requests per file
    #[arg(short = 't', long = "threads", default_value_t = DEFAULT_SEGMENTS_PER_FILE,
          value_parser = clap::value_parser!(u64).range(1..).map(|n| n as usize))]
    pub threads: usize,

    /// Attempts per segment before giving up on it
    #[arg(long = "max-retries", default_value_t = DEFAULT_MAX_RETRIES,
          value_parser = clap::value_parser!(u32).range(1..))]
    pub max_retries: u32,

    /// Seconds to wait between attempts of the same segment
    #[arg(long = "retry-delay", default_value = "2", value_parser = parse_seconds)]
    pub retry_delay: Duration,

    /// Name files after the URL; otherwise downloaded_0, downloaded_1, ...
    #[arg(long = "use-url-filename", default_value_t = true, action = clap::ArgAction::Set)]
    pub use_url_filename: bool,

    /// Directory to save downloaded files
    #[arg(short = 'd', long = "download-dir", default_value = ".")]
    pub download_dir: PathBuf,

    /// Log file for errors and retry messages (appended to)
    #[arg(long = "log-file", default_value = "downloader.log")]
    pub log_file: PathBuf,
}

impl Args {
    pub fn urls(&self) -> Vec<String> {
        self.urls
            .iter()
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .collect()
    }

    pub fn to_config(&self) -> DownloadConfig {
        DownloadConfig {
            segments_per_file: self.threads,
            max_retries: self.max_retries,
            retry_delay: self.retry_delay,
            use_url_filename: self.use_url_filename,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            ..DownloadConfig::default()
        }
    }
}

/// Parses a non-negative, finite number of seconds such as `2` or `0.5`.
fn parse_seconds(value: &str) -> Result<Duration, String> {
    let secs: f64 = value
        .parse()
        .map_err(|_| format!("`{}` is not a number of seconds", value))?;
    Duration::try_from_secs_f64(secs)
        .map_err(|_| format!("`{}` must be a finite, non-negative number of seconds", value))
}
