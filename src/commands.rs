use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::DownloadConfig;
use crate::display::{self, ProgressDisplay};
use crate::downloader::{Downloader, FileOutcome};
use crate::error::DownloadError;
use crate::progress::{ProgressSlot, ProgressSnapshot};
use crate::utils::{resolver_for, FilenameResolver};

/// Result of one file in a batch.
#[derive(Debug)]
pub struct FileReport {
    pub url: String,
    pub path: PathBuf,
    pub result: Result<FileOutcome, DownloadError>,
}

impl FileReport {
    pub fn is_complete(&self) -> bool {
        matches!(self.result, Ok(FileOutcome::Complete { .. }))
    }
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub files: Vec<FileReport>,
}

impl BatchReport {
    pub fn all_complete(&self) -> bool {
        self.files.iter().all(FileReport::is_complete)
    }

    /// One line per file that did not complete cleanly.
    pub fn problems(&self) -> Vec<String> {
        self.files
            .iter()
            .filter_map(|f| match &f.result {
                Ok(FileOutcome::Complete { .. }) => None,
                Ok(FileOutcome::Incomplete {
                    failed_segments, ..
                }) => Some(format!(
                    "{}: incomplete, segments {:?} failed",
                    f.path.display(),
                    failed_segments
                )),
                Ok(FileOutcome::Cancelled) => Some(format!("{}: cancelled", f.path.display())),
                Err(e) => Some(format!("{}: {}", f.path.display(), e)),
            })
            .collect()
    }
}

/// Downloads every URL concurrently into `output_dir` while drawing progress
/// to the terminal.
pub async fn run_downloads(
    urls: Vec<String>,
    output_dir: PathBuf,
    config: DownloadConfig,
    cancel: CancellationToken,
) -> Result<BatchReport> {
    let resolver = resolver_for(config.use_url_filename);
    let downloader = Downloader::new(config);
    run_batch(&downloader, urls, &output_dir, resolver.as_ref(), cancel, true).await
}

/// Batch driver behind [`run_downloads`], with the downloader and filename
/// resolver supplied by the caller. `show_progress` turns the terminal
/// display on or off.
pub async fn run_batch(
    downloader: &Downloader,
    urls: Vec<String>,
    output_dir: &Path,
    resolver: &dyn FilenameResolver,
    cancel: CancellationToken,
    show_progress: bool,
) -> Result<BatchReport> {
    if !output_dir.exists() {
        fs::create_dir_all(output_dir)
            .await
            .with_context(|| format!("Failed to create output directory {:?}", output_dir))?;
    }

    let mut handles = Vec::with_capacity(urls.len());
    let mut views = Vec::with_capacity(urls.len());

    for (index, url) in urls.into_iter().enumerate() {
        let filename = resolver.resolve(index, &url);
        let path = output_dir.join(&filename);
        let (slot, view) = ProgressSlot::new(ProgressSnapshot::pending(filename));
        views.push(view);

        let downloader = downloader.clone();
        let cancel = cancel.clone();
        let task_url = url.clone();
        let task_path = path.clone();
        let handle = tokio::spawn(async move {
            let result = downloader
                .download_file(&task_url, &task_path, &slot, &cancel)
                .await;
            FileReport {
                url: task_url,
                path: task_path,
                result,
            }
        });
        handles.push((url, path, handle));
    }

    let display_cancel = cancel.child_token();
    let display = ProgressDisplay::new(views, downloader.config().progress_interval);
    let display_handle = show_progress.then(|| tokio::spawn(display.run(display_cancel.clone())));

    let report = collect_reports(handles).await;

    display_cancel.cancel();
    if let Some(handle) = display_handle {
        let mut display = handle.await.context("progress display task panicked")?;
        let _ = display::write_frame(&display::render_frame(display.refresh()));
        println!("\nAll files downloaded.");
        for problem in report.problems() {
            println!("  {}", problem);
        }
    }

    info!(
        files = report.files.len(),
        complete = report.files.iter().filter(|f| f.is_complete()).count(),
        "batch finished"
    );
    Ok(report)
}

/// Awaits every file task in order. A task that panicked or was aborted is
/// recorded as a failed file rather than ending the batch early.
async fn collect_reports(
    handles: Vec<(String, PathBuf, JoinHandle<FileReport>)>,
) -> BatchReport {
    let mut report = BatchReport::default();
    for (url, path, handle) in handles {
        let file = match handle.await {
            Ok(file) => file,
            Err(e) => FileReport {
                result: Err(DownloadError::Task {
                    url: url.clone(),
                    reason: e.to_string(),
                }),
                url,
                path,
            },
        };
        if let Err(e) = &file.result {
            error!(url = %file.url, "failed to download: {}", e);
        }
        report.files.push(file);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_panicked_task_is_reported_not_propagated() {
        let ok = tokio::spawn(async {
            FileReport {
                url: "http://a/ok".to_string(),
                path: PathBuf::from("ok"),
                result: Ok(FileOutcome::Complete { bytes: 3 }),
            }
        });
        let boom: JoinHandle<FileReport> = tokio::spawn(async { panic!("worker blew up") });

        let report = collect_reports(vec![
            ("http://a/ok".to_string(), PathBuf::from("ok"), ok),
            ("http://a/boom".to_string(), PathBuf::from("boom"), boom),
        ])
        .await;

        assert_eq!(report.files.len(), 2);
        assert!(report.files[0].is_complete());
        assert_eq!(report.files[1].url, "http://a/boom");
        assert!(matches!(
            report.files[1].result,
            Err(DownloadError::Task { .. })
        ));
        assert_eq!(report.problems().len(), 1);
    }
}
