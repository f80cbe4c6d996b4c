#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rangedl::DownloadConfig;
use wiremock::{Request, Respond, ResponseTemplate};

pub fn sample_content(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

pub fn fast_config(segments: usize) -> DownloadConfig {
    DownloadConfig {
        segments_per_file: segments,
        max_retries: 3,
        retry_delay: Duration::from_millis(10),
        progress_interval: Duration::from_millis(50),
        ..DownloadConfig::default()
    }
}

fn is_head(request: &Request) -> bool {
    request.method.as_str() == "HEAD"
}

fn range_of(request: &Request) -> Option<(usize, usize)> {
    let value = request.headers.get("range")?.to_str().ok()?;
    let (start, end) = value.strip_prefix("bytes=")?.split_once('-')?;
    Some((start.parse().ok()?, end.parse().ok()?))
}

/// Serves `content` the way a range-capable static file server would.
#[derive(Clone)]
pub struct RangeResponder {
    content: Arc<Vec<u8>>,
    head_supported: bool,
    ignore_range: bool,
}

impl RangeResponder {
    pub fn new(content: Vec<u8>) -> Self {
        Self {
            content: Arc::new(content),
            head_supported: true,
            ignore_range: false,
        }
    }

    pub fn without_head(mut self) -> Self {
        self.head_supported = false;
        self
    }

    /// Answers every GET with the whole body and status 200.
    pub fn ignoring_range(mut self) -> Self {
        self.ignore_range = true;
        self
    }
}

impl Respond for RangeResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        if is_head(request) {
            if !self.head_supported {
                return ResponseTemplate::new(405);
            }
            return ResponseTemplate::new(200).set_body_bytes(self.content.to_vec());
        }

        match range_of(request) {
            Some((start, end)) if !self.ignore_range && end < self.content.len() => {
                ResponseTemplate::new(206)
                    .insert_header(
                        "Content-Range",
                        format!("bytes {}-{}/{}", start, end, self.content.len()),
                    )
                    .set_body_bytes(self.content[start..=end].to_vec())
            }
            _ => ResponseTemplate::new(200).set_body_bytes(self.content.to_vec()),
        }
    }
}

/// Fails the first `failures` GET requests (500, or a truncated body when
/// `truncate` is set) and then delegates. Counts every GET it sees.
pub struct FlakyResponder {
    inner: RangeResponder,
    failures: usize,
    truncate: bool,
    gets: Arc<AtomicUsize>,
}

impl FlakyResponder {
    pub fn new(inner: RangeResponder, failures: usize) -> (Self, Arc<AtomicUsize>) {
        let gets = Arc::new(AtomicUsize::new(0));
        let responder = Self {
            inner,
            failures,
            truncate: false,
            gets: gets.clone(),
        };
        (responder, gets)
    }

    pub fn truncating(mut self) -> Self {
        self.truncate = true;
        self
    }
}

impl Respond for FlakyResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        if is_head(request) {
            return self.inner.respond(request);
        }

        let seen = self.gets.fetch_add(1, Ordering::SeqCst);
        if seen >= self.failures {
            return self.inner.respond(request);
        }

        if self.truncate {
            if let Some((start, end)) = range_of(request) {
                let half = start + (end - start + 1) / 2;
                return ResponseTemplate::new(206)
                    .set_body_bytes(self.inner.content[start..half].to_vec());
            }
        }
        ResponseTemplate::new(500)
    }
}

/// Always fails GETs whose range starts at `start`.
pub struct BrokenRangeResponder {
    pub inner: RangeResponder,
    pub start: usize,
}

impl Respond for BrokenRangeResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        match range_of(request) {
            Some((start, _)) if start == self.start && !is_head(request) => {
                ResponseTemplate::new(503)
            }
            _ => self.inner.respond(request),
        }
    }
}
