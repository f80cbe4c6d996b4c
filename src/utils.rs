use url::Url;

/// Characters that are not allowed in file names on common filesystems.
const ILLEGAL_FILENAME_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Chooses the output file name for the `index`-th URL of a batch.
pub trait FilenameResolver: Send + Sync {
    fn resolve(&self, index: usize, url: &str) -> String;
}

/// Names files after the last segment of the URL path.
#[derive(Debug, Default, Clone, Copy)]
pub struct UrlFilenameResolver;

/// Names files `downloaded_0`, `downloaded_1`, ...
#[derive(Debug, Default, Clone, Copy)]
pub struct IndexedFilenameResolver;

impl FilenameResolver for UrlFilenameResolver {
    fn resolve(&self, index: usize, url: &str) -> String {
        get_filename_from_url(url)
            .map(|name| sanitize_filename(&name))
            .unwrap_or_else(|| indexed_filename(index))
    }
}

impl FilenameResolver for IndexedFilenameResolver {
    fn resolve(&self, index: usize, _url: &str) -> String {
        indexed_filename(index)
    }
}

pub fn resolver_for(use_url_filename: bool) -> Box<dyn FilenameResolver> {
    if use_url_filename {
        Box::new(UrlFilenameResolver)
    } else {
        Box::new(IndexedFilenameResolver)
    }
}

pub fn indexed_filename(index: usize) -> String {
    format!("downloaded_{}", index)
}

/// Last non-empty path segment of `url_str`, ignoring query and fragment.
///
/// Strings that do not parse as URLs are split on `/` as-is.
pub fn get_filename_from_url(url_str: &str) -> Option<String> {
    let name = match Url::parse(url_str) {
        Ok(url) => url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .map(str::to_string),
        Err(_) => url_str.rsplit('/').next().map(str::to_string),
    };

    name.filter(|n| !n.is_empty())
}

pub fn sanitize_filename(filename: &str) -> String {
    filename.replace(ILLEGAL_FILENAME_CHARS, "_")
}
