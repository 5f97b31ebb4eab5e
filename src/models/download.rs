//! Models flowing through resolution, fetching and persistence.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use super::Identifier;
use crate::utils::PostSaveHook;

/// A direct PDF link produced by resolution. Consumed once by the fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLink {
    pub url: String,
    pub source_identifier: Identifier,
}

impl ResolvedLink {
    pub fn new(url: impl Into<String>, source_identifier: Identifier) -> Self {
        Self {
            url: url.into(),
            source_identifier,
        }
    }
}

/// Downloaded PDF bytes together with where they came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    /// Raw PDF content
    pub bytes: Vec<u8>,
    /// The resolved URL the bytes were fetched from
    pub source_url: String,
    /// Content-addressed file name (`<md5>-<url hint>`)
    pub generated_name: String,
}

/// A file written to disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedFile {
    pub path: PathBuf,
    pub name: String,
}

impl SavedFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { path, name }
    }
}

/// Request for downloading a paper
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    /// The identifier to resolve
    pub identifier: Identifier,

    /// Directory the PDF is written to
    pub output_dir: PathBuf,

    /// Explicit file name (without `.pdf`); overrides any post-save title
    pub name: Option<String>,

    /// Hook that may rename the file after it is saved
    pub title_hook: Option<Arc<dyn PostSaveHook>>,
}

impl DownloadRequest {
    /// Create a new download request
    pub fn new(identifier: impl Into<Identifier>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            identifier: identifier.into(),
            output_dir: output_dir.into(),
            name: None,
            title_hook: None,
        }
    }

    /// Set an explicit output file name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Rename the saved file using a hook, unless an explicit name is set
    pub fn title_hook(mut self, hook: Arc<dyn PostSaveHook>) -> Self {
        self.title_hook = Some(hook);
        self
    }
}

/// Result of a download, returned to the caller for logging or chaining
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadResult {
    /// Final file name on disk
    pub name: String,

    /// Full path of the saved file
    pub path: PathBuf,

    /// URL the PDF was fetched from
    pub url: String,

    /// Number of bytes written
    pub bytes: u64,
}

impl DownloadResult {
    pub fn new(saved: SavedFile, url: impl Into<String>, bytes: u64) -> Self {
        Self {
            name: saved.name,
            path: saved.path,
            url: url.into(),
            bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_saved_file_name_from_path() {
        let saved = SavedFile::new("/tmp/out/abc-paper.pdf");
        assert_eq!(saved.name, "abc-paper.pdf");
    }

    #[test]
    fn test_download_request_builder() {
        let request = DownloadRequest::new("10.1000/xyz", "/tmp").name("My Paper");
        assert_eq!(request.identifier.as_str(), "10.1000/xyz");
        assert_eq!(request.name.as_deref(), Some("My Paper"));
    }

    #[test]
    fn test_download_result_serializes() {
        let result = DownloadResult::new(
            SavedFile::new("/tmp/a.pdf"),
            "http://mirror.test/a.pdf",
            42,
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["name"], "a.pdf");
        assert_eq!(json["url"], "http://mirror.test/a.pdf");
        assert_eq!(json["bytes"], 42);
    }
}
