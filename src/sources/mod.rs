//! Source adapters that turn an identifier into a saved PDF.
//!
//! Every adapter implements [`Source`]: `resolve` finds a direct PDF link,
//! `fetch` downloads it and `download` persists it. Two adapters ship:
//!
//! - [`SciHubSource`]: scrapes Sci-Hub through a list of live mirrors,
//!   rotating to the next mirror on failure and retrying with random backoff.
//!   A session owns its [`MirrorList`]; create one session per identifier so
//!   a rotation caused by one paper never affects another.
//! - [`SciDbSource`]: a single fixed endpoint that accepts DOIs only. No
//!   mirror state, one attempt per call, safe to share across many concurrent
//!   tasks.
//!
//! # Example
//!
//! ```rust,no_run
//! use papers_dl::config::SciHubConfig;
//! use papers_dl::models::DownloadRequest;
//! use papers_dl::sources::{SciHubSource, Source};
//! use papers_dl::utils::HttpClient;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), papers_dl::SourceError> {
//! let client = HttpClient::new()?;
//! let source = SciHubSource::connect(client, &SciHubConfig::default()).await?;
//! let result = source
//!     .download(&DownloadRequest::new("10.1038/nature14539", "."))
//!     .await?;
//! println!("saved {} ({} bytes)", result.name, result.bytes);
//! # Ok(())
//! # }
//! ```

mod mirrors;
mod observer;
mod scidb;
mod scihub;

pub mod mock;

pub use mirrors::{discover_mirrors, parse_mirror_page, MirrorList};
pub use mock::MockSource;
pub use observer::{SessionObserver, TracingObserver};
pub use scidb::SciDbSource;
pub use scihub::SciHubSource;

use async_trait::async_trait;
use std::path::PathBuf;

use crate::models::{DownloadRequest, DownloadResult, FetchResult, Identifier, ResolvedLink, SavedFile};
use crate::utils::{pdf_file_name, persist, rename_saved, PostSaveHook};

/// The capability surface shared by all adapters.
#[async_trait]
pub trait Source: Send + Sync + std::fmt::Debug {
    /// Unique identifier for this source (e.g. "scihub", "scidb")
    fn id(&self) -> &str;

    /// Human-readable name of this source
    fn name(&self) -> &str;

    /// Find the direct PDF link for an identifier
    async fn resolve(&self, identifier: &Identifier) -> Result<ResolvedLink, SourceError>;

    /// Resolve and download the PDF bytes
    async fn fetch(&self, identifier: &Identifier) -> Result<FetchResult, SourceError>;

    /// Fetch the paper and write it into the request's output directory
    async fn download(&self, request: &DownloadRequest) -> Result<DownloadResult, SourceError> {
        if !request.output_dir.is_dir() {
            return Err(SourceError::InvalidRequest(format!(
                "Output directory does not exist: {}",
                request.output_dir.display()
            )));
        }

        let fetched = self.fetch(&request.identifier).await?;
        tracing::info!(
            "Successfully downloaded file with identifier {}",
            request.identifier
        );
        save_fetched(fetched, request)
    }
}

/// Persist a fetch result and apply the request's naming rules.
///
/// An explicit request name is written to directly. Otherwise the file is
/// written under its content-addressed name and the request's title hook may
/// propose a title. A hook that finds nothing, or whose rename fails (for
/// instance because the title is already taken), leaves the
/// content-addressed name in place.
pub fn save_fetched(
    fetched: FetchResult,
    request: &DownloadRequest,
) -> Result<DownloadResult, SourceError> {
    let file_name = match &request.name {
        Some(name) => pdf_file_name(name),
        None => pdf_file_name(&fetched.generated_name),
    };
    let bytes = fetched.bytes.len() as u64;
    let mut saved = persist(&fetched.bytes, &request.output_dir.join(file_name))?;

    if request.name.is_none() {
        if let Some(hook) = &request.title_hook {
            saved = rename_from_hook(saved, hook.as_ref());
        }
    }

    tracing::info!("File downloaded to {}", saved.path.display());
    Ok(DownloadResult::new(saved, fetched.source_url, bytes))
}

fn rename_from_hook(saved: SavedFile, hook: &dyn PostSaveHook) -> SavedFile {
    let Some(title) = hook.title_for(&saved) else {
        return saved;
    };

    match rename_saved(&saved, &title) {
        Ok(renamed) => renamed,
        Err(e) => {
            tracing::warn!("Keeping {}: {}", saved.name, e);
            saved
        }
    }
}

/// Errors that can occur while resolving, fetching or saving a paper
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// No mirror produced a link for the identifier
    #[error("Identifier not found: {0}")]
    IdentifierNotFound(String),

    /// The mirror list is exhausted
    #[error("No mirrors available")]
    NoMirrorsAvailable,

    /// An anti-bot page was returned instead of a PDF
    #[error("Captcha needed: {0}")]
    CaptchaNeeded(String),

    /// Network, HTTP or parse failure while talking to a mirror
    #[error("Site access error: {0}")]
    SiteAccessError(String),

    /// The single-endpoint source has nothing for this identifier
    #[error("Source not found for identifier: {0}")]
    SourceNotFound(String),

    /// Writing the output file failed
    #[error("Failed to write {}: {source}", .path.display())]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl SourceError {
    /// Whether the fetch retry loop may try again after this error.
    ///
    /// Only captcha blocks and site access failures are retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SourceError::CaptchaNeeded(_) | SourceError::SiteAccessError(_)
        )
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::SiteAccessError(format!("Request timed out: {}", err))
        } else {
            SourceError::SiteAccessError(err.to_string())
        }
    }
}

/// Make a link found on `page_url` absolute.
///
/// Protocol-relative links (`//host/x.pdf`) get an `http:` prefix; other
/// relative links are joined onto the page URL.
pub(crate) fn absolutize(link: &str, page_url: &str) -> String {
    if let Some(rest) = link.strip_prefix("//") {
        return format!("http://{}", rest);
    }
    if url::Url::parse(link).is_ok() {
        return link.to_string();
    }
    url::Url::parse(page_url)
        .and_then(|base| base.join(link))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| link.to_string())
}
