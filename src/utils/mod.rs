//! Utility modules supporting resolution and download.
//!
//! - [`HttpClient`]: shared HTTP client with bounded timeouts
//! - [`RetryConfig`], [`with_retry`]: retry with random backoff for retryable errors
//! - [`find_pdf_url`], [`find_iframe_src`]: locate embedded PDF links in HTML
//! - [`generate_name`], [`persist`], [`rename_saved`]: content-addressed naming and safe writes
//! - [`PostSaveHook`], [`PdfTitleHook`]: optional rename of a saved PDF to its title
//!
//! # Retry with Backoff
//!
//! ```rust,no_run
//! use papers_dl::utils::{with_retry, RetryConfig};
//! use papers_dl::SourceError;
//!
//! # async fn fetch_data() -> Result<String, SourceError> { Ok("data".to_string()) }
//! # #[tokio::main]
//! # async fn main() -> Result<(), SourceError> {
//! let config = RetryConfig::default().max_attempts(3);
//! let data = with_retry(config, || fetch_data()).await?;
//! # Ok(())
//! # }
//! ```

mod html;
mod http;
mod naming;
mod pdf;
mod retry;

pub use html::{find_iframe_src, find_pdf_url};
pub use http::{HttpClient, DEFAULT_USER_AGENT};
pub use naming::{generate_name, pdf_file_name, persist, rename_saved, sanitize_filename};
pub use pdf::{read_pdf_title, PdfTitleHook, PostSaveHook};
pub use retry::{with_retry, RetryConfig};
