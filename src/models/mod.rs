//! Core data models for identifiers and download operations.

mod download;
mod identifier;

pub use download::{DownloadRequest, DownloadResult, FetchResult, ResolvedLink, SavedFile};
pub use identifier::{Identifier, IdentifierKind};
