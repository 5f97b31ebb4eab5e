//! # papers-dl
//!
//! Resolve scholarly-paper identifiers (DOI, PMID, URL) to a PDF, fetch it from
//! one of several mirror sources and save it under a content-addressed name.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Core data structures (Identifier, FetchResult, SavedFile, etc.)
//! - [`sources`]: Source adapters (mirror-rotating Sci-Hub, single-endpoint SciDB)
//! - [`utils`]: HTTP client, retry, HTML link extraction, naming and persistence
//! - [`parse`]: Identifier scanning in free text and output formatting
//! - [`config`]: Configuration management

pub mod config;
pub mod models;
pub mod parse;
pub mod sources;
pub mod utils;

// Re-export commonly used types
pub use models::{Identifier, IdentifierKind};
pub use sources::{SciDbSource, SciHubSource, Source, SourceError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
