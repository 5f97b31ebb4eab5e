//! Paper identifiers and their classification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of an identifier, decided once when it is classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    /// An openly accessible link that already points at a PDF
    DirectUrl,
    /// A link to a landing page, usually behind a paywall
    PaywalledUrl,
    /// PubMed ID
    Pmid,
    /// Digital object identifier
    Doi,
}

impl IdentifierKind {
    /// Classify a raw identifier string.
    ///
    /// Rules are checked in order: an `http`/`https` string ending in `pdf`
    /// is a direct URL, any other `http`/`https` string is a paywalled URL,
    /// an all-digit string is a PMID and everything else is a DOI.
    ///
    /// The direct-URL check looks only at the trailing `pdf`, so
    /// `http://host/notpdf` is also treated as a direct URL.
    pub fn classify(raw: &str) -> Self {
        if raw.starts_with("http") {
            if raw.ends_with("pdf") {
                IdentifierKind::DirectUrl
            } else {
                IdentifierKind::PaywalledUrl
            }
        } else if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
            IdentifierKind::Pmid
        } else {
            IdentifierKind::Doi
        }
    }

    /// Short lowercase name, as used in logs and output
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentifierKind::DirectUrl => "url-direct",
            IdentifierKind::PaywalledUrl => "url-non-direct",
            IdentifierKind::Pmid => "pmid",
            IdentifierKind::Doi => "doi",
        }
    }
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw identifier tagged with its kind. Immutable once created.
///
/// Serialized as the raw string; the kind is recomputed on deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Identifier {
    raw: String,
    kind: IdentifierKind,
}

impl Identifier {
    /// Create and classify an identifier
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let kind = IdentifierKind::classify(&raw);
        Self { raw, kind }
    }

    /// The identifier exactly as supplied
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn kind(&self) -> IdentifierKind {
        self.kind
    }

    /// Whether the raw string contains something matching the DOI patterns.
    ///
    /// This is stricter than [`IdentifierKind::Doi`], which is merely the
    /// fallback classification.
    pub fn matches_doi_pattern(&self) -> bool {
        crate::parse::contains_doi(&self.raw)
    }
}

impl From<&str> for Identifier {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for Identifier {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<Identifier> for String {
    fn from(identifier: Identifier) -> Self {
        identifier.raw
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
