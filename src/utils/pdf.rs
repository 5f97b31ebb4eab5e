//! Post-save hooks that inspect a downloaded PDF.
//!
//! After a download is written under its content-addressed name, a hook may
//! propose a better name, usually the paper title. Hooks never fail the
//! download: a hook that finds nothing returns `None` and the original name
//! is kept.

use lopdf::{Document, Object};
use std::path::Path;

use crate::models::SavedFile;

/// Proposes a title for a freshly saved file
pub trait PostSaveHook: Send + Sync + std::fmt::Debug {
    /// Title to rename the file to, without extension
    fn title_for(&self, saved: &SavedFile) -> Option<String>;
}

/// Reads the `Title` entry of the PDF's document information dictionary
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfTitleHook;

impl PostSaveHook for PdfTitleHook {
    fn title_for(&self, saved: &SavedFile) -> Option<String> {
        match read_pdf_title(&saved.path) {
            Some(title) => {
                tracing::info!("Found paper title: {}", title);
                Some(title)
            }
            None => {
                tracing::debug!("No usable title in {}", saved.path.display());
                None
            }
        }
    }
}

/// Title from the PDF info dictionary, if present and non-blank
pub fn read_pdf_title(path: &Path) -> Option<String> {
    let doc = match Document::load(path) {
        Ok(doc) => doc,
        Err(e) => {
            tracing::debug!("Failed to open {} as PDF: {}", path.display(), e);
            return None;
        }
    };

    let info = deref(&doc, doc.trailer.get(b"Info").ok()?)?;
    let title = deref(&doc, info.as_dict().ok()?.get(b"Title").ok()?)?;
    let title = decode_text_string(title.as_str().ok()?);

    let title = title.trim();
    if title.is_empty() {
        None
    } else {
        Some(title.to_string())
    }
}

fn deref<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Decode a PDF text string: UTF-16BE with BOM, otherwise byte-per-char.
fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        bytes.iter().map(|&b| b as char).collect()
    }
}
