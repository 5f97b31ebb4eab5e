//! Content-addressed file names and safe persistence of downloads.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::models::SavedFile;
use crate::sources::SourceError;

/// Number of trailing URL characters kept as a readable hint in file names
const URL_HINT_LEN: usize = 20;

/// Build a file name from the response URL and body.
///
/// The name is `<md5 of bytes>-<last 20 chars of the URL's final segment>`,
/// with any `#view=...` fragment removed first. Identical content fetched
/// from the same URL always yields the same name.
pub fn generate_name(response_url: &str, bytes: &[u8]) -> String {
    let segment = response_url.rsplit('/').next().unwrap_or_default();
    let segment = strip_view_fragment(segment);

    let hint_start = segment.chars().count().saturating_sub(URL_HINT_LEN);
    let hint: String = segment.chars().skip(hint_start).collect();

    let digest = md5::compute(bytes);
    format!("{:x}-{}", digest, hint)
}

fn strip_view_fragment(segment: &str) -> &str {
    match segment.find("#view=") {
        Some(idx) if segment.len() > idx + "#view=".len() => &segment[..idx],
        _ => segment,
    }
}

/// Write `bytes` to `path`, replacing any existing file.
///
/// Content goes to a temporary file in the destination directory first and
/// is moved into place only once fully written, so a failed write never
/// leaves a truncated file at `path`.
pub fn persist(bytes: &[u8], path: &Path) -> Result<SavedFile, SourceError> {
    let write_error = |source: std::io::Error| SourceError::WriteError {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_error)?;
    tmp.write_all(bytes).map_err(write_error)?;
    tmp.flush().map_err(write_error)?;
    tmp.as_file().sync_all().map_err(write_error)?;
    tmp.persist(path).map_err(|e| write_error(e.error))?;

    tracing::debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(SavedFile::new(path))
}

/// Rename a saved file to `<title>.pdf` in the same directory.
///
/// An existing file at the target is never replaced; that case fails with
/// [`SourceError::WriteError`] and leaves `saved` where it is.
pub fn rename_saved(saved: &SavedFile, title: &str) -> Result<SavedFile, SourceError> {
    let file_name = pdf_file_name(title);
    let target: PathBuf = match saved.path.parent() {
        Some(parent) => parent.join(&file_name),
        None => PathBuf::from(&file_name),
    };

    if target == saved.path {
        return Ok(saved.clone());
    }

    if target.exists() {
        return Err(SourceError::WriteError {
            path: target,
            source: std::io::Error::new(std::io::ErrorKind::AlreadyExists, "file exists"),
        });
    }

    std::fs::rename(&saved.path, &target).map_err(|source| SourceError::WriteError {
        path: target.clone(),
        source,
    })?;

    tracing::info!("Renamed {} to {}", saved.path.display(), target.display());
    Ok(SavedFile::new(target))
}

/// Turn a free-form title into a file name ending in `.pdf`
pub fn pdf_file_name(title: &str) -> String {
    let cleaned = sanitize_filename(title);
    if cleaned.to_lowercase().ends_with(".pdf") {
        cleaned
    } else {
        format!("{}.pdf", cleaned)
    }
}

/// Replace characters that are not allowed in file names on common platforms
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let cleaned = cleaned.trim_matches('.').trim().to_string();
    if cleaned.is_empty() {
        "untitled".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_generate_name_is_deterministic() {
        let url = "https://mirror.test/downloads/2019/abcdef/lecun2015.pdf#view=FitH";
        let a = generate_name(url, b"%PDF-1.4 content");
        let b = generate_name(url, b"%PDF-1.4 content");
        assert_eq!(a, b);
        assert_eq!(a, format!("{:x}-lecun2015.pdf", md5::compute(b"%PDF-1.4 content")));
    }

    #[test]
    fn test_generate_name_changes_with_content() {
        let url = "http://mirror.test/x.pdf";
        let a = generate_name(url, b"%PDF-1.4 aaaa");
        let b = generate_name(url, b"%PDF-1.4 aaab");
        assert_ne!(a, b);
        assert_eq!(a.split_once('-').map(|(_, s)| s), Some("x.pdf"));
    }

    #[test]
    fn test_generate_name_hint_is_at_most_20_chars() {
        let url = "http://mirror.test/a-very-long-file-name-for-a-scientific-paper.pdf";
        let name = generate_name(url, b"x");
        let (hash, hint) = name.split_at(32);
        assert_eq!(hash.len(), 32);
        let hint = hint.trim_start_matches('-');
        assert!(hint.chars().count() <= 20);
        assert_eq!(hint, "scientific-paper.pdf");
    }

    #[test]
    fn test_generate_name_multibyte_segment() {
        let name = generate_name("http://mirror.test/日本語の論文タイトルがとても長い場合のファイル名.pdf", b"x");
        let hint = &name[33..];
        assert_eq!(hint.chars().count(), 20);
    }

    #[test]
    fn test_persist_writes_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("paper.pdf");

        let saved = persist(b"%PDF-1.4", &path).unwrap();
        assert_eq!(saved.name, "paper.pdf");
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.4");

        // Overwrites rather than appends
        persist(b"%PDF", &path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF");
    }

    #[test]
    fn test_persist_missing_directory_is_write_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("paper.pdf");

        let err = persist(b"%PDF", &path).unwrap_err();
        assert!(matches!(err, SourceError::WriteError { .. }));
        assert!(!err.is_retryable());
        assert!(!path.exists());
    }

    #[test]
    fn test_rename_saved() {
        let dir = tempdir().unwrap();
        let saved = persist(b"%PDF", &dir.path().join("abc-x.pdf")).unwrap();

        let renamed = rename_saved(&saved, "Deep learning: a review").unwrap();
        assert_eq!(renamed.name, "Deep learning_ a review.pdf");
        assert!(renamed.path.exists());
        assert!(!saved.path.exists());
    }

    #[test]
    fn test_rename_saved_never_replaces_existing_file() {
        let dir = tempdir().unwrap();
        let first = persist(b"%PDF first", &dir.path().join("Same Title.pdf")).unwrap();
        let second = persist(b"%PDF second", &dir.path().join("abc-y.pdf")).unwrap();

        let err = rename_saved(&second, "Same Title").unwrap_err();
        assert!(matches!(err, SourceError::WriteError { .. }));
        assert_eq!(std::fs::read(&first.path).unwrap(), b"%PDF first");
        assert_eq!(std::fs::read(&second.path).unwrap(), b"%PDF second");
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("a/b\\c"), "a_b_c");
        assert_eq!(sanitize_filename("  ..  "), "untitled");
        assert_eq!(pdf_file_name("paper.PDF"), "paper.PDF");
        assert_eq!(pdf_file_name("paper"), "paper.pdf");
    }
}
