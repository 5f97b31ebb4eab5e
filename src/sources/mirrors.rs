//! Mirror discovery and the per-session mirror list.

use regex::{Regex, RegexBuilder};
use scraper::{Html, Selector};
use std::collections::{HashSet, VecDeque};
use std::sync::OnceLock;

use crate::sources::SourceError;
use crate::utils::HttpClient;

fn mirror_domain() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            RegexBuilder::new(r"^https*://sci.hub")
                .case_insensitive(true)
                .build()
                .ok()
        })
        .as_ref()
}

/// Ordered, duplicate-free list of mirror base URLs.
///
/// The head is the current mirror. Rotation removes the head; once the list
/// is empty every operation fails with [`SourceError::NoMirrorsAvailable`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorList {
    mirrors: VecDeque<String>,
}

impl MirrorList {
    /// Build a list, dropping blanks, trailing slashes and duplicates
    pub fn new<I, S>(mirrors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let mirrors = mirrors
            .into_iter()
            .map(|m| {
                let m: String = m.into();
                m.trim().trim_end_matches('/').to_string()
            })
            .filter(|m| !m.is_empty())
            .filter(|m| seen.insert(m.clone()))
            .collect();
        Self { mirrors }
    }

    /// The mirror currently in use
    pub fn current(&self) -> Result<&str, SourceError> {
        self.mirrors
            .front()
            .map(String::as_str)
            .ok_or(SourceError::NoMirrorsAvailable)
    }

    /// Drop the current mirror and return the next one.
    ///
    /// Fails when no mirror is left afterwards; the caller must stop retrying.
    pub fn rotate(&mut self) -> Result<&str, SourceError> {
        if self.mirrors.pop_front().is_none() {
            return Err(SourceError::NoMirrorsAvailable);
        }
        self.current()
    }

    pub fn len(&self) -> usize {
        self.mirrors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mirrors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.mirrors.iter().map(String::as_str)
    }
}

/// Extract mirror URLs from the discovery page.
///
/// Anchors whose visible text looks like a mirror URL and anchors whose href
/// does are merged, keeping first-seen order. Only links mentioning `sci`
/// are kept and the href is returned in each case.
pub fn parse_mirror_page(html: &str) -> Vec<String> {
    let Some(domain) = mirror_domain() else {
        return Vec::new();
    };
    let Ok(anchors) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    for anchor in document.select(&anchors) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        let text = anchor.text().collect::<String>();
        let text = text.trim();

        let by_text = domain.is_match(text);
        let by_href = domain.is_match(href);
        if !(by_text || by_href) {
            continue;
        }
        if !(text.contains("sci") || href.contains("sci")) {
            continue;
        }

        let normalized = href.trim_end_matches('/').to_string();
        if seen.insert(normalized.clone()) {
            urls.push(normalized);
        }
    }

    urls
}

/// Fetch the discovery page and list the mirrors it advertises
pub async fn discover_mirrors(
    client: &HttpClient,
    discovery_url: &str,
) -> Result<Vec<String>, SourceError> {
    let response = client.get(discovery_url).send().await?;

    if !response.status().is_success() {
        return Err(SourceError::SiteAccessError(format!(
            "Mirror discovery returned status {}",
            response.status()
        )));
    }

    let html = response.text().await?;
    let mirrors = parse_mirror_page(&html);
    tracing::debug!("Discovered {} mirrors at {}", mirrors.len(), discovery_url);
    Ok(mirrors)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DISCOVERY_PAGE: &str = r#"<html><body>
        <a href="https://sci-hub.se">https://sci-hub.se</a>
        <a href="https://sci-hub.st/">sci-hub.st</a>
        <a href="https://example.org">https://sci-hub.ru</a>
        <a href="https://sci-hub.se">duplicate</a>
        <a href="https://github.com/sci-hub">source</a>
        <a href="https://example.com">example</a>
        <a>https://sci-hub.no-href</a>
    </body></html>"#;

    #[test]
    fn test_parse_mirror_page() {
        let mirrors = parse_mirror_page(DISCOVERY_PAGE);
        assert_eq!(
            mirrors,
            vec![
                "https://sci-hub.se".to_string(),
                "https://sci-hub.st".to_string(),
                "https://example.org".to_string(),
            ]
        );
    }

    #[test]
    fn test_parse_mirror_page_no_duplicates() {
        let mirrors = parse_mirror_page(DISCOVERY_PAGE);
        let unique: HashSet<_> = mirrors.iter().collect();
        assert_eq!(unique.len(), mirrors.len());
    }

    #[test]
    fn test_parse_mirror_page_empty() {
        assert!(parse_mirror_page("<html><body>down</body></html>").is_empty());
    }

    #[test]
    fn test_mirror_list_dedups_and_trims() {
        let list = MirrorList::new(["https://a.test/", "https://a.test", " ", "https://b.test"]);
        assert_eq!(list.len(), 2);
        assert_eq!(list.current().unwrap(), "https://a.test");
    }

    #[test]
    fn test_rotate() {
        let mut list = MirrorList::new(["https://a.test", "https://b.test"]);
        assert_eq!(list.rotate().unwrap(), "https://b.test");
        assert_eq!(list.current().unwrap(), "https://b.test");
    }

    #[test]
    fn test_rotate_single_element_exhausts() {
        let mut list = MirrorList::new(["https://a.test"]);
        assert!(matches!(list.rotate(), Err(SourceError::NoMirrorsAvailable)));
        assert!(list.is_empty());
        assert!(matches!(list.current(), Err(SourceError::NoMirrorsAvailable)));
        assert!(matches!(list.rotate(), Err(SourceError::NoMirrorsAvailable)));
    }

    #[tokio::test]
    async fn test_discover_mirrors() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(DISCOVERY_PAGE)
            .create_async()
            .await;

        let client = HttpClient::new().unwrap();
        let mirrors = discover_mirrors(&client, &format!("{}/", server.url()))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(mirrors.len(), 3);
    }

    #[tokio::test]
    async fn test_discover_mirrors_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/")
            .with_status(503)
            .create_async()
            .await;

        let client = HttpClient::new().unwrap();
        let result = discover_mirrors(&client, &format!("{}/", server.url())).await;
        assert!(matches!(result, Err(SourceError::SiteAccessError(_))));
    }
}
