//! Finding embedded PDF links in HTML pages.

use regex::Regex;
use scraper::{Html, Selector};
use std::sync::OnceLock;

fn pdfobject_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r#"PDFObject\.embed\("([^"]+)""#).ok())
        .as_ref()
}

/// Find a link to a PDF embedded in `html`.
///
/// Heuristics, in order, first match wins:
/// 1. a `<script>` calling `PDFObject.embed("...")`
/// 2. an `<embed id="pdf" type="application/pdf">` element
/// 3. an `<iframe type="application/pdf">` element
///
/// Returns `None` when none of them apply.
pub fn find_pdf_url(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    if let Some(url) = find_script_embed(&document) {
        tracing::debug!("Found dynamically loaded PDF");
        return Some(url);
    }

    if let Some(url) = first_src(&document, r#"embed#pdf[type="application/pdf"]"#) {
        tracing::debug!("Found embedded PDF");
        return Some(url);
    }

    if let Some(url) = first_src(&document, r#"iframe[type="application/pdf"]"#) {
        tracing::debug!("Found PDF iframe");
        return Some(url);
    }

    tracing::debug!("No direct link to PDF found");
    None
}

/// `src` of the first `<iframe>` on the page, whatever its type.
///
/// Mirror pages always embed the paper in an iframe, so this is looser than
/// the third heuristic of [`find_pdf_url`].
pub fn find_iframe_src(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    first_src(&document, "iframe")
}

fn find_script_embed(document: &Html) -> Option<String> {
    let selector = Selector::parse("script").ok()?;
    let pattern = pdfobject_pattern()?;

    document
        .select(&selector)
        .map(|script| script.text().collect::<String>())
        .filter(|text| text.contains("PDFObject.embed"))
        .find_map(|text| {
            pattern
                .captures(&text)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
        })
}

fn first_src(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .filter_map(|elem| elem.value().attr("src"))
        .map(str::trim)
        .find(|src| !src.is_empty())
        .map(|src| src.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embed_element() {
        let html = r#"<html><body><embed id="pdf" type="application/pdf" src="foo.pdf"></body></html>"#;
        assert_eq!(find_pdf_url(html), Some("foo.pdf".to_string()));
    }

    #[test]
    fn test_embed_requires_id_and_type() {
        let html = r#"<embed id="viewer" type="application/pdf" src="a.pdf">
                      <embed id="pdf" type="text/html" src="b.pdf">"#;
        assert_eq!(find_pdf_url(html), None);
    }

    #[test]
    fn test_script_embed() {
        let html = r##"<html><head><script>
            PDFObject.embed("https://cdn.test/paper.pdf", "#viewer");
        </script></head></html>"##;
        assert_eq!(
            find_pdf_url(html),
            Some("https://cdn.test/paper.pdf".to_string())
        );
    }

    #[test]
    fn test_script_takes_precedence() {
        let html = r##"<html><body>
            <iframe type="application/pdf" src="iframe.pdf"></iframe>
            <embed id="pdf" type="application/pdf" src="embed.pdf">
            <script>PDFObject.embed("script.pdf", "#v");</script>
        </body></html>"##;
        assert_eq!(find_pdf_url(html), Some("script.pdf".to_string()));
    }

    #[test]
    fn test_embed_before_iframe() {
        let html = r#"<iframe type="application/pdf" src="iframe.pdf"></iframe>
                      <embed id="pdf" type="application/pdf" src="embed.pdf">"#;
        assert_eq!(find_pdf_url(html), Some("embed.pdf".to_string()));
    }

    #[test]
    fn test_typed_iframe_fallback() {
        let html = r#"<iframe src="other.html"></iframe>
                      <iframe type="application/pdf" src="//host.test/x.pdf"></iframe>"#;
        assert_eq!(find_pdf_url(html), Some("//host.test/x.pdf".to_string()));
    }

    #[test]
    fn test_no_match() {
        let html = r#"<html><body><a href="paper.pdf">download</a><iframe src="x.pdf"></iframe></body></html>"#;
        assert_eq!(find_pdf_url(html), None);
        assert_eq!(find_pdf_url(""), None);
    }

    #[test]
    fn test_any_iframe() {
        let html = r#"<div><iframe src="//mirror.test/x.pdf#view=FitH"></iframe></div>"#;
        assert_eq!(
            find_iframe_src(html),
            Some("//mirror.test/x.pdf#view=FitH".to_string())
        );
        assert_eq!(find_iframe_src("<p>captcha</p>"), None);
        assert_eq!(find_iframe_src("<iframe></iframe>"), None);
    }
}
