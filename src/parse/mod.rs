//! Identifier scanning in free text and output formatting.
//!
//! The DOI patterns here are the only copy in the crate: adapters that need
//! to know whether an identifier is a DOI go through [`contains_doi`].

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;

/// Identifier types that can be scanned for in text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdType {
    Doi,
    Isbn,
}

impl IdType {
    /// All scannable types, in scanning order
    pub const ALL: [IdType; 2] = [IdType::Isbn, IdType::Doi];

    pub fn as_str(&self) -> &'static str {
        match self {
            IdType::Doi => "doi",
            IdType::Isbn => "isbn",
        }
    }

    fn patterns(&self) -> &'static [Regex] {
        match self {
            IdType::Doi => doi_patterns(),
            IdType::Isbn => isbn_patterns(),
        }
    }

    fn validate(&self, candidate: &str) -> bool {
        match self {
            IdType::Doi => true,
            IdType::Isbn => valid_isbn(candidate),
        }
    }
}

/// A single identifier found in text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdMatch {
    pub id: String,
    #[serde(rename = "type")]
    pub id_type: IdType,
}

/// Output format for a list of matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// One id per line, type omitted
    #[default]
    Raw,
    /// One JSON object per line
    Jsonl,
    /// `id,type` per line
    Csv,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "raw" => Ok(OutputFormat::Raw),
            "jsonl" => Ok(OutputFormat::Jsonl),
            "csv" => Ok(OutputFormat::Csv),
            other => Err(format!("unknown output format: {}", other)),
        }
    }
}

// Crossref's recommended DOI patterns, in decreasing order of precision.
const DOI_PATTERNS: &[&str] = &[
    r"10.\d{4,9}/[-._;()/:A-Z0-9]+",
    r"10.1002/[^\s]+",
    r"10.\d{4}/\d+-\d+X?\d+<[\d\w]+:[\d\w]*>\d+.\d+.\w+;\d",
    r"10.1021/\w\w\d+",
    r"10.1207/[\w\d]+&\d+_\d+",
];

// Broad ISBN-10/13 shapes. Length and checksum are enforced by `valid_isbn`.
const ISBN_PATTERNS: &[&str] = &[
    r"(?:ISBN(?:-1[03])?:?\s)?(?:97[89][-\s]?)[0-9]{1,5}[-\s]?[0-9]+[-\s]?[0-9]+[-\s]?[0-9]",
    r"(?:ISBN(?:-10)?:?\s)?[0-9]{1,5}[-\s]?[0-9]+[-\s]?[0-9]+[-\s]?[0-9X]",
];

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| {
            RegexBuilder::new(p)
                .case_insensitive(true)
                .build()
                .map_err(|e| tracing::error!("Invalid identifier pattern {}: {}", p, e))
                .ok()
        })
        .collect()
}

fn doi_patterns() -> &'static [Regex] {
    static DOI: OnceLock<Vec<Regex>> = OnceLock::new();
    DOI.get_or_init(|| compile(DOI_PATTERNS))
}

fn isbn_patterns() -> &'static [Regex] {
    static ISBN: OnceLock<Vec<Regex>> = OnceLock::new();
    ISBN.get_or_init(|| compile(ISBN_PATTERNS))
}

/// Whether `s` contains anything that looks like a DOI
pub fn contains_doi(s: &str) -> bool {
    doi_patterns().iter().any(|re| re.is_match(s))
}

/// Check an ISBN-10 or ISBN-13 candidate, including its check digit.
///
/// An optional `ISBN`, `ISBN-10` or `ISBN-13` prefix and hyphen or space
/// separators are accepted.
pub fn valid_isbn(subject: &str) -> bool {
    let trimmed = subject.trim();
    let body = strip_isbn_prefix(trimmed);

    let chars: Vec<char> = body.chars().filter(|c| *c != '-' && *c != ' ').collect();
    let Some((&last, digits)) = chars.split_last() else {
        return false;
    };

    if !digits.iter().all(|c| c.is_ascii_digit()) {
        return false;
    }
    let digits: Vec<u32> = digits.iter().filter_map(|c| c.to_digit(10)).collect();

    match digits.len() {
        9 => {
            let sum: u32 = digits
                .iter()
                .rev()
                .enumerate()
                .map(|(i, d)| (i as u32 + 2) * d)
                .sum();
            let check = match 11 - (sum % 11) {
                10 => 'X',
                11 => '0',
                n => char::from_digit(n, 10).unwrap_or('?'),
            };
            last.to_ascii_uppercase() == check
        }
        12 => {
            if !body.starts_with("978") && !body.starts_with("979") {
                return false;
            }
            let sum: u32 = digits
                .iter()
                .enumerate()
                .map(|(i, d)| (i as u32 % 2 * 2 + 1) * d)
                .sum();
            let check = match 10 - (sum % 10) {
                10 => 0,
                n => n,
            };
            last.to_digit(10) == Some(check)
        }
        _ => false,
    }
}

fn strip_isbn_prefix(s: &str) -> &str {
    let upper = s.to_ascii_uppercase();
    if !upper.starts_with("ISBN") {
        return s;
    }
    let mut rest = &s[4..];
    if rest.starts_with("-10") || rest.starts_with("-13") {
        rest = &rest[3..];
    }
    rest.trim_start_matches(':').trim_start()
}

/// Find all identifiers of the given types in `text`.
///
/// Matches are returned in first-seen order with duplicates removed. When
/// `id_types` is `None` every supported type is scanned.
pub fn parse_ids_from_text(text: &str, id_types: Option<&[IdType]>) -> Vec<IdMatch> {
    let id_types = id_types.unwrap_or(&IdType::ALL);

    let mut seen = HashSet::new();
    let mut matches = Vec::new();
    for id_type in id_types {
        for re in id_type.patterns() {
            for m in re.find_iter(text) {
                let candidate = m.as_str();
                if !seen.contains(candidate) && id_type.validate(candidate) {
                    matches.push(IdMatch {
                        id: candidate.to_string(),
                        id_type: *id_type,
                    });
                }
                seen.insert(candidate.to_string());
            }
        }
    }
    matches
}

/// Find all identifiers of the given types in the file at `path`
pub fn parse_file(path: &Path, id_types: Option<&[IdType]>) -> std::io::Result<Vec<IdMatch>> {
    let content = std::fs::read_to_string(path)?;
    Ok(parse_ids_from_text(&content, id_types))
}

/// Render matches in the requested format, one per line
pub fn format_output(matches: &[IdMatch], format: OutputFormat) -> String {
    let lines: Vec<String> = match format {
        OutputFormat::Raw => matches.iter().map(|m| m.id.clone()).collect(),
        OutputFormat::Jsonl => matches
            .iter()
            .filter_map(|m| serde_json::to_string(m).ok())
            .collect(),
        OutputFormat::Csv => matches
            .iter()
            .map(|m| format!("{},{}", m.id, m.id_type.as_str()))
            .collect(),
    };
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_doi() {
        assert!(contains_doi("10.1038/nature14539"));
        assert!(contains_doi("see https://doi.org/10.1002/anie.201915678 for details"));
        assert!(!contains_doi("12345678"));
        assert!(!contains_doi("not an identifier"));
    }

    #[test]
    fn test_valid_isbn() {
        assert!(valid_isbn("0-306-40615-2"));
        assert!(valid_isbn("0306406152"));
        assert!(valid_isbn("978-0-306-40615-7"));
        assert!(valid_isbn("ISBN 978-0-306-40615-7"));
        assert!(valid_isbn("ISBN-10: 0-8044-2957-X"));
        assert!(!valid_isbn("0-306-40615-3"));
        assert!(!valid_isbn("978-0-306-40615-8"));
        assert!(!valid_isbn("12345"));
        assert!(!valid_isbn(""));
    }

    #[test]
    fn test_parse_ids_from_text() {
        let text = "We cite 10.1038/nature14539 and the book ISBN 978-0-306-40615-7. \
                    Again: 10.1038/nature14539.";
        let matches = parse_ids_from_text(text, None);

        let dois: Vec<_> = matches.iter().filter(|m| m.id_type == IdType::Doi).collect();
        let isbns: Vec<_> = matches.iter().filter(|m| m.id_type == IdType::Isbn).collect();

        assert_eq!(isbns.len(), 1);
        assert!(isbns[0].id.contains("978-0-306-40615-7"));
        assert!(dois.iter().any(|m| m.id.starts_with("10.1038/nature14539")));
    }

    #[test]
    fn test_parse_ids_restricted_to_type() {
        let text = "10.1038/nature14539 and 0-306-40615-2";
        let matches = parse_ids_from_text(text, Some(&[IdType::Doi]));
        assert!(matches.iter().all(|m| m.id_type == IdType::Doi));
        assert!(!matches.is_empty());
    }

    #[test]
    fn test_parse_rejects_bad_isbn_checksum() {
        let matches = parse_ids_from_text("ISBN 0-306-40615-3", Some(&[IdType::Isbn]));
        assert!(matches.is_empty());
    }

    #[test]
    fn test_format_output() {
        let matches = vec![
            IdMatch {
                id: "10.1000/xyz".to_string(),
                id_type: IdType::Doi,
            },
            IdMatch {
                id: "0306406152".to_string(),
                id_type: IdType::Isbn,
            },
        ];

        assert_eq!(
            format_output(&matches, OutputFormat::Raw),
            "10.1000/xyz\n0306406152"
        );
        assert_eq!(
            format_output(&matches, OutputFormat::Csv),
            "10.1000/xyz,doi\n0306406152,isbn"
        );
        assert_eq!(
            format_output(&matches, OutputFormat::Jsonl),
            "{\"id\":\"10.1000/xyz\",\"type\":\"doi\"}\n{\"id\":\"0306406152\",\"type\":\"isbn\"}"
        );
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("JSONL".parse::<OutputFormat>(), Ok(OutputFormat::Jsonl));
        assert!("xml".parse::<OutputFormat>().is_err());
    }
}
