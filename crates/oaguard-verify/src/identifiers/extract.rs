use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identifiers::arxiv::ArxivId;
use crate::identifiers::doi::Doi;

static DOI_IN_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(10\.\d{4,9}/[-._;()/:a-zA-Z0-9]+)").expect("valid regex"));

static DOI_LABELED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bdoi\s*:?\s*(10\.\d{4,9}/\S+)").expect("valid regex"));

static DOI_IN_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(10\.\d{4,9}/[^/?#\s]+?)(?:\.pdf)?(?:[?#]|$)").expect("valid regex"));

static PUBLISHER_PATH_DOI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)/doi/(?:abs/|full/|pdf/|epdf/)?(10\.\d{4,9}/[^/?#\s]+)").expect("valid regex")
});

static PREPRINT_PDF_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/pdf/(\d{4}\.\d{4,5})(?:v\d+)?(?:\.pdf)?(?:[?#]|$)").expect("valid regex"));

static DOI_QUERY_PARAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[?&]doi=([^&#\s]+)").expect("valid regex"));

/// Highest-trust meta tag names (citation / Dublin Core identifier family).
const CITATION_META_TAGS: &[&str] = &[
    "citation_doi",
    "dc.identifier",
    "dc.identifier.doi",
    "dcterms.identifier",
];

/// Publisher-specific identifier tags, tried after structured data.
const PUBLISHER_META_TAGS: &[&str] = &["prism.doi", "bepress_citation_doi", "eprints.id_number"];

/// Arxiv id meta tags for the archive-identifier fallback.
const ARXIV_META_TAGS: &[&str] = &["citation_arxiv_id", "arxiv_id"];

/// Pre-scraped page signals handed over by the (external) DOM extractor.
/// Admission control never touches HTML; it only consumes these lists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageSignals {
    pub url: String,

    /// `(name, content)` pairs of `<meta>` tags.
    #[serde(default)]
    pub meta_tags: Vec<(String, String)>,

    /// Parsed JSON-LD / structured-data blocks.
    #[serde(default)]
    pub structured_data: Vec<Value>,

    /// Text content of elements whose class or id contains "doi".
    #[serde(default)]
    pub labeled_text: Vec<String>,

    /// Hyperlink targets on the page.
    #[serde(default)]
    pub link_hrefs: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_text: Option<String>,
}

impl PageSignals {
    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    fn meta_content(&self, names: &[&str]) -> impl Iterator<Item = &str> {
        self.meta_tags
            .iter()
            .filter(move |(name, _)| {
                names
                    .iter()
                    .any(|candidate| name.eq_ignore_ascii_case(candidate))
            })
            .map(|(_, content)| content.as_str())
    }
}

/// Derive a candidate DOI from page signals.
///
/// Strategies run in fixed order and are mutually exclusive: the first
/// candidate that survives [`Doi::parse`] wins, invalid candidates are
/// discarded silently and the next strategy runs. Returns `None` when every
/// strategy exhausts.
pub fn extract_doi(signals: &PageSignals) -> Option<Doi> {
    // 1. citation / Dublin Core meta tags — trusted highest.
    for content in signals.meta_content(CITATION_META_TAGS) {
        if let Some(doi) = parse_candidate(content) {
            return Some(doi);
        }
    }

    // 2. structured-data identifiers.
    for block in &signals.structured_data {
        if let Some(doi) = doi_from_structured(block) {
            return Some(doi);
        }
    }

    // 3. publisher-specific meta tags.
    for content in signals.meta_content(PUBLISHER_META_TAGS) {
        if let Some(doi) = parse_candidate(content) {
            return Some(doi);
        }
    }

    // 4. free-text scan of DOI-labeled elements.
    for text in &signals.labeled_text {
        if let Some(doi) = doi_from_text(text) {
            return Some(doi);
        }
    }

    // 5. hyperlinks to a DOI resolver host.
    for href in &signals.link_hrefs {
        if href.contains("doi.org/") {
            if let Ok(doi) = Doi::parse(href) {
                return Some(doi);
            }
        }
    }

    // 6. "DOI:"-labeled pattern anywhere in body text.
    if let Some(body) = signals.body_text.as_deref() {
        if let Some(doi) = labeled_doi_from_text(body) {
            return Some(doi);
        }
    }

    // 7. archive-identifier fallback: an arXiv id maps deterministically to
    //    its DataCite DOI.
    if let Some(doi) = arxiv_fallback(signals) {
        return Some(doi);
    }

    // 8. PDF-URL-specific patterns.
    extract_doi_from_pdf_url(&signals.url)
}

/// Derive a DOI from a PDF URL alone (path-embedded DOI, publisher-style
/// path, preprint path, or a `doi` query parameter).
pub fn extract_doi_from_pdf_url(url: &str) -> Option<Doi> {
    if let Some(caps) = PUBLISHER_PATH_DOI.captures(url) {
        if let Some(doi) = parse_candidate(caps.get(1)?.as_str()) {
            return Some(doi);
        }
    }

    if let Some(caps) = DOI_IN_PATH.captures(url) {
        if let Some(doi) = parse_candidate(caps.get(1)?.as_str()) {
            return Some(doi);
        }
    }

    if let Some(caps) = PREPRINT_PDF_PATH.captures(url) {
        if let Ok(id) = ArxivId::parse(caps.get(1)?.as_str()) {
            return Some(id.to_datacite_doi());
        }
    }

    if let Some(caps) = DOI_QUERY_PARAM.captures(url) {
        let raw = caps.get(1)?.as_str();
        let decoded = urlencoding::decode(raw).ok()?;
        if let Some(doi) = parse_candidate(&decoded) {
            return Some(doi);
        }
    }

    None
}

fn parse_candidate(candidate: &str) -> Option<Doi> {
    Doi::parse(candidate).ok()
}

fn doi_from_text(text: &str) -> Option<Doi> {
    DOI_IN_TEXT
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| parse_candidate(m.as_str()))
}

fn labeled_doi_from_text(text: &str) -> Option<Doi> {
    DOI_LABELED
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| parse_candidate(m.as_str()))
}

/// Structured-data identifier traversal: direct string, `{value}`,
/// `{"@value"}`, a `doi` field, or a `doi.org` identifier URL the DOI is
/// regex-mined from. Descends into `@graph` arrays.
fn doi_from_structured(value: &Value) -> Option<Doi> {
    match value {
        Value::Array(items) => items.iter().find_map(doi_from_structured),
        Value::Object(obj) => {
            if let Some(identifier) = obj.get("identifier") {
                if let Some(doi) = doi_from_identifier(identifier) {
                    return Some(doi);
                }
            }
            if let Some(doi_field) = obj.get("doi") {
                if let Some(doi) = doi_from_identifier(doi_field) {
                    return Some(doi);
                }
            }
            obj.get("@graph").and_then(doi_from_structured)
        }
        _ => None,
    }
}

fn doi_from_identifier(identifier: &Value) -> Option<Doi> {
    match identifier {
        Value::String(raw) => {
            if raw.contains("doi.org/") {
                return doi_from_text(raw);
            }
            parse_candidate(raw)
        }
        Value::Array(items) => items.iter().find_map(doi_from_identifier),
        Value::Object(obj) => {
            for key in ["value", "@value", "doi"] {
                if let Some(inner) = obj.get(key) {
                    if let Some(doi) = doi_from_identifier(inner) {
                        return Some(doi);
                    }
                }
            }
            None
        }
        _ => None,
    }
}

fn arxiv_fallback(signals: &PageSignals) -> Option<Doi> {
    if let Ok(id) = ArxivId::parse(&signals.url) {
        return Some(id.to_datacite_doi());
    }
    for content in signals.meta_content(ARXIV_META_TAGS) {
        if let Ok(id) = ArxivId::parse(content) {
            return Some(id.to_datacite_doi());
        }
    }
    None
}
