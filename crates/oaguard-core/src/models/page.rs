use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How the page was served to the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Web,
    Pdf,
}

/// The tuple the page metadata extractor hands to admission control.
///
/// `is_pdf` may transiently disagree with `content_type` on PDF
/// short-circuit paths (a PDF viewer tab reported before the content type
/// probe has settled), so both are carried.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PageMetadata {
    pub url: String,

    /// Lowercase hostname of `url`.
    pub domain: String,

    /// Normalized DOI (`10.<registrant>/<suffix>`), when already known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,

    #[serde(default)]
    pub content_type: ContentType,

    #[serde(default)]
    pub is_pdf: bool,
}

impl PageMetadata {
    pub fn new(url: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            domain: domain.into().to_lowercase(),
            ..Default::default()
        }
    }

    pub fn pdf(mut self) -> Self {
        self.content_type = ContentType::Pdf;
        self.is_pdf = true;
        self
    }

    pub fn with_doi(mut self, doi: impl Into<String>) -> Self {
        self.doi = Some(doi.into());
        self
    }
}

/// Bibliographic record scraped from a page, forwarded downstream only
/// after an allow decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageCapture {
    pub title: String,

    #[serde(default)]
    pub authors: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_text: Option<String>,

    pub page: PageMetadata,

    pub captured_at: DateTime<Utc>,
}

impl PageCapture {
    pub fn new(title: impl Into<String>, page: PageMetadata) -> Self {
        Self {
            title: title.into(),
            authors: Vec::new(),
            published: None,
            doi: page.doi.clone(),
            abstract_text: None,
            body_text: None,
            page,
            captured_at: Utc::now(),
        }
    }
}
