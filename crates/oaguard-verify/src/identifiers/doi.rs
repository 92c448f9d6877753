use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VerifyError};

// Registrant must be at least four digits; suffix must be non-empty.
static DOI_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^10\.\d{4,}/\S+$").expect("valid regex"));

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Doi {
    pub raw: String,
    pub normalized: String,
    pub url: String,
}

impl Doi {
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        // Strip known prefixes to get the raw DOI
        let stripped = if let Some(s) = input.strip_prefix("https://doi.org/") {
            s
        } else if let Some(s) = input.strip_prefix("http://doi.org/") {
            s
        } else if let Some(s) = input.strip_prefix("https://dx.doi.org/") {
            s
        } else if let Some(s) = input.strip_prefix("http://dx.doi.org/") {
            s
        } else if let Some(s) = input.strip_prefix("doi:") {
            s.trim_start()
        } else if let Some(s) = input.strip_prefix("DOI:") {
            s.trim_start()
        } else {
            input
        };
        let stripped = stripped.trim().trim_end_matches(['.', ',', ';']);

        if !DOI_SHAPE.is_match(stripped) {
            return Err(VerifyError::InvalidDoi(input.to_string()));
        }

        // Case is preserved: DOIs are case-insensitive to resolvers, and
        // synthetic DataCite identifiers (`10.48550/arXiv.*`) are
        // conventionally mixed-case.
        let normalized = stripped.to_string();
        let url = format!("https://doi.org/{normalized}");

        Ok(Self {
            raw: input.to_string(),
            normalized,
            url,
        })
    }

    /// URL-encoded transport form for registry path segments.
    pub fn encoded(&self) -> String {
        urlencoding::encode(&self.normalized).into_owned()
    }
}
