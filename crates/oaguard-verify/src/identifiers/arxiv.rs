use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VerifyError};
use crate::identifiers::doi::Doi;

// New format: YYMM.NNNNN or YYMM.NNNN (with optional version)
static NEW_FORMAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4}\.\d{4,5})(v(\d+))?$").expect("valid regex"));

// Old format: category/YYMMNNN
static OLD_FORMAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-zA-Z\-]+(?:\.[A-Z]{2})?/\d{7})(v(\d+))?$").expect("valid regex"));

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArxivId {
    pub raw: String,
    pub id: String,
    pub version: Option<u8>,
}

impl ArxivId {
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        // Strip known prefixes
        let stripped = if let Some(s) = input.strip_prefix("https://arxiv.org/abs/") {
            s
        } else if let Some(s) = input.strip_prefix("http://arxiv.org/abs/") {
            s
        } else if let Some(s) = input.strip_prefix("https://arxiv.org/pdf/") {
            s.trim_end_matches(".pdf")
        } else if let Some(s) = input.strip_prefix("http://arxiv.org/pdf/") {
            s.trim_end_matches(".pdf")
        } else if let Some(s) = input.strip_prefix("arXiv:") {
            s
        } else if let Some(s) = input.strip_prefix("arxiv:") {
            s
        } else {
            input
        };

        if let Some(caps) = NEW_FORMAT.captures(stripped) {
            let id = caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default();
            let version = caps.get(3).and_then(|v| v.as_str().parse::<u8>().ok());
            return Ok(Self {
                raw: input.to_string(),
                id,
                version,
            });
        }

        if let Some(caps) = OLD_FORMAT.captures(stripped) {
            let id = caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default();
            let version = caps.get(3).and_then(|v| v.as_str().parse::<u8>().ok());
            return Ok(Self {
                raw: input.to_string(),
                id,
                version,
            });
        }

        Err(VerifyError::InvalidArxivId(input.to_string()))
    }

    /// Deterministic mapping onto the DataCite DOI arXiv mints for every
    /// preprint: `10.48550/arXiv.<id>`.
    pub fn to_datacite_doi(&self) -> Doi {
        Doi {
            raw: self.raw.clone(),
            normalized: format!("10.48550/arXiv.{}", self.id),
            url: format!("https://doi.org/10.48550/arXiv.{}", self.id),
        }
    }
}
