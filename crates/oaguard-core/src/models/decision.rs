use serde::{Deserialize, Serialize};

/// Terminal branch of the admission decision tree that produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionCategory {
    Whitelist,
    Blacklist,
    UnknownPdf,
    UnknownHtml,
    OaVerified,
    Paywalled,
    VerificationFailed,
    Error,
}

impl DecisionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Whitelist => "whitelist",
            Self::Blacklist => "blacklist",
            Self::UnknownPdf => "unknown_pdf",
            Self::UnknownHtml => "unknown_html",
            Self::OaVerified => "oa_verified",
            Self::Paywalled => "paywalled",
            Self::VerificationFailed => "verification_failed",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// Allow/block/warn verdict for one page, produced fresh per request and
/// consumed immediately by the caller. The UI renders `reason`, any
/// `suggestion`, and `oa_url` verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionDecision {
    pub allowed: bool,
    pub reason: String,
    pub category: DecisionCategory,
    pub confidence: Confidence,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,

    /// Alternative open-access location. Always differs from the page URL;
    /// omitted when the registry's best location is the page itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oa_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oa_host: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
}

impl AdmissionDecision {
    pub fn allow(
        reason: impl Into<String>,
        category: DecisionCategory,
        confidence: Confidence,
    ) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
            category,
            confidence,
            warning: None,
            suggestion: None,
            oa_url: None,
            oa_host: None,
            doi: None,
        }
    }

    pub fn block(
        reason: impl Into<String>,
        category: DecisionCategory,
        confidence: Confidence,
    ) -> Self {
        Self {
            allowed: false,
            ..Self::allow(reason, category, confidence)
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warning = Some(warning.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_doi(mut self, doi: impl Into<String>) -> Self {
        self.doi = Some(doi.into());
        self
    }
}
