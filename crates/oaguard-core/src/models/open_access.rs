use serde::{Deserialize, Serialize};

/// Open-access route reported by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OaStatus {
    Gold,
    Green,
    Hybrid,
    Bronze,
    Closed,
    NotFound,
}

impl OaStatus {
    pub fn from_registry(value: &str) -> Option<Self> {
        match value {
            "gold" => Some(Self::Gold),
            "green" => Some(Self::Green),
            "hybrid" => Some(Self::Hybrid),
            "bronze" => Some(Self::Bronze),
            "closed" => Some(Self::Closed),
            "not_found" => Some(Self::NotFound),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gold => "gold",
            Self::Green => "green",
            Self::Hybrid => "hybrid",
            Self::Bronze => "bronze",
            Self::Closed => "closed",
            Self::NotFound => "not_found",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostType {
    Publisher,
    Repository,
}

impl HostType {
    pub fn from_registry(value: &str) -> Option<Self> {
        match value {
            "publisher" => Some(Self::Publisher),
            "repository" => Some(Self::Repository),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Publisher => "publisher",
            Self::Repository => "repository",
        }
    }
}

/// Normalized open-access status for one DOI, as resolved from the
/// registry. Immutable once constructed; cached verbatim. Fields absent in
/// the registry response stay `None` — never a fabricated default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OaStatusRecord {
    pub doi: String,

    #[serde(default)]
    pub is_oa: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oa_status: Option<OaStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oa_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_type: Option<HostType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,

    /// Set for transient failures (timeout, connection error). Records with
    /// an error are never cached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OaStatusRecord {
    /// Record for a transient failure. Carries the failure message and a
    /// conservative `is_oa: false`; callers must not cache it.
    pub fn transient_error(doi: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            doi: doi.into(),
            is_oa: false,
            oa_status: None,
            oa_url: None,
            host_type: None,
            version: None,
            license: None,
            error: Some(message.into()),
        }
    }

    /// Record for a registry 404: the DOI is authoritatively unknown.
    pub fn not_found(doi: impl Into<String>) -> Self {
        Self {
            doi: doi.into(),
            is_oa: false,
            oa_status: Some(OaStatus::NotFound),
            oa_url: None,
            host_type: None,
            version: None,
            license: None,
            error: None,
        }
    }
}
