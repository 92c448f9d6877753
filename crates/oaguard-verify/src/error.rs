use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("invalid DOI: {0}")]
    InvalidDoi(String),

    #[error("invalid arXiv ID: {0}")]
    InvalidArxivId(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request to {0} timed out")]
    Timeout(String),

    #[error("API error from {url}: HTTP {status}: {body}")]
    ApiError {
        url: String,
        status: u16,
        body: String,
    },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("domain dataset error: {0}")]
    Dataset(String),

    #[error("store error: {0}")]
    Store(#[from] oaguard_core::CoreError),
}

pub type Result<T> = std::result::Result<T, VerifyError>;
