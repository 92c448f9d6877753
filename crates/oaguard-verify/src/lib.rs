//! oaguard-verify — copyright/open-access admission control.
//!
//! Classifies a URL + metadata tuple into allowed / blocked / allowed with
//! warning, combining a domain allowlist/blocklist, DOI extraction, and a
//! remote open-access registry behind a TTL cache.

pub mod admission;
pub mod channel;
pub mod domains;
pub mod error;
pub mod http;
pub mod identifiers;
pub mod registry;
pub mod submit;

pub use admission::AdmissionController;
pub use channel::{ChannelRequest, ChannelResponse, LocalChannel, MessageChannel};
pub use domains::{DatasetSource, DomainClassifier};
pub use error::{Result, VerifyError};
pub use identifiers::doi::Doi;
pub use identifiers::extract::{PageSignals, extract_doi, extract_doi_from_pdf_url};
pub use registry::cache::OaStatusCache;
pub use registry::resolver::OaResolver;
pub use submit::{ProjectApi, SubmissionOutcome, SubmissionPipeline};
