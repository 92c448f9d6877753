pub mod decision;
pub mod open_access;
pub mod page;

pub use decision::{AdmissionDecision, Confidence, DecisionCategory};
pub use open_access::{HostType, OaStatus, OaStatusRecord};
pub use page::{ContentType, PageCapture, PageMetadata};
