use std::sync::Arc;

use async_trait::async_trait;
use oaguard_core::{AdmissionDecision, PageMetadata};
use serde::{Deserialize, Serialize};

use crate::admission::AdmissionController;
use crate::error::Result;
use crate::identifiers::extract::{self, PageSignals};

/// Requests a front end can put on the wire. Serialization is tagged so a
/// JSON peer can dispatch on the `type` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ChannelRequest {
    Decide(PageMetadata),
    ExtractDoi(PageSignals),
    ReloadDomains,
    ClearCache,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ChannelResponse {
    Decision(AdmissionDecision),
    Doi(Option<String>),
    DomainsReloaded { ok: bool },
    CacheCleared { removed: usize },
}

/// Transport seam between front ends and the admission pipeline. The CLI
/// uses the in-process [`LocalChannel`]; a remote transport would implement
/// this over its own wire format.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    async fn send(&self, request: ChannelRequest) -> Result<ChannelResponse>;
}

/// In-process channel calling straight into the controller.
pub struct LocalChannel {
    controller: Arc<AdmissionController>,
}

impl LocalChannel {
    pub fn new(controller: Arc<AdmissionController>) -> Self {
        Self { controller }
    }
}

#[async_trait]
impl MessageChannel for LocalChannel {
    async fn send(&self, request: ChannelRequest) -> Result<ChannelResponse> {
        match request {
            ChannelRequest::Decide(page) => {
                let decision = self.controller.decide(&page).await;
                Ok(ChannelResponse::Decision(decision))
            }
            ChannelRequest::ExtractDoi(signals) => {
                let doi = extract::extract_doi(&signals).map(|d| d.normalized);
                Ok(ChannelResponse::Doi(doi))
            }
            ChannelRequest::ReloadDomains => {
                let ok = self.controller.reload_domains().await;
                Ok(ChannelResponse::DomainsReloaded { ok })
            }
            ChannelRequest::ClearCache => {
                let removed = self.controller.resolver().cache().clear_all()?;
                Ok(ChannelResponse::CacheCleared { removed })
            }
        }
    }
}
