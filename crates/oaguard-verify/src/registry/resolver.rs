use std::sync::Arc;
use std::time::Duration;

use oaguard_core::{HostType, OaStatus, OaStatusRecord};
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, VerifyError};
use crate::http::RegistryHttp;
use crate::identifiers::doi::Doi;
use crate::registry::cache::OaStatusCache;

pub const DEFAULT_BASE_URL: &str = "https://api.unpaywall.org/v2";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(200);

/// Resolves a DOI against the open-access registry, normalizing the
/// response into an [`OaStatusRecord`]. The cache is consulted before any
/// network call; transient failures are surfaced as uncached error records
/// so a later retry can succeed.
pub struct OaResolver {
    http: RegistryHttp,
    cache: Arc<OaStatusCache>,
    base_url: String,
    email: String,
}

impl OaResolver {
    pub fn new(email: String, cache: Arc<OaStatusCache>) -> Self {
        Self::with_config(DEFAULT_BASE_URL, email, DEFAULT_TIMEOUT, cache)
    }

    pub fn with_config(
        base_url: &str,
        email: String,
        timeout: Duration,
        cache: Arc<OaStatusCache>,
    ) -> Self {
        Self {
            http: RegistryHttp::new(timeout, MIN_REQUEST_INTERVAL, "oaguard/0.1"),
            cache,
            base_url: base_url.trim_end_matches('/').to_string(),
            email,
        }
    }

    pub fn cache(&self) -> &OaStatusCache {
        &self.cache
    }

    pub async fn resolve(&self, doi: &Doi) -> Result<OaStatusRecord> {
        // Single short-circuit path: cached records never touch the network.
        if let Some(cached) = self.cache.get(&doi.normalized)? {
            debug!("oa cache hit for {}", doi.normalized);
            return Ok(cached);
        }

        let url = format!(
            "{}/{}?email={}",
            self.base_url,
            doi.encoded(),
            urlencoding::encode(&self.email)
        );

        let json: Value = match self.http.get_json(&url).await {
            Ok(json) => json,
            Err(VerifyError::Timeout(_)) => {
                // Transient: never cached, retry is the caller's call.
                return Ok(OaStatusRecord::transient_error(&doi.normalized, "timeout"));
            }
            Err(VerifyError::Http(e)) => {
                return Ok(OaStatusRecord::transient_error(
                    &doi.normalized,
                    e.to_string(),
                ));
            }
            Err(VerifyError::ApiError { status: 404, .. }) => {
                // Registry ground truth: the DOI is unknown. Cached.
                let record = OaStatusRecord::not_found(&doi.normalized);
                self.cache.put(&doi.normalized, &record)?;
                return Ok(record);
            }
            Err(e) => return Err(e),
        };

        let record = record_from_registry(&doi.normalized, &json);
        self.cache.put(&doi.normalized, &record)?;
        Ok(record)
    }
}

/// Map the registry's best-OA-location response shape onto the normalized
/// record. Absent fields stay `None`; `is_oa` defaults to false.
fn record_from_registry(doi: &str, v: &Value) -> OaStatusRecord {
    let best = v.get("best_oa_location");
    let str_field = |node: Option<&Value>, key: &str| {
        node.and_then(|n| n.get(key))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToOwned::to_owned)
    };

    OaStatusRecord {
        doi: v
            .get("doi")
            .and_then(Value::as_str)
            .unwrap_or(doi)
            .to_string(),
        is_oa: v.get("is_oa").and_then(Value::as_bool).unwrap_or(false),
        oa_status: v
            .get("oa_status")
            .and_then(Value::as_str)
            .and_then(OaStatus::from_registry),
        oa_url: str_field(best, "url"),
        host_type: str_field(best, "host_type")
            .as_deref()
            .and_then(HostType::from_registry),
        version: str_field(best, "version"),
        license: str_field(best, "license"),
        error: None,
    }
}
