use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use oaguard_core::{AdmissionDecision, Confidence, DecisionCategory, OaStatusRecord, PageMetadata};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::domains::{DatasetSource, DomainClassifier};
use crate::error::Result;
use crate::identifiers::doi::Doi;
use crate::identifiers::extract::{self, PageSignals};
use crate::registry::resolver::OaResolver;

const BLACKLIST_SUGGESTION: &str =
    "Search for an open-access version on preprint servers or OA repositories";
const PAYWALL_SUGGESTION: &str = "Check preprint servers for an author manuscript of this work";
const UNVERIFIED_WARNING: &str = "Could not verify the open-access status of this page";

/// Orchestrates domain classification, DOI extraction, and registry
/// resolution into a single allow/block/warn verdict per page.
///
/// Every failure is recovered locally into a terminal decision; `decide`
/// never propagates an error past its boundary and never fails open.
pub struct AdmissionController {
    classifier: RwLock<DomainClassifier>,
    dataset_source: DatasetSource,
    load_attempted: AtomicBool,
    resolver: Arc<OaResolver>,
}

impl AdmissionController {
    pub fn new(dataset_source: DatasetSource, resolver: Arc<OaResolver>) -> Self {
        Self {
            classifier: RwLock::new(DomainClassifier::default()),
            dataset_source,
            load_attempted: AtomicBool::new(false),
            resolver,
        }
    }

    pub fn resolver(&self) -> &OaResolver {
        &self.resolver
    }

    /// The sole admission entry point. Steps run in strict order; each
    /// either returns a terminal decision or enriches state for the next.
    pub async fn decide(&self, page: &PageMetadata) -> AdmissionDecision {
        match self.decide_inner(page).await {
            Ok(decision) => decision,
            Err(e) => {
                warn!("admission pipeline fault for {}: {e}", page.url);
                AdmissionDecision::block(
                    format!("Verification failed unexpectedly: {e}"),
                    DecisionCategory::Error,
                    Confidence::Low,
                )
            }
        }
    }

    /// Like [`decide`](Self::decide), but runs the full page-signal DOI
    /// extractor first when the page carries no DOI yet.
    pub async fn decide_with_signals(
        &self,
        page: &PageMetadata,
        signals: &PageSignals,
    ) -> AdmissionDecision {
        if page.doi.is_some() {
            return self.decide(page).await;
        }
        let mut enriched = page.clone();
        enriched.doi = extract::extract_doi(signals).map(|doi| doi.normalized);
        self.decide(&enriched).await
    }

    async fn decide_inner(&self, page: &PageMetadata) -> Result<AdmissionDecision> {
        // 1. Lazy-load the domain dataset on first use.
        self.ensure_dataset_loaded().await;
        let classifier = self.classifier.read().await;

        // 2. Trusted open-access source: terminal allow.
        if classifier.is_whitelisted(&page.domain) {
            return Ok(AdmissionDecision::allow(
                format!("{} is a trusted open-access source", page.domain),
                DecisionCategory::Whitelist,
                Confidence::High,
            ));
        }

        // 3. PDF tabs without a DOI get one more chance: the URL itself.
        let mut doi = page.doi.as_deref().and_then(|raw| Doi::parse(raw).ok());
        if doi.is_none() && page.is_pdf {
            doi = extract::extract_doi_from_pdf_url(&page.url);
            if let Some(found) = &doi {
                debug!("doi {} recovered from pdf url {}", found.normalized, page.url);
            }
        }

        // 4. No DOI to verify against: decide on domain + content type.
        let Some(doi) = doi else {
            if classifier.is_blacklisted(&page.domain) {
                return Ok(AdmissionDecision::block(
                    format!("{} is a known subscription database", page.domain),
                    DecisionCategory::Blacklist,
                    Confidence::High,
                )
                .with_suggestion(BLACKLIST_SUGGESTION));
            }
            if page.is_pdf {
                // PDFs are the copyrighted artifact; unverifiable means blocked.
                return Ok(AdmissionDecision::block(
                    "PDF from an unverified source; redistribution rights unknown",
                    DecisionCategory::UnknownPdf,
                    Confidence::Medium,
                ));
            }
            // Unverifiable HTML is allowed at low confidence: the page is
            // rarely the copyrighted artifact itself.
            return Ok(AdmissionDecision::allow(
                "Unknown domain with no DOI; allowing HTML content",
                DecisionCategory::UnknownHtml,
                Confidence::Low,
            )
            .with_warning(UNVERIFIED_WARNING));
        };
        drop(classifier);

        // 5. Resolve open-access status (cache-first).
        let record = self.resolver.resolve(&doi).await?;

        // 6-8. Map the record onto a terminal verdict.
        Ok(decision_from_record(page, &doi, &record))
    }

    async fn ensure_dataset_loaded(&self) {
        if self.load_attempted.load(Ordering::Acquire) {
            return;
        }
        let mut classifier = self.classifier.write().await;
        if !self.load_attempted.swap(true, Ordering::AcqRel) {
            classifier.load(&self.dataset_source);
        }
    }

    /// Re-fetch the domain dataset on explicit request.
    pub async fn reload_domains(&self) -> bool {
        let mut classifier = self.classifier.write().await;
        self.load_attempted.store(true, Ordering::Release);
        classifier.load(&self.dataset_source)
    }

    pub async fn domain_counts(&self) -> (usize, usize, usize) {
        self.ensure_dataset_loaded().await;
        self.classifier.read().await.counts()
    }
}

/// Steps 6-8 of the decision tree: verdict from a resolved status record.
///
/// The error check is deliberately the conjunction `error && !is_oa`: a
/// record that carries an error but still reports open access is treated
/// as verified, matching the registry-consumer behavior this replaces.
fn decision_from_record(
    page: &PageMetadata,
    doi: &Doi,
    record: &OaStatusRecord,
) -> AdmissionDecision {
    if record.error.is_some() && !record.is_oa {
        let message = record.error.as_deref().unwrap_or("unknown error");
        return AdmissionDecision::block(
            format!("Open-access verification failed: {message}"),
            DecisionCategory::VerificationFailed,
            Confidence::Low,
        )
        .with_doi(&doi.normalized);
    }

    if record.is_oa {
        let mut decision = AdmissionDecision::allow(
            "Registry confirms this work is open access",
            DecisionCategory::OaVerified,
            Confidence::High,
        )
        .with_doi(&doi.normalized);

        // An alternative access point is only worth surfacing when it is
        // not the page the user is already on.
        if let Some(oa_url) = record.oa_url.as_deref() {
            if oa_url != page.url {
                decision.oa_url = Some(oa_url.to_string());
                decision.oa_host = record.host_type.map(|h| h.as_str().to_string());
                decision.suggestion =
                    Some(format!("An open-access copy is available at {oa_url}"));
            }
        }
        return decision;
    }

    AdmissionDecision::block(
        "Registry reports this work as paywalled",
        DecisionCategory::Paywalled,
        Confidence::High,
    )
    .with_doi(&doi.normalized)
    .with_suggestion(PAYWALL_SUGGESTION)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mockito::Server;
    use oaguard_core::{KvStore, OaStatus};
    use serde_json::json;

    use super::*;
    use crate::registry::cache::{DEFAULT_TTL, OaStatusCache};

    fn controller(base_url: &str) -> (AdmissionController, Arc<OaStatusCache>) {
        let cache = Arc::new(OaStatusCache::new(
            KvStore::open_in_memory().unwrap(),
            DEFAULT_TTL,
        ));
        let resolver = Arc::new(OaResolver::with_config(
            base_url,
            "oa@lab.example.edu".to_string(),
            Duration::from_secs(5),
            cache.clone(),
        ));
        (
            AdmissionController::new(DatasetSource::Bundled, resolver),
            cache,
        )
    }

    fn oa_body(doi: &str, is_oa: bool, oa_url: Option<&str>) -> String {
        let mut body = json!({"doi": doi, "is_oa": is_oa});
        if let Some(url) = oa_url {
            body["oa_status"] = json!("green");
            body["best_oa_location"] = json!({"url": url, "host_type": "repository"});
        }
        body.to_string()
    }

    #[tokio::test]
    async fn whitelisted_domain_allows_regardless_of_content_type() {
        let (controller, _) = controller("http://127.0.0.1:1");

        let html = PageMetadata::new("https://arxiv.org/abs/2301.00001", "arxiv.org");
        let pdf = PageMetadata::new("https://arxiv.org/pdf/2301.00001.pdf", "arxiv.org").pdf();

        for page in [html, pdf] {
            let decision = controller.decide(&page).await;
            assert!(decision.allowed);
            assert_eq!(decision.category, DecisionCategory::Whitelist);
            assert_eq!(decision.confidence, Confidence::High);
        }
    }

    #[tokio::test]
    async fn blacklisted_domain_without_doi_blocks() {
        let (controller, _) = controller("http://127.0.0.1:1");
        let page = PageMetadata::new(
            "https://ieeexplore.ieee.org/document/123456",
            "ieeexplore.ieee.org",
        );

        let decision = controller.decide(&page).await;
        assert!(!decision.allowed);
        assert_eq!(decision.category, DecisionCategory::Blacklist);
        assert_eq!(decision.confidence, Confidence::High);
        assert!(decision.suggestion.is_some());
    }

    #[tokio::test]
    async fn blacklisted_pdf_with_no_embedded_doi_blocks_as_blacklist() {
        let (controller, _) = controller("http://127.0.0.1:1");
        let page = PageMetadata::new(
            "https://ieeexplore.ieee.org/document/123.pdf",
            "ieeexplore.ieee.org",
        )
        .pdf();

        let decision = controller.decide(&page).await;
        assert!(!decision.allowed);
        assert_eq!(decision.category, DecisionCategory::Blacklist);
    }

    #[tokio::test]
    async fn unknown_html_allows_with_warning() {
        let (controller, _) = controller("http://127.0.0.1:1");
        let page = PageMetadata::new("https://blog.example.com/post", "blog.example.com");

        let decision = controller.decide(&page).await;
        assert!(decision.allowed);
        assert_eq!(decision.category, DecisionCategory::UnknownHtml);
        assert_eq!(decision.confidence, Confidence::Low);
        assert!(decision.warning.is_some());
    }

    #[tokio::test]
    async fn unknown_pdf_blocks() {
        let (controller, _) = controller("http://127.0.0.1:1");
        let page = PageMetadata::new("https://blog.example.com/paper.pdf", "blog.example.com").pdf();

        let decision = controller.decide(&page).await;
        assert!(!decision.allowed);
        assert_eq!(decision.category, DecisionCategory::UnknownPdf);
        assert_eq!(decision.confidence, Confidence::Medium);
    }

    #[tokio::test]
    async fn oa_verified_allows_and_second_decide_uses_cache() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/10.1371%2Fjournal.pone.0266781?email=oa%40lab.example.edu")
            .with_status(200)
            .with_body(oa_body(
                "10.1371/journal.pone.0266781",
                true,
                Some("https://europepmc.org/article/pmc9009779"),
            ))
            .expect(1)
            .create_async()
            .await;

        let (controller, _) = controller(&server.url());
        let page = PageMetadata::new(
            "https://somejournal.example.org/article/9",
            "somejournal.example.org",
        )
        .with_doi("10.1371/journal.pone.0266781");

        let first = controller.decide(&page).await;
        assert!(first.allowed);
        assert_eq!(first.category, DecisionCategory::OaVerified);
        assert_eq!(
            first.oa_url.as_deref(),
            Some("https://europepmc.org/article/pmc9009779")
        );
        assert_eq!(first.oa_host.as_deref(), Some("repository"));

        let second = controller.decide(&page).await;
        assert_eq!(second.category, DecisionCategory::OaVerified);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn oa_url_matching_page_url_is_omitted() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/10.1000%2Fself?email=oa%40lab.example.edu")
            .with_status(200)
            .with_body(oa_body(
                "10.1000/self",
                true,
                Some("https://journal.example.org/article/self"),
            ))
            .create_async()
            .await;

        let (controller, _) = controller(&server.url());
        let page = PageMetadata::new(
            "https://journal.example.org/article/self",
            "journal.example.org",
        )
        .with_doi("10.1000/self");

        let decision = controller.decide(&page).await;
        assert!(decision.allowed);
        assert_eq!(decision.oa_url, None);
        assert_eq!(decision.oa_host, None);
    }

    #[tokio::test]
    async fn paywalled_record_blocks_with_suggestion() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/10.1000%2Fclosed?email=oa%40lab.example.edu")
            .with_status(200)
            .with_body(oa_body("10.1000/closed", false, None))
            .create_async()
            .await;

        let (controller, _) = controller(&server.url());
        let page = PageMetadata::new("https://journal.example.org/a/1", "journal.example.org")
            .with_doi("10.1000/closed");

        let decision = controller.decide(&page).await;
        assert!(!decision.allowed);
        assert_eq!(decision.category, DecisionCategory::Paywalled);
        assert_eq!(decision.confidence, Confidence::High);
        assert_eq!(decision.suggestion.as_deref(), Some(PAYWALL_SUGGESTION));
    }

    #[tokio::test]
    async fn transient_failure_blocks_as_verification_failed_and_caches_nothing() {
        // Unreachable registry: the resolver yields an uncached error record.
        let (controller, cache) = controller("http://127.0.0.1:1");
        let page = PageMetadata::new("https://journal.example.org/a/1", "journal.example.org")
            .with_doi("10.1000/unreachable");

        let decision = controller.decide(&page).await;
        assert!(!decision.allowed);
        assert_eq!(decision.category, DecisionCategory::VerificationFailed);
        assert_eq!(decision.confidence, Confidence::Low);
        assert!(!cache.contains("10.1000/unreachable").unwrap());
    }

    #[tokio::test]
    async fn pdf_url_doi_enrichment_feeds_the_resolver() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/10.1371%2Fjournal.pone.0266781?email=oa%40lab.example.edu")
            .with_status(200)
            .with_body(oa_body("10.1371/journal.pone.0266781", true, None))
            .expect(1)
            .create_async()
            .await;

        let (controller, _) = controller(&server.url());
        let page = PageMetadata::new(
            "https://files.example.org/10.1371/journal.pone.0266781.pdf",
            "files.example.org",
        )
        .pdf();

        let decision = controller.decide(&page).await;
        assert!(decision.allowed);
        assert_eq!(decision.category, DecisionCategory::OaVerified);
        assert_eq!(decision.doi.as_deref(), Some("10.1371/journal.pone.0266781"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn registry_server_error_converts_to_error_block() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/10.1000%2Fflaky?email=oa%40lab.example.edu")
            .with_status(503)
            .create_async()
            .await;

        let (controller, _) = controller(&server.url());
        let page = PageMetadata::new("https://journal.example.org/a/1", "journal.example.org")
            .with_doi("10.1000/flaky");

        let decision = controller.decide(&page).await;
        assert!(!decision.allowed);
        assert_eq!(decision.category, DecisionCategory::Error);
        assert_eq!(decision.confidence, Confidence::Low);
    }

    #[tokio::test]
    async fn signals_extraction_feeds_decide() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/10.1038%2Fs41586-021-03819-2?email=oa%40lab.example.edu")
            .with_status(200)
            .with_body(oa_body("10.1038/s41586-021-03819-2", true, None))
            .create_async()
            .await;

        let (controller, _) = controller(&server.url());
        let page = PageMetadata::new("https://journal.example.org/a/1", "journal.example.org");
        let mut signals = PageSignals::for_url(&page.url);
        signals.meta_tags.push((
            "citation_doi".to_string(),
            "10.1038/s41586-021-03819-2".to_string(),
        ));

        let decision = controller.decide_with_signals(&page, &signals).await;
        assert_eq!(decision.category, DecisionCategory::OaVerified);
    }

    #[test]
    fn error_with_is_oa_true_still_counts_as_verified() {
        // The conjunction is deliberate: error && !is_oa blocks, but an
        // error alongside is_oa=true does not.
        let page = PageMetadata::new("https://journal.example.org/a/1", "journal.example.org");
        let doi = Doi::parse("10.1000/partial").unwrap();
        let record = OaStatusRecord {
            doi: "10.1000/partial".to_string(),
            is_oa: true,
            oa_status: Some(OaStatus::Hybrid),
            oa_url: None,
            host_type: None,
            version: None,
            license: None,
            error: Some("partial response".to_string()),
        };

        let decision = decision_from_record(&page, &doi, &record);
        assert!(decision.allowed);
        assert_eq!(decision.category, DecisionCategory::OaVerified);
    }
}
