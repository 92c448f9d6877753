use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use oaguard_core::{AdmissionDecision, PageCapture};
use tracing::{info, warn};

use crate::admission::AdmissionController;
use crate::error::Result;

/// Remote endpoint captures are forwarded to once admitted.
#[async_trait]
pub trait ProjectApi: Send + Sync {
    async fn submit(&self, capture: &PageCapture) -> Result<()>;
}

/// Per-capture result of a gated submission.
#[derive(Debug)]
pub enum SubmissionOutcome {
    Submitted,
    /// Admission control refused the capture; it was never forwarded.
    Blocked(AdmissionDecision),
    /// Admitted but the upstream submit call failed.
    Failed(String),
}

impl SubmissionOutcome {
    pub fn is_submitted(&self) -> bool {
        matches!(self, Self::Submitted)
    }
}

/// Routes every capture through admission control before it can reach the
/// project API. There is no bypass: a blocked capture is dropped with its
/// decision attached, and an upstream failure never aborts the batch.
pub struct SubmissionPipeline<A: ProjectApi> {
    controller: Arc<AdmissionController>,
    api: A,
    concurrency: usize,
}

impl<A: ProjectApi> SubmissionPipeline<A> {
    pub fn new(controller: Arc<AdmissionController>, api: A, concurrency: usize) -> Self {
        Self {
            controller,
            api,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn submit(&self, capture: &PageCapture) -> SubmissionOutcome {
        let decision = self.controller.decide(&capture.page).await;
        if !decision.allowed {
            info!(
                "blocked capture from {} ({})",
                capture.page.url,
                decision.category.as_str()
            );
            return SubmissionOutcome::Blocked(decision);
        }

        match self.api.submit(capture).await {
            Ok(()) => SubmissionOutcome::Submitted,
            Err(e) => {
                warn!("submission failed for {}: {e}", capture.page.url);
                SubmissionOutcome::Failed(e.to_string())
            }
        }
    }

    /// Gate and forward a batch with bounded concurrency. Outcomes come back
    /// in input order regardless of completion order.
    pub async fn submit_batch(&self, captures: &[PageCapture]) -> Vec<SubmissionOutcome> {
        let mut indexed: Vec<(usize, SubmissionOutcome)> =
            futures::stream::iter(captures.iter().enumerate())
                .map(|(i, capture)| async move { (i, self.submit(capture).await) })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;
        indexed.sort_by_key(|(i, _)| *i);
        indexed.into_iter().map(|(_, outcome)| outcome).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use oaguard_core::{DecisionCategory, KvStore, PageMetadata};

    use super::*;
    use crate::domains::DatasetSource;
    use crate::error::VerifyError;
    use crate::registry::cache::{DEFAULT_TTL, OaStatusCache};
    use crate::registry::resolver::OaResolver;

    struct RecordingApi {
        submitted: Mutex<Vec<String>>,
        fail: bool,
    }

    impl RecordingApi {
        fn new(fail: bool) -> Self {
            Self {
                submitted: Mutex::new(Vec::new()),
                fail,
            }
        }
    }

    #[async_trait]
    impl ProjectApi for RecordingApi {
        async fn submit(&self, capture: &PageCapture) -> Result<()> {
            if self.fail {
                return Err(VerifyError::Parse("upstream rejected payload".to_string()));
            }
            self.submitted
                .lock()
                .unwrap()
                .push(capture.page.url.clone());
            Ok(())
        }
    }

    fn controller() -> Arc<AdmissionController> {
        let cache = Arc::new(OaStatusCache::new(
            KvStore::open_in_memory().unwrap(),
            DEFAULT_TTL,
        ));
        let resolver = Arc::new(OaResolver::with_config(
            "http://127.0.0.1:1",
            "oa@lab.example.edu".to_string(),
            Duration::from_secs(1),
            cache,
        ));
        Arc::new(AdmissionController::new(DatasetSource::Bundled, resolver))
    }

    fn capture(url: &str, domain: &str) -> PageCapture {
        PageCapture::new("A study", PageMetadata::new(url, domain))
    }

    #[tokio::test]
    async fn admitted_capture_is_forwarded() {
        let api = RecordingApi::new(false);
        let pipeline = SubmissionPipeline::new(controller(), api, 3);

        let outcome = pipeline
            .submit(&capture("https://arxiv.org/abs/2301.00001", "arxiv.org"))
            .await;
        assert!(outcome.is_submitted());
        assert_eq!(
            pipeline.api.submitted.lock().unwrap().as_slice(),
            ["https://arxiv.org/abs/2301.00001"]
        );
    }

    #[tokio::test]
    async fn blocked_capture_is_never_forwarded() {
        let api = RecordingApi::new(false);
        let pipeline = SubmissionPipeline::new(controller(), api, 3);

        let outcome = pipeline
            .submit(&capture(
                "https://ieeexplore.ieee.org/document/123456",
                "ieeexplore.ieee.org",
            ))
            .await;
        match outcome {
            SubmissionOutcome::Blocked(decision) => {
                assert_eq!(decision.category, DecisionCategory::Blacklist)
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(pipeline.api.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn upstream_failure_reports_failed_without_aborting() {
        let api = RecordingApi::new(true);
        let pipeline = SubmissionPipeline::new(controller(), api, 3);

        let outcome = pipeline
            .submit(&capture("https://arxiv.org/abs/2301.00001", "arxiv.org"))
            .await;
        match outcome {
            SubmissionOutcome::Failed(msg) => assert!(msg.contains("upstream rejected")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn batch_outcomes_keep_input_order() {
        let api = RecordingApi::new(false);
        let pipeline = SubmissionPipeline::new(controller(), api, 2);

        let captures = vec![
            capture("https://arxiv.org/abs/2301.00001", "arxiv.org"),
            capture(
                "https://ieeexplore.ieee.org/document/1",
                "ieeexplore.ieee.org",
            ),
            capture("https://zenodo.org/records/42", "zenodo.org"),
        ];

        let outcomes = pipeline.submit_batch(&captures).await;
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].is_submitted());
        assert!(matches!(outcomes[1], SubmissionOutcome::Blocked(_)));
        assert!(outcomes[2].is_submitted());
    }
}
