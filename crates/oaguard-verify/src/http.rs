use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio::time::sleep;

use crate::error::{Result, VerifyError};

/// Thin registry HTTP client: paced, bounded by an explicit timeout, and
/// single-attempt. A failed registry call is surfaced to the caller rather
/// than retried — retry is the caller's responsibility.
pub struct RegistryHttp {
    client: reqwest::Client,
    timeout: Duration,
    min_interval: Duration,
    last_request: Arc<Mutex<Option<Instant>>>,
}

impl RegistryHttp {
    pub fn new(timeout: Duration, min_interval: Duration, user_agent: &str) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .gzip(true)
            .build()
            .expect("failed to build reqwest client");
        Self {
            client,
            timeout,
            min_interval,
            last_request: Arc::new(Mutex::new(None)),
        }
    }

    async fn wait_for_rate_limit(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(t) = *last {
            let elapsed = t.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    pub async fn get(&self, url: &str) -> Result<String> {
        self.wait_for_rate_limit().await;

        let resp = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(url, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(VerifyError::ApiError {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        resp.text()
            .await
            .map_err(|e| classify_reqwest_error(url, e))
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let text = self.get(url).await?;
        serde_json::from_str(&text).map_err(|e| VerifyError::Parse(e.to_string()))
    }
}

fn classify_reqwest_error(url: &str, err: reqwest::Error) -> VerifyError {
    if err.is_timeout() {
        VerifyError::Timeout(url.to_string())
    } else {
        VerifyError::Http(err)
    }
}
