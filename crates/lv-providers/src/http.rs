use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use lv_model::ProviderName;

/// Failure modes of a provider HTTP call.
///
/// `RateLimited` and `Status` for non-429 4xx fail fast; timeouts, 5xx and
/// network errors are transient and retried a bounded number of times before
/// surfacing.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("rate limited (429)")]
    RateLimited,
    #[error("http status {0}")]
    Status(u16),
    #[error("request timed out")]
    Timeout,
    #[error("network: {0}")]
    Network(String),
    #[error("malformed response: {0}")]
    Decode(String),
}

impl ProviderError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ProviderError::RateLimited)
    }

    fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::Timeout | ProviderError::Network(_) | ProviderError::Status(500..)
        )
    }
}

/// Thin reqwest wrapper shared by all connectors: per-request timeout,
/// bounded retry on transient failures, fail-fast on client errors.
pub struct ProviderHttpClient {
    provider: ProviderName,
    client: reqwest::Client,
    max_attempts: u32,
    retry_base: Duration,
}

impl ProviderHttpClient {
    pub fn new(provider: ProviderName, timeout: Duration) -> Result<ProviderHttpClient, String> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| e.to_string())?;
        Ok(ProviderHttpClient {
            provider,
            client,
            max_attempts: 2,
            retry_base: Duration::from_millis(500),
        })
    }

    /// GET a JSON document.  Query pairs and headers are per-call; retries
    /// apply only to transient failures.
    pub async fn get_json(
        &self,
        url: &str,
        query: &[(&str, String)],
        headers: &[(&str, &str)],
    ) -> Result<serde_json::Value, ProviderError> {
        let mut last_err = ProviderError::Network("no attempt made".to_owned());
        for attempt in 1..=self.max_attempts {
            match self.get_once(url, query, headers).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if err.is_transient() && attempt < self.max_attempts {
                        let delay = self.retry_base * 2u32.pow(attempt - 1);
                        warn!(provider = %self.provider, url, attempt, error = %err, "transient provider failure, retrying");
                        tokio::time::sleep(delay).await;
                        last_err = err;
                        continue;
                    }
                    return Err(err);
                }
            }
        }
        Err(last_err)
    }

    async fn get_once(
        &self,
        url: &str,
        query: &[(&str, String)],
        headers: &[(&str, &str)],
    ) -> Result<serde_json::Value, ProviderError> {
        let mut req = self.client.get(url).query(query);
        for (name, value) in headers {
            req = req.header(*name, *value);
        }

        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout
            } else {
                ProviderError::Network(e.to_string())
            }
        })?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(ProviderError::RateLimited);
        }
        if !status.is_success() {
            return Err(ProviderError::Status(status.as_u16()));
        }

        debug!(provider = %self.provider, url, status = status.as_u16(), "provider request ok");
        resp.json::<serde_json::Value>()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(ProviderError::Timeout.is_transient());
        assert!(ProviderError::Status(503).is_transient());
        assert!(ProviderError::Network("reset".into()).is_transient());
        assert!(!ProviderError::Status(404).is_transient());
        assert!(!ProviderError::RateLimited.is_transient());
        assert!(ProviderError::RateLimited.is_rate_limited());
    }
}
