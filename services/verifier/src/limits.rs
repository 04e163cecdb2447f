//! Outbound resource discipline: per-domain token buckets, 429 backoff, and
//! per-domain circuit breakers.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::time::Duration;

// tokio's Instant so the breaker/backoff windows honor the paused test clock.
use tokio::time::Instant;

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Bucket key: the URL's host.
pub fn domain_of(url: &str) -> String {
    url.split("://")
        .nth(1)
        .unwrap_or(url)
        .split('/')
        .next()
        .unwrap_or("unknown")
        .to_owned()
}

// ---------------------------------------------------------------------------
// Rate limiter
// ---------------------------------------------------------------------------

pub struct DomainRateLimiter {
    limiter: DefaultKeyedRateLimiter<String>,
    backoff_until: Mutex<HashMap<String, Instant>>,
    rpm: u32,
    backoff_on_429: Duration,
}

impl DomainRateLimiter {
    pub fn new(rpm: u32, burst: u32, backoff_on_429: Duration) -> DomainRateLimiter {
        let rpm_nz = NonZeroU32::new(rpm.max(1)).expect("non-zero rpm");
        let burst_nz = NonZeroU32::new(burst.max(1)).expect("non-zero burst");
        DomainRateLimiter {
            limiter: RateLimiter::keyed(Quota::per_minute(rpm_nz).allow_burst(burst_nz)),
            backoff_until: Mutex::new(HashMap::new()),
            rpm: rpm.max(1),
            backoff_on_429,
        }
    }

    /// Consume a token if the domain is neither backing off nor empty.
    pub async fn allow_request(&self, url: &str) -> bool {
        let domain = domain_of(url);
        {
            let backoff = self.backoff_until.lock().await;
            if let Some(&until) = backoff.get(&domain) {
                if Instant::now() < until {
                    return false;
                }
            }
        }
        self.limiter.check_key(&domain).is_ok()
    }

    /// Wait (bounded) until a request to the domain is allowed.
    pub async fn wait_for_slot(&self, url: &str, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let refill = Duration::from_secs_f64(60.0 / f64::from(self.rpm));
        loop {
            if self.allow_request(url).await {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            tokio::time::sleep(refill.min(remaining)).await;
        }
    }

    /// A 429 silences the whole domain for the configured interval.
    pub async fn record_429(&self, url: &str) {
        let domain = domain_of(url);
        let until = Instant::now() + self.backoff_on_429;
        self.backoff_until.lock().await.insert(domain.clone(), until);
        warn!(domain, backoff_s = self.backoff_on_429.as_secs(), "rate limit backoff");
    }
}

// ---------------------------------------------------------------------------
// Circuit breaker
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct DomainCircuit {
    state: CircuitState,
    failures: u32,
    opened_at: Instant,
}

/// Per-domain breaker: opens after N consecutive failures, half-opens after
/// the recovery window admitting a single probe.
pub struct CircuitBreaker {
    circuits: Mutex<HashMap<String, DomainCircuit>>,
    failure_threshold: u32,
    recovery: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, recovery: Duration) -> CircuitBreaker {
        CircuitBreaker {
            circuits: Mutex::new(HashMap::new()),
            failure_threshold,
            recovery,
        }
    }

    pub async fn allow_request(&self, url: &str) -> bool {
        let domain = domain_of(url);
        let mut circuits = self.circuits.lock().await;
        let Some(circuit) = circuits.get_mut(&domain) else {
            return true;
        };
        match circuit.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                if circuit.opened_at.elapsed() >= self.recovery {
                    circuit.state = CircuitState::HalfOpen;
                    info!(domain, "circuit half-open");
                    true
                } else {
                    false
                }
            }
        }
    }

    pub async fn record_success(&self, url: &str) {
        let domain = domain_of(url);
        let mut circuits = self.circuits.lock().await;
        if let Some(circuit) = circuits.get_mut(&domain) {
            if circuit.state == CircuitState::HalfOpen {
                info!(domain, "circuit closed");
            }
            circuit.state = CircuitState::Closed;
            circuit.failures = 0;
        }
    }

    pub async fn record_failure(&self, url: &str) {
        let domain = domain_of(url);
        let mut circuits = self.circuits.lock().await;
        let circuit = circuits.entry(domain.clone()).or_insert(DomainCircuit {
            state: CircuitState::Closed,
            failures: 0,
            opened_at: Instant::now(),
        });
        circuit.failures += 1;
        let should_open = circuit.state == CircuitState::HalfOpen
            || circuit.failures >= self.failure_threshold;
        if should_open && circuit.state != CircuitState::Open {
            circuit.state = CircuitState::Open;
            circuit.opened_at = Instant::now();
            warn!(domain, failures = circuit.failures, "circuit open");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_extraction() {
        assert_eq!(
            domain_of("https://site.api.espn.com/apis/site/v2/x"),
            "site.api.espn.com"
        );
        assert_eq!(domain_of("not a url"), "not a url");
    }

    #[tokio::test]
    async fn burst_then_empty_bucket() {
        let limiter = DomainRateLimiter::new(60, 3, Duration::from_secs(60));
        let url = "https://example.com/a";
        assert!(limiter.allow_request(url).await);
        assert!(limiter.allow_request(url).await);
        assert!(limiter.allow_request(url).await);
        // Burst of 3 exhausted; next call inside the same second must fail.
        assert!(!limiter.allow_request(url).await);
        // Separate domain has its own bucket.
        assert!(limiter.allow_request("https://other.com/b").await);
    }

    #[tokio::test]
    async fn backoff_blocks_the_whole_domain() {
        let limiter = DomainRateLimiter::new(600, 10, Duration::from_secs(60));
        let url = "https://example.com/a";
        limiter.record_429(url).await;
        assert!(!limiter.allow_request("https://example.com/b").await);
        assert!(limiter.allow_request("https://other.com/c").await);
    }

    #[tokio::test]
    async fn breaker_opens_after_threshold_and_half_opens() {
        tokio::time::pause();
        let breaker = CircuitBreaker::new(3, Duration::from_secs(120));
        let url = "https://example.com/a";

        assert!(breaker.allow_request(url).await);
        breaker.record_failure(url).await;
        breaker.record_failure(url).await;
        assert!(breaker.allow_request(url).await);
        breaker.record_failure(url).await;
        assert!(!breaker.allow_request(url).await);

        // After the recovery window a single probe is admitted.
        tokio::time::advance(Duration::from_secs(121)).await;
        assert!(breaker.allow_request(url).await);

        // A failing probe re-opens immediately.
        breaker.record_failure(url).await;
        assert!(!breaker.allow_request(url).await);

        // A successful probe closes it.
        tokio::time::advance(Duration::from_secs(121)).await;
        assert!(breaker.allow_request(url).await);
        breaker.record_success(url).await;
        assert!(breaker.allow_request(url).await);
    }
}
