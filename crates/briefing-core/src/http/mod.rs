//! Shared HTTP dispatch pool: bounded global concurrency, a per-host
//! minimum-delay limiter, and exponential-backoff-with-jitter retries.

use crate::error::HttpError;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock, Semaphore};

/// Per-host retry/pacing policy.
#[derive(Debug, Clone, Copy)]
pub struct HostPolicy {
    pub min_interval: Duration,
    pub max_in_flight: usize,
    pub max_attempts: u32,
}

impl Default for HostPolicy {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(0),
            max_in_flight: 1,
            max_attempts: 3,
        }
    }
}

struct HostLimiter {
    permits: Semaphore,
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl HostLimiter {
    fn new(policy: HostPolicy) -> Self {
        Self {
            permits: Semaphore::new(policy.max_in_flight),
            last_request: Mutex::new(None),
            min_interval: policy.min_interval,
        }
    }

    async fn wait_for_slot(&self) -> tokio::sync::SemaphorePermit<'_> {
        let permit = self.permits.acquire().await.expect("semaphore not closed");
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
        permit
    }
}

/// The shared outbound HTTP dispatch pool.
pub struct HttpPool {
    client: reqwest::Client,
    global: Arc<Semaphore>,
    per_host: RwLock<HashMap<String, Arc<HostLimiter>>>,
}

impl HttpPool {
    pub fn new(global_capacity: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            global: Arc::new(Semaphore::new(global_capacity)),
            per_host: RwLock::new(HashMap::new()),
        }
    }

    /// Expose the underlying client for callers (e.g. the LLM client) that
    /// need to build their own typed requests but still want pooling.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    async fn host_limiter(&self, host: &str, policy: HostPolicy) -> Arc<HostLimiter> {
        if let Some(existing) = self.per_host.read().await.get(host) {
            return existing.clone();
        }
        let mut write = self.per_host.write().await;
        write
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(HostLimiter::new(policy)))
            .clone()
    }

    /// Execute `build_request` (invoked once per attempt, since `reqwest::Request`
    /// isn't cheaply cloneable once a body is attached) under the pool's global
    /// and per-host bounds, retrying transient failures with exponential
    /// backoff and jitter.
    pub async fn execute<F>(
        &self,
        host: &str,
        policy: HostPolicy,
        mut build_request: F,
    ) -> Result<reqwest::Response, HttpError>
    where
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let _global_permit = self
            .global
            .acquire()
            .await
            .expect("semaphore not closed");
        let limiter = self.host_limiter(host, policy).await;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let _host_permit = limiter.wait_for_slot().await;

            let result = build_request().send().await;
            match result {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) if response.status().as_u16() == 429 => {
                    let retry_after = retry_after_secs(&response);
                    if attempt >= policy.max_attempts {
                        return Err(HttpError::RateLimited {
                            retry_after_secs: retry_after,
                        });
                    }
                    backoff_sleep(attempt, retry_after).await;
                }
                Ok(response) if response.status().is_server_error() => {
                    if attempt >= policy.max_attempts {
                        return Err(HttpError::Exhausted { attempts: attempt });
                    }
                    backoff_sleep(attempt, None).await;
                }
                Ok(response) => return Ok(response),
                Err(e) => {
                    if attempt >= policy.max_attempts {
                        return Err(HttpError::Network(e));
                    }
                    backoff_sleep(attempt, None).await;
                }
            }
        }
    }
}

fn retry_after_secs(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
}

async fn backoff_sleep(attempt: u32, retry_after_secs: Option<u64>) {
    if let Some(secs) = retry_after_secs {
        tokio::time::sleep(Duration::from_secs(secs)).await;
        return;
    }
    let base_ms = 200u64 * 2u64.pow(attempt.saturating_sub(1));
    let jitter_ms = rand::thread_rng().gen_range(0..100);
    tokio::time::sleep(Duration::from_millis(base_ms + jitter_ms)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn succeeds_on_first_try() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hi"))
            .mount(&server)
            .await;

        let pool = HttpPool::new(8);
        let url = format!("{}/ok", server.uri());
        let response = pool
            .execute("test-host", HostPolicy::default(), || pool.client().get(&url))
            .await
            .expect("execute");
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn retries_5xx_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_string("recovered"))
            .mount(&server)
            .await;

        let pool = HttpPool::new(8);
        let url = format!("{}/flaky", server.uri());
        let response = pool
            .execute("test-host", HostPolicy::default(), || pool.client().get(&url))
            .await
            .expect("execute");
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let pool = HttpPool::new(8);
        let url = format!("{}/broken", server.uri());
        let policy = HostPolicy {
            max_attempts: 2,
            ..Default::default()
        };
        let err = pool
            .execute("test-host", policy, || pool.client().get(&url))
            .await
            .unwrap_err();
        assert!(matches!(err, HttpError::Exhausted { attempts: 2 }));
    }

    #[tokio::test]
    async fn does_not_retry_non_429_4xx() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forbidden"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let pool = HttpPool::new(8);
        let url = format!("{}/forbidden", server.uri());
        let response = pool
            .execute("test-host", HostPolicy::default(), || pool.client().get(&url))
            .await
            .expect("execute returns the response, not an error, for non-retried statuses");
        assert_eq!(response.status(), 403);
    }
}
