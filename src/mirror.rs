//! Mirror failover and HTTP fetching
//!
//! A title's content is served by several interchangeable origin domains.
//! [`MirrorPool`] tracks which domain is active and rotates circularly after a
//! configurable number of consecutive failures. [`Fetcher`] wraps a
//! [`reqwest::Client`] and runs each GET under the pool's failover loop with
//! an overall attempt budget, so a request against entirely offline mirrors
//! terminates with [`Error::AllMirrorsExhausted`] instead of looping forever.

use crate::config::{Config, RetryConfig};
use crate::error::{Error, Result};
use crate::retry::{IsRetryable, retry_with_backoff};
use std::sync::Mutex;

/// Rotation state guarded by one lock so two tasks detecting a threshold
/// breach cannot rotate past the intended next mirror
#[derive(Debug)]
struct RotationState {
    active_index: usize,
    consecutive_failures: u32,
}

/// Tracks the active origin domain and decides when to rotate
///
/// Shared by every page task of a downloader instance; all mutation goes
/// through [`record_outcome`](Self::record_outcome) under the internal lock.
#[derive(Debug)]
pub struct MirrorPool {
    domains: Vec<String>,
    failure_threshold: u32,
    state: Mutex<RotationState>,
}

impl MirrorPool {
    /// Create a pool over the configured domains
    ///
    /// `domains` must be non-empty (enforced by [`Config::validate`]).
    pub fn new(domains: Vec<String>, failure_threshold: u32) -> Self {
        Self {
            domains,
            failure_threshold: failure_threshold.max(1),
            state: Mutex::new(RotationState {
                active_index: 0,
                consecutive_failures: 0,
            }),
        }
    }

    /// Number of configured domains
    pub fn len(&self) -> usize {
        self.domains.len()
    }

    /// Whether the pool has no domains configured
    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    /// The domain requests should currently target
    pub fn current_domain(&self) -> String {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        self.domains[state.active_index].clone()
    }

    /// Record the outcome of one request against the active domain
    ///
    /// A success resets the consecutive-failure counter. A failure increments
    /// it and rotates to the next domain once the threshold is reached.
    pub fn record_outcome(&self, success: bool) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if success {
            state.consecutive_failures = 0;
            return;
        }
        state.consecutive_failures += 1;
        if state.consecutive_failures >= self.failure_threshold {
            self.rotate_locked(&mut state);
        }
    }

    /// Advance to the next domain circularly, resetting the failure counter
    ///
    /// Returns the newly active domain.
    pub fn rotate(&self) -> String {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        self.rotate_locked(&mut state);
        self.domains[state.active_index].clone()
    }

    fn rotate_locked(&self, state: &mut RotationState) {
        let previous = state.active_index;
        state.active_index = (state.active_index + 1) % self.domains.len();
        state.consecutive_failures = 0;
        tracing::info!(
            from = %self.domains[previous],
            to = %self.domains[state.active_index],
            "rotated mirror domain"
        );
    }

    /// Consecutive failures recorded against the active domain
    pub fn consecutive_failures(&self) -> u32 {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.consecutive_failures
    }
}

/// HTTP fetcher running GETs under the mirror failover loop
///
/// Mirror-relative paths go through [`get_path`](Self::get_path), which
/// rotates and retries across the whole pool. Absolute URLs (assets hosted
/// off-mirror, e.g. a dedicated image CDN) go through
/// [`get_url`](Self::get_url), which retries against the one host without
/// rotation.
pub struct Fetcher {
    client: reqwest::Client,
    pool: MirrorPool,
    retry: RetryConfig,
}

impl Fetcher {
    /// Build a fetcher from the configuration
    ///
    /// # Errors
    ///
    /// Returns [`Error::Network`] if the HTTP client cannot be constructed.
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.retry.request_timeout())
            .build()?;
        Ok(Self {
            client,
            pool: MirrorPool::new(config.mirrors.clone(), config.mirror.failure_threshold),
            retry: config.retry.clone(),
        })
    }

    /// The mirror pool backing this fetcher
    pub fn pool(&self) -> &MirrorPool {
        &self.pool
    }

    /// GET a mirror-relative path, failing over across the pool
    ///
    /// The attempt budget is `max_retries_per_domain * pool.len()`; each
    /// failed attempt records an outcome against the active domain (possibly
    /// rotating it) and sleeps the fixed backoff before the next attempt.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AllMirrorsExhausted`] once the budget is spent, or the
    /// first non-transient error encountered.
    pub async fn get_path(&self, path: &str, referer: Option<&str>) -> Result<Vec<u8>> {
        let budget = (self.retry.max_retries_per_domain as usize * self.pool.len()).max(1);
        for attempt in 1..=budget {
            let domain = self.pool.current_domain();
            let url = join_domain(&domain, path);
            match self.try_get(&url, referer).await {
                Ok(bytes) => {
                    self.pool.record_outcome(true);
                    return Ok(bytes);
                }
                Err(e) if e.is_retryable() => {
                    tracing::warn!(
                        %domain,
                        path,
                        attempt,
                        budget,
                        error = %e,
                        "mirror request failed"
                    );
                    self.pool.record_outcome(false);
                    if attempt < budget {
                        tokio::time::sleep(self.retry.backoff()).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Err(Error::AllMirrorsExhausted { attempts: budget })
    }

    /// GET an absolute URL with fixed-backoff retry, no mirror rotation
    pub async fn get_url(&self, url: &str, referer: Option<&str>) -> Result<Vec<u8>> {
        retry_with_backoff(self.retry.max_retries_per_domain, self.retry.backoff(), || {
            self.try_get(url, referer)
        })
        .await
    }

    async fn try_get(&self, url: &str, referer: Option<&str>) -> Result<Vec<u8>> {
        let mut request = self.client.get(url);
        if let Some(referer) = referer {
            request = request.header(reqwest::header::REFERER, referer);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::TransientFetch {
                status: status.as_u16(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// Join a configured mirror domain and a request path into a URL
///
/// Domains may be bare hosts (`img.example.com`) or carry an explicit scheme
/// (`http://127.0.0.1:9000` in tests).
fn join_domain(domain: &str, path: &str) -> String {
    let base = if domain.contains("://") {
        domain.trim_end_matches('/').to_string()
    } else {
        format!("https://{}", domain.trim_end_matches('/'))
    };
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::MirrorConfig;

    fn pool(domains: &[&str], threshold: u32) -> MirrorPool {
        MirrorPool::new(domains.iter().map(|s| s.to_string()).collect(), threshold)
    }

    #[test]
    fn rotates_after_threshold_consecutive_failures() {
        let pool = pool(&["a", "b", "c"], 2);
        assert_eq!(pool.current_domain(), "a");

        pool.record_outcome(false);
        assert_eq!(pool.current_domain(), "a");
        assert_eq!(pool.consecutive_failures(), 1);

        pool.record_outcome(false);
        assert_eq!(pool.current_domain(), "b");
        assert_eq!(pool.consecutive_failures(), 0);
    }

    #[test]
    fn success_resets_the_failure_counter() {
        let pool = pool(&["a", "b"], 2);
        pool.record_outcome(false);
        pool.record_outcome(true);
        pool.record_outcome(false);
        // Never two consecutive failures, so still on the first domain.
        assert_eq!(pool.current_domain(), "a");
    }

    #[test]
    fn rotation_is_circular() {
        let pool = pool(&["a", "b", "c"], 1);
        assert_eq!(pool.rotate(), "b");
        assert_eq!(pool.rotate(), "c");
        assert_eq!(pool.rotate(), "a");
    }

    #[test]
    fn join_domain_handles_schemes_and_slashes() {
        assert_eq!(
            join_domain("img.example.com", "/comic/1.jpg"),
            "https://img.example.com/comic/1.jpg"
        );
        assert_eq!(
            join_domain("http://127.0.0.1:9000/", "comic/1.jpg"),
            "http://127.0.0.1:9000/comic/1.jpg"
        );
    }

    #[tokio::test]
    async fn budget_exhaustion_counts_every_attempt() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let mirror_a = MockServer::start().await;
        let mirror_b = MockServer::start().await;
        for server in [&mirror_a, &mirror_b] {
            Mock::given(method("GET"))
                .and(path("/page/0001.jpg"))
                .respond_with(ResponseTemplate::new(503))
                .expect(3)
                .mount(server)
                .await;
        }

        // Threshold equals the per-domain retry count, so the budget of 6
        // lands as exactly 3 attempts per mirror.
        let config = Config {
            mirrors: vec![mirror_a.uri(), mirror_b.uri()],
            retry: RetryConfig {
                max_retries_per_domain: 3,
                backoff_ms: 1,
                request_timeout_secs: 5,
            },
            mirror: MirrorConfig {
                failure_threshold: 3,
            },
            ..Config::default()
        };
        let fetcher = Fetcher::new(&config).unwrap();

        let err = fetcher.get_path("/page/0001.jpg", None).await.unwrap_err();
        assert!(matches!(err, Error::AllMirrorsExhausted { attempts: 6 }));
    }

    #[tokio::test]
    async fn failover_reaches_the_healthy_mirror() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let down = MockServer::start().await;
        let up = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&down)
            .await;
        Mock::given(method("GET"))
            .and(path("/page/0001.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
            .mount(&up)
            .await;

        let config = Config {
            mirrors: vec![down.uri(), up.uri()],
            retry: RetryConfig {
                max_retries_per_domain: 3,
                backoff_ms: 1,
                request_timeout_secs: 5,
            },
            mirror: MirrorConfig {
                failure_threshold: 2,
            },
            ..Config::default()
        };
        let fetcher = Fetcher::new(&config).unwrap();

        let bytes = fetcher.get_path("/page/0001.jpg", None).await.unwrap();
        assert_eq!(bytes, b"ok");
        assert_eq!(fetcher.pool().consecutive_failures(), 0);
    }
}
