//! Authenticated HTTP client with rate-limit compliance, structured
//! retries, and adaptive throttling from server feedback

use std::time::Duration;

use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::config::{ClientConfig, API_REVISION};
use super::ratelimit::RateLimiter;
use crate::domain::error::{AuditError, Result};

/// "Expected available in N seconds" in a 429 error detail
static RETRY_DETAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+) seconds?").expect("retry detail regex is valid"));

/// Per-call retry behavior
#[derive(Debug, Clone, Copy)]
pub struct RequestPolicy {
    pub retry_on_429: bool,
    pub max_retries: usize,
}

impl Default for RequestPolicy {
    fn default() -> Self {
        Self {
            retry_on_429: true,
            max_retries: 3,
        }
    }
}

impl RequestPolicy {
    /// Policy that fails fast on any retryable status
    pub fn no_retry() -> Self {
        Self {
            retry_on_429: false,
            max_retries: 0,
        }
    }
}

/// The provider's remaining/limit/reset trio plus optional Retry-After
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerHints {
    pub limit: Option<u64>,
    pub remaining: Option<u64>,
    pub reset: Option<u64>,
    pub retry_after: Option<u64>,
}

impl ServerHints {
    fn from_headers(headers: &HeaderMap) -> Self {
        fn parse(headers: &HeaderMap, name: &str) -> Option<u64> {
            headers.get(name)?.to_str().ok()?.trim().parse().ok()
        }

        Self {
            limit: parse(headers, "RateLimit-Limit"),
            remaining: parse(headers, "RateLimit-Remaining"),
            reset: parse(headers, "RateLimit-Reset"),
            retry_after: parse(headers, "Retry-After"),
        }
    }
}

/// HTTP client for the provider API.
///
/// Owns the rate limiter for its lifetime; endpoint services hold a shared
/// reference to the client and never open their own connections. The API
/// key is written into a sensitive header at construction and appears in no
/// log, error, or Debug output.
pub struct KlaviyoClient {
    http: reqwest::Client,
    config: ClientConfig,
    rate_limiter: RateLimiter,
    /// Tier cap the adaptive logic restores toward
    configured_rpm: u32,
    cancellation: CancellationToken,
}

impl std::fmt::Debug for KlaviyoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KlaviyoClient")
            .field("config", &self.config)
            .field("rate_limiter", &self.rate_limiter)
            .finish()
    }
}

impl KlaviyoClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_cancellation(config, CancellationToken::new())
    }

    /// Create a client whose in-flight requests and retry sleeps abort when
    /// the token is cancelled.
    pub fn with_cancellation(config: ClientConfig, cancellation: CancellationToken) -> Result<Self> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Klaviyo-API-Key {}", config.api_key))
            .map_err(|_| AuditError::config("API key contains invalid header characters"))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert("revision", HeaderValue::from_static(API_REVISION));
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.api+json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| AuditError::config(format!("failed to build HTTP client: {e}")))?;

        let (rps, rpm) = config.rate_tier.effective();

        Ok(Self {
            http,
            rate_limiter: RateLimiter::new(rps, rpm),
            configured_rpm: rpm,
            config,
            cancellation,
        })
    }

    /// The limiter this client paces through (shared by every service)
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// GET with optional query parameters
    pub async fn get(&self, path: &str, query: Option<&[(&str, String)]>) -> Result<Value> {
        self.request(Method::GET, path, query, None, RequestPolicy::default())
            .await
    }

    /// POST a JSON body
    pub async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.request(
            Method::POST,
            path,
            None,
            Some(body),
            RequestPolicy::default(),
        )
        .await
    }

    /// Issue one API call with rate-limit compliance and structured retries.
    ///
    /// 400s are never retried; 429s honor the server's advertised delay;
    /// 5xx and transport failures back off briefly. The limiter is
    /// re-acquired before every retry.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: Option<&[(&str, String)]>,
        body: Option<&Value>,
        policy: RequestPolicy,
    ) -> Result<Value> {
        let url = self.build_url(path)?;
        self.acquire().await?;

        let mut attempt: usize = 0;
        loop {
            let mut builder = self.http.request(method.clone(), url.clone());
            if let Some(query) = query {
                builder = builder.query(query);
            }
            if let Some(body) = body {
                builder = builder.json(body);
            }

            debug!(%method, path, attempt, "issuing provider request");

            let outcome = tokio::select! {
                _ = self.cancellation.cancelled() => return Err(AuditError::Cancelled),
                outcome = builder.send() => outcome,
            };

            match outcome {
                Ok(response) => {
                    let status = response.status();
                    let hints = ServerHints::from_headers(response.headers());

                    if status != StatusCode::TOO_MANY_REQUESTS {
                        self.adapt_to_hints(&hints).await;
                    }

                    if status.is_success() {
                        return response.json::<Value>().await.map_err(|e| {
                            error!(path, "failed to decode response body: {e}");
                            AuditError::Transport(e.to_string())
                        });
                    }

                    if status == StatusCode::BAD_REQUEST {
                        let details = response.json::<Value>().await.ok();
                        let message = error_detail(details.as_ref())
                            .unwrap_or_else(|| "bad request".to_string());
                        debug!(path, "400 from provider, not retrying");
                        return Err(AuditError::BadRequest { message, details });
                    }

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        let body = response.json::<Value>().await.ok();
                        if policy.retry_on_429 && attempt < policy.max_retries {
                            let delay = hints
                                .retry_after
                                .map(|s| Duration::from_secs(s))
                                .or_else(|| retry_after_from_body(body.as_ref()))
                                .unwrap_or_else(|| backoff_with_jitter(attempt));
                            warn!(
                                path,
                                delay_secs = delay.as_secs_f64(),
                                attempt = attempt + 1,
                                max_retries = policy.max_retries,
                                "rate limited (429), waiting before retry"
                            );
                            self.sleep_cancellable(delay).await?;
                            self.acquire().await?;
                            attempt += 1;
                            continue;
                        }
                        return Err(AuditError::RateLimited {
                            attempts: attempt + 1,
                            retry_after: hints.retry_after.map(Duration::from_secs),
                        });
                    }

                    if status.is_server_error() {
                        if attempt < policy.max_retries {
                            let delay = Duration::from_secs((1u64 << attempt.min(6)).min(5));
                            warn!(
                                path,
                                status = status.as_u16(),
                                delay_secs = delay.as_secs(),
                                "server error, retrying"
                            );
                            self.sleep_cancellable(delay).await?;
                            self.acquire().await?;
                            attempt += 1;
                            continue;
                        }
                        return Err(AuditError::ServerError {
                            status: status.as_u16(),
                            attempts: attempt + 1,
                        });
                    }

                    // Remaining 4xx (401, 403, 404, ...): not retryable
                    let details = response.json::<Value>().await.ok();
                    let message = error_detail(details.as_ref())
                        .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());
                    return Err(AuditError::Api {
                        status: status.as_u16(),
                        message,
                    });
                }
                Err(e) => {
                    // Connect errors and timeouts are treated like 5xx
                    if attempt < policy.max_retries {
                        let delay = Duration::from_secs((1u64 << attempt.min(6)).min(5));
                        warn!(path, delay_secs = delay.as_secs(), "transport error ({e}), retrying");
                        self.sleep_cancellable(delay).await?;
                        self.acquire().await?;
                        attempt += 1;
                        continue;
                    }
                    return Err(AuditError::Transport(e.to_string()));
                }
            }
        }
    }

    /// Reduce the per-minute cap when quota runs low, restore toward the
    /// tier cap when the provider reports plenty of headroom.
    async fn adapt_to_hints(&self, hints: &ServerHints) {
        let (Some(limit), Some(remaining)) = (hints.limit, hints.remaining) else {
            return;
        };
        if limit == 0 {
            return;
        }

        if (remaining as f64) < limit as f64 * 0.2 {
            let reduced = ((limit as f64 * 0.5) as u32).max(remaining as u32).max(1);
            debug!(
                remaining,
                limit, reduced, "rate limit low, reducing per-minute cap"
            );
            self.rate_limiter.set_requests_per_minute(reduced).await;
        } else if (remaining as f64) > limit as f64 * 0.5 {
            let current = self.rate_limiter.requests_per_minute().await;
            if current < self.configured_rpm {
                debug!(
                    restored = self.configured_rpm,
                    "rate limit healthy, restoring per-minute cap"
                );
                self.rate_limiter
                    .set_requests_per_minute(self.configured_rpm)
                    .await;
            }
        }
    }

    async fn acquire(&self) -> Result<()> {
        tokio::select! {
            _ = self.cancellation.cancelled() => Err(AuditError::Cancelled),
            _ = self.rate_limiter.acquire() => Ok(()),
        }
    }

    async fn sleep_cancellable(&self, delay: Duration) -> Result<()> {
        tokio::select! {
            _ = self.cancellation.cancelled() => Err(AuditError::Cancelled),
            _ = sleep(delay) => Ok(()),
        }
    }

    fn build_url(&self, path: &str) -> Result<url::Url> {
        let joined = format!(
            "{}/{}",
            self.config.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        url::Url::parse(&joined).map_err(|e| AuditError::config(format!("invalid path {path}: {e}")))
    }
}

/// First error detail/title from a JSON:API error body
fn error_detail(body: Option<&Value>) -> Option<String> {
    let first = body?.get("errors")?.get(0)?;
    first
        .get("detail")
        .or_else(|| first.get("title"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Retry delay advertised inside a 429 body: `errors[0].meta.retry_after`,
/// falling back to "Expected available in N seconds" in the detail text.
fn retry_after_from_body(body: Option<&Value>) -> Option<Duration> {
    let first = body?.get("errors")?.get(0)?;

    if let Some(meta) = first.get("meta").and_then(|m| m.get("retry_after")) {
        if let Some(secs) = meta.as_u64() {
            return Some(Duration::from_secs(secs));
        }
        if let Some(secs) = meta.as_str().and_then(|s| s.trim().parse::<u64>().ok()) {
            return Some(Duration::from_secs(secs));
        }
    }

    let detail = first.get("detail").and_then(Value::as_str)?;
    if detail.contains("Expected available in") {
        let captures = RETRY_DETAIL_RE.captures(detail)?;
        let secs = captures.get(1)?.as_str().parse::<u64>().ok()?;
        return Some(Duration::from_secs(secs));
    }
    None
}

/// `min(2^attempt, 10)` seconds plus 0.1-0.3s of jitter
fn backoff_with_jitter(attempt: usize) -> Duration {
    let base = (1u64 << attempt.min(6)).min(10) as f64;
    let jitter: f64 = rand::thread_rng().gen_range(0.1..0.3);
    Duration::from_secs_f64(base + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_retry_after_from_meta() {
        let body = json!({"errors": [{"meta": {"retry_after": 7}}]});
        assert_eq!(
            retry_after_from_body(Some(&body)),
            Some(Duration::from_secs(7))
        );

        let body = json!({"errors": [{"meta": {"retry_after": "12"}}]});
        assert_eq!(
            retry_after_from_body(Some(&body)),
            Some(Duration::from_secs(12))
        );
    }

    #[test]
    fn test_retry_after_from_detail() {
        let body = json!({
            "errors": [{"detail": "Rate limit exceeded. Expected available in 42 seconds."}]
        });
        assert_eq!(
            retry_after_from_body(Some(&body)),
            Some(Duration::from_secs(42))
        );
    }

    #[test]
    fn test_retry_after_absent() {
        let body = json!({"errors": [{"detail": "try later"}]});
        assert_eq!(retry_after_from_body(Some(&body)), None);
        assert_eq!(retry_after_from_body(None), None);
    }

    #[test]
    fn test_backoff_bounds() {
        for attempt in 0..8 {
            let backoff = backoff_with_jitter(attempt);
            assert!(backoff >= Duration::from_secs_f64(1.0));
            assert!(backoff <= Duration::from_secs_f64(10.31));
        }
    }

    #[test]
    fn test_error_detail_extraction() {
        let body = json!({"errors": [{"title": "Bad Request", "detail": "invalid filter"}]});
        assert_eq!(error_detail(Some(&body)), Some("invalid filter".to_string()));

        let body = json!({"errors": [{"title": "Bad Request"}]});
        assert_eq!(error_detail(Some(&body)), Some("Bad Request".to_string()));
    }

    #[test]
    fn test_debug_never_shows_key() {
        let client = KlaviyoClient::new(ClientConfig::new("pk_hidden")).unwrap();
        assert!(!format!("{client:?}").contains("pk_hidden"));
    }
}
