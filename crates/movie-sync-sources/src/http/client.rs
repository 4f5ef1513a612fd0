use crate::error::{SourceError, SourceResult};
use crate::http::{HttpRequest, HttpResponse, HttpTransport, Method};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const HTTP_TOO_MANY_REQUESTS: u16 = 429;

/// Bounds for transparently retrying rate-limited requests
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Maximum cumulative time spent waiting on `Retry-After`
    pub max_total_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            max_total_wait: Duration::from_secs(300),
        }
    }
}

/// Per-call request options
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl RequestOptions {
    pub fn get() -> Self {
        Self {
            method: Method::Get,
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn post(body: Value) -> Self {
        Self {
            method: Method::Post,
            body: Some(body),
            ..Self::get()
        }
    }

    pub fn query(mut self, name: &str, value: impl ToString) -> Self {
        self.query.push((name.to_string(), value.to_string()));
        self
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn bearer(self, token: &str) -> Self {
        self.header("Authorization", format!("Bearer {}", token))
    }
}

/// HTTP client bound to one service's API base
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    transport: Arc<dyn HttpTransport>,
    language: String,
    service_headers: Vec<(String, String)>,
    retry: RetryPolicy,
}

impl ApiClient {
    pub fn new(base_url: &str, transport: Arc<dyn HttpTransport>, language: &str) -> Self {
        let base_url = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };

        Self {
            base_url,
            transport,
            language: language.to_string(),
            service_headers: Vec::new(),
            retry: RetryPolicy::default(),
        }
    }

    /// Header sent with every request to this service
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.service_headers.push((name.to_string(), value.into()));
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn url(&self, path: &str, query: &[(String, String)]) -> String {
        let mut url = format!("{}{}", self.base_url, path.trim_start_matches('/'));
        if !query.is_empty() {
            let encoded: Vec<String> = query
                .iter()
                .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                .collect();
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str(&encoded.join("&"));
        }
        url
    }

    fn build_request(&self, path: &str, options: RequestOptions) -> HttpRequest {
        let base = [
            ("Content-Type".to_string(), "application/json".to_string()),
            ("Accept-Language".to_string(), self.language.clone()),
        ];

        let mut headers: Vec<(String, String)> = Vec::new();
        for (name, value) in base
            .into_iter()
            .chain(self.service_headers.iter().cloned())
            .chain(options.headers)
        {
            headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
            headers.push((name, value));
        }

        HttpRequest {
            method: options.method,
            url: self.url(path, &options.query),
            headers,
            body: options.body.map(|b| b.to_string()),
        }
    }

    /// Send a request, waiting out rate limits within the retry policy.
    ///
    /// The response is returned whatever its status, except for rate-limited
    /// responses, which are never seen by the caller.
    pub async fn request(&self, path: &str, options: RequestOptions) -> SourceResult<HttpResponse> {
        let request = self.build_request(path, options);
        let mut attempts = 0u32;
        let mut waited = Duration::ZERO;

        loop {
            debug!("{} {}", request.method.as_str(), request.url);
            let response = self.transport.send(request.clone()).await?;
            attempts += 1;

            let Some(delay) = rate_limit_delay(&response) else {
                return Ok(response);
            };

            if attempts >= self.retry.max_attempts || delay > self.retry.max_total_wait.saturating_sub(waited) {
                return Err(SourceError::RateLimitExhausted {
                    attempts,
                    waited_secs: waited.as_secs(),
                });
            }

            debug!(
                "Hit request rate limit {}; will retry in {} seconds",
                rate_limit_name(&response).unwrap_or_else(|| "unknown".to_string()),
                delay.as_secs_f64()
            );
            tokio::time::sleep(delay).await;
            waited += delay;
        }
    }
}

/// How long to wait before retrying, when `response` is a retryable rate limit
fn rate_limit_delay(response: &HttpResponse) -> Option<Duration> {
    if response.status != HTTP_TOO_MANY_REQUESTS || response.header("X-Ratelimit").is_none() {
        return None;
    }

    let secs: f64 = response.header("Retry-After")?.trim().parse().ok()?;
    if secs.is_nan() || secs < 0.0 {
        return None;
    }
    // Too large to represent is still a rate limit, just one we will never wait out
    Some(Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX))
}

fn rate_limit_name(response: &HttpResponse) -> Option<String> {
    let descriptor: Value = serde_json::from_str(response.header("X-Ratelimit")?).ok()?;
    descriptor.get("name")?.as_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::ScriptedTransport;
    use serde_json::json;

    fn rate_limited(retry_after: &str) -> HttpResponse {
        HttpResponse::with_status(429)
            .with_header("X-Ratelimit", r#"{"name":"UNAUTHED_API_GET_LIMIT"}"#)
            .with_header("Retry-After", retry_after)
    }

    #[test]
    fn test_headers_layer_with_caller_winning() {
        let transport = Arc::new(ScriptedTransport::new(|_| HttpResponse::ok_json(json!({}))));
        let client = ApiClient::new("https://api.example.com", transport, "fr")
            .with_header("trakt-api-key", "id")
            .with_header("Accept-Language", "de");

        let request = client.build_request(
            "sync/history",
            RequestOptions::get()
                .header("content-type", "text/plain")
                .bearer("tok"),
        );

        assert_eq!(request.url, "https://api.example.com/sync/history");
        assert_eq!(request.header("Content-Type"), Some("text/plain"));
        assert_eq!(request.header("Accept-Language"), Some("de"));
        assert_eq!(request.header("trakt-api-key"), Some("id"));
        assert_eq!(request.header("Authorization"), Some("Bearer tok"));
        assert_eq!(
            request
                .headers
                .iter()
                .filter(|(k, _)| k.eq_ignore_ascii_case("content-type"))
                .count(),
            1
        );
    }

    #[test]
    fn test_query_is_encoded() {
        let transport = Arc::new(ScriptedTransport::new(|_| HttpResponse::ok_json(json!({}))));
        let client = ApiClient::new("https://api.trakt.tv/", transport, "en");

        let url = client.url(
            "search/movie",
            &[("query".to_string(), "Amélie & co".to_string())],
        );
        assert_eq!(url, "https://api.trakt.tv/search/movie?query=Am%C3%A9lie%20%26%20co");
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_is_retried_transparently() {
        let transport = Arc::new(ScriptedTransport::sequence(vec![
            rate_limited("2"),
            HttpResponse::ok_json(json!({"ok": true})),
        ]));
        let client = ApiClient::new("https://api.trakt.tv", transport.clone(), "en");

        let started = tokio::time::Instant::now();
        let response = client.request("users/me", RequestOptions::get()).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(transport.request_count(), 2);
        assert!(started.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_retry_is_bounded() {
        let transport = Arc::new(ScriptedTransport::new(|_| rate_limited("1")));
        let client = ApiClient::new("https://api.trakt.tv", transport.clone(), "en")
            .with_retry_policy(RetryPolicy {
                max_attempts: 3,
                max_total_wait: Duration::from_secs(60),
            });

        let err = client.request("users/me", RequestOptions::get()).await.unwrap_err();

        assert!(matches!(err, SourceError::RateLimitExhausted { attempts: 3, .. }));
        assert_eq!(transport.request_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_wait_budget_is_bounded() {
        let transport = Arc::new(ScriptedTransport::new(|_| rate_limited("30")));
        let client = ApiClient::new("https://api.trakt.tv", transport.clone(), "en")
            .with_retry_policy(RetryPolicy {
                max_attempts: 10,
                max_total_wait: Duration::from_secs(45),
            });

        let err = client.request("users/me", RequestOptions::get()).await.unwrap_err();

        assert!(matches!(
            err,
            SourceError::RateLimitExhausted { attempts: 2, waited_secs: 30 }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_retry_after_exhausts_without_waiting() {
        let transport = Arc::new(ScriptedTransport::sequence(vec![
            rate_limited("1e30"),
            HttpResponse::ok_json(json!({})),
        ]));
        let client = ApiClient::new("https://api.trakt.tv", transport.clone(), "en");

        let started = tokio::time::Instant::now();
        let err = client.request("users/me", RequestOptions::get()).await.unwrap_err();

        assert!(matches!(
            err,
            SourceError::RateLimitExhausted { attempts: 1, waited_secs: 0 }
        ));
        assert_eq!(transport.request_count(), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_infinite_retry_after_is_exhausted() {
        let transport = Arc::new(ScriptedTransport::new(|_| rate_limited("inf")));
        let client = ApiClient::new("https://api.trakt.tv", transport.clone(), "en");

        let err = client.request("users/me", RequestOptions::get()).await.unwrap_err();

        assert!(matches!(err, SourceError::RateLimitExhausted { attempts: 1, .. }));
    }

    #[tokio::test]
    async fn test_429_without_descriptor_is_returned() {
        let transport = Arc::new(ScriptedTransport::new(|_| {
            HttpResponse::with_status(429).with_header("Retry-After", "1")
        }));
        let client = ApiClient::new("https://api.trakt.tv", transport.clone(), "en");

        let response = client.request("users/me", RequestOptions::get()).await.unwrap();

        assert_eq!(response.status, 429);
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_post_body_is_serialized() {
        let transport = Arc::new(ScriptedTransport::new(|_| HttpResponse::ok_json(json!({}))));
        let client = ApiClient::new("https://api.trakt.tv", transport.clone(), "en");

        client
            .request("oauth/device/code", RequestOptions::post(json!({"client_id": "abc"})))
            .await
            .unwrap();

        let sent = transport.requests();
        assert_eq!(sent[0].method, Method::Post);
        let body: Value = serde_json::from_str(sent[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(body["client_id"], "abc");
    }
}
