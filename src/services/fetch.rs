//! Resilient HTTP retrieval.
//!
//! One GET with a deadline, failure classification and exponential backoff.
//! Timeouts, connect failures and 5xx responses are transient and retried;
//! any 4xx fails immediately with the server body as diagnostic. The fetcher
//! holds no state between calls.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use tokio::time::sleep;
use url::Url;

use crate::config::Config;
use crate::error::{FetchError, IngestError};

/// First retry delay; doubles per attempt up to [`MAX_BACKOFF_MS`].
const INITIAL_BACKOFF_MS: u64 = 1_000;
const MAX_BACKOFF_MS: u64 = 5_000;

/// How much of an error body is kept as diagnostic.
const BODY_EXCERPT_LEN: usize = 200;

/// Per-call knobs. [`Default`] matches the standard retry policy.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub headers: Vec<(String, String)>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            max_retries: 3,
            initial_backoff_ms: INITIAL_BACKOFF_MS,
            headers: Vec::new(),
        }
    }
}

/// GET with timeout/retry/backoff. Shared by the M3U, Xtream and EPG paths.
#[derive(Clone)]
pub struct ResilientFetcher {
    client: Client,
    defaults: FetchOptions,
}

impl ResilientFetcher {
    pub fn new(config: &Config) -> Self {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .gzip(true)
            // Many IPTV panels run self-signed certs
            .danger_accept_invalid_certs(true)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            defaults: FetchOptions {
                timeout_ms: config.fetch_timeout_ms,
                max_retries: config.max_retries,
                ..FetchOptions::default()
            },
        }
    }

    /// Fetch the full response body as text using the default options.
    pub async fn fetch_text(&self, url: &str) -> Result<String, IngestError> {
        let options = self.defaults.clone();
        self.fetch_text_with(url, &options).await
    }

    /// Fetch text with explicit per-call options.
    pub async fn fetch_text_with(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> Result<String, IngestError> {
        let url = Url::parse(url)
            .map_err(|e| IngestError::Validation(format!("malformed url {url:?}: {e}")))?;

        let mut attempts = 0u32;
        loop {
            match self.attempt(&url, options).await {
                Ok(body) => return Ok(body),
                Err(err) if err.is_retryable() && attempts < options.max_retries => {
                    let backoff_ms = options
                        .initial_backoff_ms
                        .saturating_mul(1u64 << attempts.min(16))
                        .min(MAX_BACKOFF_MS);
                    attempts += 1;
                    tracing::warn!(
                        url = %url,
                        attempt = attempts,
                        backoff_ms,
                        error = %err,
                        "transient fetch failure, retrying"
                    );
                    sleep(Duration::from_millis(backoff_ms)).await;
                }
                Err(err) if err.is_retryable() => {
                    return Err(FetchError::RetriesExhausted {
                        attempts: attempts + 1,
                        source: Box::new(err),
                    }
                    .into());
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Fetch and JSON-decode the response body.
    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, IngestError> {
        let options = self.defaults.clone();
        self.fetch_json_with(url, &options).await
    }

    /// Fetch and JSON-decode with explicit per-call options.
    pub async fn fetch_json_with<T: DeserializeOwned>(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> Result<T, IngestError> {
        let text = self.fetch_text_with(url, options).await?;
        serde_json::from_str(&text).map_err(|e| IngestError::parse("json response", e.to_string()))
    }

    /// One request/response cycle with failure classification.
    async fn attempt(&self, url: &Url, options: &FetchOptions) -> Result<String, FetchError> {
        let mut request = self
            .client
            .get(url.clone())
            .timeout(Duration::from_millis(options.timeout_ms));
        for (name, value) in &options.headers {
            request = request.header(name, value);
        }

        let response = request.send().await.map_err(classify_send_error)?;
        let status = response.status();

        if status.is_success() {
            return response.text().await.map_err(classify_send_error);
        }

        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                body: excerpt(&body),
            });
        }

        // 5xx and anything else unexpected is worth another attempt
        Err(FetchError::Unreachable(format!(
            "HTTP {}",
            status.as_u16()
        )))
    }
}

fn classify_send_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Unreachable(err.to_string())
    }
}

fn excerpt(body: &str) -> String {
    body.chars().take(BODY_EXCERPT_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> ResilientFetcher {
        ResilientFetcher {
            client: Client::new(),
            defaults: FetchOptions::default(),
        }
    }

    fn fast_options(max_retries: u32) -> FetchOptions {
        FetchOptions {
            timeout_ms: 2_000,
            max_retries,
            initial_backoff_ms: 10,
            headers: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_success_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/playlist.m3u"))
            .respond_with(ResponseTemplate::new(200).set_body_string("#EXTM3U"))
            .mount(&server)
            .await;

        let body = fetcher()
            .fetch_text_with(&format!("{}/playlist.m3u", server.uri()), &fast_options(3))
            .await
            .unwrap();
        assert_eq!(body, "#EXTM3U");
    }

    #[tokio::test]
    async fn test_two_transients_then_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .with_priority(2)
            .mount(&server)
            .await;

        let body = fetcher()
            .fetch_text_with(&server.uri(), &fast_options(3))
            .await
            .unwrap();
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn test_404_fails_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("gone"))
            .expect(1)
            .mount(&server)
            .await;

        let err = fetcher()
            .fetch_text_with(&server.uri(), &fast_options(3))
            .await
            .unwrap_err();
        match err {
            IngestError::Transport(FetchError::HttpStatus { status, body }) => {
                assert_eq!(status, 404);
                assert_eq!(body, "gone");
            }
            other => panic!("expected HttpStatus, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_retries_exhausted_wraps_last_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let err = fetcher()
            .fetch_text_with(&server.uri(), &fast_options(1))
            .await
            .unwrap_err();
        match err {
            IngestError::Transport(FetchError::RetriesExhausted { attempts, source }) => {
                assert_eq!(attempts, 2);
                assert!(matches!(*source, FetchError::Unreachable(_)));
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_url_is_validation_error() {
        let err = fetcher().fetch_text("not a url").await.unwrap_err();
        assert!(matches!(err, IngestError::Validation(_)));
    }

    #[tokio::test]
    async fn test_fetch_json_decodes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"value": 7}"#))
            .mount(&server)
            .await;

        #[derive(serde::Deserialize)]
        struct Payload {
            value: i32,
        }

        let payload: Payload = fetcher()
            .fetch_json_with(&server.uri(), &fast_options(0))
            .await
            .unwrap();
        assert_eq!(payload.value, 7);
    }

    #[tokio::test]
    async fn test_fetch_json_bad_body_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = fetcher()
            .fetch_json_with::<serde_json::Value>(&server.uri(), &fast_options(0))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Parse { .. }));
    }
}
