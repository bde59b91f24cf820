//! HTTP transport with API-key injection and bounded, cancellable retry

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use tokio_util::sync::CancellationToken;

use crate::config::RetryPolicy;
use crate::error::TransportError;

/// Query parameter that carries the API key
pub const API_KEY_PARAM: &str = "apikey";

/// A GET request: base URL plus query parameters
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            query: Vec::new(),
        }
    }

    pub fn param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn param_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// Raw `Retry-After` header, if any
    pub retry_after: Option<String>,
    pub body: String,
}

impl HttpResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            retry_after: None,
            body: body.into(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            retry_after: None,
            body: String::new(),
        }
    }

    pub fn with_retry_after(mut self, value: impl Into<String>) -> Self {
        self.retry_after = Some(value.into());
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs exactly one HTTP exchange, no retry
#[async_trait]
pub trait HttpExchange: Send + Sync {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[async_trait]
impl<T: HttpExchange + ?Sized> HttpExchange for Arc<T> {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request).await
    }
}

/// Production exchange backed by `reqwest`
#[derive(Clone)]
pub struct ReqwestExchange {
    client: Client,
}

impl ReqwestExchange {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Io(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

fn map_reqwest_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Io(error.to_string())
    }
}

#[async_trait]
impl HttpExchange for ReqwestExchange {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let response = self
            .client
            .get(&request.url)
            .query(&request.query)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.map_err(map_reqwest_error)?;

        Ok(HttpResponse {
            status,
            retry_after,
            body,
        })
    }
}

/// Wraps an [`HttpExchange`] with API-key injection and retry.
///
/// Retries 429/502/503/504 responses and I/O or timeout failures, up to
/// `policy.max_retries` times. Once the budget is spent the last response or
/// error is returned as is.
pub struct RetryingTransport<E> {
    exchange: E,
    api_key: String,
    policy: RetryPolicy,
}

impl<E: HttpExchange> RetryingTransport<E> {
    pub fn new(exchange: E, api_key: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            exchange,
            api_key: api_key.into(),
            policy,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// The request for one attempt: a fresh copy with the key appended
    fn authorize(&self, request: &HttpRequest) -> HttpRequest {
        request.clone().param(API_KEY_PARAM, self.api_key.clone())
    }

    /// Backoff before the next attempt after a retryable response
    pub fn retry_delay(&self, retry_after: Option<&str>) -> Duration {
        match retry_after.map(|value| value.trim().parse::<u64>()) {
            Some(Ok(seconds)) => Duration::from_secs(seconds),
            Some(Err(_)) => {
                tracing::debug!(retry_after, "Malformed Retry-After, using default delay");
                self.policy.default_delay
            }
            None => self.policy.default_delay,
        }
    }

    /// Run one logical call.
    ///
    /// Cancelling `cancel` aborts an in-flight exchange or backoff sleep and
    /// yields [`TransportError::Cancelled`].
    pub async fn execute(
        &self,
        request: &HttpRequest,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse, TransportError> {
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(TransportError::Cancelled);
            }

            let authorized = self.authorize(request);
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!(url = %request.url, attempt, "Request cancelled in flight");
                    return Err(TransportError::Cancelled);
                }
                outcome = self.exchange.send(&authorized) => outcome,
            };

            let can_retry = attempt < self.policy.max_retries;
            let delay = match outcome {
                Ok(response) if can_retry && RetryPolicy::is_retryable_status(response.status) => {
                    let delay = self.retry_delay(response.retry_after.as_deref());
                    tracing::warn!(
                        url = %request.url,
                        status = response.status,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Retryable status, backing off"
                    );
                    delay
                }
                Ok(response) => return Ok(response),
                Err(e) if can_retry && e.is_transient() => {
                    let delay = self.policy.default_delay;
                    tracing::warn!(
                        url = %request.url,
                        error = %e,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Transport failure, backing off"
                    );
                    delay
                }
                Err(e) => {
                    tracing::debug!(url = %request.url, error = %e, attempt, "Giving up on request");
                    return Err(e);
                }
            };

            attempt += 1;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!(url = %request.url, attempt, "Backoff cancelled");
                    return Err(TransportError::Cancelled);
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
