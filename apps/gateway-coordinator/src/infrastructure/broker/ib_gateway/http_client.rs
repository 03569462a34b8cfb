//! HTTP client wrapper with deadlines and retry logic.
//!
//! Every call carries an explicit deadline. Idempotent reads retry with
//! exponential backoff on transport errors and 408/429/5xx; writes are sent
//! exactly once.

use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::error::IbGatewayError;
use crate::application::services::{GatewaySettings, RetrySettings};

/// HTTP client for the IB gateway service.
#[derive(Debug, Clone)]
pub struct IbHttpClient {
    client: Client,
    base_url: String,
    request_timeout: Duration,
    retry: RetrySettings,
}

impl IbHttpClient {
    /// Create a client from gateway settings.
    pub fn new(settings: &GatewaySettings) -> Result<Self, IbGatewayError> {
        let base_url = settings.base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(IbGatewayError::InvalidSettings(
                "base_url must not be empty".to_string(),
            ));
        }

        let client = Client::builder()
            .build()
            .map_err(|e| IbGatewayError::InvalidSettings(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            request_timeout: settings.request_timeout(),
            retry: settings.retry.clone(),
        })
    }

    /// Idempotent GET with retries and the ordinary request timeout.
    pub async fn get<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, IbGatewayError> {
        self.request(
            Method::GET,
            operation,
            path,
            query,
            None::<&()>,
            self.request_timeout,
            true,
        )
        .await
    }

    /// Single-attempt GET with a caller-chosen deadline.
    pub async fn get_once<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
        deadline: Duration,
    ) -> Result<T, IbGatewayError> {
        self.request(Method::GET, operation, path, &[], None::<&()>, deadline, false)
            .await
    }

    /// POST, never retried. `deadline` defaults to the request timeout.
    #[allow(clippy::future_not_send)]
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        operation: &'static str,
        path: &str,
        body: &B,
        deadline: Option<Duration>,
    ) -> Result<T, IbGatewayError> {
        self.request(
            Method::POST,
            operation,
            path,
            &[],
            Some(body),
            deadline.unwrap_or(self.request_timeout),
            false,
        )
        .await
    }

    /// Internal request implementation.
    #[allow(clippy::future_not_send, clippy::too_many_arguments)]
    async fn request<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        operation: &'static str,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
        deadline: Duration,
        retry: bool,
    ) -> Result<T, IbGatewayError> {
        let url = format!("{}{path}", self.base_url);
        let mut backoff = ExponentialBackoff::new(&self.retry);
        let after_ms = u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX);

        loop {
            let mut request = self.client.request(method.clone(), &url).timeout(deadline);
            if !query.is_empty() {
                request = request.query(query);
            }
            if let Some(b) = body {
                request = request.json(b);
            }

            let sent = tokio::time::timeout(deadline, request.send()).await;
            let response = match sent {
                Err(_) => return Err(IbGatewayError::Timeout { operation, after_ms }),
                Ok(Err(e)) if e.is_timeout() => {
                    return Err(IbGatewayError::Timeout { operation, after_ms });
                }
                Ok(Err(e)) => {
                    if retry && let Some(delay) = backoff.next_backoff() {
                        tracing::warn!(
                            operation,
                            error = %e,
                            delay_ms = delay.as_millis(),
                            attempt = backoff.attempt,
                            "Network error, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    if retry {
                        return Err(IbGatewayError::MaxRetriesExceeded {
                            attempts: backoff.attempt,
                            last_error: e.to_string(),
                        });
                    }
                    return Err(IbGatewayError::Network(e.to_string()));
                }
                Ok(Ok(resp)) => resp,
            };

            let status = response.status();

            if status.is_success() {
                let text = response
                    .text()
                    .await
                    .map_err(|e| IbGatewayError::Network(e.to_string()))?;
                let text = if text.trim().is_empty() { "null" } else { &text };
                return serde_json::from_str(text)
                    .map_err(|e| IbGatewayError::JsonParse(e.to_string()));
            }

            // Handle error response
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());

            let error_body = response.text().await.unwrap_or_default();
            let message = error_message(&error_body, status);

            match categorize_status(status) {
                ErrorCategory::RateLimited if retry => {
                    let delay = backoff
                        .next_backoff()
                        .map(|d| retry_after.map_or(d, Duration::from_secs));
                    if let Some(delay) = delay {
                        tracing::warn!(
                            operation,
                            delay_ms = delay.as_millis(),
                            "Rate limited, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(IbGatewayError::MaxRetriesExceeded {
                        attempts: backoff.attempt,
                        last_error: message,
                    });
                }
                ErrorCategory::Retryable if retry => {
                    if let Some(delay) = backoff.next_backoff() {
                        tracing::warn!(
                            operation,
                            status = status.as_u16(),
                            message = %message,
                            delay_ms = delay.as_millis(),
                            "Retryable error, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(IbGatewayError::MaxRetriesExceeded {
                        attempts: backoff.attempt,
                        last_error: message,
                    });
                }
                _ => {
                    return Err(IbGatewayError::Api {
                        status: status.as_u16(),
                        message,
                    });
                }
            }
        }
    }
}

/// Pull a message out of an error body (`detail`, `error` or `message`),
/// falling back to the raw text or the status reason.
fn error_message(body: &str, status: StatusCode) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        for key in ["detail", "error", "message"] {
            match map.get(key) {
                Some(Value::String(s)) => return s.clone(),
                Some(other) if !other.is_null() => return other.to_string(),
                _ => {}
            }
        }
    }
    if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.to_string()
    }
}

/// Error category for determining retry behavior.
enum ErrorCategory {
    RateLimited,
    Retryable,
    NonRetryable,
}

/// Categorize HTTP status code for retry handling.
const fn categorize_status(status: StatusCode) -> ErrorCategory {
    match status.as_u16() {
        429 => ErrorCategory::RateLimited,
        408 | 500 | 502 | 503 | 504 => ErrorCategory::Retryable,
        _ => ErrorCategory::NonRetryable,
    }
}

/// Exponential backoff calculator.
struct ExponentialBackoff {
    attempt: u32,
    max_attempts: u32,
    current_backoff: Duration,
    max_backoff: Duration,
    multiplier: f64,
}

impl ExponentialBackoff {
    const fn new(settings: &RetrySettings) -> Self {
        Self {
            attempt: 0,
            max_attempts: settings.max_attempts,
            current_backoff: settings.initial_backoff(),
            max_backoff: settings.max_backoff(),
            multiplier: settings.multiplier,
        }
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        self.attempt += 1;
        if self.attempt >= self.max_attempts {
            return None;
        }

        let backoff = self.current_backoff;
        self.current_backoff = Duration::from_secs_f64(
            (self.current_backoff.as_secs_f64() * self.multiplier)
                .min(self.max_backoff.as_secs_f64()),
        );

        Some(backoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categorize_rate_limited() {
        assert!(matches!(
            categorize_status(StatusCode::TOO_MANY_REQUESTS),
            ErrorCategory::RateLimited
        ));
    }

    #[test]
    fn categorize_retryable() {
        for status in [
            StatusCode::REQUEST_TIMEOUT,
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::BAD_GATEWAY,
            StatusCode::SERVICE_UNAVAILABLE,
            StatusCode::GATEWAY_TIMEOUT,
        ] {
            assert!(matches!(categorize_status(status), ErrorCategory::Retryable));
        }
    }

    #[test]
    fn categorize_non_retryable() {
        assert!(matches!(
            categorize_status(StatusCode::BAD_REQUEST),
            ErrorCategory::NonRetryable
        ));
        assert!(matches!(
            categorize_status(StatusCode::NOT_FOUND),
            ErrorCategory::NonRetryable
        ));
    }

    #[test]
    fn exponential_backoff_doubles_until_attempts_run_out() {
        let settings = RetrySettings {
            max_attempts: 4,
            initial_backoff_ms: 100,
            max_backoff_ms: 10_000,
            multiplier: 2.0,
        };
        let mut backoff = ExponentialBackoff::new(&settings);

        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(100)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(200)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(400)));
        assert!(backoff.next_backoff().is_none());
    }

    #[test]
    fn exponential_backoff_respects_max() {
        let settings = RetrySettings {
            max_attempts: 10,
            initial_backoff_ms: 1000,
            max_backoff_ms: 5000,
            multiplier: 10.0,
        };
        let mut backoff = ExponentialBackoff::new(&settings);

        backoff.next_backoff();
        assert_eq!(backoff.next_backoff(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn error_message_prefers_detail_field() {
        let msg = error_message(r#"{"detail": "not connected"}"#, StatusCode::BAD_REQUEST);
        assert_eq!(msg, "not connected");
        let msg = error_message("", StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(msg, "Service Unavailable");
        let msg = error_message("plain text", StatusCode::BAD_REQUEST);
        assert_eq!(msg, "plain text");
    }

    #[test]
    fn empty_base_url_is_rejected() {
        let settings = GatewaySettings::with_base_url("  ");
        assert!(matches!(
            IbHttpClient::new(&settings),
            Err(IbGatewayError::InvalidSettings(_))
        ));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let settings = GatewaySettings::with_base_url("http://gw:8000/");
        let client = IbHttpClient::new(&settings).unwrap();
        assert_eq!(client.base_url, "http://gw:8000");
    }
}
