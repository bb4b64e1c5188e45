use std::time::Duration;

use reqwest::{RequestBuilder, Response};

use crate::error::{AiError, Result};

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 200,
            max_delay_ms: 5_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// No retries at all; every failure is returned to the caller.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn delay_for(&self, attempt: u32, retry_after_secs: Option<u64>) -> Duration {
        if let Some(seconds) = retry_after_secs {
            return Duration::from_secs(seconds);
        }

        let multiplier = self
            .backoff_multiplier
            .powi(attempt.saturating_sub(1) as i32);
        let delay = (self.initial_delay_ms as f64 * multiplier) as u64;
        Duration::from_millis(delay.min(self.max_delay_ms))
    }
}

pub fn parse_retry_after(response: &Response) -> Option<u64> {
    response
        .headers()
        .get("retry-after")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok())
}

pub async fn response_to_error(response: Response, service: &str) -> AiError {
    let status = response.status().as_u16();
    let retry_after = parse_retry_after(&response);
    let body = response.text().await.unwrap_or_default();

    // Truncate error body to prevent leaking large or sensitive responses.
    const MAX_ERROR_BODY: usize = 512;
    let message = if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}... [truncated]", &body[..cut])
    } else {
        body
    };

    AiError::ServiceHttp {
        service: service.to_string(),
        status,
        message,
        retry_after_secs: retry_after,
    }
}

/// Send a request, retrying connection failures, 429 and 5xx responses.
///
/// `build` is invoked once per attempt since a sent `RequestBuilder` is consumed.
pub(crate) async fn send_with_retry<F>(
    config: &RetryConfig,
    service: &str,
    build: F,
) -> Result<Response>
where
    F: Fn() -> RequestBuilder,
{
    let mut attempt = 0;
    loop {
        let error = match build().send().await {
            Ok(response) if response.status().is_success() => return Ok(response),
            Ok(response) => response_to_error(response, service).await,
            Err(err) => AiError::Http(err),
        };

        if !error.is_retryable() || attempt >= config.max_retries {
            return Err(error);
        }

        attempt += 1;
        let retry_after = match &error {
            AiError::ServiceHttp {
                retry_after_secs, ..
            } => *retry_after_secs,
            _ => None,
        };
        let delay = config.delay_for(attempt, retry_after);
        tracing::warn!(
            service,
            attempt,
            delay_ms = delay.as_millis(),
            "Retrying request after error: {}",
            error
        );
        tokio::time::sleep(delay).await;
    }
}
