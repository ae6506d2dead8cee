//! Backoff policy for retryable provider failures.

use std::time::Duration;

use reqwest::Response;

use crate::error::AiError;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(8),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// No retries at all; the first failure is final.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before the given attempt (1-based). A server-provided
    /// `Retry-After` overrides the computed backoff.
    pub fn delay_for(&self, attempt: u32, retry_after_secs: Option<u64>) -> Duration {
        if let Some(seconds) = retry_after_secs {
            return Duration::from_secs(seconds);
        }

        let factor = self.multiplier.powi(attempt.saturating_sub(1) as i32);
        self.initial_delay.mul_f64(factor).min(self.max_delay)
    }
}

pub fn parse_retry_after(response: &Response) -> Option<u64> {
    response
        .headers()
        .get("retry-after")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok())
}

/// Convert a non-success response into a structured provider error.
pub async fn response_to_error(response: Response, provider: &str) -> AiError {
    let status = response.status().as_u16();
    let retry_after_secs = parse_retry_after(&response);
    let body = response.text().await.unwrap_or_default();

    // Truncate error bodies to keep logs sane.
    const MAX_ERROR_BODY: usize = 512;
    let message = if body.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated]", &body[..end])
    } else {
        body
    };

    AiError::LlmHttp {
        provider: provider.to_string(),
        status,
        message,
        retry_after_secs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_up_to_the_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1, None), Duration::from_millis(250));
        assert_eq!(policy.delay_for(2, None), Duration::from_millis(500));
        assert_eq!(policy.delay_for(3, None), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(4, None), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(7, None), Duration::from_secs(8));
    }

    #[test]
    fn retry_after_overrides_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(3, Some(12)), Duration::from_secs(12));
    }

    #[test]
    fn http_status_drives_retryability() {
        let retryable = AiError::LlmHttp {
            provider: "test".to_string(),
            status: 429,
            message: "rate limit".to_string(),
            retry_after_secs: None,
        };
        let non_retryable = AiError::LlmHttp {
            provider: "test".to_string(),
            status: 401,
            message: "unauthorized".to_string(),
            retry_after_secs: None,
        };
        assert!(retryable.is_retryable());
        assert!(!non_retryable.is_retryable());
    }

    #[test]
    fn string_errors_fall_back_to_keyword_matching() {
        assert!(AiError::Llm("rate limit exceeded".to_string()).is_retryable());
        assert!(!AiError::Llm("bad request".to_string()).is_retryable());
    }
}
