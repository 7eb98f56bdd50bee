//! LLM invocation with retry/backoff.
//!
//! All prompt engineering lives in [`crate::prompts`]; this module only
//! decides whether a failed call is worth repeating and how long to wait.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 errors from LLM APIs are transient and frequent under
//! load. Exponential backoff (`retry_backoff_ms * 2^(attempt-1)`) with a
//! 500 ms base and 3 attempts waits 500 ms → 1 s, and never after the final
//! attempt. Anything that does not look transient (auth failures, bad
//! requests, content filters) fails on the first attempt: repeating it only
//! burns quota.

use crate::config::DigitizerConfig;
use crate::error::DigitizerError;
use crate::ports::LanguageModel;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// Substrings (lowercase) that mark a provider error as transient.
const TRANSIENT_MARKERS: &[&str] = &["429", "too many requests", "503", "unavailable", "overloaded"];

/// Attempt budget and backoff base for one logical LLM call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl RetryPolicy {
    pub fn from_config(config: &DigitizerConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff_ms: config.retry_backoff_ms,
        }
    }

    /// Wait before attempt `attempt + 1`, given that `attempt` (1-based) failed.
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.backoff_ms.saturating_mul(factor))
    }
}

/// A successful completion and how many attempts it took.
#[derive(Debug, Clone, PartialEq)]
pub struct Generated {
    pub text: String,
    pub attempts: u32,
}

pub fn is_transient(error_text: &str) -> bool {
    let lower = error_text.to_lowercase();
    TRANSIENT_MARKERS.iter().any(|m| lower.contains(m))
}

/// Call `model` until it answers with non-empty text, a non-transient
/// error occurs, or the attempt budget is spent.
///
/// Errors:
/// - non-transient provider error → [`DigitizerError::StructuringTerminal`]
/// - transient errors (or empty answers) on every attempt →
///   [`DigitizerError::StructuringTransient`] with the attempt count
pub async fn generate_with_retry(
    model: &dyn LanguageModel,
    prompt: &str,
    policy: RetryPolicy,
) -> Result<Generated, DigitizerError> {
    let start = Instant::now();
    let mut last_err = String::from("no attempt made");

    for attempt in 1..=policy.max_attempts {
        match model.generate(prompt).await {
            Ok(text) if !text.trim().is_empty() => {
                debug!(
                    "LLM answered on attempt {}/{} ({} chars, {:?})",
                    attempt,
                    policy.max_attempts,
                    text.len(),
                    start.elapsed()
                );
                return Ok(Generated { text, attempts: attempt });
            }
            Ok(_) => {
                warn!("LLM attempt {}/{} returned empty content", attempt, policy.max_attempts);
                last_err = "empty response".to_string();
            }
            Err(e) => {
                let msg = e.to_string();
                if !is_transient(&msg) {
                    warn!("LLM attempt {} failed permanently: {}", attempt, msg);
                    return Err(DigitizerError::StructuringTerminal { detail: msg });
                }
                warn!("LLM attempt {}/{} failed: {}", attempt, policy.max_attempts, msg);
                last_err = msg;
            }
        }

        if attempt < policy.max_attempts {
            let backoff = policy.backoff_after(attempt);
            debug!("Retrying LLM call in {}ms", backoff.as_millis());
            sleep(backoff).await;
        }
    }

    Err(DigitizerError::StructuringTransient {
        attempts: policy.max_attempts,
        detail: last_err,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PortError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Plays back a fixed script of answers, then repeats the last one.
    struct ScriptedModel {
        script: Mutex<Vec<Result<String, PortError>>>,
        calls: AtomicU32,
    }

    impl ScriptedModel {
        fn new(script: Vec<Result<String, PortError>>) -> Self {
            Self {
                script: Mutex::new(script),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn generate(&self, _prompt: &str) -> Result<String, PortError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.remove(0)
            } else {
                script[0].clone()
            }
        }
    }

    fn fast() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            backoff_ms: 1,
        }
    }

    fn unavailable() -> Result<String, PortError> {
        Err(PortError::Request("HTTP 503 Service Unavailable".into()))
    }

    #[test]
    fn transient_markers() {
        assert!(is_transient("HTTP 429"));
        assert!(is_transient("Too Many Requests"));
        assert!(is_transient("model is OVERLOADED"));
        assert!(is_transient("service temporarily unavailable"));
        assert!(!is_transient("401 invalid api key"));
        assert!(!is_transient("content policy violation"));
    }

    #[test]
    fn backoff_doubles() {
        let p = RetryPolicy {
            max_attempts: 3,
            backoff_ms: 500,
        };
        assert_eq!(p.backoff_after(1), Duration::from_millis(500));
        assert_eq!(p.backoff_after(2), Duration::from_millis(1000));
    }

    #[test]
    fn policy_from_default_config() {
        let p = RetryPolicy::from_config(&DigitizerConfig::default());
        assert_eq!(p.max_attempts, 3);
        assert_eq!(p.backoff_ms, 500);
    }

    #[tokio::test]
    async fn two_503s_then_success_takes_three_attempts() {
        let model = ScriptedModel::new(vec![unavailable(), unavailable(), Ok("{}".into())]);
        let out = generate_with_retry(&model, "p", fast()).await.unwrap();
        assert_eq!(out.attempts, 3);
        assert_eq!(model.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_transient_error_is_not_retried() {
        let model = ScriptedModel::new(vec![Err(PortError::Request("401 Unauthorized".into()))]);
        let err = generate_with_retry(&model, "p", fast()).await.unwrap_err();
        assert!(matches!(err, DigitizerError::StructuringTerminal { .. }), "got {err:?}");
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_transient_reports_attempts() {
        let model = ScriptedModel::new(vec![Err(PortError::Request("429 too many requests".into()))]);
        let err = generate_with_retry(&model, "p", fast()).await.unwrap_err();
        match err {
            DigitizerError::StructuringTransient { attempts, detail } => {
                assert_eq!(attempts, 3);
                assert!(detail.contains("429"));
            }
            other => panic!("expected StructuringTransient, got {other:?}"),
        }
        assert_eq!(model.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn empty_content_is_transient() {
        let model = ScriptedModel::new(vec![Ok("   ".into()), Ok("{\"menuItems\":[]}".into())]);
        let out = generate_with_retry(&model, "p", fast()).await.unwrap();
        assert_eq!(out.attempts, 2);
    }
}
