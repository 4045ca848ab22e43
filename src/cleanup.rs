//! Best-effort AI-assisted prose cleanup. Every failure path keeps the
//! original text.

use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const API_KEY_ENV: &str = "WHS_AI_API_KEY";

pub const CLEANUP_INSTRUCTION: &str = "Remove website navigation, print links and accessibility \
notices from the following legal text. Do not change, shorten or reword the legal provisions \
themselves. Return only the cleaned text.";

pub trait TextCleaner {
    fn clean(&self, text: &str, instruction: &str) -> Result<String>;
}

#[derive(Serialize)]
struct CleanupRequest<'a> {
    model: &'a str,
    instruction: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct CleanupResponse {
    text: String,
}

/// Blocking client for a text-generation endpoint that accepts
/// `{"model", "instruction", "text"}` and answers `{"text"}`.
pub struct HttpTextCleaner {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl HttpTextCleaner {
    pub fn new(endpoint: &str, model: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build cleanup http client")?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: std::env::var(API_KEY_ENV)
                .ok()
                .filter(|value| !value.trim().is_empty()),
        })
    }
}

impl TextCleaner for HttpTextCleaner {
    fn clean(&self, text: &str, instruction: &str) -> Result<String> {
        let mut request = self.client.post(&self.endpoint).json(&CleanupRequest {
            model: &self.model,
            instruction,
            text,
        });
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .with_context(|| format!("cleanup request to {} failed", self.endpoint))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            bail!("cleanup service returned {}: {}", status.as_u16(), body);
        }

        let payload: CleanupResponse = response
            .json()
            .context("failed to decode cleanup response")?;
        Ok(payload.text)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Wait after failed attempt `n` is `n * backoff`.
    pub backoff: Duration,
    /// Fixed pause after every call, for the provider's rate limit.
    pub call_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(2),
            call_delay: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupOutcome {
    pub text: String,
    pub cleaned: bool,
    pub attempts: u32,
    pub error: Option<String>,
}

/// Rejects empty answers and answers that lost more than half of the input,
/// which in practice means the model summarized instead of cleaning.
fn acceptable(original: &str, cleaned: &str) -> Result<()> {
    let cleaned_len = cleaned.trim().chars().count();
    if cleaned_len == 0 {
        bail!("cleanup returned empty text");
    }
    let original_len = original.trim().chars().count();
    if cleaned_len * 2 < original_len {
        bail!("cleanup shrank text from {original_len} to {cleaned_len} chars");
    }
    Ok(())
}

pub fn clean_with_retry<C: TextCleaner + ?Sized>(
    cleaner: &C,
    text: &str,
    instruction: &str,
    policy: RetryPolicy,
) -> CleanupOutcome {
    let max_attempts = policy.max_attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=max_attempts {
        let result = cleaner
            .clean(text, instruction)
            .and_then(|cleaned| acceptable(text, &cleaned).map(|_| cleaned));
        if !policy.call_delay.is_zero() {
            thread::sleep(policy.call_delay);
        }

        match result {
            Ok(cleaned) => {
                debug!(attempt, "cleanup succeeded");
                return CleanupOutcome {
                    text: cleaned.trim().to_string(),
                    cleaned: true,
                    attempts: attempt,
                    error: None,
                };
            }
            Err(error) => {
                warn!(attempt, max_attempts, error = %error, "cleanup attempt failed");
                last_error = format!("{error:#}");
                if attempt < max_attempts && !policy.backoff.is_zero() {
                    thread::sleep(policy.backoff * attempt);
                }
            }
        }
    }

    CleanupOutcome {
        text: text.to_string(),
        cleaned: false,
        attempts: max_attempts,
        error: Some(last_error),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use anyhow::anyhow;

    use super::*;

    struct ScriptedCleaner {
        answers: RefCell<Vec<Result<String>>>,
        calls: Cell<u32>,
    }

    impl ScriptedCleaner {
        fn new(answers: Vec<Result<String>>) -> Self {
            Self {
                answers: RefCell::new(answers),
                calls: Cell::new(0),
            }
        }
    }

    impl TextCleaner for ScriptedCleaner {
        fn clean(&self, _text: &str, _instruction: &str) -> Result<String> {
            self.calls.set(self.calls.get() + 1);
            let mut answers = self.answers.borrow_mut();
            if answers.is_empty() {
                return Err(anyhow!("no scripted answer left"));
            }
            answers.remove(0)
        }
    }

    fn instant(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff: Duration::ZERO,
            call_delay: Duration::ZERO,
        }
    }

    const TEXT: &str = "§ 3. Arbeitgeber sind verpflichtet.\nSeite drucken";

    #[test]
    fn first_success_is_returned() {
        let cleaner = ScriptedCleaner::new(vec![Ok("§ 3. Arbeitgeber sind verpflichtet.".to_string())]);

        let outcome = clean_with_retry(&cleaner, TEXT, CLEANUP_INSTRUCTION, instant(3));

        assert!(outcome.cleaned);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.text, "§ 3. Arbeitgeber sind verpflichtet.");
        assert_eq!(cleaner.calls.get(), 1);
    }

    #[test]
    fn retries_after_errors() {
        let cleaner = ScriptedCleaner::new(vec![
            Err(anyhow!("503")),
            Ok("§ 3. Arbeitgeber sind verpflichtet.".to_string()),
        ]);

        let outcome = clean_with_retry(&cleaner, TEXT, CLEANUP_INSTRUCTION, instant(3));

        assert!(outcome.cleaned);
        assert_eq!(outcome.attempts, 2);
    }

    #[test]
    fn exhausted_retries_keep_original_text() {
        let cleaner = ScriptedCleaner::new(vec![
            Err(anyhow!("timeout")),
            Err(anyhow!("timeout")),
            Err(anyhow!("rate limited")),
        ]);

        let outcome = clean_with_retry(&cleaner, TEXT, CLEANUP_INSTRUCTION, instant(3));

        assert!(!outcome.cleaned);
        assert_eq!(outcome.text, TEXT);
        assert_eq!(outcome.error.as_deref(), Some("rate limited"));
        assert_eq!(cleaner.calls.get(), 3);
    }

    #[test]
    fn truncated_answers_are_rejected() {
        let cleaner = ScriptedCleaner::new(vec![Ok("§ 3.".to_string()), Ok("   ".to_string())]);

        let outcome = clean_with_retry(&cleaner, TEXT, CLEANUP_INSTRUCTION, instant(2));

        assert!(!outcome.cleaned);
        assert_eq!(outcome.text, TEXT);
        assert!(outcome.error.unwrap_or_default().contains("empty"));
    }
}
