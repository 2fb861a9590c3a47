//! Boundary to the external speech-generation provider.
//!
//! The core never synthesizes audio itself. A `SpeechClient` turns one
//! segment plus its continuity context into raw mono 16-bit PCM, or a
//! classified failure the orchestrator can act on.

use crate::context::{clean_segment, render_prompt, ContextWindow};
use crate::voice::VoiceName;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpeechError {
    /// Quota or request-rate exhaustion; retry the same segment after a cooldown
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Content policy block; retrying identical text reproduces it
    #[error("Blocked by safety filter: {0}")]
    SafetyBlocked(String),

    /// Network, malformed response, anything else
    #[error("{0}")]
    Other(String),
}

impl SpeechError {
    /// Classify a free-form provider error message.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if is_rate_limit_message(&lower) {
            SpeechError::RateLimited(message)
        } else if is_safety_message(&lower) {
            SpeechError::SafetyBlocked(message)
        } else {
            SpeechError::Other(message)
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, SpeechError::RateLimited(_))
    }

    pub fn message(&self) -> &str {
        match self {
            SpeechError::RateLimited(m) | SpeechError::SafetyBlocked(m) | SpeechError::Other(m) => m,
        }
    }
}

fn is_rate_limit_message(lower: &str) -> bool {
    ["429", "quota", "rate limit", "rate_limit", "resource_exhausted", "too many requests"]
        .iter()
        .any(|needle| lower.contains(needle))
}

// Bare "blocked" also shows up in auth errors ("API key ... blocked"), which
// must stay retryable.
fn is_safety_message(lower: &str) -> bool {
    ["safety", "prohibited_content", "blocklist", "blockreason", "content blocked"]
        .iter()
        .any(|needle| lower.contains(needle))
}

/// One generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechRequest {
    pub text: String,
    pub voice: VoiceName,
    pub style: Option<String>,
    pub context: ContextWindow,
}

impl SpeechRequest {
    pub fn new(text: impl Into<String>, voice: VoiceName) -> Self {
        Self {
            text: text.into(),
            voice,
            style: None,
            context: ContextWindow::default(),
        }
    }

    pub fn with_style(mut self, style: Option<String>) -> Self {
        self.style = style;
        self
    }

    pub fn with_context(mut self, context: ContextWindow) -> Self {
        self.context = context;
        self
    }

    /// Segment text with surrounding quotes removed.
    pub fn spoken_text(&self) -> &str {
        clean_segment(&self.text)
    }

    /// Full prompt with the context fenced off from the text to speak.
    pub fn prompt(&self) -> String {
        render_prompt(&self.text, self.style.as_deref(), &self.context)
    }
}

/// Speech provider
#[async_trait]
pub trait SpeechClient: Send + Sync {
    /// Generate raw PCM for one segment.
    async fn synthesize(&self, request: SpeechRequest) -> Result<Vec<u8>, SpeechError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert!(SpeechError::classify("HTTP 429 Too Many Requests").is_rate_limited());
        assert!(SpeechError::classify("You exceeded your current QUOTA").is_rate_limited());
        assert!(SpeechError::classify("RESOURCE_EXHAUSTED").is_rate_limited());
        assert_eq!(
            SpeechError::classify("finish reason SAFETY"),
            SpeechError::SafetyBlocked("finish reason SAFETY".into())
        );
        assert!(matches!(
            SpeechError::classify("Prompt blocked: blockReason PROHIBITED_CONTENT"),
            SpeechError::SafetyBlocked(_)
        ));
        assert_eq!(
            SpeechError::classify("HTTP 403 Forbidden: API key not valid or has been blocked"),
            SpeechError::Other("HTTP 403 Forbidden: API key not valid or has been blocked".into())
        );
        assert_eq!(
            SpeechError::classify("connection reset"),
            SpeechError::Other("connection reset".into())
        );
    }

    #[test]
    fn test_request_prompt_uses_clean_text() {
        let req = SpeechRequest::new("'Hello.'", VoiceName::Charon)
            .with_style(Some("calm".into()));
        assert_eq!(req.spoken_text(), "Hello.");
        assert!(req.prompt().ends_with("Hello."));
        assert!(req.prompt().contains("calm"));
    }
}
