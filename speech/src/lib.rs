//! Speech providers for the narrator core.
//!
//! Each provider implements `narrator_core::SpeechClient`; the orchestrator
//! only ever sees that trait.

pub mod gemini;

pub use gemini::{parse_api_keys, GeminiConfig, GeminiError, GeminiSpeechClient};
