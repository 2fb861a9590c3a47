//! Gemini text-to-speech over the `generateContent` REST endpoint.
//!
//! Env overrides:
//! - GEMINI_API_KEYS (comma separated; one key is picked at random per request)
//! - GEMINI_BASE_URL, GEMINI_MODEL, GEMINI_TIMEOUT_MS

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use narrator_core::{SpeechClient, SpeechError, SpeechRequest};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-tts";

#[derive(Error, Debug)]
pub enum GeminiError {
    #[error("GEMINI_API_KEYS is missing or has no usable key")]
    MissingApiKeys,

    #[error("Failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub base_url: String,
    pub model: String,
    pub api_keys: Vec<String>,
    pub request_timeout_ms: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("GEMINI_BASE_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: std::env::var("GEMINI_MODEL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_keys: std::env::var("GEMINI_API_KEYS")
                .map(|raw| parse_api_keys(&raw))
                .unwrap_or_default(),
            request_timeout_ms: std::env::var("GEMINI_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60_000),
        }
    }
}

impl GeminiConfig {
    pub fn with_api_keys(mut self, raw: &str) -> Self {
        self.api_keys = parse_api_keys(raw);
        self
    }
}

/// Split a comma separated key list, dropping blanks.
pub fn parse_api_keys(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

pub struct GeminiSpeechClient {
    http: Client,
    cfg: GeminiConfig,
    rng: Mutex<StdRng>,
}

impl GeminiSpeechClient {
    pub fn new(cfg: GeminiConfig) -> Result<Self, GeminiError> {
        if cfg.api_keys.is_empty() {
            return Err(GeminiError::MissingApiKeys);
        }
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()?;
        Ok(Self {
            http,
            cfg,
            rng: Mutex::new(StdRng::from_entropy()),
        })
    }

    pub fn from_env() -> Result<Self, GeminiError> {
        Self::new(GeminiConfig::default())
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.cfg
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.cfg.base_url.trim_end_matches('/'),
            self.cfg.model
        )
    }

    fn pick_key(&self) -> &str {
        let idx = {
            let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            rng.gen_range(0..self.cfg.api_keys.len())
        };
        &self.cfg.api_keys[idx]
    }
}

#[async_trait]
impl SpeechClient for GeminiSpeechClient {
    async fn synthesize(&self, request: SpeechRequest) -> Result<Vec<u8>, SpeechError> {
        let url = self.endpoint();
        debug!(
            target = "gemini",
            voice = %request.voice,
            chars = request.text.chars().count(),
            "POST {}", url
        );

        let resp = self
            .http
            .post(&url)
            .header("content-type", "application/json")
            .header("x-goog-api-key", self.pick_key())
            .json(&request_body(&request))
            .send()
            .await
            .map_err(|e| SpeechError::classify(format!("Gemini HTTP error: {e}")))?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let body = resp.text().await.unwrap_or_default();
            warn!(target = "gemini", %status, "Gemini quota exhausted");
            return Err(SpeechError::RateLimited(format!("HTTP {status}: {body}")));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            error!(target = "gemini", %status, body = %body, "Gemini TTS error");
            return Err(SpeechError::classify(format!("HTTP {status}: {body}")));
        }

        let val: Value = resp
            .json()
            .await
            .map_err(|e| SpeechError::Other(format!("Failed to parse Gemini JSON: {e}")))?;
        extract_audio(&val)
    }
}

/// `generateContent` body asking for a single audio part in `request.voice`.
pub fn request_body(request: &SpeechRequest) -> Value {
    json!({
        "contents": [{ "parts": [{ "text": request.prompt() }] }],
        "generationConfig": {
            "responseModalities": ["AUDIO"],
            "speechConfig": {
                "voiceConfig": {
                    "prebuiltVoiceConfig": { "voiceName": request.voice.as_str() }
                }
            }
        }
    })
}

/// Decode the first inline audio part of a `generateContent` response.
pub fn extract_audio(v: &Value) -> Result<Vec<u8>, SpeechError> {
    let candidate = v.get("candidates").and_then(|c| c.get(0));
    let data = candidate
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
        .and_then(|parts| {
            parts
                .iter()
                .find_map(|p| p.get("inlineData")?.get("data")?.as_str())
        });

    if let Some(data) = data {
        return STANDARD
            .decode(data)
            .map_err(|e| SpeechError::Other(format!("Invalid base64 audio: {e}")));
    }

    if let Some(reason) = v
        .get("promptFeedback")
        .and_then(|f| f.get("blockReason"))
        .and_then(|r| r.as_str())
    {
        return Err(SpeechError::SafetyBlocked(format!("Prompt blocked: {reason}")));
    }
    let finish = candidate
        .and_then(|c| c.get("finishReason"))
        .and_then(|r| r.as_str());
    match finish {
        Some("SAFETY") => Err(SpeechError::SafetyBlocked(
            "Content blocked by safety filter".to_string(),
        )),
        Some(reason) => Err(SpeechError::Other(format!("No audio returned: {reason}"))),
        None => Err(SpeechError::Other("No audio returned: Unknown".to_string())),
    }
}
