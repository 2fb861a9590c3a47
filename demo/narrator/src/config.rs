use std::fs;
use std::path::{Path, PathBuf};

use narrator_core::{style_preset, CooldownRange, ProductionConfig, VoiceName};
use narrator_speech::GeminiConfig;

/// High-level configuration for the narrator demo
#[derive(Clone, Debug)]
pub struct NarratorConfig {
    pub script_path: PathBuf,
    pub output_dir: PathBuf,
    pub lines_per_batch: usize,
    pub pacing_delay_secs: u64,
    pub voice: VoiceName,
    /// Free-form style instruction, already resolved from a preset if one was named
    pub style: Option<String>,
    pub production: ProductionConfig,
    pub gemini: GeminiConfig,
}

impl Default for NarratorConfig {
    fn default() -> Self {
        Self {
            script_path: PathBuf::from("script.txt"),
            output_dir: std::env::var("NARRATOR_OUTPUT_DIR")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("output")),
            lines_per_batch: std::env::var("NARRATOR_LINES_PER_BATCH")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(1),
            pacing_delay_secs: std::env::var("NARRATOR_PACING_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(5),
            voice: std::env::var("NARRATOR_VOICE")
                .ok()
                .and_then(|v| v.parse::<VoiceName>().ok())
                .unwrap_or_default(),
            style: std::env::var("NARRATOR_STYLE")
                .ok()
                .and_then(|s| resolve_style(&s)),
            production: ProductionConfig::default(),
            gemini: GeminiConfig::default(),
        }
    }
}

/// A preset id maps to its instruction; anything else is used verbatim.
pub fn resolve_style(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    Some(
        style_preset(raw)
            .map(|p| p.instruction.to_string())
            .unwrap_or_else(|| raw.to_string()),
    )
}

impl NarratorConfig {
    /// Load configuration from a TOML file (path via NARRATOR_CONFIG or ./narrator.toml),
    /// overlaying values onto env-driven defaults.
    pub fn load() -> Self {
        let default = Self::default();
        let path = std::env::var("NARRATOR_CONFIG").unwrap_or_else(|_| "narrator.toml".into());
        let p = Path::new(&path);
        if !p.exists() {
            tracing::info!(target = "narrator", path = %path, "No TOML config found; using defaults/env");
            return default;
        }
        match fs::read_to_string(p) {
            Ok(s) => match Self::from_toml_str(&s, default.clone()) {
                Ok(cfg) => cfg,
                Err(e) => {
                    tracing::warn!(target = "narrator", error = %e, "Failed to parse TOML; using defaults");
                    default
                }
            },
            Err(e) => {
                tracing::warn!(target = "narrator", error = %e, "Failed to read TOML; using defaults");
                default
            }
        }
    }

    pub fn from_toml_str(s: &str, base: Self) -> Result<Self, toml::de::Error> {
        let t = toml::from_str::<NarratorToml>(s)?;
        Ok(t.overlay(base))
    }
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct NarratorToml {
    pub script_path: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub lines_per_batch: Option<usize>,
    pub pacing_delay_secs: Option<u64>,
    pub voice: Option<String>,
    pub style: Option<String>,
    pub style_preset: Option<String>,
    pub retry: Option<RetryToml>,
    pub context: Option<ContextToml>,
    pub gemini: Option<GeminiToml>,
}

impl NarratorToml {
    fn overlay(self, mut base: NarratorConfig) -> NarratorConfig {
        if let Some(x) = self.script_path {
            base.script_path = x;
        }
        if let Some(x) = self.output_dir {
            base.output_dir = x;
        }
        if let Some(x) = self.lines_per_batch {
            base.lines_per_batch = x;
        }
        if let Some(x) = self.pacing_delay_secs {
            base.pacing_delay_secs = x;
        }
        if let Some(x) = self.voice {
            match x.parse::<VoiceName>() {
                Ok(v) => base.voice = v,
                Err(e) => {
                    tracing::warn!(target = "narrator", voice = %x, error = %e, "Unknown voice; keeping default")
                }
            }
        }
        // an explicit style wins over a preset
        if let Some(x) = self.style_preset.and_then(|p| resolve_style(&p)) {
            base.style = Some(x);
        }
        if let Some(x) = self.style {
            base.style = resolve_style(&x);
        }
        if let Some(r) = self.retry {
            r.apply(&mut base.production);
        }
        if let Some(c) = self.context {
            c.apply(&mut base.production);
        }
        if let Some(g) = self.gemini {
            g.apply(&mut base);
        }
        base
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct RetryToml {
    pub rate_limit_min_secs: Option<u64>,
    pub rate_limit_max_secs: Option<u64>,
    pub max_rate_limit_retries: Option<u32>,
    pub max_transient_attempts: Option<u32>,
    pub transient_delay_secs: Option<u64>,
}
impl RetryToml {
    fn apply(self, p: &mut ProductionConfig) {
        let current = p.retry.rate_limit_cooldown;
        let min = self.rate_limit_min_secs.unwrap_or(current.min_secs);
        let max = self.rate_limit_max_secs.unwrap_or(current.max_secs.max(min));
        p.retry.rate_limit_cooldown = CooldownRange::new(min, max);
        if let Some(x) = self.max_rate_limit_retries {
            p.retry.max_rate_limit_retries = x;
        }
        if let Some(x) = self.max_transient_attempts {
            p.retry.max_transient_attempts = x.max(1);
        }
        if let Some(x) = self.transient_delay_secs {
            p.retry.transient_delay_secs = x;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct ContextToml {
    pub preceding_chars: Option<usize>,
    pub lookahead_chars: Option<usize>,
}
impl ContextToml {
    fn apply(self, p: &mut ProductionConfig) {
        if let Some(x) = self.preceding_chars {
            p.context.preceding_chars = x;
        }
        if let Some(x) = self.lookahead_chars {
            p.context.lookahead_chars = x;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct GeminiToml {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub request_timeout_ms: Option<u64>,
    pub sample_rate: Option<u32>,
}
impl GeminiToml {
    fn apply(self, c: &mut NarratorConfig) {
        if let Some(x) = self.base_url {
            c.gemini.base_url = x;
        }
        if let Some(x) = self.model {
            c.gemini.model = x;
        }
        if let Some(x) = self.request_timeout_ms {
            c.gemini.request_timeout_ms = x;
        }
        if let Some(x) = self.sample_rate {
            c.production.sample_rate = x;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> NarratorConfig {
        NarratorConfig {
            script_path: PathBuf::from("script.txt"),
            output_dir: PathBuf::from("output"),
            lines_per_batch: 1,
            pacing_delay_secs: 5,
            voice: VoiceName::Kore,
            style: None,
            production: ProductionConfig::default(),
            gemini: GeminiConfig {
                base_url: "http://localhost".into(),
                model: "m".into(),
                api_keys: vec!["k".into()],
                request_timeout_ms: 1000,
            },
        }
    }

    #[test]
    fn test_overlay() {
        let toml = r#"
            lines_per_batch = 3
            voice = "charon"
            style_preset = "podcast"

            [retry]
            rate_limit_min_secs = 20
            rate_limit_max_secs = 40
            max_transient_attempts = 0

            [context]
            lookahead_chars = 60

            [gemini]
            model = "other-tts"
            sample_rate = 16000
        "#;
        let cfg = NarratorConfig::from_toml_str(toml, base()).unwrap();
        assert_eq!(cfg.lines_per_batch, 3);
        assert_eq!(cfg.voice, VoiceName::Charon);
        assert_eq!(
            cfg.style.as_deref(),
            style_preset("podcast").map(|p| p.instruction)
        );
        assert_eq!(cfg.production.retry.rate_limit_cooldown, CooldownRange::new(20, 40));
        assert_eq!(cfg.production.retry.max_transient_attempts, 1);
        assert_eq!(cfg.production.context.lookahead_chars, 60);
        assert_eq!(cfg.production.sample_rate, 16000);
        assert_eq!(cfg.gemini.model, "other-tts");
        assert_eq!(cfg.pacing_delay_secs, 5);
    }

    #[test]
    fn test_unknown_voice_and_free_style() {
        let cfg = NarratorConfig::from_toml_str(
            "voice = \"nobody\"\nstyle = \"  slow and warm \"",
            base(),
        )
        .unwrap();
        assert_eq!(cfg.voice, VoiceName::Kore);
        assert_eq!(cfg.style.as_deref(), Some("slow and warm"));
    }

    #[test]
    fn test_bad_toml() {
        assert!(NarratorConfig::from_toml_str("lines_per_batch = \"x\"", base()).is_err());
    }
}
