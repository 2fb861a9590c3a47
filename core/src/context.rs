//! Sliding continuity context and prompt rendering.
//!
//! The provider receives the text surrounding a segment only to keep tone and
//! emotion continuous between requests. It must never read that text aloud,
//! so the rendered prompt fences the context off from the segment to speak.

use serde::{Deserialize, Serialize};

/// Upper bound for lookahead; more trailing text risks the synthesizer reading ahead.
pub const MAX_LOOKAHEAD_CHARS: usize = 80;

pub const DEFAULT_STYLE: &str = "professional and natural narrative";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Characters taken immediately before the segment
    pub preceding_chars: usize,
    /// Characters taken after the segment (clamped to `MAX_LOOKAHEAD_CHARS`)
    pub lookahead_chars: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            preceding_chars: 1000,
            lookahead_chars: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextWindow {
    pub before: String,
    pub after: String,
}

impl ContextWindow {
    pub fn is_empty(&self) -> bool {
        self.before.is_empty() && self.after.is_empty()
    }
}

/// Extracts the window around the first occurrence of `segment` in `script`.
#[derive(Debug, Clone, Default)]
pub struct SlidingContextBuilder {
    cfg: ContextConfig,
}

impl SlidingContextBuilder {
    pub fn new(cfg: ContextConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> ContextConfig {
        self.cfg
    }

    pub fn build(&self, script: &str, segment: &str) -> ContextWindow {
        if segment.is_empty() {
            return ContextWindow::default();
        }
        let Some(idx) = script.find(segment) else {
            return ContextWindow::default();
        };

        let before = tail_chars(&script[..idx], self.cfg.preceding_chars).to_string();
        let lookahead = self.cfg.lookahead_chars.min(MAX_LOOKAHEAD_CHARS);
        let after = script[idx + segment.len()..]
            .chars()
            .take(lookahead)
            .collect::<String>();

        ContextWindow { before, after }
    }
}

/// Last `n` characters of `s`, on a char boundary.
fn tail_chars(s: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match s.char_indices().rev().nth(n - 1) {
        Some((i, _)) => &s[i..],
        None => s,
    }
}

/// Trim whitespace and one surrounding quote character on each side.
pub fn clean_segment(text: &str) -> &str {
    let t = text.trim();
    let t = t.strip_prefix(['"', '\'']).unwrap_or(t);
    let t = t.strip_suffix(['"', '\'']).unwrap_or(t);
    t.trim()
}

/// Render the full provider prompt for one segment.
pub fn render_prompt(segment: &str, style: Option<&str>, context: &ContextWindow) -> String {
    let style = style
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_STYLE);
    let before = context.before.trim();
    let before = if before.is_empty() {
        "Beginning of narration."
    } else {
        before
    };

    let mut prompt = format!(
        "INSTRUCTION:\n\
         You are a professional voice actor. Speak the following segment naturally.\n\
         This text is PART OF A CONTINUOUS NARRATION.\n\
         Maintain a {style} tone.\n\
         \n\
         CRITICAL RULES for SEAMLESS FLOW:\n\
         - DO NOT add leading or trailing silence.\n\
         - DO NOT use \"quotation\" intonation (no air quotes or citation style).\n\
         - Ensure the prosody flows as if this is the middle of a sentence or paragraph.\n\
         - ONLY speak the words provided in the segment below.\n\
         \n\
         PREVIOUS CONTEXT (FOR EMOTIONAL FLOW ONLY - DO NOT SPEAK THIS):\n\
         {before}\n"
    );
    let after = context.after.trim();
    if !after.is_empty() {
        prompt.push_str("\nUPCOMING TEXT (FOR FLOW ONLY - DO NOT SPEAK THIS):\n");
        prompt.push_str(after);
        prompt.push('\n');
    }
    prompt.push_str("\nCURRENT SEGMENT TO SPEAK:\n");
    prompt.push_str(clean_segment(segment));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = "First line here.\nSecond line here.\nThird line here.";

    #[test]
    fn test_not_found_is_empty() {
        let b = SlidingContextBuilder::default();
        assert!(b.build(SCRIPT, "Not in script").is_empty());
        assert!(b.build(SCRIPT, "").is_empty());
    }

    #[test]
    fn test_at_start_is_empty() {
        let b = SlidingContextBuilder::default();
        assert!(b.build(SCRIPT, "First line here.").before.is_empty());
    }

    #[test]
    fn test_preceding_window_bounded() {
        let b = SlidingContextBuilder::new(ContextConfig {
            preceding_chars: 5,
            lookahead_chars: 0,
        });
        let ctx = b.build(SCRIPT, "Third line here.");
        assert_eq!(ctx.before, "ere.\n");
        assert!(ctx.after.is_empty());
    }

    #[test]
    fn test_whole_prefix_when_short() {
        let b = SlidingContextBuilder::default();
        let ctx = b.build(SCRIPT, "Second line here.");
        assert_eq!(ctx.before, "First line here.\n");
    }

    #[test]
    fn test_lookahead_clamped() {
        let long_tail = "x".repeat(500);
        let script = format!("Seg.{long_tail}");
        let b = SlidingContextBuilder::new(ContextConfig {
            preceding_chars: 100,
            lookahead_chars: 10_000,
        });
        let ctx = b.build(&script, "Seg.");
        assert_eq!(ctx.after.chars().count(), MAX_LOOKAHEAD_CHARS);
    }

    #[test]
    fn test_multibyte_window() {
        let b = SlidingContextBuilder::new(ContextConfig {
            preceding_chars: 3,
            lookahead_chars: 2,
        });
        let ctx = b.build("héllo wörld ünd", "wörld");
        assert_eq!(ctx.before, "lo ");
        assert_eq!(ctx.after, " ü");
    }

    #[test]
    fn test_clean_segment() {
        assert_eq!(clean_segment("  \"Hello there.\" "), "Hello there.");
        assert_eq!(clean_segment("'quoted'"), "quoted");
        assert_eq!(clean_segment("plain"), "plain");
    }

    #[test]
    fn test_prompt_separates_context_from_segment() {
        let ctx = ContextWindow {
            before: "Earlier words.".into(),
            after: String::new(),
        };
        let prompt = render_prompt("\"Speak me.\"", Some("calm"), &ctx);
        let ctx_pos = prompt.find("DO NOT SPEAK THIS").unwrap();
        let seg_pos = prompt.find("CURRENT SEGMENT TO SPEAK:").unwrap();
        assert!(ctx_pos < seg_pos);
        assert!(prompt.contains("Maintain a calm tone."));
        assert!(prompt.ends_with("CURRENT SEGMENT TO SPEAK:\nSpeak me."));
        assert!(!prompt.contains("UPCOMING TEXT"));
    }

    #[test]
    fn test_prompt_defaults() {
        let prompt = render_prompt("Hi.", Some("   "), &ContextWindow::default());
        assert!(prompt.contains(DEFAULT_STYLE));
        assert!(prompt.contains("Beginning of narration."));
    }
}
