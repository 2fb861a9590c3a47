//! Prebuilt voices and style presets offered by the speech provider.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VoiceName {
    #[default]
    Kore,
    Puck,
    Charon,
    Fenrir,
    Zephyr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoiceGender {
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VoiceInfo {
    pub name: VoiceName,
    pub gender: VoiceGender,
    pub description: &'static str,
}

impl VoiceName {
    pub const ALL: [VoiceName; 5] = [
        VoiceName::Kore,
        VoiceName::Puck,
        VoiceName::Charon,
        VoiceName::Fenrir,
        VoiceName::Zephyr,
    ];

    /// Name as the provider expects it in `prebuiltVoiceConfig.voiceName`.
    pub fn as_str(&self) -> &'static str {
        match self {
            VoiceName::Kore => "Kore",
            VoiceName::Puck => "Puck",
            VoiceName::Charon => "Charon",
            VoiceName::Fenrir => "Fenrir",
            VoiceName::Zephyr => "Zephyr",
        }
    }

    pub fn info(&self) -> VoiceInfo {
        let (gender, description) = match self {
            VoiceName::Kore => (
                VoiceGender::Female,
                "Deeply reflective and warm (personal stories)",
            ),
            VoiceName::Puck => (VoiceGender::Male, "Bright and energetic (upbeat tone)"),
            VoiceName::Charon => (
                VoiceGender::Male,
                "Deep and authoritative (commanding presence)",
            ),
            VoiceName::Fenrir => (
                VoiceGender::Male,
                "Dramatic and intense (cinematic narration)",
            ),
            VoiceName::Zephyr => (
                VoiceGender::Female,
                "Clear and professional (documentaries and news)",
            ),
        };
        VoiceInfo {
            name: *self,
            gender,
            description,
        }
    }

    pub fn by_gender(gender: VoiceGender) -> Vec<VoiceInfo> {
        Self::ALL
            .iter()
            .map(|v| v.info())
            .filter(|info| info.gender == gender)
            .collect()
    }
}

impl fmt::Display for VoiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoiceName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|v| v.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown voice: {wanted}"))
    }
}

/// A named style instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StylePreset {
    pub id: &'static str,
    pub label: &'static str,
    pub instruction: &'static str,
}

pub const STYLE_PRESETS: &[StylePreset] = &[
    StylePreset {
        id: "personal",
        label: "Personal narration",
        instruction: "sincere first-person narrative, reflective, calm, and deeply emotional with natural pauses as if sharing a life secret",
    },
    StylePreset {
        id: "deep-story",
        label: "Deep storytelling",
        instruction: "professional voice actor, captivating and soulful storytelling, perfect for documentaries, dramatic and engaging intonation",
    },
    StylePreset {
        id: "podcast",
        label: "Casual podcast",
        instruction: "natural conversational tone, friendly, approachable, and relaxed like talking to a close friend",
    },
    StylePreset {
        id: "inspirational",
        label: "Inspirational",
        instruction: "motivational, empowering, rising intonation, and full of hope",
    },
    StylePreset {
        id: "formal-news",
        label: "News narrator",
        instruction: "authoritative, objective, clear articulation, and professional broadcasting style",
    },
    StylePreset {
        id: "melancholic",
        label: "Melancholic",
        instruction: "vulnerable, somber, slow pace, and heavy with emotion for sad reflections",
    },
    StylePreset {
        id: "cinematic",
        label: "Trailer / epic",
        instruction: "epic cinematic narrator, deep resonance, slow and powerful delivery",
    },
];

pub fn style_preset(id: &str) -> Option<&'static StylePreset> {
    STYLE_PRESETS.iter().find(|p| p.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_voice_case_insensitive() {
        assert_eq!("zephyr".parse::<VoiceName>(), Ok(VoiceName::Zephyr));
        assert_eq!(" Kore ".parse::<VoiceName>(), Ok(VoiceName::Kore));
        assert!("Nobody".parse::<VoiceName>().is_err());
    }

    #[test]
    fn test_gender_filter() {
        let female: Vec<_> = VoiceName::by_gender(VoiceGender::Female)
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(female, vec![VoiceName::Kore, VoiceName::Zephyr]);
        assert_eq!(VoiceName::by_gender(VoiceGender::Male).len(), 3);
    }

    #[test]
    fn test_style_lookup() {
        assert!(style_preset("cinematic").is_some());
        assert!(style_preset("missing").is_none());
    }
}
