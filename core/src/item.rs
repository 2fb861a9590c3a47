//! The unit of work tracked by the orchestrator.

use crate::planner::BatchGroup;
use crate::voice::VoiceName;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Processing => "processing",
            ItemStatus::Completed => "completed",
            ItemStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Completed | ItemStatus::Error)
    }
}

/// Encoded WAV clip. Cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioClip {
    #[serde(skip)]
    pub wav: Arc<[u8]>,
    pub sample_rate: u32,
    pub duration_ms: u64,
}

impl AudioClip {
    pub fn bytes(&self) -> &[u8] {
        &self.wav
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductionItem {
    pub id: Uuid,
    pub run_id: Uuid,
    pub text: String,
    pub voice: VoiceName,
    pub group: usize,
    pub status: ItemStatus,
    pub retry_count: u32,
    pub waiting_limit: bool,
    /// Present only when `status == Completed`
    pub audio: Option<AudioClip>,
    /// Present only when `status == Error`
    pub error: Option<String>,
    /// Informational message shown while waiting out a rate limit
    pub notice: Option<String>,
    pub cloud_url: Option<String>,
}

impl ProductionItem {
    pub fn from_group(run_id: Uuid, group: &BatchGroup, voice: VoiceName) -> Self {
        Self {
            id: Uuid::new_v4(),
            run_id,
            text: group.text.trim().to_string(),
            voice,
            group: group.sequence,
            status: ItemStatus::Pending,
            retry_count: 0,
            waiting_limit: false,
            audio: None,
            error: None,
            notice: None,
            cloud_url: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == ItemStatus::Completed && self.audio.is_some()
    }
}
