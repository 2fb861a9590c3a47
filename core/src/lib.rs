// Narrator Core Library
// Script-to-audio production: planning, sequential generation, packaging

pub mod archive;
pub mod codec;
pub mod context;
pub mod event;
pub mod item;
pub mod metadata;
pub mod orchestrator;
pub mod planner;
pub mod speech;
pub mod store;
pub mod telemetry;
pub mod timer;
pub mod voice;

// Export core types
pub use archive::{Archive, ArchiveBuilder, ArchiveError};
pub use codec::{encode_wav, CodecError, WavHeader, SAMPLE_RATE};
pub use context::{render_prompt, ContextConfig, ContextWindow, SlidingContextBuilder};
pub use event::{CooldownKind, EventBus, ProductionEvent};
pub use item::{AudioClip, ItemStatus, ProductionItem};
pub use orchestrator::{
    CooldownRange, ProductionConfig, ProductionOrchestrator, RetryPolicy, RunReport, RunRequest,
};
pub use planner::{plan_batches, BatchGroup, PlanningError};
pub use speech::{SpeechClient, SpeechError, SpeechRequest};
pub use store::ItemStore;
pub use telemetry::{ProductionMetrics, RunMetrics};
pub use timer::{Cancelled, CancellationToken, Countdown};
pub use voice::{style_preset, StylePreset, VoiceGender, VoiceName, STYLE_PRESETS};

// Error types
use thiserror::Error;
use uuid::Uuid;

/// Operator misuse of the orchestrator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProductionError {
    #[error("A production run is already active")]
    RunActive,

    #[error("Item not found: {0}")]
    ItemNotFound(Uuid),

    #[error("Item {0} has no completed audio")]
    NotCompleted(Uuid),
}

#[derive(Error, Debug)]
pub enum NarratorError {
    #[error("Planning error: {0}")]
    Planning(#[from] PlanningError),

    #[error("Speech error: {0}")]
    Speech(#[from] SpeechError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Production error: {0}")]
    Production(#[from] ProductionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
pub type Result<T> = std::result::Result<T, NarratorError>;
