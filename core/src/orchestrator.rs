//! Production orchestrator
//!
//! Drives planned items through the speech provider strictly one at a time:
//!
//! 1. mark the item `processing` (attempt counter +1, wait flag down)
//! 2. build the continuity context and call the `SpeechClient`
//! 3. on success encode to WAV and mark `completed`
//! 4. on failure:
//!    - rate limited: raise the wait flag, count down a cooldown drawn from
//!      the configured range, retry the same item (bounded)
//!    - safety blocked: mark `error`, no retry
//!    - anything else: mark `error`, wait a short fixed delay, retry (bounded)
//!    - nothing left to speak after trimming quotes: mark `error` up front,
//!      the provider is never called
//! 5. after a completed item that is not the last one, count down the
//!    pacing delay before the next request
//!
//! Items finish in planned order and never overlap. Only one run (or
//! preview) may be active at a time. A `CancellationToken` is checked at
//! every suspension point.

use crate::archive::{Archive, ArchiveBuilder};
use crate::codec::{encode_wav, WavHeader, SAMPLE_RATE};
use crate::context::{clean_segment, ContextConfig, SlidingContextBuilder};
use crate::event::{CooldownKind, EventBus, ProductionEvent};
use crate::item::{AudioClip, ProductionItem};
use crate::metadata;
use crate::planner::{normalize_line_endings, plan_batches, script_lines, PlanningError};
use crate::speech::{SpeechClient, SpeechError, SpeechRequest};
use crate::store::ItemStore;
use crate::telemetry::{ProductionMetrics, RunMetrics};
use crate::timer::{Cancelled, CancellationToken, Countdown};
use crate::voice::VoiceName;
use crate::{ProductionError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const RATE_LIMIT_NOTICE: &str = "Quota limit reached, waiting before retry";
pub const EMPTY_SEGMENT_ERROR: &str = "Segment has nothing to speak once quotes are trimmed";

/// Inclusive range of cooldown seconds; `min == max` is a fixed cooldown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownRange {
    pub min_secs: u64,
    pub max_secs: u64,
}

impl CooldownRange {
    pub fn new(a: u64, b: u64) -> Self {
        Self {
            min_secs: a.min(b),
            max_secs: a.max(b),
        }
    }

    pub fn fixed(secs: u64) -> Self {
        Self::new(secs, secs)
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        if self.min_secs >= self.max_secs {
            self.min_secs
        } else {
            rng.gen_range(self.min_secs..=self.max_secs)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub rate_limit_cooldown: CooldownRange,
    /// Rate-limit retries per item before it is marked `error`
    pub max_rate_limit_retries: u32,
    /// Attempts per item that may end in a transient failure
    pub max_transient_attempts: u32,
    pub transient_delay_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            rate_limit_cooldown: CooldownRange::fixed(30),
            max_rate_limit_retries: 5,
            max_transient_attempts: 2,
            transient_delay_secs: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductionConfig {
    pub retry: RetryPolicy,
    pub context: ContextConfig,
    /// Sample rate of the PCM returned by the provider
    pub sample_rate: u32,
    pub event_capacity: usize,
}

impl Default for ProductionConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            context: ContextConfig::default(),
            sample_rate: SAMPLE_RATE,
            event_capacity: 1024,
        }
    }
}

/// Everything needed to start one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub script: String,
    pub lines_per_batch: usize,
    pub voice: VoiceName,
    pub style: Option<String>,
    pub pacing_delay_secs: u64,
}

impl RunRequest {
    pub fn new(script: impl Into<String>, lines_per_batch: usize) -> Self {
        Self {
            script: script.into(),
            lines_per_batch,
            voice: VoiceName::default(),
            style: None,
            pacing_delay_secs: 5,
        }
    }

    pub fn with_voice(mut self, voice: VoiceName) -> Self {
        self.voice = voice;
        self
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    pub fn with_pacing(mut self, secs: u64) -> Self {
        self.pacing_delay_secs = secs;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub planned: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: bool,
    pub metrics: RunMetrics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemOutcome {
    Completed,
    Failed,
    Cancelled,
}

/// Clears the run-active flag when dropped.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct ProductionOrchestrator {
    client: Arc<dyn SpeechClient>,
    cfg: ProductionConfig,
    store: ItemStore,
    context: SlidingContextBuilder,
    countdown: Countdown,
    rng: Mutex<StdRng>,
    running: AtomicBool,
}

impl ProductionOrchestrator {
    pub fn new(client: Arc<dyn SpeechClient>, cfg: ProductionConfig) -> Self {
        let bus = EventBus::new(cfg.event_capacity);
        Self {
            client,
            context: SlidingContextBuilder::new(cfg.context),
            store: ItemStore::new(bus),
            countdown: Countdown::default(),
            rng: Mutex::new(StdRng::from_entropy()),
            running: AtomicBool::new(false),
            cfg,
        }
    }

    /// Replace the random source used for cooldown durations.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    pub fn with_countdown(mut self, countdown: Countdown) -> Self {
        self.countdown = countdown;
        self
    }

    pub fn config(&self) -> &ProductionConfig {
        &self.cfg
    }

    pub fn store(&self) -> &ItemStore {
        &self.store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProductionEvent> {
        self.store.bus().subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Snapshot of all items in display order.
    pub async fn items(&self) -> Vec<ProductionItem> {
        self.store.snapshot().await
    }

    /// Remove every item. Rejected while a run is active.
    pub async fn clear(&self) -> std::result::Result<(), ProductionError> {
        let _guard = self.try_begin()?;
        self.store.clear().await;
        info!(target = "orchestrator", "Production history cleared");
        Ok(())
    }

    /// Record where a completed clip was uploaded.
    pub async fn attach_cloud_url(
        &self,
        id: Uuid,
        url: impl Into<String>,
    ) -> std::result::Result<ProductionItem, ProductionError> {
        self.store.set_cloud_url(id, url).await
    }

    pub async fn build_archive(&self) -> Result<Archive> {
        let items = self.store.snapshot().await;
        Ok(ArchiveBuilder::default().build_blocking(items).await?)
    }

    /// `api_keys` is the whole rotation pool the provider drew from.
    pub async fn export_metadata<S: AsRef<str>>(&self, api_keys: &[S]) -> Result<String> {
        let items = self.store.snapshot().await;
        Ok(metadata::export_metadata(&items, api_keys)?)
    }

    /// Plan and produce a whole script without external cancellation.
    pub async fn start_run(&self, request: RunRequest) -> Result<RunReport> {
        self.run(request, &CancellationToken::new()).await
    }

    /// Plan `request.script` and drive every planned item to a terminal state.
    pub async fn run(&self, request: RunRequest, cancel: &CancellationToken) -> Result<RunReport> {
        let _guard = self.try_begin()?;
        let groups = plan_batches(&request.script, request.lines_per_batch)?;

        let run_id = Uuid::new_v4();
        let planned: Vec<ProductionItem> = groups
            .iter()
            .map(|g| ProductionItem::from_group(run_id, g, request.voice))
            .collect();
        let total = planned.len();
        self.store.prepend_run(planned.clone()).await;
        self.store.bus().publish(ProductionEvent::RunStarted {
            run_id,
            items: total,
        });
        info!(
            target = "orchestrator",
            %run_id,
            items = total,
            voice = %request.voice,
            lines_per_batch = request.lines_per_batch,
            pacing_secs = request.pacing_delay_secs,
            "Production run started"
        );

        // group texts are `\n`-joined, so context lookup needs the same endings
        let script = normalize_line_endings(&request.script);
        let metrics = ProductionMetrics::new();
        let mut completed = 0;
        let mut failed = 0;
        let mut cancelled = false;

        for (idx, item) in planned.iter().enumerate() {
            match self.produce_item(item, &script, &request, cancel, &metrics).await? {
                ItemOutcome::Completed => {
                    completed += 1;
                    metrics.record_completed().await;
                    if idx + 1 < total
                        && self
                            .cooldown(item.id, CooldownKind::Pacing, request.pacing_delay_secs, cancel)
                            .await
                            .is_err()
                    {
                        cancelled = true;
                        break;
                    }
                }
                ItemOutcome::Failed => {
                    failed += 1;
                    metrics.record_failed().await;
                }
                ItemOutcome::Cancelled => {
                    cancelled = true;
                    break;
                }
            }
        }

        self.store.bus().publish(ProductionEvent::RunFinished {
            run_id,
            completed,
            failed,
            cancelled,
        });
        info!(
            target = "orchestrator",
            %run_id,
            completed,
            failed,
            cancelled,
            "Production run finished"
        );
        metrics.log_summary().await;

        Ok(RunReport {
            run_id,
            planned: total,
            completed,
            failed,
            cancelled,
            metrics: metrics.snapshot().await,
        })
    }

    /// One clip for the first line of `script`, with context, no retries.
    pub async fn preview(
        &self,
        script: &str,
        voice: VoiceName,
        style: Option<&str>,
    ) -> Result<AudioClip> {
        let _guard = self.try_begin()?;
        let script = normalize_line_endings(script);
        let first = script_lines(&script)
            .into_iter()
            .next()
            .ok_or(PlanningError::EmptyScript)?;
        if clean_segment(first).is_empty() {
            return Err(PlanningError::EmptySegment.into());
        }
        let request = SpeechRequest::new(first.trim(), voice)
            .with_style(style.map(str::to_string))
            .with_context(self.context.build(&script, first));
        debug!(target = "orchestrator", %voice, "Generating preview");
        let pcm = self.client.synthesize(request).await?;
        Ok(self.encode(pcm)?)
    }

    fn try_begin(&self) -> std::result::Result<RunGuard<'_>, ProductionError> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| ProductionError::RunActive)?;
        Ok(RunGuard(&self.running))
    }

    #[tracing::instrument(skip_all, fields(item_id = %item.id, group = item.group))]
    async fn produce_item(
        &self,
        item: &ProductionItem,
        script: &str,
        request: &RunRequest,
        cancel: &CancellationToken,
        metrics: &ProductionMetrics,
    ) -> Result<ItemOutcome> {
        let policy = self.cfg.retry;
        let mut rate_limit_retries = 0u32;
        let mut transient_failures = 0u32;

        if clean_segment(&item.text).is_empty() {
            warn!(target = "orchestrator", "Segment is empty once quotes are trimmed; skipping");
            self.store.mark_error(item.id, EMPTY_SEGMENT_ERROR).await?;
            return Ok(ItemOutcome::Failed);
        }

        loop {
            if cancel.is_cancelled() {
                self.store.mark_pending(item.id).await?;
                return Ok(ItemOutcome::Cancelled);
            }

            let attempt = self.store.mark_processing(item.id).await?.retry_count;
            debug!(target = "orchestrator", attempt, "Requesting speech");

            let speech = SpeechRequest::new(item.text.clone(), item.voice)
                .with_style(request.style.clone())
                .with_context(self.context.build(script, &item.text));

            let started = Instant::now();
            let result = tokio::select! {
                res = self.client.synthesize(speech) => res,
                _ = cancel.cancelled() => {
                    self.store.mark_pending(item.id).await?;
                    return Ok(ItemOutcome::Cancelled);
                }
            };
            metrics.record_request(started.elapsed()).await;

            match result.and_then(|pcm| self.encode(pcm)) {
                Ok(clip) => {
                    debug!(target = "orchestrator", attempt, duration_ms = clip.duration_ms, "Segment completed");
                    self.store.mark_completed(item.id, clip).await?;
                    return Ok(ItemOutcome::Completed);
                }
                Err(SpeechError::RateLimited(msg)) => {
                    metrics.record_rate_limited().await;
                    if rate_limit_retries >= policy.max_rate_limit_retries {
                        warn!(target = "orchestrator", attempt, error = %msg, "Rate-limit retries exhausted");
                        self.store
                            .mark_error(item.id, format!("Rate limit retries exhausted: {msg}"))
                            .await?;
                        return Ok(ItemOutcome::Failed);
                    }
                    rate_limit_retries += 1;
                    let secs = self.sample_cooldown();
                    warn!(target = "orchestrator", attempt, cooldown_secs = secs, error = %msg, "Rate limited; cooling down");
                    self.store.mark_waiting(item.id, RATE_LIMIT_NOTICE).await?;
                    if self
                        .cooldown(item.id, CooldownKind::RateLimit, secs, cancel)
                        .await
                        .is_err()
                    {
                        self.store.mark_pending(item.id).await?;
                        return Ok(ItemOutcome::Cancelled);
                    }
                }
                Err(SpeechError::SafetyBlocked(msg)) => {
                    metrics.record_safety_blocked().await;
                    warn!(target = "orchestrator", attempt, reason = %msg, "Segment blocked by safety filter");
                    self.store
                        .mark_error(item.id, SpeechError::SafetyBlocked(msg).to_string())
                        .await?;
                    return Ok(ItemOutcome::Failed);
                }
                Err(SpeechError::Other(msg)) => {
                    metrics.record_transient_failure().await;
                    transient_failures += 1;
                    warn!(target = "orchestrator", attempt, error = %msg, "Speech request failed");
                    self.store.mark_error(item.id, msg).await?;
                    if transient_failures >= policy.max_transient_attempts {
                        return Ok(ItemOutcome::Failed);
                    }
                    if self
                        .cooldown(item.id, CooldownKind::RetryDelay, policy.transient_delay_secs, cancel)
                        .await
                        .is_err()
                    {
                        self.store.mark_pending(item.id).await?;
                        return Ok(ItemOutcome::Cancelled);
                    }
                }
            }
        }
    }

    fn sample_cooldown(&self) -> u64 {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        self.cfg.retry.rate_limit_cooldown.sample(&mut *rng)
    }

    async fn cooldown(
        &self,
        item_id: Uuid,
        kind: CooldownKind,
        secs: u64,
        cancel: &CancellationToken,
    ) -> std::result::Result<(), Cancelled> {
        let bus = self.store.bus();
        self.countdown
            .run(secs, cancel, |remaining_secs| {
                bus.publish(ProductionEvent::Countdown {
                    item_id,
                    kind,
                    remaining_secs,
                })
            })
            .await?;
        if secs > 0 {
            bus.publish(ProductionEvent::CountdownFinished { item_id, kind });
        }
        Ok(())
    }

    fn encode(&self, pcm: Vec<u8>) -> std::result::Result<AudioClip, SpeechError> {
        if pcm.is_empty() {
            return Err(SpeechError::Other(
                "Provider returned no audio data".to_string(),
            ));
        }
        let wav = encode_wav(&pcm, self.cfg.sample_rate)
            .map_err(|e| SpeechError::Other(format!("Audio encoding failed: {e}")))?;
        let duration_ms = WavHeader::parse(&wav)
            .map(|h| (h.duration_secs() * 1000.0).round() as u64)
            .unwrap_or(0);
        Ok(AudioClip {
            wav: Arc::from(wav),
            sample_rate: self.cfg.sample_rate,
            duration_ms,
        })
    }
}
