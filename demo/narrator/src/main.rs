mod config;
use config::NarratorConfig;
use narrator_core::metadata;
use narrator_core::{
    ArchiveBuilder, ArchiveError, CancellationToken, CooldownKind, NarratorError,
    ProductionEvent, ProductionOrchestrator, RunRequest,
};
use narrator_speech::GeminiSpeechClient;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logging / tracing
    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info,narrator_core=info,narrator=info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    // Usage: narrator [SCRIPT] [--preview]
    let mut preview = false;
    let mut script_arg = None;
    for arg in std::env::args().skip(1) {
        if arg == "--preview" {
            preview = true;
        } else {
            script_arg = Some(arg);
        }
    }

    // Load configuration (defaults + env + optional TOML overlay)
    let mut cfg = NarratorConfig::load();
    if let Some(path) = script_arg {
        cfg.script_path = path.into();
    }

    let script = tokio::fs::read_to_string(&cfg.script_path).await?;
    tokio::fs::create_dir_all(&cfg.output_dir).await?;
    info!(
        target = "narrator",
        script = %cfg.script_path.display(),
        output = %cfg.output_dir.display(),
        voice = %cfg.voice,
        model = %cfg.gemini.model,
        keys = cfg.gemini.api_keys.len(),
        "Starting narrator"
    );

    let client = GeminiSpeechClient::new(cfg.gemini.clone())?;
    let orchestrator = Arc::new(ProductionOrchestrator::new(Arc::new(client), cfg.production));

    if preview {
        let clip = orchestrator
            .preview(&script, cfg.voice, cfg.style.as_deref())
            .await?;
        let path = cfg.output_dir.join(format!("preview_{}.wav", cfg.voice));
        tokio::fs::write(&path, clip.bytes()).await?;
        info!(target = "narrator", path = %path.display(), duration_ms = clip.duration_ms, "Preview written");
        return Ok(());
    }

    // Progress log from the event stream
    let mut events = orchestrator.subscribe();
    let progress_task = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ProductionEvent::ItemUpdated { item }) => {
                    if let Some(err) = &item.error {
                        warn!(target = "narrator", group = item.group, attempt = item.retry_count, error = %err, "Segment failed");
                    } else if let Some(notice) = &item.notice {
                        warn!(target = "narrator", group = item.group, notice = %notice, "Segment waiting");
                    } else {
                        info!(target = "narrator", group = item.group, status = item.status.as_str(), attempt = item.retry_count, "Segment update");
                    }
                }
                Ok(ProductionEvent::Countdown { kind, remaining_secs, .. }) => {
                    if kind == CooldownKind::Pacing {
                        debug!(target = "narrator", remaining_secs, "Pacing");
                    } else {
                        info!(target = "narrator", ?kind, remaining_secs, "Cooling down");
                    }
                }
                Ok(ProductionEvent::RunFinished { .. }) => break,
                Ok(_) => {}
                Err(RecvError::Lagged(n)) => {
                    warn!(target = "narrator", skipped = n, "Progress log lagging");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // Ctrl+C cancels the run at the next suspension point
    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if signal::ctrl_c().await.is_ok() {
                info!(target = "narrator", "Cancelling production run...");
                cancel.cancel();
            }
        })
    };

    let mut request = RunRequest::new(script, cfg.lines_per_batch)
        .with_voice(cfg.voice)
        .with_pacing(cfg.pacing_delay_secs);
    request.style = cfg.style.clone();

    let report = orchestrator.run(request, &cancel).await?;
    ctrl_c.abort();
    let _ = progress_task.await;
    info!(target = "narrator", report = %serde_json::to_string(&report)?, "Run report");

    match orchestrator.build_archive().await {
        Ok(archive) => {
            let path = cfg.output_dir.join(ArchiveBuilder::default_file_name());
            archive.write_to(&path)?;
        }
        Err(NarratorError::Archive(ArchiveError::Empty)) => {
            warn!(target = "narrator", "No completed segments; skipping archive");
        }
        Err(e) => {
            error!(target = "narrator", error = %e, "Failed to build archive");
        }
    }

    let json = orchestrator.export_metadata(&cfg.gemini.api_keys).await?;
    let path = cfg.output_dir.join(metadata::default_file_name());
    tokio::fs::write(&path, json).await?;
    info!(target = "narrator", path = %path.display(), "Metadata written");

    Ok(())
}
