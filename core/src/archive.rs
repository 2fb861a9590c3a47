//! Zip packaging of completed clips.
//!
//! Entry names are `<NN>_<voice>_<snippet>.wav`, numbered by display order
//! among the completed items. Items that are pending, processing or failed
//! are skipped without error.

use crate::item::ProductionItem;
use crate::voice::VoiceName;
use std::io::{Cursor, Write};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const SNIPPET_CHARS: usize = 20;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("No completed audio files to archive")]
    Empty,

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive worker failed: {0}")]
    Worker(String),
}

/// A finished zip image and the names of its entries, in order.
#[derive(Debug, Clone)]
pub struct Archive {
    pub bytes: Vec<u8>,
    pub entries: Vec<String>,
}

impl Archive {
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), ArchiveError> {
        std::fs::write(path.as_ref(), &self.bytes)?;
        info!(target = "archive", path = %path.as_ref().display(), entries = self.entries.len(), "Archive written");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ArchiveBuilder {
    compression: CompressionMethod,
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self {
            compression: CompressionMethod::Deflated,
        }
    }
}

impl ArchiveBuilder {
    pub fn new(compression: CompressionMethod) -> Self {
        Self { compression }
    }

    /// `production_batch_<unix-millis>.zip`
    pub fn default_file_name() -> String {
        format!(
            "production_batch_{}.zip",
            chrono::Utc::now().timestamp_millis()
        )
    }

    /// Bundle every completed item of `items` (given in display order).
    pub fn build(&self, items: &[ProductionItem]) -> Result<Archive, ArchiveError> {
        let completed: Vec<&ProductionItem> = items.iter().filter(|i| i.is_completed()).collect();
        if completed.is_empty() {
            return Err(ArchiveError::Empty);
        }

        let options = SimpleFileOptions::default().compression_method(self.compression);
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let mut entries = Vec::with_capacity(completed.len());

        for (idx, item) in completed.iter().enumerate() {
            let Some(clip) = item.audio.as_ref() else {
                continue;
            };
            let name = entry_name(idx + 1, item.voice, &item.text);
            debug!(target = "archive", entry = %name, bytes = clip.wav.len(), "Adding entry");
            zip.start_file(name.clone(), options)?;
            zip.write_all(clip.bytes())?;
            entries.push(name);
        }

        let bytes = zip.finish()?.into_inner();
        info!(target = "archive", entries = entries.len(), bytes = bytes.len(), "Archive built");
        Ok(Archive { bytes, entries })
    }

    /// Same as `build`, on a blocking worker thread.
    pub async fn build_blocking(self, items: Vec<ProductionItem>) -> Result<Archive, ArchiveError> {
        tokio::task::spawn_blocking(move || self.build(&items))
            .await
            .map_err(|e| ArchiveError::Worker(e.to_string()))?
    }
}

/// `<NN>_<voice>_<snippet>.wav`
pub fn entry_name(sequence: usize, voice: VoiceName, text: &str) -> String {
    format!("{:02}_{}_{}.wav", sequence, voice, snippet(text))
}

/// First characters of `text`, lowercased, runs of anything that is not an
/// ASCII letter or digit folded into a single `_`.
pub fn snippet(text: &str) -> String {
    let mut out = String::with_capacity(SNIPPET_CHARS);
    for c in text.chars().take(SNIPPET_CHARS) {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out
}
