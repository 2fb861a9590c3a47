//! JSON report of the production history.

use crate::item::{ItemStatus, ProductionItem};
use crate::voice::VoiceName;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct ItemMetadata<'a> {
    pub id: Uuid,
    pub text: &'a str,
    pub voice: VoiceName,
    pub status: ItemStatus,
    pub group: usize,
    pub retry_count: u32,
    pub error: Option<&'a str>,
    pub cloud_url: Option<&'a str>,
    pub api_key_hint: String,
}

/// `...` followed by the last four characters of `key`, if it has at least four.
pub fn api_key_hint(key: &str) -> Option<String> {
    let key = key.trim();
    let n = key.chars().count();
    if n < 4 {
        return None;
    }
    let tail: String = key.chars().skip(n - 4).collect();
    Some(format!("...{tail}"))
}

/// Hints for every key in the rotation pool, comma separated, or `unknown`.
///
/// A request may use any key of the pool, so no single key can be attributed
/// to an item.
pub fn key_pool_hint<S: AsRef<str>>(api_keys: &[S]) -> String {
    let hints: Vec<String> = api_keys
        .iter()
        .filter_map(|k| api_key_hint(k.as_ref()))
        .collect();
    if hints.is_empty() {
        "unknown".to_string()
    } else {
        hints.join(",")
    }
}

/// Pretty-printed JSON array with one object per item, in display order.
pub fn export_metadata<S: AsRef<str>>(
    items: &[ProductionItem],
    api_keys: &[S],
) -> Result<String, serde_json::Error> {
    let hint = key_pool_hint(api_keys);
    let rows: Vec<ItemMetadata<'_>> = items
        .iter()
        .map(|item| ItemMetadata {
            id: item.id,
            text: &item.text,
            voice: item.voice,
            status: item.status,
            group: item.group,
            retry_count: item.retry_count,
            error: item.error.as_deref(),
            cloud_url: item.cloud_url.as_deref(),
            api_key_hint: hint.clone(),
        })
        .collect();
    serde_json::to_string_pretty(&rows)
}

/// `production_data_<unix-millis>.json`
pub fn default_file_name() -> String {
    format!(
        "production_data_{}.json",
        chrono::Utc::now().timestamp_millis()
    )
}
