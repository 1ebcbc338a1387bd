use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

/// One program-guide entry parsed from an XMLTV feed.
///
/// `channel_id` is null straight out of the parser; the orchestrator fills
/// it in from the user's channel map before persisting. `epg_channel_id` is
/// the raw provider identifier from the `channel` attribute.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpgProgram {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epg_channel_id: Option<String>,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl EpgProgram {
    /// Deterministic upsert identity: channel linkage plus the start instant
    /// floored to the second. Re-importing the same feed window overwrites
    /// instead of duplicating.
    pub fn doc_id(&self) -> String {
        let raw = format!(
            "{}:{}|{}",
            self.channel_id.as_deref().unwrap_or(""),
            self.epg_channel_id.as_deref().unwrap_or(""),
            self.start.timestamp()
        );
        let mut hasher = Sha1::new();
        hasher.update(raw.as_bytes());
        format!("prog_{:x}", hasher.finalize())
    }
}
