//! Playlist metadata repository.
//!
//! Playlist documents are merge-updated, never replaced: the orchestrator
//! only touches the lifecycle fields it owns (`parsing`, stats, last-fetch
//! stamps).

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::error::IngestError;
use crate::models::{PlaylistSource, PlaylistStats};
use crate::store::{collections, DocumentStore};

/// Load a playlist document.
pub async fn get(
    store: &dyn DocumentStore,
    playlist_id: &str,
) -> Result<Option<PlaylistSource>, IngestError> {
    let doc = store.get(collections::PLAYLISTS, playlist_id).await?;
    match doc {
        Some(data) => Ok(Some(serde_json::from_value(data).map_err(|e| {
            IngestError::parse("playlist document", e.to_string())
        })?)),
        None => Ok(None),
    }
}

/// Store a full playlist document (used when a source is first configured).
pub async fn save(store: &dyn DocumentStore, playlist: &PlaylistSource) -> Result<(), IngestError> {
    let data = serde_json::to_value(playlist)
        .map_err(|e| IngestError::parse("playlist document", e.to_string()))?;
    store.set(collections::PLAYLISTS, &playlist.id, data).await?;
    Ok(())
}

/// Flip the advisory `parsing` flag.
pub async fn set_parsing(
    store: &dyn DocumentStore,
    playlist_id: &str,
    parsing: bool,
) -> Result<(), IngestError> {
    store
        .update(
            collections::PLAYLISTS,
            playlist_id,
            json!({ "parsing": parsing }),
        )
        .await?;
    Ok(())
}

/// Merge the post-run summary: stats, fetch stamp, parsing cleared.
pub async fn finish_run(
    store: &dyn DocumentStore,
    playlist_id: &str,
    stats: &PlaylistStats,
    fetched_at: DateTime<Utc>,
) -> Result<(), IngestError> {
    store
        .update(
            collections::PLAYLISTS,
            playlist_id,
            json!({
                "stats": stats,
                "lastFetchedAt": fetched_at,
                "parsing": false,
            }),
        )
        .await?;
    Ok(())
}

/// Merge the EPG import stamp.
pub async fn mark_epg_fetched(
    store: &dyn DocumentStore,
    playlist_id: &str,
    fetched_at: DateTime<Utc>,
) -> Result<(), IngestError> {
    store
        .update(
            collections::PLAYLISTS,
            playlist_id,
            json!({ "lastEpgFetchedAt": fetched_at }),
        )
        .await?;
    Ok(())
}
