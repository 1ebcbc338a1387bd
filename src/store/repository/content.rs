//! Playlist content repository: batched deletes and inserts.

use serde::Serialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::IngestError;
use crate::models::Channel;
use crate::store::{collections, Document, DocumentStore, StoreError, MAX_BATCH};

/// Delete every row of `collection` owned by `playlist_id`, paging with the
/// batch limit until a short page signals no more rows. Returns the number
/// of rows deleted.
///
/// Cancellation is honored between batches only; a batch that started is
/// always committed.
pub async fn delete_by_playlist(
    store: &dyn DocumentStore,
    collection: &str,
    playlist_id: &str,
    cancel: &CancellationToken,
) -> Result<u64, IngestError> {
    let mut deleted = 0u64;
    loop {
        let page = store
            .query_eq(collection, "playlistId", &json!(playlist_id), Some(MAX_BATCH))
            .await?;
        if page.is_empty() {
            break;
        }

        let count = page.len();
        store
            .batch_delete(collection, page.into_iter().map(|d| d.id).collect())
            .await?;
        deleted += count as u64;

        if count < MAX_BATCH {
            break;
        }
        if cancel.is_cancelled() {
            return Err(IngestError::Cancelled);
        }
    }
    Ok(deleted)
}

/// Insert rows in batches of [`MAX_BATCH`]. Row ids come from each
/// serialized document's `id` field. Returns the number of rows written.
pub async fn insert_all<T: Serialize>(
    store: &dyn DocumentStore,
    collection: &str,
    items: &[T],
    cancel: &CancellationToken,
) -> Result<usize, IngestError> {
    let mut written = 0usize;
    for chunk in items.chunks(MAX_BATCH) {
        if cancel.is_cancelled() {
            return Err(IngestError::Cancelled);
        }

        let docs = chunk
            .iter()
            .map(|item| {
                let data = serde_json::to_value(item).map_err(StoreError::from)?;
                let id = data
                    .get("id")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                Ok(Document::new(id, data))
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        store.batch_write(collection, docs).await?;
        written += chunk.len();
    }
    Ok(written)
}

/// All channels belonging to a user's playlists, used to build the
/// `epg_channel_id -> channel_id` map before an EPG import. Equality
/// filters only: playlists by user, then channels per playlist.
pub async fn list_channels_for_user(
    store: &dyn DocumentStore,
    user_id: &str,
) -> Result<Vec<Channel>, IngestError> {
    let playlists = store
        .query_eq(collections::PLAYLISTS, "userId", &json!(user_id), None)
        .await?;

    let mut channels = Vec::new();
    for playlist in playlists {
        let rows = store
            .query_eq(collections::CHANNELS, "playlistId", &json!(playlist.id), None)
            .await?;
        for row in rows {
            match serde_json::from_value::<Channel>(row.data) {
                Ok(channel) => channels.push(channel),
                Err(e) => warn!(id = %row.id, error = %e, "skipping undecodable channel row"),
            }
        }
    }
    Ok(channels)
}
