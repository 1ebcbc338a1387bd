//! EPG program repository: idempotent upserts and retention deletes.

use chrono::{DateTime, Utc};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::error::IngestError;
use crate::models::EpgProgram;
use crate::store::{collections, Document, DocumentStore, StoreError, MAX_BATCH};

/// Upsert programs in batches, keyed by each program's derived doc id so a
/// re-import of the same feed window overwrites instead of duplicating.
pub async fn upsert_programs(
    store: &dyn DocumentStore,
    programs: &[EpgProgram],
    cancel: &CancellationToken,
) -> Result<usize, IngestError> {
    let mut written = 0usize;
    for chunk in programs.chunks(MAX_BATCH) {
        if cancel.is_cancelled() {
            return Err(IngestError::Cancelled);
        }

        let docs = chunk
            .iter()
            .map(|program| {
                let data = serde_json::to_value(program).map_err(StoreError::from)?;
                Ok(Document::new(program.doc_id(), data))
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        store.batch_write(collections::PROGRAMS, docs).await?;
        written += chunk.len();
    }
    Ok(written)
}

/// Delete every program that ended at or before `cutoff`, paging by the
/// batch limit. A cutoff of "now" clears everything that already finished.
/// Returns the number of rows deleted.
pub async fn delete_programs_before(
    store: &dyn DocumentStore,
    cutoff: DateTime<Utc>,
) -> Result<u64, IngestError> {
    let mut deleted = 0u64;
    loop {
        let page = store
            .query_lte(collections::PROGRAMS, "end", &json!(cutoff), Some(MAX_BATCH))
            .await?;
        if page.is_empty() {
            break;
        }

        let count = page.len();
        store
            .batch_delete(
                collections::PROGRAMS,
                page.into_iter().map(|d| d.id).collect(),
            )
            .await?;
        deleted += count as u64;

        if count < MAX_BATCH {
            break;
        }
    }
    Ok(deleted)
}
