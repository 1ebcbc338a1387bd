//! Ingestion orchestrator.
//!
//! Owns the end-to-end sequence for one playlist: fetch → parse (or remote
//! fetch) → delete-stale → batch-persist → stats update, with step-level
//! progress reporting. This is the only component that writes to the store.
//!
//! Replacement is strictly delete-before-insert: stale rows for the playlist
//! are removed before any new row is written, so the delete can never touch
//! rows created by the in-flight run. Committed batches are not rolled back
//! on failure; a re-run repeats the full delete+insert sequence, which is
//! safe because deletes are idempotent.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::IngestError;
use crate::models::{PlaylistKind, PlaylistSource, PlaylistStats};
use crate::services::epg_parser::{self, EpgParser};
use crate::services::fetch::ResilientFetcher;
use crate::services::m3u_parser::{M3uParser, ParsedPlaylist};
use crate::services::xtream::{XtreamClient, XtreamCredentials};
use crate::store::repository::{content, playlists, programs};
use crate::store::{collections, DocumentStore};

/// Run phases, reported in order through the progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStep {
    Fetching,
    Parsing,
    FetchingRemote,
    CleaningStale,
    Saving,
    UpdatingStats,
    Completed,
    Failed,
}

impl std::fmt::Display for IngestStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let step = match self {
            IngestStep::Fetching => "fetching",
            IngestStep::Parsing => "parsing",
            IngestStep::FetchingRemote => "fetching_remote",
            IngestStep::CleaningStale => "cleaning_stale",
            IngestStep::Saving => "saving",
            IngestStep::UpdatingStats => "updating_stats",
            IngestStep::Completed => "completed",
            IngestStep::Failed => "failed",
        };
        write!(f, "{step}")
    }
}

#[derive(Debug, Clone, Copy)]
pub struct IngestProgress {
    pub step: IngestStep,
    pub percent: u8,
}

pub type ProgressFn = Arc<dyn Fn(IngestProgress) + Send + Sync>;

/// Per-run options: an optional progress callback and a cancellation token.
/// Cancellation is honored between batches; the batch in flight commits.
#[derive(Clone, Default)]
pub struct IngestOptions {
    pub progress: Option<ProgressFn>,
    pub cancel: CancellationToken,
}

/// Terminal summary of a successful run.
#[derive(Debug, Clone, Copy)]
pub struct IngestOutcome {
    pub stats: PlaylistStats,
    pub rows_deleted: u64,
    pub rows_written: usize,
}

pub struct IngestService {
    store: Arc<dyn DocumentStore>,
    fetcher: ResilientFetcher,
    parser: M3uParser,
    config: Config,
}

impl IngestService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        fetcher: ResilientFetcher,
        parser: M3uParser,
        config: Config,
    ) -> Self {
        Self {
            store,
            fetcher,
            parser,
            config,
        }
    }

    pub fn store(&self) -> Arc<dyn DocumentStore> {
        Arc::clone(&self.store)
    }

    /// Run one full ingestion for a playlist.
    ///
    /// On any failure the playlist's `parsing` flag is cleared and the error
    /// surfaces to the caller; the playlist is never left stuck mid-run.
    pub async fn ingest(
        &self,
        playlist: &PlaylistSource,
        options: &IngestOptions,
    ) -> Result<IngestOutcome, IngestError> {
        validate(playlist)?;

        // Advisory run-level mutex
        playlists::set_parsing(self.store.as_ref(), &playlist.id, true).await?;

        match self.run(playlist, options).await {
            Ok(outcome) => {
                report(options, IngestStep::Completed, 100);
                info!(
                    playlist_id = %playlist.id,
                    channels = outcome.stats.channel_count,
                    movies = outcome.stats.movie_count,
                    series = outcome.stats.series_count,
                    "ingestion completed"
                );
                Ok(outcome)
            }
            Err(err) => {
                if let Err(e) =
                    playlists::set_parsing(self.store.as_ref(), &playlist.id, false).await
                {
                    warn!(playlist_id = %playlist.id, error = %e, "failed to clear parsing flag");
                }
                report(options, IngestStep::Failed, 100);
                warn!(playlist_id = %playlist.id, error = %err, "ingestion failed");
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        playlist: &PlaylistSource,
        options: &IngestOptions,
    ) -> Result<IngestOutcome, IngestError> {
        let parsed = match playlist.kind {
            PlaylistKind::M3u => self.fetch_and_parse_m3u(playlist, options).await?,
            PlaylistKind::Xtream => self.fetch_remote(playlist, options).await?,
        };
        let stats = parsed.stats();

        // Stale rows go first; reversing this order would delete the rows
        // this run just wrote.
        report(options, IngestStep::CleaningStale, 70);
        let store = self.store.as_ref();
        let mut rows_deleted = 0u64;
        for collection in [collections::CHANNELS, collections::MOVIES, collections::SERIES] {
            rows_deleted +=
                content::delete_by_playlist(store, collection, &playlist.id, &options.cancel)
                    .await?;
        }

        report(options, IngestStep::Saving, 75);
        let mut rows_written =
            content::insert_all(store, collections::CHANNELS, &parsed.channels, &options.cancel)
                .await?;
        report(options, IngestStep::Saving, 80);
        rows_written +=
            content::insert_all(store, collections::MOVIES, &parsed.movies, &options.cancel)
                .await?;
        report(options, IngestStep::Saving, 85);
        rows_written += content::insert_all(
            store,
            collections::SERIES,
            &parsed.series_items,
            &options.cancel,
        )
        .await?;
        report(options, IngestStep::Saving, 90);

        report(options, IngestStep::UpdatingStats, 95);
        playlists::finish_run(store, &playlist.id, &stats, Utc::now()).await?;

        Ok(IngestOutcome {
            stats,
            rows_deleted,
            rows_written,
        })
    }

    async fn fetch_and_parse_m3u(
        &self,
        playlist: &PlaylistSource,
        options: &IngestOptions,
    ) -> Result<ParsedPlaylist, IngestError> {
        let url = playlist.url.as_deref().unwrap_or_default();

        report(options, IngestStep::Fetching, 0);
        let text = self.fetcher.fetch_text(url).await?;

        report(options, IngestStep::Parsing, 20);
        let parsed = self.parser.parse(&playlist.id, &text);
        report(options, IngestStep::Parsing, 60);
        Ok(parsed)
    }

    async fn fetch_remote(
        &self,
        playlist: &PlaylistSource,
        options: &IngestOptions,
    ) -> Result<ParsedPlaylist, IngestError> {
        let creds = XtreamCredentials {
            server: playlist.server.clone().unwrap_or_default(),
            username: playlist.username.clone().unwrap_or_default(),
            password: playlist.password.clone().unwrap_or_default(),
        };
        let client = XtreamClient::new(self.fetcher.clone(), creds);

        report(options, IngestStep::Fetching, 0);
        client.authenticate().await?;

        // Each collection is isolated; one broken endpoint degrades to an
        // empty list instead of failing the run.
        report(options, IngestStep::FetchingRemote, 20);
        let channels = client.live_channels(&playlist.id).await;
        report(options, IngestStep::FetchingRemote, 30);
        let movies = client.vod_movies(&playlist.id).await;
        report(options, IngestStep::FetchingRemote, 45);
        let series_items = client.series_list(&playlist.id).await;
        report(options, IngestStep::FetchingRemote, 60);

        let mut parsed = ParsedPlaylist {
            channels,
            movies,
            series_items,
            categories: Default::default(),
        };
        for category in parsed
            .channels
            .iter()
            .map(|c| &c.category)
            .chain(parsed.movies.iter().map(|m| &m.category))
            .chain(parsed.series_items.iter().map(|s| &s.category))
        {
            if !category.is_empty() {
                parsed.categories.insert(category.clone());
            }
        }
        Ok(parsed)
    }

    /// Import an XMLTV document for a user: map raw provider channel ids
    /// onto the user's stored channels, then upsert by derived key.
    /// Returns the number of programs written.
    pub async fn import_epg(
        &self,
        user_id: &str,
        xml: &str,
        options: &IngestOptions,
    ) -> Result<usize, IngestError> {
        let store = self.store.as_ref();

        let channels = content::list_channels_for_user(store, user_id).await?;
        let lookup: HashMap<String, String> = channels
            .into_iter()
            .filter_map(|c| c.epg_channel_id.map(|epg_id| (epg_id, c.id)))
            .collect();

        let mut epg_programs = EpgParser::parse(xml);
        let mapped = epg_parser::map_to_channels(&mut epg_programs, &lookup);
        info!(
            user_id,
            total = epg_programs.len(),
            mapped,
            "epg parsed, persisting"
        );

        programs::upsert_programs(store, &epg_programs, &options.cancel).await
    }

    /// [`import_epg`](Self::import_epg) for one playlist's feed, stamping
    /// the playlist's EPG fetch time on success.
    pub async fn import_epg_for_playlist(
        &self,
        playlist: &PlaylistSource,
        xml: &str,
        options: &IngestOptions,
    ) -> Result<usize, IngestError> {
        let written = self.import_epg(&playlist.user_id, xml, options).await?;
        playlists::mark_epg_fetched(self.store.as_ref(), &playlist.id, Utc::now()).await?;
        Ok(written)
    }

    /// Fetch several per-channel EPG documents under the configured
    /// concurrency cap (batches with a short inter-batch pause, to respect
    /// upstream rate limits). Failed fetches are skipped.
    pub async fn fetch_epg_documents(&self, urls: &[String]) -> Vec<String> {
        epg_parser::fetch_many(
            &self.fetcher,
            urls,
            self.config.epg_fetch_concurrency,
            self.config.epg_fetch_pause_ms,
        )
        .await
    }

    /// Delete programs that ended more than `retention_days` ago. Zero
    /// clears everything that already finished.
    pub async fn clear_old_programs(&self, retention_days: u32) -> Result<u64, IngestError> {
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(retention_days));
        programs::delete_programs_before(self.store.as_ref(), cutoff).await
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

fn report(options: &IngestOptions, step: IngestStep, percent: u8) {
    if let Some(callback) = &options.progress {
        callback(IngestProgress { step, percent });
    }
}

/// Pre-flight checks; nothing is fetched or written when these fail.
fn validate(playlist: &PlaylistSource) -> Result<(), IngestError> {
    match playlist.kind {
        PlaylistKind::M3u => {
            if playlist.url.as_deref().unwrap_or_default().trim().is_empty() {
                return Err(IngestError::Validation(
                    "m3u playlist has no url".to_string(),
                ));
            }
        }
        PlaylistKind::Xtream => {
            let missing = playlist.server.as_deref().unwrap_or_default().trim().is_empty()
                || playlist.username.as_deref().unwrap_or_default().is_empty()
                || playlist.password.as_deref().unwrap_or_default().is_empty();
            if missing {
                return Err(IngestError::Validation(
                    "xtream playlist needs server, username and password".to_string(),
                ));
            }
        }
    }
    Ok(())
}
