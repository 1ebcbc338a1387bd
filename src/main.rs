//! Demo binary: ingest one playlist URL into the in-memory store and print
//! the resulting stats. `get.php` URLs are upgraded to the Xtream API path.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use iptv_ingest::services::xtream;
use iptv_ingest::store::repository::playlists;
use iptv_ingest::{
    ClassifierRules, Config, ContentClassifier, DocumentStore, IngestOptions, IngestProgress,
    IngestService, M3uParser, MemoryStore, ProgressFn, ResilientFetcher,
};
use iptv_ingest::models::PlaylistSource;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "iptv_ingest=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let url = std::env::args()
        .nth(1)
        .context("usage: iptv-ingest <playlist-url>")?;

    let config = Config::from_env();

    let rules = match &config.classifier_rules_path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading classifier rules from {path}"))?;
            ClassifierRules::from_json(&json)?
        }
        None => ClassifierRules::default(),
    };
    let classifier = Arc::new(ContentClassifier::new(rules)?);

    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    let fetcher = ResilientFetcher::new(&config);
    let service = IngestService::new(
        Arc::clone(&store),
        fetcher,
        M3uParser::new(classifier),
        config,
    );

    let playlist = match xtream::extract_credentials(&url) {
        Some(creds) => {
            tracing::info!(server = %creds.server, "detected xtream panel url");
            PlaylistSource::xtream(
                Uuid::new_v4().to_string(),
                "local",
                creds.server,
                creds.username,
                creds.password,
            )
        }
        None => PlaylistSource::m3u(Uuid::new_v4().to_string(), "local", &url),
    };
    playlists::save(store.as_ref(), &playlist).await?;

    let progress: ProgressFn = Arc::new(|p: IngestProgress| {
        tracing::info!(step = %p.step, percent = p.percent, "progress");
    });
    let options = IngestOptions {
        progress: Some(progress),
        cancel: Default::default(),
    };

    let outcome = service.ingest(&playlist, &options).await?;
    tracing::info!(
        channels = outcome.stats.channel_count,
        movies = outcome.stats.movie_count,
        series = outcome.stats.series_count,
        categories = outcome.stats.category_count,
        rows_written = outcome.rows_written,
        "ingestion finished"
    );

    Ok(())
}
