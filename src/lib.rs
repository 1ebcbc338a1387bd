//! Resilient IPTV playlist ingestion.
//!
//! Turns an arbitrary M3U playlist, an Xtream Codes API session or an XMLTV
//! EPG feed into normalized, classified, persisted records while tolerating
//! unreliable upstream servers, huge inputs and concurrent re-imports.
//!
//! The pipeline, leaves first:
//!
//! - [`services::fetch`] — GET with timeout, failure classification and
//!   exponential backoff. Used by everything else.
//! - [`services::m3u_parser`] — single-pass M3U parser emitting typed
//!   channel/movie/series streams plus a category set.
//! - [`services::xtream`] — Xtream Codes authentication, typed collection
//!   fetchers and lazy per-series episode resolution.
//! - [`services::epg_parser`] — streaming XMLTV parser with channel-identity
//!   mapping and retention cleanup.
//! - [`services::ingest`] — the orchestrator sequencing fetch → parse →
//!   delete-stale → batch-persist → stats update with progress reporting;
//!   the only writer against the [`store::DocumentStore`] boundary.

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod store;

pub use config::Config;
pub use error::{FetchError, IngestError};
pub use services::classifier::{ClassifierRules, ContentClassifier};
pub use services::epg_parser::EpgParser;
pub use services::fetch::{FetchOptions, ResilientFetcher};
pub use services::ingest::{
    IngestOptions, IngestOutcome, IngestProgress, IngestService, IngestStep, ProgressFn,
};
pub use services::m3u_parser::{M3uParser, ParsedPlaylist};
pub use services::xtream::{XtreamClient, XtreamCredentials};
pub use store::{DocumentStore, MemoryStore, StoreError};
