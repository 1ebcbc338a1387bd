use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source kind of a configured playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaylistKind {
    M3u,
    Xtream,
}

/// Media type classification for parsed items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Live,
    Movie,
    Series,
}

impl Default for MediaKind {
    fn default() -> Self {
        Self::Live
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Live => write!(f, "live"),
            MediaKind::Movie => write!(f, "movie"),
            MediaKind::Series => write!(f, "series"),
        }
    }
}

/// Per-playlist content counters written back after every ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistStats {
    pub channel_count: usize,
    pub movie_count: usize,
    pub series_count: usize,
    pub category_count: usize,
}

/// A user-configured playlist source. Created elsewhere; the orchestrator is
/// the only writer of its lifecycle fields during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistSource {
    pub id: String,
    pub user_id: String,
    pub kind: PlaylistKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// M3U playlist URL (for `kind = m3u`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Xtream panel connection (for `kind = xtream`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub active: bool,
    /// Advisory run-level mutex: set while an ingestion run is in flight.
    pub parsing: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_fetched_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_epg_fetched_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub stats: PlaylistStats,
}

impl PlaylistSource {
    /// New active M3U source with empty stats.
    pub fn m3u(id: impl Into<String>, user_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            kind: PlaylistKind::M3u,
            name: None,
            url: Some(url.into()),
            server: None,
            username: None,
            password: None,
            active: true,
            parsing: false,
            last_fetched_at: None,
            last_epg_fetched_at: None,
            stats: PlaylistStats::default(),
        }
    }

    /// New active Xtream source with empty stats.
    pub fn xtream(
        id: impl Into<String>,
        user_id: impl Into<String>,
        server: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            kind: PlaylistKind::Xtream,
            name: None,
            url: None,
            server: Some(server.into()),
            username: Some(username.into()),
            password: Some(password.into()),
            active: true,
            parsing: false,
            last_fetched_at: None,
            last_epg_fetched_at: None,
            stats: PlaylistStats::default(),
        }
    }
}

/// Transient result of parsing one EXTINF/URL pair. Never persisted; always
/// mapped into a [`Channel`], [`Movie`] or [`SeriesItem`] first.
#[derive(Debug, Clone, Default)]
pub struct RawPlaylistItem {
    pub name: String,
    pub logo: String,
    pub category: String,
    pub tvg_id: String,
    pub tvg_name: String,
    pub language: String,
    pub country: String,
    pub url: String,
}

/// Live TV channel, owned by a playlist and replaced wholesale on re-import.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: String,
    pub playlist_id: String,
    pub name: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    pub category: String,
    /// Raw provider EPG identifier (`tvg-id` / `epg_channel_id`), used to
    /// join XMLTV programmes onto this channel.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epg_channel_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<i64>,
}

/// VOD movie, owned by a playlist.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    pub id: String,
    pub playlist_id: String,
    pub name: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Season/episode numbers inferred from an item name, with the pattern text
/// stripped out of the series name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeInfo {
    pub season: u32,
    pub episode: u32,
    pub series_name: String,
}

/// Credentials + remote id needed to resolve an Xtream series' episodes on
/// demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XtreamSeriesRef {
    pub server: String,
    pub username: String,
    pub password: String,
    pub series_id: i64,
}

/// Series entry, owned by a playlist.
///
/// For M3U sources each inferred episode is stored as one series row tagged
/// with `episode_info` and carrying that episode's stream url. For Xtream
/// sources one row per series is stored with `remote` set; episodes are
/// resolved lazily and never bulk-persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesItem {
    pub id: String,
    pub playlist_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cast: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub director: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode_info: Option<EpisodeInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<XtreamSeriesRef>,
}

/// A resolved episode. Derived on demand, never bulk-persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    /// Deterministic: `{seriesId}_S{season}_E{episode}`, so repeated
    /// resolution is idempotent and cacheable by the caller.
    pub id: String,
    pub series_id: i64,
    pub season: u32,
    pub episode: u32,
    pub title: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Result of on-demand episode resolution for one series.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesEpisodes {
    pub total_seasons: usize,
    pub episodes: Vec<Episode>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&MediaKind::Live).unwrap(), "\"live\"");
        assert_eq!(
            serde_json::to_string(&MediaKind::Series).unwrap(),
            "\"series\""
        );
    }

    #[test]
    fn test_playlist_source_roundtrip() {
        let source = PlaylistSource::m3u("p1", "u1", "http://example.com/list.m3u");
        let json = serde_json::to_value(&source).unwrap();
        assert_eq!(json["kind"], "m3u");
        assert_eq!(json["userId"], "u1");
        assert!(json.get("server").is_none());

        let back: PlaylistSource = serde_json::from_value(json).unwrap();
        assert_eq!(back.url.as_deref(), Some("http://example.com/list.m3u"));
        assert!(!back.parsing);
    }
}
