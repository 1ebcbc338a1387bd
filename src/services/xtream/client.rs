//! Xtream Codes API client.
//!
//! Authentication, the three bulk collection fetchers and on-demand series
//! episode resolution, all going through the resilient fetcher. A failed
//! collection fetch degrades to an empty list so one broken endpoint never
//! aborts the other collections.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::IngestError;
use crate::models::{
    Channel, Episode, Movie, SeriesEpisodes, SeriesItem, XtreamSeriesRef,
};
use crate::services::fetch::ResilientFetcher;
use crate::services::m3u_parser::item_id;

use super::types::*;

pub struct XtreamClient {
    fetcher: ResilientFetcher,
    creds: XtreamCredentials,
}

impl XtreamClient {
    pub fn new(fetcher: ResilientFetcher, creds: XtreamCredentials) -> Self {
        Self { fetcher, creds }
    }

    pub fn credentials(&self) -> &XtreamCredentials {
        &self.creds
    }

    fn action_url(&self, action: &str) -> String {
        if action.is_empty() {
            self.creds.api_url()
        } else {
            format!("{}&action={}", self.creds.api_url(), action)
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, action: &str) -> Result<T, IngestError> {
        debug!(action, server = %self.creds.server, "xtream api request");
        self.fetcher.fetch_json(&self.action_url(action)).await
    }

    /// Authenticate against the panel.
    ///
    /// Success means `user_info.auth == 1`. A response that parses but says
    /// anything else is an [`IngestError::Auth`], kept distinct from the
    /// transport errors the fetcher raises when the panel cannot be reached.
    pub async fn authenticate(&self) -> Result<XtreamAuthResponse, IngestError> {
        let body = self.fetcher.fetch_text(&self.creds.api_url()).await?;

        // Some panels answer bad credentials with an HTML error page
        let auth: XtreamAuthResponse = match serde_json::from_str(&body) {
            Ok(auth) => auth,
            Err(_) => {
                return Err(IngestError::Auth(
                    "server did not return a credentials response".to_string(),
                ))
            }
        };

        if !auth.user_info.is_authenticated() {
            let status = auth.user_info.status.as_deref().unwrap_or("unknown");
            return Err(IngestError::Auth(format!(
                "panel rejected the credentials (account status: {status})"
            )));
        }

        Ok(auth)
    }

    /// Category id → display name for one of the category endpoints.
    /// Defaults to an empty map on failure; items then keep the raw id.
    async fn category_names(&self, action: &str) -> HashMap<String, String> {
        match self.get_json::<Vec<XtreamCategory>>(action).await {
            Ok(categories) => categories
                .into_iter()
                .map(|c| (c.category_id, c.category_name))
                .collect(),
            Err(err) => {
                warn!(action, error = %err, "category fetch failed, keeping raw ids");
                HashMap::new()
            }
        }
    }

    /// All live streams mapped into [`Channel`] rows. Empty on error.
    pub async fn live_channels(&self, playlist_id: &str) -> Vec<Channel> {
        let streams: Vec<XtreamLiveStream> = match self.get_json("get_live_streams").await {
            Ok(streams) => streams,
            Err(err) => {
                warn!(error = %err, "live stream fetch failed, continuing with empty list");
                return Vec::new();
            }
        };
        let categories = self.category_names("get_live_categories").await;

        streams
            .into_iter()
            .enumerate()
            .map(|(index, stream)| {
                let url = self.creds.live_url(stream.stream_id, None);
                Channel {
                    id: item_id(playlist_id, &url, index),
                    playlist_id: playlist_id.to_string(),
                    name: stream.name,
                    category: resolve_category(&categories, &stream.category_id),
                    logo: stream.stream_icon.filter(|s| !s.is_empty()),
                    epg_channel_id: stream.epg_channel_id.filter(|s| !s.is_empty()),
                    stream_id: Some(stream.stream_id),
                    url,
                }
            })
            .collect()
    }

    /// All VOD streams mapped into [`Movie`] rows. Empty on error.
    pub async fn vod_movies(&self, playlist_id: &str) -> Vec<Movie> {
        let streams: Vec<XtreamVodStream> = match self.get_json("get_vod_streams").await {
            Ok(streams) => streams,
            Err(err) => {
                warn!(error = %err, "vod fetch failed, continuing with empty list");
                return Vec::new();
            }
        };
        let categories = self.category_names("get_vod_categories").await;

        streams
            .into_iter()
            .enumerate()
            .map(|(index, stream)| {
                let url = self
                    .creds
                    .vod_url(stream.stream_id, stream.container_extension.as_deref());
                Movie {
                    id: item_id(playlist_id, &url, index),
                    playlist_id: playlist_id.to_string(),
                    name: stream.name,
                    category: resolve_category(&categories, &stream.category_id),
                    poster: stream.stream_icon.filter(|s| !s.is_empty()),
                    rating: stream.rating_5based,
                    year: None,
                    duration_secs: None,
                    description: None,
                    url,
                }
            })
            .collect()
    }

    /// All series mapped into [`SeriesItem`] rows carrying the remote
    /// reference for lazy episode resolution. Empty on error.
    pub async fn series_list(&self, playlist_id: &str) -> Vec<SeriesItem> {
        let series: Vec<XtreamSeries> = match self.get_json("get_series").await {
            Ok(series) => series,
            Err(err) => {
                warn!(error = %err, "series fetch failed, continuing with empty list");
                return Vec::new();
            }
        };
        let categories = self.category_names("get_series_categories").await;

        series
            .into_iter()
            .enumerate()
            .map(|(index, entry)| {
                let key = format!("series:{}", entry.series_id);
                SeriesItem {
                    id: item_id(playlist_id, &key, index),
                    playlist_id: playlist_id.to_string(),
                    name: entry.name,
                    category: resolve_category(&categories, &entry.category_id),
                    poster: entry.cover.filter(|s| !s.is_empty()),
                    rating: entry.rating_5based,
                    year: entry
                        .release_date
                        .as_deref()
                        .and_then(|d| d.get(..4))
                        .and_then(|y| y.parse().ok()),
                    plot: entry.plot,
                    cast: entry.cast,
                    director: entry.director,
                    url: None,
                    episode_info: None,
                    remote: Some(XtreamSeriesRef {
                        server: self.creds.server.clone(),
                        username: self.creds.username.clone(),
                        password: self.creds.password.clone(),
                        series_id: entry.series_id,
                    }),
                }
            })
            .collect()
    }

    /// Resolve one series' episodes on demand.
    ///
    /// Never called during bulk ingestion — a panel may host thousands of
    /// series and eager episode fetching is prohibitive. Episode ids are
    /// synthesized as `{seriesId}_S{season}_E{episode}` so repeated
    /// resolution is idempotent and cacheable by the caller.
    pub async fn resolve_series_episodes(
        &self,
        series_id: i64,
    ) -> Result<SeriesEpisodes, IngestError> {
        let info: XtreamSeriesInfo = self
            .get_json(&format!("get_series_info&series_id={series_id}"))
            .await?;

        let mut episodes = Vec::new();
        for (season_key, season_episodes) in &info.episodes {
            let season_from_key: Option<i64> = season_key.parse().ok();
            for episode in season_episodes {
                let season = episode
                    .season
                    .or(season_from_key)
                    .unwrap_or(0)
                    .max(0) as u32;
                let number = episode.episode_num.max(0) as u32;
                let detail = episode.info.as_ref();
                episodes.push(Episode {
                    id: format!("{series_id}_S{season}_E{number}"),
                    series_id,
                    season,
                    episode: number,
                    title: episode.title.clone(),
                    url: self
                        .creds
                        .series_url(&episode.id, episode.container_extension.as_deref()),
                    thumbnail: detail.and_then(|i| i.movie_image.clone()),
                    duration_secs: detail.and_then(|i| i.duration_secs),
                    description: detail.and_then(|i| i.plot.clone()),
                });
            }
        }
        episodes.sort_by_key(|e| (e.season, e.episode));

        let total_seasons = info
            .seasons
            .as_ref()
            .map(|s| s.len())
            .filter(|&n| n > 0)
            .unwrap_or(info.episodes.len());

        Ok(SeriesEpisodes {
            total_seasons,
            episodes,
        })
    }
}

fn resolve_category(names: &HashMap<String, String>, id: &str) -> String {
    names.get(id).cloned().unwrap_or_else(|| id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server_uri: &str) -> XtreamClient {
        let config = Config {
            fetch_timeout_ms: 2_000,
            max_retries: 0,
            user_agent: "test".to_string(),
            epg_retention_days: 7,
            epg_fetch_concurrency: 5,
            epg_fetch_pause_ms: 0,
            classifier_rules_path: None,
        };
        XtreamClient::new(
            ResilientFetcher::new(&config),
            XtreamCredentials {
                server: server_uri.to_string(),
                username: "user".to_string(),
                password: "pass".to_string(),
            },
        )
    }

    async fn mock_action(server: &MockServer, action: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path("/player_api.php"))
            .and(query_param("action", action))
            .respond_with(ResponseTemplate::new(200).set_body_string(body.to_string()))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_authenticate_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/player_api.php"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"user_info": {"auth": 1, "status": "Active", "username": "user"},
                    "server_info": {"url": "example.com", "port": "8080"}}"#,
            ))
            .mount(&server)
            .await;

        let auth = client(&server.uri()).authenticate().await.unwrap();
        assert!(auth.user_info.is_authenticated());
        assert_eq!(auth.user_info.status.as_deref(), Some("Active"));
    }

    #[tokio::test]
    async fn test_authenticate_rejected_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"user_info": {"auth": 0, "status": "Expired"}}"#,
            ))
            .mount(&server)
            .await;

        let err = client(&server.uri()).authenticate().await.unwrap_err();
        match err {
            IngestError::Auth(message) => assert!(message.contains("Expired")),
            other => panic!("expected Auth, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_authenticate_html_body_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>blocked</html>"))
            .mount(&server)
            .await;

        let err = client(&server.uri()).authenticate().await.unwrap_err();
        assert!(matches!(err, IngestError::Auth(_)));
    }

    #[tokio::test]
    async fn test_live_channels_maps_stream_urls() {
        let server = MockServer::start().await;
        mock_action(
            &server,
            "get_live_streams",
            r#"[{"name": "CNN", "stream_id": 42, "epg_channel_id": "cnn.us", "category_id": "7"}]"#,
        )
        .await;
        mock_action(
            &server,
            "get_live_categories",
            r#"[{"category_id": "7", "category_name": "News"}]"#,
        )
        .await;

        let channels = client(&server.uri()).live_channels("p1").await;
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].name, "CNN");
        assert_eq!(channels[0].category, "News");
        assert_eq!(channels[0].epg_channel_id.as_deref(), Some("cnn.us"));
        assert_eq!(
            channels[0].url,
            format!("{}/live/user/pass/42.ts", server.uri())
        );
    }

    #[tokio::test]
    async fn test_collection_failure_degrades_to_empty() {
        let server = MockServer::start().await;
        // No mocks mounted: every request 404s
        let channels = client(&server.uri()).live_channels("p1").await;
        assert!(channels.is_empty());
        let movies = client(&server.uri()).vod_movies("p1").await;
        assert!(movies.is_empty());
    }

    #[tokio::test]
    async fn test_vod_uses_container_extension() {
        let server = MockServer::start().await;
        mock_action(
            &server,
            "get_vod_streams",
            r#"[{"name": "Matrix", "stream_id": 9, "container_extension": "mkv",
                 "rating_5based": 4.5, "category_id": "3"}]"#,
        )
        .await;
        mock_action(&server, "get_vod_categories", "[]").await;

        let movies = client(&server.uri()).vod_movies("p1").await;
        assert_eq!(movies.len(), 1);
        assert_eq!(
            movies[0].url,
            format!("{}/movie/user/pass/9.mkv", server.uri())
        );
        assert_eq!(movies[0].rating, Some(4.5));
        // Category endpoint returned nothing, raw id is kept
        assert_eq!(movies[0].category, "3");
    }

    #[tokio::test]
    async fn test_series_list_carries_remote_ref() {
        let server = MockServer::start().await;
        mock_action(
            &server,
            "get_series",
            r#"[{"series_id": 77, "name": "Dark", "releaseDate": "2017-12-01",
                 "plot": "time travel", "category_id": "5"}]"#,
        )
        .await;
        mock_action(&server, "get_series_categories", "[]").await;

        let series = client(&server.uri()).series_list("p1").await;
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].year, Some(2017));
        let remote = series[0].remote.as_ref().unwrap();
        assert_eq!(remote.series_id, 77);
        assert_eq!(remote.username, "user");
    }

    #[tokio::test]
    async fn test_resolve_series_episodes_synthesizes_ids() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/player_api.php"))
            .and(query_param("action", "get_series_info"))
            .and(query_param("series_id", "77"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"seasons": [{"season_number": 1}],
                    "episodes": {"1": [
                        {"id": "9001", "episode_num": 2, "title": "Ep 2",
                         "container_extension": "mp4",
                         "info": {"duration_secs": 2700, "plot": "second"}},
                        {"id": "9000", "episode_num": 1, "title": "Ep 1",
                         "container_extension": "mp4"}
                    ]}}"#,
            ))
            .mount(&server)
            .await;

        let resolved = client(&server.uri())
            .resolve_series_episodes(77)
            .await
            .unwrap();

        assert_eq!(resolved.total_seasons, 1);
        assert_eq!(resolved.episodes.len(), 2);
        // Sorted by (season, episode) and deterministically identified
        assert_eq!(resolved.episodes[0].id, "77_S1_E1");
        assert_eq!(resolved.episodes[1].id, "77_S1_E2");
        assert_eq!(
            resolved.episodes[1].url,
            format!("{}/series/user/pass/9001.mp4", server.uri())
        );
        assert_eq!(resolved.episodes[1].duration_secs, Some(2700));

        // Repeated resolution yields the same ids
        let again = client(&server.uri())
            .resolve_series_episodes(77)
            .await
            .unwrap();
        assert_eq!(again.episodes[0].id, resolved.episodes[0].id);
    }
}
