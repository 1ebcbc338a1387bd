//! Xtream Codes API types.
//!
//! Provider JSON is loosely typed (numbers arrive as strings, flags as
//! ints, bools or strings depending on the panel), so everything is mapped
//! into explicit structs with lenient field decoding right at this boundary.
//! Nothing dynamically-typed leaks past it.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Connection details for one Xtream panel.
#[derive(Debug, Clone)]
pub struct XtreamCredentials {
    /// Server base URL (e.g. `http://example.com:8080`).
    pub server: String,
    pub username: String,
    pub password: String,
}

impl XtreamCredentials {
    /// `player_api.php` base URL with encoded credentials.
    pub fn api_url(&self) -> String {
        format!(
            "{}/player_api.php?username={}&password={}",
            self.server.trim_end_matches('/'),
            urlencoding::encode(&self.username),
            urlencoding::encode(&self.password)
        )
    }

    /// Playback URL for a live stream.
    pub fn live_url(&self, stream_id: i64, extension: Option<&str>) -> String {
        format!(
            "{}/live/{}/{}/{}.{}",
            self.server.trim_end_matches('/'),
            self.username,
            self.password,
            stream_id,
            extension.unwrap_or("ts")
        )
    }

    /// Playback URL for a VOD stream.
    pub fn vod_url(&self, stream_id: i64, extension: Option<&str>) -> String {
        format!(
            "{}/movie/{}/{}/{}.{}",
            self.server.trim_end_matches('/'),
            self.username,
            self.password,
            stream_id,
            extension.unwrap_or("mp4")
        )
    }

    /// Playback URL for a series episode (provider episode id).
    pub fn series_url(&self, episode_id: &str, extension: Option<&str>) -> String {
        format!(
            "{}/series/{}/{}/{}.{}",
            self.server.trim_end_matches('/'),
            self.username,
            self.password,
            episode_id,
            extension.unwrap_or("mp4")
        )
    }

    /// XMLTV EPG feed URL of the panel.
    pub fn epg_url(&self) -> String {
        format!(
            "{}/xmltv.php?username={}&password={}",
            self.server.trim_end_matches('/'),
            urlencoding::encode(&self.username),
            urlencoding::encode(&self.password)
        )
    }
}

/// Panels encode numbers as ints or strings interchangeably.
fn de_opt_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    })
}

fn de_i64<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    Ok(de_opt_i64(d)?.unwrap_or(0))
}

/// Flags arrive as `1`, `"1"` or `true`.
fn de_flag<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Bool(b) => i64::from(b),
        Value::Number(n) => n.as_i64().unwrap_or(0),
        Value::String(s) => s.parse().unwrap_or(0),
        _ => 0,
    })
}

fn de_opt_f32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f32>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_f64().map(|f| f as f32),
        Value::String(s) => s.parse().ok(),
        _ => None,
    })
}

/// Episode ids arrive as strings or ints.
fn de_id_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

/// Authentication response from `player_api.php` without an action.
#[derive(Debug, Clone, Deserialize)]
pub struct XtreamAuthResponse {
    pub user_info: XtreamUserInfo,
    #[serde(default)]
    pub server_info: Option<XtreamServerInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct XtreamUserInfo {
    /// 1 when the panel accepted the credentials.
    #[serde(default, deserialize_with = "de_flag")]
    pub auth: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub exp_date: Option<String>,
    #[serde(default)]
    pub is_trial: Option<String>,
    #[serde(default)]
    pub active_cons: Option<String>,
    #[serde(default)]
    pub max_connections: Option<String>,
}

impl XtreamUserInfo {
    pub fn is_authenticated(&self) -> bool {
        self.auth == 1
    }

    /// Account expiry as a Unix timestamp, when the panel provides one.
    pub fn exp_timestamp(&self) -> Option<i64> {
        self.exp_date.as_ref()?.parse().ok()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct XtreamServerInfo {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub port: Option<String>,
    #[serde(default)]
    pub https_port: Option<String>,
    #[serde(default)]
    pub server_protocol: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
}

/// Category for live, VOD or series listings.
#[derive(Debug, Clone, Deserialize)]
pub struct XtreamCategory {
    #[serde(default, deserialize_with = "de_id_string")]
    pub category_id: String,
    #[serde(default)]
    pub category_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct XtreamLiveStream {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "de_i64")]
    pub stream_id: i64,
    #[serde(default)]
    pub stream_icon: Option<String>,
    #[serde(default)]
    pub epg_channel_id: Option<String>,
    #[serde(default, deserialize_with = "de_id_string")]
    pub category_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct XtreamVodStream {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "de_i64")]
    pub stream_id: i64,
    #[serde(default)]
    pub stream_icon: Option<String>,
    #[serde(default, deserialize_with = "de_opt_f32")]
    pub rating_5based: Option<f32>,
    #[serde(default, deserialize_with = "de_id_string")]
    pub category_id: String,
    #[serde(default)]
    pub container_extension: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct XtreamSeries {
    #[serde(default, deserialize_with = "de_i64")]
    pub series_id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cover: Option<String>,
    #[serde(default)]
    pub plot: Option<String>,
    #[serde(default)]
    pub cast: Option<String>,
    #[serde(default)]
    pub director: Option<String>,
    #[serde(default, rename = "releaseDate")]
    pub release_date: Option<String>,
    #[serde(default, deserialize_with = "de_opt_f32")]
    pub rating_5based: Option<f32>,
    #[serde(default, deserialize_with = "de_id_string")]
    pub category_id: String,
}

/// Detailed series info from `get_series_info`.
#[derive(Debug, Clone, Deserialize)]
pub struct XtreamSeriesInfo {
    #[serde(default)]
    pub seasons: Option<Vec<XtreamSeason>>,
    /// Episodes grouped by season number (key is the season as a string).
    #[serde(default)]
    pub episodes: HashMap<String, Vec<XtreamEpisode>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct XtreamSeason {
    #[serde(default, deserialize_with = "de_opt_i64")]
    pub season_number: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct XtreamEpisode {
    #[serde(default, deserialize_with = "de_id_string")]
    pub id: String,
    #[serde(default, deserialize_with = "de_i64")]
    pub episode_num: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub container_extension: Option<String>,
    #[serde(default, deserialize_with = "de_opt_i64")]
    pub season: Option<i64>,
    #[serde(default)]
    pub info: Option<XtreamEpisodeInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct XtreamEpisodeInfo {
    #[serde(default)]
    pub plot: Option<String>,
    #[serde(default, deserialize_with = "de_opt_i64")]
    pub duration_secs: Option<i64>,
    #[serde(default)]
    pub movie_image: Option<String>,
}
