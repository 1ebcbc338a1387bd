//! Streaming M3U playlist parser.
//!
//! Single forward pass over lines: `#EXTINF` metadata lines bind to the next
//! `http(s)://` line, completed pairs are classified into channel, movie or
//! series-episode records. One malformed line never aborts the parse; the
//! pending item is dropped with a warning and scanning continues.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use sha1::{Digest, Sha1};

use crate::models::{
    Channel, Movie, PlaylistStats, RawPlaylistItem, SeriesItem, MediaKind,
};
use crate::services::classifier::ContentClassifier;

lazy_static! {
    /// EXTINF attributes: `tvg-id="..."`, `group-title="..."`, etc.
    static ref ATTR_REGEX: Regex = Regex::new(r#"([\w-]+)="([^"]*)""#).unwrap();
    static ref MULTI_SPACE: Regex = Regex::new(r"\s{2,}").unwrap();
}

/// SHA1 hex digest, used for deterministic derived ids.
pub fn hash_url(url: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(url.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Trim and collapse repeated whitespace.
fn normalize_text(text: &str) -> String {
    MULTI_SPACE.replace_all(text.trim(), " ").to_string()
}

pub(crate) fn item_id(playlist_id: &str, url: &str, index: usize) -> String {
    let hash = hash_url(&format!("{playlist_id}:{url}"));
    format!("item_{}_{}", &hash[..10], index)
}

/// Parsed EXTINF line data.
#[derive(Debug)]
struct ExtinfData {
    attributes: HashMap<String, String>,
    name: String,
}

/// Parse an `#EXTINF:` line. The display name is the text after the final
/// comma, falling back to `tvg-name`, then a literal placeholder. Returns
/// `None` for lines with no comma at all.
fn parse_extinf(line: &str) -> Option<ExtinfData> {
    let content = line.strip_prefix("#EXTINF:")?;
    let last_comma = content.rfind(',')?;

    let mut attributes = HashMap::new();
    for caps in ATTR_REGEX.captures_iter(content) {
        let key = caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default();
        let value = caps.get(2).map(|m| m.as_str().to_string()).unwrap_or_default();
        attributes.insert(key, value);
    }

    let mut name = normalize_text(&content[last_comma + 1..]);
    if name.is_empty() {
        name = attributes.get("tvg-name").cloned().unwrap_or_default();
    }
    if name.is_empty() {
        name = "Unnamed Channel".to_string();
    }

    Some(ExtinfData { attributes, name })
}

/// Everything one parse pass produces.
#[derive(Debug, Default)]
pub struct ParsedPlaylist {
    pub channels: Vec<Channel>,
    pub movies: Vec<Movie>,
    pub series_items: Vec<SeriesItem>,
    pub categories: BTreeSet<String>,
}

impl ParsedPlaylist {
    pub fn stats(&self) -> PlaylistStats {
        PlaylistStats {
            channel_count: self.channels.len(),
            movie_count: self.movies.len(),
            series_count: self.series_items.len(),
            category_count: self.categories.len(),
        }
    }

    pub fn total_items(&self) -> usize {
        self.channels.len() + self.movies.len() + self.series_items.len()
    }
}

/// M3U parser; classification is delegated to the injected classifier.
pub struct M3uParser {
    classifier: Arc<ContentClassifier>,
}

impl M3uParser {
    pub fn new(classifier: Arc<ContentClassifier>) -> Self {
        Self { classifier }
    }

    /// Parse playlist text in a single forward pass.
    pub fn parse(&self, playlist_id: &str, content: &str) -> ParsedPlaylist {
        let mut out = ParsedPlaylist::default();
        let mut pending: Option<ExtinfData> = None;
        let mut index = 0usize;

        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            if trimmed.starts_with('#') {
                if trimmed.starts_with("#EXTINF:") {
                    match parse_extinf(trimmed) {
                        Some(extinf) => pending = Some(extinf),
                        None => {
                            tracing::warn!(line = trimmed, "malformed EXTINF line, skipping item");
                            pending = None;
                        }
                    }
                }
                // Any other comment/directive is skipped
                continue;
            }

            if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
                // Junk between EXTINF and its URL; keep waiting
                continue;
            }

            // A URL with no pending EXTINF is ignored
            let Some(extinf) = pending.take() else {
                continue;
            };

            let ExtinfData { attributes, name } = extinf;
            let attr = |key: &str| attributes.get(key).cloned().unwrap_or_default();
            let raw = RawPlaylistItem {
                name,
                logo: attr("tvg-logo"),
                category: normalize_text(&attr("group-title")),
                tvg_id: attr("tvg-id"),
                tvg_name: attr("tvg-name"),
                language: attr("tvg-language"),
                country: attr("tvg-country"),
                url: trimmed.to_string(),
            };

            self.push_item(playlist_id, raw, index, &mut out);
            index += 1;
        }

        tracing::debug!(
            playlist_id,
            channels = out.channels.len(),
            movies = out.movies.len(),
            series = out.series_items.len(),
            categories = out.categories.len(),
            "playlist parsed"
        );
        out
    }

    fn push_item(
        &self,
        playlist_id: &str,
        raw: RawPlaylistItem,
        index: usize,
        out: &mut ParsedPlaylist,
    ) {
        if !raw.category.is_empty() {
            out.categories.insert(raw.category.clone());
        }

        let id = item_id(playlist_id, &raw.url, index);
        let opt = |s: String| if s.is_empty() { None } else { Some(s) };

        match self.classifier.classify(&raw) {
            MediaKind::Live => out.channels.push(Channel {
                id,
                playlist_id: playlist_id.to_string(),
                name: raw.name,
                url: raw.url,
                logo: opt(raw.logo),
                category: raw.category,
                epg_channel_id: opt(raw.tvg_id),
                stream_id: None,
            }),
            MediaKind::Movie => {
                let year = self.classifier.extract_year(&raw.name);
                out.movies.push(Movie {
                    id,
                    playlist_id: playlist_id.to_string(),
                    name: raw.name,
                    url: raw.url,
                    poster: opt(raw.logo),
                    category: raw.category,
                    rating: None,
                    year,
                    duration_secs: None,
                    description: None,
                });
            }
            MediaKind::Series => {
                let episode_info = self.classifier.extract_episode_info(&raw.name);
                let year = self.classifier.extract_year(&raw.name);
                let name = episode_info
                    .as_ref()
                    .map(|info| info.series_name.clone())
                    .filter(|n| !n.is_empty())
                    .unwrap_or(raw.name);
                out.series_items.push(SeriesItem {
                    id,
                    playlist_id: playlist_id.to_string(),
                    name,
                    poster: opt(raw.logo),
                    category: raw.category,
                    rating: None,
                    year,
                    plot: None,
                    cast: None,
                    director: None,
                    url: Some(raw.url),
                    episode_info,
                    remote: None,
                });
            }
        }
    }
}
