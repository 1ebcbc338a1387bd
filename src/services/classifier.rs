//! Heuristic content classification for playlist items.
//!
//! Keyword and pattern sets are data ([`ClassifierRules`]), not hard-coded
//! branches, so deployments can tune them without a rebuild. Classification
//! is inherently fuzzy: ambiguous names fall through to the live-TV default
//! and missing episode patterns produce ungrouped series entries.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lazy_static::lazy_static;
use lru::LruCache;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::IngestError;
use crate::models::{EpisodeInfo, MediaKind, RawPlaylistItem};

/// Episode-extraction results are memoized; playlists repeat series names
/// thousands of times.
const EPISODE_CACHE_SIZE: usize = 10_000;

lazy_static! {
    static ref MULTI_SPACE: Regex = Regex::new(r"\s{2,}").unwrap();
    static ref YEAR_TAG: Regex = Regex::new(r"[\(\[](\d{4})[\)\]]").unwrap();
}

/// Keyword and pattern sets driving classification. All keyword matching is
/// case-insensitive substring containment; episode patterns are regexes with
/// season and episode capture groups.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClassifierRules {
    pub movie_keywords: Vec<String>,
    pub movie_url_markers: Vec<String>,
    pub series_keywords: Vec<String>,
    pub series_url_markers: Vec<String>,
    pub episode_patterns: Vec<String>,
}

impl Default for ClassifierRules {
    fn default() -> Self {
        Self {
            movie_keywords: ["movie", "film", "filme", "cinema", "vod", "pelicula"]
                .map(String::from)
                .to_vec(),
            movie_url_markers: vec!["/movie/".to_string()],
            series_keywords: ["series", "serie", "show", "novela"]
                .map(String::from)
                .to_vec(),
            series_url_markers: vec!["/series/".to_string()],
            episode_patterns: vec![
                r"(?i)\bS(\d{1,2})\s*[._-]?\s*E(\d{1,3})\b".to_string(),
                r"(?i)\b(\d{1,2})x(\d{1,3})\b".to_string(),
                r"(?i)season\s*(\d{1,2})\s*episode\s*(\d{1,3})".to_string(),
            ],
        }
    }
}

impl ClassifierRules {
    /// Load rule overrides from a JSON document.
    pub fn from_json(json: &str) -> Result<Self, IngestError> {
        serde_json::from_str(json)
            .map_err(|e| IngestError::parse("classifier rules", e.to_string()))
    }
}

/// Content classifier built from a compiled rule set.
pub struct ContentClassifier {
    movie_keywords: Vec<String>,
    movie_url_markers: Vec<String>,
    series_keywords: Vec<String>,
    series_url_markers: Vec<String>,
    episode_patterns: Vec<Regex>,
    episode_cache: Mutex<LruCache<String, Option<EpisodeInfo>>>,
}

impl ContentClassifier {
    /// Compile a rule set. Fails on an invalid episode pattern regex.
    pub fn new(rules: ClassifierRules) -> Result<Self, IngestError> {
        let episode_patterns = rules
            .episode_patterns
            .iter()
            .map(|p| {
                Regex::new(p)
                    .map_err(|e| IngestError::Validation(format!("bad episode pattern {p:?}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let lower =
            |words: Vec<String>| -> Vec<String> { words.into_iter().map(|w| w.to_lowercase()).collect() };

        Ok(Self {
            movie_keywords: lower(rules.movie_keywords),
            movie_url_markers: lower(rules.movie_url_markers),
            series_keywords: lower(rules.series_keywords),
            series_url_markers: lower(rules.series_url_markers),
            episode_patterns,
            episode_cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(EPISODE_CACHE_SIZE).unwrap(),
            )),
        })
    }

    /// Classifier with the built-in rule set.
    pub fn with_defaults() -> Self {
        Self::new(ClassifierRules::default()).expect("default classifier rules compile")
    }

    /// Assign exactly one [`MediaKind`] to a parsed item.
    ///
    /// The episode-pattern check runs before keyword checks: an `S01E01`
    /// entry is a series episode even when it sits in a "Movies" category.
    pub fn classify(&self, item: &RawPlaylistItem) -> MediaKind {
        if self.has_episode_pattern(&item.name) || self.has_episode_pattern(&item.url) {
            return MediaKind::Series;
        }

        let name = item.name.to_lowercase();
        let category = item.category.to_lowercase();
        let url = item.url.to_lowercase();

        if contains_any(&category, &self.movie_keywords)
            || contains_any(&name, &self.movie_keywords)
            || contains_any(&url, &self.movie_keywords)
            || contains_any(&url, &self.movie_url_markers)
        {
            return MediaKind::Movie;
        }

        if contains_any(&category, &self.series_keywords)
            || contains_any(&name, &self.series_keywords)
            || contains_any(&url, &self.series_keywords)
            || contains_any(&url, &self.series_url_markers)
        {
            return MediaKind::Series;
        }

        MediaKind::Live
    }

    fn has_episode_pattern(&self, text: &str) -> bool {
        self.episode_patterns.iter().any(|p| p.is_match(text))
    }

    /// Extract season/episode numbers from an item name. The series name is
    /// the original name with the matched pattern removed and trimmed. No
    /// pattern match means the item stays an ungroupable series entry.
    pub fn extract_episode_info(&self, name: &str) -> Option<EpisodeInfo> {
        {
            let mut cache = self.episode_cache.lock().unwrap();
            if let Some(cached) = cache.get(name) {
                return cached.clone();
            }
        }

        let result = self.extract_episode_info_uncached(name);

        let mut cache = self.episode_cache.lock().unwrap();
        cache.put(name.to_string(), result.clone());
        result
    }

    fn extract_episode_info_uncached(&self, name: &str) -> Option<EpisodeInfo> {
        for pattern in &self.episode_patterns {
            if let Some(caps) = pattern.captures(name) {
                let season: u32 = caps.get(1).and_then(|m| m.as_str().parse().ok())?;
                let episode: u32 = caps.get(2).and_then(|m| m.as_str().parse().ok())?;
                let matched = caps.get(0).unwrap().as_str();
                let stripped = name.replace(matched, " ");
                let series_name = MULTI_SPACE.replace_all(stripped.trim(), " ").to_string();
                return Some(EpisodeInfo {
                    season,
                    episode,
                    series_name,
                });
            }
        }
        None
    }

    /// Release year from a `(1999)` / `[1999]` tag in the name.
    pub fn extract_year(&self, name: &str) -> Option<u16> {
        YEAR_TAG
            .captures(name)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }
}

fn contains_any(haystack: &str, needles: &[String]) -> bool {
    !haystack.is_empty() && needles.iter().any(|n| haystack.contains(n.as_str()))
}
