//! Xtream Codes integration.
//!
//! An Xtream panel exposes live/VOD/series catalogs over
//! `player_api.php?username=…&password=…&action=…`. This module provides
//! credential detection from `get.php` playlist URLs, authentication, typed
//! collection fetchers and lazy per-series episode resolution.

pub mod client;
pub mod detector;
pub mod types;

pub use client::XtreamClient;
pub use detector::extract_credentials;
pub use types::{
    XtreamAuthResponse, XtreamCategory, XtreamCredentials, XtreamEpisode, XtreamEpisodeInfo,
    XtreamLiveStream, XtreamSeason, XtreamSeries, XtreamSeriesInfo, XtreamServerInfo,
    XtreamUserInfo, XtreamVodStream,
};
