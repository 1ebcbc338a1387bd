pub mod epg;
pub mod playlist;

pub use epg::EpgProgram;
pub use playlist::{
    Channel, Episode, EpisodeInfo, MediaKind, Movie, PlaylistKind, PlaylistSource, PlaylistStats,
    RawPlaylistItem, SeriesEpisodes, SeriesItem, XtreamSeriesRef,
};
