//! Tracks, playlists and where a track came from.

use crate::features::FeatureVector;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Origin of a track inside a recommendation or the listener's library.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Explicitly saved ("liked") by the listener.
    Saved,
    /// Found in one of the listener's playlists.
    Playlist,
    /// Free-text catalog search on the seed's artist.
    #[default]
    Search,
    /// Genre search in a related direction.
    Related,
    /// Placeholder generated when every real source is exhausted.
    Synthetic,
}

impl Provenance {
    /// Trust weight of a library provenance, `None` for non-library sources.
    #[must_use]
    pub const fn library_weight(self) -> Option<f64> {
        match self {
            Provenance::Saved => Some(1.0),
            Provenance::Playlist => Some(0.7),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Provenance::Saved => "saved",
            Provenance::Playlist => "playlist",
            Provenance::Search => "search",
            Provenance::Related => "related",
            Provenance::Synthetic => "synthetic",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    pub name: String,
}

impl Artist {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub artists: Vec<Artist>,
    #[serde(default)]
    pub album: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub provenance: Provenance,
    /// Audio profile attached by the caller for the seed/current track.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_features: Option<FeatureVector>,
}

impl Track {
    pub fn new(id: impl Into<String>, name: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            artists: vec![Artist::new(artist)],
            album: String::new(),
            preview_url: None,
            provenance: Provenance::default(),
            audio_features: None,
        }
    }

    #[must_use]
    pub fn primary_artist(&self) -> Option<&str> {
        self.artists.first().map(|artist| artist.name.as_str())
    }

    #[must_use]
    pub fn has_preview(&self) -> bool {
        self.preview_url.as_deref().is_some_and(|url| !url.is_empty())
    }

    #[must_use]
    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }

    #[must_use]
    pub fn with_features(mut self, features: FeatureVector) -> Self {
        self.audio_features = Some(features);
        self
    }

    #[must_use]
    pub fn with_preview(mut self, url: impl Into<String>) -> Self {
        self.preview_url = Some(url.into());
        self
    }

    /// "Artist - Title" for logs and CLI output.
    #[must_use]
    pub fn display_name(&self) -> String {
        match self.primary_artist() {
            Some(artist) => format!("{artist} - {}", self.name),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
}

/// One row of a playlist listing. Entries such as local files carry no track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistItem {
    #[serde(default)]
    pub track: Option<Track>,
}
