//! Music catalog client interface.
//!
//! The engine never talks to the network itself. Everything it needs from
//! the outside world goes through [`CatalogClient`]: an HTTP client for a
//! streaming service, the offline [`crate::db::SqliteCatalog`], or a fake in
//! tests. Timeouts and retries are the implementation's business.

use crate::features::FeatureVector;
use crate::track::{PlaylistItem, Track};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{resource} '{id}' not found")]
    NotFound { resource: &'static str, id: String },

    #[error("catalog authorization failed: {0}")]
    Auth(String),

    #[error("catalog request failed: {0}")]
    Transport(String),

    #[error("catalog storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("malformed catalog record: {0}")]
    Decode(#[from] serde_json::Error),
}

impl CatalogError {
    pub fn not_found(resource: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { resource, id: id.into() }
    }
}

pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

/// Read access to a music catalog.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Free-text track search. Queries may use `artist:"…"` and `genre:"…"` filters.
    async fn search_tracks(&self, query: &str, limit: usize) -> CatalogResult<Vec<Track>>;

    /// Audio profile of one track.
    async fn get_audio_features(&self, track_id: &str) -> CatalogResult<FeatureVector>;

    /// First `limit` items of a playlist.
    async fn get_playlist_tracks(
        &self,
        playlist_id: &str,
        limit: usize,
    ) -> CatalogResult<Vec<PlaylistItem>>;
}
