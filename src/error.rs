//! Engine error taxonomy.
//!
//! Only [`EngineError::UnknownPattern`] is ever returned from the public
//! recommendation surface. The remaining variants describe failures that the
//! engine recovers from locally; they are built so the recovery can be logged
//! with a uniform message and then dropped.

use crate::catalog::CatalogError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Branch key not present in the pattern catalog.
    #[error("unknown branch pattern: '{0}'")]
    UnknownPattern(String),

    /// One track's feature vector could not be retrieved; the candidate is skipped.
    #[error("failed to fetch audio features for track {track_id}: {source}")]
    FeatureFetch {
        track_id: String,
        #[source]
        source: CatalogError,
    },

    /// One playlist could not be listed during initialization; it is skipped.
    #[error("failed to load playlist '{playlist}': {source}")]
    PlaylistFetch {
        playlist: String,
        #[source]
        source: CatalogError,
    },

    /// A search stage failed and contributes no results.
    #[error("{stage} search failed: {source}")]
    Search {
        stage: &'static str,
        #[source]
        source: CatalogError,
    },

    /// No library data could be built; the session falls back to search and backfill.
    #[error("library initialization produced no tracks: {reason}")]
    Initialization { reason: String },
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
