//! # Exploration Session
//!
//! The surface a UI drives. One session lives for one exploration: it owns
//! the catalog handle, the listener's library, the engine configuration, and
//! the random source used to pick related genres. Dropping the session drops
//! everything it learned.
//!
//! ## Usage
//!
//! ```no_run
//! use beatree::db::SqliteCatalog;
//! use beatree::session::ExplorationSession;
//! use std::sync::Arc;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let catalog = Arc::new(SqliteCatalog::open("catalog.db".as_ref())?);
//! let session = ExplorationSession::new(Arc::clone(&catalog));
//!
//! session.initialize_library(&catalog.playlists()?, &catalog.saved_tracks()?).await;
//!
//! let seed = catalog.get_track("some-track-id")?;
//! for track in session.recommend(&seed, "energy_up", 6).await? {
//!     println!("{}", track.display_name());
//! }
//! # Ok(())
//! # }
//! ```

use crate::catalog::CatalogClient;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::features::FeatureVector;
use crate::library::{LibraryStore, LibrarySummary, SeedLimits};
use crate::patterns::{self, BranchPattern, BRANCH_PATTERNS};
use crate::preference;
use crate::recommend::HybridRecommender;
use crate::track::{Playlist, Track};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

pub struct ExplorationSession<C> {
    catalog: Arc<C>,
    library: LibraryStore<C>,
    config: EngineConfig,
    rng: Mutex<StdRng>,
}

impl<C: CatalogClient> ExplorationSession<C> {
    pub fn new(catalog: Arc<C>) -> Self {
        Self::with_config(catalog, EngineConfig::default())
    }

    pub fn with_config(catalog: Arc<C>, config: EngineConfig) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let limits = SeedLimits {
            playlists: config.playlist_limit,
            tracks_per_playlist: config.tracks_per_playlist,
        };

        Self {
            library: LibraryStore::new(Arc::clone(&catalog), limits),
            catalog,
            config,
            rng: Mutex::new(rng),
        }
    }

    /// Seed the library. Best effort: failures are logged, never returned.
    pub async fn initialize_library(
        &self,
        playlists: &[Playlist],
        saved_tracks: &[Track],
    ) -> LibrarySummary {
        let summary = self.library.initialize(playlists, saved_tracks).await;

        if summary.total == 0 && !(playlists.is_empty() && saved_tracks.is_empty()) {
            let err = EngineError::Initialization {
                reason: format!(
                    "{} saved tracks and {} playlists yielded nothing ({} playlists failed)",
                    saved_tracks.len(),
                    playlists.len(),
                    summary.playlists_failed
                ),
            };
            warn!("{err}");
        }
        summary
    }

    /// `count` unique tracks heading from `seed` in the direction of `pattern_key`.
    ///
    /// The seed's attached features are used when present; otherwise they
    /// are fetched through the library cache. Without them the library
    /// stage is skipped and search results carry the list.
    ///
    /// # Errors
    ///
    /// Only [`EngineError::UnknownPattern`]. Every catalog failure degrades to
    /// the next source, down to synthetic placeholders.
    pub async fn recommend(
        &self,
        seed: &Track,
        pattern_key: &str,
        count: usize,
    ) -> EngineResult<Vec<Track>> {
        let pattern = patterns::get_pattern(pattern_key)?;

        let current = match &seed.audio_features {
            Some(features) => Some(features.clone()),
            None => match self.library.get_or_fetch_features(&seed.id).await {
                Ok(features) => Some(features),
                Err(err) => {
                    warn!("No profile for seed: {err}");
                    None
                }
            },
        };
        let target = current.map(|features| patterns::transform(&features, pattern));

        let recommender = HybridRecommender {
            store: &self.library,
            catalog: &*self.catalog,
            config: &self.config,
            rng: &self.rng,
        };
        let tracks = recommender.recommend(seed, pattern, target.as_ref(), count).await;

        info!(
            "Recommended {} tracks for {} ('{}')",
            tracks.len(),
            seed.display_name(),
            pattern.key
        );
        Ok(tracks)
    }

    /// See [`patterns::apply_branch_pattern`].
    ///
    /// # Errors
    ///
    /// [`EngineError::UnknownPattern`] for a key outside the catalog.
    pub fn apply_branch_pattern(
        &self,
        features: &FeatureVector,
        pattern_key: &str,
    ) -> EngineResult<FeatureVector> {
        patterns::apply_branch_pattern(features, pattern_key)
    }

    /// See [`preference::filter_by_preference`]; `ratio` defaults to the configured `liked_ratio`.
    #[must_use]
    pub fn filter_by_preference(
        &self,
        tracks: &[Track],
        liked_ids: &HashSet<String>,
        ratio: Option<f64>,
    ) -> Vec<Track> {
        let ratio = ratio.unwrap_or(self.config.liked_ratio);
        preference::filter_by_preference(tracks, liked_ids, ratio)
    }

    #[must_use]
    pub fn patterns(&self) -> &'static [BranchPattern] {
        BRANCH_PATTERNS
    }

    #[must_use]
    pub fn library(&self) -> &LibraryStore<C> {
        &self.library
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
