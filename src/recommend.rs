//! # Hybrid Recommendation
//!
//! Assembles a fixed-size recommendation list without a licensed
//! recommender, from sources tried in strict priority order:
//!
//! 1. **Library** - the listener's own tracks ranked against the target profile
//! 2. **Artist search** - catalog search on the seed's primary artist
//! 3. **Related direction** - catalog search on a randomly picked genre
//! 4. **Synthetic backfill** - placeholders, only when everything else ran dry
//!
//! Each source is a [`RecommendationStrategy`]. [`run_strategies`] invokes
//! them in order while the pool holds fewer unique ids than requested, then
//! deduplicates once, keeping the first occurrence so earlier stages win.
//! A stage that fails contributes nothing; the next one picks up the slack.

use crate::catalog::CatalogClient;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::features::FeatureVector;
use crate::library::LibraryStore;
use crate::patterns::BranchPattern;
use crate::track::{Artist, Provenance, Track};
use async_trait::async_trait;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::sync::Mutex;

/// Everything a stage may look at for one `recommend` call.
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    pub seed: &'a Track,
    pub pattern: &'a BranchPattern,
    /// Target profile; `None` when the seed's features were unavailable.
    pub target: Option<&'a FeatureVector>,
    /// Size of the final list.
    pub count: usize,
}

/// One source of candidate tracks.
#[async_trait]
pub trait RecommendationStrategy: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Produce candidates while the pool is still `needed` tracks short.
    ///
    /// Never fails: problems are logged and yield fewer (or no) tracks.
    async fn collect(&self, ctx: &StageContext<'_>, needed: usize) -> Vec<Track>;
}

/// `ceil(count * share)`
#[must_use]
pub fn share_of(count: usize, share: f64) -> usize {
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let quota = (count as f64 * share).ceil() as usize;
    quota
}

/// Drop repeated ids, keeping each id's first occurrence.
#[must_use]
pub fn dedup_by_id(tracks: Vec<Track>) -> Vec<Track> {
    let mut seen = HashSet::new();
    tracks
        .into_iter()
        .filter(|track| seen.insert(track.id.clone()))
        .collect()
}

/// Run `strategies` in order until the pool holds `ctx.count` unique ids.
///
/// Returns the deduplicated pool, which may be shorter or longer than
/// `ctx.count`.
pub async fn run_strategies(
    strategies: &[&dyn RecommendationStrategy],
    ctx: &StageContext<'_>,
) -> Vec<Track> {
    let mut pool = Vec::new();
    let mut unique = HashSet::new();

    for strategy in strategies {
        let needed = ctx.count.saturating_sub(unique.len());
        if needed == 0 {
            break;
        }

        let found = strategy.collect(ctx, needed).await;
        info!("{} stage returned {} tracks ({needed} still needed)", strategy.name(), found.len());
        unique.extend(found.iter().map(|track| track.id.clone()));
        pool.extend(found);
    }

    dedup_by_id(pool)
}

// =============================================================================
// STAGES
// =============================================================================

/// Library tracks closest to the target profile.
pub struct LibraryStage<'a, C> {
    pub store: &'a LibraryStore<C>,
    pub config: &'a EngineConfig,
}

#[async_trait]
impl<'a, C: CatalogClient> RecommendationStrategy for LibraryStage<'a, C> {
    fn name(&self) -> &'static str {
        "library"
    }

    async fn collect(&self, ctx: &StageContext<'_>, _needed: usize) -> Vec<Track> {
        if !self.store.is_initialized() {
            warn!("Library not initialized, relying on search stages");
            return Vec::new();
        }
        let Some(target) = ctx.target else {
            warn!("No target profile for '{}', skipping library stage", ctx.seed.id);
            return Vec::new();
        };

        let quota = share_of(ctx.count, self.config.library_share);
        self.store
            .rank_candidates(
                target,
                Some(&ctx.seed.id),
                self.config.min_similarity,
                self.config.similarity_blend,
            )
            .await
            .into_iter()
            .take(quota)
            .map(|candidate| {
                debug!(
                    "Library pick {} (similarity {:.3}, score {:.3})",
                    candidate.track.display_name(),
                    candidate.similarity,
                    candidate.combined_score
                );
                candidate.track
            })
            .collect()
    }
}

/// Other tracks by the seed's primary artist that have a playable preview.
pub struct ArtistSearchStage<'a, C> {
    pub catalog: &'a C,
    pub config: &'a EngineConfig,
}

#[async_trait]
impl<'a, C: CatalogClient> RecommendationStrategy for ArtistSearchStage<'a, C> {
    fn name(&self) -> &'static str {
        "artist search"
    }

    async fn collect(&self, ctx: &StageContext<'_>, _needed: usize) -> Vec<Track> {
        let Some(artist) = ctx.seed.primary_artist() else {
            debug!("Seed '{}' has no artist, skipping artist search", ctx.seed.id);
            return Vec::new();
        };

        let quota = share_of(ctx.count, self.config.search_share);
        let query = format!("artist:\"{artist}\"");
        let limit = quota.saturating_mul(self.config.search_overfetch);
        match self.catalog.search_tracks(&query, limit).await {
            Ok(results) => results
                .into_iter()
                .filter(|track| track.id != ctx.seed.id && track.has_preview())
                .take(quota)
                .map(|track| track.with_provenance(Provenance::Search))
                .collect(),
            Err(source) => {
                warn!("{}", EngineError::Search { stage: "artist", source });
                Vec::new()
            }
        }
    }
}

/// Tracks from a randomly chosen genre, excluding the seed's artist.
pub struct RelatedGenreStage<'a, C> {
    pub catalog: &'a C,
    pub config: &'a EngineConfig,
    pub rng: &'a Mutex<StdRng>,
}

impl<C> RelatedGenreStage<'_, C> {
    fn pick_genre(&self) -> Option<String> {
        let mut rng = self
            .rng
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        self.config.genres.choose(&mut *rng).cloned()
    }
}

#[async_trait]
impl<'a, C: CatalogClient> RecommendationStrategy for RelatedGenreStage<'a, C> {
    fn name(&self) -> &'static str {
        "related genre"
    }

    async fn collect(&self, ctx: &StageContext<'_>, needed: usize) -> Vec<Track> {
        let Some(genre) = self.pick_genre() else {
            return Vec::new();
        };
        let seed_artist = ctx.seed.primary_artist();
        debug!("Related direction: genre '{genre}'");

        let query = format!("genre:\"{genre}\"");
        let limit = needed.saturating_mul(self.config.search_overfetch);
        match self.catalog.search_tracks(&query, limit).await {
            Ok(results) => results
                .into_iter()
                .filter(|track| track.id != ctx.seed.id)
                .filter(|track| {
                    seed_artist.map_or(true, |seed_artist| {
                        !track.artists.iter().any(|artist| artist.name == seed_artist)
                    })
                })
                .take(needed)
                .map(|track| track.with_provenance(Provenance::Related))
                .collect(),
            Err(source) => {
                warn!("{}", EngineError::Search { stage: "genre", source });
                Vec::new()
            }
        }
    }
}

// =============================================================================
// SYNTHETIC BACKFILL
// =============================================================================

/// Deterministic placeholder for slot `index` (1-based).
#[must_use]
pub fn synthetic_track(seed: &Track, pattern: &BranchPattern, index: usize) -> Track {
    Track {
        id: format!("synthetic:{}:{}:{index}", pattern.key, seed.id),
        name: format!("{} Branch pick {index}", pattern.emoji),
        artists: vec![Artist::new(format!("Example Artist {index}"))],
        album: "Example Album".to_string(),
        preview_url: None,
        provenance: Provenance::Synthetic,
        audio_features: None,
    }
}

/// Top `tracks` up to `count` with placeholders whose ids are not already used.
pub fn synthetic_backfill(
    tracks: &mut Vec<Track>,
    seed: &Track,
    pattern: &BranchPattern,
    count: usize,
) {
    if tracks.len() >= count {
        return;
    }

    let mut used: HashSet<String> = tracks.iter().map(|track| track.id.clone()).collect();
    let missing = count - tracks.len();
    let placeholders: Vec<Track> = (1..)
        .map(|index| synthetic_track(seed, pattern, index))
        .filter(|track| used.insert(track.id.clone()))
        .take(missing)
        .collect();

    warn!("Backfilling {} synthetic placeholders for '{}'", placeholders.len(), pattern.key);
    tracks.extend(placeholders);
}

// =============================================================================
// ORCHESTRATOR
// =============================================================================

/// Borrowed view of a session's sources for one `recommend` call.
pub struct HybridRecommender<'a, C> {
    pub store: &'a LibraryStore<C>,
    pub catalog: &'a C,
    pub config: &'a EngineConfig,
    pub rng: &'a Mutex<StdRng>,
}

impl<C: CatalogClient> HybridRecommender<'_, C> {
    /// Exactly `count` unique tracks for `seed` in the direction of `pattern`.
    pub async fn recommend(
        &self,
        seed: &Track,
        pattern: &BranchPattern,
        target: Option<&FeatureVector>,
        count: usize,
    ) -> Vec<Track> {
        if count == 0 {
            return Vec::new();
        }
        info!("Hybrid recommendations for {} toward '{}'", seed.display_name(), pattern.key);

        let library = LibraryStage { store: self.store, config: self.config };
        let artist = ArtistSearchStage { catalog: self.catalog, config: self.config };
        let related = RelatedGenreStage {
            catalog: self.catalog,
            config: self.config,
            rng: self.rng,
        };
        let strategies: [&dyn RecommendationStrategy; 3] = [&library, &artist, &related];

        let ctx = StageContext { seed, pattern, target, count };
        let mut tracks = run_strategies(&strategies, &ctx).await;
        debug!("{} unique tracks before backfill", tracks.len());

        synthetic_backfill(&mut tracks, seed, pattern, count);
        tracks.truncate(count);
        tracks
    }
}
