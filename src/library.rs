//! # Library Candidate Store
//!
//! Per-session cache of the listener's own tracks and their audio profiles.
//!
//! The store is seeded once from saved tracks and the first few playlists,
//! and from then on only grows: entries are keyed by track id (first
//! provenance wins) and feature vectors are fetched lazily, cached, and never
//! replaced.
//!
//! ## Concurrency
//!
//! Both tables sit behind `std::sync::Mutex`es that are only held for map
//! access, never across an `.await`. Each track id owns a
//! [`tokio::sync::OnceCell`] slot, so concurrent requests for the same
//! uncached id share a single catalog call; a failed call leaves the slot
//! empty and the next request retries.

use crate::algorithm;
use crate::catalog::CatalogClient;
use crate::error::EngineError;
use crate::features::FeatureVector;
use crate::track::{Playlist, Provenance, Track};
use log::{debug, info, trace, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::OnceCell;

/// Default minimum similarity for [`LibraryStore::rank_candidates`].
pub const DEFAULT_MIN_SIMILARITY: f64 = 0.3;

/// A library track and the trust weight of where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryEntry {
    pub track: Track,
    pub provenance_weight: f64,
}

impl LibraryEntry {
    /// Build an entry for a library provenance.
    ///
    /// Returns `None` for provenances that never enter the library.
    #[must_use]
    pub fn new(track: Track, provenance: Provenance) -> Option<Self> {
        let provenance_weight = provenance.library_weight()?;
        Some(Self {
            track: track.with_provenance(provenance),
            provenance_weight,
        })
    }
}

/// A ranked library candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateScore {
    pub track: Track,
    pub similarity: f64,
    pub combined_score: f64,
}

/// Outcome of seeding the library.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LibrarySummary {
    /// Saved tracks newly registered by this call.
    pub saved_added: usize,
    /// Playlist tracks newly registered by this call.
    pub playlist_added: usize,
    /// Playlists whose listing failed and were skipped.
    pub playlists_failed: usize,
    /// Library size after the call.
    pub total: usize,
}

/// Limits applied while seeding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedLimits {
    pub playlists: usize,
    pub tracks_per_playlist: usize,
}

impl Default for SeedLimits {
    fn default() -> Self {
        Self {
            playlists: 5,
            tracks_per_playlist: 20,
        }
    }
}

#[derive(Debug, Default)]
struct EntryTable {
    order: Vec<LibraryEntry>,
    index: HashMap<String, usize>,
}

impl EntryTable {
    /// Insert unless the id is already known. Returns whether it was added.
    fn insert(&mut self, entry: LibraryEntry) -> bool {
        if self.index.contains_key(&entry.track.id) {
            return false;
        }
        self.index.insert(entry.track.id.clone(), self.order.len());
        self.order.push(entry);
        true
    }
}

type FeatureSlot = Arc<OnceCell<FeatureVector>>;

/// The listener's library for one exploration session.
pub struct LibraryStore<C> {
    catalog: Arc<C>,
    entries: Mutex<EntryTable>,
    features: Mutex<HashMap<String, FeatureSlot>>,
    limits: SeedLimits,
    initialized: AtomicBool,
}

/// Poisoned locks only mean another task panicked mid-insert; the tables
/// are still structurally sound, so keep using them.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl<C: CatalogClient> LibraryStore<C> {
    pub fn new(catalog: Arc<C>, limits: SeedLimits) -> Self {
        Self {
            catalog,
            entries: Mutex::new(EntryTable::default()),
            features: Mutex::new(HashMap::new()),
            limits,
            initialized: AtomicBool::new(false),
        }
    }

    /// Seed the library from saved tracks and the first playlists.
    ///
    /// Safe to call more than once: entries are a union by id. A playlist
    /// that cannot be listed is logged and skipped.
    pub async fn initialize(
        &self,
        playlists: &[Playlist],
        saved_tracks: &[Track],
    ) -> LibrarySummary {
        info!(
            "Initializing library from {} saved tracks and {} playlists",
            saved_tracks.len(),
            playlists.len()
        );
        let mut summary = LibrarySummary::default();

        summary.saved_added = saved_tracks
            .iter()
            .filter(|track| self.register((*track).clone(), Provenance::Saved))
            .count();

        for playlist in playlists.iter().take(self.limits.playlists) {
            let items = match self
                .catalog
                .get_playlist_tracks(&playlist.id, self.limits.tracks_per_playlist)
                .await
            {
                Ok(items) => items,
                Err(source) => {
                    let err = EngineError::PlaylistFetch {
                        playlist: playlist.name.clone(),
                        source,
                    };
                    warn!("{err}");
                    summary.playlists_failed += 1;
                    continue;
                }
            };

            let added = items
                .into_iter()
                .filter_map(|item| item.track)
                .filter(|track| !track.id.is_empty())
                .filter(|track| self.register(track.clone(), Provenance::Playlist))
                .count();
            debug!("Playlist '{}' contributed {added} new tracks", playlist.name);
            summary.playlist_added += added;
        }

        summary.total = self.len();
        self.initialized.store(true, Ordering::Release);
        info!(
            "Library ready with {} tracks ({} saved, {} from playlists, {} playlists skipped)",
            summary.total, summary.saved_added, summary.playlist_added, summary.playlists_failed
        );
        summary
    }

    /// Register one track; a known id is left untouched.
    pub fn register(&self, track: Track, provenance: Provenance) -> bool {
        match LibraryEntry::new(track, provenance) {
            Some(entry) => lock(&self.entries).insert(entry),
            None => false,
        }
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.entries).order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn contains(&self, track_id: &str) -> bool {
        lock(&self.entries).index.contains_key(track_id)
    }

    /// Snapshot of the entries in insertion order.
    #[must_use]
    pub fn entries(&self) -> Vec<LibraryEntry> {
        lock(&self.entries).order.clone()
    }

    /// Cached vector for a track, without fetching.
    #[must_use]
    pub fn cached_features(&self, track_id: &str) -> Option<FeatureVector> {
        lock(&self.features)
            .get(track_id)
            .and_then(|slot| slot.get().cloned())
    }

    /// Cached vector for a track, fetching and caching it on a miss.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::FeatureFetch`] if the catalog call fails. Nothing
    /// is cached in that case.
    pub async fn get_or_fetch_features(
        &self,
        track_id: &str,
    ) -> Result<FeatureVector, EngineError> {
        let slot: FeatureSlot =
            Arc::clone(lock(&self.features).entry(track_id.to_string()).or_default());

        let fetched = slot
            .get_or_try_init(|| async {
                trace!("Fetching audio features for {track_id}");
                self.catalog.get_audio_features(track_id).await
            })
            .await
            .cloned();

        fetched.map_err(|source| {
            self.drop_empty_slot(track_id, &slot);
            EngineError::FeatureFetch { track_id: track_id.to_string(), source }
        })
    }

    /// Forget a slot whose fetch failed, unless another caller filled it or
    /// replaced it in the meantime.
    fn drop_empty_slot(&self, track_id: &str, slot: &FeatureSlot) {
        let mut features = lock(&self.features);
        let stale = features
            .get(track_id)
            .is_some_and(|current| Arc::ptr_eq(current, slot) && !current.initialized());
        if stale {
            features.remove(track_id);
        }
    }

    /// Rank library entries against `target`.
    ///
    /// Entries whose features cannot be fetched are skipped. Survivors need
    /// `similarity >= min_similarity` and are ordered by combined score,
    /// highest first; ties keep insertion order.
    pub async fn rank_candidates(
        &self,
        target: &FeatureVector,
        exclude_id: Option<&str>,
        min_similarity: f64,
        similarity_blend: f64,
    ) -> Vec<CandidateScore> {
        let entries: Vec<LibraryEntry> = self
            .entries()
            .into_iter()
            .filter(|entry| Some(entry.track.id.as_str()) != exclude_id)
            .collect();

        let mut scorable = Vec::with_capacity(entries.len());
        let mut vectors = Vec::with_capacity(entries.len());
        for entry in entries {
            match self.get_or_fetch_features(&entry.track.id).await {
                Ok(features) => {
                    vectors.push(features);
                    scorable.push(entry);
                }
                Err(err) => warn!("Skipping library candidate: {err}"),
            }
        }

        let similarities = algorithm::score_batch(target, &vectors);

        let mut candidates: Vec<CandidateScore> = scorable
            .into_iter()
            .zip(similarities)
            .filter(|(_, similarity)| *similarity >= min_similarity)
            .map(|(entry, similarity)| CandidateScore {
                combined_score: algorithm::combined_score(
                    similarity,
                    entry.provenance_weight,
                    similarity_blend,
                ),
                similarity,
                track: entry.track,
            })
            .collect();

        // `sort_by` is stable, which keeps insertion order among equal scores.
        candidates.sort_by(|a, b| {
            b.combined_score
                .partial_cmp(&a.combined_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        debug!("Ranked {} library candidates (min similarity {min_similarity})", candidates.len());
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogError, CatalogResult};
    use crate::features::Dimension;
    use crate::track::PlaylistItem;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct FakeCatalog {
        features: HashMap<String, FeatureVector>,
        playlists: HashMap<String, Vec<Track>>,
        broken_playlists: HashSet<String>,
        feature_calls: AtomicUsize,
    }

    #[async_trait]
    impl CatalogClient for FakeCatalog {
        async fn search_tracks(&self, _query: &str, _limit: usize) -> CatalogResult<Vec<Track>> {
            Ok(Vec::new())
        }

        async fn get_audio_features(&self, track_id: &str) -> CatalogResult<FeatureVector> {
            self.feature_calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.features
                .get(track_id)
                .cloned()
                .ok_or_else(|| CatalogError::not_found("audio features", track_id))
        }

        async fn get_playlist_tracks(
            &self,
            playlist_id: &str,
            limit: usize,
        ) -> CatalogResult<Vec<PlaylistItem>> {
            if self.broken_playlists.contains(playlist_id) {
                return Err(CatalogError::Transport("502 Bad Gateway".to_string()));
            }
            Ok(self
                .playlists
                .get(playlist_id)
                .map(|tracks| {
                    tracks
                        .iter()
                        .take(limit)
                        .map(|track| PlaylistItem { track: Some(track.clone()) })
                        .collect()
                })
                .unwrap_or_default())
        }
    }

    fn energy(value: f64) -> FeatureVector {
        FeatureVector::default().with(Dimension::Energy, value)
    }

    fn playlist(id: &str) -> Playlist {
        Playlist { id: id.to_string(), name: format!("Playlist {id}") }
    }

    #[tokio::test]
    async fn test_initialize_registers_saved_then_playlists() {
        let mut catalog = FakeCatalog::default();
        catalog.playlists.insert(
            "p1".to_string(),
            vec![Track::new("a", "A", "X"), Track::new("c", "C", "Z")],
        );
        let store = LibraryStore::new(Arc::new(catalog), SeedLimits::default());

        let saved = vec![Track::new("a", "A", "X"), Track::new("b", "B", "Y")];
        let summary = store.initialize(&[playlist("p1")], &saved).await;

        assert_eq!(summary.saved_added, 2);
        assert_eq!(summary.playlist_added, 1);
        assert_eq!(summary.total, 3);
        let entries = store.entries();
        assert_eq!(entries[0].track.provenance, Provenance::Saved, "first provenance wins");
        assert_eq!(entries[0].provenance_weight, 1.0);
        assert_eq!(entries[2].track.id, "c");
        assert_eq!(entries[2].provenance_weight, 0.7);
        assert!(store.is_initialized());
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let store = LibraryStore::new(Arc::new(FakeCatalog::default()), SeedLimits::default());
        let saved = vec![Track::new("a", "A", "X"), Track::new("b", "B", "Y")];

        store.initialize(&[], &saved).await;
        let second = store.initialize(&[], &saved).await;

        assert_eq!(second.saved_added, 0);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_broken_playlist_is_skipped() {
        let mut catalog = FakeCatalog::default();
        catalog.broken_playlists.insert("bad".to_string());
        catalog.playlists.insert("good".to_string(), vec![Track::new("g", "G", "X")]);
        let store = LibraryStore::new(Arc::new(catalog), SeedLimits::default());

        let summary = store.initialize(&[playlist("bad"), playlist("good")], &[]).await;

        assert_eq!(summary.playlists_failed, 1);
        assert_eq!(summary.playlist_added, 1);
        assert!(store.contains("g"));
    }

    #[tokio::test]
    async fn test_playlist_limits_respected() {
        let mut catalog = FakeCatalog::default();
        let playlists: Vec<Playlist> = (0..7).map(|i| playlist(&format!("p{i}"))).collect();
        for i in 0..7 {
            let tracks = (0..30).map(|j| Track::new(format!("p{i}-{j}"), "T", "A")).collect();
            catalog.playlists.insert(format!("p{i}"), tracks);
        }
        let store = LibraryStore::new(Arc::new(catalog), SeedLimits::default());

        let summary = store.initialize(&playlists, &[]).await;

        assert_eq!(summary.playlist_added, 5 * 20);
        assert!(!store.contains("p5-0"));
        assert!(!store.contains("p0-20"));
    }

    #[tokio::test]
    async fn test_features_cached_after_first_fetch() {
        let mut catalog = FakeCatalog::default();
        catalog.features.insert("a".to_string(), energy(0.4));
        let catalog = Arc::new(catalog);
        let store = LibraryStore::new(Arc::clone(&catalog), SeedLimits::default());

        assert_eq!(store.get_or_fetch_features("a").await.unwrap(), energy(0.4));
        assert_eq!(store.get_or_fetch_features("a").await.unwrap(), energy(0.4));
        assert_eq!(catalog.feature_calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.cached_features("a"), Some(energy(0.4)));
    }

    #[tokio::test]
    async fn test_concurrent_fetches_are_coalesced() {
        let mut catalog = FakeCatalog::default();
        catalog.features.insert("a".to_string(), energy(0.4));
        let catalog = Arc::new(catalog);
        let store = LibraryStore::new(Arc::clone(&catalog), SeedLimits::default());

        let (first, second) = tokio::join!(
            store.get_or_fetch_features("a"),
            store.get_or_fetch_features("a")
        );

        assert_eq!(first.unwrap(), second.unwrap());
        assert_eq!(catalog.feature_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_cached() {
        let catalog = Arc::new(FakeCatalog::default());
        let store = LibraryStore::new(Arc::clone(&catalog), SeedLimits::default());

        let err = store.get_or_fetch_features("missing").await.unwrap_err();
        assert!(matches!(err, EngineError::FeatureFetch { .. }));
        assert!(store.get_or_fetch_features("missing").await.is_err());
        assert_eq!(catalog.feature_calls.load(Ordering::SeqCst), 2, "failures are retried");
        assert_eq!(store.cached_features("missing"), None);
        assert!(!lock(&store.features).contains_key("missing"), "failed slots are dropped");
    }

    #[tokio::test]
    async fn test_initialize_accepts_borrowed_saved_tracks() {
        let store = LibraryStore::new(Arc::new(FakeCatalog::default()), SeedLimits::default());
        let saved = [Track::new("a", "A", "X")];

        let summary = store.initialize(&[], &saved).await;

        assert_eq!(summary.saved_added, 1);
        assert_eq!(saved[0].id, "a", "caller keeps its tracks");
        assert_eq!(store.entries()[0].track.provenance, Provenance::Saved);
    }

    #[tokio::test]
    async fn test_rank_candidates_orders_and_filters() {
        let mut catalog = FakeCatalog::default();
        catalog.features.insert("close".to_string(), energy(0.75));
        catalog.features.insert("exact".to_string(), energy(0.8));
        catalog.features.insert("far".to_string(), energy(0.0));
        catalog.features.insert("seed".to_string(), energy(0.8));
        catalog.features.insert("playlist_exact".to_string(), energy(0.8));
        let store = LibraryStore::new(Arc::new(catalog), SeedLimits::default());

        store.register(Track::new("far", "Far", "A"), Provenance::Saved);
        store.register(Track::new("playlist_exact", "PE", "A"), Provenance::Playlist);
        store.register(Track::new("close", "Close", "A"), Provenance::Saved);
        store.register(Track::new("exact", "Exact", "A"), Provenance::Saved);
        store.register(Track::new("seed", "Seed", "A"), Provenance::Saved);
        store.register(Track::new("unknown", "No features", "A"), Provenance::Saved);

        let ranked = store
            .rank_candidates(&energy(0.8), Some("seed"), DEFAULT_MIN_SIMILARITY, 0.7)
            .await;
        let ids: Vec<&str> = ranked.iter().map(|c| c.track.id.as_str()).collect();

        // far: similarity 0.2 < 0.3; unknown: fetch fails; seed: excluded.
        assert_eq!(ids, vec!["exact", "close", "playlist_exact"]);
        assert!((ranked[0].combined_score - 1.0).abs() < 1e-12);
        assert!((ranked[1].similarity - 0.95).abs() < 1e-12);
        assert!((ranked[2].combined_score - 0.91).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_rank_ties_keep_insertion_order() {
        let mut catalog = FakeCatalog::default();
        for id in ["x", "y", "z"] {
            catalog.features.insert(id.to_string(), energy(0.5));
        }
        let store = LibraryStore::new(Arc::new(catalog), SeedLimits::default());
        for id in ["y", "x", "z"] {
            store.register(Track::new(id, id, "A"), Provenance::Saved);
        }

        let ranked = store.rank_candidates(&energy(0.5), None, DEFAULT_MIN_SIMILARITY, 0.7).await;
        let ids: Vec<&str> = ranked.iter().map(|c| c.track.id.as_str()).collect();
        assert_eq!(ids, vec!["y", "x", "z"]);
    }

    #[test]
    fn test_non_library_provenance_rejected() {
        assert!(LibraryEntry::new(Track::new("s", "S", "A"), Provenance::Synthetic).is_none());
    }
}
