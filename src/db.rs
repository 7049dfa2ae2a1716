//! # Offline Catalog
//!
//! A [`CatalogClient`] backed by a local SQLite file, so the engine can run
//! without a streaming service. The catalog is filled from a JSON library
//! fixture (see [`LibraryFixture`]) and then only read.
//!
//! Artists and genres live in JSON array columns and are matched with
//! SQLite's `json_each`.

use crate::catalog::{CatalogClient, CatalogError, CatalogResult};
use crate::features::FeatureVector;
use crate::track::{Artist, Playlist, PlaylistItem, Provenance, Track};
use anyhow::Context;
use async_trait::async_trait;
use log::{debug, info, trace};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS tracks (
        id          TEXT PRIMARY KEY,
        name        TEXT NOT NULL,
        artists     TEXT NOT NULL,
        album       TEXT NOT NULL DEFAULT '',
        preview_url TEXT,
        genres      TEXT NOT NULL DEFAULT '[]'
    );
    CREATE TABLE IF NOT EXISTS audio_features (
        track_id TEXT PRIMARY KEY,
        features TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS saved_tracks (
        position INTEGER PRIMARY KEY,
        track_id TEXT NOT NULL UNIQUE
    );
    CREATE TABLE IF NOT EXISTS playlists (
        position INTEGER PRIMARY KEY,
        id       TEXT NOT NULL UNIQUE,
        name     TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS playlist_tracks (
        playlist_id TEXT NOT NULL,
        position    INTEGER NOT NULL,
        track_id    TEXT NOT NULL,
        PRIMARY KEY (playlist_id, position)
    );
";

const TRACK_COLUMNS: &str = "t.id, t.name, t.artists, t.album, t.preview_url";

/// One track of a library fixture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureTrack {
    #[serde(flatten)]
    pub track: Track,
    #[serde(default)]
    pub genres: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixturePlaylist {
    pub id: String,
    pub name: String,
    /// Track ids in playlist order. Ids missing from `tracks` are kept and
    /// come back as empty playlist rows.
    #[serde(default)]
    pub tracks: Vec<String>,
}

/// A listener's library as a JSON document.
///
/// ```json
/// {
///   "tracks": [{ "id": "t1", "name": "Song", "artists": [{ "name": "Band" }],
///                "preview_url": "https://…", "genres": ["indie"],
///                "audio_features": { "energy": 0.7, "tempo": 124.0 } }],
///   "saved": ["t1"],
///   "playlists": [{ "id": "p1", "name": "Morning", "tracks": ["t1"] }]
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibraryFixture {
    #[serde(default)]
    pub tracks: Vec<FixtureTrack>,
    #[serde(default)]
    pub saved: Vec<String>,
    #[serde(default)]
    pub playlists: Vec<FixturePlaylist>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub tracks: usize,
    pub with_features: usize,
    pub saved: usize,
    pub playlists: usize,
}

/// Parsed form of a `search_tracks` query.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SearchQuery {
    Artist(String),
    Genre(String),
    Text(String),
}

impl SearchQuery {
    fn parse(query: &str) -> Self {
        let query = query.trim();
        let filter = |prefix: &str| {
            query
                .strip_prefix(prefix)
                .map(|value| value.trim().trim_matches('"').to_string())
        };

        if let Some(artist) = filter("artist:") {
            Self::Artist(artist)
        } else if let Some(genre) = filter("genre:") {
            Self::Genre(genre)
        } else {
            Self::Text(query.to_string())
        }
    }

    fn sql(&self) -> (String, &str) {
        let (condition, value) = match self {
            Self::Artist(name) => (
                "EXISTS (SELECT 1 FROM json_each(t.artists) WHERE lower(json_each.value) = lower(?1))",
                name.as_str(),
            ),
            Self::Genre(genre) => (
                "EXISTS (SELECT 1 FROM json_each(t.genres) WHERE lower(json_each.value) = lower(?1))",
                genre.as_str(),
            ),
            Self::Text(text) => (
                "(instr(lower(t.name), lower(?1)) > 0
                  OR instr(lower(t.album), lower(?1)) > 0
                  OR instr(lower(t.artists), lower(?1)) > 0)",
                text.as_str(),
            ),
        };
        (
            format!("SELECT {TRACK_COLUMNS} FROM tracks t WHERE {condition} ORDER BY t.rowid LIMIT ?2"),
            value,
        )
    }
}

/// Build a track from the `TRACK_COLUMNS` selection.
fn track_from_row(row: &Row<'_>) -> rusqlite::Result<Track> {
    let artists_json: String = row.get(2)?;
    let artists: Vec<String> = serde_json::from_str(&artists_json).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(err))
    })?;

    Ok(Track {
        id: row.get(0)?,
        name: row.get(1)?,
        artists: artists.into_iter().map(Artist::new).collect(),
        album: row.get(3)?,
        preview_url: row.get(4)?,
        provenance: Provenance::Search,
        audio_features: None,
    })
}

pub struct SqliteCatalog {
    conn: Mutex<Connection>,
}

impl SqliteCatalog {
    /// Open (creating if needed) the catalog at `path`.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened or the schema cannot be created.
    pub fn open(path: &Path) -> CatalogResult<Self> {
        debug!("Opening catalog at {}", path.display());
        Self::with_connection(Connection::open(path)?)
    }

    /// A throwaway catalog, for tests and benchmarks.
    ///
    /// # Errors
    ///
    /// Fails only if SQLite itself cannot start.
    pub fn open_in_memory() -> CatalogResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> CatalogResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn track_count(&self) -> CatalogResult<usize> {
        let count: i64 = self
            .lock()
            .query_row("SELECT COUNT(*) FROM tracks", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Remove every row, keeping the schema.
    pub fn clear(&self) -> CatalogResult<()> {
        self.lock().execute_batch(
            "DELETE FROM playlist_tracks;
             DELETE FROM playlists;
             DELETE FROM saved_tracks;
             DELETE FROM audio_features;
             DELETE FROM tracks;",
        )?;
        Ok(())
    }

    /// Write a fixture in one transaction. Tracks with a known id are replaced.
    ///
    /// # Errors
    ///
    /// Any storage error rolls the whole import back.
    pub fn import_fixture(&self, fixture: &LibraryFixture) -> CatalogResult<ImportSummary> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let mut summary = ImportSummary::default();

        {
            let mut insert_track = tx.prepare(
                "INSERT OR REPLACE INTO tracks (id, name, artists, album, preview_url, genres)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            let mut insert_features =
                tx.prepare("INSERT OR REPLACE INTO audio_features (track_id, features) VALUES (?1, ?2)")?;

            for FixtureTrack { track, genres } in &fixture.tracks {
                let artists: Vec<&str> =
                    track.artists.iter().map(|artist| artist.name.as_str()).collect();
                insert_track.execute(params![
                    track.id,
                    track.name,
                    serde_json::to_string(&artists)?,
                    track.album,
                    track.preview_url,
                    serde_json::to_string(genres)?,
                ])?;
                summary.tracks += 1;

                if let Some(features) = &track.audio_features {
                    insert_features.execute(params![track.id, serde_json::to_string(features)?])?;
                    summary.with_features += 1;
                }
            }

            let mut insert_saved =
                tx.prepare("INSERT OR IGNORE INTO saved_tracks (track_id) VALUES (?1)")?;
            for id in &fixture.saved {
                summary.saved += insert_saved.execute([id])?;
            }

            let mut insert_playlist = tx.prepare(
                "INSERT INTO playlists (id, name) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name",
            )?;
            let mut clear_items = tx.prepare("DELETE FROM playlist_tracks WHERE playlist_id = ?1")?;
            let mut insert_item =
                tx.prepare("INSERT INTO playlist_tracks (playlist_id, position, track_id) VALUES (?1, ?2, ?3)")?;
            for playlist in &fixture.playlists {
                insert_playlist.execute([&playlist.id, &playlist.name])?;
                clear_items.execute([&playlist.id])?;
                for (position, track_id) in playlist.tracks.iter().enumerate() {
                    insert_item.execute(params![playlist.id, position, track_id])?;
                }
                summary.playlists += 1;
            }
        }

        tx.commit()?;
        info!(
            "Imported {} tracks ({} with features), {} saved, {} playlists",
            summary.tracks, summary.with_features, summary.saved, summary.playlists
        );
        Ok(summary)
    }

    /// Read a fixture file and import it.
    ///
    /// # Errors
    ///
    /// Fails if the file is unreadable, not a valid fixture, or the import fails.
    pub fn import_fixture_file(&self, path: &Path) -> anyhow::Result<ImportSummary> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture {}", path.display()))?;
        let fixture: LibraryFixture = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid library fixture {}", path.display()))?;
        self.import_fixture(&fixture)
            .with_context(|| format!("Failed to import {} into the catalog", path.display()))
    }

    /// One track with its audio profile attached when the catalog has one.
    ///
    /// # Errors
    ///
    /// [`CatalogError::NotFound`] for an unknown id.
    pub fn get_track(&self, id: &str) -> CatalogResult<Track> {
        let track = self
            .lock()
            .query_row(
                &format!("SELECT {TRACK_COLUMNS} FROM tracks t WHERE t.id = ?1"),
                [id],
                track_from_row,
            )
            .optional()?
            .ok_or_else(|| CatalogError::not_found("track", id))?;

        Ok(Track {
            audio_features: self.stored_features(id)?,
            ..track
        })
    }

    /// Saved tracks in the order they were saved. Dangling ids are skipped.
    pub fn saved_tracks(&self) -> CatalogResult<Vec<Track>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {TRACK_COLUMNS} FROM saved_tracks s JOIN tracks t ON t.id = s.track_id ORDER BY s.position"
        ))?;
        let tracks = stmt.query_map([], track_from_row)?.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tracks)
    }

    pub fn saved_ids(&self) -> CatalogResult<HashSet<String>> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT track_id FROM saved_tracks")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<HashSet<String>>>()?;
        Ok(ids)
    }

    pub fn playlists(&self) -> CatalogResult<Vec<Playlist>> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT id, name FROM playlists ORDER BY position")?;
        let playlists = stmt
            .query_map([], |row| Ok(Playlist { id: row.get(0)?, name: row.get(1)? }))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(playlists)
    }

    fn stored_features(&self, track_id: &str) -> CatalogResult<Option<FeatureVector>> {
        let raw: Option<String> = self
            .lock()
            .query_row(
                "SELECT features FROM audio_features WHERE track_id = ?1",
                [track_id],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|json| serde_json::from_str::<FeatureVector>(&json))
            .transpose()
            .map_err(CatalogError::from)
    }
}

#[async_trait]
impl CatalogClient for SqliteCatalog {
    async fn search_tracks(&self, query: &str, limit: usize) -> CatalogResult<Vec<Track>> {
        let parsed = SearchQuery::parse(query);
        let (sql, value) = parsed.sql();
        trace!("Search {parsed:?} (limit {limit})");

        let conn = self.lock();
        let mut stmt = conn.prepare(&sql)?;
        let tracks = stmt
            .query_map(params![value, limit], track_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tracks)
    }

    async fn get_audio_features(&self, track_id: &str) -> CatalogResult<FeatureVector> {
        self.stored_features(track_id)?
            .ok_or_else(|| CatalogError::not_found("audio features", track_id))
    }

    async fn get_playlist_tracks(
        &self,
        playlist_id: &str,
        limit: usize,
    ) -> CatalogResult<Vec<PlaylistItem>> {
        let conn = self.lock();
        let known: bool = conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM playlists WHERE id = ?1)",
            [playlist_id],
            |row| row.get(0),
        )?;
        if !known {
            return Err(CatalogError::not_found("playlist", playlist_id));
        }

        let mut stmt = conn.prepare(&format!(
            "SELECT {TRACK_COLUMNS} FROM playlist_tracks p LEFT JOIN tracks t ON t.id = p.track_id
             WHERE p.playlist_id = ?1 ORDER BY p.position LIMIT ?2"
        ))?;
        let items = stmt
            .query_map(params![playlist_id, limit], |row| {
                let id: Option<String> = row.get(0)?;
                let track = id.map(|_| track_from_row(row)).transpose()?;
                Ok(PlaylistItem { track })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::Dimension;
    use crate::track::Provenance;

    fn fixture() -> LibraryFixture {
        serde_json::from_str(
            r#"{
                "tracks": [
                    { "id": "t1", "name": "Morning Run", "artists": [{ "name": "The Pacers" }],
                      "album": "Tempo", "preview_url": "https://preview.test/t1", "genres": ["pop", "Indie"],
                      "audio_features": { "energy": 0.8, "valence": 0.6, "tempo": 128.0 } },
                    { "id": "t2", "name": "Slow Tide", "artists": [{ "name": "Harbor" }, { "name": "The Pacers" }],
                      "genres": ["indie"] },
                    { "id": "t3", "name": "Static", "artists": [{ "name": "Harbor" }], "album": "Morning Songs" }
                ],
                "saved": ["t2", "t1", "t2"],
                "playlists": [
                    { "id": "p1", "name": "Commute", "tracks": ["t3", "gone", "t1"] },
                    { "id": "p2", "name": "Empty" }
                ]
            }"#,
        )
        .unwrap()
    }

    fn catalog() -> SqliteCatalog {
        let catalog = SqliteCatalog::open_in_memory().unwrap();
        catalog.import_fixture(&fixture()).unwrap();
        catalog
    }

    fn ids(tracks: &[Track]) -> Vec<&str> {
        tracks.iter().map(|track| track.id.as_str()).collect()
    }

    #[test]
    fn test_query_parsing() {
        assert_eq!(
            SearchQuery::parse("artist:\"The Pacers\""),
            SearchQuery::Artist("The Pacers".into())
        );
        assert_eq!(SearchQuery::parse(" genre:\"r&b\" "), SearchQuery::Genre("r&b".into()));
        assert_eq!(SearchQuery::parse("morning"), SearchQuery::Text("morning".into()));
    }

    #[test]
    fn test_import_summary() {
        let catalog = SqliteCatalog::open_in_memory().unwrap();
        let summary = catalog.import_fixture(&fixture()).unwrap();
        assert_eq!(
            summary,
            ImportSummary { tracks: 3, with_features: 1, saved: 2, playlists: 2 }
        );
        assert_eq!(catalog.track_count().unwrap(), 3);

        catalog.clear().unwrap();
        assert_eq!(catalog.track_count().unwrap(), 0);
    }

    #[test]
    fn test_get_track_attaches_features() {
        let catalog = catalog();
        let track = catalog.get_track("t1").unwrap();
        assert_eq!(track.primary_artist(), Some("The Pacers"));
        assert_eq!(track.album, "Tempo");
        assert_eq!(track.audio_features.unwrap().get(Dimension::Tempo), Some(128.0));

        assert!(catalog.get_track("t3").unwrap().audio_features.is_none());
        assert!(matches!(catalog.get_track("nope"), Err(CatalogError::NotFound { .. })));
    }

    #[test]
    fn test_saved_tracks_keep_order() {
        let catalog = catalog();
        assert_eq!(ids(&catalog.saved_tracks().unwrap()), vec!["t2", "t1"]);
        assert_eq!(catalog.saved_ids().unwrap().len(), 2);
        let names: Vec<String> = catalog.playlists().unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Commute", "Empty"]);
    }

    #[tokio::test]
    async fn test_search_filters() {
        let catalog = catalog();

        let by_artist = catalog.search_tracks("artist:\"the pacers\"", 10).await.unwrap();
        assert_eq!(ids(&by_artist), vec!["t1", "t2"]);
        assert!(by_artist.iter().all(|track| track.provenance == Provenance::Search));

        let by_genre = catalog.search_tracks("genre:\"indie\"", 10).await.unwrap();
        assert_eq!(ids(&by_genre), vec!["t1", "t2"]);

        let by_text = catalog.search_tracks("morning", 10).await.unwrap();
        assert_eq!(ids(&by_text), vec!["t1", "t3"]);

        let limited = catalog.search_tracks("genre:\"indie\"", 1).await.unwrap();
        assert_eq!(ids(&limited), vec!["t1"]);
    }

    #[tokio::test]
    async fn test_audio_features_lookup() {
        let catalog = catalog();
        let features = catalog.get_audio_features("t1").await.unwrap();
        assert_eq!(features.energy, Some(0.8));
        assert!(matches!(
            catalog.get_audio_features("t2").await,
            Err(CatalogError::NotFound { resource: "audio features", .. })
        ));
    }

    #[tokio::test]
    async fn test_undetected_key_survives_import() {
        let fixture: LibraryFixture = serde_json::from_str(
            r#"{
                "tracks": [
                    { "id": "k1", "name": "Drone", "artists": [{ "name": "Hum" }],
                      "audio_features": { "energy": 0.2, "key": -1, "mode": 0 } }
                ]
            }"#,
        )
        .unwrap();
        let catalog = SqliteCatalog::open_in_memory().unwrap();
        assert_eq!(catalog.import_fixture(&fixture).unwrap().with_features, 1);

        let features = catalog.get_audio_features("k1").await.unwrap();
        assert_eq!(features.key, Some(-1));
        assert_eq!(features.energy, Some(0.2));
    }

    #[tokio::test]
    async fn test_playlist_listing() {
        let catalog = catalog();

        let items = catalog.get_playlist_tracks("p1", 10).await.unwrap();
        let listed: Vec<Option<&str>> = items
            .iter()
            .map(|item| item.track.as_ref().map(|track| track.id.as_str()))
            .collect();
        assert_eq!(listed, vec![Some("t3"), None, Some("t1")]);

        assert_eq!(catalog.get_playlist_tracks("p1", 1).await.unwrap().len(), 1);
        assert!(catalog.get_playlist_tracks("p2", 10).await.unwrap().is_empty());
        assert!(matches!(
            catalog.get_playlist_tracks("missing", 10).await,
            Err(CatalogError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_reimport_replaces_playlist_items() {
        let catalog = catalog();
        let mut again = fixture();
        again.playlists[0].tracks = vec!["t2".to_string()];
        catalog.import_fixture(&again).unwrap();

        let items = catalog.get_playlist_tracks("p1", 10).await.unwrap();
        assert_eq!(items.len(), 1);
        let names: Vec<String> = catalog.playlists().unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Commute", "Empty"]);
    }
}
