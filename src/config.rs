//! # Configuration Module
//!
//! This module handles configuration management and data directory setup for
//! Beatree. It provides platform-appropriate data storage locations and the
//! tuning knobs of the recommendation engine.
//!
//! ## Data Storage
//!
//! Beatree keeps its offline catalog and optional `config.json` in the
//! platform-standard data directory:
//! - Linux: `~/.local/share/beatree/`
//! - macOS: `~/Library/Application Support/beatree/`
//! - Windows: `%APPDATA%\beatree\`

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the optional engine configuration file inside the data directory.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Largest accepted `search_overfetch` multiplier.
pub const MAX_SEARCH_OVERFETCH: usize = 10;

/// Returns the platform-appropriate data directory for Beatree, creating it
/// if needed.
///
/// # Errors
///
/// This function will return an error if:
/// - The system data directory cannot be determined
/// - The beatree subdirectory cannot be created due to permissions
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| anyhow::anyhow!(
            "Could not determine system data directory. Please ensure your platform supports standard data directories."
        ))?;

    let beatree_dir = data_dir.join("beatree");
    fs::create_dir_all(&beatree_dir)
        .with_context(|| format!(
            "Failed to create Beatree data directory at {}. Please check file permissions.",
            beatree_dir.display()
        ))?;

    Ok(beatree_dir)
}

/// Returns the platform-appropriate offline catalog path.
///
/// # Examples
///
/// ```no_run
/// use beatree::config::get_db_path;
///
/// let db_path = get_db_path()?;
/// println!("Catalog location: {}", db_path.display());
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn get_db_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join("catalog.db"))
}

/// Tuning parameters of the recommendation engine.
///
/// Every field has a default, so a partial `config.json` only needs the
/// values it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Library candidates below this similarity are dropped.
    pub min_similarity: f64,
    /// Share of the requested count asked from the listener's library.
    pub library_share: f64,
    /// Share of the requested count asked from the artist search.
    pub search_share: f64,
    /// Search requests ask for this many times the needed count, since
    /// results without previews are filtered out afterwards.
    pub search_overfetch: usize,
    /// Playlists read while seeding the library.
    pub playlist_limit: usize,
    /// Tracks read from each of those playlists.
    pub tracks_per_playlist: usize,
    /// Weight of similarity (vs. provenance) in the combined candidate score.
    pub similarity_blend: f64,
    /// Genres the related-direction stage picks from.
    pub genres: Vec<String>,
    /// Fixed seed for the genre pick; `None` seeds from entropy.
    pub rng_seed: Option<u64>,
    /// Default share of already-liked tracks in the final list.
    pub liked_ratio: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_similarity: 0.3,
            library_share: 0.5,
            search_share: 0.3,
            search_overfetch: 2,
            playlist_limit: 5,
            tracks_per_playlist: 20,
            similarity_blend: crate::algorithm::DEFAULT_SIMILARITY_BLEND,
            genres: ["pop", "rock", "indie", "electronic", "hip-hop", "r&b"]
                .into_iter()
                .map(String::from)
                .collect(),
            rng_seed: None,
            liked_ratio: 0.5,
        }
    }
}

impl EngineConfig {
    /// Load a configuration file, falling back to defaults when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, parsed, or fails
    /// [`EngineConfig::validate`].
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No engine config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read engine config {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid engine config {}", path.display()))?;
        config.validate()?;

        log::info!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    /// Reject values outside their meaningful ranges.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let unit_fields = [
            ("min_similarity", self.min_similarity),
            ("library_share", self.library_share),
            ("search_share", self.search_share),
            ("similarity_blend", self.similarity_blend),
            ("liked_ratio", self.liked_ratio),
        ];
        if let Some((name, value)) = unit_fields
            .iter()
            .find(|(_, value)| !(0.0..=1.0).contains(value))
        {
            anyhow::bail!("{name} must be within [0, 1], got {value}");
        }
        if !(1..=MAX_SEARCH_OVERFETCH).contains(&self.search_overfetch) {
            anyhow::bail!(
                "search_overfetch must be within [1, {MAX_SEARCH_OVERFETCH}], got {}",
                self.search_overfetch
            );
        }
        if self.genres.is_empty() {
            anyhow::bail!("genres must not be empty");
        }
        Ok(())
    }
}

/// Configuration for one CLI invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Path to the offline catalog database
    pub db_path: PathBuf,
    pub engine: EngineConfig,
}

impl RuntimeConfig {
    /// Resolve paths, honouring explicit overrides before the data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory is needed but unavailable, or
    /// the engine config cannot be loaded.
    pub fn resolve(db_path: Option<PathBuf>, config_path: Option<PathBuf>) -> Result<Self> {
        let db_path = match db_path {
            Some(path) => path,
            None => get_db_path()?,
        };
        let config_path = match config_path {
            Some(path) => path,
            None => get_data_dir()?.join(CONFIG_FILE_NAME),
        };

        Ok(Self {
            db_path,
            engine: EngineConfig::load(&config_path)?,
        })
    }
}
