//! Branching music exploration: mood-directed recommendations built from the
//! listener's own library, catalog search, and a synthetic fallback.
//!
//! Core modules:
//! - [`features`] - Audio profiles and their per-dimension domains
//! - [`patterns`] - Branch pattern catalog and the profile transformer
//! - [`algorithm`] - Weighted similarity scoring
//! - [`library`] - Per-session cache of library tracks and their profiles
//! - [`recommend`] - Multi-source recommendation orchestrator
//! - [`preference`] - Liked/new rebalancing
//! - [`session`] - The surface a UI drives
//!
//! ### Supporting Modules
//!
//! - [`catalog`] - The catalog client interface
//! - [`db`] - Offline SQLite catalog
//! - [`config`] - Engine settings and data directory management
//! - [`error`] - Engine error types
//! - [`track`] - Tracks, playlists and provenance tags
//! - [`cli`] - Command-line interface definitions with clap integration
//! - [`completion`] - Shell completion generation
//!
//! ## Quick Start Example
//!
//! ```no_run
//! use beatree::db::SqliteCatalog;
//! use beatree::session::ExplorationSession;
//! use std::collections::HashSet;
//! use std::sync::Arc;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let catalog = Arc::new(SqliteCatalog::open(&beatree::config::get_db_path()?)?);
//! let session = ExplorationSession::new(Arc::clone(&catalog));
//! session.initialize_library(&catalog.playlists()?, &catalog.saved_tracks()?).await;
//!
//! let seed = catalog.get_track("seed-id")?;
//! let picks = session.recommend(&seed, "relaxed", 6).await?;
//! let balanced = session.filter_by_preference(&picks, &catalog.saved_ids()?, Some(0.3));
//! # Ok(())
//! # }
//! ```
//!
//! ## How a recommendation is assembled
//!
//! 1. The seed's audio profile is shifted by the pattern's deltas and clamped
//!    to each dimension's domain.
//! 2. Library tracks are scored against that target; close ones fill up to
//!    half the list.
//! 3. A search on the seed's artist adds previewable tracks.
//! 4. A search on a random genre adds tracks by other artists.
//! 5. Placeholders fill whatever is still missing.
//!
//! Catalog failures at any step are logged and the next step takes over; the
//! only error a caller sees is an unknown pattern key.

pub mod algorithm;
pub mod catalog;
pub mod cli;
pub mod completion;
pub mod config;
pub mod db;
pub mod error;
pub mod features;
pub mod library;
pub mod patterns;
pub mod preference;
pub mod recommend;
pub mod session;
pub mod track;
