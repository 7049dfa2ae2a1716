//! # Command-Line Interface Module
//!
//! This module defines the command-line interface for Beatree using Clap derive
//! macros. Every command runs against the offline SQLite catalog.
//!
//! ## Commands
//!
//! - `patterns`: List the branch patterns
//! - `apply`: Show how a pattern reshapes an audio profile
//! - `import`: Load a JSON library fixture into the catalog
//! - `recommend`: Branch out from a seed track
//! - `completion`: Generate shell completions
//!
//! ## Examples
//!
//! ```bash
//! beatree import library.json
//! beatree apply heavy --energy 0.6 --tempo 118
//! beatree recommend 4uLU6hMCjMI75M1A2tKUQC energy_up --count 8
//! ```

use crate::patterns;
use clap::builder::PossibleValuesParser;
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    PowerShell,
    /// Elvish shell
    Elvish,
}

fn pattern_parser() -> PossibleValuesParser {
    PossibleValuesParser::new(patterns::pattern_keys())
}

/// Main application arguments structure.
#[derive(Parser, Debug)]
#[command(name = "beatree")]
#[command(about = "Beatree: Branching music exploration - mood-directed recommendations from your own library")]
#[command(version)]
pub struct Args {
    /// Offline catalog database
    ///
    /// Defaults to `catalog.db` in the platform data directory.
    #[arg(long, global = true, env = "BEATREE_DB", value_hint = clap::ValueHint::FilePath)]
    pub db: Option<PathBuf>,

    /// Engine configuration file (JSON)
    ///
    /// Defaults to `config.json` in the platform data directory. A missing
    /// file means default settings.
    #[arg(long, global = true, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Enumeration of all available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the branch patterns
    ///
    /// Shows every mood direction with its key, label and the audio
    /// dimensions it shifts.
    Patterns,

    /// Show how a pattern reshapes an audio profile
    ///
    /// Takes the profile of a catalog track (--track) or one assembled from
    /// the feature flags, applies the pattern and prints the before/after
    /// values with their change.
    Apply {
        /// Branch pattern key
        #[arg(value_parser = pattern_parser())]
        pattern: String,

        #[command(flatten)]
        profile: ProfileArgs,
    },

    /// Load a JSON library fixture into the catalog
    ///
    /// The fixture lists tracks (with optional audio features and genres),
    /// saved track ids and playlists. Without --force the import refuses to
    /// touch a catalog that already holds tracks.
    Import {
        /// Path to the fixture file
        #[arg(value_hint = clap::ValueHint::FilePath)]
        fixture: PathBuf,

        /// Replace the existing catalog contents
        #[arg(long)]
        force: bool,
    },

    /// Branch out from a seed track
    ///
    /// Seeds the library from the catalog's saved tracks and playlists,
    /// builds recommendations in the pattern's direction and rebalances them
    /// between liked and new tracks. Each line is tagged with where the
    /// track came from.
    Recommend {
        /// Catalog id of the seed track
        seed: String,

        /// Branch pattern key
        #[arg(value_parser = pattern_parser())]
        pattern: String,

        /// Number of tracks to recommend
        #[arg(short, long, default_value_t = 6)]
        count: usize,

        /// Share of liked tracks in the result, 0 to 1
        ///
        /// Overrides `liked_ratio` from the engine configuration.
        #[arg(long)]
        liked_ratio: Option<f64>,

        /// Fixed random seed for the related-genre pick
        #[arg(long)]
        rng_seed: Option<u64>,

        /// Show target profile and library statistics
        #[arg(short, long)]
        verbose: bool,
    },

    /// Generate shell completions
    ///
    /// Usage: beatree completion bash > ~/.local/share/bash-completion/completions/beatree
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Where `apply` takes its starting profile from.
#[derive(ClapArgs, Debug, Default, Clone, PartialEq)]
pub struct ProfileArgs {
    /// Use the stored profile of this catalog track
    #[arg(
        long,
        conflicts_with_all = ["energy", "valence", "danceability", "acousticness", "tempo", "loudness"]
    )]
    pub track: Option<String>,

    #[arg(long)]
    pub energy: Option<f64>,

    #[arg(long)]
    pub valence: Option<f64>,

    #[arg(long)]
    pub danceability: Option<f64>,

    #[arg(long)]
    pub acousticness: Option<f64>,

    /// Beats per minute
    #[arg(long)]
    pub tempo: Option<f64>,

    /// Decibels, usually between -60 and 0
    #[arg(long, allow_hyphen_values = true)]
    pub loudness: Option<f64>,
}
