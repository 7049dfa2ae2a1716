//! # Beatree - Branching Music Exploration
//!
//! Pick a track, pick a mood direction, get a handful of tracks heading that
//! way. This binary drives the engine against the offline SQLite catalog.
//!
//! ## Usage
//!
//! ```bash
//! # Load a library
//! beatree import library.json
//!
//! # See the directions
//! beatree patterns
//!
//! # Branch out
//! beatree recommend <track-id> relaxed --count 8 --liked-ratio 0.25
//! ```

use anyhow::{bail, Context, Result};
use beatree::cli::{self, Command, ProfileArgs};
use beatree::completion;
use beatree::config::RuntimeConfig;
use beatree::db::SqliteCatalog;
use beatree::features::{feature_difference, DisplayFeatures, FeatureVector};
use beatree::patterns::{self, BRANCH_PATTERNS};
use beatree::session::ExplorationSession;
use beatree::track::Track;
use clap::{CommandFactory, Parser};
use log::{debug, info};
use std::path::Path;
use std::sync::Arc;

/// Main entry point for Beatree.
///
/// Initializes logging, parses command-line arguments, and routes commands.
///
/// # Logging
///
/// Controlled via `RUST_LOG`:
/// - `RUST_LOG=debug beatree recommend …` - stage-by-stage decisions
/// - `RUST_LOG=beatree::library=trace beatree recommend …` - every feature fetch
#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args = cli::Args::parse();

    match args.command {
        Command::Patterns => list_patterns(),
        Command::Apply { pattern, profile } => {
            let runtime = RuntimeConfig::resolve(args.db, args.config)?;
            apply_pattern(&runtime, &pattern, &profile)?;
        }
        Command::Import { fixture, force } => {
            let runtime = RuntimeConfig::resolve(args.db, args.config)?;
            info!("Importing {} into {}", fixture.display(), runtime.db_path.display());
            import_fixture(&runtime.db_path, &fixture, force)?;
        }
        Command::Recommend { seed, pattern, count, liked_ratio, rng_seed, verbose } => {
            let mut runtime = RuntimeConfig::resolve(args.db, args.config)?;
            if rng_seed.is_some() {
                runtime.engine.rng_seed = rng_seed;
            }
            if let Some(ratio) = liked_ratio {
                if !(0.0..=1.0).contains(&ratio) {
                    bail!("--liked-ratio must be within [0, 1], got {ratio}");
                }
            }
            recommend(runtime, &seed, &pattern, count, liked_ratio, verbose).await?;
        }
        Command::Completion { shell } => {
            let mut cmd = cli::Args::command();
            completion::generate_completions(
                completion::shell_to_completion_shell(shell),
                &mut cmd,
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}

fn list_patterns() {
    for pattern in BRANCH_PATTERNS {
        let deltas: Vec<String> = pattern
            .deltas
            .iter()
            .map(|(dim, delta)| format!("{dim} {delta:+}"))
            .collect();
        println!("{:<10} {}", pattern.key, pattern.button_text());
        println!("           {}", pattern.description);
        println!("           {}", deltas.join(", "));
    }
}

/// Open an existing catalog; commands other than `import` never create one.
fn open_existing(db_path: &Path) -> Result<SqliteCatalog> {
    if !db_path.exists() {
        bail!(
            "No catalog at {}. Load a library first: beatree import <fixture.json>",
            db_path.display()
        );
    }
    SqliteCatalog::open(db_path)
        .with_context(|| format!("Failed to open catalog {}", db_path.display()))
}

fn profile_from_flags(profile: &ProfileArgs) -> FeatureVector {
    FeatureVector {
        energy: profile.energy,
        valence: profile.valence,
        danceability: profile.danceability,
        acousticness: profile.acousticness,
        tempo: profile.tempo,
        loudness: profile.loudness,
        ..FeatureVector::default()
    }
}

fn apply_pattern(runtime: &RuntimeConfig, pattern_key: &str, profile: &ProfileArgs) -> Result<()> {
    let before = match &profile.track {
        Some(id) => {
            let track = open_existing(&runtime.db_path)?.get_track(id)?;
            println!("{}", track.display_name());
            track
                .audio_features
                .with_context(|| format!("Track {id} has no stored audio features"))?
        }
        None => profile_from_flags(profile),
    };
    if before.is_empty() {
        bail!("Give --track <id> or at least one feature flag (--energy, --tempo, ...)");
    }

    let after = patterns::apply_branch_pattern(&before, pattern_key)?;
    let pattern = patterns::get_pattern(pattern_key)?;

    println!("{}", pattern.button_text());
    println!("before  {}", DisplayFeatures::from(&before));
    println!("after   {}", DisplayFeatures::from(&after));
    for (dim, change) in feature_difference(&before, &after) {
        println!(
            "  {dim:<14} {:>8.2} -> {:>8.2}  ({})",
            change.before, change.after, change.formatted
        );
    }
    Ok(())
}

fn import_fixture(db_path: &Path, fixture: &Path, force: bool) -> Result<()> {
    if let Some(parent) = db_path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let catalog = SqliteCatalog::open(db_path)?;

    let existing = catalog.track_count()?;
    if existing > 0 {
        if !force {
            bail!(
                "Catalog {} already holds {existing} tracks. Use --force to replace them.",
                db_path.display()
            );
        }
        debug!("Clearing {existing} tracks before import");
        catalog.clear()?;
    }

    let summary = catalog.import_fixture_file(fixture)?;
    println!(
        "Imported {} tracks ({} with audio features), {} saved, {} playlists",
        summary.tracks, summary.with_features, summary.saved, summary.playlists
    );
    Ok(())
}

async fn recommend(
    runtime: RuntimeConfig,
    seed_id: &str,
    pattern_key: &str,
    count: usize,
    liked_ratio: Option<f64>,
    verbose: bool,
) -> Result<()> {
    let catalog = Arc::new(open_existing(&runtime.db_path)?);
    let seed = catalog.get_track(seed_id)?;
    let session = ExplorationSession::with_config(Arc::clone(&catalog), runtime.engine);

    let summary = session
        .initialize_library(&catalog.playlists()?, &catalog.saved_tracks()?)
        .await;
    let pattern = patterns::get_pattern(pattern_key)?;

    println!("{} -> {}", seed.display_name(), pattern.button_text());
    if verbose {
        println!(
            "library: {} tracks ({} saved, {} from playlists)",
            summary.total, summary.saved_added, summary.playlist_added
        );
        match &seed.audio_features {
            Some(features) => {
                let target = session.apply_branch_pattern(features, pattern_key)?;
                println!("seed    {}", DisplayFeatures::from(features));
                println!("target  {}", DisplayFeatures::from(&target));
            }
            None => println!("seed has no audio features; library ranking is skipped"),
        }
    }

    let tracks = session.recommend(&seed, pattern_key, count).await?;
    let liked = catalog.saved_ids()?;
    let tracks = session.filter_by_preference(&tracks, &liked, liked_ratio);

    for (n, track) in tracks.iter().enumerate() {
        println!("{:>2}. {}", n + 1, render(track, liked.contains(&track.id)));
    }
    Ok(())
}

fn render(track: &Track, liked: bool) -> String {
    let mut line = format!("{} [{}]", track.display_name(), track.provenance);
    if liked {
        line.push_str(" ♥");
    }
    if !track.has_preview() {
        line.push_str(" (no preview)");
    }
    line
}
