//! # Branch Patterns
//!
//! A branch pattern is a named mood direction ("more energy", "relax", ...)
//! expressed as additive deltas over a handful of audio dimensions. The
//! catalog is a fixed table: every pattern has the same shape, so lookup is a
//! plain key match and there is no per-pattern behaviour beyond its deltas.
//!
//! ```
//! use beatree::features::{Dimension, FeatureVector};
//! use beatree::patterns::apply_branch_pattern;
//!
//! let current = FeatureVector::default()
//!     .with(Dimension::Energy, 0.9)
//!     .with(Dimension::Tempo, 190.0);
//! let target = apply_branch_pattern(&current, "energy_up")?;
//!
//! assert_eq!(target.energy, Some(1.0));
//! assert_eq!(target.tempo, Some(200.0));
//! # Ok::<(), beatree::error::EngineError>(())
//! ```

use crate::error::{EngineError, EngineResult};
use crate::features::{Dimension, FeatureVector};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BranchPattern {
    pub key: &'static str,
    pub label: &'static str,
    pub emoji: &'static str,
    pub description: &'static str,
    /// Only the dimensions this pattern intends to change.
    pub deltas: &'static [(Dimension, f64)],
}

impl BranchPattern {
    /// Button text as the UI shows it, e.g. `🔥 Energy up`.
    #[must_use]
    pub fn button_text(&self) -> String {
        format!("{} {}", self.emoji, self.label)
    }

    #[must_use]
    pub fn delta(&self, dimension: Dimension) -> Option<f64> {
        self.deltas
            .iter()
            .find(|(dim, _)| *dim == dimension)
            .map(|&(_, delta)| delta)
    }
}

/// The pattern catalog, in display order.
pub const BRANCH_PATTERNS: &[BranchPattern] = &[
    BranchPattern {
        key: "energy_up",
        label: "Energy up",
        emoji: "🔥",
        description: "Toward livelier, more upbeat tracks",
        deltas: &[
            (Dimension::Energy, 0.3),
            (Dimension::Valence, 0.2),
            (Dimension::Tempo, 20.0),
        ],
    },
    BranchPattern {
        key: "relaxed",
        label: "Relax",
        emoji: "😌",
        description: "Toward calm, comfortable tracks",
        deltas: &[
            (Dimension::Energy, -0.2),
            (Dimension::Valence, -0.1),
            (Dimension::Acousticness, 0.3),
            (Dimension::Tempo, -15.0),
        ],
    },
    BranchPattern {
        key: "similar",
        label: "More like this",
        emoji: "🎵",
        description: "Toward tracks with the same feel",
        deltas: &[
            (Dimension::Energy, 0.0),
            (Dimension::Valence, 0.0),
            (Dimension::Tempo, 0.0),
        ],
    },
    BranchPattern {
        key: "heavy",
        label: "Heavier",
        emoji: "⚡",
        description: "Toward intense, powerful tracks",
        deltas: &[
            (Dimension::Energy, 0.4),
            (Dimension::Loudness, 0.3),
            (Dimension::Instrumentalness, 0.2),
            (Dimension::Tempo, 25.0),
        ],
    },
    BranchPattern {
        key: "emotional",
        label: "Emotional",
        emoji: "💙",
        description: "Toward lyrical, sentimental tracks",
        deltas: &[
            (Dimension::Valence, -0.3),
            (Dimension::Acousticness, 0.4),
            (Dimension::Energy, -0.2),
            (Dimension::Tempo, -10.0),
        ],
    },
    BranchPattern {
        key: "wake_up",
        label: "Wake me up",
        emoji: "☀️",
        description: "Toward tracks that lift you up",
        deltas: &[
            (Dimension::Energy, 0.5),
            (Dimension::Danceability, 0.3),
            (Dimension::Valence, 0.4),
            (Dimension::Tempo, 30.0),
        ],
    },
];

lazy_static::lazy_static! {
    static ref PATTERN_INDEX: HashMap<&'static str, &'static BranchPattern> =
        BRANCH_PATTERNS.iter().map(|pattern| (pattern.key, pattern)).collect();
}

/// Look up a pattern by key.
///
/// # Errors
///
/// Returns [`EngineError::UnknownPattern`] if the key is not in the catalog.
pub fn get_pattern(key: &str) -> EngineResult<&'static BranchPattern> {
    PATTERN_INDEX
        .get(key)
        .copied()
        .ok_or_else(|| EngineError::UnknownPattern(key.to_string()))
}

/// All pattern keys, in display order.
pub fn pattern_keys() -> impl Iterator<Item = &'static str> {
    BRANCH_PATTERNS.iter().map(|pattern| pattern.key)
}

/// Shift `features` by a pattern's deltas.
///
/// Absent dimensions start from zero. Tempo is clamped to `[60, 200]`, every
/// other touched dimension to `[0, 1]`; untouched dimensions pass through.
#[must_use]
pub fn transform(features: &FeatureVector, pattern: &BranchPattern) -> FeatureVector {
    pattern
        .deltas
        .iter()
        .fold(features.clone(), |mut target, &(dim, delta)| {
            let shifted = features.get(dim).unwrap_or(0.0) + delta;
            target.set(dim, dim.clamp(shifted));
            target
        })
}

/// Apply the pattern named `pattern_key` to `features`.
///
/// # Errors
///
/// Returns [`EngineError::UnknownPattern`] for a key outside the catalog; the
/// input vector is left as it was.
pub fn apply_branch_pattern(
    features: &FeatureVector,
    pattern_key: &str,
) -> EngineResult<FeatureVector> {
    let pattern = get_pattern(pattern_key)?;
    let target = transform(features, pattern);
    log::trace!("Applied pattern `{pattern_key}': {features:?} -> {target:?}");
    Ok(target)
}

/// Like [`apply_branch_pattern`], but an unknown key logs and yields the input unchanged.
#[must_use]
pub fn apply_or_unchanged(features: &FeatureVector, pattern_key: &str) -> FeatureVector {
    apply_branch_pattern(features, pattern_key).unwrap_or_else(|err| {
        log::error!("{err}");
        features.clone()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_vector() -> FeatureVector {
        FeatureVector::default()
            .with(Dimension::Energy, 0.5)
            .with(Dimension::Valence, 0.5)
            .with(Dimension::Danceability, 0.5)
            .with(Dimension::Acousticness, 0.5)
            .with(Dimension::Instrumentalness, 0.5)
            .with(Dimension::Loudness, -7.0)
            .with(Dimension::Tempo, 120.0)
    }

    #[test]
    fn test_catalog_has_unique_keys() {
        assert!(BRANCH_PATTERNS.len() >= 6);
        assert_eq!(PATTERN_INDEX.len(), BRANCH_PATTERNS.len());
        for key in pattern_keys() {
            assert_eq!(get_pattern(key).unwrap().key, key);
        }
    }

    #[test]
    fn test_energy_clamped_at_one() {
        let current = FeatureVector::default().with(Dimension::Energy, 0.9);
        let target = apply_branch_pattern(&current, "energy_up").unwrap();
        assert_eq!(target.energy, Some(1.0));
    }

    #[test]
    fn test_tempo_clamped_to_bpm_range() {
        let fast = FeatureVector::default().with(Dimension::Tempo, 195.0);
        assert_eq!(apply_branch_pattern(&fast, "wake_up").unwrap().tempo, Some(200.0));

        let slow = FeatureVector::default().with(Dimension::Tempo, 62.0);
        assert_eq!(apply_branch_pattern(&slow, "relaxed").unwrap().tempo, Some(60.0));
    }

    #[test]
    fn test_absent_dimension_starts_from_zero() {
        let target = apply_branch_pattern(&FeatureVector::default(), "relaxed").unwrap();
        assert_eq!(target.acousticness, Some(0.3));
        assert_eq!(target.energy, Some(0.0));
        // Tempo from zero is pulled up into range.
        assert_eq!(target.tempo, Some(60.0));
    }

    #[test]
    fn test_untouched_dimensions_pass_through() {
        let current = full_vector().with(Dimension::Speechiness, 0.12);
        let target = apply_branch_pattern(&current, "energy_up").unwrap();
        assert_eq!(target.danceability, current.danceability);
        assert_eq!(target.speechiness, Some(0.12));
        assert_eq!(target.loudness, Some(-7.0));
    }

    #[test]
    fn test_all_patterns_stay_in_domain() {
        let extremes = [
            FeatureVector::default(),
            full_vector(),
            FeatureVector::default()
                .with(Dimension::Energy, 1.0)
                .with(Dimension::Valence, 0.0)
                .with(Dimension::Tempo, 200.0),
        ];
        for features in &extremes {
            for pattern in BRANCH_PATTERNS {
                let target = transform(features, pattern);
                for &(dim, _) in pattern.deltas {
                    let value = target.get(dim).unwrap();
                    let (min, max) = dim.clamp_range();
                    assert!(value >= min && value <= max, "{} {dim} = {value}", pattern.key);
                }
            }
        }
    }

    #[test]
    fn test_unknown_pattern_is_reported() {
        let current = full_vector();
        let err = apply_branch_pattern(&current, "polka").unwrap_err();
        assert!(matches!(err, EngineError::UnknownPattern(ref key) if key == "polka"));
        assert_eq!(apply_or_unchanged(&current, "polka"), current);
    }

    #[test]
    fn test_transform_is_deterministic() {
        let current = full_vector();
        let pattern = get_pattern("emotional").unwrap();
        assert_eq!(transform(&current, pattern), transform(&current, pattern));
    }
}
