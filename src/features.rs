//! # Audio Feature Vectors
//!
//! Typed representation of a track's audio profile. Every dimension is
//! optional: a catalog may omit fields, and an absent dimension is not the
//! same thing as a zero.
//!
//! ## Domains
//!
//! - `energy`, `valence`, `danceability`, `acousticness`, `instrumentalness`,
//!   `speechiness`, `liveness`: `[0, 1]`
//! - `loudness`: roughly `[-60, 0]` dB, never clamped on read
//! - `tempo`: `[60, 200]` BPM
//! - `key`: `0..=11`, or `-1` when no key was detected; `mode`: `0` or `1`;
//!   `time_signature`: always 4 in practice
//!
//! The adjustable dimensions are enumerated by [`Dimension`], which is what
//! branch patterns use to address a field.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Lower bound of the tempo domain in BPM.
pub const TEMPO_MIN: f64 = 60.0;
/// Upper bound of the tempo domain in BPM.
pub const TEMPO_MAX: f64 = 200.0;

/// A numeric audio dimension that branch patterns and the scorer can address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Energy,
    Valence,
    Danceability,
    Acousticness,
    Instrumentalness,
    Speechiness,
    Liveness,
    Loudness,
    Tempo,
}

impl Dimension {
    /// All adjustable dimensions in display order.
    pub const ALL: [Dimension; 9] = [
        Dimension::Energy,
        Dimension::Valence,
        Dimension::Danceability,
        Dimension::Acousticness,
        Dimension::Instrumentalness,
        Dimension::Speechiness,
        Dimension::Liveness,
        Dimension::Loudness,
        Dimension::Tempo,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Dimension::Energy => "energy",
            Dimension::Valence => "valence",
            Dimension::Danceability => "danceability",
            Dimension::Acousticness => "acousticness",
            Dimension::Instrumentalness => "instrumentalness",
            Dimension::Speechiness => "speechiness",
            Dimension::Liveness => "liveness",
            Dimension::Loudness => "loudness",
            Dimension::Tempo => "tempo",
        }
    }

    /// Range a branch-pattern delta is clamped to for this dimension.
    ///
    /// Tempo has its own BPM range; every other dimension a pattern touches is
    /// clamped to the unit interval.
    #[must_use]
    pub const fn clamp_range(self) -> (f64, f64) {
        match self {
            Dimension::Tempo => (TEMPO_MIN, TEMPO_MAX),
            _ => (0.0, 1.0),
        }
    }

    /// Clamp `value` into this dimension's pattern range.
    #[must_use]
    pub fn clamp(self, value: f64) -> f64 {
        let (min, max) = self.clamp_range();
        value.clamp(min, max)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// Audio profile of a single track.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub danceability: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acousticness: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrumentalness: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speechiness: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liveness: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loudness: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tempo: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<i8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<i8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_signature: Option<i8>,
}

impl FeatureVector {
    #[must_use]
    pub fn get(&self, dimension: Dimension) -> Option<f64> {
        match dimension {
            Dimension::Energy => self.energy,
            Dimension::Valence => self.valence,
            Dimension::Danceability => self.danceability,
            Dimension::Acousticness => self.acousticness,
            Dimension::Instrumentalness => self.instrumentalness,
            Dimension::Speechiness => self.speechiness,
            Dimension::Liveness => self.liveness,
            Dimension::Loudness => self.loudness,
            Dimension::Tempo => self.tempo,
        }
    }

    pub fn set(&mut self, dimension: Dimension, value: f64) {
        let slot = match dimension {
            Dimension::Energy => &mut self.energy,
            Dimension::Valence => &mut self.valence,
            Dimension::Danceability => &mut self.danceability,
            Dimension::Acousticness => &mut self.acousticness,
            Dimension::Instrumentalness => &mut self.instrumentalness,
            Dimension::Speechiness => &mut self.speechiness,
            Dimension::Liveness => &mut self.liveness,
            Dimension::Loudness => &mut self.loudness,
            Dimension::Tempo => &mut self.tempo,
        };
        *slot = Some(value);
    }

    /// Builder-style setter, mostly for fixtures and tests.
    #[must_use]
    pub fn with(mut self, dimension: Dimension, value: f64) -> Self {
        self.set(dimension, value);
        self
    }

    /// Iterate over the numeric dimensions that are present.
    pub fn present(&self) -> impl Iterator<Item = (Dimension, f64)> + '_ {
        Dimension::ALL
            .iter()
            .filter_map(move |&dim| self.get(dim).map(|value| (dim, value)))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.present().next().is_none()
    }
}

// =============================================================================
// BEFORE/AFTER DISPLAY
// =============================================================================

/// Dimensions shown in the before/after comparison.
const DIFFERENCE_DIMENSIONS: [Dimension; 6] = [
    Dimension::Energy,
    Dimension::Valence,
    Dimension::Tempo,
    Dimension::Danceability,
    Dimension::Acousticness,
    Dimension::Loudness,
];

/// Change of a single dimension between two vectors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureChange {
    pub before: f64,
    pub after: f64,
    pub change: f64,
    /// Signed two-decimal rendering, e.g. `+0.30` or `-15.00`.
    pub formatted: String,
}

/// Compare two vectors over the display dimensions present in both.
#[must_use]
pub fn feature_difference(
    before: &FeatureVector,
    after: &FeatureVector,
) -> BTreeMap<Dimension, FeatureChange> {
    DIFFERENCE_DIMENSIONS
        .iter()
        .filter_map(|&dim| {
            let (b, a) = (before.get(dim)?, after.get(dim)?);
            let change = a - b;
            let formatted = if change > 0.0 {
                format!("+{change:.2}")
            } else {
                format!("{change:.2}")
            };
            Some((dim, FeatureChange { before: b, after: a, change, formatted }))
        })
        .collect()
}

/// Fixed-precision rendering of the headline dimensions.
///
/// Absent values render as zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayFeatures {
    pub energy: String,
    pub valence: String,
    pub tempo: String,
    pub danceability: String,
    pub acousticness: String,
    pub loudness: String,
}

impl From<&FeatureVector> for DisplayFeatures {
    fn from(features: &FeatureVector) -> Self {
        let two = |value: Option<f64>| format!("{:.2}", value.unwrap_or(0.0));
        Self {
            energy: two(features.energy),
            valence: two(features.valence),
            tempo: format!("{}", features.tempo.unwrap_or(0.0).round()),
            danceability: two(features.danceability),
            acousticness: two(features.acousticness),
            loudness: format!("{:.1}", features.loudness.unwrap_or(0.0)),
        }
    }
}

impl fmt::Display for DisplayFeatures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "energy {} | valence {} | tempo {} | dance {} | acoustic {} | loudness {}",
            self.energy,
            self.valence,
            self.tempo,
            self.danceability,
            self.acousticness,
            self.loudness
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_is_not_zero() {
        let features = FeatureVector::default().with(Dimension::Energy, 0.0);
        assert_eq!(features.get(Dimension::Energy), Some(0.0));
        assert_eq!(features.get(Dimension::Valence), None);
        assert!(!features.is_empty());
        assert!(FeatureVector::default().is_empty());
    }

    #[test]
    fn test_clamp_ranges() {
        assert_eq!(Dimension::Tempo.clamp(250.0), TEMPO_MAX);
        assert_eq!(Dimension::Tempo.clamp(10.0), TEMPO_MIN);
        assert_eq!(Dimension::Energy.clamp(1.2), 1.0);
        assert_eq!(Dimension::Valence.clamp(-0.4), 0.0);
    }

    #[test]
    fn test_feature_difference_only_shared_dimensions() {
        let before = FeatureVector::default()
            .with(Dimension::Energy, 0.5)
            .with(Dimension::Tempo, 120.0);
        let after = FeatureVector::default()
            .with(Dimension::Energy, 0.8)
            .with(Dimension::Tempo, 105.0)
            .with(Dimension::Valence, 0.4);

        let diff = feature_difference(&before, &after);
        assert_eq!(diff.len(), 2);
        assert_eq!(diff[&Dimension::Energy].formatted, "+0.30");
        assert_eq!(diff[&Dimension::Tempo].formatted, "-15.00");
        assert!(!diff.contains_key(&Dimension::Valence));
    }

    #[test]
    fn test_display_features_defaults_to_zero() {
        let features = FeatureVector::default().with(Dimension::Tempo, 127.6);
        let display = DisplayFeatures::from(&features);
        assert_eq!(display.tempo, "128");
        assert_eq!(display.energy, "0.00");
        assert_eq!(display.loudness, "0.0");
    }

    #[test]
    fn test_serde_skips_absent_fields() {
        let features = FeatureVector::default().with(Dimension::Energy, 0.7);
        let json = serde_json::to_string(&features).unwrap();
        assert_eq!(json, r#"{"energy":0.7}"#);

        let parsed: FeatureVector = serde_json::from_str(r#"{"tempo":98.5,"key":5}"#).unwrap();
        assert_eq!(parsed.tempo, Some(98.5));
        assert_eq!(parsed.key, Some(5));
        assert_eq!(parsed.energy, None);
    }

    #[test]
    fn test_undetected_key_parses() {
        let parsed: FeatureVector =
            serde_json::from_str(r#"{"energy":0.4,"key":-1,"mode":0}"#).unwrap();
        assert_eq!(parsed.key, Some(-1));
        assert_eq!(parsed.mode, Some(0));
    }
}
