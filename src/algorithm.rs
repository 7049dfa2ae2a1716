//! Similarity scoring between audio profiles.
//!
//! Compares a candidate's feature vector against a target profile and
//! blends the result with the candidate's library provenance.

use crate::features::{Dimension, FeatureVector};
use rayon::prelude::*;

/// Weighted dimensions used by [`similarity`].
pub const SIMILARITY_WEIGHTS: [(Dimension, f64); 6] = [
    (Dimension::Energy, 0.25),
    (Dimension::Valence, 0.25),
    (Dimension::Danceability, 0.20),
    (Dimension::Tempo, 0.15),
    (Dimension::Acousticness, 0.10),
    (Dimension::Instrumentalness, 0.05),
];

/// Tempo differences are divided by this before use, bringing BPM onto
/// roughly the same scale as the unit-interval dimensions.
pub const TEMPO_SCALE: f64 = 100.0;

/// Default share of similarity in the combined candidate score.
pub const DEFAULT_SIMILARITY_BLEND: f64 = 0.7;

/// Weighted closeness of two feature vectors in `[0, 1]`.
///
/// Only dimensions present in both vectors count, and the result is
/// normalised by the weights actually used. Returns 0 when the vectors
/// share no weighted dimension.
///
/// # Mathematical Foundation
///
/// ```text
/// diff(d)  = min(|a.d - b.d| / scale(d), 1)        scale(tempo) = 100, else 1
/// score    = Σ w(d) · (1 - diff(d)) / Σ w(d)       over d present in a and b
/// ```
///
/// # Examples
///
/// ```
/// use beatree::algorithm::similarity;
/// use beatree::features::{Dimension, FeatureVector};
///
/// let a = FeatureVector::default().with(Dimension::Energy, 0.8);
/// let b = FeatureVector::default().with(Dimension::Energy, 0.6);
/// assert!((similarity(&a, &b) - 0.8).abs() < 1e-9);
/// ```
#[must_use]
pub fn similarity(a: &FeatureVector, b: &FeatureVector) -> f64 {
    let (weighted, total_weight) = SIMILARITY_WEIGHTS
        .iter()
        .filter_map(|&(dim, weight)| {
            let (x, y) = (a.get(dim)?, b.get(dim)?);
            let scale = match dim {
                Dimension::Tempo => TEMPO_SCALE,
                _ => 1.0,
            };
            let diff = (x - y).abs() / scale;
            // NaN inputs would poison the sum; treat them as missing.
            (!diff.is_nan()).then(|| (weight * (1.0 - diff.min(1.0)), weight))
        })
        .fold((0.0, 0.0), |(sum, total), (contribution, weight)| {
            (sum + contribution, total + weight)
        });

    match total_weight {
        t if t > 0.0 => weighted / t,
        _ => 0.0,
    }
}

/// [`similarity`] over optional vectors; an absent side scores 0.
#[must_use]
pub fn similarity_of(a: Option<&FeatureVector>, b: Option<&FeatureVector>) -> f64 {
    match (a, b) {
        (Some(a), Some(b)) => similarity(a, b),
        _ => 0.0,
    }
}

/// Blend similarity with a provenance weight.
///
/// With the default blend this is `similarity * 0.7 + provenance * 0.3`.
#[must_use]
pub fn combined_score(similarity: f64, provenance_weight: f64, blend: f64) -> f64 {
    similarity * blend + provenance_weight * (1.0 - blend)
}

/// Score many vectors against one target in parallel.
///
/// Output order matches input order.
#[must_use]
pub fn score_batch(target: &FeatureVector, candidates: &[FeatureVector]) -> Vec<f64> {
    candidates
        .par_iter()
        .map(|candidate| similarity(target, candidate))
        .collect()
}
