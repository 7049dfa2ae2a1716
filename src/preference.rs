//! Rebalancing a recommendation list between tracks the listener already
//! likes and tracks that are new to them.

use crate::track::Track;
use std::collections::HashSet;

/// Pick `round(len * ratio)` liked tracks and fill the rest with new ones.
///
/// Selected liked tracks come first, then selected new tracks, each in their
/// original relative order. When one side runs short, the unused remainder
/// (in original order) makes up the difference, so the output always has the
/// input's length. An empty `liked_ids` returns the input untouched.
///
/// # Examples
///
/// ```
/// use beatree::preference::filter_by_preference;
/// use beatree::track::Track;
/// use std::collections::HashSet;
///
/// let tracks: Vec<Track> = ["a", "b", "c", "d"]
///     .iter()
///     .map(|id| Track::new(*id, *id, "Artist"))
///     .collect();
/// let liked: HashSet<String> = ["c".to_string(), "d".to_string()].into();
///
/// let picked = filter_by_preference(&tracks, &liked, 0.25);
/// let ids: Vec<&str> = picked.iter().map(|t| t.id.as_str()).collect();
/// assert_eq!(ids, ["c", "a", "b", "d"]);
/// ```
#[must_use]
pub fn filter_by_preference(
    tracks: &[Track],
    liked_ids: &HashSet<String>,
    ratio: f64,
) -> Vec<Track> {
    if liked_ids.is_empty() || tracks.is_empty() {
        return tracks.to_vec();
    }

    let ratio = if ratio.is_nan() { 0.0 } else { ratio.clamp(0.0, 1.0) };
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let target_liked = (tracks.len() as f64 * ratio).round() as usize;
    let target_new = tracks.len() - target_liked;

    let (liked, fresh): (Vec<usize>, Vec<usize>) =
        (0..tracks.len()).partition(|&i| liked_ids.contains(&tracks[i].id));

    let mut order: Vec<usize> = liked
        .iter()
        .take(target_liked)
        .chain(fresh.iter().take(target_new))
        .copied()
        .collect();
    let mut picked = vec![false; tracks.len()];
    for &i in &order {
        picked[i] = true;
    }
    // Whatever is left over makes up the shortfall.
    order.extend((0..tracks.len()).filter(|&i| !picked[i]));

    log::debug!(
        "Preference filter: {} of {} slots for liked tracks (ratio {ratio:.2})",
        target_liked.min(liked.len()),
        order.len()
    );
    order.into_iter().map(|i| tracks[i].clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracks(ids: &[&str]) -> Vec<Track> {
        ids.iter().map(|id| Track::new(*id, *id, "Artist")).collect()
    }

    fn liked(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|id| (*id).to_string()).collect()
    }

    fn ids(tracks: &[Track]) -> Vec<&str> {
        tracks.iter().map(|track| track.id.as_str()).collect()
    }

    #[test]
    fn test_empty_liked_set_is_identity() {
        let input = tracks(&["a", "b", "c"]);
        assert_eq!(filter_by_preference(&input, &HashSet::new(), 1.0), input);
    }

    #[test]
    fn test_empty_input() {
        assert!(filter_by_preference(&[], &liked(&["a"]), 0.5).is_empty());
    }

    #[test]
    fn test_half_ratio_balances() {
        let input = tracks(&["l1", "n1", "l2", "l3", "n2", "l4"]);
        let result = filter_by_preference(&input, &liked(&["l1", "l2", "l3", "l4"]), 0.5);
        assert_eq!(ids(&result), vec!["l1", "l2", "l3", "n1", "n2", "l4"]);
    }

    #[test]
    fn test_ratio_zero_prefers_new() {
        let input = tracks(&["l1", "n1", "l2", "n2"]);
        let result = filter_by_preference(&input, &liked(&["l1", "l2"]), 0.0);
        // Only two new tracks exist; liked ones backfill in original order.
        assert_eq!(ids(&result), vec!["n1", "n2", "l1", "l2"]);
    }

    #[test]
    fn test_ratio_one_prefers_liked() {
        let input = tracks(&["n1", "l1", "n2", "l2"]);
        let result = filter_by_preference(&input, &liked(&["l1", "l2"]), 1.0);
        assert_eq!(ids(&result), vec!["l1", "l2", "n1", "n2"]);
    }

    #[test]
    fn test_length_and_membership_preserved() {
        let input = tracks(&["a", "b", "c", "d", "e", "f", "g"]);
        for ratio in [0.0, 0.2, 0.5, 0.8, 1.0] {
            let result = filter_by_preference(&input, &liked(&["b", "e"]), ratio);
            assert_eq!(result.len(), input.len());
            let mut sorted = ids(&result);
            sorted.sort_unstable();
            assert_eq!(sorted, ids(&input));
        }
    }

    #[test]
    fn test_rounding_half_up() {
        // 3 * 0.5 = 1.5 rounds to 2 liked
        let input = tracks(&["n1", "l1", "l2"]);
        let result = filter_by_preference(&input, &liked(&["l1", "l2"]), 0.5);
        assert_eq!(ids(&result), vec!["l1", "l2", "n1"]);
    }
}
