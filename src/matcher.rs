use log::debug;
use rayon::prelude::*;

use crate::common::{IndexMatch, Matchable};
use crate::config::MatcherConfig;

/// A correspondence between `query[query_idx]` and `train[train_idx]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub query_idx: usize,
    pub train_idx: usize,
    /// Number of differing descriptor bits.
    pub distance: usize,
}

impl Match {
    pub fn indices(&self) -> IndexMatch {
        (self.query_idx, self.train_idx)
    }
}

/// Index of the first minimum.
fn argmin(values: impl Iterator<Item = usize>) -> Option<(usize, usize)> {
    values
        .enumerate()
        .fold(None, |best, (idx, dist)| match best {
            Some((_, best_dist)) if best_dist <= dist => best,
            _ => Some((idx, dist)),
        })
}

/// Brute force nearest neighbour matching with cross-check.
///
/// A pair `(i, j)` is kept only when `train[j]` is the nearest neighbour of
/// `query[i]` and `query[i]` is the nearest neighbour of `train[j]`. Ties go
/// to the lowest index in both directions, so swapping the inputs yields the
/// same pairs reversed. The result is sorted by ascending distance; equal
/// distances keep query order.
pub fn match_descriptors<T>(query: &[T], train: &[T], config: &MatcherConfig) -> Vec<Match>
where
    T: Matchable + Sync,
{
    if query.is_empty() || train.is_empty() {
        return Vec::new();
    }

    let distances: Vec<Vec<usize>> = query
        .par_iter()
        .map(|q| train.iter().map(|t| q.distance(t)).collect())
        .collect();

    let mut best_query = vec![(0usize, usize::MAX); train.len()];
    for (i, row) in distances.iter().enumerate() {
        for (j, &dist) in row.iter().enumerate() {
            if dist < best_query[j].1 {
                best_query[j] = (i, dist);
            }
        }
    }

    let mut matches: Vec<Match> = distances
        .iter()
        .enumerate()
        .filter_map(|(i, row)| {
            let (j, dist) = argmin(row.iter().copied())?;
            if best_query[j].0 != i {
                return None;
            }
            if config.max_distance.map_or(false, |max| dist > max) {
                return None;
            }
            Some(Match {
                query_idx: i,
                train_idx: j,
                distance: dist,
            })
        })
        .collect();

    matches.sort_by_key(|m| m.distance);

    debug!(
        "matcher: {} cross-checked matches between {} and {} descriptors",
        matches.len(),
        query.len(),
        train.len()
    );
    matches
}
