//! Distance and ranking.
//!
//! This module contains the similarity ranker:
//! - Euclidean distance between normalized vectors
//! - Stable ascending ranking of every catalog track against a query vector
//! - The metadata join back to the catalog for display

use rayon::prelude::*;
use std::num::NonZeroUsize;

use crate::catalog::Catalog;
use crate::error::{EngineError, Result};
use crate::models::{RecommendationResult, RecommendedTrack};
use crate::normalize::NormalizedMatrix;

// ============================================================================
// Distance
// ============================================================================

/// Straight-line distance between two vectors of equal length.
pub fn euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Distance from `query` to every row, in matrix (catalog) order.
pub fn distances_to(matrix: &NormalizedMatrix, query: &[f64]) -> Vec<f64> {
    (0..matrix.len())
        .into_par_iter()
        .map(|i| {
            matrix
                .row(i)
                .map_or(f64::INFINITY, |row| euclidean_distance(row, query))
        })
        .collect()
}

// ============================================================================
// Ranking
// ============================================================================

/// Rows other than `query_row`, nearest first.
/// Sort is stable, so equal distances keep catalog order.
pub fn rank_neighbors(distances: &[f64], query_row: usize) -> Vec<(usize, f64)> {
    let mut ranked: Vec<(usize, f64)> = distances
        .iter()
        .copied()
        .enumerate()
        .filter(|&(i, _)| i != query_row)
        .collect();
    ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
    ranked
}

/// Recommend by title: the first catalog track named `query_track_name` is the
/// query. See [`recommend_by_id`] for the shape of the result.
pub fn recommend(
    catalog: &Catalog,
    matrix: &NormalizedMatrix,
    query_track_name: &str,
    k: NonZeroUsize,
) -> Result<RecommendationResult> {
    let query = catalog.resolve_name(query_track_name)?;
    recommend_by_id(catalog, matrix, &query.track_id, k)
}

/// Recommend by track id.
///
/// Returns at most `k` entries. Entry 0 is the query track itself at distance
/// 0.0, placed there explicitly rather than by the sort, so a different track
/// with an identical vector never takes its slot. Entries 1.. are the `k - 1`
/// nearest other tracks, ascending by distance, ties in catalog order.
pub fn recommend_by_id(
    catalog: &Catalog,
    matrix: &NormalizedMatrix,
    track_id: &str,
    k: NonZeroUsize,
) -> Result<RecommendationResult> {
    if !matrix.covers(catalog) {
        return Err(EngineError::data(
            "normalized matrix was not built from this catalog",
        ));
    }

    let query_row = matrix
        .position(track_id)
        .ok_or_else(|| EngineError::TrackIdNotFound(track_id.to_string()))?;
    let query_vector = matrix
        .row(query_row)
        .ok_or_else(|| EngineError::TrackIdNotFound(track_id.to_string()))?;

    let distances = distances_to(matrix, query_vector);
    let neighbors = rank_neighbors(&distances, query_row);

    let selected = std::iter::once((query_row, 0.0))
        .chain(neighbors)
        .take(k.get());

    let tracks = catalog.tracks();
    let entries = selected
        .enumerate()
        .map(|(rank, (row, distance))| {
            let track = &tracks[row];
            RecommendedTrack {
                rank,
                track_id: track.track_id.clone(),
                distance,
                track_name: track.track_name.clone(),
                artists: track.artists.clone(),
            }
        })
        .collect();

    Ok(RecommendationResult::new(track_id.to_string(), entries))
}
