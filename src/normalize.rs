//! Feature normalization: per-column min-max scaling to [0, 1].
//!
//! Each feature column is scaled independently over the whole catalog, so the
//! column minimum becomes 0.0 and the maximum 1.0. A constant column
//! (`max == min`) maps every value to 0.0 and is kept, so every vector has
//! one entry per feature column.

use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::error::{EngineError, Result};

/// Value given to every entry of a constant column
pub const CONSTANT_COLUMN_VALUE: f64 = 0.0;

/// Observed range of one feature column.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ColumnRange {
    pub column: String,
    pub min: f64,
    pub max: f64,
}

impl ColumnRange {
    pub fn is_constant(&self) -> bool {
        self.max == self.min
    }

    pub fn scale(&self, value: f64) -> f64 {
        if self.is_constant() {
            return CONSTANT_COLUMN_VALUE;
        }
        let span = self.max - self.min;
        if span.is_finite() {
            (value - self.min) / span
        } else {
            // max - min overflows f64; halve both ends first
            let half_span = self.max / 2.0 - self.min / 2.0;
            ((value / 2.0 - self.min / 2.0) / half_span).clamp(0.0, 1.0)
        }
    }
}

/// Normalized feature vectors keyed by `track_id`, rows in catalog order.
#[derive(Clone, Debug, Serialize)]
pub struct NormalizedMatrix {
    columns: Vec<String>,
    ranges: Vec<ColumnRange>,
    track_ids: Vec<String>,
    rows: Vec<Vec<f64>>,
    #[serde(skip)]
    index: FxHashMap<String, usize>,
}

impl NormalizedMatrix {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn ranges(&self) -> &[ColumnRange] {
        &self.ranges
    }

    pub fn track_ids(&self) -> &[String] {
        &self.track_ids
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Normalized vector of a track, O(1).
    pub fn get(&self, track_id: &str) -> Option<&[f64]> {
        self.index.get(track_id).map(|&i| self.rows[i].as_slice())
    }

    pub fn row(&self, i: usize) -> Option<&[f64]> {
        self.rows.get(i).map(Vec::as_slice)
    }

    pub fn position(&self, track_id: &str) -> Option<usize> {
        self.index.get(track_id).copied()
    }

    /// (track_id, vector) pairs in catalog order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.track_ids
            .iter()
            .zip(&self.rows)
            .map(|(id, row)| (id.as_str(), row.as_slice()))
    }

    pub fn constant_columns(&self) -> Vec<&str> {
        self.ranges
            .iter()
            .filter(|r| r.is_constant())
            .map(|r| r.column.as_str())
            .collect()
    }

    /// True when this matrix has exactly the catalog's rows, in the same order.
    pub fn covers(&self, catalog: &Catalog) -> bool {
        self.columns.as_slice() == catalog.feature_columns()
            && self.track_ids.len() == catalog.len()
            && self
                .track_ids
                .iter()
                .zip(catalog.tracks())
                .all(|(id, track)| *id == track.track_id)
    }
}

/// Column ranges over all rows of the catalog.
pub fn column_ranges(catalog: &Catalog) -> Vec<ColumnRange> {
    catalog
        .feature_columns()
        .iter()
        .enumerate()
        .map(|(col, name)| {
            let (min, max) = catalog.tracks().iter().map(|t| t.features[col]).fold(
                (f64::INFINITY, f64::NEG_INFINITY),
                |(lo, hi), v| (lo.min(v), hi.max(v)),
            );
            ColumnRange {
                column: name.clone(),
                min,
                max,
            }
        })
        .collect()
}

/// Build the normalized matrix for a catalog.
pub fn normalize(catalog: &Catalog) -> Result<NormalizedMatrix> {
    if catalog.feature_columns().is_empty() {
        return Err(EngineError::data("cannot normalize: no feature columns"));
    }
    if catalog.is_empty() {
        return Err(EngineError::data("cannot normalize: catalog has no tracks"));
    }

    let start = Instant::now();
    let ranges = column_ranges(catalog);

    for range in ranges.iter().filter(|r| r.is_constant()) {
        warn!(
            column = %range.column,
            value = range.min,
            "constant feature column, normalized to {}",
            CONSTANT_COLUMN_VALUE
        );
    }

    let rows: Vec<Vec<f64>> = catalog
        .tracks()
        .par_iter()
        .map(|track| {
            track
                .features
                .iter()
                .zip(&ranges)
                .map(|(&v, range)| range.scale(v))
                .collect()
        })
        .collect();

    let track_ids: Vec<String> = catalog.tracks().iter().map(|t| t.track_id.clone()).collect();
    let mut index: FxHashMap<String, usize> = FxHashMap::default();
    index.reserve(track_ids.len());
    for (i, id) in track_ids.iter().enumerate() {
        if index.insert(id.clone(), i).is_some() {
            return Err(EngineError::data(format!(
                "cannot index matrix: duplicate track_id '{}'",
                id
            )));
        }
    }

    debug!(
        rows = rows.len(),
        columns = ranges.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "catalog normalized"
    );

    Ok(NormalizedMatrix {
        columns: catalog.feature_columns().to_vec(),
        ranges,
        track_ids,
        rows,
        index,
    })
}
