//! Per-track normalized profiles for radar-style charts.

use crate::error::{EngineError, Result};
use crate::models::{Profile, ProfileAxis, PROFILE_EXCLUDED};
use crate::normalize::NormalizedMatrix;

/// Visual profile of a track: every matrix column except the excluded ones
/// (duration), in column order. The full vector stays available through
/// `NormalizedMatrix::get`.
pub fn profile(track_id: &str, matrix: &NormalizedMatrix) -> Result<Profile> {
    let vector = matrix
        .get(track_id)
        .ok_or_else(|| EngineError::TrackIdNotFound(track_id.to_string()))?;

    let axes = matrix
        .columns()
        .iter()
        .zip(vector)
        .filter(|(column, _)| !PROFILE_EXCLUDED.contains(&column.as_str()))
        .map(|(column, &value)| ProfileAxis {
            feature: column.clone(),
            value,
        })
        .collect();

    Ok(Profile {
        track_id: track_id.to_string(),
        axes,
    })
}
