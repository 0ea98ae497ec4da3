//! Core data models for the recommendation engine.
//!
//! Track rows, ranked results, visual profiles and load statistics. The
//! catalog itself lives in `catalog.rs` and the normalized matrix in
//! `normalize.rs`.

use serde::Serialize;

// ============================================================================
// Feature Columns
// ============================================================================

/// Default feature set: the Spotify audio features, in matrix column order.
pub const AUDIO_FEATURES: [&str; 12] = [
    "popularity",
    "duration_ms",
    "danceability",
    "energy",
    "loudness",
    "mode",
    "speechiness",
    "acousticness",
    "instrumentalness",
    "liveness",
    "valence",
    "tempo",
];

/// Columns kept in the matrix but left off the visual profile.
pub const PROFILE_EXCLUDED: [&str; 1] = ["duration_ms"];

/// Required display/key columns of a catalog source.
pub const TRACK_ID_COLUMN: &str = "track_id";
pub const TRACK_NAME_COLUMN: &str = "track_name";
pub const ARTISTS_COLUMN: &str = "artists";

/// Default number of results: the selected track plus five neighbors.
pub const DEFAULT_RECOMMENDATIONS: usize = 6;

// ============================================================================
// Catalog Rows
// ============================================================================

/// One catalog row.
/// `features` is aligned with the owning catalog's feature columns.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrackRecord {
    pub track_id: String,
    pub track_name: String,
    pub artists: String, // Display only, never part of the distance
    pub features: Vec<f64>,
}

// ============================================================================
// Recommendation Output
// ============================================================================

/// A ranked track joined back to its display metadata.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RecommendedTrack {
    pub rank: usize, // 0 = the query track itself
    pub track_id: String,
    pub distance: f64,
    pub track_name: String,
    pub artists: String,
}

/// Ranked recommendations for one query.
///
/// Entry 0 is always the query track at distance 0.0; the neighbors follow in
/// ascending distance with ties in catalog order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RecommendationResult {
    query_track_id: String,
    entries: Vec<RecommendedTrack>,
}

impl RecommendationResult {
    pub(crate) fn new(query_track_id: String, entries: Vec<RecommendedTrack>) -> Self {
        Self {
            query_track_id,
            entries,
        }
    }

    pub fn query_track_id(&self) -> &str {
        &self.query_track_id
    }

    /// All entries in rank order, the selected track first.
    pub fn entries(&self) -> &[RecommendedTrack] {
        &self.entries
    }

    /// The track the user picked (rank 0).
    pub fn selected(&self) -> Option<&RecommendedTrack> {
        self.entries.first()
    }

    /// Everything after rank 0.
    pub fn similar(&self) -> &[RecommendedTrack] {
        self.entries.get(1..).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// Profiles
// ============================================================================

/// One axis of a track profile
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProfileAxis {
    pub feature: String,
    pub value: f64, // Normalized, 0.0 to 1.0
}

/// Normalized feature profile of one track, ready for a radar chart.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Profile {
    pub track_id: String,
    pub axes: Vec<ProfileAxis>,
}

impl Profile {
    pub fn value(&self, feature: &str) -> Option<f64> {
        self.axes
            .iter()
            .find(|axis| axis.feature == feature)
            .map(|axis| axis.value)
    }
}

// ============================================================================
// Statistics (Instrumentation)
// ============================================================================

/// Catalog load and normalization statistics.
#[derive(Default, Debug, Clone, Serialize)]
pub struct CatalogStats {
    pub source: String,
    pub tracks: usize,
    pub feature_columns: usize,
    pub constant_columns: Vec<String>,
    pub distinct_titles: usize,
    pub load_seconds: f64,
    pub normalize_seconds: f64,
}

impl CatalogStats {
    /// Share of tracks whose title is unique in the catalog, as a percentage
    pub fn distinct_title_rate(&self) -> f64 {
        if self.tracks == 0 {
            0.0
        } else {
            100.0 * self.distinct_titles as f64 / self.tracks as f64
        }
    }

    /// Log stats to stderr in JSON format
    pub fn log_phase(&self, phase: &str) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            eprintln!("[STATS:{}]\n{}", phase, json);
        }
    }

    /// Write stats to a JSON file
    pub fn write_to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
