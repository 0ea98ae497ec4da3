//! Track catalog: loading, validation and lookup.
//!
//! A catalog is read once (CSV or SQLite) and is read-only afterwards. All
//! validation happens here so that normalization and ranking can assume a
//! well-formed table:
//!
//! - at least one feature column and at least one track
//! - every feature value present and finite
//! - `track_id` non-empty and unique
//!
//! Rows keep their source order; that order is the tie-break for ranking and
//! the "first match" order for lookup by title.

use rusqlite::types::ValueRef;
use rusqlite::Connection;
use rustc_hash::{FxHashMap, FxHashSet};
use std::io::Read;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

use crate::error::{EngineError, Result};
use crate::lookup::suggest_titles;
use crate::models::{TrackRecord, ARTISTS_COLUMN, AUDIO_FEATURES, TRACK_ID_COLUMN, TRACK_NAME_COLUMN};
use crate::progress::{create_progress_bar, create_spinner, log_progress, LOG_INTERVAL};

/// Number of suggestions attached to a missed title lookup
pub const SUGGESTION_LIMIT: usize = 3;

// ============================================================================
// Load Options
// ============================================================================

/// Where and what to read from a catalog source.
#[derive(Clone, Debug)]
pub struct LoadOptions {
    /// Feature columns, in matrix order
    pub features: Vec<String>,
    /// Table name for SQLite sources
    pub table: String,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            features: AUDIO_FEATURES.iter().map(|f| f.to_string()).collect(),
            table: "tracks".to_string(),
        }
    }
}

/// Catalog source format, picked from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Sqlite,
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("csv") => Ok(SourceFormat::Csv),
            Some("sqlite") | Some("sqlite3") | Some("db") => Ok(SourceFormat::Sqlite),
            _ => Err(EngineError::data(format!(
                "unsupported catalog format '{}' (expected .csv, .sqlite, .sqlite3 or .db)",
                path.display()
            ))),
        }
    }
}

// ============================================================================
// Catalog
// ============================================================================

#[derive(Clone, Debug)]
pub struct Catalog {
    feature_columns: Vec<String>,
    tracks: Vec<TrackRecord>,
    id_index: FxHashMap<String, usize>,
}

impl Catalog {
    /// Build a catalog from rows, validating the invariants listed in the
    /// module docs.
    pub fn new(feature_columns: Vec<String>, tracks: Vec<TrackRecord>) -> Result<Self> {
        if feature_columns.is_empty() {
            return Err(EngineError::data("catalog has no feature columns"));
        }
        {
            let mut seen_columns: FxHashSet<&str> = FxHashSet::default();
            for column in &feature_columns {
                if !seen_columns.insert(column.as_str()) {
                    return Err(EngineError::data(format!(
                        "feature column '{}' listed twice",
                        column
                    )));
                }
            }
        }
        if tracks.is_empty() {
            return Err(EngineError::data("catalog has no tracks"));
        }

        let mut id_index: FxHashMap<String, usize> = FxHashMap::default();
        id_index.reserve(tracks.len());

        for (row, track) in tracks.iter().enumerate() {
            if track.track_id.is_empty() {
                return Err(EngineError::data(format!("row {}: empty track_id", row)));
            }
            if track.features.len() != feature_columns.len() {
                return Err(EngineError::data(format!(
                    "row {} ('{}'): expected {} feature values, found {}",
                    row,
                    track.track_id,
                    feature_columns.len(),
                    track.features.len()
                )));
            }
            if let Some(col) = track.features.iter().position(|v| !v.is_finite()) {
                return Err(EngineError::data(format!(
                    "row {} ('{}'): non-finite value in column '{}'",
                    row, track.track_id, feature_columns[col]
                )));
            }
            if let Some(first) = id_index.insert(track.track_id.clone(), row) {
                return Err(EngineError::data(format!(
                    "duplicate track_id '{}' at rows {} and {}",
                    track.track_id, first, row
                )));
            }
        }

        Ok(Self {
            feature_columns,
            tracks,
            id_index,
        })
    }

    /// Load a catalog file, picking the reader from the extension.
    pub fn load(path: &Path, options: &LoadOptions) -> Result<Self> {
        let start = Instant::now();
        let catalog = match SourceFormat::from_path(path)? {
            SourceFormat::Csv => Self::from_csv_path(path, options)?,
            SourceFormat::Sqlite => {
                let conn = Connection::open(path)?;
                Self::from_sqlite(&conn, options)?
            }
        };
        info!(
            path = %path.display(),
            tracks = catalog.len(),
            features = catalog.feature_columns.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "catalog loaded"
        );
        Ok(catalog)
    }

    pub fn from_csv_path(path: &Path, options: &LoadOptions) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_csv_reader(file, options)
    }

    /// Read a CSV catalog with a header row. Columns are matched by name;
    /// extra columns (an unnamed index column, album, explicit, ...) are ignored.
    /// Ids, titles and artists are kept exactly as written.
    pub fn from_csv_reader<R: Read>(reader: R, options: &LoadOptions) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let column_index = |name: &str| -> Result<usize> {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| EngineError::data(format!("missing column '{}'", name)))
        };

        let id_col = column_index(TRACK_ID_COLUMN)?;
        let name_col = column_index(TRACK_NAME_COLUMN)?;
        let artists_col = column_index(ARTISTS_COLUMN)?;
        let feature_cols = options
            .features
            .iter()
            .map(|f| column_index(f.as_str()))
            .collect::<Result<Vec<_>>>()?;

        let spinner = create_spinner("Reading catalog");
        let mut tracks = Vec::new();

        for (row, record) in csv_reader.records().enumerate() {
            let record = record?;
            let field = |col: usize| record.get(col).unwrap_or("");

            let mut features = Vec::with_capacity(feature_cols.len());
            for (&col, name) in feature_cols.iter().zip(&options.features) {
                features.push(parse_feature(field(col), row, name)?);
            }

            tracks.push(TrackRecord {
                track_id: field(id_col).to_string(),
                track_name: field(name_col).to_string(),
                artists: field(artists_col).to_string(),
                features,
            });
            if (row as u64 + 1) % LOG_INTERVAL == 0 {
                spinner.set_message(format!("Reading catalog: {} rows", row + 1));
            }
        }

        spinner.finish_with_message(format!("Read {} tracks", tracks.len()));
        debug!(rows = tracks.len(), "csv catalog parsed");
        Self::new(options.features.clone(), tracks)
    }

    /// Read a catalog table from SQLite. Integer ids are accepted and
    /// stringified; numeric text feature values are parsed.
    pub fn from_sqlite(conn: &Connection, options: &LoadOptions) -> Result<Self> {
        let table = quote_ident(&options.table);
        let mut columns = vec![
            quote_ident(TRACK_ID_COLUMN),
            quote_ident(TRACK_NAME_COLUMN),
            quote_ident(ARTISTS_COLUMN),
        ];
        columns.extend(options.features.iter().map(|f| quote_ident(f)));

        let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
            row.get(0)
        })?;
        let total = count.max(0) as u64;

        // rowid order matches insertion order, which is the catalog order
        let select_sql = format!(
            "SELECT {} FROM {} ORDER BY rowid",
            columns.join(", "),
            table
        );
        let mut stmt = conn.prepare(&select_sql)?;
        let mut rows = stmt.query([])?;

        let pb = create_progress_bar(total, "Reading catalog");
        let mut tracks = Vec::with_capacity(total as usize);
        let mut row_num = 0usize;

        while let Some(row) = rows.next()? {
            let mut features = Vec::with_capacity(options.features.len());
            for (i, name) in options.features.iter().enumerate() {
                features.push(sqlite_feature(row.get_ref(3 + i)?, row_num, name)?);
            }

            tracks.push(TrackRecord {
                track_id: sqlite_text(row.get_ref(0)?),
                track_name: sqlite_text(row.get_ref(1)?),
                artists: sqlite_text(row.get_ref(2)?),
                features,
            });

            row_num += 1;
            pb.inc(1);
            log_progress("READ", row_num as u64, total, LOG_INTERVAL);
        }

        pb.finish_with_message(format!("Read {} tracks", tracks.len()));
        Self::new(options.features.clone(), tracks)
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn feature_columns(&self) -> &[String] {
        &self.feature_columns
    }

    pub fn tracks(&self) -> &[TrackRecord] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, track_id: &str) -> Option<&TrackRecord> {
        self.id_index.get(track_id).map(|&i| &self.tracks[i])
    }

    /// First track with exactly this title, in catalog order.
    pub fn find_by_name(&self, name: &str) -> Option<&TrackRecord> {
        self.tracks.iter().find(|t| t.track_name == name)
    }

    /// Like `find_by_name`, but a miss becomes `TrackNotFound` with suggestions.
    pub fn resolve_name(&self, name: &str) -> Result<&TrackRecord> {
        self.find_by_name(name)
            .ok_or_else(|| EngineError::TrackNotFound {
                name: name.to_string(),
                suggestions: self.suggest(name, SUGGESTION_LIMIT),
            })
    }

    /// Closest titles to a name that missed, best first.
    pub fn suggest(&self, name: &str, limit: usize) -> Vec<String> {
        suggest_titles(self.tracks.iter().map(|t| t.track_name.as_str()), name, limit)
    }

    /// All titles sorted ascending, duplicates kept (the selection list).
    pub fn track_names_sorted(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tracks.iter().map(|t| t.track_name.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn distinct_titles(&self) -> usize {
        self.tracks
            .iter()
            .map(|t| t.track_name.as_str())
            .collect::<FxHashSet<_>>()
            .len()
    }
}

// ============================================================================
// Value Parsing
// ============================================================================

fn parse_feature(raw: &str, row: usize, column: &str) -> Result<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(EngineError::data(format!(
            "row {}: missing value in column '{}'",
            row, column
        )));
    }
    // Pandas-style booleans show up in exported Spotify tables
    match raw {
        "True" | "true" => return Ok(1.0),
        "False" | "false" => return Ok(0.0),
        _ => {}
    }
    raw.parse::<f64>().map_err(|_| {
        EngineError::data(format!(
            "row {}: non-numeric value '{}' in column '{}'",
            row, raw, column
        ))
    })
}

fn sqlite_feature(value: ValueRef<'_>, row: usize, column: &str) -> Result<f64> {
    match value {
        ValueRef::Integer(i) => Ok(i as f64),
        ValueRef::Real(f) => Ok(f),
        ValueRef::Text(t) => parse_feature(&String::from_utf8_lossy(t), row, column),
        ValueRef::Null => Err(EngineError::data(format!(
            "row {}: missing value in column '{}'",
            row, column
        ))),
        ValueRef::Blob(_) => Err(EngineError::data(format!(
            "row {}: blob value in column '{}'",
            row, column
        ))),
    }
}

fn sqlite_text(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Null | ValueRef::Blob(_) => String::new(),
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(features: &[&str]) -> LoadOptions {
        LoadOptions {
            features: features.iter().map(|f| f.to_string()).collect(),
            ..Default::default()
        }
    }

    fn track(id: &str, name: &str, features: Vec<f64>) -> TrackRecord {
        TrackRecord {
            track_id: id.to_string(),
            track_name: name.to_string(),
            artists: "Artist".to_string(),
            features,
        }
    }

    const CSV: &str = "\
,track_id,artists,track_name,energy,tempo,explicit
0,id1,Miley Cyrus,Flowers,0.68,118.0,False
1,id2,SZA,Kill Bill,0.73,89.0,False
2,id3,Harry Styles,As It Was,0.73,174.0,False
3,id4,Someone Else,Flowers,0.20,60.0,True
";

    #[test]
    fn test_csv_reads_named_columns_and_ignores_extras() {
        let catalog = Catalog::from_csv_reader(CSV.as_bytes(), &options(&["energy", "tempo"])).unwrap();
        assert_eq!(catalog.len(), 4);
        assert_eq!(catalog.feature_columns(), &["energy".to_string(), "tempo".to_string()]);
        let t = catalog.get("id2").unwrap();
        assert_eq!(t.track_name, "Kill Bill");
        assert_eq!(t.artists, "SZA");
        assert_eq!(t.features, vec![0.73, 89.0]);
    }

    #[test]
    fn test_csv_boolean_feature() {
        let catalog = Catalog::from_csv_reader(CSV.as_bytes(), &options(&["explicit"])).unwrap();
        assert_eq!(catalog.get("id4").unwrap().features, vec![1.0]);
        assert_eq!(catalog.get("id1").unwrap().features, vec![0.0]);
    }

    #[test]
    fn test_csv_titles_kept_verbatim_and_padded_numbers_parse() {
        let csv = "track_id , track_name,artists,energy\nid1,Flowers ,X, 0.5 \nid2,  Unholy,Y,0.25\n";
        let catalog = Catalog::from_csv_reader(csv.as_bytes(), &options(&["energy"])).unwrap();
        assert_eq!(catalog.get("id1").unwrap().track_name, "Flowers ");
        assert_eq!(catalog.get("id1").unwrap().features, vec![0.5]);
        assert_eq!(catalog.find_by_name("Flowers ").unwrap().track_id, "id1");
        assert!(catalog.find_by_name("Flowers").is_none());
        assert_eq!(catalog.find_by_name("  Unholy").unwrap().track_id, "id2");
    }

    #[test]
    fn test_csv_blank_value_is_missing() {
        let csv = "track_id,track_name,artists,energy\nid1,A,X,   \n";
        let err = Catalog::from_csv_reader(csv.as_bytes(), &options(&["energy"])).unwrap_err();
        assert!(err.to_string().contains("row 0: missing value in column 'energy'"));
    }

    #[test]
    fn test_csv_missing_column() {
        let err = Catalog::from_csv_reader(CSV.as_bytes(), &options(&["valence"])).unwrap_err();
        assert!(matches!(err, EngineError::Data(_)));
        assert!(err.to_string().contains("missing column 'valence'"));
    }

    #[test]
    fn test_csv_missing_value() {
        let csv = "track_id,track_name,artists,energy\nid1,A,X,0.5\nid2,B,Y,\n";
        let err = Catalog::from_csv_reader(csv.as_bytes(), &options(&["energy"])).unwrap_err();
        assert!(err.to_string().contains("row 1: missing value in column 'energy'"));
    }

    #[test]
    fn test_csv_non_numeric_value() {
        let csv = "track_id,track_name,artists,energy\nid1,A,X,loud\n";
        let err = Catalog::from_csv_reader(csv.as_bytes(), &options(&["energy"])).unwrap_err();
        assert!(err.to_string().contains("non-numeric value 'loud'"));
    }

    #[test]
    fn test_duplicate_track_id_rejected() {
        let err = Catalog::new(
            vec!["f".to_string()],
            vec![track("1", "A", vec![0.0]), track("1", "B", vec![1.0])],
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Data(_)));
        assert!(err.to_string().contains("duplicate track_id '1'"));
    }

    #[test]
    fn test_no_feature_columns_rejected() {
        let err = Catalog::new(vec![], vec![track("1", "A", vec![])]).unwrap_err();
        assert!(err.to_string().contains("no feature columns"));
    }

    #[test]
    fn test_empty_catalog_rejected() {
        let err = Catalog::new(vec!["f".to_string()], vec![]).unwrap_err();
        assert!(err.to_string().contains("no tracks"));
    }

    #[test]
    fn test_non_finite_rejected() {
        let err = Catalog::new(vec!["f".to_string()], vec![track("1", "A", vec![f64::NAN])])
            .unwrap_err();
        assert!(err.to_string().contains("non-finite"));
    }

    #[test]
    fn test_row_width_mismatch_rejected() {
        let err = Catalog::new(
            vec!["f".to_string(), "g".to_string()],
            vec![track("1", "A", vec![0.0])],
        )
        .unwrap_err();
        assert!(err.to_string().contains("expected 2 feature values, found 1"));
    }

    #[test]
    fn test_find_by_name_first_match() {
        let catalog = Catalog::from_csv_reader(CSV.as_bytes(), &options(&["energy"])).unwrap();
        assert_eq!(catalog.find_by_name("Flowers").unwrap().track_id, "id1");
        assert!(catalog.find_by_name("flowers").is_none());
    }

    #[test]
    fn test_resolve_name_miss_carries_suggestions() {
        let catalog = Catalog::from_csv_reader(CSV.as_bytes(), &options(&["energy"])).unwrap();
        match catalog.resolve_name("Kill Bil") {
            Err(EngineError::TrackNotFound { name, suggestions }) => {
                assert_eq!(name, "Kill Bil");
                assert_eq!(suggestions.first().map(String::as_str), Some("Kill Bill"));
            }
            other => panic!("expected TrackNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_track_names_sorted_and_distinct() {
        let catalog = Catalog::from_csv_reader(CSV.as_bytes(), &options(&["energy"])).unwrap();
        assert_eq!(
            catalog.track_names_sorted(),
            vec!["As It Was", "Flowers", "Flowers", "Kill Bill"]
        );
        assert_eq!(catalog.distinct_titles(), 3);
    }

    #[test]
    fn test_sqlite_catalog() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE songs (track_id INTEGER, track_name TEXT, artists TEXT, energy REAL, mode INTEGER);
             INSERT INTO songs VALUES (10, 'Anti-Hero', 'Taylor Swift', 0.64, 1);
             INSERT INTO songs VALUES (11, 'Unholy', 'Sam Smith', 0.47, 0);",
        )
        .unwrap();
        let opts = LoadOptions {
            features: vec!["energy".to_string(), "mode".to_string()],
            table: "songs".to_string(),
        };
        let catalog = Catalog::from_sqlite(&conn, &opts).unwrap();
        assert_eq!(catalog.len(), 2);
        let t = catalog.get("10").unwrap();
        assert_eq!(t.track_name, "Anti-Hero");
        assert_eq!(t.features, vec![0.64, 1.0]);
        assert_eq!(catalog.tracks()[1].track_id, "11");
    }

    #[test]
    fn test_sqlite_null_feature_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE tracks (track_id TEXT, track_name TEXT, artists TEXT, energy REAL);
             INSERT INTO tracks VALUES ('a', 'A', 'X', NULL);",
        )
        .unwrap();
        let err = Catalog::from_sqlite(&conn, &options(&["energy"])).unwrap_err();
        assert!(err.to_string().contains("missing value in column 'energy'"));
    }

    #[test]
    fn test_source_format_from_path() {
        assert_eq!(SourceFormat::from_path(Path::new("data/clean_data.csv")).unwrap(), SourceFormat::Csv);
        assert_eq!(SourceFormat::from_path(Path::new("x.SQLITE3")).unwrap(), SourceFormat::Sqlite);
        assert!(SourceFormat::from_path(Path::new("x.parquet")).is_err());
    }
}
