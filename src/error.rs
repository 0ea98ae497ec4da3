//! Error types for the recommendation engine.

use thiserror::Error;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Everything the engine can fail with.
///
/// `Data` and the two not-found variants are the engine's own taxonomy; the
/// remaining variants wrap the sources a catalog can be loaded from.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Catalog is malformed for normalization or ranking
    #[error("data error: {0}")]
    Data(String),

    /// Query title has no match in the catalog
    #[error("track '{name}' not found in catalog")]
    TrackNotFound {
        name: String,
        /// Closest catalog titles, best first
        suggestions: Vec<String>,
    },

    /// Track id absent from the catalog or normalized matrix
    #[error("track id '{0}' not found")]
    TrackIdNotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl EngineError {
    pub fn data(msg: impl Into<String>) -> Self {
        EngineError::Data(msg.into())
    }

    /// True for both not-found variants.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            EngineError::TrackNotFound { .. } | EngineError::TrackIdNotFound(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = EngineError::TrackNotFound {
            name: "Unknown Song".to_string(),
            suggestions: vec![],
        };
        assert_eq!(err.to_string(), "track 'Unknown Song' not found in catalog");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_data_error_is_not_not_found() {
        let err = EngineError::data("no feature columns");
        assert_eq!(err.to_string(), "data error: no feature columns");
        assert!(!err.is_not_found());
    }
}
