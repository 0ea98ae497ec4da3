//! Content-based track recommendations over a static audio-feature catalog.
//!
//! The catalog is min-max normalized per feature column, and tracks are
//! ranked by Euclidean distance to a query track's normalized vector.

pub mod catalog;
pub mod error;
pub mod lookup;
pub mod models;
pub mod normalize;
pub mod profile;
pub mod progress;
pub mod safety;
pub mod scoring;
pub mod snapshot;

pub use catalog::{Catalog, LoadOptions};
pub use error::{EngineError, Result};
pub use models::{Profile, RecommendationResult, RecommendedTrack, TrackRecord};
pub use normalize::{normalize, NormalizedMatrix};
pub use profile::profile;
pub use scoring::{recommend, recommend_by_id};
pub use snapshot::{CatalogSnapshot, Engine, RecommendationView};
