//! Process-wide catalog snapshot.
//!
//! A snapshot pairs a catalog with the matrix normalized from it. The engine
//! holds the current snapshot behind an `ArcSwap`: queries load the pointer
//! once and work against that snapshot for the whole call, while a reload
//! builds a complete replacement first and then swaps it in. A failed reload
//! leaves the previous snapshot live.

use arc_swap::ArcSwap;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::catalog::{Catalog, LoadOptions};
use crate::error::Result;
use crate::models::{CatalogStats, Profile, RecommendationResult};
use crate::normalize::{normalize, NormalizedMatrix};
use crate::profile::profile;
use crate::scoring::{recommend, recommend_by_id};

/// Immutable catalog plus its normalized matrix.
#[derive(Debug)]
pub struct CatalogSnapshot {
    catalog: Catalog,
    matrix: NormalizedMatrix,
    stats: CatalogStats,
}

impl CatalogSnapshot {
    /// Normalize `catalog` and pair the two.
    pub fn build(catalog: Catalog, source: &str) -> Result<Self> {
        let start = Instant::now();
        let matrix = normalize(&catalog)?;
        let stats = CatalogStats {
            source: source.to_string(),
            tracks: catalog.len(),
            feature_columns: catalog.feature_columns().len(),
            constant_columns: matrix
                .constant_columns()
                .into_iter()
                .map(String::from)
                .collect(),
            distinct_titles: catalog.distinct_titles(),
            load_seconds: 0.0,
            normalize_seconds: start.elapsed().as_secs_f64(),
        };
        Ok(Self {
            catalog,
            matrix,
            stats,
        })
    }

    /// Load a catalog file and build its snapshot.
    pub fn open(path: &Path, options: &LoadOptions) -> Result<Self> {
        let start = Instant::now();
        let catalog = Catalog::load(path, options)?;
        let load_seconds = start.elapsed().as_secs_f64();
        let mut snapshot = Self::build(catalog, &path.display().to_string())?;
        snapshot.stats.load_seconds = load_seconds;
        Ok(snapshot)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn matrix(&self) -> &NormalizedMatrix {
        &self.matrix
    }

    pub fn stats(&self) -> &CatalogStats {
        &self.stats
    }
}

/// Recommendations together with the snapshot they were computed against,
/// so profile lookups for the listed tracks always agree with the ranking.
#[derive(Debug, Clone)]
pub struct RecommendationView {
    pub result: RecommendationResult,
    pub snapshot: Arc<CatalogSnapshot>,
}

impl RecommendationView {
    pub fn matrix(&self) -> &NormalizedMatrix {
        self.snapshot.matrix()
    }

    /// Profiles of every listed track, in result order.
    pub fn profiles(&self) -> Result<Vec<Profile>> {
        self.result
            .entries()
            .iter()
            .map(|entry| profile(&entry.track_id, self.snapshot.matrix()))
            .collect()
    }
}

/// Recommendation engine over a swappable snapshot.
pub struct Engine {
    current: ArcSwap<CatalogSnapshot>,
    options: LoadOptions,
}

impl Engine {
    pub fn new(snapshot: CatalogSnapshot, options: LoadOptions) -> Self {
        Self {
            current: ArcSwap::from_pointee(snapshot),
            options,
        }
    }

    /// Load and normalize a catalog file once.
    pub fn open(path: &Path, options: LoadOptions) -> Result<Self> {
        let snapshot = CatalogSnapshot::open(path, &options)?;
        Ok(Self::new(snapshot, options))
    }

    pub fn from_catalog(catalog: Catalog) -> Result<Self> {
        let options = LoadOptions {
            features: catalog.feature_columns().to_vec(),
            ..Default::default()
        };
        let snapshot = CatalogSnapshot::build(catalog, "memory")?;
        Ok(Self::new(snapshot, options))
    }

    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        self.current.load_full()
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    pub fn recommend(&self, track_name: &str, k: NonZeroUsize) -> Result<RecommendationView> {
        let snapshot = self.snapshot();
        let result = recommend(snapshot.catalog(), snapshot.matrix(), track_name, k)?;
        Ok(RecommendationView { result, snapshot })
    }

    pub fn recommend_by_id(&self, track_id: &str, k: NonZeroUsize) -> Result<RecommendationView> {
        let snapshot = self.snapshot();
        let result = recommend_by_id(snapshot.catalog(), snapshot.matrix(), track_id, k)?;
        Ok(RecommendationView { result, snapshot })
    }

    pub fn profile(&self, track_id: &str) -> Result<Profile> {
        profile(track_id, self.snapshot().matrix())
    }

    /// Re-read a catalog file with the engine's load options and swap it in.
    pub fn reload(&self, path: &Path) -> Result<Arc<CatalogSnapshot>> {
        let snapshot = CatalogSnapshot::open(path, &self.options)?;
        Ok(self.install(snapshot))
    }

    /// Swap in an already-loaded catalog.
    pub fn replace(&self, catalog: Catalog) -> Result<Arc<CatalogSnapshot>> {
        let snapshot = CatalogSnapshot::build(catalog, "memory")?;
        Ok(self.install(snapshot))
    }

    fn install(&self, snapshot: CatalogSnapshot) -> Arc<CatalogSnapshot> {
        info!(
            source = %snapshot.stats.source,
            tracks = snapshot.catalog.len(),
            "catalog snapshot swapped"
        );
        let snapshot = Arc::new(snapshot);
        self.current.store(Arc::clone(&snapshot));
        snapshot
    }
}
