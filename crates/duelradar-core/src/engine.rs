// Comparison engine: one pipeline for every registered dataset.
//
// The engine owns the configuration and a load-once dataset cache. Each
// request is independent: it filters a population, resolves both entities
// and assembles the comparison without touching shared state beyond the
// cache lookup.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

use crate::catalog::{default_metrics, eligible_metrics};
use crate::compare::{
    assemble_with, entity_candidates, resolve_entity, validate_metrics, CompareError, Comparison,
    RawTable,
};
use crate::config::{Config, DatasetProfile};
use crate::dataset::{load_dataset, Dataset, DatasetError};
use crate::population::{default_filter_values, filter, Predicates};

// ---------------------------------------------------------------------------
// Dataset cache
// ---------------------------------------------------------------------------

/// Datasets keyed by source path. Each file is read at most once per
/// process; callers share the same immutable `Arc<Dataset>`.
#[derive(Debug, Default)]
pub struct DatasetCache {
    loaded: Mutex<HashMap<PathBuf, Arc<Dataset>>>,
}

impl DatasetCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_load(&self, path: &Path) -> Result<Arc<Dataset>, DatasetError> {
        let mut loaded = self.loaded.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(dataset) = loaded.get(path) {
            return Ok(Arc::clone(dataset));
        }
        let dataset = Arc::new(load_dataset(path)?);
        loaded.insert(path.to_path_buf(), Arc::clone(&dataset));
        Ok(dataset)
    }

    /// Register an already-built dataset under `path`.
    pub fn insert(&self, path: impl Into<PathBuf>, dataset: Dataset) -> Arc<Dataset> {
        let dataset = Arc::new(dataset);
        self.loaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.into(), Arc::clone(&dataset));
        dataset
    }

    pub fn len(&self) -> usize {
        self.loaded.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Requests and reports
// ---------------------------------------------------------------------------

/// What a user picked: a dataset, two entities, the metrics (empty for the
/// default selection) and the population filter.
#[derive(Debug, Clone, Default)]
pub struct ComparisonRequest {
    pub dataset: String,
    pub entity_a: String,
    pub entity_b: String,
    pub metrics: Vec<String>,
    pub predicates: Predicates,
}

/// Everything the presentation layer needs for one comparison.
#[derive(Debug, Clone)]
pub struct ComparisonReport {
    pub comparison: Comparison,
    pub table: RawTable,
    /// Identifiers of the selected entities that occur on more than one row.
    pub ambiguous: Vec<String>,
}

/// Choices for one filter attribute, plus the value preselected before the
/// user picks any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOptions {
    pub attribute: String,
    pub values: Vec<String>,
    pub default: Vec<String>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Engine {
    config: Config,
    cache: DatasetCache,
}

impl Engine {
    pub fn new(config: Config) -> Self {
        Engine {
            config,
            cache: DatasetCache::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &DatasetCache {
        &self.cache
    }

    pub fn profile(&self, name: &str) -> Result<&DatasetProfile, CompareError> {
        self.config
            .datasets
            .get(name)
            .ok_or_else(|| CompareError::UnknownDataset(name.to_string()))
    }

    pub fn dataset(&self, name: &str) -> Result<Arc<Dataset>, CompareError> {
        let profile = self.profile(name)?;
        Ok(self.cache.get_or_load(&profile.path)?)
    }

    /// Eligible metrics for a dataset, in column order.
    pub fn metrics(&self, name: &str) -> Result<Vec<String>, CompareError> {
        let profile = self.profile(name)?;
        let dataset = self.dataset(name)?;
        Ok(eligible_metrics(&dataset, &profile.denylist)?)
    }

    /// Entities selectable under `predicates`.
    pub fn candidates(&self, name: &str, predicates: &Predicates) -> Result<Vec<String>, CompareError> {
        let profile = self.profile(name)?;
        let dataset = self.dataset(name)?;
        let population = filter(&dataset, predicates);
        Ok(entity_candidates(&population, &profile.identifier))
    }

    /// Distinct values offered for each configured filter attribute.
    pub fn filter_options(&self, name: &str) -> Result<Vec<FilterOptions>, CompareError> {
        let profile = self.profile(name)?;
        let dataset = self.dataset(name)?;
        let population = filter(&dataset, &Predicates::new());
        Ok(profile
            .filter_attributes
            .iter()
            .filter(|attr| dataset.has_column(attr))
            .map(|attr| FilterOptions {
                attribute: attr.clone(),
                values: population.distinct_values(attr),
                default: default_filter_values(&population, attr),
            })
            .collect())
    }

    /// Identifiers shared by several records.
    pub fn duplicates(&self, name: &str) -> Result<Vec<(String, usize)>, CompareError> {
        let profile = self.profile(name)?;
        let dataset = self.dataset(name)?;
        Ok(dataset.duplicate_identifiers(&profile.identifier))
    }

    /// Run one comparison request end to end.
    pub fn compare(&self, request: &ComparisonRequest) -> Result<ComparisonReport, CompareError> {
        let profile = self.profile(&request.dataset)?;
        let min = self.config.comparison.min_metrics;

        // An explicit selection too small for a radar is rejected before
        // anything is loaded or ranked.
        if !request.metrics.is_empty() && request.metrics.len() < min {
            return Err(CompareError::InsufficientMetrics {
                got: request.metrics.len(),
                min,
            });
        }

        let dataset = self.dataset(&request.dataset)?;
        let metrics = if request.metrics.is_empty() {
            let catalog = eligible_metrics(&dataset, &profile.denylist)?;
            default_metrics(&catalog, self.config.comparison.default_metric_count)
        } else {
            request.metrics.clone()
        };
        validate_metrics(&dataset, &metrics, min)?;

        let population = filter(&dataset, &request.predicates);
        if population.is_empty() {
            return Err(CompareError::EmptyPopulation);
        }
        debug!(
            "population for {}: {} of {} records",
            request.dataset,
            population.len(),
            dataset.row_count()
        );

        let record_a = resolve_entity(&dataset, &profile.identifier, &request.entity_a)?;
        let record_b = resolve_entity(&dataset, &profile.identifier, &request.entity_b)?;

        let duplicates = dataset.duplicate_identifiers(&profile.identifier);
        let ambiguous: Vec<String> = duplicates
            .into_iter()
            .map(|(id, _)| id)
            .filter(|id| *id == request.entity_a || *id == request.entity_b)
            .collect();
        for id in &ambiguous {
            warn!("'{}' is not a unique {}; comparing the first record", id, profile.identifier);
        }

        let comparison = assemble_with(
            self.config.percentile,
            (request.entity_a.as_str(), record_a),
            (request.entity_b.as_str(), record_b),
            &metrics,
            &population,
        );
        let table = RawTable::build(
            &dataset,
            &profile.identifier,
            [request.entity_a.as_str(), request.entity_b.as_str()],
            &metrics,
        );

        info!(
            "Compared '{}' vs '{}' on {} metrics against {} records",
            request.entity_a,
            request.entity_b,
            metrics.len(),
            population.len()
        );

        Ok(ComparisonReport {
            comparison,
            table,
            ambiguous,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
