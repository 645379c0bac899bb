// Two-entity comparison assembly.
//
// Produces the paired raw values, percentile ranks and deltas a radar/pizza
// chart and its companion table consume. Every parallel array follows the
// caller's metric order; the cyclic variant repeats the first metric to
// close the polar loop.

use serde::Serialize;

use crate::catalog::CatalogError;
use crate::dataset::{Dataset, DatasetError, Record};
use crate::percentile::{percentile_with, PercentileKind};
use crate::population::Population;

/// A radar with fewer axes than this is not meaningful.
pub const MIN_METRICS: usize = 3;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum CompareError {
    #[error("at least {min} metrics are required, got {got}")]
    InsufficientMetrics { got: usize, min: usize },

    #[error("no record with {identifier} = '{id}'")]
    EntityNotFound { identifier: String, id: String },

    #[error("the filtered population is empty")]
    EmptyPopulation,

    #[error("unknown metric '{0}'")]
    UnknownMetric(String),

    #[error("metric '{0}' is not numeric")]
    NotNumeric(String),

    #[error("unknown dataset '{0}'")]
    UnknownDataset(String),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// One axis of the comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricComparison {
    pub metric: String,
    pub raw_a: Option<f64>,
    pub raw_b: Option<f64>,
    pub percentile_a: u8,
    pub percentile_b: u8,
    /// `raw_a - raw_b`; `None` unless both raw values are present.
    pub delta: Option<f64>,
}

/// Comparison of two entities over an ordered metric list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub entity_a: String,
    pub entity_b: String,
    pub kind: &'static str,
    pub population_size: usize,
    pub metrics: Vec<MetricComparison>,
}

/// Closed-loop series for polar plotting: every sequence has the first
/// metric repeated at the end.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CyclicComparison {
    pub metrics: Vec<String>,
    pub raw_a: Vec<Option<f64>>,
    pub raw_b: Vec<Option<f64>>,
    pub percentiles_a: Vec<u8>,
    pub percentiles_b: Vec<u8>,
}

impl Comparison {
    pub fn metric_names(&self) -> Vec<String> {
        self.metrics.iter().map(|m| m.metric.clone()).collect()
    }

    pub fn raw_a(&self) -> Vec<Option<f64>> {
        self.metrics.iter().map(|m| m.raw_a).collect()
    }

    pub fn raw_b(&self) -> Vec<Option<f64>> {
        self.metrics.iter().map(|m| m.raw_b).collect()
    }

    pub fn percentiles_a(&self) -> Vec<u8> {
        self.metrics.iter().map(|m| m.percentile_a).collect()
    }

    pub fn percentiles_b(&self) -> Vec<u8> {
        self.metrics.iter().map(|m| m.percentile_b).collect()
    }

    pub fn deltas(&self) -> Vec<Option<f64>> {
        self.metrics.iter().map(|m| m.delta).collect()
    }

    pub fn cyclic(&self) -> CyclicComparison {
        CyclicComparison {
            metrics: close_loop(self.metric_names()),
            raw_a: close_loop(self.raw_a()),
            raw_b: close_loop(self.raw_b()),
            percentiles_a: close_loop(self.percentiles_a()),
            percentiles_b: close_loop(self.percentiles_b()),
        }
    }
}

fn close_loop<T: Clone>(mut values: Vec<T>) -> Vec<T> {
    if let Some(first) = values.first().cloned() {
        values.push(first);
    }
    values
}

// ---------------------------------------------------------------------------
// Validation and entity resolution
// ---------------------------------------------------------------------------

/// Check the metric list before any percentile is computed: enough axes,
/// every metric a numeric column of `dataset`.
pub fn validate_metrics(dataset: &Dataset, metrics: &[String], min: usize) -> Result<(), CompareError> {
    if metrics.len() < min {
        return Err(CompareError::InsufficientMetrics {
            got: metrics.len(),
            min,
        });
    }
    for metric in metrics {
        if !dataset.has_column(metric) {
            return Err(CompareError::UnknownMetric(metric.clone()));
        }
        if !dataset.is_numeric(metric) {
            return Err(CompareError::NotNumeric(metric.clone()));
        }
    }
    Ok(())
}

/// Look up an entity in the full dataset; the first matching row wins.
pub fn resolve_entity<'a>(
    dataset: &'a Dataset,
    identifier: &str,
    id: &str,
) -> Result<Record<'a>, CompareError> {
    dataset
        .find_record(identifier, id)
        .ok_or_else(|| CompareError::EntityNotFound {
            identifier: identifier.to_string(),
            id: id.to_string(),
        })
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

/// Assemble a comparison with the default percentile convention.
///
/// Callers must have validated `metrics` (see [`validate_metrics`]); the
/// assembler itself does not re-check the minimum axis count.
pub fn assemble(
    entity_a: (&str, Record<'_>),
    entity_b: (&str, Record<'_>),
    metrics: &[String],
    population: &Population<'_>,
) -> Comparison {
    assemble_with(PercentileKind::default(), entity_a, entity_b, metrics, population)
}

/// Assemble a comparison of two resolved records. Percentiles are measured
/// against `population`; an empty population ranks everything at 0.
pub fn assemble_with(
    kind: PercentileKind,
    (name_a, record_a): (&str, Record<'_>),
    (name_b, record_b): (&str, Record<'_>),
    metrics: &[String],
    population: &Population<'_>,
) -> Comparison {
    let rows = metrics
        .iter()
        .map(|metric| {
            let raw_a = record_a.value(metric);
            let raw_b = record_b.value(metric);
            let reference = population.values(metric);
            MetricComparison {
                metric: metric.clone(),
                raw_a,
                raw_b,
                percentile_a: percentile_with(kind, raw_a, &reference),
                percentile_b: percentile_with(kind, raw_b, &reference),
                delta: raw_a.zip(raw_b).map(|(a, b)| a - b),
            }
        })
        .collect();

    Comparison {
        entity_a: name_a.to_string(),
        entity_b: name_b.to_string(),
        kind: kind.label(),
        population_size: population.len(),
        metrics: rows,
    }
}

// ---------------------------------------------------------------------------
// Entity pickers
// ---------------------------------------------------------------------------

/// Distinct identifiers in the population, in dataset order.
pub fn entity_candidates(population: &Population<'_>, identifier: &str) -> Vec<String> {
    population.distinct_values(identifier)
}

/// Candidates for the second entity: every candidate except `first`. Empty
/// when `first` was the only one.
pub fn rival_candidates(candidates: &[String], first: &str) -> Vec<String> {
    candidates.iter().filter(|c| *c != first).cloned().collect()
}

// ---------------------------------------------------------------------------
// Raw-value table
// ---------------------------------------------------------------------------

/// Side-by-side raw values, one row per metric and one column per record
/// whose identifier is either selected entity. Duplicate identifiers show up
/// as extra columns rather than being hidden.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawTable {
    pub entities: Vec<String>,
    pub rows: Vec<RawRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawRow {
    pub metric: String,
    pub values: Vec<Option<f64>>,
}

impl RawTable {
    pub fn build(dataset: &Dataset, identifier: &str, ids: [&str; 2], metrics: &[String]) -> Self {
        let records: Vec<Record<'_>> = (0..dataset.row_count())
            .filter_map(|row| dataset.record(row))
            .filter(|r| r.label(identifier).is_some_and(|label| ids.contains(&label)))
            .collect();

        let entities = records
            .iter()
            .filter_map(|r| r.label(identifier))
            .map(str::to_string)
            .collect();
        let rows = metrics
            .iter()
            .map(|metric| RawRow {
                metric: metric.clone(),
                values: records.iter().map(|r| r.value(metric)).collect(),
            })
            .collect();

        RawTable { entities, rows }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
