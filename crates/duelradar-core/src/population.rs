// Reference population filtering.
//
// A population is the cohort percentiles are measured against ("midfielders
// in La Liga"). It is a view over a dataset's rows selected by categorical
// predicates; the dataset itself is never copied or mutated.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::dataset::{Cell, Dataset};

// ---------------------------------------------------------------------------
// Predicates
// ---------------------------------------------------------------------------

/// Attribute -> allowed values. Predicates on distinct attributes are ANDed;
/// an empty value set places no restriction on its attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Predicates {
    allowed: BTreeMap<String, BTreeSet<String>>,
}

impl Predicates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or extend) the allowed values for `attribute`.
    pub fn with<I, S>(mut self, attribute: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(attribute, values);
        self
    }

    pub fn insert<I, S>(&mut self, attribute: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed
            .entry(attribute.into())
            .or_default()
            .extend(values.into_iter().map(Into::into));
    }

    /// Parse `Attr=v1,v2` into a predicate. `Attr=` yields an empty (ignored)
    /// value set.
    pub fn parse_entry(entry: &str) -> Option<(String, Vec<String>)> {
        let (attribute, values) = entry.split_once('=')?;
        let attribute = attribute.trim();
        if attribute.is_empty() {
            return None;
        }
        let values = values
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();
        Some((attribute.to_string(), values))
    }

    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.allowed.iter().map(|(k, v)| (k.as_str(), v))
    }
}

// ---------------------------------------------------------------------------
// Population
// ---------------------------------------------------------------------------

/// A possibly-empty subset of a dataset's rows, in dataset order.
#[derive(Debug, Clone)]
pub struct Population<'a> {
    dataset: &'a Dataset,
    rows: Vec<usize>,
}

impl<'a> Population<'a> {
    /// Every row of the dataset.
    pub fn full(dataset: &'a Dataset) -> Self {
        Population {
            dataset,
            rows: (0..dataset.row_count()).collect(),
        }
    }

    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Narrow this population further. Filtering by predicates on distinct
    /// attributes one after another gives the same rows as one combined
    /// filter. On a shared attribute, sequential filters intersect the value
    /// sets while `Predicates::with` would merge them.
    pub fn filter(&self, predicates: &Predicates) -> Population<'a> {
        let active: Vec<(&str, &BTreeSet<String>)> = predicates
            .iter()
            .filter(|(attribute, values)| {
                if values.is_empty() {
                    debug!("ignoring predicate on '{}': no values selected", attribute);
                    return false;
                }
                if !self.dataset.has_column(attribute) {
                    debug!("ignoring predicate on unknown attribute '{}'", attribute);
                    return false;
                }
                true
            })
            .collect();

        let rows = self
            .rows
            .iter()
            .copied()
            .filter(|&row| {
                active
                    .iter()
                    .all(|(attribute, values)| cell_matches(self.dataset.cell(row, attribute), values))
            })
            .collect();

        Population {
            dataset: self.dataset,
            rows,
        }
    }

    /// Non-missing numeric values of `attribute` across the population. This
    /// is the reference array for percentile ranks.
    pub fn values(&self, attribute: &str) -> Vec<f64> {
        self.rows
            .iter()
            .filter_map(|&row| self.dataset.cell(row, attribute).as_number())
            .filter(|v| !v.is_nan())
            .collect()
    }

    /// Distinct non-missing labels of `attribute` in first-appearance order.
    pub fn distinct_values(&self, attribute: &str) -> Vec<String> {
        let mut seen = BTreeSet::new();
        self.rows
            .iter()
            .filter_map(|&row| self.dataset.label(row, attribute))
            .filter(|label| seen.insert(*label))
            .map(str::to_string)
            .collect()
    }
}

/// Filter `dataset` by `predicates`. No predicates returns every row.
pub fn filter<'a>(dataset: &'a Dataset, predicates: &Predicates) -> Population<'a> {
    Population::full(dataset).filter(predicates)
}

/// The first distinct value of `attribute`, used as the initial filter
/// selection when a user has not chosen one yet.
pub fn default_filter_values(population: &Population<'_>, attribute: &str) -> Vec<String> {
    population
        .distinct_values(attribute)
        .into_iter()
        .take(1)
        .collect()
}

fn cell_matches(cell: Cell<'_>, allowed: &BTreeSet<String>) -> bool {
    match cell {
        Cell::Missing => false,
        Cell::Text(s) => allowed.contains(s),
        Cell::Number(v) => allowed
            .iter()
            .any(|a| a.trim().parse::<f64>().is_ok_and(|x| x == v)),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
