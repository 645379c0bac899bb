// Library root: percentile-based two-entity comparison for tabular sports
// data. Re-exports all modules so the CLI and integration tests can reach
// the public API.

pub mod catalog;
pub mod compare;
pub mod config;
pub mod dataset;
pub mod engine;
pub mod percentile;
pub mod population;

pub use catalog::{eligible_metrics, CatalogError, Denylist, DenylistTable};
pub use compare::{assemble, CompareError, Comparison, CyclicComparison, MetricComparison, RawTable};
pub use config::{Config, ConfigError, DatasetProfile};
pub use dataset::{Dataset, DatasetError};
pub use engine::{ComparisonReport, ComparisonRequest, Engine, FilterOptions};
pub use percentile::{percentile, PercentileKind};
pub use population::{filter, Population, Predicates};
