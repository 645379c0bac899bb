// Configuration loading and parsing (duelradar.toml).

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::catalog::{Denylist, DenylistTable};
use crate::compare::MIN_METRICS;
use crate::percentile::PercentileKind;

/// Name of the configuration file inside `config/` and `defaults/`.
pub const CONFIG_FILE: &str = "duelradar.toml";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("invalid TOML in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("`{field}` {message}")]
    Invalid { field: String, message: String },

    #[error("no config/ or defaults/ directory under {0}")]
    NoConfigDir(PathBuf),

    #[error("cannot install default config at {path}: {source}")]
    Install { path: PathBuf, source: io::Error },
}

// ---------------------------------------------------------------------------
// Assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub percentile: PercentileKind,
    pub comparison: ComparisonConfig,
    pub datasets: BTreeMap<String, DatasetProfile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ComparisonConfig {
    #[serde(default = "default_min_metrics")]
    pub min_metrics: usize,
    #[serde(default = "default_metric_count")]
    pub default_metric_count: usize,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        ComparisonConfig {
            min_metrics: default_min_metrics(),
            default_metric_count: default_metric_count(),
        }
    }
}

fn default_min_metrics() -> usize {
    MIN_METRICS
}

fn default_metric_count() -> usize {
    6
}

/// A registered dataset: where it lives, how entities are named, which
/// categorical columns can restrict the population and what the catalog
/// excludes.
#[derive(Debug, Clone)]
pub struct DatasetProfile {
    pub name: String,
    pub path: PathBuf,
    pub identifier: String,
    pub filter_attributes: Vec<String>,
    pub denylist: Denylist,
}

impl DatasetProfile {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, identifier: impl Into<String>) -> Self {
        let name = name.into();
        let denylist = DenylistTable::default().get(&name);
        DatasetProfile {
            name,
            path: path.into(),
            identifier: identifier.into(),
            filter_attributes: Vec::new(),
            denylist,
        }
    }

    pub fn with_filters<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filter_attributes = attributes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_denylist(mut self, denylist: Denylist) -> Self {
        self.denylist = denylist;
        self
    }
}

impl Config {
    pub fn new(datasets: impl IntoIterator<Item = DatasetProfile>) -> Self {
        Config {
            percentile: PercentileKind::default(),
            comparison: ComparisonConfig::default(),
            datasets: datasets.into_iter().map(|p| (p.name.clone(), p)).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// duelradar.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the whole file.
#[derive(Debug, Clone, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    percentile: PercentileSection,
    #[serde(default)]
    comparison: ComparisonConfig,
    /// Shape -> denylist, replacing the built-in entry for that shape.
    #[serde(default)]
    denylists: BTreeMap<String, Denylist>,
    #[serde(default)]
    datasets: BTreeMap<String, DatasetSection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PercentileSection {
    #[serde(default)]
    kind: PercentileKind,
}

#[derive(Debug, Clone, Deserialize)]
struct DatasetSection {
    path: String,
    identifier: String,
    #[serde(default)]
    filter_attributes: Vec<String>,
    /// Denylist shape; defaults to the dataset's own name.
    #[serde(default)]
    shape: Option<String>,
    /// Per-dataset denylist, taking precedence over the shape's.
    #[serde(default)]
    denylist: Option<Denylist>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate `config/duelradar.toml` relative to `base_dir`.
/// Relative dataset paths are resolved against `base_dir`.
///
/// This does not copy defaults; prefer `load_config()`.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join(CONFIG_FILE);
    let text = read_file(&path)?;
    parse_config(&text, base_dir).map_err(|e| match e {
        ParseFailure::Toml(source) => ConfigError::Parse { path, source },
        ParseFailure::Invalid(err) => err,
    })
}

enum ParseFailure {
    Toml(toml::de::Error),
    Invalid(ConfigError),
}

fn parse_config(text: &str, base_dir: &Path) -> Result<Config, ParseFailure> {
    let file: ConfigFile = toml::from_str(text).map_err(ParseFailure::Toml)?;

    let mut denylists = DenylistTable::default();
    for (shape, list) in file.denylists {
        denylists.set(shape, list);
    }

    let datasets = file
        .datasets
        .into_iter()
        .map(|(name, section)| {
            let shape = section.shape.as_deref().unwrap_or(&name);
            let denylist = section
                .denylist
                .clone()
                .unwrap_or_else(|| denylists.get(shape));
            let path = PathBuf::from(&section.path);
            let path = if path.is_relative() && !section.path.is_empty() {
                base_dir.join(path)
            } else {
                path
            };
            let profile = DatasetProfile {
                name: name.clone(),
                path,
                identifier: section.identifier.trim().to_string(),
                filter_attributes: section.filter_attributes,
                denylist,
            };
            (name, profile)
        })
        .collect();

    let config = Config {
        percentile: file.percentile.kind,
        comparison: file.comparison,
        datasets,
    };
    validate(&config).map_err(ParseFailure::Invalid)?;
    Ok(config)
}

/// Copy every file in `defaults/` that `config/` lacks, leaving existing
/// (possibly edited) copies alone. `*.example` files stay behind. Returns the
/// installed paths.
pub fn install_missing_defaults(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.is_dir() {
        return if config_dir.is_dir() {
            Ok(Vec::new())
        } else {
            Err(ConfigError::NoConfigDir(base_dir.to_path_buf()))
        };
    }
    fs::create_dir_all(&config_dir).map_err(install_error(&config_dir))?;

    let mut sources = fs::read_dir(&defaults_dir)
        .and_then(|entries| entries.map(|e| e.map(|e| e.path())).collect::<io::Result<Vec<_>>>())
        .map_err(install_error(&defaults_dir))?;
    sources.retain(|path| path.is_file() && path.extension() != Some(OsStr::new("example")));
    sources.sort();

    let mut installed = Vec::new();
    for source in sources {
        let Some(name) = source.file_name() else {
            continue;
        };
        let target = config_dir.join(name);
        if install_default(&source, &target).map_err(install_error(&target))? {
            info!("installed default config {}", target.display());
            installed.push(target);
        }
    }
    Ok(installed)
}

/// Copy `source` to `target` unless `target` already exists.
fn install_default(source: &Path, target: &Path) -> io::Result<bool> {
    let mut dest = match OpenOptions::new().write(true).create_new(true).open(target) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(e),
    };
    io::copy(&mut File::open(source)?, &mut dest)?;
    Ok(true)
}

fn install_error(path: &Path) -> impl FnOnce(io::Error) -> ConfigError {
    let path = path.to_path_buf();
    move |source| ConfigError::Install { path, source }
}

/// Pick the directory holding `config/` or `defaults/`: `start` when it has
/// either, otherwise the per-user config directory.
pub fn resolve_base_dir(start: &Path) -> PathBuf {
    if start.join("config").exists() || start.join("defaults").exists() {
        return start.to_path_buf();
    }
    directories::ProjectDirs::from("", "", "duelradar")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .filter(|dir| dir.join("config").exists())
        .unwrap_or_else(|| start.to_path_buf())
}

/// Load config relative to `base_dir` (or the current directory), copying
/// default files first.
pub fn load_config(base_dir: Option<&Path>) -> Result<Config, ConfigError> {
    let start = match base_dir {
        Some(dir) => dir.to_path_buf(),
        None => std::env::current_dir().map_err(|source| ConfigError::Read {
            path: PathBuf::from("."),
            source,
        })?,
    };
    let base = resolve_base_dir(&start);
    install_missing_defaults(&base)?;
    load_config_from(&base)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    let cmp = &config.comparison;
    if cmp.min_metrics < MIN_METRICS {
        return Err(ConfigError::Invalid {
            field: "comparison.min_metrics".into(),
            message: format!("must be at least {MIN_METRICS}, got {}", cmp.min_metrics),
        });
    }
    if cmp.default_metric_count < cmp.min_metrics {
        return Err(ConfigError::Invalid {
            field: "comparison.default_metric_count".into(),
            message: format!(
                "must be at least min_metrics ({}), got {}",
                cmp.min_metrics, cmp.default_metric_count
            ),
        });
    }

    if config.datasets.is_empty() {
        return Err(ConfigError::Invalid {
            field: "datasets".into(),
            message: "at least one dataset must be configured".into(),
        });
    }

    for (name, profile) in &config.datasets {
        if profile.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                field: format!("datasets.{name}.path"),
                message: "must not be empty".into(),
            });
        }
        if profile.identifier.is_empty() {
            return Err(ConfigError::Invalid {
                field: format!("datasets.{name}.identifier"),
                message: "must not be empty".into(),
            });
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
