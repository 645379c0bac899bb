// Tabular dataset model and CSV loading.
//
// A dataset is read once from a CSV file, typed column-by-column, and then
// shared read-only. Text is decoded as UTF-8 first and falls back to
// windows-1252 (what spreadsheet tools on Windows write as "Latin-1").

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::path::Path;

use encoding_rs::WINDOWS_1252;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("dataset unavailable at {path}: {source}")]
    Unavailable {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("dataset {path} has no header columns")]
    NoColumns { path: String },
}

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Cell tokens treated as missing, compared after trimming.
const MISSING_TOKENS: &[&str] = &["", "NA", "N/A", "NaN", "nan", "-nan", "null", "None"];

/// Inferred type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    Text,
}

/// Typed storage for one column. `None` is the single missing sentinel.
/// Numeric columns keep the trimmed source text next to the parsed values so
/// identifiers like `007` still match what the file says.
#[derive(Debug, Clone)]
pub enum ColumnData {
    Numeric {
        values: Vec<Option<f64>>,
        text: Vec<Option<String>>,
    },
    Text(Vec<Option<String>>),
}

#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn kind(&self) -> ColumnKind {
        match self.data {
            ColumnData::Numeric { .. } => ColumnKind::Numeric,
            ColumnData::Text(_) => ColumnKind::Text,
        }
    }

    pub fn cell(&self, row: usize) -> Cell<'_> {
        match &self.data {
            ColumnData::Numeric { values, .. } => match values.get(row).copied().flatten() {
                Some(v) => Cell::Number(v),
                None => Cell::Missing,
            },
            ColumnData::Text(values) => match values.get(row).and_then(|v| v.as_deref()) {
                Some(s) => Cell::Text(s),
                None => Cell::Missing,
            },
        }
    }

    /// The cell as written in the file (trimmed); `None` when missing.
    pub fn text(&self, row: usize) -> Option<&str> {
        let cells = match &self.data {
            ColumnData::Numeric { text, .. } => text,
            ColumnData::Text(cells) => cells,
        };
        cells.get(row).and_then(|c| c.as_deref())
    }
}

/// A borrowed view of a single cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cell<'a> {
    Missing,
    Number(f64),
    Text(&'a str),
}

impl Cell<'_> {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            _ => None,
        }
    }
}

/// An immutable table of uniquely named, trimmed columns.
#[derive(Debug, Clone)]
pub struct Dataset {
    source: String,
    columns: Vec<Column>,
    index: HashMap<String, usize>,
    rows: usize,
}

/// One row of a dataset.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    dataset: &'a Dataset,
    row: usize,
}

impl<'a> Record<'a> {
    pub fn row(&self) -> usize {
        self.row
    }

    /// Numeric value for `attribute`; `None` when missing, absent or textual.
    pub fn value(&self, attribute: &str) -> Option<f64> {
        self.dataset.cell(self.row, attribute).as_number()
    }

    /// Source text for `attribute`, as a user would type it.
    pub fn label(&self, attribute: &str) -> Option<&'a str> {
        self.dataset.label(self.row, attribute)
    }
}

impl Dataset {
    /// Build a dataset from already-split header and rows. Header names are
    /// trimmed and disambiguated; every row must have the header's width.
    pub fn from_rows(source: impl Into<String>, header: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let source = source.into();
        let names = unique_column_names(&source, header);

        let mut raw: Vec<Vec<Option<String>>> = vec![Vec::with_capacity(rows.len()); names.len()];
        for row in &rows {
            for (col, cells) in raw.iter_mut().enumerate() {
                cells.push(row.get(col).and_then(|c| normalize_cell(c)));
            }
        }

        let columns: Vec<Column> = names
            .into_iter()
            .zip(raw)
            .map(|(name, cells)| Column {
                name,
                data: infer_column(cells),
            })
            .collect();
        let index = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), i))
            .collect();

        Dataset {
            source,
            columns,
            index,
            rows: rows.len(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.index.get(name).map(|&i| &self.columns[i])
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn is_numeric(&self, name: &str) -> bool {
        self.column(name)
            .is_some_and(|c| c.kind() == ColumnKind::Numeric)
    }

    /// Cell at (`row`, `attribute`); `Missing` when either is out of range.
    pub fn cell(&self, row: usize, attribute: &str) -> Cell<'_> {
        match self.column(attribute) {
            Some(column) if row < self.rows => column.cell(row),
            _ => Cell::Missing,
        }
    }

    /// The string a user would select in a filter or entity picker: the
    /// cell's source text. Missing cells have no label.
    pub fn label(&self, row: usize, attribute: &str) -> Option<&str> {
        self.column(attribute).and_then(|c| c.text(row))
    }

    pub fn record(&self, row: usize) -> Option<Record<'_>> {
        (row < self.rows).then_some(Record { dataset: self, row })
    }

    /// Resolve an entity by identifier. When several rows share the
    /// identifier the first one wins and a warning is logged.
    pub fn find_record(&self, identifier: &str, id: &str) -> Option<Record<'_>> {
        let mut matches = self.rows_matching(identifier, id);
        let first = matches.next()?;
        let extra = matches.count();
        if extra > 0 {
            warn!(
                "identifier '{}' matches {} rows in {}; using the first",
                id,
                extra + 1,
                self.source
            );
        }
        self.record(first)
    }

    /// Row indices whose `identifier` cell reads `id` in the source, in row
    /// order.
    pub fn rows_matching<'s>(
        &'s self,
        identifier: &str,
        id: &'s str,
    ) -> impl Iterator<Item = usize> + 's {
        let column = self.column(identifier);
        (0..self.rows).filter(move |&row| {
            column.is_some_and(|c| c.text(row) == Some(id))
        })
    }

    /// Identifiers that occur on more than one row, with their counts, in
    /// first-appearance order.
    pub fn duplicate_identifiers(&self, identifier: &str) -> Vec<(String, usize)> {
        let Some(column) = self.column(identifier) else {
            return Vec::new();
        };
        let mut counts: HashMap<&str, usize> = HashMap::new();
        let mut order = Vec::new();
        for row in 0..self.rows {
            if let Some(label) = column.text(row) {
                let count = counts.entry(label).or_insert(0);
                if *count == 0 {
                    order.push(label);
                }
                *count += 1;
            }
        }
        order
            .into_iter()
            .filter_map(|label| {
                let n = counts[label];
                (n > 1).then(|| (label.to_string(), n))
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn normalize_cell(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if MISSING_TOKENS.contains(&trimmed) {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// A column is numeric when every present cell parses as a number. Cells
/// that parse to a non-finite value become missing.
fn infer_column(cells: Vec<Option<String>>) -> ColumnData {
    let all_numeric = cells
        .iter()
        .flatten()
        .all(|c| c.parse::<f64>().is_ok());
    if !all_numeric {
        return ColumnData::Text(cells);
    }

    let values: Vec<Option<f64>> = cells
        .iter()
        .map(|c| {
            c.as_deref()
                .and_then(|s| s.parse::<f64>().ok())
                .filter(|v| v.is_finite())
        })
        .collect();
    let text = cells
        .into_iter()
        .zip(&values)
        .map(|(cell, value)| value.and(cell))
        .collect();
    ColumnData::Numeric { values, text }
}

fn unique_column_names(source: &str, header: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut names = Vec::with_capacity(header.len());
    for raw in header {
        let base = raw.trim().to_string();
        let mut name = base.clone();
        let mut suffix = 1;
        while seen.contains(&name) {
            name = format!("{base}.{suffix}");
            suffix += 1;
        }
        if name != base {
            warn!("duplicate column '{}' in {}; renamed to '{}'", base, source, name);
        }
        seen.insert(name.clone());
        names.push(name);
    }
    names
}

/// Decode raw file bytes: UTF-8 (BOM stripped), or windows-1252 when the
/// bytes are not valid UTF-8.
pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => {
            let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
            Cow::Owned(text.into_owned())
        }
    }
}

// ---------------------------------------------------------------------------
// Reader-based and path-based loaders
// ---------------------------------------------------------------------------

/// Parse CSV text into a dataset. Rows whose width differs from the header
/// are skipped with a warning.
pub fn parse_csv(source: &str, text: &str) -> Result<Dataset, DatasetError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(text.as_bytes());

    let header: Vec<String> = reader
        .headers()
        .map_err(|e| DatasetError::Csv {
            path: source.to_string(),
            source: e,
        })?
        .iter()
        .map(str::to_string)
        .collect();
    if header.iter().all(|h| h.trim().is_empty()) {
        return Err(DatasetError::NoColumns {
            path: source.to_string(),
        });
    }

    let mut rows = Vec::new();
    for result in reader.records() {
        match result {
            Ok(record) => rows.push(record.iter().map(str::to_string).collect()),
            Err(e) => warn!("skipping malformed row in {}: {}", source, e),
        }
    }

    Ok(Dataset::from_rows(source, header, rows))
}

/// Load a dataset from a CSV file on disk.
pub fn load_dataset(path: &Path) -> Result<Dataset, DatasetError> {
    let source = path.display().to_string();
    let bytes = std::fs::read(path).map_err(|e| DatasetError::Unavailable {
        path: source.clone(),
        source: e,
    })?;
    let text = decode_text(&bytes);
    if matches!(text, Cow::Owned(_)) {
        info!("{} is not valid UTF-8; decoded as {}", source, WINDOWS_1252.name());
    }
    let dataset = parse_csv(&source, &text)?;
    info!(
        "Loaded {} rows x {} columns from {}",
        dataset.row_count(),
        dataset.columns().len(),
        source
    );
    Ok(dataset)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
