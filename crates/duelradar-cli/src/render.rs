// Plain-text and JSON rendering of comparison results.

use std::fmt::Write as _;

use serde_json::json;

use duelradar_core::{ComparisonReport, FilterOptions, RawTable};

/// Render an optional raw value: integers without decimals, others with up
/// to two, missing as `-`.
pub fn format_value(value: Option<f64>) -> String {
    let Some(v) = value else {
        return "-".to_string();
    };
    if v.fract() == 0.0 && v.abs() < 1e15 {
        return format!("{v:.0}");
    }
    let s = format!("{v:.2}");
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn format_delta(value: Option<f64>) -> String {
    match value {
        Some(v) if v > 0.0 => format!("+{}", format_value(Some(v))),
        other => format_value(other),
    }
}

/// One name per line.
pub fn list(items: &[String]) -> String {
    items.iter().map(|i| format!("{i}\n")).collect()
}

pub fn filter_options(options: &[FilterOptions]) -> String {
    let mut out = String::new();
    for option in options {
        let _ = write!(out, "{}: {}", option.attribute, option.values.join(", "));
        if !option.default.is_empty() {
            let _ = write!(out, " (default: {})", option.default.join(", "));
        }
        let _ = writeln!(out);
    }
    out
}

pub fn duplicates(duplicates: &[(String, usize)]) -> String {
    if duplicates.is_empty() {
        return "no duplicate identifiers\n".to_string();
    }
    let mut out = String::new();
    for (id, count) in duplicates {
        let _ = writeln!(out, "{id} ({count} records)");
    }
    out
}

/// Side-by-side comparison table followed by the exact raw figures of every
/// matching record.
pub fn report(report: &ComparisonReport) -> String {
    let c = &report.comparison;
    let mut out = String::new();

    let _ = writeln!(out, "{} vs {}", c.entity_a, c.entity_b);
    let _ = writeln!(
        out,
        "percentiles ({}) against {} records",
        c.kind, c.population_size
    );
    let _ = writeln!(out);

    let metric_width = c
        .metrics
        .iter()
        .map(|m| m.metric.chars().count())
        .chain(std::iter::once("Metric".len()))
        .max()
        .unwrap_or(6);
    let a_width = c.entity_a.chars().count().max(8);
    let b_width = c.entity_b.chars().count().max(8);

    let _ = writeln!(
        out,
        "{:<metric_width$}  {:>a_width$}  {:>4}  {:>b_width$}  {:>4}  {:>8}",
        "Metric", c.entity_a, "pct", c.entity_b, "pct", "delta"
    );
    for m in &c.metrics {
        let _ = writeln!(
            out,
            "{:<metric_width$}  {:>a_width$}  {:>4}  {:>b_width$}  {:>4}  {:>8}",
            m.metric,
            format_value(m.raw_a),
            m.percentile_a,
            format_value(m.raw_b),
            m.percentile_b,
            format_delta(m.delta)
        );
    }

    let _ = writeln!(out);
    if !report.ambiguous.is_empty() {
        let _ = writeln!(
            out,
            "note: {} matched several records; the first was compared",
            report.ambiguous.join(", ")
        );
    }
    out.push_str(&raw_table(&report.table));
    out
}

/// Every matching record's raw values, one column per record.
pub fn raw_table(table: &RawTable) -> String {
    let mut out = String::new();
    let metric_width = table
        .rows
        .iter()
        .map(|r| r.metric.chars().count())
        .max()
        .unwrap_or(0)
        .max("Metric".len());
    let widths: Vec<usize> = table
        .entities
        .iter()
        .map(|e| e.chars().count().max(8))
        .collect();

    let _ = write!(out, "{:<metric_width$}", "Metric");
    for (entity, &width) in table.entities.iter().zip(&widths) {
        let _ = write!(out, "  {entity:>width$}");
    }
    let _ = writeln!(out);
    for row in &table.rows {
        let _ = write!(out, "{:<metric_width$}", row.metric);
        for (value, &width) in row.values.iter().zip(&widths) {
            let _ = write!(out, "  {:>width$}", format_value(*value));
        }
        let _ = writeln!(out);
    }
    out
}

/// JSON document for chart renderers: the open comparison, the closed-loop
/// series and the raw table.
pub fn json_report(report: &ComparisonReport) -> serde_json::Value {
    json!({
        "comparison": report.comparison,
        "cyclic": report.comparison.cyclic(),
        "table": report.table,
        "ambiguous": report.ambiguous,
    })
}
