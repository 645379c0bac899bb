use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use tracing::warn;

use duelradar_core::compare::rival_candidates;
use duelradar_core::{ComparisonRequest, Engine, Predicates};

use crate::render;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about = "Compare two players or teams by percentile rank", long_about = None)]
pub struct CommandArgs {
    /// Directory containing config/ (or defaults/); defaults to the current directory
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Mode {
    /// Compare two entities on percentile-ranked metrics
    Compare(CompareArg),
    /// List the metrics eligible for comparison
    Metrics(DatasetArg),
    /// List selectable entities, optionally restricted by filters
    Entities(EntitiesArg),
    /// List the values available for each filter attribute
    Filters(DatasetArg),
    /// Report identifiers shared by more than one record
    Duplicates(DatasetArg),
}

#[derive(Debug, Clone, Args)]
pub struct DatasetArg {
    /// Registered dataset name
    #[arg(short, long, default_value = "players")]
    pub dataset: String,
}

#[derive(Debug, Clone, Args)]
pub struct EntitiesArg {
    #[clap(flatten)]
    pub dataset: DatasetArg,

    /// Population filter, e.g. `Pos=MF,FW` (repeatable)
    #[arg(short, long = "filter", value_name = "ATTR=V1,V2")]
    pub filters: Vec<String>,

    /// Only list entities that could be compared against this one
    #[arg(long, value_name = "NAME")]
    pub rival_of: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct CompareArg {
    /// First entity
    pub entity_a: String,

    /// Second entity
    pub entity_b: String,

    #[clap(flatten)]
    pub dataset: DatasetArg,

    /// Metric to compare (repeatable, order kept); defaults to the first few eligible metrics
    #[arg(short, long = "metric", value_name = "METRIC")]
    pub metrics: Vec<String>,

    /// Population filter, e.g. `Pos=MF,FW` (repeatable)
    #[arg(short, long = "filter", value_name = "ATTR=V1,V2")]
    pub filters: Vec<String>,

    /// Emit JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

pub fn run(engine: &Engine, mode: Mode) -> anyhow::Result<()> {
    match mode {
        Mode::Compare(arg) => compare(engine, &arg),
        Mode::Metrics(arg) => {
            let metrics = engine
                .metrics(&arg.dataset)
                .with_context(|| format!("failed to list metrics for '{}'", arg.dataset))?;
            print!("{}", render::list(&metrics));
            Ok(())
        }
        Mode::Entities(arg) => entities(engine, &arg),
        Mode::Filters(arg) => {
            let options = engine
                .filter_options(&arg.dataset)
                .with_context(|| format!("failed to list filters for '{}'", arg.dataset))?;
            print!("{}", render::filter_options(&options));
            Ok(())
        }
        Mode::Duplicates(arg) => {
            let duplicates = engine
                .duplicates(&arg.dataset)
                .with_context(|| format!("failed to scan '{}'", arg.dataset))?;
            print!("{}", render::duplicates(&duplicates));
            Ok(())
        }
    }
}

/// Build predicates from `Attr=v1,v2` arguments.
pub fn parse_filters(filters: &[String]) -> anyhow::Result<Predicates> {
    let mut predicates = Predicates::new();
    for entry in filters {
        let Some((attribute, values)) = Predicates::parse_entry(entry) else {
            bail!("invalid filter '{entry}': expected ATTR=VALUE[,VALUE...]");
        };
        predicates.insert(attribute, values);
    }
    Ok(predicates)
}

fn compare(engine: &Engine, arg: &CompareArg) -> anyhow::Result<()> {
    let request = ComparisonRequest {
        dataset: arg.dataset.dataset.clone(),
        entity_a: arg.entity_a.clone(),
        entity_b: arg.entity_b.clone(),
        metrics: arg.metrics.clone(),
        predicates: parse_filters(&arg.filters)?,
    };
    if request.entity_a == request.entity_b {
        warn!("comparing '{}' with itself", request.entity_a);
    }

    let report = engine.compare(&request).with_context(|| {
        format!(
            "cannot compare '{}' and '{}' in '{}'",
            request.entity_a, request.entity_b, request.dataset
        )
    })?;

    if arg.json {
        println!("{}", serde_json::to_string_pretty(&render::json_report(&report))?);
    } else {
        print!("{}", render::report(&report));
    }
    Ok(())
}

fn entities(engine: &Engine, arg: &EntitiesArg) -> anyhow::Result<()> {
    let predicates = parse_filters(&arg.filters)?;
    let mut candidates = engine
        .candidates(&arg.dataset.dataset, &predicates)
        .with_context(|| format!("failed to list entities for '{}'", arg.dataset.dataset))?;
    if let Some(first) = &arg.rival_of {
        candidates = rival_candidates(&candidates, first);
        if candidates.is_empty() {
            bail!("no other entity to compare '{first}' against under these filters");
        }
    }
    print!("{}", render::list(&candidates));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_parse_into_predicates() {
        let preds = parse_filters(&["Pos=MF,FW".to_string(), "Comp=La Liga".to_string()]).unwrap();
        let expected = Predicates::new()
            .with("Pos", ["MF", "FW"])
            .with("Comp", ["La Liga"]);
        assert_eq!(preds, expected);
    }

    #[test]
    fn repeated_attribute_merges_values() {
        let preds = parse_filters(&["Pos=MF".to_string(), "Pos=FW".to_string()]).unwrap();
        assert_eq!(preds, Predicates::new().with("Pos", ["FW", "MF"]));
    }

    #[test]
    fn malformed_filter_rejected() {
        let err = parse_filters(&["PosMF".to_string()]).unwrap_err();
        assert!(err.to_string().contains("invalid filter 'PosMF'"));
    }

    #[test]
    fn compare_args_parse() {
        let args = CommandArgs::try_parse_from([
            "duelradar", "compare", "Pedri", "Rodri", "-m", "Gls", "-m", "Ast", "-m", "xG", "-f",
            "Pos=MF", "--json",
        ])
        .unwrap();
        let Mode::Compare(arg) = args.mode else {
            panic!("expected compare mode");
        };
        assert_eq!(arg.entity_a, "Pedri");
        assert_eq!(arg.entity_b, "Rodri");
        assert_eq!(arg.metrics, vec!["Gls", "Ast", "xG"]);
        assert_eq!(arg.filters, vec!["Pos=MF"]);
        assert_eq!(arg.dataset.dataset, "players");
        assert!(arg.json);
    }

    #[test]
    fn global_config_flag() {
        let args =
            CommandArgs::try_parse_from(["duelradar", "metrics", "--dataset", "teams", "--config", "/tmp/x"])
                .unwrap();
        assert_eq!(args.config, Some(PathBuf::from("/tmp/x")));
        let Mode::Metrics(arg) = args.mode else {
            panic!("expected metrics mode");
        };
        assert_eq!(arg.dataset, "teams");
    }
}
