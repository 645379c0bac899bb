// Metric catalog: which columns can be compared.
//
// Eligible metrics are the numeric columns minus a denylist of
// administrative counters (rank, age, appearances, minutes...). Denylists
// are configuration keyed by dataset shape so a new export layout only needs
// a config change.

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;

use crate::dataset::Dataset;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("no comparable numeric metrics in {dataset}")]
    Empty { dataset: String },
}

// ---------------------------------------------------------------------------
// Denylist
// ---------------------------------------------------------------------------

const PLAYER_DENYLIST: &[&str] = &["Rk", "Age", "Born", "Matches", "Starts", "Mins", "90s", "MP", "Min"];

const TEAM_DENYLIST: &[&str] = &[
    "Rk", "# Pl", "Age", "Matches", "Starts", "Mins", "90s", "MP", "Min", "Pts", "Pts/MP",
];

/// Column names excluded from the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Denylist(BTreeSet<String>);

impl Denylist {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Denylist(names.into_iter().map(Into::into).collect())
    }

    pub fn players() -> Self {
        Self::new(PLAYER_DENYLIST.iter().copied())
    }

    pub fn teams() -> Self {
        Self::new(TEAM_DENYLIST.iter().copied())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Denylists keyed by dataset shape ("players", "teams", ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenylistTable {
    shapes: BTreeMap<String, Denylist>,
}

impl Default for DenylistTable {
    fn default() -> Self {
        let mut shapes = BTreeMap::new();
        shapes.insert("players".to_string(), Denylist::players());
        shapes.insert("teams".to_string(), Denylist::teams());
        DenylistTable { shapes }
    }
}

impl DenylistTable {
    /// Replace the denylist for `shape`.
    pub fn set(&mut self, shape: impl Into<String>, denylist: Denylist) {
        self.shapes.insert(shape.into(), denylist);
    }

    /// Denylist for `shape`; unknown shapes fall back to the player list.
    pub fn get(&self, shape: &str) -> Denylist {
        self.shapes
            .get(shape)
            .cloned()
            .unwrap_or_else(Denylist::players)
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Numeric columns not on the denylist, in the dataset's column order.
pub fn eligible_metrics(dataset: &Dataset, denylist: &Denylist) -> Result<Vec<String>, CatalogError> {
    let metrics: Vec<String> = dataset
        .columns()
        .iter()
        .filter(|c| dataset.is_numeric(&c.name) && !denylist.contains(&c.name))
        .map(|c| c.name.clone())
        .collect();

    if metrics.is_empty() {
        return Err(CatalogError::Empty {
            dataset: dataset.source().to_string(),
        });
    }
    Ok(metrics)
}

/// Initial metric selection: the first `count` metrics, or all of them when
/// the catalog is smaller.
pub fn default_metrics(catalog: &[String], count: usize) -> Vec<String> {
    catalog.iter().take(count).cloned().collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::parse_csv;

    fn fbref_like() -> Dataset {
        let csv_data = "\
Rk,Player,Nation,Pos,Squad,Comp,Age,Born,MP,Starts,Min,90s,Gls,Ast,xG,npxG,PrgC
1,Pedri,ESP,MF,Barcelona,La Liga,22,2002,10,9,800,8.9,2,4,1.8,1.8,30";
        parse_csv("players.csv", csv_data).unwrap()
    }

    #[test]
    fn excludes_text_and_denylisted_columns() {
        let ds = fbref_like();
        let metrics = eligible_metrics(&ds, &Denylist::players()).unwrap();
        assert_eq!(metrics, vec!["Gls", "Ast", "xG", "npxG", "PrgC"]);
    }

    #[test]
    fn ordering_is_stable() {
        let ds = fbref_like();
        let first = eligible_metrics(&ds, &Denylist::players()).unwrap();
        let second = eligible_metrics(&ds, &Denylist::players()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn custom_denylist_applies() {
        let ds = fbref_like();
        let metrics = eligible_metrics(&ds, &Denylist::new(["Gls", "xG"])).unwrap();
        assert_eq!(
            metrics,
            vec!["Rk", "Age", "Born", "MP", "Starts", "Min", "90s", "Ast", "npxG", "PrgC"]
        );
    }

    #[test]
    fn empty_catalog_is_an_error() {
        let csv_data = "\
Rk,Player,Age
1,Pedri,22";
        let ds = parse_csv("thin.csv", csv_data).unwrap();
        let err = eligible_metrics(&ds, &Denylist::players()).unwrap_err();
        match err {
            CatalogError::Empty { dataset } => assert_eq!(dataset, "thin.csv"),
        }
    }

    #[test]
    fn table_defaults_and_overrides() {
        let mut table = DenylistTable::default();
        assert!(table.get("teams").contains("Pts"));
        assert!(!table.get("players").contains("Pts"));
        assert_eq!(table.get("keepers"), Denylist::players());

        table.set("teams", Denylist::new(["Rk"]));
        assert_eq!(table.get("teams").len(), 1);
    }

    #[test]
    fn default_metrics_takes_prefix() {
        let catalog: Vec<String> = (1..=8).map(|i| format!("m{i}")).collect();
        assert_eq!(default_metrics(&catalog, 6), catalog[..6].to_vec());
        assert_eq!(default_metrics(&catalog[..4], 6), catalog[..4].to_vec());
    }
}
