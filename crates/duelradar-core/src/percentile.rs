// Empirical percentile rank.
//
// Ranks are integers in 0..=100, truncated rather than rounded. A missing
// value ranks at the floor so a radar always has a vertex for it, and a
// population with no usable values ranks everything at 0.

use serde::Deserialize;

/// How ties between the value and population entries are counted.
///
/// With `c` entries strictly below the value, `e` entries equal to it and
/// `n` entries total:
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PercentileKind {
    /// `100 * (c + e) / n`: share of the population at or below the value.
    #[default]
    Weak,
    /// `100 * c / n`: share strictly below the value.
    Strict,
    /// `100 * (c + 0.5 e) / n`: ties count half.
    Mean,
    /// Average rank of the tied block, `50 * (2c + e + [e > 0]) / n`.
    Rank,
}

impl PercentileKind {
    pub fn label(&self) -> &'static str {
        match self {
            PercentileKind::Weak => "weak",
            PercentileKind::Strict => "strict",
            PercentileKind::Mean => "mean",
            PercentileKind::Rank => "rank",
        }
    }
}

/// Percentile rank of `value` within `population` using the default
/// at-or-below convention.
pub fn percentile(value: Option<f64>, population: &[f64]) -> u8 {
    percentile_with(PercentileKind::default(), value, population)
}

/// Percentile rank of `value` within `population` for the given tie
/// convention. NaN entries of `population` are ignored.
pub fn percentile_with(kind: PercentileKind, value: Option<f64>, population: &[f64]) -> u8 {
    let Some(value) = value.filter(|v| !v.is_nan()) else {
        return 0;
    };

    let mut n: u64 = 0;
    let mut below: u64 = 0;
    let mut equal: u64 = 0;
    for &x in population.iter().filter(|x| !x.is_nan()) {
        n += 1;
        if x < value {
            below += 1;
        } else if x == value {
            equal += 1;
        }
    }
    if n == 0 {
        return 0;
    }

    // Integer numerators keep truncation exact (no 59.999... artifacts).
    let rank = match kind {
        PercentileKind::Weak => 100 * (below + equal) / n,
        PercentileKind::Strict => 100 * below / n,
        PercentileKind::Mean => 50 * (2 * below + equal) / n,
        PercentileKind::Rank => 50 * (2 * below + equal + u64::from(equal > 0)) / n,
    };
    rank.min(100) as u8
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const GOALS: [f64; 5] = [2.0, 4.0, 4.0, 6.0, 10.0];

    const ALL_KINDS: [PercentileKind; 4] = [
        PercentileKind::Weak,
        PercentileKind::Strict,
        PercentileKind::Mean,
        PercentileKind::Rank,
    ];

    #[test]
    fn tied_value_at_or_below() {
        // 3 of 5 entries are <= 4.
        assert_eq!(percentile(Some(4.0), &GOALS), 60);
    }

    #[test]
    fn missing_value_ranks_at_floor() {
        assert_eq!(percentile(None, &GOALS), 0);
        assert_eq!(percentile(Some(f64::NAN), &GOALS), 0);
        assert_eq!(percentile(None, &[]), 0);
    }

    #[test]
    fn empty_population_ranks_zero() {
        assert_eq!(percentile(Some(5.0), &[]), 0);
        assert_eq!(percentile(Some(5.0), &[f64::NAN, f64::NAN]), 0);
    }

    #[test]
    fn nan_entries_discarded() {
        let pop = [2.0, f64::NAN, 4.0, 4.0, 6.0, f64::NAN, 10.0];
        assert_eq!(percentile(Some(4.0), &pop), 60);
    }

    #[test]
    fn unique_maximum_is_100() {
        assert_eq!(percentile(Some(10.0), &GOALS), 100);
        for kind in [PercentileKind::Weak, PercentileKind::Rank] {
            assert_eq!(percentile_with(kind, Some(10.0), &GOALS), 100, "{}", kind.label());
        }
    }

    #[test]
    fn below_minimum_is_zero() {
        assert_eq!(percentile(Some(0.0), &GOALS), 0);
        assert_eq!(percentile(Some(-3.5), &GOALS), 0);
    }

    #[test]
    fn above_maximum_is_100() {
        for kind in ALL_KINDS {
            assert_eq!(percentile_with(kind, Some(11.0), &GOALS), 100);
        }
    }

    #[test]
    fn truncates_rather_than_rounds() {
        // 2 of 3 -> 66.67 -> 66
        assert_eq!(percentile(Some(2.0), &[1.0, 2.0, 3.0]), 66);
        // 1 of 3 -> 33.33 -> 33
        assert_eq!(percentile(Some(1.0), &[1.0, 2.0, 3.0]), 33);
        // 5 of 6 -> 83.33 -> 83
        assert_eq!(percentile(Some(5.0), &[0.0, 1.0, 2.0, 3.0, 5.0, 9.0]), 83);
    }

    #[test]
    fn tie_conventions() {
        // c = 1, e = 2, n = 5
        assert_eq!(percentile_with(PercentileKind::Weak, Some(4.0), &GOALS), 60);
        assert_eq!(percentile_with(PercentileKind::Strict, Some(4.0), &GOALS), 20);
        assert_eq!(percentile_with(PercentileKind::Mean, Some(4.0), &GOALS), 40);
        assert_eq!(percentile_with(PercentileKind::Rank, Some(4.0), &GOALS), 50);
        // Value absent from the population: every kind agrees.
        for kind in ALL_KINDS {
            assert_eq!(percentile_with(kind, Some(5.0), &GOALS), 60);
        }
    }

    #[test]
    fn bounds_hold_for_every_kind() {
        let pop: Vec<f64> = (0..37).map(|i| (i % 7) as f64 * 1.5).collect();
        for kind in ALL_KINDS {
            for step in -10..=30 {
                let p = percentile_with(kind, Some(step as f64 * 0.5), &pop);
                assert!(p <= 100);
            }
        }
    }

    #[test]
    fn monotone_in_value() {
        let pop = [3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0, 5.0, 3.0, 5.0];
        for kind in ALL_KINDS {
            let mut last = 0;
            for step in 0..=24 {
                let p = percentile_with(kind, Some(step as f64 * 0.5), &pop);
                assert!(p >= last, "{} not monotone at {}", kind.label(), step);
                last = p;
            }
        }
    }

    #[test]
    fn single_entry_population() {
        assert_eq!(percentile(Some(7.0), &[7.0]), 100);
        assert_eq!(percentile(Some(6.0), &[7.0]), 0);
        assert_eq!(percentile_with(PercentileKind::Mean, Some(7.0), &[7.0]), 50);
    }

    #[test]
    fn kind_parses_from_config_strings() {
        #[derive(Deserialize)]
        struct Wrapper {
            kind: PercentileKind,
        }
        let w: Wrapper = toml::from_str("kind = \"mean\"").unwrap();
        assert_eq!(w.kind, PercentileKind::Mean);
    }
}
