//! Class reclassification: integer class codes → estimates or weights via an
//! explicit lookup table, plus interval classification of continuous grids.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

use crate::classes::ClassBreakTable;
use crate::error::{Error, Result};
use crate::grid::Grid;
use crate::loader::AttributeGrids;
use crate::par::*;

/// Widest code range a single rule entry may expand to.
const MAX_RANGE_SPAN: i64 = 1_000_000;

/// Inclusive code range sharing one replacement value; the serialised form
/// of a [`ReclassRule`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RuleRange<V> {
    pub from: i64,
    pub to: i64,
    pub value: V,
}

/// Mapping from class code to replacement value.
///
/// `V = f64` for headcount estimates and suitability weights, `V = i64` for
/// code-to-code recoding.
#[derive(Debug, Clone, PartialEq)]
pub struct ReclassRule<V> {
    table: BTreeMap<i64, V>,
}

impl<V: Copy + PartialEq> ReclassRule<V> {
    pub fn from_pairs(pairs: impl IntoIterator<Item = (i64, V)>) -> Self {
        Self {
            table: pairs.into_iter().collect(),
        }
    }

    /// Build from inclusive ranges. Ranges may not overlap.
    pub fn from_ranges(ranges: impl IntoIterator<Item = RuleRange<V>>) -> Result<Self> {
        let mut table = BTreeMap::new();
        for r in ranges {
            if r.from > r.to {
                return Err(Error::invalid("rule", format!("{}..={}", r.from, r.to), "empty code range"));
            }
            if i128::from(r.to) - i128::from(r.from) >= i128::from(MAX_RANGE_SPAN) {
                return Err(Error::invalid("rule", format!("{}..={}", r.from, r.to), "code range too wide"));
            }
            for code in r.from..=r.to {
                if table.insert(code, r.value).is_some() {
                    return Err(Error::invalid("rule", code, "code covered by more than one range"));
                }
            }
        }
        Ok(Self { table })
    }

    pub fn get(&self, code: i64) -> Option<V> {
        self.table.get(&code).copied()
    }

    pub fn codes(&self) -> impl Iterator<Item = i64> + '_ {
        self.table.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Collapse consecutive codes with equal values back into ranges.
    pub fn ranges(&self) -> Vec<RuleRange<V>> {
        let mut out: Vec<RuleRange<V>> = Vec::new();
        for (&code, &value) in &self.table {
            match out.last_mut() {
                Some(last) if last.to + 1 == code && last.value == value => last.to = code,
                _ => out.push(RuleRange {
                    from: code,
                    to: code,
                    value,
                }),
            }
        }
        out
    }
}

impl ReclassRule<i64> {
    /// The inverse recoding, if no two codes map to the same value.
    pub fn inverse(&self) -> Option<Self> {
        let mut inv = BTreeMap::new();
        for (&code, &value) in &self.table {
            if inv.insert(value, code).is_some() {
                return None;
            }
        }
        Some(Self { table: inv })
    }
}

impl<V: Serialize + Copy + PartialEq> Serialize for ReclassRule<V> {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.ranges().serialize(s)
    }
}

impl<'de, V: Deserialize<'de> + Copy + PartialEq> Deserialize<'de> for ReclassRule<V> {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let ranges = Vec::<RuleRange<V>>::deserialize(d)?;
        Self::from_ranges(ranges).map_err(serde::de::Error::custom)
    }
}

// ── Grid operations ──────────────────────────────────────────────────────────

/// Replace every present code with `rule[code]`; missing stays missing.
///
/// Fails with [`Error::UnmappedClass`] at the first (row-major) present cell
/// whose code has no rule entry.
pub fn reclassify<V: Copy + PartialEq>(grid: &Grid<i64>, rule: &ReclassRule<V>) -> Result<Grid<V>> {
    let mut cells = Vec::with_capacity(grid.cells().len());
    for (row, col, code) in grid.iter() {
        let value = match code {
            None => None,
            Some(code) => Some(rule.get(code).ok_or(Error::UnmappedClass { code, row, col })?),
        };
        cells.push(value);
    }
    Ok(Grid::from_parts(*grid.geometry(), cells))
}

/// Reclassify several attributes at once, one rule per named column.
/// Attributes are independent, so with `threading` they run in parallel.
pub fn reclassify_all<V>(grids: &AttributeGrids, rules: &[(&str, &ReclassRule<V>)]) -> Result<Vec<(String, Grid<V>)>>
where
    V: Copy + PartialEq + Send + Sync,
{
    rules
        .into_par_iter()
        .map(|(name, rule)| {
            let grid = grids
                .get(name)
                .ok_or_else(|| Error::invalid("column", name, "not present in census table"))?;
            let out = reclassify(grid, rule)?;
            debug!(attribute = %name, present = out.present_count(), "reclassified");
            Ok((name.to_string(), out))
        })
        .collect()
}

/// Interval classification of a continuous grid. Values outside the table
/// become missing.
pub fn classify(grid: &Grid<f64>, table: &ClassBreakTable) -> Grid<i64> {
    let cols = grid.cols();
    let cells: Vec<Option<i64>> = (0..grid.rows())
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| grid.get(row, col).and_then(|v| table.classify(v)))
                .collect::<Vec<_>>()
        })
        .collect();
    Grid::from_parts(*grid.geometry(), cells)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoaderConfig;
    use crate::geometry::GridGeometry;
    use crate::loader::{load_grids, CensusTable};

    fn geom(rows: usize, cols: usize) -> GridGeometry {
        GridGeometry::square(0.0, 0.0, 100.0, rows, cols).unwrap()
    }

    fn pop_rule() -> ReclassRule<f64> {
        ReclassRule::from_pairs([(1, 127.0), (2, 375.0), (3, 1250.0), (4, 3000.0), (5, 6000.0), (6, 8000.0)])
    }

    #[test]
    fn replaces_codes_and_keeps_missing() {
        let g = Grid::from_rows(geom(2, 2), vec![vec![Some(1), None], vec![Some(6), Some(3)]]).unwrap();
        let out = reclassify(&g, &pop_rule()).unwrap();
        assert_eq!(
            out.to_rows(),
            vec![vec![Some(127.0), None], vec![Some(8000.0), Some(1250.0)]]
        );
    }

    #[test]
    fn unmapped_code_names_code_and_cell() {
        let g = Grid::from_rows(geom(2, 2), vec![vec![Some(1), Some(2)], vec![Some(9), Some(7)]]).unwrap();
        match reclassify(&g, &pop_rule()) {
            Err(Error::UnmappedClass { code, row, col }) => assert_eq!((code, row, col), (9, 1, 0)),
            other => panic!("expected UnmappedClass, got {other:?}"),
        }
    }

    #[test]
    fn bijective_rule_round_trips() {
        // LCG-generated class grid over codes 1..=5, some cells missing.
        let mut state: u64 = 0x5eed;
        let mut next = || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (state >> 33) as i64
        };
        let cells: Vec<Option<i64>> = (0..64)
            .map(|_| {
                let v = next();
                if v % 7 == 0 { None } else { Some(v % 5 + 1) }
            })
            .collect();
        let g = Grid::from_cells(geom(8, 8), cells).unwrap();

        let rule = ReclassRule::<i64>::from_pairs([(1, 30), (2, 10), (3, 50), (4, 20), (5, 40)]);
        let inverse = rule.inverse().expect("rule is injective");
        let there = reclassify(&g, &rule).unwrap();
        let back = reclassify(&there, &inverse).unwrap();
        assert_eq!(back, g);
    }

    #[test]
    fn non_injective_rule_has_no_inverse() {
        let rule = ReclassRule::<i64>::from_pairs([(1, 0), (2, 0)]);
        assert!(rule.inverse().is_none());
    }

    #[test]
    fn ranges_round_trip_through_json() {
        let json = r#"[{"from":1,"to":1,"value":3.0},{"from":2,"to":2,"value":2.0},
                       {"from":3,"to":3,"value":1.0},{"from":4,"to":5,"value":0.0}]"#;
        let rule: ReclassRule<f64> = serde_json::from_str(json).unwrap();
        assert_eq!(rule.len(), 5);
        assert_eq!(rule.get(5), Some(0.0));
        let ranges = rule.ranges();
        assert_eq!(ranges.len(), 4);
        assert_eq!(ranges[3], RuleRange { from: 4, to: 5, value: 0.0 });
    }

    #[test]
    fn overlapping_ranges_rejected() {
        let json = r#"[{"from":1,"to":3,"value":1.0},{"from":3,"to":4,"value":0.0}]"#;
        assert!(serde_json::from_str::<ReclassRule<f64>>(json).is_err());
        let reversed = [RuleRange { from: 5, to: 2, value: 1.0 }];
        assert!(ReclassRule::from_ranges(reversed).is_err());
    }

    #[test]
    fn range_spanning_all_codes_rejected() {
        let json = r#"[{"from":-9223372036854775808,"to":9223372036854775807,"value":1.0}]"#;
        assert!(serde_json::from_str::<ReclassRule<f64>>(json).is_err());
        let wide = [RuleRange { from: i64::MIN, to: 0, value: 1 }];
        assert!(matches!(
            ReclassRule::<i64>::from_ranges(wide),
            Err(Error::InvalidParameter { name: "rule", .. })
        ));
        let top = [RuleRange { from: i64::MAX - 1, to: i64::MAX, value: 2.0 }];
        assert_eq!(ReclassRule::from_ranges(top).unwrap().get(i64::MAX), Some(2.0));
    }

    #[test]
    fn reclassify_all_uses_named_columns() {
        let mut t = CensusTable::new(["pop", "age"]);
        t.push(0.0, 0.0, vec![Some(1), Some(1)]);
        t.push(100.0, 0.0, vec![Some(2), Some(3)]);
        let grids = load_grids(&t, &LoaderConfig::default()).unwrap();
        let age = ReclassRule::from_ranges([
            RuleRange { from: 1, to: 1, value: 3.0 },
            RuleRange { from: 2, to: 5, value: 0.0 },
        ])
        .unwrap();
        let pop = pop_rule();
        let out = reclassify_all(&grids, &[("pop", &pop), ("age", &age)]).unwrap();
        assert_eq!(out[0].0, "pop");
        assert_eq!(out[0].1.to_rows(), vec![vec![Some(127.0), Some(375.0)]]);
        assert_eq!(out[1].1.to_rows(), vec![vec![Some(3.0), Some(0.0)]]);

        let missing = reclassify_all(&grids, &[("income", &age)]);
        assert!(matches!(missing, Err(Error::InvalidParameter { .. })));
    }

    #[test]
    fn classify_uses_break_table() {
        let table = ClassBreakTable::from_breaks(0.0, &[2.0, 5.0], 10.0).unwrap();
        let g = Grid::from_rows(geom(1, 5), vec![vec![Some(0.0), Some(2.0), None, Some(10.0), Some(11.0)]]).unwrap();
        let codes = classify(&g, &table);
        assert_eq!(codes.to_rows(), vec![vec![Some(0), Some(1), None, Some(2), None]]);
    }
}
