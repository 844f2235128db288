//! Fisher-Jenks natural breaks.
//!
//! Exact optimal partition of sorted values into K contiguous classes,
//! minimising the total within-class sum of squared deviations. The dynamic
//! programme runs over distinct values weighted by their multiplicity, which
//! gives the same optimum as running over the full data. Class cost obeys the
//! quadrangle inequality, so the best split point is monotone in the class
//! end and each row is filled by divide and conquer: O(K·m·log m) for m
//! distinct values, which keeps continuous grids of several hundred thousand
//! cells tractable.

use crate::error::{Error, Result};

/// Partition costs closer than this fraction of the total SSD are ties.
const TIE_TOLERANCE: f64 = 1e-10;

/// Distinct values in ascending order with their multiplicities.
fn distinct_weighted(values: &[f64]) -> Result<(Vec<f64>, Vec<f64>)> {
    if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
        return Err(Error::invalid("values", bad, "natural breaks need finite values"));
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mut distinct: Vec<f64> = Vec::new();
    let mut counts: Vec<f64> = Vec::new();
    for v in sorted {
        match distinct.last() {
            Some(&last) if last == v => {
                if let Some(c) = counts.last_mut() {
                    *c += 1.0;
                }
            }
            _ => {
                distinct.push(v);
                counts.push(1.0);
            }
        }
    }
    Ok((distinct, counts))
}

/// Weighted prefix sums for O(1) class cost queries.
struct PrefixSums {
    w: Vec<f64>,
    wx: Vec<f64>,
    wxx: Vec<f64>,
}

impl PrefixSums {
    /// Values are shifted by the first one to limit cancellation.
    fn new(values: &[f64], weights: &[f64]) -> Self {
        let shift = values.first().copied().unwrap_or(0.0);
        let n = values.len();
        let mut s = Self {
            w: vec![0.0; n + 1],
            wx: vec![0.0; n + 1],
            wxx: vec![0.0; n + 1],
        };
        for i in 0..n {
            let x = values[i] - shift;
            s.w[i + 1] = s.w[i] + weights[i];
            s.wx[i + 1] = s.wx[i] + weights[i] * x;
            s.wxx[i + 1] = s.wxx[i] + weights[i] * x * x;
        }
        s
    }

    /// Sum of squared deviations of values `lo..hi` from their mean.
    fn ssd(&self, lo: usize, hi: usize) -> f64 {
        let w = self.w[hi] - self.w[lo];
        if w <= 0.0 {
            return 0.0;
        }
        let wx = self.wx[hi] - self.wx[lo];
        let wxx = self.wxx[hi] - self.wxx[lo];
        (wxx - wx * wx / w).max(0.0)
    }
}

/// One DP row: the best cost of covering `0..j` with one more class than
/// `prev`, for every `j`.
struct Row<'a> {
    prev: &'a [f64],
    next: Vec<f64>,
    split: &'a mut [usize],
    sums: &'a PrefixSums,
    tolerance: f64,
}

impl Row<'_> {
    /// Fill `next[j_lo..=j_hi]` knowing their split points lie in
    /// `i_lo..=i_hi`.
    fn fill(&mut self, j_lo: usize, j_hi: usize, i_lo: usize, i_hi: usize) {
        if j_lo > j_hi {
            return;
        }
        let j = j_lo + (j_hi - j_lo) / 2;
        let mut best = f64::INFINITY;
        let mut arg = i_lo;
        for i in i_lo..=i_hi.min(j - 1) {
            let candidate = self.prev[i] + self.sums.ssd(i, j);
            if candidate < best - self.tolerance {
                best = candidate;
                arg = i;
            } else if candidate <= best + self.tolerance {
                // Tie: the later split keeps more values in the lower class.
                best = best.min(candidate);
                arg = i;
            }
        }
        self.next[j] = best;
        self.split[j] = arg;
        if j > j_lo {
            self.fill(j_lo, j - 1, i_lo, arg);
        }
        self.fill(j + 1, j_hi, arg, i_hi);
    }
}

/// Natural breakpoints splitting `values` into `classes` classes.
///
/// Each breakpoint is the smallest value of its upper class, so
/// `classes − 1` breakpoints are returned. With `classes` or fewer distinct
/// values, every distinct value but the smallest is a breakpoint and each
/// class holds exactly one value. Among equally good partitions the one
/// keeping more values in the lower class wins. Empty input has no
/// breakpoints; `classes == 0` and non-finite values are rejected.
pub fn natural_breaks(values: &[f64], classes: usize) -> Result<Vec<f64>> {
    if classes == 0 {
        return Err(Error::invalid("classes", classes, "need at least one class"));
    }
    let (distinct, weights) = distinct_weighted(values)?;
    let m = distinct.len();
    if m <= classes {
        return Ok(distinct.into_iter().skip(1).collect());
    }

    let sums = PrefixSums::new(&distinct, &weights);
    let tolerance = TIE_TOLERANCE * sums.ssd(0, m);

    // cost[j]: best total SSD for the first j values in the current number
    // of classes; split[c][j]: start index of the last class in that optimum.
    let mut cost: Vec<f64> = (0..=m).map(|j| sums.ssd(0, j)).collect();
    let mut split = vec![vec![0usize; m + 1]; classes];

    for c in 1..classes {
        let mut row = Row {
            prev: &cost,
            next: vec![f64::INFINITY; m + 1],
            split: &mut split[c],
            sums: &sums,
            tolerance,
        };
        row.fill(c + 1, m, c, m - 1);
        let next = row.next;
        cost = next;
    }

    let mut breaks = vec![0.0; classes - 1];
    let mut end = m;
    for c in (1..classes).rev() {
        let start = split[c][end];
        breaks[c - 1] = distinct[start];
        end = start;
    }
    Ok(breaks)
}

/// Total within-class sum of squared deviations of `values` partitioned at
/// `breaks` (each breakpoint opens a new class).
pub fn within_class_ssd(values: &[f64], breaks: &[f64]) -> f64 {
    let mut groups: Vec<Vec<f64>> = vec![Vec::new(); breaks.len() + 1];
    for &v in values {
        let class = breaks.partition_point(|&b| b <= v);
        groups[class].push(v);
    }
    groups
        .iter()
        .filter(|g| !g.is_empty())
        .map(|g| {
            let mean = g.iter().sum::<f64>() / g.len() as f64;
            g.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
        })
        .sum()
}

/// Goodness of variance fit: 1 − within-class SSD / total SSD.
/// 1.0 for a perfect fit, and for data without variance.
pub fn goodness_of_fit(values: &[f64], breaks: &[f64]) -> f64 {
    let total = within_class_ssd(values, &[]);
    if total <= 0.0 {
        return 1.0;
    }
    1.0 - within_class_ssd(values, breaks) / total
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn separates_obvious_clusters() {
        let v = [1.0, 2.0, 1.5, 10.0, 11.0, 10.5, 30.0, 31.0];
        assert_eq!(natural_breaks(&v, 3).unwrap(), vec![10.0, 30.0]);
    }

    #[test]
    fn isolated_count_gets_own_class() {
        // Counts of a 2×2 grid: 5 points in one cell, 1 in another.
        let v = [5.0, 0.0, 0.0, 1.0];
        assert_eq!(natural_breaks(&v, 2).unwrap(), vec![5.0]);
    }

    #[test]
    fn few_distinct_values_break_at_each_value() {
        let v = [3.0, 1.0, 3.0, 7.0, 1.0];
        assert_eq!(natural_breaks(&v, 3).unwrap(), vec![3.0, 7.0]);
        assert_eq!(natural_breaks(&v, 5).unwrap(), vec![3.0, 7.0]);
        assert_eq!(natural_breaks(&[4.0, 4.0], 2).unwrap(), Vec::<f64>::new());
    }

    #[test]
    fn single_class_has_no_breaks() {
        assert!(natural_breaks(&[1.0, 5.0, 9.0], 1).unwrap().is_empty());
        assert!(natural_breaks(&[], 4).unwrap().is_empty());
    }

    #[test]
    fn ties_keep_more_values_low() {
        // {0} | {1, 2} and {0, 1} | {2} both cost 0.5.
        assert_eq!(natural_breaks(&[0.0, 1.0, 2.0], 2).unwrap(), vec![2.0]);
        // Equal costs that differ only by rounding are still ties.
        assert_eq!(natural_breaks(&[0.1, 0.2, 0.3], 2).unwrap(), vec![0.3]);
        assert_eq!(natural_breaks(&[1.1, 2.2, 3.3], 2).unwrap(), vec![3.3]);
        assert_eq!(natural_breaks(&[0.7, 1.4, 2.1], 2).unwrap(), vec![2.1]);
        assert_eq!(natural_breaks(&[2.1, 0.7, 1.4], 2).unwrap(), vec![2.1]);
    }

    #[test]
    fn large_continuous_input_stays_optimal() {
        // 200 000 distinct values in three well separated bands.
        let values: Vec<f64> = (0..200_000)
            .map(|i| {
                let band = (i % 3) as f64 * 1000.0;
                band + (i / 3) as f64 * 1e-3
            })
            .collect();
        let breaks = natural_breaks(&values, 3).unwrap();
        assert_eq!(breaks, vec![1000.0, 2000.0]);
    }

    #[test]
    fn invalid_input_rejected() {
        assert!(natural_breaks(&[1.0, 2.0], 0).is_err());
        assert!(natural_breaks(&[1.0, f64::NAN], 2).is_err());
    }

    #[test]
    fn result_is_order_independent() {
        let a = [9.0, 2.0, 4.0, 4.0, 15.0, 1.0, 8.0, 22.0];
        let mut b = a;
        b.reverse();
        assert_eq!(natural_breaks(&a, 3).unwrap(), natural_breaks(&b, 3).unwrap());
    }

    /// Minimum SSD over every choice of `k − 1` breakpoints among the
    /// distinct values.
    fn brute_force_ssd(values: &[f64], k: usize) -> f64 {
        let mut distinct = values.to_vec();
        distinct.sort_by(f64::total_cmp);
        distinct.dedup();
        let candidates = &distinct[1..];
        let mut best = f64::INFINITY;
        let mut chosen = Vec::with_capacity(k - 1);
        fn walk(cands: &[f64], need: usize, start: usize, chosen: &mut Vec<f64>, values: &[f64], best: &mut f64) {
            if chosen.len() == need {
                *best = best.min(within_class_ssd(values, chosen));
                return;
            }
            for i in start..cands.len() {
                chosen.push(cands[i]);
                walk(cands, need, i + 1, chosen, values, best);
                chosen.pop();
            }
        }
        walk(candidates, k - 1, 0, &mut chosen, values, &mut best);
        best
    }

    #[test]
    fn matches_brute_force_on_small_inputs() {
        let mut state: u64 = 0xC0FFEE;
        let mut next = || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (state >> 33) as u32
        };
        for _ in 0..60 {
            let n = 4 + (next() % 7) as usize;
            let values: Vec<f64> = (0..n).map(|_| (next() % 20) as f64).collect();
            let distinct = {
                let mut d = values.clone();
                d.sort_by(f64::total_cmp);
                d.dedup();
                d.len()
            };
            for k in 2..=4 {
                if distinct <= k {
                    continue;
                }
                let breaks = natural_breaks(&values, k).unwrap();
                assert_eq!(breaks.len(), k - 1);
                assert!(breaks.windows(2).all(|w| w[0] < w[1]));
                let got = within_class_ssd(&values, &breaks);
                let want = brute_force_ssd(&values, k);
                assert_relative_eq!(got, want, epsilon = 1e-9, max_relative = 1e-9);
            }
        }
    }

    #[test]
    fn goodness_of_fit_bounds() {
        let v = [1.0, 2.0, 10.0, 11.0];
        let breaks = natural_breaks(&v, 2).unwrap();
        assert_eq!(breaks, vec![10.0]);
        assert_relative_eq!(goodness_of_fit(&v, &breaks), 1.0 - 1.0 / 82.0, epsilon = 1e-12);
        assert_relative_eq!(goodness_of_fit(&[3.0, 3.0], &[]), 1.0);
    }
}
