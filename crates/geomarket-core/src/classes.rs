//! Class break tables: contiguous numeric intervals mapped to class codes.
//!
//! Intervals are closed on the lower bound and open on the upper bound,
//! except the top interval, which is closed when `closed_top` is set. A value
//! exactly on a breakpoint therefore belongs to the upper class.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};
use crate::reclass::ReclassRule;

/// One class: `[lower, upper)` (or `[lower, upper]` for a closed top class).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassInterval {
    pub lower: f64,
    pub upper: f64,
    pub code: i64,
    pub label: String,
}

#[derive(Deserialize)]
struct RawTable {
    intervals: Vec<ClassInterval>,
    #[serde(default = "default_closed_top")]
    closed_top: bool,
}

fn default_closed_top() -> bool {
    true
}

/// Ordered partition of a numeric range into labelled classes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassBreakTable {
    intervals: Vec<ClassInterval>,
    closed_top: bool,
}

impl<'de> Deserialize<'de> for ClassBreakTable {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let raw = RawTable::deserialize(d)?;
        Self::new(raw.intervals, raw.closed_top).map_err(serde::de::Error::custom)
    }
}

impl ClassBreakTable {
    /// Validate and build a table.
    ///
    /// Intervals must be finite, increasing and contiguous (each upper bound
    /// equals the next lower bound) with distinct codes. Only a closed top
    /// interval may be a single value (`lower == upper`).
    pub fn new(intervals: Vec<ClassInterval>, closed_top: bool) -> Result<Self> {
        let n = intervals.len();
        for (i, iv) in intervals.iter().enumerate() {
            if !iv.lower.is_finite() || !iv.upper.is_finite() {
                return Err(Error::invalid("interval", &iv.label, "bounds must be finite"));
            }
            let degenerate_ok = closed_top && i + 1 == n;
            if iv.lower > iv.upper || (iv.lower == iv.upper && !degenerate_ok) {
                return Err(Error::invalid(
                    "interval",
                    format!("[{}, {}]", iv.lower, iv.upper),
                    "lower bound must be below upper bound",
                ));
            }
            if intervals[..i].iter().any(|prev| prev.code == iv.code) {
                return Err(Error::invalid("code", iv.code, "class codes must be distinct"));
            }
        }
        for pair in intervals.windows(2) {
            if pair[0].upper != pair[1].lower {
                return Err(Error::invalid(
                    "interval",
                    format!("{} / {}", pair[0].label, pair[1].label),
                    "intervals must be contiguous without gaps or overlaps",
                ));
            }
        }
        Ok(Self {
            intervals,
            closed_top,
        })
    }

    /// Table with codes `0..` from a lower bound, interior breakpoints and an
    /// upper bound: `[min, b1), [b1, b2), …, [b_last, max]`.
    pub fn from_breaks(min: f64, breaks: &[f64], max: f64) -> Result<Self> {
        let mut bounds = Vec::with_capacity(breaks.len() + 2);
        bounds.push(min);
        bounds.extend_from_slice(breaks);
        bounds.push(max);

        let last = bounds.len() - 2;
        let intervals = bounds
            .windows(2)
            .enumerate()
            .map(|(i, w)| ClassInterval {
                lower: w[0],
                upper: w[1],
                code: i as i64,
                label: if i == last {
                    format!("[{}, {}]", w[0], w[1])
                } else {
                    format!("[{}, {})", w[0], w[1])
                },
            })
            .collect();
        Self::new(intervals, true)
    }

    pub fn intervals(&self) -> &[ClassInterval] {
        &self.intervals
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Interior breakpoints (lower bounds of every class but the first).
    pub fn breaks(&self) -> Vec<f64> {
        self.intervals.iter().skip(1).map(|iv| iv.lower).collect()
    }

    /// Class code for `value`, or `None` when it falls outside every interval.
    pub fn classify(&self, value: f64) -> Option<i64> {
        if value.is_nan() {
            return None;
        }
        let idx = self.intervals.partition_point(|iv| iv.lower <= value);
        if idx == 0 {
            return None;
        }
        let iv = &self.intervals[idx - 1];
        let is_top = idx == self.intervals.len();
        if value < iv.upper || (is_top && self.closed_top && value <= iv.upper) {
            Some(iv.code)
        } else {
            None
        }
    }

    /// Rule turning each class code into its own numeric weight.
    pub fn index_rule(&self) -> ReclassRule<f64> {
        ReclassRule::from_pairs(self.intervals.iter().map(|iv| (iv.code, iv.code as f64)))
    }
}
