//! Serialisable pipeline configuration.
//!
//! Reclassification rules are data: the survey-derived weights live here and
//! can be replaced from JSON without touching code. `Default` reproduces the
//! German census geomarketing case study.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::classes::ClassBreakTable;
use crate::density::BinMode;
use crate::error::{Error, Result};
use crate::metro::Connectivity;
use crate::reclass::ReclassRule;

/// Grid Loader options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoaderConfig {
    /// Class codes loaded as missing. The census marks unknown values with
    /// -1 and suppressed values with -9.
    pub missing_codes: Vec<i64>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            missing_codes: vec![-1, -9],
        }
    }
}

/// Reclassification rule bound to a census column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttributeRule {
    pub column: String,
    pub rule: ReclassRule<f64>,
}

impl AttributeRule {
    pub fn new(column: impl Into<String>, rule: ReclassRule<f64>) -> Self {
        Self {
            column: column.into(),
            rule,
        }
    }
}

/// Metro-Area Extractor options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetroConfig {
    /// Block size k of the k×k aggregation.
    pub factor: usize,
    /// Minimum population; aggregated cells must strictly exceed it.
    pub threshold: f64,
    pub connectivity: Connectivity,
}

impl Default for MetroConfig {
    /// 20×20 blocks of 1 km cells, metros above half a million people.
    fn default() -> Self {
        Self {
            factor: 20,
            threshold: 500_000.0,
            connectivity: Connectivity::Four,
        }
    }
}

/// Point-Density Rasterizer options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DensityConfig {
    /// Number of natural-breaks classes.
    pub classes: usize,
    pub mode: BinMode,
    /// Sum point weights instead of counting points.
    pub use_weights: bool,
    /// Fixed class table replacing the data-driven breaks.
    pub breaks: Option<ClassBreakTable>,
}

impl Default for DensityConfig {
    fn default() -> Self {
        Self {
            classes: 4,
            mode: BinMode::Drop,
            use_weights: false,
            breaks: None,
        }
    }
}

/// Complete configuration of a suitability run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SuitabilityConfig {
    pub loader: LoaderConfig,
    /// Population class → representative headcount. Feeds metro extraction
    /// only; it is not part of the score.
    pub population: AttributeRule,
    /// Demographic class → suitability weight, one rule per column.
    pub demographics: Vec<AttributeRule>,
    pub metro: MetroConfig,
    pub density: DensityConfig,
}

fn rule(ranges: &[(i64, i64, f64)]) -> ReclassRule<f64> {
    ReclassRule::from_pairs(
        ranges
            .iter()
            .flat_map(|&(from, to, value)| (from..=to).map(move |code| (code, value))),
    )
}

impl Default for SuitabilityConfig {
    fn default() -> Self {
        Self {
            loader: LoaderConfig::default(),
            population: AttributeRule::new(
                "pop",
                rule(&[
                    (1, 1, 127.0),
                    (2, 2, 375.0),
                    (3, 3, 1250.0),
                    (4, 4, 3000.0),
                    (5, 5, 6000.0),
                    (6, 6, 8000.0),
                ]),
            ),
            demographics: vec![
                AttributeRule::new("women", rule(&[(1, 1, 3.0), (2, 2, 2.0), (3, 3, 1.0), (4, 5, 0.0)])),
                AttributeRule::new("mean_age", rule(&[(1, 1, 3.0), (2, 2, 0.0), (3, 5, 0.0)])),
                AttributeRule::new("hh_size", rule(&[(1, 1, 3.0), (2, 2, 2.0), (3, 3, 1.0), (4, 5, 0.0)])),
            ],
            metro: MetroConfig::default(),
            density: DensityConfig::default(),
        }
    }
}

impl SuitabilityConfig {
    /// Parse and validate a JSON document. Missing sections take defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.metro.factor == 0 {
            return Err(Error::invalid("metro.factor", self.metro.factor, "must be at least 1"));
        }
        if !self.metro.threshold.is_finite() {
            return Err(Error::invalid("metro.threshold", self.metro.threshold, "must be finite"));
        }
        if self.density.classes == 0 {
            return Err(Error::invalid("density.classes", self.density.classes, "must be at least 1"));
        }

        let mut columns = HashSet::new();
        for attr in std::iter::once(&self.population).chain(&self.demographics) {
            if attr.column.is_empty() {
                return Err(Error::invalid("column", "\"\"", "column name must not be empty"));
            }
            if !columns.insert(attr.column.as_str()) {
                return Err(Error::invalid("column", &attr.column, "column configured more than once"));
            }
            if attr.rule.is_empty() {
                return Err(Error::invalid("rule", &attr.column, "rule has no entries"));
            }
        }
        Ok(())
    }

    /// Census columns the run reads, population first.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.population.column.as_str()).chain(self.demographics.iter().map(|a| a.column.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_case_study() {
        let c = SuitabilityConfig::default();
        c.validate().unwrap();
        assert_eq!(c.loader.missing_codes, vec![-1, -9]);
        assert_eq!(c.population.rule.get(3), Some(1250.0));
        assert_eq!(c.population.rule.get(7), None);
        let women = &c.demographics[0];
        assert_eq!(women.column, "women");
        assert_eq!(women.rule.get(5), Some(0.0));
        assert_eq!(c.metro.factor, 20);
        assert_eq!(c.density.classes, 4);
        assert_eq!(c.columns().collect::<Vec<_>>(), vec!["pop", "women", "mean_age", "hh_size"]);
    }

    #[test]
    fn json_round_trip() {
        let c = SuitabilityConfig::default();
        let json = c.to_json_pretty().unwrap();
        let back = SuitabilityConfig::from_json_str(&json).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn partial_json_takes_defaults() {
        let c = SuitabilityConfig::from_json_str(r#"{"metro":{"threshold":1000,"connectivity":"eight"}}"#).unwrap();
        assert_eq!(c.metro.threshold, 1000.0);
        assert_eq!(c.metro.connectivity, Connectivity::Eight);
        assert_eq!(c.metro.factor, 20);
        assert_eq!(c.demographics.len(), 3);
    }

    #[test]
    fn unknown_fields_rejected() {
        let err = SuitabilityConfig::from_json_str(r#"{"metro":{"treshold":1000}}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn invalid_values_rejected() {
        for json in [
            r#"{"metro":{"factor":0}}"#,
            r#"{"density":{"classes":0}}"#,
            r#"{"demographics":[{"column":"pop","rule":[{"from":1,"to":2,"value":1.0}]}]}"#,
            r#"{"demographics":[{"column":"x","rule":[]}]}"#,
        ] {
            assert!(
                matches!(SuitabilityConfig::from_json_str(json), Err(Error::InvalidParameter { .. })),
                "{json} should be rejected"
            );
        }
    }
}
