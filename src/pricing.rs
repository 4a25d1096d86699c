//! Train-type price coefficients.

use anyhow::{Context, Result, bail};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;

use crate::services::CoefficientSource;

/// Maps train-type codes to the multiplier applied to every seat-class fare.
///
/// Defaults to the three published categories and can be overridden from a
/// JSON file:
/// ```json
/// {
///   "train_types": { "G": "1.2", "D": 1.0, "K": "0.8", "Z": 0.9 }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct PriceTable {
    coefficients: HashMap<String, Decimal>,
}

#[derive(Deserialize)]
struct PriceFile {
    #[serde(default)]
    train_types: HashMap<String, Decimal>,
}

impl Default for PriceTable {
    fn default() -> Self {
        let coefficients = [
            ("G", Decimal::new(12, 1)),
            ("D", Decimal::new(10, 1)),
            ("K", Decimal::new(8, 1)),
        ]
        .into_iter()
        .map(|(code, rate)| (code.to_string(), rate))
        .collect();
        Self { coefficients }
    }
}

impl PriceTable {
    /// Loads the defaults, then applies the entries of the JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("reading pricing file {path}"))?;
        Self::default().with_overrides(&content)
    }

    /// Applies coefficient overrides from a JSON document.
    pub fn with_overrides(mut self, json: &str) -> Result<Self> {
        let file: PriceFile = serde_json::from_str(json)
            .context("train_types must map codes to decimal coefficients")?;
        for (code, rate) in file.train_types {
            if rate <= Decimal::ZERO {
                bail!("train type {code}: coefficient must be positive, got {rate}");
            }
            self.coefficients.insert(code, rate);
        }
        Ok(self)
    }

    pub fn get(&self, train_type: &str) -> Option<Decimal> {
        self.coefficients.get(train_type).copied()
    }

    /// Iterates over all `(train_type, coefficient)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Decimal)> {
        self.coefficients.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl CoefficientSource for PriceTable {
    fn coefficient(&self, train_type: &str) -> Option<Decimal> {
        self.get(train_type)
    }
}
