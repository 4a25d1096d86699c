use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::info;

use crate::model::{Carriage, SeatClass};
use crate::parser::parse_carriages;
use crate::services::SeatInventory;

/// Seat inventory derived from carriage layouts.
///
/// Every seat of a carriage counts as available, so the count is the same for
/// every service date of a train.
pub struct CarriageFile {
    by_train: HashMap<String, Vec<Carriage>>,
}

impl CarriageFile {
    pub fn load(path: &str) -> Result<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("reading carriages file {path}"))?;
        let carriages = Self::from_bytes(&bytes).with_context(|| format!("parsing {path}"))?;
        info!(path, trains = carriages.by_train.len(), "Carriage file loaded");
        Ok(carriages)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut by_train: HashMap<String, Vec<Carriage>> = HashMap::new();
        for carriage in parse_carriages(bytes)? {
            by_train
                .entry(carriage.train_code.clone())
                .or_default()
                .push(carriage);
        }
        Ok(Self { by_train })
    }
}

#[async_trait::async_trait]
impl SeatInventory for CarriageFile {
    async fn count_available(
        &self,
        _date: NaiveDate,
        train_code: &str,
        class: SeatClass,
    ) -> Result<u32> {
        Ok(self
            .by_train
            .get(train_code)
            .map(|carriages| {
                carriages
                    .iter()
                    .filter(|c| c.seat_class == class)
                    .map(Carriage::seat_count)
                    .sum()
            })
            .unwrap_or(0))
    }
}
