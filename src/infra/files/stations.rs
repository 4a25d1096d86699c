use anyhow::{Context, Result};
use std::collections::HashMap;
use tracing::info;

use crate::model::Stop;
use crate::parser::parse_stops;
use crate::services::StopTopology;

/// Station lists of every train, read from one CSV file.
pub struct StationFile {
    by_train: HashMap<String, Vec<Stop>>,
}

impl StationFile {
    pub fn load(path: &str) -> Result<Self> {
        let bytes = std::fs::read(path).with_context(|| format!("reading stations file {path}"))?;
        let stations = Self::from_bytes(&bytes).with_context(|| format!("parsing {path}"))?;
        info!(path, trains = stations.by_train.len(), "Station file loaded");
        Ok(stations)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut by_train: HashMap<String, Vec<Stop>> = HashMap::new();
        for stop in parse_stops(bytes)? {
            by_train.entry(stop.train_code.clone()).or_default().push(stop);
        }
        for stops in by_train.values_mut() {
            stops.sort_by_key(|stop| stop.index);
        }
        Ok(Self { by_train })
    }
}

#[async_trait::async_trait]
impl StopTopology for StationFile {
    async fn list_stops(&self, train_code: &str) -> Result<Vec<Stop>> {
        Ok(self.by_train.get(train_code).cloned().unwrap_or_default())
    }
}
