use anyhow::Result;
use thiserror::Error;

use crate::model::Stop;

/// Abstraction over the published station lists of each train.
#[async_trait::async_trait]
pub trait StopTopology: Send + Sync {
    /// Returns the stops of `train_code` in run order.
    ///
    /// An empty list is valid: the train has no published topology yet.
    async fn list_stops(&self, train_code: &str) -> Result<Vec<Stop>>;
}

/// A stop list was delivered but cannot be used as published.
///
/// Providers return it (inside `anyhow::Error`) for data defects that asking
/// again will not change.
#[derive(Error, Debug)]
#[error("{0}")]
pub struct InvalidStops(pub String);
