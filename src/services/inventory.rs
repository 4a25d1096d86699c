use anyhow::Result;
use chrono::NaiveDate;

use crate::model::SeatClass;

/// Abstraction over the daily seat inventory of each run.
#[async_trait::async_trait]
pub trait SeatInventory: Send + Sync {
    /// Number of physically available seats of `class` on `train_code` for `date`.
    async fn count_available(
        &self,
        date: NaiveDate,
        train_code: &str,
        class: SeatClass,
    ) -> Result<u32>;
}
