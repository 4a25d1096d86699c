use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::model::SegmentKey;

/// Outcome of one generation run, one row in the run ledger.
///
/// `stops = 0, segments = 0` with no error means the run happened and found
/// no published topology, which is distinct from a missing row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationReport {
    pub timestamp: DateTime<Utc>,
    pub date: Option<NaiveDate>,
    pub train_code: Option<String>,
    pub train_type: Option<String>,
    pub stops: usize,
    pub segments: usize,
    pub attempts: u32,
    pub elapsed_ms: u64,

    // error tracking
    pub error_type: Option<String>,
    pub error_message: Option<String>,
}

impl GenerationReport {
    pub fn completed(stops: usize, segments: usize) -> Self {
        GenerationReport {
            timestamp: Utc::now(),
            stops,
            segments,
            attempts: 1,
            ..Default::default()
        }
    }

    /// Create an error record with timestamp and error information
    pub fn from_error(error_type: &str, error_message: &str) -> Self {
        GenerationReport {
            timestamp: Utc::now(),
            attempts: 1,
            error_type: Some(error_type.to_string()),
            error_message: Some(error_message.to_string()),
            ..Default::default()
        }
    }

    /// Set the key and train type the run was for
    pub fn with_key(mut self, key: &SegmentKey, train_type: &str) -> Self {
        self.date = Some(key.date);
        self.train_code = Some(key.train_code.clone());
        self.train_type = Some(train_type.to_string());
        self
    }

    pub fn with_elapsed(mut self, elapsed: std::time::Duration) -> Self {
        self.elapsed_ms = elapsed.as_millis() as u64;
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn is_success(&self) -> bool {
        self.error_type.is_none()
    }

    /// Expected segment count for `stops` stops: every ordered pair i < j.
    pub fn expected_segments(stops: usize) -> usize {
        stops * stops.saturating_sub(1) / 2
    }
}
