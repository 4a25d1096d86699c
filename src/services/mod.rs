//! Collaborators the segment generator consumes.
//!
//! [`StopTopology`] lists a train's stops, [`SeatInventory`] counts seats per
//! class and [`CoefficientSource`] resolves train-type price coefficients.

mod inventory;
mod topology;

pub use inventory::SeatInventory;
pub use topology::{InvalidStops, StopTopology};

use rust_decimal::Decimal;

/// Resolves a train-type code to its price coefficient.
pub trait CoefficientSource: Send + Sync {
    /// `None` when the train type is not configured.
    fn coefficient(&self, train_type: &str) -> Option<Decimal>;
}
