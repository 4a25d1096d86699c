//! Collaborators backed by CSV exports of the back office.
//!
//! [`StationFile`] serves stop lists, [`CarriageFile`] derives seat counts from
//! carriage layouts. Both load their file once at construction.

mod carriages;
mod stations;

pub use carriages::CarriageFile;
pub use stations::StationFile;
