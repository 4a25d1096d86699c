//! Output formatting and persistence for generation runs.
//!
//! Supports pretty-printing, JSON serialization, and appending to the run ledger.

use anyhow::Result;
use tracing::{debug, info};

use crate::model::{Segment, SegmentRecord};
use crate::report::GenerationReport;
use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::path::Path;

/// Logs a run report using Rust's debug pretty-print format.
pub fn print_pretty(report: &GenerationReport) {
    debug!("{:#?}", report);
}

/// Logs a run report as pretty-printed JSON.
pub fn print_json(report: &GenerationReport) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

/// Logs one line per segment, in stored order.
pub fn print_segments(segments: &[Segment]) {
    for segment in segments {
        info!(
            id = segment.id,
            from = %segment.origin.name,
            to = %segment.destination.name,
            departs = %segment.origin.time,
            arrives = %segment.destination.time,
            distance_km = %segment.distance_km,
            first_class = %segment.fares.first_class,
            second_class = %segment.fares.second_class,
            soft_sleeper = %segment.fares.soft_sleeper,
            hard_sleeper = %segment.fares.hard_sleeper,
            "Segment"
        );
    }
}

/// Renders a segment set as CSV with the flat record columns.
pub fn segments_to_csv(segments: &[Segment]) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    for segment in segments {
        writer.serialize(SegmentRecord::from(segment))?;
    }
    Ok(writer.into_inner().map_err(|e| e.into_error())?)
}

/// Appends a [`GenerationReport`] as a row to the run ledger.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record(path: &str, report: &GenerationReport) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, "Appending run record");

    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // only the first row carries the header
        .from_writer(file);

    writer.serialize(report)?;
    writer.flush()?;

    Ok(())
}
