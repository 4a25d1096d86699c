//! CSV decoding for station lists, carriage lists and train lists.

use anyhow::{Result, bail};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;

use crate::model::{Carriage, Stop, TrainRun};

/// Decodes every row of a headed CSV document.
fn parse_rows<T: DeserializeOwned>(bytes: &[u8]) -> Result<Vec<T>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(bytes);
    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        let record: T = result?;
        rows.push(record);
    }
    Ok(rows)
}

/// Decodes a station list.
///
/// Columns: `train_code,index,name,name_pinyin,arrival,departure,distance_to_next_km`,
/// times as `HH:MM:SS`.
///
/// # Errors
///
/// Returns an error on malformed rows or on a negative distance.
pub fn parse_stops(bytes: &[u8]) -> Result<Vec<Stop>> {
    let stops: Vec<Stop> = parse_rows(bytes)?;
    if let Some(stop) = stops.iter().find(|s| s.distance_to_next_km < Decimal::ZERO) {
        bail!(
            "{} stop {} ({}) has negative distance {}",
            stop.train_code,
            stop.index,
            stop.name,
            stop.distance_to_next_km
        );
    }
    Ok(stops)
}

/// Decodes a carriage list. Columns: `train_code,index,seat_class,row_count`,
/// where `seat_class` is the class code `1`–`4`.
pub fn parse_carriages(bytes: &[u8]) -> Result<Vec<Carriage>> {
    parse_rows(bytes)
}

/// Decodes a train list. Columns: `code,train_type`.
pub fn parse_trains(bytes: &[u8]) -> Result<Vec<TrainRun>> {
    parse_rows(bytes)
}
