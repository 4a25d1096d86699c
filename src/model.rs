//! Core records shared by the segment generator, its collaborators and the stores.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A station call within one train's run, as published by the topology provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stop {
    pub train_code: String,
    /// 0-based position in the run. Only the order matters; gaps are tolerated.
    pub index: u32,
    pub name: String,
    pub name_pinyin: String,
    pub arrival: NaiveTime,
    pub departure: NaiveTime,
    /// Kilometers from this stop to the next one. Zero on the terminus.
    #[serde(with = "rust_decimal::serde::str")]
    pub distance_to_next_km: Decimal,
}

/// Seating categories sold on a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SeatClass {
    #[serde(rename = "1")]
    FirstClass,
    #[serde(rename = "2")]
    SecondClass,
    #[serde(rename = "3")]
    SoftSleeper,
    #[serde(rename = "4")]
    HardSleeper,
}

impl SeatClass {
    pub const ALL: [SeatClass; 4] = [
        SeatClass::FirstClass,
        SeatClass::SecondClass,
        SeatClass::SoftSleeper,
        SeatClass::HardSleeper,
    ];

    /// Code used by the back office and in CSV files.
    pub fn code(&self) -> &'static str {
        match self {
            SeatClass::FirstClass => "1",
            SeatClass::SecondClass => "2",
            SeatClass::SoftSleeper => "3",
            SeatClass::HardSleeper => "4",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|class| class.code() == code)
    }

    /// Base price per kilometer, before the train-type coefficient.
    pub fn unit_price(&self) -> Decimal {
        match self {
            SeatClass::FirstClass => Decimal::new(4, 1),
            SeatClass::SecondClass => Decimal::new(3, 1),
            SeatClass::SoftSleeper => Decimal::new(6, 1),
            SeatClass::HardSleeper => Decimal::new(5, 1),
        }
    }

    /// Seat (or berth) labels in one carriage row.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            SeatClass::FirstClass => &["A", "C", "D", "F"],
            SeatClass::SecondClass => &["A", "B", "C", "D", "F"],
            SeatClass::SoftSleeper => &["UL", "LL", "UR", "LR"],
            SeatClass::HardSleeper => &["UL", "ML", "LL", "UR", "MR", "LR"],
        }
    }
}

impl fmt::Display for SeatClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SeatClass::FirstClass => "first class",
            SeatClass::SecondClass => "second class",
            SeatClass::SoftSleeper => "soft sleeper",
            SeatClass::HardSleeper => "hard sleeper",
        };
        f.write_str(name)
    }
}

/// One value per [`SeatClass`].
///
/// Adding a class means adding a field here, which the compiler then forces
/// through `from_fn`, `get` and every flattening of this struct.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerClass<T> {
    pub first_class: T,
    pub second_class: T,
    pub soft_sleeper: T,
    pub hard_sleeper: T,
}

impl<T> PerClass<T> {
    pub fn from_fn(mut f: impl FnMut(SeatClass) -> T) -> Self {
        Self {
            first_class: f(SeatClass::FirstClass),
            second_class: f(SeatClass::SecondClass),
            soft_sleeper: f(SeatClass::SoftSleeper),
            hard_sleeper: f(SeatClass::HardSleeper),
        }
    }

    pub fn get(&self, class: SeatClass) -> &T {
        match class {
            SeatClass::FirstClass => &self.first_class,
            SeatClass::SecondClass => &self.second_class,
            SeatClass::SoftSleeper => &self.soft_sleeper,
            SeatClass::HardSleeper => &self.hard_sleeper,
        }
    }

    pub fn get_mut(&mut self, class: SeatClass) -> &mut T {
        match class {
            SeatClass::FirstClass => &mut self.first_class,
            SeatClass::SecondClass => &mut self.second_class,
            SeatClass::SoftSleeper => &mut self.soft_sleeper,
            SeatClass::HardSleeper => &mut self.hard_sleeper,
        }
    }

    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> PerClass<U> {
        PerClass::from_fn(|class| f(self.get(class)))
    }
}

/// A carriage of a train, used to derive seat capacity per class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Carriage {
    pub train_code: String,
    pub index: u32,
    pub seat_class: SeatClass,
    pub row_count: u32,
}

impl Carriage {
    /// Rows times the seat columns of the carriage's class.
    pub fn seat_count(&self) -> u32 {
        self.row_count * self.seat_class.columns().len() as u32
    }
}

/// A train scheduled for generation: its code and its train-type code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainRun {
    pub code: String,
    pub train_type: String,
}

/// Identity of one generated segment set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SegmentKey {
    pub date: NaiveDate,
    pub train_code: String,
}

impl SegmentKey {
    pub fn new(date: NaiveDate, train_code: impl Into<String>) -> Self {
        Self {
            date,
            train_code: train_code.into(),
        }
    }
}

impl fmt::Display for SegmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.date.format("%Y-%m-%d"), self.train_code)
    }
}

/// Endpoint of a segment: the boarding or alighting stop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub index: u32,
    pub name: String,
    pub name_pinyin: String,
    /// Departure time for an origin, arrival time for a destination.
    pub time: NaiveTime,
}

/// A purchasable origin→destination sub-trip of one run on one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub id: i64,
    pub date: NaiveDate,
    pub train_code: String,
    pub origin: Endpoint,
    pub destination: Endpoint,
    #[serde(with = "rust_decimal::serde::str")]
    pub distance_km: Decimal,
    pub seats: PerClass<u32>,
    pub fares: PerClass<Decimal>,
    pub created_at: DateTime<Utc>,
}

impl Segment {
    pub fn key(&self) -> SegmentKey {
        SegmentKey::new(self.date, self.train_code.clone())
    }

    /// Same content, ignoring the per-run identity and timestamp.
    pub fn same_content(&self, other: &Segment) -> bool {
        self.date == other.date
            && self.train_code == other.train_code
            && self.origin == other.origin
            && self.destination == other.destination
            && self.distance_km == other.distance_km
            && self.seats == other.seats
            && self.fares == other.fares
    }
}

/// Flat CSV row for a [`Segment`]; the csv crate cannot write nested structs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentRecord {
    pub id: i64,
    pub date: NaiveDate,
    pub train_code: String,
    pub start_index: u32,
    pub start: String,
    pub start_pinyin: String,
    pub start_time: NaiveTime,
    pub end_index: u32,
    pub end: String,
    pub end_pinyin: String,
    pub end_time: NaiveTime,
    #[serde(with = "rust_decimal::serde::str")]
    pub distance_km: Decimal,
    pub first_class: u32,
    #[serde(with = "rust_decimal::serde::str")]
    pub first_class_price: Decimal,
    pub second_class: u32,
    #[serde(with = "rust_decimal::serde::str")]
    pub second_class_price: Decimal,
    pub soft_sleeper: u32,
    #[serde(with = "rust_decimal::serde::str")]
    pub soft_sleeper_price: Decimal,
    pub hard_sleeper: u32,
    #[serde(with = "rust_decimal::serde::str")]
    pub hard_sleeper_price: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<&Segment> for SegmentRecord {
    fn from(segment: &Segment) -> Self {
        Self {
            id: segment.id,
            date: segment.date,
            train_code: segment.train_code.clone(),
            start_index: segment.origin.index,
            start: segment.origin.name.clone(),
            start_pinyin: segment.origin.name_pinyin.clone(),
            start_time: segment.origin.time,
            end_index: segment.destination.index,
            end: segment.destination.name.clone(),
            end_pinyin: segment.destination.name_pinyin.clone(),
            end_time: segment.destination.time,
            distance_km: segment.distance_km,
            first_class: segment.seats.first_class,
            first_class_price: segment.fares.first_class,
            second_class: segment.seats.second_class,
            second_class_price: segment.fares.second_class,
            soft_sleeper: segment.seats.soft_sleeper,
            soft_sleeper_price: segment.fares.soft_sleeper,
            hard_sleeper: segment.seats.hard_sleeper,
            hard_sleeper_price: segment.fares.hard_sleeper,
            created_at: segment.created_at,
        }
    }
}

impl From<SegmentRecord> for Segment {
    fn from(record: SegmentRecord) -> Self {
        Self {
            id: record.id,
            date: record.date,
            train_code: record.train_code,
            origin: Endpoint {
                index: record.start_index,
                name: record.start,
                name_pinyin: record.start_pinyin,
                time: record.start_time,
            },
            destination: Endpoint {
                index: record.end_index,
                name: record.end,
                name_pinyin: record.end_pinyin,
                time: record.end_time,
            },
            distance_km: record.distance_km,
            seats: PerClass {
                first_class: record.first_class,
                second_class: record.second_class,
                soft_sleeper: record.soft_sleeper,
                hard_sleeper: record.hard_sleeper,
            },
            fares: PerClass {
                first_class: record.first_class_price,
                second_class: record.second_class_price,
                soft_sleeper: record.soft_sleeper_price,
                hard_sleeper: record.hard_sleeper_price,
            },
            created_at: record.created_at,
        }
    }
}
