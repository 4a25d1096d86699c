//! Daily segment and fare generation.
//!
//! For one (date, train code) the generator expands the train's stop list into
//! every origin→destination pair with `origin < destination`, attaches the
//! run's seat counts per class and prices each class with [`fare`]. The result
//! replaces whatever set was stored for that key before.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{Mutex as KeyMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::fare::fare;
use crate::ids::IdGenerator;
use crate::model::{Endpoint, PerClass, SeatClass, Segment, SegmentKey, Stop};
use crate::report::GenerationReport;
use crate::services::{CoefficientSource, InvalidStops, SeatInventory, StopTopology};
use crate::store::SegmentStore;

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("unknown train type '{0}': no price coefficient configured")]
    UnknownTrainType(String),
    #[error("stop list for {train_code} unavailable: {source}")]
    Topology {
        train_code: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("stop list for {train_code} is invalid: {reason}")]
    InvalidTopology { train_code: String, reason: String },
    #[error("{class} count for {key} unavailable: {source}")]
    Inventory {
        key: SegmentKey,
        class: SeatClass,
        #[source]
        source: anyhow::Error,
    },
    #[error("storing segments for {key} failed: {source}")]
    Store {
        key: SegmentKey,
        #[source]
        source: anyhow::Error,
    },
}

impl GenerationError {
    /// Short classification written to the run ledger.
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::UnknownTrainType(_) => "configuration",
            GenerationError::Topology { .. } => "topology",
            GenerationError::InvalidTopology { .. } => "invalid_topology",
            GenerationError::Inventory { .. } => "inventory",
            GenerationError::Store { .. } => "store",
        }
    }

    /// Configuration and data errors need a human; everything else can be re-run from scratch.
    pub fn is_retriable(&self) -> bool {
        !matches!(
            self,
            GenerationError::UnknownTrainType(_) | GenerationError::InvalidTopology { .. }
        )
    }
}

/// At most one in-flight generation per key.
#[derive(Default)]
struct KeyLocks {
    locks: Mutex<HashMap<SegmentKey, Arc<KeyMutex<()>>>>,
}

impl KeyLocks {
    async fn acquire(&self, key: &SegmentKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            // Drop locks nobody holds or waits on.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(key.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

pub struct SegmentGenerator {
    topology: Arc<dyn StopTopology>,
    inventory: Arc<dyn SeatInventory>,
    coefficients: Arc<dyn CoefficientSource>,
    store: Arc<dyn SegmentStore>,
    ids: Arc<dyn IdGenerator>,
    locks: KeyLocks,
}

impl SegmentGenerator {
    pub fn new(
        topology: Arc<dyn StopTopology>,
        inventory: Arc<dyn SeatInventory>,
        coefficients: Arc<dyn CoefficientSource>,
        store: Arc<dyn SegmentStore>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            topology,
            inventory,
            coefficients,
            store,
            ids,
            locks: KeyLocks::default(),
        }
    }

    pub fn store(&self) -> &Arc<dyn SegmentStore> {
        &self.store
    }

    /// Regenerates the full segment set for `train_code` on `date`.
    ///
    /// Nothing is written unless every stop and seat count was fetched, so a
    /// failed run leaves the previous set in place and can simply be retried.
    #[tracing::instrument(skip(self, date), fields(date = %date))]
    pub async fn generate(
        &self,
        date: NaiveDate,
        train_code: &str,
        train_type: &str,
    ) -> Result<GenerationReport, GenerationError> {
        let start = Instant::now();
        let key = SegmentKey::new(date, train_code);
        info!("Generating segments");

        let coefficient = self
            .coefficients
            .coefficient(train_type)
            .ok_or_else(|| GenerationError::UnknownTrainType(train_type.to_string()))?;

        let _guard = self.locks.acquire(&key).await;
        debug!("Holding key lock");

        let mut stops = self
            .topology
            .list_stops(train_code)
            .await
            .map_err(|source| {
                if source.is::<InvalidStops>() {
                    GenerationError::InvalidTopology {
                        train_code: train_code.to_string(),
                        reason: source.to_string(),
                    }
                } else {
                    GenerationError::Topology {
                        train_code: train_code.to_string(),
                        source,
                    }
                }
            })?;

        // Fewer than two stops has no pair to sell; the stored set stays as it is.
        if stops.len() < 2 {
            warn!(stops = stops.len(), "Not enough published stops for this train, nothing generated");
            return Ok(GenerationReport::completed(stops.len(), 0)
                .with_key(&key, train_type)
                .with_elapsed(start.elapsed()));
        }

        stops.sort_by_key(|stop| stop.index);
        if let Some(pair) = stops.windows(2).find(|pair| pair[0].index == pair[1].index) {
            return Err(GenerationError::InvalidTopology {
                train_code: train_code.to_string(),
                reason: format!("stop index {} listed twice", pair[0].index),
            });
        }

        let mut seats = PerClass::<u32>::default();
        for class in SeatClass::ALL {
            *seats.get_mut(class) = self
                .inventory
                .count_available(date, train_code, class)
                .await
                .map_err(|source| GenerationError::Inventory {
                    key: key.clone(),
                    class,
                    source,
                })?;
        }
        debug!(?seats, "Seat inventory fetched");

        let segments = build_segments(
            &key,
            &stops,
            &seats,
            coefficient,
            self.ids.as_ref(),
            Utc::now(),
        );
        let count = segments.len();

        self.store
            .replace(&key, segments)
            .await
            .map_err(|source| GenerationError::Store {
                key: key.clone(),
                source,
            })?;

        info!(stops = stops.len(), segments = count, "Segments generated");
        Ok(GenerationReport::completed(stops.len(), count)
            .with_key(&key, train_type)
            .with_elapsed(start.elapsed()))
    }
}

/// Expands ordered `stops` into one segment per pair `i < j`.
///
/// The cumulative distance restarts at each origin and grows by one hop per
/// destination, so the whole set costs O(n²) fares.
pub fn build_segments(
    key: &SegmentKey,
    stops: &[Stop],
    seats: &PerClass<u32>,
    coefficient: Decimal,
    ids: &dyn IdGenerator,
    created_at: DateTime<Utc>,
) -> Vec<Segment> {
    let n = stops.len();
    let mut segments = Vec::with_capacity(GenerationReport::expected_segments(n));

    for i in 0..n {
        let origin = &stops[i];
        let mut distance_km = Decimal::ZERO;

        for j in (i + 1)..n {
            let destination = &stops[j];
            distance_km += stops[j - 1].distance_to_next_km;

            segments.push(Segment {
                id: ids.next_id(),
                date: key.date,
                train_code: key.train_code.clone(),
                origin: Endpoint {
                    index: origin.index,
                    name: origin.name.clone(),
                    name_pinyin: origin.name_pinyin.clone(),
                    time: origin.departure,
                },
                destination: Endpoint {
                    index: destination.index,
                    name: destination.name.clone(),
                    name_pinyin: destination.name_pinyin.clone(),
                    time: destination.arrival,
                },
                distance_km,
                seats: *seats,
                fares: PerClass::from_fn(|class| {
                    fare(distance_km, class.unit_price(), coefficient)
                }),
                created_at,
            });
        }
    }

    segments
}
