//! Daily generation for a whole train list.
//!
//! Each train runs as its own task, bounded by a semaphore. Retriable failures
//! are re-run from scratch after a linearly growing delay.

use chrono::NaiveDate;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{Instrument, error, info, warn};

use crate::generator::SegmentGenerator;
use crate::model::{SegmentKey, TrainRun};
use crate::report::GenerationReport;

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub concurrency: usize,
    /// Extra attempts after the first one.
    pub retries: u32,
    pub retry_delay: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            retries: 2,
            retry_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub trains: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub segments: usize,
    /// One report per train, in input order.
    pub reports: Vec<GenerationReport>,
}

impl BatchSummary {
    fn from_reports(reports: Vec<GenerationReport>) -> Self {
        let succeeded = reports.iter().filter(|r| r.is_success()).count();
        Self {
            trains: reports.len(),
            succeeded,
            failed: reports.len() - succeeded,
            segments: reports.iter().map(|r| r.segments).sum(),
            reports,
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Generates every train in `trains` for `date`.
///
/// Never fails as a whole: each train's outcome, error or not, is in the
/// returned summary.
#[tracing::instrument(skip(generator, date, trains), fields(date = %date, trains = trains.len()))]
pub async fn generate_daily(
    generator: Arc<SegmentGenerator>,
    date: NaiveDate,
    trains: Vec<TrainRun>,
    options: &BatchOptions,
) -> BatchSummary {
    let semaphore = Arc::new(Semaphore::new(options.concurrency.max(1)));
    let mut tasks = vec![];

    for train in &trains {
        let sem = semaphore.clone();
        let generator = generator.clone();
        let train = train.clone();
        let options = options.clone();

        let train_span = tracing::info_span!(
            "generate_train",
            train_code = %train.code,
            train_type = %train.train_type,
        );

        let task = tokio::spawn(
            async move {
                let Ok(_permit) = sem.acquire_owned().await else {
                    return GenerationReport::from_error("cancelled", "batch semaphore closed")
                        .with_key(&SegmentKey::new(date, &train.code), &train.train_type);
                };
                run_with_retries(&generator, date, &train, &options).await
            }
            .instrument(train_span),
        );

        tasks.push(task);
    }

    let mut reports = Vec::with_capacity(tasks.len());
    for (task, train) in tasks.into_iter().zip(&trains) {
        let report = match task.await {
            Ok(report) => report,
            Err(e) => {
                error!(train_code = %train.code, error = %e, "Generation task aborted");
                GenerationReport::from_error("panic", &e.to_string())
                    .with_key(&SegmentKey::new(date, &train.code), &train.train_type)
            }
        };
        reports.push(report);
    }

    let summary = BatchSummary::from_reports(reports);
    info!(
        trains = summary.trains,
        succeeded = summary.succeeded,
        failed = summary.failed,
        segments = summary.segments,
        "Daily generation finished"
    );
    summary
}

async fn run_with_retries(
    generator: &SegmentGenerator,
    date: NaiveDate,
    train: &TrainRun,
    options: &BatchOptions,
) -> GenerationReport {
    let start = Instant::now();
    let mut attempt = 1;
    loop {
        match generator.generate(date, &train.code, &train.train_type).await {
            Ok(report) => {
                return report
                    .with_attempts(attempt)
                    .with_elapsed(start.elapsed());
            }
            Err(e) if e.is_retriable() && attempt <= options.retries => {
                let delay = options.retry_delay * attempt;
                warn!(attempt, error = %e, delay_ms = delay.as_millis() as u64, "Generation failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                error!(attempt, kind = e.kind(), error = %e, "Generation failed");
                return GenerationReport::from_error(e.kind(), &e.to_string())
                    .with_key(&SegmentKey::new(date, &train.code), &train.train_type)
                    .with_attempts(attempt)
                    .with_elapsed(start.elapsed());
            }
        }
    }
}
