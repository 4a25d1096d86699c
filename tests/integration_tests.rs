use chrono::NaiveDate;
use daily_ticket::batch::{BatchOptions, generate_daily};
use daily_ticket::generator::SegmentGenerator;
use daily_ticket::ids::Snowflake;
use daily_ticket::infra::files::{CarriageFile, StationFile};
use daily_ticket::model::{SegmentKey, SeatClass};
use daily_ticket::output::append_record;
use daily_ticket::parser::parse_trains;
use daily_ticket::pricing::PriceTable;
use daily_ticket::store::{CsvStore, SegmentStore};
use rust_decimal::Decimal;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const FIXTURES: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");

fn fixture(name: &str) -> String {
    format!("{FIXTURES}/{name}")
}

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("daily_ticket_it_{name}_{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    dir
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 20).unwrap()
}

fn generator(store_dir: &PathBuf, prices: PriceTable) -> SegmentGenerator {
    SegmentGenerator::new(
        Arc::new(StationFile::load(&fixture("stations.csv")).unwrap()),
        Arc::new(CarriageFile::load(&fixture("carriages.csv")).unwrap()),
        Arc::new(prices),
        Arc::new(CsvStore::new(store_dir)),
        Arc::new(Snowflake::new(3)),
    )
}

#[tokio::test]
async fn test_full_pipeline() {
    let dir = temp_dir("pipeline");
    let generator = generator(&dir, PriceTable::default());

    let report = generator.generate(date(), "G1", "G").await.unwrap();
    assert_eq!(report.stops, 4);
    assert_eq!(report.segments, 6);

    // Read back through a fresh store over the same directory.
    let store = CsvStore::new(&dir);
    let segments = store.segments(&SegmentKey::new(date(), "G1")).await.unwrap();
    assert_eq!(segments.len(), 6);

    let through = segments
        .iter()
        .find(|s| s.origin.index == 0 && s.destination.index == 3)
        .unwrap();
    assert_eq!(through.origin.name, "北京南");
    assert_eq!(through.destination.name, "上海虹桥");
    assert_eq!(through.distance_km, Decimal::from(1318));
    assert_eq!(through.seats.get(SeatClass::FirstClass), &40);
    assert_eq!(through.seats.get(SeatClass::SecondClass), &180);
    assert_eq!(through.seats.get(SeatClass::SoftSleeper), &0);
    assert_eq!(through.fares.first_class.to_string(), "632.64");
    assert_eq!(through.fares.second_class.to_string(), "474.48");
    assert_eq!(through.fares.soft_sleeper.to_string(), "948.96");

    let ids: std::collections::HashSet<_> = segments.iter().map(|s| s.id).collect();
    assert_eq!(ids.len(), 6);

    fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn test_regeneration_replaces_previous_set() {
    let dir = temp_dir("regenerate");
    let generator = generator(&dir, PriceTable::default());
    let key = SegmentKey::new(date(), "K7");

    generator.generate(date(), "K7", "K").await.unwrap();
    let first = generator.store().segments(&key).await.unwrap();
    generator.generate(date(), "K7", "K").await.unwrap();
    let second = generator.store().segments(&key).await.unwrap();

    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert!(first[0].same_content(&second[0]));
    assert_ne!(first[0].id, second[0].id);
    assert_eq!(second[0].fares.hard_sleeper.to_string(), "55.00");
    assert_eq!(second[0].fares.soft_sleeper.to_string(), "66.00");
    assert_eq!(second[0].seats.hard_sleeper, 66);

    // Only the live file remains in the date directory.
    let date_dir = dir.join("date=2026-10-20");
    let names: Vec<_> = fs::read_dir(&date_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(names, vec!["train_code=K7.csv".to_string()]);

    fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn test_daily_batch_with_pricing_file() {
    let dir = temp_dir("daily");
    let prices = PriceTable::load(&fixture("pricing.json")).unwrap();
    let generator = Arc::new(generator(&dir, prices));
    let trains = parse_trains(&fs::read(fixture("trains.csv")).unwrap()).unwrap();

    let options = BatchOptions {
        concurrency: 2,
        retries: 0,
        retry_delay: Duration::from_millis(1),
    };
    let summary = generate_daily(generator.clone(), date(), trains, &options).await;

    assert!(summary.all_succeeded());
    assert_eq!(summary.trains, 3);
    // G1: 6, K7: 1, Z9 has no published stops.
    assert_eq!(summary.segments, 7);
    let z9 = &summary.reports[2];
    assert_eq!((z9.stops, z9.segments), (0, 0));

    let keys = generator.store().keys().await.unwrap();
    assert_eq!(
        keys,
        vec![SegmentKey::new(date(), "G1"), SegmentKey::new(date(), "K7")]
    );

    let ledger = dir.join("runs.csv");
    for report in &summary.reports {
        append_record(ledger.to_str().unwrap(), report).unwrap();
    }
    let content = fs::read_to_string(&ledger).unwrap();
    assert_eq!(content.lines().count(), 4);

    fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn test_unconfigured_train_type_fails_daily_run() {
    let dir = temp_dir("unconfigured");
    let generator = Arc::new(generator(&dir, PriceTable::default()));
    let trains = parse_trains(&fs::read(fixture("trains.csv")).unwrap()).unwrap();

    let summary = generate_daily(generator, date(), trains, &BatchOptions::default()).await;

    assert!(!summary.all_succeeded());
    assert_eq!(summary.failed, 1);
    let z9 = &summary.reports[2];
    assert_eq!(z9.error_type.as_deref(), Some("configuration"));
    assert_eq!(z9.attempts, 1);

    let _ = fs::remove_dir_all(&dir);
}
