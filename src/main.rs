//! CLI entry point for the daily ticket generator.
//!
//! Provides subcommands for generating one train's segment set, generating a
//! whole train list for a date, and inspecting a stored set.

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use daily_ticket::{
    batch::{BatchOptions, generate_daily},
    fetch::{
        BasicClient, HttpClient,
        auth::{ApiKey, UrlParam},
        fetch_bytes, is_http_url,
    },
    generator::SegmentGenerator,
    ids::Snowflake,
    infra::{
        backoffice::BackofficeClient,
        files::{CarriageFile, StationFile},
    },
    model::SegmentKey,
    output::{append_record, print_json, print_pretty, print_segments, segments_to_csv},
    parser::parse_trains,
    pricing::PriceTable,
    publish::publish_segments,
    report::GenerationReport,
    services::{SeatInventory, StopTopology},
    store::{CsvStore, SegmentStore},
};
use std::ffi::OsStr;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "daily_ticket")]
#[command(about = "Generate priced daily ticket segments for trains", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Regenerate the segment set of one train on one date
    Generate {
        /// Service date (YYYY-MM-DD)
        #[arg(short, long)]
        date: NaiveDate,

        /// Train code, e.g. G1
        #[arg(short, long)]
        train_code: String,

        /// Train type code: G, D, K or any code from the pricing file
        #[arg(short = 'y', long)]
        train_type: String,

        #[command(flatten)]
        store: StoreArgs,

        #[command(flatten)]
        providers: ProviderArgs,

        #[command(flatten)]
        publish: PublishArgs,
    },
    /// Regenerate every train of a train list on one date
    GenerateDaily {
        /// Service date (YYYY-MM-DD)
        #[arg(short, long)]
        date: NaiveDate,

        /// CSV file or URL with columns code,train_type
        #[arg(long)]
        trains: String,

        /// Maximum number of trains generated at once
        #[arg(short, long, default_value_t = 4)]
        concurrency: usize,

        /// Extra attempts for transient failures
        #[arg(short, long, default_value_t = 2)]
        retries: u32,

        /// Base delay in seconds between attempts, multiplied by the attempt number
        #[arg(long, default_value_t = 1)]
        retry_delay: u64,

        #[command(flatten)]
        store: StoreArgs,

        #[command(flatten)]
        providers: ProviderArgs,

        #[command(flatten)]
        publish: PublishArgs,
    },
    /// Print the stored segment set of one train on one date
    Show {
        /// Service date (YYYY-MM-DD)
        #[arg(short, long)]
        date: NaiveDate,

        /// Train code, e.g. G1
        #[arg(short, long)]
        train_code: String,

        /// Write the set to stdout as CSV instead of logging it
        #[arg(long, default_value_t = false)]
        csv: bool,

        #[command(flatten)]
        store: StoreArgs,
    },
}

#[derive(Args)]
struct StoreArgs {
    /// Directory holding the generated segment sets
    #[arg(long, default_value = "segments")]
    store_dir: String,

    /// CSV file every run appends its report to
    #[arg(long, default_value = "runs.csv")]
    runs_log: String,

    /// JSON file overriding or adding train-type coefficients
    #[arg(long)]
    pricing: Option<String>,

    /// Snowflake worker id for segment ids (0-1023)
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u16).range(0..1024))]
    worker_id: u16,
}

#[derive(Args)]
struct ProviderArgs {
    /// Stations CSV file or URL (file provider)
    #[arg(long, requires = "carriages", conflicts_with = "backoffice_url")]
    stations: Option<String>,

    /// Carriages CSV file or URL (file provider)
    #[arg(long, requires = "stations")]
    carriages: Option<String>,

    /// Base URL of the back-office admin API (HTTP provider)
    #[arg(long)]
    backoffice_url: Option<String>,

    /// Header carrying BACKOFFICE_API_KEY
    #[arg(long, default_value = "token")]
    api_key_header: String,

    /// Send BACKOFFICE_API_KEY as this query parameter instead of a header
    #[arg(long)]
    api_key_param: Option<String>,

    /// HTTP request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,
}

#[derive(Args)]
struct PublishArgs {
    /// Optional: S3 bucket to upload generated sets to (e.g., "my-bucket")
    #[arg(long)]
    s3_bucket: Option<String>,

    /// Optional: Gzip compress uploaded sets
    #[arg(long, default_value_t = false)]
    gzip: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/daily_ticket.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("daily_ticket.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            date,
            train_code,
            train_type,
            store,
            providers,
            publish,
        } => {
            let generator = build_generator(&store, &providers).await?;
            let key = SegmentKey::new(date, &train_code);

            let report = match generator.generate(date, &train_code, &train_type).await {
                Ok(report) => report,
                Err(e) => {
                    let report = GenerationReport::from_error(e.kind(), &e.to_string())
                        .with_key(&key, &train_type);
                    append_record(&store.runs_log, &report)?;
                    return Err(e.into());
                }
            };
            append_record(&store.runs_log, &report)?;
            print_json(&report)?;

            if let Some(bucket) = &publish.s3_bucket {
                let s3 = s3_client().await;
                let segments = generator.store().segments(&key).await?;
                publish_segments(&s3, bucket, &key, &segments, publish.gzip).await?;
            }
        }
        Commands::GenerateDaily {
            date,
            trains,
            concurrency,
            retries,
            retry_delay,
            store,
            providers,
            publish,
        } => {
            let trains = parse_trains(&fetcher(&trains, providers.timeout).await?)
                .with_context(|| format!("parsing train list {trains}"))?;
            let generator = Arc::new(build_generator(&store, &providers).await?);
            let options = BatchOptions {
                concurrency,
                retries,
                retry_delay: Duration::from_secs(retry_delay),
            };

            let summary = generate_daily(generator.clone(), date, trains, &options).await;
            for report in &summary.reports {
                print_pretty(report);
                if let Err(e) = append_record(&store.runs_log, report) {
                    error!(error = %e, "Failed to append run record");
                }
            }

            if let Some(bucket) = &publish.s3_bucket {
                let s3 = s3_client().await;
                for report in summary.reports.iter().filter(|r| r.is_success()) {
                    let Some(code) = &report.train_code else { continue };
                    let key = SegmentKey::new(date, code);
                    let segments = generator.store().segments(&key).await?;
                    if let Err(e) =
                        publish_segments(&s3, bucket, &key, &segments, publish.gzip).await
                    {
                        error!(key = %key, error = %e, "Failed to upload segments");
                    }
                }
            }

            info!(
                trains = summary.trains,
                succeeded = summary.succeeded,
                failed = summary.failed,
                segments = summary.segments,
                "Summary"
            );
            if !summary.all_succeeded() {
                bail!("{} of {} trains failed", summary.failed, summary.trains);
            }
        }
        Commands::Show {
            date,
            train_code,
            csv,
            store,
        } => {
            let key = SegmentKey::new(date, &train_code);
            let segments = CsvStore::new(&store.store_dir).segments(&key).await?;
            if segments.is_empty() {
                warn!(key = %key, "No segments stored");
            }
            if csv {
                std::io::stdout().write_all(&segments_to_csv(&segments)?)?;
            } else {
                print_segments(&segments);
            }
        }
    }

    Ok(())
}

#[tracing::instrument(skip_all)]
async fn build_generator(store: &StoreArgs, providers: &ProviderArgs) -> Result<SegmentGenerator> {
    let prices = match &store.pricing {
        Some(path) => PriceTable::load(path)?,
        None => PriceTable::default(),
    };
    for (train_type, coefficient) in prices.iter() {
        info!(train_type, %coefficient, "Price coefficient");
    }

    let (topology, inventory) = build_providers(providers).await?;
    Ok(SegmentGenerator::new(
        topology,
        inventory,
        Arc::new(prices),
        Arc::new(CsvStore::new(&store.store_dir)),
        Arc::new(Snowflake::new(store.worker_id)),
    ))
}

async fn build_providers(
    args: &ProviderArgs,
) -> Result<(Arc<dyn StopTopology>, Arc<dyn SeatInventory>)> {
    if let Some(base_url) = &args.backoffice_url {
        let basic = BasicClient::new(Duration::from_secs(args.timeout))?;
        let api_key = std::env::var("BACKOFFICE_API_KEY").ok();
        let http: Arc<dyn HttpClient> = match (api_key, &args.api_key_param) {
            (Some(key), Some(param)) => Arc::new(UrlParam {
                inner: basic,
                param_name: param.clone(),
                key,
            }),
            (Some(key), None) => Arc::new(ApiKey::new(basic, &args.api_key_header, &key)?),
            (None, _) => {
                warn!("BACKOFFICE_API_KEY not set, calling the back office unauthenticated");
                Arc::new(basic)
            }
        };
        info!(base_url = %base_url, "Using back-office providers");
        let backoffice = Arc::new(BackofficeClient::new(base_url, http));
        let topology: Arc<dyn StopTopology> = backoffice.clone();
        let inventory: Arc<dyn SeatInventory> = backoffice;
        return Ok((topology, inventory));
    }

    let (Some(stations), Some(carriages)) = (&args.stations, &args.carriages) else {
        bail!("either --backoffice-url or both --stations and --carriages are required");
    };
    let topology: Arc<dyn StopTopology> = Arc::new(
        StationFile::from_bytes(&fetcher(stations, args.timeout).await?)
            .with_context(|| format!("parsing stations {stations}"))?,
    );
    let inventory: Arc<dyn SeatInventory> = Arc::new(
        CarriageFile::from_bytes(&fetcher(carriages, args.timeout).await?)
            .with_context(|| format!("parsing carriages {carriages}"))?,
    );
    Ok((topology, inventory))
}

/// Loads data from a local file path or fetches it over HTTP.
#[tracing::instrument(skip(timeout))]
async fn fetcher(source: &str, timeout: u64) -> Result<Vec<u8>> {
    let bytes = if is_http_url(source) {
        let client = BasicClient::new(Duration::from_secs(timeout))?;
        fetch_bytes(&client, source).await?
    } else {
        std::fs::read(source).with_context(|| format!("reading {source}"))?
    };
    Ok(bytes)
}

async fn s3_client() -> aws_sdk_s3::Client {
    let config = aws_config::load_from_env().await;
    aws_sdk_s3::Client::new(&config)
}
