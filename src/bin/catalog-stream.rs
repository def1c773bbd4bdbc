//! catalog-stream - push catalog files through the Stream API and check
//! how the platform processed them.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use catalog_stream::{
    full_update, partial_update, AppConfig, Uploader, WorkflowOptions, WorkflowOutcome,
    DEFAULT_CONFIG_PATH,
};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use monitor::{ItemProcessing, MonitorReport, OperationMonitor, OperationSummary, TimeWindow};
use payload::{
    format_file_size, validate_catalog, validate_partial_update, CatalogPayload, ItemsKey,
    PartialUpdateBuilder, PayloadChunker,
};
use serde::Serialize;
use serde_json::json;
use stream::StreamClient;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "catalog-stream")]
#[command(about = "Upload catalog data through the Stream API and monitor its processing")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replace the catalog with the content of a file
    FullUpdate {
        /// Catalog JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Keep items indexed before this update
        #[arg(long)]
        no_delete_old: bool,

        /// Skip log verification
        #[arg(long)]
        no_verify: bool,

        /// Minutes to wait before verification (defaults to the config value)
        #[arg(long)]
        wait: Option<u64>,
    },

    /// Apply field-level changes to existing documents
    PartialUpdate(PartialArgs),

    /// Check how one submission, or a time window, was processed
    Monitor {
        /// Ordering id returned by an upload
        #[arg(long)]
        ordering_id: Option<i64>,

        #[command(flatten)]
        window: WindowArgs,

        /// Minutes to wait before querying the logs
        #[arg(short, long, default_value_t = 0)]
        wait: u64,
    },

    /// Count batch and item outcomes in a time window (last hour by default)
    Summary {
        #[command(flatten)]
        window: WindowArgs,
    },

    /// Validate a payload file locally and report its shape
    CheckFile {
        /// Payload JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Ceiling used to plan chunks
        #[arg(long, default_value_t = 256)]
        max_file_size_mb: usize,
    },
}

#[derive(Args)]
struct PartialArgs {
    /// JSON file with a partialUpdate array
    #[arg(short, long, conflicts_with = "operation", required_unless_present = "operation")]
    file: Option<PathBuf>,

    /// Single operation built from the flags below
    #[arg(long, value_enum, requires = "document_id")]
    operation: Option<QuickOperation>,

    #[arg(long)]
    document_id: Option<String>,

    #[arg(long)]
    price: Option<f64>,

    #[arg(long)]
    rating: Option<f64>,

    #[arg(long)]
    in_stock: Option<bool>,

    /// Comma-separated product ids to add to a store inventory
    #[arg(long, value_delimiter = ',')]
    add_items: Vec<String>,

    /// Comma-separated product ids to remove from a store inventory
    #[arg(long, value_delimiter = ',')]
    remove_items: Vec<String>,

    /// Skip log verification
    #[arg(long)]
    no_verify: bool,

    /// Minutes to wait before verification (defaults to the config value)
    #[arg(long)]
    wait: Option<u64>,
}

#[derive(Clone, Copy, ValueEnum)]
enum QuickOperation {
    UpdatePrice,
    UpdatePromoPrice,
    UpdateStock,
    UpdateInventory,
    UpdateRating,
}

#[derive(Args)]
struct WindowArgs {
    /// Window start (RFC 3339, e.g. 2024-05-22T10:00:00Z)
    #[arg(long, conflicts_with_all = ["last_hour", "last_day", "date"])]
    start: Option<DateTime<Utc>>,

    /// Window end, now when omitted
    #[arg(long, conflicts_with = "date")]
    end: Option<DateTime<Utc>>,

    /// The hour before now
    #[arg(long, conflicts_with_all = ["last_day", "date"])]
    last_hour: bool,

    /// The 24 hours before now
    #[arg(long, conflicts_with = "date")]
    last_day: bool,

    /// A whole UTC day (YYYY-MM-DD)
    #[arg(long)]
    date: Option<NaiveDate>,
}

impl WindowArgs {
    fn resolve(&self, now: DateTime<Utc>) -> Result<Option<TimeWindow>> {
        let end = self.end.unwrap_or(now);
        let window = if let Some(start) = self.start {
            Some(TimeWindow::new(start, end)?)
        } else if let Some(date) = self.date {
            Some(TimeWindow::for_date(date))
        } else if self.last_day {
            Some(TimeWindow::trailing(chrono::Duration::days(1), end))
        } else if self.last_hour || self.end.is_some() {
            Some(TimeWindow::last_hour(end))
        } else {
            None
        };
        Ok(window)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!(error = %format!("{err:#}"), "command_failed");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Ok(false) means the command ran but the outcome was not a success.
fn run(cli: &Cli) -> Result<bool> {
    match &cli.command {
        Command::FullUpdate {
            file,
            no_delete_old,
            no_verify,
            wait,
        } => {
            let config = load_config(&cli.config)?;
            let client = StreamClient::new(config.stream_config())?;
            let uploader = Uploader::new(&client).with_chunker(config.chunker());
            let monitor = OperationMonitor::new(&client);

            let payload = load_payload(file)?;
            let options = WorkflowOptions {
                delete_older: !no_delete_old,
                verify: !no_verify,
                verify_wait: wait.map_or_else(|| config.verify_wait(), minutes),
            };
            let outcome = full_update(&uploader, &monitor, payload, options)?;
            emit(cli.json, &outcome, print_outcome)?;
            Ok(outcome.is_success())
        }

        Command::PartialUpdate(args) => {
            let config = load_config(&cli.config)?;
            let payload = match &args.file {
                Some(file) => load_payload(file)?,
                None => quick_payload(args)?,
            };
            let client = StreamClient::new(config.stream_config())?;
            let uploader = Uploader::new(&client).with_chunker(config.chunker());
            let monitor = OperationMonitor::new(&client);

            let options = WorkflowOptions {
                delete_older: false,
                verify: !args.no_verify,
                verify_wait: args.wait.map_or_else(|| config.verify_wait(), minutes),
            };
            let outcome = partial_update(&uploader, &monitor, payload, options)?;
            emit(cli.json, &outcome, print_outcome)?;
            Ok(outcome.is_success())
        }

        Command::Monitor {
            ordering_id,
            window,
            wait,
        } => {
            let config = load_config(&cli.config)?;
            let monitor = OperationMonitor::new(StreamClient::new(config.stream_config())?);
            let window = window.resolve(Utc::now())?;

            match ordering_id {
                Some(ordering_id) => {
                    let report = monitor.monitor_operation(*ordering_id, window, minutes(*wait))?;
                    emit(cli.json, &report, print_report)?;
                    Ok(report.verdict.is_success())
                }
                None => {
                    let window = window.context(
                        "without --ordering-id a window is required (--start, --last-hour, --last-day or --date)",
                    )?;
                    let items = monitor.check_item_processing(window, None)?;
                    emit(cli.json, &items, print_items)?;
                    Ok(!items.has_errors())
                }
            }
        }

        Command::Summary { window } => {
            let config = load_config(&cli.config)?;
            let monitor = OperationMonitor::new(StreamClient::new(config.stream_config())?);
            let now = Utc::now();
            let window = window
                .resolve(now)?
                .unwrap_or_else(|| TimeWindow::last_hour(now));
            let summary = monitor.operation_summary(window)?;
            emit(cli.json, &summary, print_summary)?;
            Ok(true)
        }

        Command::CheckFile {
            file,
            max_file_size_mb,
        } => check_file(file, PayloadChunker::from_megabytes(*max_file_size_mb), cli.json),
    }
}

fn minutes(value: u64) -> Duration {
    Duration::from_secs(value * 60)
}

fn load_config(path: &Path) -> Result<AppConfig> {
    AppConfig::load(path).with_context(|| format!("configuration {} is not usable", path.display()))
}

fn load_payload(path: &Path) -> Result<CatalogPayload> {
    let size = fs::metadata(path)
        .with_context(|| format!("file not found: {}", path.display()))?
        .len();
    info!(path = %path.display(), size = %format_file_size(size), "payload_file");
    CatalogPayload::from_path(path).with_context(|| format!("cannot load {}", path.display()))
}

fn quick_payload(args: &PartialArgs) -> Result<CatalogPayload> {
    let (Some(operation), Some(document_id)) = (args.operation, args.document_id.as_deref()) else {
        bail!("--operation and --document-id are required without --file");
    };
    let builder = PartialUpdateBuilder::new();
    let builder = match operation {
        QuickOperation::UpdatePrice => {
            let price = args.price.context("--price is required for price updates")?;
            builder.update_price(document_id, price)
        }
        QuickOperation::UpdatePromoPrice => {
            let price = args
                .price
                .context("--price is required for promo price updates")?;
            builder.update_promo_price(document_id, price)
        }
        QuickOperation::UpdateRating => {
            let rating = args
                .rating
                .context("--rating is required for rating updates")?;
            builder.update_rating(document_id, rating)
        }
        QuickOperation::UpdateStock => {
            let in_stock = args
                .in_stock
                .context("--in-stock is required for stock updates")?;
            builder.update_stock_status(document_id, in_stock)
        }
        QuickOperation::UpdateInventory => {
            let add = trimmed(&args.add_items);
            let remove = trimmed(&args.remove_items);
            if add.is_empty() && remove.is_empty() {
                bail!("--add-items or --remove-items is required for inventory updates");
            }
            let mut builder = builder;
            if !add.is_empty() {
                builder = builder.add_to_store_inventory(document_id, add);
            }
            if !remove.is_empty() {
                builder = builder.remove_from_store_inventory(document_id, remove);
            }
            builder
        }
    };
    Ok(builder.build().into_catalog_payload()?)
}

fn trimmed(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}

fn check_file(path: &Path, chunker: PayloadChunker, as_json: bool) -> Result<bool> {
    let payload = load_payload(path)?;
    let items_key = payload.items_key();
    let validation = match items_key {
        Some(ItemsKey::PartialUpdate) => validate_partial_update(&payload),
        _ => validate_catalog(&payload),
    };
    let serialized = payload.serialized_len()?;
    let planned_chunks = chunker.planned_chunk_count(serialized, payload.item_count());

    let report = json!({
        "file": path.display().to_string(),
        "compatible": items_key.is_some(),
        "items_key": items_key.map(|key| key.as_str()),
        "items": payload.item_count(),
        "deletes": payload.delete_count(),
        "object_types": payload.object_type_counts(),
        "operators": payload.operator_counts(),
        "serialized_bytes": serialized,
        "planned_chunks": planned_chunks,
        "valid": validation.is_ok(),
        "error": validation.as_ref().err().map(ToString::to_string),
    });

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("File: {}", path.display());
        println!("Size: {}", format_file_size(serialized as u64));
        match items_key {
            Some(key) => println!("Items key: {} ({} entries)", key.as_str(), payload.item_count()),
            None => println!("Items key: none (not catalog data)"),
        }
        if payload.delete_count() > 0 {
            println!("Deletes: {}", payload.delete_count());
        }
        for (object_type, count) in payload.object_type_counts() {
            println!("  {object_type}: {count}");
        }
        for (operator, count) in payload.operator_counts() {
            println!("  {operator}: {count}");
        }
        println!("Planned chunks: {planned_chunks}");
        match &validation {
            Ok(()) => println!("Validation: ok"),
            Err(err) => println!("Validation: {err}"),
        }
    }
    Ok(validation.is_ok())
}

fn emit<T: Serialize>(as_json: bool, value: &T, text: fn(&T)) -> Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        text(value);
    }
    Ok(())
}

fn print_outcome(outcome: &WorkflowOutcome) {
    let upload = &outcome.upload;
    println!(
        "Upload completed: {} chunk(s) in {} mode, {} item(s)",
        upload.chunks, upload.mode, outcome.items
    );
    println!("  Start time: {}", upload.start_time.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("  Ordering IDs: {:?}", upload.ordering_ids());
    println!("  Request IDs: {:?}", upload.request_ids());
    if let Some(ordering_id) = outcome.deleted_older_than {
        println!("  Deletion of items older than {ordering_id} requested");
    }
    match &outcome.verification {
        Some(verification) => {
            println!("Verification: {}", verification.verdict);
            for report in &verification.reports {
                print_report(report);
            }
        }
        None => println!("Verification: not performed"),
    }
}

fn print_report(report: &MonitorReport) {
    println!("Ordering ID {}: {}", report.ordering_id, report.verdict);
    println!("  Batch: {}", report.batch.message());
    print_items(&report.items);
    println!("  {}", report.message);
}

fn print_items(items: &ItemProcessing) {
    println!("  Items: {}", items.message());
    for issue in items.errors.iter().chain(&items.warnings) {
        println!("    [{}] {}: {}", issue.result, issue.document_id, issue.error);
    }
    if items.is_heuristic() && items.total_issues() > 0 {
        println!("    (issues without an ordering id are included)");
    }
}

fn print_summary(summary: &OperationSummary) {
    let window = &summary.window;
    println!(
        "Operations from {} to {}",
        window.start.format(TimeWindow::QUERY_FORMAT),
        window.end.format(TimeWindow::QUERY_FORMAT)
    );
    let batch = &summary.batch_operations;
    println!(
        "Batches: {} total, {} completed, {} warnings, {} errors",
        batch.total, batch.successful, batch.warnings, batch.errors
    );
    for record in &batch.operations {
        match &record.error {
            Some(error) => println!("  {} {}: {error}", record.ordering_id, record.result),
            None => println!("  {} {}", record.ordering_id, record.result),
        }
    }
    let items = &summary.item_processing;
    println!(
        "Item issues: {} total, {} warnings, {} errors",
        items.total_issues, items.warnings, items.errors
    );
    for issue in &items.sample_issues {
        println!("  [{}] {}: {}", issue.result, issue.document_id, issue.error);
    }
}
