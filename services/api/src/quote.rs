use crate::infra::{bootstrap, empty_string_as_none};
use clap::Args;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use tea_quote::error::AppError;
use tea_quote::pricing::{
    ErrorKind, FieldValue, LotRecord, ModelInfoResponse, PredictionService,
};
use tea_quote::telemetry::LogSink;
use tracing::{info, warn};

#[derive(Args, Debug)]
pub(crate) struct LotArgs {
    /// Auction date (DD/MM/YYYY)
    #[arg(long)]
    pub(crate) date: String,
    /// Selling mark as listed in the auction catalogue
    #[arg(long)]
    pub(crate) selling_mark: String,
    /// Tea grade, e.g. BOP or BP1
    #[arg(long)]
    pub(crate) grade: String,
    /// Weight of a single bag
    #[arg(long)]
    pub(crate) bag_weight: String,
    /// Number of bags in the lot
    #[arg(long)]
    pub(crate) no_of_bags: String,
    #[arg(long)]
    pub(crate) invoice_no: Option<String>,
    #[arg(long)]
    pub(crate) lot_no: Option<String>,
}

#[derive(Args, Debug)]
pub(crate) struct BatchArgs {
    /// CSV file with one lot per row (date,selling_mark,grade,invoice_no,lot_no,bag_weight,no_of_bags)
    #[arg(long)]
    pub(crate) input: PathBuf,
    /// Write quotes here instead of stdout
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct LotQuoteOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    invoice_no: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    lot_no: Option<String>,
    price: f64,
    amount: f64,
    nett_quantity: f64,
}

pub(crate) fn run_lot_quote(args: LotArgs, manifest: Option<PathBuf>) -> Result<(), AppError> {
    let (_, service) = bootstrap(manifest, LogSink::Stderr)?;

    let LotArgs {
        date,
        selling_mark,
        grade,
        bag_weight,
        no_of_bags,
        invoice_no,
        lot_no,
    } = args;

    let record = LotRecord {
        invoice_no: invoice_no.clone().map(FieldValue::from),
        lot_no: lot_no.clone().map(FieldValue::from),
        ..LotRecord::new(date, selling_mark, grade, bag_weight, no_of_bags)
    };
    let quote = service.quote(&record)?;

    let output = LotQuoteOutput {
        invoice_no,
        lot_no,
        price: quote.predicted_unit_price,
        amount: quote.predicted_amount,
        nett_quantity: quote.nett_quantity,
    };
    print_json(&output)
}

pub(crate) fn run_batch_quote(args: BatchArgs, manifest: Option<PathBuf>) -> Result<(), AppError> {
    let (_, service) = bootstrap(manifest, LogSink::Stderr)?;
    let input = File::open(&args.input)?;

    let summary = match args.output {
        Some(path) => quote_batch(&service, input, File::create(path)?)?,
        None => quote_batch(&service, input, io::stdout().lock())?,
    };

    info!(
        quoted = summary.quoted,
        failed = summary.failed,
        input = %args.input.display(),
        "batch quote finished"
    );
    Ok(())
}

pub(crate) fn run_model_inspect(manifest: Option<PathBuf>) -> Result<(), AppError> {
    let (config, service) = bootstrap(manifest, LogSink::Stderr)?;
    info!(manifest = %config.artifacts.manifest_path.display(), "inspecting model bundle");
    print_json(&ModelInfoResponse::from_service(&service))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::Io(io::Error::new(io::ErrorKind::InvalidData, err)))?;
    println!("{rendered}");
    Ok(())
}

#[derive(Debug, Deserialize)]
struct BatchRow {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    date: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    selling_mark: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    grade: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    invoice_no: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    lot_no: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    bag_weight: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    no_of_bags: Option<String>,
}

impl From<BatchRow> for LotRecord {
    fn from(row: BatchRow) -> Self {
        LotRecord {
            date: row.date.map(FieldValue::from),
            selling_mark: row.selling_mark.map(FieldValue::from),
            grade: row.grade.map(FieldValue::from),
            invoice_no: row.invoice_no.map(FieldValue::from),
            lot_no: row.lot_no.map(FieldValue::from),
            bag_weight: row.bag_weight.map(FieldValue::from),
            no_of_bags: row.no_of_bags.map(FieldValue::from),
        }
    }
}

#[derive(Debug, Serialize)]
struct BatchResultRow {
    invoice_no: Option<String>,
    lot_no: Option<String>,
    price: Option<f64>,
    amount: Option<f64>,
    error: Option<String>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct BatchSummary {
    pub(crate) quoted: usize,
    pub(crate) failed: usize,
}

/// Quote every lot in `reader`, writing one result row per input row.
/// Rows that fail, including rows the CSV reader cannot parse, carry the
/// error message instead of a price.
pub(crate) fn quote_batch<R: Read, W: Write>(
    service: &PredictionService,
    reader: R,
    writer: W,
) -> Result<BatchSummary, AppError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut csv_writer = csv::Writer::from_writer(writer);
    let mut summary = BatchSummary::default();

    for row in csv_reader.deserialize::<BatchRow>() {
        let row = match row {
            Ok(row) => row,
            Err(err) if err.is_io_error() => return Err(err.into()),
            Err(err) => {
                summary.failed += 1;
                warn!(error = %err, "skipping unreadable batch row");
                csv_writer.serialize(BatchResultRow {
                    invoice_no: None,
                    lot_no: None,
                    price: None,
                    amount: None,
                    error: Some(format!("{}: {}", ErrorKind::ValidationError.as_str(), err)),
                })?;
                continue;
            }
        };
        let record = LotRecord::from(row);
        let invoice_no = record.invoice_no.as_ref().map(FieldValue::as_text);
        let lot_no = record.lot_no.as_ref().map(FieldValue::as_text);

        let result = match service.quote(&record) {
            Ok(quote) => {
                summary.quoted += 1;
                BatchResultRow {
                    invoice_no,
                    lot_no,
                    price: Some(quote.predicted_unit_price),
                    amount: Some(quote.predicted_amount),
                    error: None,
                }
            }
            Err(err) => {
                summary.failed += 1;
                BatchResultRow {
                    invoice_no,
                    lot_no,
                    price: None,
                    amount: None,
                    error: Some(format!("{}: {}", err.kind().as_str(), err)),
                }
            }
        };
        csv_writer.serialize(result)?;
    }

    csv_writer.flush()?;
    Ok(summary)
}
