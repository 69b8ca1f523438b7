//! Append-only CSV ledger of trade attempts.
//!
//! A new ledger appears with its header and first row already in place: both
//! are written to a temp file that is linked to the final path only if
//! nothing is there yet. After that, every row is encoded into one buffer
//! and handed to a single `write_all` on a handle opened in append mode.
//! Existing content is never read back or rewritten, so a header written by
//! an older version stays as it is.

use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::Deserialize;
use tempfile::NamedTempFile;
use tracing::debug;

use polytrader_core::{Result, Side, TradeRecord, TradeStatus};

/// Column order of the trade ledger.
pub const LEDGER_HEADER: [&str; 10] = [
    "timestamp",
    "marketId",
    "side",
    "instrumentId",
    "price",
    "quantity",
    "totalCost",
    "status",
    "reason",
    "error",
];

/// Append `row` to the CSV file at `path`, creating the file (and any missing
/// parent directories) with `header` as its first line if it does not exist.
///
/// Fields containing a comma, a double quote or a line break are quoted with
/// inner quotes doubled. `None` fields are written empty.
pub fn append_row<S: AsRef<str>>(path: &Path, header: &[&str], row: &[Option<S>]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    if !path.exists() {
        match create_with_header(dir, path, header, row) {
            Ok(bytes) => {
                debug!(path = %path.display(), bytes, "ledger created");
                return Ok(());
            }
            // Another writer created it first; append below.
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e),
        }
    }

    let buf = encode(None, row)?;
    let mut file = OpenOptions::new().append(true).open(path)?;
    file.write_all(&buf)?;

    debug!(path = %path.display(), bytes = buf.len(), "ledger row appended");
    Ok(())
}

/// Write header and first row to a temp file in `dir`, then link it into
/// place only if `path` still does not exist. Readers and concurrent writers
/// never see a ledger without its header.
fn create_with_header<S: AsRef<str>>(
    dir: &Path,
    path: &Path,
    header: &[&str],
    row: &[Option<S>],
) -> io::Result<usize> {
    let buf = encode(Some(header), row)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(&buf)?;
    tmp.persist_noclobber(path).map_err(|e| e.error)?;
    Ok(buf.len())
}

fn encode<S: AsRef<str>>(header: Option<&[&str]>, row: &[Option<S>]) -> io::Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Necessary)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    if let Some(header) = header {
        writer.write_record(header)?;
    }
    writer.write_record(row.iter().map(|field| field.as_ref().map_or("", AsRef::<str>::as_ref)))?;

    writer.into_inner().map_err(|e| e.into_error())
}

/// One parsed ledger line.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LedgerEntry {
    pub timestamp: String,
    #[serde(rename = "marketId")]
    pub market_slug: String,
    pub side: Side,
    #[serde(rename = "instrumentId")]
    pub token_id: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    pub quantity: u64,
    #[serde(rename = "totalCost", with = "rust_decimal::serde::str")]
    pub total_cost: Decimal,
    pub status: TradeStatus,
    pub reason: String,
    pub error: Option<String>,
}

/// The trade ledger at a fixed path.
#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row for `record`.
    pub fn record(&self, record: &TradeRecord) -> io::Result<()> {
        append_row(&self.path, &LEDGER_HEADER, &Self::fields(record))
    }

    /// Parse every row currently in the ledger. A ledger that was never
    /// written reads as empty.
    pub fn read_entries(&self) -> Result<Vec<LedgerEntry>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut reader = csv::Reader::from_reader(file);
        let mut entries = Vec::new();
        for row in reader.deserialize::<LedgerEntry>() {
            entries.push(row?);
        }
        Ok(entries)
    }

    fn fields(record: &TradeRecord) -> [Option<String>; 10] {
        [
            Some(record.timestamp_iso()),
            Some(record.market_slug.clone()),
            Some(record.side.to_string()),
            Some(record.token_id.clone()),
            Some(record.price.normalize().to_string()),
            Some(record.quantity.to_string()),
            Some(record.total_cost.normalize().to_string()),
            Some(record.status.to_string()),
            Some(record.reason.clone()),
            record.error.clone(),
        ]
    }
}
