//! Format adapters. Each one turns a file into a header row plus `RawRow`s;
//! nothing here interprets dates, amounts or names.

use std::path::Path;

use tracing::debug;

use crate::amounts::parse_amount;
use crate::dates::{parse_date, DateLocale};
use crate::error::{ConfigError, Result, TxnormError};
use crate::extract::ColumnRoles;
use crate::models::{CellValue, RawRow};

/// How many leading records may be account preamble before the header row.
const HEADER_SCAN_LIMIT: usize = 25;

/// A decoded source: the detected header row (empty when the file has none)
/// and the data rows in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceTable {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl SourceTable {
    /// Roles detected from the header row, or positional defaults when the
    /// source has no header.
    pub fn roles(&self) -> std::result::Result<ColumnRoles, ConfigError> {
        if self.headers.is_empty() {
            Ok(ColumnRoles::default())
        } else {
            ColumnRoles::detect(&self.headers)
        }
    }
}

// Format kinds: enum dispatch instead of trait objects

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Spreadsheet,
    Pdf,
}

const ALL_FORMATS: &[SourceFormat] = &[SourceFormat::Csv, SourceFormat::Spreadsheet, SourceFormat::Pdf];

impl SourceFormat {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Spreadsheet => "spreadsheet",
            Self::Pdf => "pdf",
        }
    }

    pub fn extensions(&self) -> &[&str] {
        match self {
            Self::Csv => &["csv", "txt"],
            Self::Spreadsheet => &["xlsx", "xlsm", "xlsb", "xls", "ods"],
            Self::Pdf => &["pdf"],
        }
    }

    /// Pick a format from the file extension, then from the PDF magic bytes.
    pub fn detect(file_path: &Path) -> Option<Self> {
        let by_extension = file_path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(|ext| {
                ALL_FORMATS
                    .iter()
                    .find(|f| f.extensions().iter().any(|x| x.eq_ignore_ascii_case(ext)))
                    .copied()
            });
        by_extension.or_else(|| {
            let mut magic = [0u8; 4];
            let file = std::fs::File::open(file_path).ok()?;
            std::io::Read::read_exact(&mut std::io::BufReader::new(file), &mut magic).ok()?;
            (&magic == b"%PDF").then_some(Self::Pdf)
        })
    }

    pub fn read(&self, file_path: &Path, sheet: Option<&str>) -> Result<SourceTable> {
        match self {
            Self::Csv => read_csv(file_path),
            Self::Spreadsheet => read_spreadsheet(file_path, sheet),
            Self::Pdf => Err(TxnormError::UnsupportedFormat(format!(
                "{}: PDF statements are not supported, export the account activity as CSV",
                file_path.display()
            ))),
        }
    }
}

/// Detect the format of `file_path` and read it.
pub fn read_table(file_path: &Path, sheet: Option<&str>) -> Result<SourceTable> {
    let format = SourceFormat::detect(file_path).ok_or_else(|| {
        TxnormError::UnsupportedFormat(format!("{}: unrecognized file type", file_path.display()))
    })?;
    debug!(path = %file_path.display(), format = format.key(), "reading source");
    format.read(file_path, sheet)
}

fn looks_like_header(record: &[CellValue]) -> bool {
    let names: Vec<String> = record.iter().map(|c| c.to_text().trim().to_string()).collect();
    ColumnRoles::detect(&names).is_ok()
}

/// Every cell is text that reads as neither a date nor an amount.
fn looks_textual(record: &[CellValue]) -> bool {
    record.iter().all(|cell| match cell {
        CellValue::Text(s) => {
            !s.trim().is_empty()
                && parse_amount(s).is_none()
                && parse_date(s, DateLocale::MonthFirst).is_none()
        }
        _ => false,
    })
}

/// Drop blank records, find the header row past any preamble, and label cells.
fn build_table(records: Vec<Vec<CellValue>>) -> SourceTable {
    let records: Vec<Vec<CellValue>> = records
        .into_iter()
        .filter(|r| !r.iter().all(CellValue::is_blank))
        .collect();
    // Known column names anywhere in the scan window; otherwise an all-text
    // first record is taken as a header the caller can refer to by name.
    let header_at = records
        .iter()
        .take(HEADER_SCAN_LIMIT)
        .position(|r| looks_like_header(r))
        .or_else(|| records.first().filter(|r| looks_textual(r)).map(|_| 0));

    let (headers, data) = match header_at {
        Some(i) => {
            debug!(skipped = i, "header row found");
            let headers = records[i]
                .iter()
                .map(|c| c.to_text().trim().to_string())
                .collect();
            (headers, &records[i + 1..])
        }
        None => {
            debug!("no header row found, using column positions");
            (Vec::new(), &records[..])
        }
    };

    let rows = data
        .iter()
        .map(|record| {
            let mut row = RawRow::new();
            for (i, cell) in record.iter().enumerate() {
                let header = headers.get(i).cloned().unwrap_or_default();
                row.push(header, cell.clone());
            }
            row
        })
        .collect();
    SourceTable { headers, rows }
}

// CSV

/// UTF-8 first (BOM stripped); anything else is read as Latin-1, which maps
/// every byte to a char and so cannot fail.
fn decode_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => match text.strip_prefix('\u{feff}') {
            Some(rest) => rest.to_string(),
            None => text,
        },
        Err(err) => {
            debug!("input is not valid UTF-8, decoding as Latin-1");
            err.into_bytes().iter().map(|&b| char::from(b)).collect()
        }
    }
}

fn read_csv(file_path: &Path) -> Result<SourceTable> {
    let text = decode_text(std::fs::read(file_path)?);
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());
    let mut records = Vec::new();
    for result in rdr.records() {
        let record = result?;
        records.push(record.iter().map(CellValue::from).collect());
    }
    Ok(build_table(records))
}

// Spreadsheets

#[cfg(feature = "xlsx")]
fn cell_from_data(data: &calamine::Data) -> CellValue {
    use calamine::Data;
    match data {
        Data::String(s) => CellValue::from(s.as_str()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Text(b.to_string()),
        Data::DateTime(dt) => {
            let serial = dt.as_f64();
            crate::dates::excel_serial_to_date(serial)
                .map(CellValue::Date)
                .unwrap_or(CellValue::Number(serial))
        }
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        _ => CellValue::Empty,
    }
}

#[cfg(feature = "xlsx")]
fn read_spreadsheet(file_path: &Path, sheet: Option<&str>) -> Result<SourceTable> {
    use calamine::Reader;

    let mut workbook = calamine::open_workbook_auto(file_path)
        .map_err(|e| TxnormError::Spreadsheet(format!("failed to open {}: {e}", file_path.display())))?;
    let name = match sheet {
        Some(name) => name.to_string(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| TxnormError::Spreadsheet("workbook has no sheets".to_string()))?,
    };
    let range = workbook
        .worksheet_range(&name)
        .map_err(|e| TxnormError::Spreadsheet(format!("sheet '{name}': {e}")))?;
    let records = range
        .rows()
        .map(|row| row.iter().map(cell_from_data).collect())
        .collect();
    Ok(build_table(records))
}

#[cfg(not(feature = "xlsx"))]
fn read_spreadsheet(file_path: &Path, _sheet: Option<&str>) -> Result<SourceTable> {
    Err(TxnormError::UnsupportedFormat(format!(
        "{}: spreadsheet support was not compiled in (enable the `xlsx` feature)",
        file_path.display()
    )))
}
