//! Delimited text reader

use std::borrow::Cow;
use std::io;
use std::path::Path;

use tracing::debug;

use crate::config::{DelimitedOptions, ExportFormat, ExportOptions, QuotePolicy, TextEncoding};
use crate::error::{ExportError, Result};
use crate::model::{CellType, CellValue, Table};

use super::Parser;

/// Parser for CSV/TSV files
pub struct DelimitedParser;

impl Parser for DelimitedParser {
    fn format(&self) -> ExportFormat {
        ExportFormat::Delimited
    }

    fn parse(&self, path: &Path, options: &ExportOptions) -> Result<Table> {
        import_delimited(path, &options.delimited)
    }
}

/// Read a delimited text file written with `options`.
///
/// Each column gets the narrowest type that fits all its fields (boolean,
/// integer, real, text); fields equal to the missing placeholder are missing.
/// Unless every field was quoted, a quoted field is text.
pub fn import_delimited(path: impl AsRef<Path>, options: &DelimitedOptions) -> Result<Table> {
    let path = path.as_ref();
    options.validate()?;

    let bytes = std::fs::read(path)?;
    let text = decode(&bytes, options.encoding)?;
    parse_delimited(&text, options)
}

fn decode(bytes: &[u8], encoding: TextEncoding) -> Result<Cow<'_, str>> {
    match encoding {
        TextEncoding::Utf8 => {
            let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
            std::str::from_utf8(bytes)
                .map(Cow::Borrowed)
                .map_err(|e| invalid_data(format!("input is not valid UTF-8: {}", e)))
        }
        TextEncoding::Latin1 => Ok(Cow::Owned(bytes.iter().map(|&b| b as char).collect())),
        TextEncoding::Ascii => match bytes.iter().position(|b| !b.is_ascii()) {
            Some(pos) => Err(invalid_data(format!("non-ASCII byte at offset {}", pos))),
            None => Ok(Cow::Owned(bytes.iter().map(|&b| b as char).collect())),
        },
    }
}

fn invalid_data(msg: String) -> ExportError {
    ExportError::Io(io::Error::new(io::ErrorKind::InvalidData, msg))
}

/// One field as read, with whether it was written in quotes
struct RawField {
    text: String,
    quoted: bool,
}

impl RawField {
    fn is_missing(&self, placeholder: &str) -> bool {
        self.text == placeholder && (!self.quoted || self.text.is_empty())
    }

    /// Quoted non-empty fields are text whatever they look like
    fn cell_type(&self) -> CellType {
        if self.quoted {
            CellType::String
        } else {
            classify(&self.text)
        }
    }
}

fn parse_delimited(text: &str, options: &DelimitedOptions) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(options.delimiter as u8)
        .from_reader(text.as_bytes());

    // Under All every field is quoted, so quotes say nothing about type
    let quotes_mark_text = options.quote_policy != QuotePolicy::All;
    let mut records = reader.records();
    let skip = usize::from(options.include_row_labels);

    let names: Option<Vec<String>> = if options.include_header {
        match records.next() {
            Some(header) => Some(header?.iter().skip(skip).map(str::to_string).collect()),
            None => return Ok(Table::default()),
        }
    } else {
        None
    };

    let mut labels = Vec::new();
    let mut fields: Vec<Vec<RawField>> = Vec::new();
    let mut width = names.as_ref().map(Vec::len);

    for (line, record) in records.enumerate() {
        let record = record?;
        let line = line + 1 + usize::from(options.include_header);
        let quoted = if quotes_mark_text {
            quoted_fields(text, &record, options.delimiter)
        } else {
            vec![false; record.len()]
        };
        let mut values = record.iter().zip(quoted).map(|(text, quoted)| RawField {
            text: text.to_string(),
            quoted,
        });
        if options.include_row_labels {
            labels.push(values.next().map(|field| field.text).unwrap_or_default());
        }
        let values: Vec<RawField> = values.collect();

        let expected = *width.get_or_insert(values.len());
        if values.len() > expected {
            return Err(ExportError::InvalidTable(format!(
                "line {} has {} fields, expected {}",
                line,
                values.len(),
                expected
            )));
        }
        fields.push(values);
    }

    let width = width.unwrap_or(0);
    let names = names.unwrap_or_else(|| (1..=width).map(|i| format!("V{}", i)).collect());
    debug!(rows = fields.len(), columns = width, "parsed delimited text");

    let mut columns = Vec::with_capacity(width);
    for (idx, name) in names.into_iter().enumerate() {
        let raw: Vec<Option<&RawField>> = fields
            .iter()
            .map(|row| {
                row.get(idx)
                    .filter(|field| !field.is_missing(&options.missing_placeholder))
            })
            .collect();
        columns.push((name, typed_column(&raw)));
    }

    let table = Table::from_columns(columns)?;
    if options.include_row_labels && !is_sequence(&labels) {
        return table.with_row_labels(labels);
    }
    Ok(table)
}

/// Which fields of `record` start with a quote in the source text
fn quoted_fields(text: &str, record: &csv::StringRecord, delimiter: char) -> Vec<bool> {
    let start = record
        .position()
        .and_then(|pos| usize::try_from(pos.byte()).ok())
        .unwrap_or(0);
    // The reader's position can sit before skipped line breaks
    let mut rest = text
        .get(start..)
        .unwrap_or("")
        .trim_start_matches(|c: char| c == '\r' || c == '\n');

    record
        .iter()
        .map(|field| {
            let quoted = rest.starts_with('"');
            let len = if quoted {
                field.len() + field.matches('"').count() + 2
            } else {
                field.len()
            };
            rest = rest.get(len..).unwrap_or("");
            rest = rest.strip_prefix(delimiter).unwrap_or(rest);
            quoted
        })
        .collect()
}

/// Parse every field of a column with the narrowest type that fits all of them
fn typed_column(raw: &[Option<&RawField>]) -> Vec<CellValue> {
    let cell_type = raw
        .iter()
        .flatten()
        .fold(CellType::Null, |acc, field| acc.widen(field.cell_type()));

    raw.iter()
        .map(|field| match field {
            None => CellValue::Null,
            Some(field) => parse_as(&field.text, cell_type),
        })
        .collect()
}

fn classify(value: &str) -> CellType {
    if value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false") {
        CellType::Bool
    } else if value.parse::<i64>().is_ok() {
        CellType::Int
    } else if value.parse::<f64>().is_ok() {
        CellType::Float
    } else {
        CellType::String
    }
}

fn parse_as(value: &str, cell_type: CellType) -> CellValue {
    match cell_type {
        CellType::Bool => CellValue::Bool(value.eq_ignore_ascii_case("true")),
        CellType::Int => value
            .parse()
            .map(CellValue::Int)
            .unwrap_or_else(|_| CellValue::from(value)),
        CellType::Float => value
            .parse()
            .map(CellValue::Float)
            .unwrap_or_else(|_| CellValue::from(value)),
        _ => CellValue::from(value),
    }
}

/// Labels `1..=n` stand for an unlabeled table
pub(crate) fn is_sequence(labels: &[String]) -> bool {
    labels
        .iter()
        .enumerate()
        .all(|(idx, label)| label.parse::<usize>().ok() == Some(idx + 1))
}
