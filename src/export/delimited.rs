//! Delimited text (CSV/TSV) writer

use std::borrow::Cow;
use std::io::Write;
use std::path::Path;

use tracing::debug;

use super::{create_output, payload_table, unsupported, ExportReport, ExportSource, Exporter};
use crate::config::{DelimitedOptions, ExportFormat, ExportTarget, QuotePolicy, TextEncoding};
use crate::error::{ExportError, Result};
use crate::model::{CellValue, Table};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const ROW_LABEL_COLUMN: &str = "<row label>";

/// Exporter for CSV/TSV files
pub struct DelimitedExporter;

impl Exporter for DelimitedExporter {
    fn format(&self) -> ExportFormat {
        ExportFormat::Delimited
    }

    fn export(&self, source: ExportSource<'_>, target: &ExportTarget) -> Result<ExportReport> {
        let table = match source {
            ExportSource::Table(table) => table,
            ExportSource::Object(payload) => {
                payload_table(payload).ok_or_else(|| unsupported(source, self.format()))?
            }
            ExportSource::Workbook(_) => return Err(unsupported(source, self.format())),
        };
        export_delimited(table, &target.path, &target.options.delimited)
    }
}

/// Write `table` as delimited text to `path`, replacing any existing file
pub fn export_delimited(
    table: &Table,
    path: impl AsRef<Path>,
    options: &DelimitedOptions,
) -> Result<ExportReport> {
    let path = path.as_ref();
    options.validate()?;

    let mut report = ExportReport::new(path, ExportFormat::Delimited);
    let mut writer = create_output(path)?;
    report.rows_written = write_delimited(table, &mut writer, options)?;
    writer.flush()?;
    drop(writer);

    report.finish()
}

/// Write `table` as delimited text to any writer; returns the data rows written
pub fn write_delimited<W: Write>(
    table: &Table,
    writer: &mut W,
    options: &DelimitedOptions,
) -> Result<usize> {
    options.validate()?;
    debug!(
        rows = table.row_count(),
        columns = table.column_count(),
        delimiter = ?options.delimiter,
        "writing delimited text"
    );

    if options.byte_order_mark {
        writer.write_all(UTF8_BOM)?;
    }

    let mut lines = LineWriter::new(writer, options);

    if options.include_header {
        let mut fields = Vec::with_capacity(table.column_count() + 1);
        if options.include_row_labels {
            fields.push(Field::text("", ROW_LABEL_COLUMN));
        }
        for column in &table.columns {
            fields.push(Field::text(&column.name, &column.name));
        }
        lines.write(&fields)?;
    }

    for (idx, row) in table.rows.iter().enumerate() {
        let mut fields = Vec::with_capacity(row.cells.len() + 1);
        if options.include_row_labels {
            let label = match table.row_labels.as_ref().and_then(|labels| labels.get(idx)) {
                Some(label) => Cow::Borrowed(label.as_str()),
                None => Cow::Owned((idx + 1).to_string()),
            };
            fields.push(Field {
                text: label,
                kind: FieldKind::Text,
                column: ROW_LABEL_COLUMN,
            });
        }
        for (column, cell) in table.columns.iter().zip(&row.cells) {
            fields.push(Field::cell(cell, &column.name, &options.missing_placeholder));
        }
        lines.write(&fields)?;
    }

    Ok(table.row_count())
}

/// Text form of a real: shortest round-trip digits, exponent notation
/// outside `1e-5 <= |x| < 1e15`
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        (if value > 0.0 { "Inf" } else { "-Inf" }).to_string()
    } else if value == 0.0 || (1e-5..1e15).contains(&value.abs()) {
        format!("{}", value)
    } else {
        format!("{:e}", value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    /// Names, labels and text cells
    Text,
    /// Numbers and booleans
    Bare,
    Missing,
}

struct Field<'a> {
    text: Cow<'a, str>,
    kind: FieldKind,
    column: &'a str,
}

impl<'a> Field<'a> {
    fn text(text: &'a str, column: &'a str) -> Self {
        Self {
            text: Cow::Borrowed(text),
            kind: FieldKind::Text,
            column,
        }
    }

    fn cell(cell: &'a CellValue, column: &'a str, placeholder: &'a str) -> Self {
        let (text, kind) = match cell {
            CellValue::Null => (Cow::Borrowed(placeholder), FieldKind::Missing),
            CellValue::Bool(b) => (
                Cow::Borrowed(if *b { "TRUE" } else { "FALSE" }),
                FieldKind::Bare,
            ),
            CellValue::Int(i) => (Cow::Owned(i.to_string()), FieldKind::Bare),
            CellValue::Float(f) => (Cow::Owned(format_float(*f)), FieldKind::Bare),
            CellValue::String(s) => (Cow::Borrowed(s.as_ref()), FieldKind::Text),
        };
        Self { text, kind, column }
    }
}

struct LineWriter<'w, W: Write> {
    out: &'w mut W,
    options: &'w DelimitedOptions,
    line_no: usize,
    buffer: String,
}

impl<'w, W: Write> LineWriter<'w, W> {
    fn new(out: &'w mut W, options: &'w DelimitedOptions) -> Self {
        Self {
            out,
            options,
            line_no: 0,
            buffer: String::new(),
        }
    }

    fn write(&mut self, fields: &[Field<'_>]) -> Result<()> {
        self.line_no += 1;
        self.buffer.clear();

        for (idx, field) in fields.iter().enumerate() {
            if idx > 0 {
                self.buffer.push(self.options.delimiter);
            }
            self.check_encoding(field)?;
            if self.should_quote(field)? {
                self.buffer.push('"');
                self.buffer.push_str(&field.text.replace('"', "\"\""));
                self.buffer.push('"');
            } else {
                self.buffer.push_str(&field.text);
            }
        }
        // A blank line is skipped by readers, so a lone empty field is quoted
        if fields.len() == 1 && self.buffer.is_empty() {
            self.buffer.push_str("\"\"");
        }
        self.buffer.push_str(self.options.line_terminator.as_str());

        match self.options.encoding {
            TextEncoding::Utf8 => self.out.write_all(self.buffer.as_bytes())?,
            // Every char was checked to fit in one byte
            TextEncoding::Latin1 | TextEncoding::Ascii => {
                let bytes: Vec<u8> = self.buffer.chars().map(|c| c as u32 as u8).collect();
                self.out.write_all(&bytes)?;
            }
        }
        Ok(())
    }

    fn check_encoding(&self, field: &Field<'_>) -> Result<()> {
        let encoding = self.options.encoding;
        match field.text.chars().find(|c| !encoding.can_encode(*c)) {
            Some(ch) => Err(ExportError::Encoding {
                encoding: encoding.name(),
                line: self.line_no,
                column: field.column.to_string(),
                ch,
            }),
            None => Ok(()),
        }
    }

    fn should_quote(&self, field: &Field<'_>) -> Result<bool> {
        let special = needs_quotes(&field.text, self.options.delimiter);
        Ok(match self.options.quote_policy {
            QuotePolicy::Minimal => special || (field.kind == FieldKind::Text && field.text.is_empty()),
            QuotePolicy::NonNumeric => special || field.kind == FieldKind::Text,
            QuotePolicy::All => true,
            QuotePolicy::Never => {
                if special {
                    return Err(ExportError::InvalidOptions(format!(
                        "field {:?} on line {}, column {:?} needs quoting but the quote policy is Never",
                        field.text, self.line_no, field.column
                    )));
                }
                false
            }
        })
    }
}

fn needs_quotes(text: &str, delimiter: char) -> bool {
    text.chars()
        .any(|c| c == delimiter || c == '"' || c == '\n' || c == '\r')
        || text.starts_with(char::is_whitespace)
        || text.ends_with(char::is_whitespace)
}
