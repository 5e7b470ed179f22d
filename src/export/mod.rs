//! Export layer: one exporter per output format and the dispatcher that routes to them

mod delimited;
mod object;
mod spreadsheet;

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::{unsupported_extension, ExportFormat, ExportTarget};
use crate::error::{ExportError, Result};
use crate::model::{ObjectPayload, SheetSpec, Table, Value, Workbook};

pub use self::delimited::{export_delimited, format_float, write_delimited, DelimitedExporter};
pub use self::object::{export_object, ObjectExporter, CONTAINER_MAGIC, CONTAINER_VERSION};
pub(crate) use self::object::{ContainerHeader, ContainerKind};
pub use self::spreadsheet::{export_spreadsheet, sanitize_sheet_name, SpreadsheetExporter};

/// What an export call writes
#[derive(Debug, Clone, Copy)]
pub enum ExportSource<'a> {
    Table(&'a Table),
    Workbook(&'a Workbook),
    Object(&'a ObjectPayload),
}

impl ExportSource<'_> {
    fn kind(&self) -> &'static str {
        match self {
            ExportSource::Table(_) => "table",
            ExportSource::Workbook(_) => "workbook",
            ExportSource::Object(_) => "object",
        }
    }
}

/// Summary of one completed export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub path: PathBuf,
    pub format: ExportFormat,
    /// Size of the written file
    pub bytes_written: u64,
    /// Data rows written, summed over sheets
    pub rows_written: usize,
    /// Worksheet names as written, for spreadsheets
    pub sheets: Vec<String>,
    /// Non-fatal adjustments made while writing
    pub warnings: Vec<String>,
}

impl ExportReport {
    pub(crate) fn new(path: &Path, format: ExportFormat) -> Self {
        Self {
            path: path.to_path_buf(),
            format,
            bytes_written: 0,
            rows_written: 0,
            sheets: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Add a warning message
    pub fn warn(&mut self, msg: impl AsRef<str>) {
        self.warnings.push(msg.as_ref().to_string());
    }

    /// Record the final file size and log completion
    pub(crate) fn finish(mut self) -> Result<Self> {
        self.bytes_written = std::fs::metadata(&self.path)?.len();
        info!(
            path = %self.path.display(),
            format = %self.format,
            bytes = self.bytes_written,
            rows = self.rows_written,
            "export complete"
        );
        Ok(self)
    }
}

/// Trait for writing one output format
pub trait Exporter: Send + Sync {
    /// Format this exporter produces
    fn format(&self) -> ExportFormat;

    /// Write `source` to the target path
    fn export(&self, source: ExportSource<'_>, target: &ExportTarget) -> Result<ExportReport>;

    /// Check if this exporter writes files with the given extension
    fn supports_extension(&self, ext: &str) -> bool {
        self.format().writes_extension(ext)
    }
}

/// Routes export requests to the exporter for the target's format
pub struct ExportDispatcher {
    exporters: Vec<Box<dyn Exporter>>,
}

impl Default for ExportDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ExportDispatcher {
    /// Create a dispatcher with all supported exporters
    pub fn new() -> Self {
        Self {
            exporters: vec![
                Box::new(DelimitedExporter),
                Box::new(SpreadsheetExporter),
                Box::new(ObjectExporter),
            ],
        }
    }

    /// Get the exporter for a format
    pub fn get_exporter(&self, format: ExportFormat) -> Result<&dyn Exporter> {
        self.exporters
            .iter()
            .find(|e| e.format() == format)
            .map(|e| e.as_ref())
            .ok_or_else(|| ExportError::InvalidOptions(format!("no exporter for {}", format)))
    }

    /// Detect the output format from the path extension
    pub fn detect_format(&self, path: &Path) -> Result<ExportFormat> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        self.exporters
            .iter()
            .find(|e| e.supports_extension(ext))
            .map(|e| e.format())
            .ok_or_else(|| unsupported_extension(ext))
    }

    /// Export using the format and options of `target`
    pub fn export(&self, source: ExportSource<'_>, target: &ExportTarget) -> Result<ExportReport> {
        debug!(
            source = source.kind(),
            format = %target.format,
            path = %target.path.display(),
            "dispatching export"
        );
        self.get_exporter(target.format)?.export(source, target)
    }

    /// Export to `path`, choosing the format from its extension
    pub fn export_to_path(&self, source: ExportSource<'_>, path: &Path) -> Result<ExportReport> {
        let target = ExportTarget::new(path, self.detect_format(path)?);
        self.export(source, &target)
    }
}

fn unsupported(source: ExportSource<'_>, format: ExportFormat) -> ExportError {
    ExportError::InvalidOptions(format!(
        "a {} cannot be exported as {}",
        source.kind(),
        format
    ))
}

/// Table carried by an object payload, if it holds exactly one
fn payload_table(payload: &ObjectPayload) -> Option<&Table> {
    match payload {
        ObjectPayload::Single { value, .. } => value.as_table(),
        ObjectPayload::Named(map) if map.len() == 1 => map.values().next().and_then(Value::as_table),
        ObjectPayload::Named(_) => None,
    }
}

/// One-sheet workbook used when a bare table goes to a spreadsheet
fn single_sheet_workbook(table: &Table, target: &ExportTarget) -> Workbook {
    let options = &target.options.spreadsheet;
    Workbook::new().with_sheet(
        SheetSpec::new(options.sheet_name.clone(), table.clone())
            .at(options.start_row, options.start_col),
    )
}

/// Fail early when the destination's parent directory is missing
pub(crate) fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.is_dir() => {
            Err(ExportError::path(
                path,
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("parent directory {} does not exist", parent.display()),
                ),
            ))
        }
        _ => Ok(()),
    }
}

/// Create (or truncate) the destination file
pub(crate) fn create_output(path: &Path) -> Result<BufWriter<File>> {
    ensure_parent(path)?;
    let file = File::create(path).map_err(|e| ExportError::path(path, e))?;
    Ok(BufWriter::new(file))
}
