//! Error types for export and restore operations

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExportError>;

#[derive(Error, Debug)]
pub enum ExportError {
    /// Destination cannot be created (missing parent directory, permissions)
    #[error("Cannot write to {}: {source}", .path.display())]
    Path {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A value has no representation in the requested text encoding
    #[error("Character {ch:?} on line {line}, column {column:?} is not representable in {encoding}")]
    Encoding {
        encoding: &'static str,
        /// 1-based line of the output file
        line: usize,
        column: String,
        ch: char,
    },

    #[error("Sheet name {name:?} is used more than once")]
    SheetNameCollision { name: String },

    #[error("Style target {range} on sheet {sheet:?} lies outside the table extent {extent}")]
    StyleTarget {
        sheet: String,
        range: String,
        extent: String,
    },

    /// A value holds a resource the object container cannot represent
    #[error("Cannot serialize value at {path}: {reason}")]
    Serialization { path: String, reason: String },

    #[error("Invalid table: {0}")]
    InvalidTable(String),

    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("Workbook read error: {0}")]
    Workbook(String),

    #[error("Malformed object container: {0}")]
    Deserialization(String),

    #[error("Object container holds {found} data, expected {expected}")]
    ContainerMode {
        expected: &'static str,
        found: &'static str,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl ExportError {
    pub(crate) fn path(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ExportError::Path {
            path: path.into(),
            source,
        }
    }
}

impl From<rust_xlsxwriter::XlsxError> for ExportError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        ExportError::Spreadsheet(err.to_string())
    }
}
