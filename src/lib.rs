//! dataexport - Write tables and in-memory objects to files
//!
//! Exports tabular data to delimited text (CSV/TSV), styled multi-sheet Excel
//! workbooks, and binary object containers that restore bit-for-bit, plus
//! readers that load each format back.

pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod parser;

pub use config::{ExportFormat, ExportOptions, ExportTarget};
pub use error::{ExportError, Result};
pub use export::{
    export_delimited, export_object, export_spreadsheet, ExportDispatcher, ExportReport,
    ExportSource,
};
pub use model::{Namespace, ObjectPayload, Table, Value, Workbook};
pub use parser::{import_delimited, import_object, import_objects, import_spreadsheet};
