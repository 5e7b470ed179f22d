//! Options records for each export format

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ExportError, Result};
use crate::model::CellStyle;

/// Kind of file an export produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    /// CSV/TSV text
    Delimited,
    /// `.xlsx` workbook
    Spreadsheet,
    /// Binary object container
    Object,
}

const DELIMITED_EXTENSIONS: &[&str] = &["csv", "tsv", "txt"];
const OBJECT_EXTENSIONS: &[&str] = &["rds", "rdx", "bin"];

impl ExportFormat {
    /// Extensions an export of this format may be written to
    pub fn write_extensions(self) -> &'static [&'static str] {
        match self {
            ExportFormat::Delimited => DELIMITED_EXTENSIONS,
            ExportFormat::Spreadsheet => &["xlsx"],
            ExportFormat::Object => OBJECT_EXTENSIONS,
        }
    }

    /// Extensions the readers accept; spreadsheets are also read from
    /// workbooks this crate does not write
    pub fn read_extensions(self) -> &'static [&'static str] {
        match self {
            ExportFormat::Spreadsheet => &["xlsx", "xlsm", "xls", "ods"],
            other => other.write_extensions(),
        }
    }

    pub fn writes_extension(self, ext: &str) -> bool {
        has_extension(self.write_extensions(), ext)
    }

    pub fn reads_extension(self, ext: &str) -> bool {
        has_extension(self.read_extensions(), ext)
    }

    /// Format written to files with extension `ext`
    pub fn from_extension(ext: &str) -> Option<Self> {
        [
            ExportFormat::Delimited,
            ExportFormat::Spreadsheet,
            ExportFormat::Object,
        ]
        .into_iter()
        .find(|format| format.writes_extension(ext))
    }

    /// Detect the format from a file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        Self::from_extension(ext).ok_or_else(|| unsupported_extension(ext))
    }

    pub fn name(self) -> &'static str {
        match self {
            ExportFormat::Delimited => "delimited",
            ExportFormat::Spreadsheet => "spreadsheet",
            ExportFormat::Object => "object",
        }
    }
}

fn has_extension(table: &[&str], ext: &str) -> bool {
    table.iter().any(|known| known.eq_ignore_ascii_case(ext))
}

pub(crate) fn unsupported_extension(ext: &str) -> ExportError {
    let ext = if ext.is_empty() {
        "unknown".to_string()
    } else {
        ext.to_lowercase()
    };
    ExportError::InvalidOptions(format!("Unsupported file format: {}", ext))
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "delimited" | "csv" | "tsv" => Ok(ExportFormat::Delimited),
            "spreadsheet" | "xlsx" | "excel" => Ok(ExportFormat::Spreadsheet),
            "object" | "rds" => Ok(ExportFormat::Object),
            _ => Err(format!("Unknown export format: {}", s)),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Delimited text

/// When fields are wrapped in double quotes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotePolicy {
    /// Only fields that need it, plus empty text
    #[default]
    Minimal,
    /// Text fields, header names and row labels
    NonNumeric,
    /// Every field
    All,
    /// No field; fields that would need quotes are rejected
    Never,
}

/// Character encoding of written text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextEncoding {
    #[default]
    Utf8,
    /// ISO-8859-1
    Latin1,
    Ascii,
}

impl TextEncoding {
    pub fn name(self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "UTF-8",
            TextEncoding::Latin1 => "ISO-8859-1",
            TextEncoding::Ascii => "ASCII",
        }
    }

    /// Whether `ch` has a representation in this encoding
    pub fn can_encode(self, ch: char) -> bool {
        match self {
            TextEncoding::Utf8 => true,
            TextEncoding::Latin1 => (ch as u32) <= 0xFF,
            TextEncoding::Ascii => ch.is_ascii(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineTerminator {
    #[default]
    Lf,
    CrLf,
}

impl LineTerminator {
    pub fn as_str(self) -> &'static str {
        match self {
            LineTerminator::Lf => "\n",
            LineTerminator::CrLf => "\r\n",
        }
    }
}

/// Options for delimited text export and import
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelimitedOptions {
    /// Field separator
    pub delimiter: char,
    /// Write (or expect) a line of column names
    pub include_header: bool,
    /// Write (or expect) row labels as a leading column
    pub include_row_labels: bool,
    /// Text standing for a missing value
    pub missing_placeholder: String,
    pub quote_policy: QuotePolicy,
    pub encoding: TextEncoding,
    /// Prefix the file with a UTF-8 byte-order mark
    pub byte_order_mark: bool,
    pub line_terminator: LineTerminator,
}

impl Default for DelimitedOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            include_header: true,
            include_row_labels: true,
            missing_placeholder: String::new(),
            quote_policy: QuotePolicy::Minimal,
            encoding: TextEncoding::Utf8,
            byte_order_mark: false,
            line_terminator: LineTerminator::Lf,
        }
    }
}

impl DelimitedOptions {
    /// Faster variant: no row labels
    pub fn fast() -> Self {
        Self {
            include_row_labels: false,
            ..Default::default()
        }
    }

    /// UTF-8 with byte-order mark so spreadsheet applications detect the encoding
    pub fn excel() -> Self {
        Self {
            byte_order_mark: true,
            ..Default::default()
        }
    }

    /// Tab-separated variant
    pub fn tsv() -> Self {
        Self {
            delimiter: '\t',
            ..Default::default()
        }
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_header(mut self, include: bool) -> Self {
        self.include_header = include;
        self
    }

    pub fn with_row_labels(mut self, include: bool) -> Self {
        self.include_row_labels = include;
        self
    }

    pub fn with_missing_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.missing_placeholder = placeholder.into();
        self
    }

    pub fn with_quote_policy(mut self, policy: QuotePolicy) -> Self {
        self.quote_policy = policy;
        self
    }

    pub fn with_encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_byte_order_mark(mut self, bom: bool) -> Self {
        self.byte_order_mark = bom;
        self
    }

    pub fn with_line_terminator(mut self, terminator: LineTerminator) -> Self {
        self.line_terminator = terminator;
        self
    }

    /// Reject combinations that cannot produce a readable file
    pub fn validate(&self) -> Result<()> {
        if !self.delimiter.is_ascii() || matches!(self.delimiter, '"' | '\n' | '\r') {
            return Err(ExportError::InvalidOptions(format!(
                "delimiter {:?} must be an ASCII character other than a quote or newline",
                self.delimiter
            )));
        }
        if self.byte_order_mark && self.encoding != TextEncoding::Utf8 {
            return Err(ExportError::InvalidOptions(format!(
                "a byte-order mark requires UTF-8, not {}",
                self.encoding.name()
            )));
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////
// Spreadsheet

/// Options for spreadsheet export and import
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpreadsheetOptions {
    pub include_header: bool,
    pub include_row_labels: bool,
    /// Text written for missing values; blank cells when `None`
    pub missing_placeholder: Option<String>,
    pub header_style: CellStyle,
    pub body_style: CellStyle,
    /// Sheet used when a bare table is exported or imported; an empty name
    /// imports the first sheet
    pub sheet_name: String,
    /// Placement used when a bare table is exported
    pub start_row: usize,
    pub start_col: usize,
}

impl Default for SpreadsheetOptions {
    fn default() -> Self {
        Self {
            include_header: true,
            include_row_labels: false,
            missing_placeholder: None,
            header_style: CellStyle::header(),
            body_style: CellStyle::default(),
            sheet_name: "Sheet1".to_string(),
            start_row: 0,
            start_col: 0,
        }
    }
}

impl SpreadsheetOptions {
    pub fn with_header(mut self, include: bool) -> Self {
        self.include_header = include;
        self
    }

    pub fn with_row_labels(mut self, include: bool) -> Self {
        self.include_row_labels = include;
        self
    }

    pub fn with_missing_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.missing_placeholder = Some(placeholder.into());
        self
    }

    pub fn with_header_style(mut self, style: CellStyle) -> Self {
        self.header_style = style;
        self
    }

    pub fn with_body_style(mut self, style: CellStyle) -> Self {
        self.body_style = style;
        self
    }

    pub fn with_sheet_name(mut self, name: impl Into<String>) -> Self {
        self.sheet_name = name.into();
        self
    }

    pub fn with_start(mut self, row: usize, col: usize) -> Self {
        self.start_row = row;
        self.start_col = col;
        self
    }
}

////////////////////////////////////////////////////////////////////////////////
// Object container

/// Whether binding names are stored with the values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameMode {
    /// Single value; the restoring caller picks the name
    #[default]
    Discard,
    /// Named values restored under their original names
    Preserve,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectOptions {
    pub mode: NameMode,
    /// Gzip the payload
    pub compress: bool,
}

impl Default for ObjectOptions {
    fn default() -> Self {
        Self {
            mode: NameMode::Discard,
            compress: true,
        }
    }
}

impl ObjectOptions {
    pub fn preserve_names() -> Self {
        Self {
            mode: NameMode::Preserve,
            ..Default::default()
        }
    }

    pub fn with_mode(mut self, mode: NameMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }
}

////////////////////////////////////////////////////////////////////////////////
// Targets

/// Per-call options for every format
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    pub delimited: DelimitedOptions,
    pub spreadsheet: SpreadsheetOptions,
    pub object: ObjectOptions,
}

impl ExportOptions {
    /// Load options from JSON; absent fields keep their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| ExportError::InvalidOptions(format!("options JSON: {}", e)))
    }

    pub fn with_delimited(mut self, options: DelimitedOptions) -> Self {
        self.delimited = options;
        self
    }

    pub fn with_spreadsheet(mut self, options: SpreadsheetOptions) -> Self {
        self.spreadsheet = options;
        self
    }

    pub fn with_object(mut self, options: ObjectOptions) -> Self {
        self.object = options;
        self
    }
}

/// Where and how an export is written
#[derive(Debug, Clone, PartialEq)]
pub struct ExportTarget {
    pub path: PathBuf,
    pub format: ExportFormat,
    pub options: ExportOptions,
}

impl ExportTarget {
    pub fn new(path: impl Into<PathBuf>, format: ExportFormat) -> Self {
        Self {
            path: path.into(),
            format,
            options: ExportOptions::default(),
        }
    }

    /// Target whose format is taken from the path extension
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let format = ExportFormat::from_path(&path)?;
        Ok(Self::new(path, format))
    }

    pub fn with_options(mut self, options: ExportOptions) -> Self {
        self.options = options;
        self
    }
}
