//! Readers that restore exported files

mod csv;
mod excel;
mod object;

use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::debug;

use crate::config::{unsupported_extension, ExportFormat, ExportOptions};
use crate::error::{ExportError, Result};
use crate::export::CONTAINER_MAGIC;
use crate::model::Table;

pub use self::csv::{import_delimited, DelimitedParser};
pub use self::excel::{import_spreadsheet, SpreadsheetParser};
pub use self::object::{import_object, import_objects, ObjectParser};

/// Trait for reading a table back from a file
pub trait Parser: Send + Sync {
    /// Format this parser reads
    fn format(&self) -> ExportFormat;

    /// Parse a file and return a Table
    fn parse(&self, path: &Path, options: &ExportOptions) -> Result<Table>;

    /// Check if this parser can handle the given file extension
    fn supports_extension(&self, ext: &str) -> bool {
        self.format().reads_extension(ext)
    }
}

/// Factory for choosing a parser based on file extension or content
pub struct ParserFactory {
    parsers: Vec<Box<dyn Parser>>,
}

impl Default for ParserFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserFactory {
    /// Create a new parser factory with all supported parsers
    pub fn new() -> Self {
        Self {
            parsers: vec![
                Box::new(DelimitedParser),
                Box::new(SpreadsheetParser),
                Box::new(ObjectParser),
            ],
        }
    }

    /// Get a parser for the given file path.
    ///
    /// Files without a known extension are sniffed by content.
    pub fn get_parser(&self, path: &Path) -> Result<&dyn Parser> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        if let Some(parser) = self.parsers.iter().find(|p| p.supports_extension(ext)) {
            return Ok(parser.as_ref());
        }

        let format = detect_format(path).ok_or_else(|| unsupported_extension(ext))?;
        debug!(path = %path.display(), format = %format, "format detected from content");
        self.parsers
            .iter()
            .find(|p| p.format() == format)
            .map(|p| p.as_ref())
            .ok_or_else(|| ExportError::InvalidOptions(format!("no parser for {}", format)))
    }

    /// Parse a file using the appropriate parser
    pub fn parse(&self, path: &Path, options: &ExportOptions) -> Result<Table> {
        let parser = self.get_parser(path)?;
        parser.parse(path, options)
    }
}

/// Detect file format from content (for files without extension)
pub fn detect_format(path: &Path) -> Option<ExportFormat> {
    let mut file = File::open(path).ok()?;
    let mut buffer = [0u8; 4];
    let bytes_read = file.read(&mut buffer).ok()?;

    if bytes_read < 4 {
        return Some(ExportFormat::Delimited);
    }

    // xlsx is a ZIP archive
    if &buffer == b"PK\x03\x04" {
        return Some(ExportFormat::Spreadsheet);
    }

    if &buffer == CONTAINER_MAGIC {
        return Some(ExportFormat::Object);
    }

    Some(ExportFormat::Delimited)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_get_parser_by_extension() {
        let factory = ParserFactory::new();
        let parser = factory.get_parser(Path::new("a.tsv")).unwrap();
        assert_eq!(parser.format(), ExportFormat::Delimited);
        let parser = factory.get_parser(Path::new("a.xlsx")).unwrap();
        assert_eq!(parser.format(), ExportFormat::Spreadsheet);
        let parser = factory.get_parser(Path::new("a.rds")).unwrap();
        assert_eq!(parser.format(), ExportFormat::Object);
        let parser = factory.get_parser(Path::new("legacy.XLS")).unwrap();
        assert_eq!(parser.format(), ExportFormat::Spreadsheet);
    }

    #[test]
    fn test_detect_format_from_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot");
        let mut file = File::create(&path).unwrap();
        file.write_all(b"DXOB\x01\x00\x00null").unwrap();
        drop(file);

        assert_eq!(detect_format(&path), Some(ExportFormat::Object));
        let factory = ParserFactory::new();
        let parser = factory.get_parser(&path).unwrap();
        assert_eq!(parser.format(), ExportFormat::Object);

        assert_eq!(detect_format(&dir.path().join("missing")), None);
    }
}
