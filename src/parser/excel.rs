//! Spreadsheet reader (xlsx, xls, ods)

use std::borrow::Cow;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader};
use tracing::debug;

use crate::config::{ExportFormat, ExportOptions, SpreadsheetOptions};
use crate::error::{ExportError, Result};
use crate::model::{CellType, CellValue, Table};

use super::csv::is_sequence;
use super::Parser;

/// Parser for spreadsheet files
pub struct SpreadsheetParser;

impl Parser for SpreadsheetParser {
    fn format(&self) -> ExportFormat {
        ExportFormat::Spreadsheet
    }

    fn parse(&self, path: &Path, options: &ExportOptions) -> Result<Table> {
        import_spreadsheet(path, &options.spreadsheet)
    }
}

/// Read the table of one sheet back from a workbook.
///
/// The sheet is `options.sheet_name`, or the first sheet when the name is
/// empty. The table's top-left cell is (`start_row`, `start_col`); it ends at
/// the first blank header cell and at the last row of the sheet with a value
/// in the table's columns.
pub fn import_spreadsheet(path: impl AsRef<Path>, options: &SpreadsheetOptions) -> Result<Table> {
    let path = path.as_ref();
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| ExportError::Workbook(format!("{}: {}", path.display(), e)))?;

    let sheets = workbook.sheet_names();
    let sheet_name = if options.sheet_name.is_empty() {
        sheets
            .first()
            .cloned()
            .ok_or_else(|| ExportError::Workbook("No sheets found in workbook".into()))?
    } else if sheets.iter().any(|s| *s == options.sheet_name) {
        options.sheet_name.clone()
    } else {
        return Err(ExportError::Workbook(format!(
            "sheet {:?} not found; workbook has {:?}",
            options.sheet_name, sheets
        )));
    };

    let range: Range<Data> = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| ExportError::Workbook(format!("Failed to read sheet {}: {}", sheet_name, e)))?;

    parse_range(&range, options)
}

fn parse_range(range: &Range<Data>, options: &SpreadsheetOptions) -> Result<Table> {
    let label_col = options.start_col;
    let data_col = label_col + usize::from(options.include_row_labels);
    let mut row = options.start_row;
    let names: Vec<String> = if options.include_header {
        let names = (data_col..)
            .map(|col| cell_at(range, row, col))
            .take_while(|data| !is_blank(data))
            .map(cell_to_string)
            .collect();
        row += 1;
        names
    } else {
        let width = (data_col..).take_while(|col| !is_blank(cell_at(range, row, *col))).count();
        (1..=width).map(|i| format!("V{}", i)).collect()
    };
    let width = names.len();
    let last_col = data_col + width;

    // Blank rows inside the table are all-missing rows; trailing ones are not data
    let used_end = range.end().map_or(0, |(last, _)| last as usize + 1);
    let is_blank_row = |r: usize| (label_col..last_col).all(|col| is_blank(cell_at(range, r, col)));
    let end = (row..used_end)
        .rev()
        .find(|r| !is_blank_row(*r))
        .map_or(row, |r| r + 1);

    let mut labels = Vec::new();
    let mut fields: Vec<Vec<CellValue>> = vec![Vec::new(); width];
    for r in row..end {
        if options.include_row_labels {
            labels.push(cell_to_string(cell_at(range, r, label_col)));
        }
        for (offset, values) in fields.iter_mut().enumerate() {
            values.push(convert_cell(cell_at(range, r, data_col + offset), options));
        }
    }
    debug!(rows = end - row, columns = width, "parsed worksheet");

    let columns: Vec<(String, Vec<CellValue>)> = names
        .into_iter()
        .zip(fields)
        .map(|(name, values)| (name, unify_column(values)))
        .collect();

    let table = Table::from_columns(columns)?;
    if options.include_row_labels && !is_sequence(&labels) {
        return table.with_row_labels(labels);
    }
    Ok(table)
}

static EMPTY: Data = Data::Empty;

/// Cell at an absolute sheet position; blank outside the used range
fn cell_at(range: &Range<Data>, row: usize, col: usize) -> &Data {
    match (u32::try_from(row), u32::try_from(col)) {
        (Ok(row), Ok(col)) => range.get_value((row, col)).unwrap_or(&EMPTY),
        _ => &EMPTY,
    }
}

fn is_blank(data: &Data) -> bool {
    match data {
        Data::Empty => true,
        Data::String(s) => s.is_empty(),
        _ => false,
    }
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => format!("{}", dt),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("#{:?}", e),
    }
}

fn convert_cell(cell: &Data, options: &SpreadsheetOptions) -> CellValue {
    match cell {
        Data::Empty => CellValue::Null,
        Data::String(s) if Some(s.as_str()) == options.missing_placeholder.as_deref() => {
            CellValue::Null
        }
        Data::String(s) => CellValue::String(Cow::Owned(s.clone())),
        Data::Float(f) => {
            // Check if it's actually an integer
            if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                CellValue::Int(*f as i64)
            } else {
                CellValue::Float(*f)
            }
        }
        Data::Int(i) => CellValue::Int(*i),
        Data::Bool(b) => CellValue::Bool(*b),
        other => CellValue::String(Cow::Owned(cell_to_string(other))),
    }
}

/// Give a column one type: non-finite reals stored as text rejoin numeric
/// columns, anything else that does not fit becomes text
fn unify_column(values: Vec<CellValue>) -> Vec<CellValue> {
    let numeric_text = |s: &str| matches!(s, "NaN" | "Inf" | "-Inf");
    let has_number = values.iter().any(|v| v.cell_type().is_numeric());

    let values: Vec<CellValue> = values
        .into_iter()
        .map(|v| match v {
            CellValue::String(s) if has_number && numeric_text(&s) => CellValue::Float(match &*s {
                "NaN" => f64::NAN,
                "Inf" => f64::INFINITY,
                _ => f64::NEG_INFINITY,
            }),
            v => v,
        })
        .collect();

    let cell_type = values
        .iter()
        .fold(CellType::Null, |acc, v| acc.widen(v.cell_type()));
    if cell_type != CellType::Mixed {
        return values;
    }

    values
        .into_iter()
        .map(|v| match v {
            CellValue::Null | CellValue::String(_) => v,
            v => CellValue::String(Cow::Owned(v.display().into_owned())),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_cell() {
        let options = SpreadsheetOptions::default().with_missing_placeholder("-");
        assert_eq!(convert_cell(&Data::Float(3.0), &options), CellValue::Int(3));
        assert!(matches!(convert_cell(&Data::Float(2.5), &options), CellValue::Float(_)));
        assert!(convert_cell(&Data::String("-".into()), &options).is_null());
        assert!(convert_cell(&Data::Empty, &options).is_null());
    }

    #[test]
    fn test_unify_column_restores_non_finite() {
        let values = unify_column(vec![CellValue::Float(1.5), "NaN".into(), "-Inf".into()]);
        assert!(matches!(values[1], CellValue::Float(f) if f.is_nan()));
        assert_eq!(values[2], CellValue::Float(f64::NEG_INFINITY));

        let text = unify_column(vec!["NaN".into(), "x".into()]);
        assert_eq!(text[0], CellValue::from("NaN"));
    }

    #[test]
    fn test_unify_column_mixed_becomes_text() {
        let values = unify_column(vec![CellValue::Int(1), "x".into(), CellValue::Null]);
        assert_eq!(values[0], CellValue::from("1"));
        assert!(values[2].is_null());
    }

    #[test]
    fn test_blank_rows_inside_table_are_kept() {
        let mut range: Range<Data> = Range::new((0, 0), (5, 2));
        range.set_value((0, 0), Data::String("a".into()));
        range.set_value((0, 1), Data::String("b".into()));
        range.set_value((1, 0), Data::Float(1.0));
        range.set_value((1, 1), Data::String("x".into()));
        range.set_value((3, 0), Data::Float(3.0));
        range.set_value((3, 1), Data::String("z".into()));
        // Outside the table's columns
        range.set_value((5, 2), Data::String("note".into()));

        let table = parse_range(&range, &SpreadsheetOptions::default()).unwrap();
        assert_eq!(table.row_count(), 3);
        assert!(table.cell(1, 0).unwrap().is_null());
        assert!(table.cell(1, 1).unwrap().is_null());
        assert_eq!(table.cell(2, 0), Some(&CellValue::Int(3)));
        assert_eq!(table.columns[0].cell_type, CellType::Int);
    }

    #[test]
    fn test_parse_range_at_offset() {
        let mut range: Range<Data> = Range::new((0, 0), (4, 2));
        range.set_value((0, 0), Data::String("Title".into()));
        range.set_value((2, 1), Data::String("a".into()));
        range.set_value((2, 2), Data::String("b".into()));
        range.set_value((3, 1), Data::Float(1.0));
        range.set_value((3, 2), Data::String("x".into()));
        range.set_value((4, 1), Data::Float(2.0));

        let options = SpreadsheetOptions::default().with_start(2, 1);
        let table = parse_range(&range, &options).unwrap();
        assert_eq!(table.column_names(), vec!["a", "b"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.cell(1, 0), Some(&CellValue::Int(2)));
        assert!(table.cell(1, 1).unwrap().is_null());
    }
}
