//! Table, Row, and Cell data structures

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use super::schema::{CellType, Column};
use crate::error::{ExportError, Result};

/// A cell value with type information
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(#[serde(with = "super::float_bits")] f64),
    String(Cow<'static, str>),
}

impl PartialEq for CellValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CellValue::Null, CellValue::Null) => true,
            (CellValue::Bool(a), CellValue::Bool(b)) => a == b,
            (CellValue::Int(a), CellValue::Int(b)) => a == b,
            (CellValue::Float(a), CellValue::Float(b)) => {
                // Handle NaN comparison
                if a.is_nan() && b.is_nan() {
                    true
                } else {
                    a == b
                }
            }
            (CellValue::String(a), CellValue::String(b)) => a == b,
            // Cross-type numeric comparison
            (CellValue::Int(a), CellValue::Float(b)) => (*a as f64) == *b,
            (CellValue::Float(a), CellValue::Int(b)) => *a == (*b as f64),
            _ => false,
        }
    }
}

impl CellValue {
    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Type of this single value
    pub fn cell_type(&self) -> CellType {
        match self {
            CellValue::Null => CellType::Null,
            CellValue::Bool(_) => CellType::Bool,
            CellValue::Int(_) => CellType::Int,
            CellValue::Float(_) => CellType::Float,
            CellValue::String(_) => CellType::String,
        }
    }

    /// Convert to a display string
    pub fn display(&self) -> Cow<'_, str> {
        match self {
            CellValue::Null => Cow::Borrowed("NA"),
            CellValue::Bool(b) => Cow::Owned(b.to_string()),
            CellValue::Int(i) => Cow::Owned(i.to_string()),
            CellValue::Float(f) => Cow::Owned(f.to_string()),
            CellValue::String(s) => Cow::Borrowed(s.as_ref()),
        }
    }

    /// Numeric view of the value, if any
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Int(i) => Some(*i as f64),
            CellValue::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::String(Cow::Owned(s.to_string()))
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::String(Cow::Owned(s))
    }
}

impl From<i64> for CellValue {
    fn from(i: i64) -> Self {
        CellValue::Int(i)
    }
}

impl From<i32> for CellValue {
    fn from(i: i32) -> Self {
        CellValue::Int(i64::from(i))
    }
}

impl From<f64> for CellValue {
    fn from(f: f64) -> Self {
        CellValue::Float(f)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

impl<T> From<Option<T>> for CellValue
where
    T: Into<CellValue>,
{
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => CellValue::Null,
        }
    }
}

/// A row in the table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// Cell values in column order
    pub cells: Vec<CellValue>,
}

impl Row {
    pub fn new(cells: Vec<CellValue>) -> Self {
        Self { cells }
    }

    /// Get a cell value by column index
    pub fn get(&self, index: usize) -> Option<&CellValue> {
        self.cells.get(index)
    }
}

/// A rectangular table of named, homogeneous columns with optional row labels
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Table {
    /// Column definitions
    pub columns: Vec<Column>,
    /// All rows in the table
    pub rows: Vec<Row>,
    /// One label per row, when present
    pub row_labels: Option<Vec<String>>,
}

/// Tables compare by content: names, labels and cell values.
/// Column types are derived from the cells and do not take part.
impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.column_names() == other.column_names()
            && self.row_labels == other.row_labels
            && self.rows == other.rows
    }
}

impl Table {
    /// Create a new empty table with column definitions
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            row_labels: None,
        }
    }

    /// Build a table from named columns of equal length.
    ///
    /// Integer values in a column that also holds reals are stored as reals.
    pub fn from_columns<N>(columns: Vec<(N, Vec<CellValue>)>) -> Result<Self>
    where
        N: Into<String>,
    {
        let height = columns.first().map(|(_, values)| values.len()).unwrap_or(0);
        let mut defs = Vec::with_capacity(columns.len());
        let mut data = Vec::with_capacity(columns.len());

        for (index, (name, values)) in columns.into_iter().enumerate() {
            let name = name.into();
            if values.len() != height {
                return Err(ExportError::InvalidTable(format!(
                    "column {:?} has {} values, expected {}",
                    name,
                    values.len(),
                    height
                )));
            }
            let cell_type = infer_type(&name, &values)?;
            defs.push(Column::with_type(name, index, cell_type));
            data.push(values);
        }

        let mut rows = vec![Vec::with_capacity(defs.len()); height];
        for (col_idx, values) in data.into_iter().enumerate() {
            let cell_type = defs[col_idx].cell_type;
            for (row, value) in rows.iter_mut().zip(values) {
                row.push(normalize(value, cell_type));
            }
        }

        Ok(Self {
            columns: defs,
            rows: rows.into_iter().map(Row::new).collect(),
            row_labels: None,
        })
    }

    /// Attach row labels, one per row
    pub fn with_row_labels<S>(mut self, labels: Vec<S>) -> Result<Self>
    where
        S: Into<String>,
    {
        if labels.len() != self.row_count() {
            return Err(ExportError::InvalidTable(format!(
                "{} row labels given for {} rows",
                labels.len(),
                self.row_count()
            )));
        }
        self.row_labels = Some(labels.into_iter().map(Into::into).collect());
        Ok(self)
    }

    /// Add an unlabeled row to the table
    pub fn add_row(&mut self, cells: Vec<CellValue>) -> Result<()> {
        if self.row_labels.is_some() {
            return Err(ExportError::InvalidTable(
                "table has row labels; use add_labeled_row".to_string(),
            ));
        }
        self.push_row(cells)
    }

    /// Add a row together with its label
    pub fn add_labeled_row(&mut self, label: impl Into<String>, cells: Vec<CellValue>) -> Result<()> {
        if self.row_labels.is_none() && !self.rows.is_empty() {
            return Err(ExportError::InvalidTable(
                "table rows are unlabeled; use add_row".to_string(),
            ));
        }
        self.push_row(cells)?;
        self.row_labels.get_or_insert_with(Vec::new).push(label.into());
        Ok(())
    }

    fn push_row(&mut self, mut cells: Vec<CellValue>) -> Result<()> {
        if cells.len() != self.column_count() {
            return Err(ExportError::InvalidTable(format!(
                "row has {} cells, table has {} columns",
                cells.len(),
                self.column_count()
            )));
        }

        let mut widened = Vec::with_capacity(cells.len());
        for (column, cell) in self.columns.iter().zip(&cells) {
            let cell_type = column.cell_type.widen(cell.cell_type());
            if cell_type == CellType::Mixed {
                return Err(mixed_column_error(&column.name, column.cell_type, cell.cell_type()));
            }
            widened.push(cell_type);
        }

        for (idx, cell_type) in widened.into_iter().enumerate() {
            if cell_type == CellType::Float && self.columns[idx].cell_type == CellType::Int {
                for row in &mut self.rows {
                    let value = std::mem::replace(&mut row.cells[idx], CellValue::Null);
                    row.cells[idx] = normalize(value, CellType::Float);
                }
            }
            self.columns[idx].cell_type = cell_type;
            let value = std::mem::replace(&mut cells[idx], CellValue::Null);
            cells[idx] = normalize(value, cell_type);
        }

        self.rows.push(Row::new(cells));
        Ok(())
    }

    /// Get column index by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Get column by name
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Column names in order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Values of one column, top to bottom
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &CellValue> + '_ {
        self.rows.iter().filter_map(move |row| row.get(index))
    }

    /// Cell at a zero-based row and column
    pub fn cell(&self, row: usize, col: usize) -> Option<&CellValue> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// Number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn infer_type(name: &str, values: &[CellValue]) -> Result<CellType> {
    let mut inferred = CellType::Null;
    for value in values {
        let next = inferred.widen(value.cell_type());
        if next == CellType::Mixed {
            return Err(mixed_column_error(name, inferred, value.cell_type()));
        }
        inferred = next;
    }
    Ok(inferred)
}

fn normalize(value: CellValue, cell_type: CellType) -> CellValue {
    match (value, cell_type) {
        (CellValue::Int(i), CellType::Float) => CellValue::Float(i as f64),
        (value, _) => value,
    }
}

fn mixed_column_error(name: &str, have: CellType, got: CellType) -> ExportError {
    ExportError::InvalidTable(format!(
        "column {:?} holds {} values and cannot take a {} value",
        name, have, got
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::from_columns(vec![
            ("var1", vec![10.into(), 25.into(), 8.into()]),
            ("var2", vec!["beer".into(), "wine".into(), "cheese".into()]),
            ("var3", vec![true.into(), true.into(), false.into()]),
        ])
        .unwrap()
    }

    #[test]
    fn test_from_columns_infers_types() {
        let table = sample();
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.column_count(), 3);
        assert_eq!(table.columns[0].cell_type, CellType::Int);
        assert_eq!(table.columns[1].cell_type, CellType::String);
        assert_eq!(table.columns[2].cell_type, CellType::Bool);
        assert_eq!(table.cell(1, 1), Some(&CellValue::from("wine")));
    }

    #[test]
    fn test_ragged_columns_rejected() {
        let err = Table::from_columns(vec![
            ("a", vec![1.into(), 2.into()]),
            ("b", vec![1.into()]),
        ])
        .unwrap_err();
        assert!(matches!(err, ExportError::InvalidTable(_)));
    }

    #[test]
    fn test_mixed_column_rejected() {
        let err = Table::from_columns(vec![("a", vec![1.into(), "x".into()])]).unwrap_err();
        assert!(matches!(err, ExportError::InvalidTable(_)));
    }

    #[test]
    fn test_int_widens_to_float() {
        let table = Table::from_columns(vec![("a", vec![1.into(), 2.5.into(), CellValue::Null])])
            .unwrap();
        assert_eq!(table.columns[0].cell_type, CellType::Float);
        assert!(matches!(table.cell(0, 0), Some(CellValue::Float(f)) if *f == 1.0));
        assert!(table.cell(2, 0).unwrap().is_null());
    }

    #[test]
    fn test_row_labels_length_checked() {
        assert!(sample().with_row_labels(vec!["a", "b"]).is_err());
        let table = sample()
            .with_row_labels(vec!["billy", "bob", "thornton"])
            .unwrap();
        assert_eq!(table.row_labels.as_ref().unwrap()[2], "thornton");
    }

    #[test]
    fn test_add_row_widens_existing_cells() {
        let mut table = Table::new(vec![Column::new("x", 0)]);
        table.add_row(vec![1.into()]).unwrap();
        table.add_row(vec![0.5.into()]).unwrap();
        assert_eq!(table.columns[0].cell_type, CellType::Float);
        assert!(matches!(table.cell(0, 0), Some(CellValue::Float(_))));
        assert!(table.add_row(vec!["text".into()]).is_err());
        assert!(table.add_row(vec![]).is_err());
    }

    #[test]
    fn test_labeled_rows() {
        let mut table = Table::new(vec![Column::new("x", 0)]);
        table.add_labeled_row("first", vec![1.into()]).unwrap();
        assert!(table.add_row(vec![2.into()]).is_err());
        assert_eq!(table.row_labels, Some(vec!["first".to_string()]));
    }

    #[test]
    fn test_nan_cells_compare_equal() {
        assert_eq!(CellValue::Float(f64::NAN), CellValue::Float(f64::NAN));
        assert_eq!(CellValue::Int(3), CellValue::Float(3.0));
    }
}
