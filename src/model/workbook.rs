//! Spreadsheet workbook layout: sheets, placement, styling and decorations

use serde::{Deserialize, Serialize};

use super::table::Table;
use crate::error::{ExportError, Result};

////////////////////////////////////////////////////////////////////////////////
// Cell styles

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HorizontalAlign {
    General,
    Left,
    Center,
    Right,
    Fill,
    Justify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerticalAlign {
    Top,
    Center,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BorderPosition {
    Top,
    Bottom,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BorderWeight {
    #[default]
    Thin,
    Medium,
    Thick,
    Dashed,
    Dotted,
    Double,
    Hair,
}

/// Border lines drawn on some sides of a cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Border {
    pub positions: Vec<BorderPosition>,
    pub weight: BorderWeight,
    pub color: Option<String>,
}

impl Border {
    /// Border on all four sides
    pub fn all(weight: BorderWeight) -> Self {
        Self {
            positions: vec![
                BorderPosition::Top,
                BorderPosition::Bottom,
                BorderPosition::Left,
                BorderPosition::Right,
            ],
            weight,
            color: None,
        }
    }

    pub fn sides(positions: Vec<BorderPosition>, weight: BorderWeight) -> Self {
        Self {
            positions,
            weight,
            color: None,
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }
}

/// Visual attributes applied to cells. Unset fields inherit from the style
/// underneath when styles are merged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CellStyle {
    pub font_name: Option<String>,
    /// Font size in points
    pub font_size: Option<f64>,
    /// `#RRGGBB` or a basic color name
    pub font_color: Option<String>,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub underline: Option<bool>,
    pub align: Option<HorizontalAlign>,
    pub valign: Option<VerticalAlign>,
    pub border: Option<Border>,
    pub text_wrap: Option<bool>,
    /// Number format code, e.g. `0.00`
    pub num_format: Option<String>,
    pub bg_color: Option<String>,
}

impl CellStyle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge two styles; set fields of `other` win
    pub fn merge(&self, other: &CellStyle) -> CellStyle {
        CellStyle {
            font_name: other.font_name.clone().or_else(|| self.font_name.clone()),
            font_size: other.font_size.or(self.font_size),
            font_color: other.font_color.clone().or_else(|| self.font_color.clone()),
            bold: other.bold.or(self.bold),
            italic: other.italic.or(self.italic),
            underline: other.underline.or(self.underline),
            align: other.align.or(self.align),
            valign: other.valign.or(self.valign),
            border: other.border.clone().or_else(|| self.border.clone()),
            text_wrap: other.text_wrap.or(self.text_wrap),
            num_format: other.num_format.clone().or_else(|| self.num_format.clone()),
            bg_color: other.bg_color.clone().or_else(|| self.bg_color.clone()),
        }
    }

    pub fn bold(mut self) -> Self {
        self.bold = Some(true);
        self
    }

    pub fn italic(mut self) -> Self {
        self.italic = Some(true);
        self
    }

    pub fn underline(mut self) -> Self {
        self.underline = Some(true);
        self
    }

    pub fn font_size(mut self, size: f64) -> Self {
        self.font_size = Some(size);
        self
    }

    pub fn font_color(mut self, color: impl Into<String>) -> Self {
        self.font_color = Some(color.into());
        self
    }

    pub fn font_name(mut self, name: impl Into<String>) -> Self {
        self.font_name = Some(name.into());
        self
    }

    pub fn align(mut self, align: HorizontalAlign) -> Self {
        self.align = Some(align);
        self
    }

    pub fn valign(mut self, valign: VerticalAlign) -> Self {
        self.valign = Some(valign);
        self
    }

    pub fn border(mut self, border: Border) -> Self {
        self.border = Some(border);
        self
    }

    pub fn text_wrap(mut self) -> Self {
        self.text_wrap = Some(true);
        self
    }

    pub fn num_format(mut self, code: impl Into<String>) -> Self {
        self.num_format = Some(code.into());
        self
    }

    pub fn bg_color(mut self, color: impl Into<String>) -> Self {
        self.bg_color = Some(color.into());
        self
    }

    /// Default header row style
    pub fn header() -> Self {
        CellStyle::new().bold()
    }

    /// Default style for title decorations
    pub fn title() -> Self {
        CellStyle::new().bold().font_size(16.0)
    }

    /// Default style for subtitle decorations
    pub fn subtitle() -> Self {
        CellStyle::new().italic().font_size(14.0)
    }

    /// Default style for hyperlink decorations
    pub fn hyperlink() -> Self {
        CellStyle::new().underline().font_color("#0000FF")
    }
}

////////////////////////////////////////////////////////////////////////////////
// Cell ranges

/// Inclusive, zero-based rectangle of sheet cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRange {
    pub first_row: usize,
    pub first_col: usize,
    pub last_row: usize,
    pub last_col: usize,
}

impl CellRange {
    pub fn new(first_row: usize, first_col: usize, last_row: usize, last_col: usize) -> Self {
        Self {
            first_row: first_row.min(last_row),
            first_col: first_col.min(last_col),
            last_row: first_row.max(last_row),
            last_col: first_col.max(last_col),
        }
    }

    pub fn cell(row: usize, col: usize) -> Self {
        Self::new(row, col, row, col)
    }

    pub fn row(row: usize, first_col: usize, last_col: usize) -> Self {
        Self::new(row, first_col, row, last_col)
    }

    pub fn column(col: usize, first_row: usize, last_row: usize) -> Self {
        Self::new(first_row, col, last_row, col)
    }

    /// Parse `B2` or `B2:D5`
    pub fn parse_a1(text: &str) -> Result<Self> {
        let mut parts = text.trim().splitn(2, ':');
        let first = parse_a1_cell(parts.next().unwrap_or(""))?;
        let last = match parts.next() {
            Some(part) => parse_a1_cell(part)?,
            None => first,
        };
        Ok(Self::new(first.0, first.1, last.0, last.1))
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        row >= self.first_row && row <= self.last_row && col >= self.first_col && col <= self.last_col
    }

    /// Whether `other` lies completely inside this range
    pub fn encloses(&self, other: &CellRange) -> bool {
        self.contains(other.first_row, other.first_col) && self.contains(other.last_row, other.last_col)
    }
}

impl std::fmt::Display for CellRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}",
            column_letter(self.first_col),
            self.first_row + 1
        )?;
        if self.first_row != self.last_row || self.first_col != self.last_col {
            write!(f, ":{}{}", column_letter(self.last_col), self.last_row + 1)?;
        }
        Ok(())
    }
}

/// Zero-based column index to spreadsheet letters (0 → A, 26 → AA)
pub fn column_letter(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

fn parse_a1_cell(text: &str) -> Result<(usize, usize)> {
    let text = text.trim().replace('$', "");
    let split = text
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(|| ExportError::InvalidOptions(format!("invalid cell reference {:?}", text)))?;
    let (letters, digits) = text.split_at(split);
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ExportError::InvalidOptions(format!(
            "invalid cell reference {:?}",
            text
        )));
    }

    let mut col = 0usize;
    for c in letters.chars() {
        col = col * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1);
    }
    let row: usize = digits
        .parse()
        .ok()
        .filter(|r| *r >= 1)
        .ok_or_else(|| ExportError::InvalidOptions(format!("invalid cell reference {:?}", text)))?;

    Ok((row - 1, col - 1))
}

////////////////////////////////////////////////////////////////////////////////
// Sheet layout

/// Style applied to every cell of a range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleRule {
    pub range: CellRange,
    pub style: CellStyle,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnWidth {
    /// Absolute sheet column
    pub col: usize,
    /// Width in character units
    pub width: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecorationKind {
    Title(String),
    Subtitle(String),
    /// Wrapped text merged over the cells up to `last_row`/`last_col`
    Paragraph {
        text: String,
        last_row: usize,
        last_col: usize,
    },
    Hyperlink {
        url: String,
        text: Option<String>,
    },
}

/// Free-standing content placed at a cell outside (or around) the table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decoration {
    pub row: usize,
    pub col: usize,
    pub kind: DecorationKind,
    /// Overrides the kind's default style
    pub style: Option<CellStyle>,
}

impl Decoration {
    pub fn title(row: usize, col: usize, text: impl Into<String>) -> Self {
        Self::new(row, col, DecorationKind::Title(text.into()))
    }

    pub fn subtitle(row: usize, col: usize, text: impl Into<String>) -> Self {
        Self::new(row, col, DecorationKind::Subtitle(text.into()))
    }

    pub fn paragraph(range: CellRange, text: impl Into<String>) -> Self {
        Self::new(
            range.first_row,
            range.first_col,
            DecorationKind::Paragraph {
                text: text.into(),
                last_row: range.last_row,
                last_col: range.last_col,
            },
        )
    }

    pub fn hyperlink(row: usize, col: usize, url: impl Into<String>, text: Option<String>) -> Self {
        Self::new(
            row,
            col,
            DecorationKind::Hyperlink {
                url: url.into(),
                text,
            },
        )
    }

    fn new(row: usize, col: usize, kind: DecorationKind) -> Self {
        Self {
            row,
            col,
            kind,
            style: None,
        }
    }

    pub fn with_style(mut self, style: CellStyle) -> Self {
        self.style = Some(style);
        self
    }

    /// Style used when none is given
    pub fn default_style(&self) -> CellStyle {
        match self.kind {
            DecorationKind::Title(_) => CellStyle::title(),
            DecorationKind::Subtitle(_) => CellStyle::subtitle(),
            DecorationKind::Paragraph { .. } => CellStyle::new()
                .text_wrap()
                .valign(VerticalAlign::Top),
            DecorationKind::Hyperlink { .. } => CellStyle::hyperlink(),
        }
    }
}

/// One worksheet: a table placed at an offset plus its styling
#[derive(Debug, Clone, PartialEq)]
pub struct SheetSpec {
    pub name: String,
    pub table: Table,
    /// Zero-based row of the table's top-left cell
    pub start_row: usize,
    /// Zero-based column of the table's top-left cell
    pub start_col: usize,
    pub styles: Vec<StyleRule>,
    pub column_widths: Vec<ColumnWidth>,
    pub decorations: Vec<Decoration>,
}

impl SheetSpec {
    pub fn new(name: impl Into<String>, table: Table) -> Self {
        Self {
            name: name.into(),
            table,
            start_row: 0,
            start_col: 0,
            styles: Vec::new(),
            column_widths: Vec::new(),
            decorations: Vec::new(),
        }
    }

    pub fn at(mut self, start_row: usize, start_col: usize) -> Self {
        self.start_row = start_row;
        self.start_col = start_col;
        self
    }

    pub fn with_style(mut self, range: CellRange, style: CellStyle) -> Self {
        self.styles.push(StyleRule { range, style });
        self
    }

    pub fn with_column_width(mut self, col: usize, width: f64) -> Self {
        self.column_widths.push(ColumnWidth { col, width });
        self
    }

    pub fn with_decoration(mut self, decoration: Decoration) -> Self {
        self.decorations.push(decoration);
        self
    }

    /// Cells covered by the table, header row and label column included
    pub fn extent(&self, include_header: bool, include_row_labels: bool) -> Option<CellRange> {
        let height = self.table.row_count() + usize::from(include_header);
        let width = self.table.column_count() + usize::from(include_row_labels);
        if height == 0 || width == 0 {
            return None;
        }
        Some(CellRange::new(
            self.start_row,
            self.start_col,
            self.start_row + height - 1,
            self.start_col + width - 1,
        ))
    }
}

/// Ordered set of sheets written to one file
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Workbook {
    pub sheets: Vec<SheetSpec>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sheet(mut self, sheet: SheetSpec) -> Self {
        self.sheets.push(sheet);
        self
    }

    pub fn add_sheet(&mut self, sheet: SheetSpec) {
        self.sheets.push(sheet);
    }

    pub fn sheet(&self, name: &str) -> Option<&SheetSpec> {
        self.sheets.iter().find(|s| s.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_right_side_wins() {
        let base = CellStyle::new().font_name("Arial").font_size(11.0);
        let merged = base.merge(&CellStyle::new().bold().font_size(14.0));
        assert_eq!(merged.font_name.as_deref(), Some("Arial"));
        assert_eq!(merged.font_size, Some(14.0));
        assert_eq!(merged.bold, Some(true));
        assert_eq!(merged.italic, None);
    }

    #[test]
    fn test_column_letter() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(701), "ZZ");
        assert_eq!(column_letter(702), "AAA");
    }

    #[test]
    fn test_parse_a1() {
        assert_eq!(CellRange::parse_a1("B2").unwrap(), CellRange::cell(1, 1));
        assert_eq!(
            CellRange::parse_a1("B2:D5").unwrap(),
            CellRange::new(1, 1, 4, 3)
        );
        assert_eq!(CellRange::parse_a1("$AA$10").unwrap(), CellRange::cell(9, 26));
        assert!(CellRange::parse_a1("12").is_err());
        assert!(CellRange::parse_a1("A0").is_err());
        assert_eq!(CellRange::new(1, 1, 4, 3).to_string(), "B2:D5");
        assert_eq!(CellRange::cell(0, 0).to_string(), "A1");
    }

    #[test]
    fn test_extent_counts_header_and_labels() {
        let table = Table::from_columns(vec![("a", vec![1.into(), 2.into()])]).unwrap();
        let sheet = SheetSpec::new("s", table).at(2, 1);
        assert_eq!(sheet.extent(true, true), Some(CellRange::new(2, 1, 4, 2)));
        assert_eq!(sheet.extent(false, false), Some(CellRange::new(2, 1, 3, 1)));

        let empty = SheetSpec::new("e", Table::default());
        assert_eq!(empty.extent(true, false), None);
    }
}
