//! `.xlsx` workbook writer

use std::collections::HashMap;
use std::path::Path;

use rust_xlsxwriter::{
    Color, DocProperties, ExcelDateTime, Format, FormatAlign, FormatBorder, FormatUnderline, Url,
    Workbook as XlsxWorkbook, Worksheet, XlsxError,
};
use tracing::{debug, warn};

use super::delimited::format_float;
use super::{
    ensure_parent, payload_table, single_sheet_workbook, ExportReport, ExportSource, Exporter,
};
use crate::config::{ExportFormat, ExportTarget, SpreadsheetOptions};
use crate::error::{ExportError, Result};
use crate::model::{
    column_letter, BorderPosition, BorderWeight, CellRange, CellStyle, CellValue, DecorationKind,
    HorizontalAlign, SheetSpec, StyleRule, VerticalAlign, Workbook,
};

/// Worksheet maximum row count
pub const MAX_ROWS: usize = 1_048_576;
/// Worksheet maximum column count
pub const MAX_COLS: usize = 16_384;
/// Sheet name maximum length
pub const MAX_SHEET_NAME_LEN: usize = 31;
const ILLEGAL_SHEET_CHARS: [char; 7] = ['*', ':', '?', '/', '\\', '[', ']'];

/// Exporter for `.xlsx` workbooks
pub struct SpreadsheetExporter;

impl Exporter for SpreadsheetExporter {
    fn format(&self) -> ExportFormat {
        ExportFormat::Spreadsheet
    }

    fn export(&self, source: ExportSource<'_>, target: &ExportTarget) -> Result<ExportReport> {
        let options = &target.options.spreadsheet;
        match source {
            ExportSource::Workbook(workbook) => export_spreadsheet(workbook, &target.path, options),
            ExportSource::Table(table) => {
                export_spreadsheet(&single_sheet_workbook(table, target), &target.path, options)
            }
            ExportSource::Object(payload) => match payload_table(payload) {
                Some(table) => export_spreadsheet(
                    &single_sheet_workbook(table, target),
                    &target.path,
                    options,
                ),
                None => Err(super::unsupported(source, self.format())),
            },
        }
    }
}

/// Fixed creation date, so exporting the same workbook twice gives the same bytes
fn document_properties() -> Result<DocProperties> {
    let created = ExcelDateTime::from_ymd(2000, 1, 1)?;
    Ok(DocProperties::new().set_creation_datetime(&created))
}

/// Write every sheet of `workbook` into one `.xlsx` file, replacing any existing file.
///
/// All sheets are validated before anything is written.
pub fn export_spreadsheet(
    workbook: &Workbook,
    path: impl AsRef<Path>,
    options: &SpreadsheetOptions,
) -> Result<ExportReport> {
    let path = path.as_ref();
    ensure_parent(path)?;

    let mut report = ExportReport::new(path, ExportFormat::Spreadsheet);
    let names = plan_sheet_names(workbook, &mut report)?;
    for (sheet, name) in workbook.sheets.iter().zip(&names) {
        validate_sheet(sheet, name, options, &mut report)?;
    }

    let mut book = XlsxWorkbook::new();
    book.set_properties(&document_properties()?);
    for (sheet, name) in workbook.sheets.iter().zip(&names) {
        debug!(
            sheet = %name,
            rows = sheet.table.row_count(),
            columns = sheet.table.column_count(),
            "writing worksheet"
        );
        let worksheet = book.add_worksheet();
        worksheet.set_name(name)?;
        write_sheet(worksheet, sheet, options)?;

        report.rows_written += sheet.table.row_count();
        report.sheets.push(name.clone());
    }

    book.save(path).map_err(|err| match err {
        XlsxError::IoError(source) => ExportError::path(path, source),
        other => other.into(),
    })?;

    report.finish()
}

/// Replace invalid chars and trim to a valid sheet name
pub fn sanitize_sheet_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| if ILLEGAL_SHEET_CHARS.contains(&c) { '_' } else { c })
        .collect();
    let trimmed = replaced.trim().trim_matches('\'').trim();
    if trimmed.is_empty() {
        return "Sheet".to_string();
    }

    trimmed.chars().take(MAX_SHEET_NAME_LEN).collect()
}

/// Normalize sheet names and reject duplicates (case-insensitive)
fn plan_sheet_names(workbook: &Workbook, report: &mut ExportReport) -> Result<Vec<String>> {
    let mut seen: HashMap<String, &str> = HashMap::new();
    let mut names = Vec::with_capacity(workbook.sheets.len());

    for sheet in &workbook.sheets {
        let name = sanitize_sheet_name(&sheet.name);
        if name != sheet.name {
            warn!(requested = %sheet.name, used = %name, "sheet name normalized");
            report.warn(format!("sheet name {:?} written as {:?}", sheet.name, name));
        }
        if seen.insert(name.to_lowercase(), &sheet.name).is_some() {
            return Err(ExportError::SheetNameCollision { name });
        }
        names.push(name);
    }

    Ok(names)
}

fn validate_sheet(
    sheet: &SheetSpec,
    name: &str,
    options: &SpreadsheetOptions,
    report: &mut ExportReport,
) -> Result<()> {
    let extent = sheet.extent(options.include_header, options.include_row_labels);

    if let Some(extent) = extent {
        if extent.last_row >= MAX_ROWS || extent.last_col >= MAX_COLS {
            return Err(ExportError::Spreadsheet(format!(
                "table on sheet {:?} spans {} which exceeds the {} x {} sheet limit",
                name, extent, MAX_ROWS, MAX_COLS
            )));
        }
    }

    let outside = |range: &CellRange| match extent {
        Some(extent) if extent.encloses(range) => None,
        _ => Some(ExportError::StyleTarget {
            sheet: name.to_string(),
            range: range.to_string(),
            extent: extent.map_or_else(|| "(empty)".to_string(), |e| e.to_string()),
        }),
    };

    for rule in &sheet.styles {
        if let Some(err) = outside(&rule.range) {
            return Err(err);
        }
    }
    for width in &sheet.column_widths {
        let first_row = extent.map_or(0, |e| e.first_row);
        let last_row = extent.map_or(0, |e| e.last_row);
        if let Some(err) = outside(&CellRange::column(width.col, first_row, last_row)) {
            return Err(err);
        }
        if !(width.width >= 0.0 && width.width <= 255.0) {
            return Err(ExportError::InvalidOptions(format!(
                "column width {} for column {} must be between 0 and 255",
                width.width,
                column_letter(width.col)
            )));
        }
    }

    for decoration in &sheet.decorations {
        let range = decoration_range(decoration.row, decoration.col, &decoration.kind);
        if range.last_row >= MAX_ROWS || range.last_col >= MAX_COLS {
            return Err(ExportError::Spreadsheet(format!(
                "decoration at {} on sheet {:?} is outside the sheet",
                range, name
            )));
        }
        if let Some(extent) = extent {
            if extent.contains(range.first_row, range.first_col) {
                report.warn(format!(
                    "decoration at {} on sheet {:?} overlaps the table",
                    range, name
                ));
            }
        }
    }

    Ok(())
}

fn decoration_range(row: usize, col: usize, kind: &DecorationKind) -> CellRange {
    match kind {
        DecorationKind::Paragraph {
            last_row, last_col, ..
        } => CellRange::new(row, col, *last_row, *last_col),
        _ => CellRange::cell(row, col),
    }
}

fn write_sheet(
    worksheet: &mut Worksheet,
    sheet: &SheetSpec,
    options: &SpreadsheetOptions,
) -> Result<()> {
    let table = &sheet.table;
    let mut styles = StyleResolver::new(&sheet.styles, &options.header_style, &options.body_style);
    let mut row_idx = sheet.start_row;
    let first_col = sheet.start_col;
    let data_col = first_col + usize::from(options.include_row_labels);

    if options.include_header {
        if options.include_row_labels {
            let format = styles.format_for(row_idx, first_col, true);
            worksheet.write_blank(cast_row_num(row_idx)?, cast_col_num(first_col)?, &format)?;
        }
        for (offset, column) in table.columns.iter().enumerate() {
            let col_idx = data_col + offset;
            let format = styles.format_for(row_idx, col_idx, true);
            worksheet.write_string_with_format(
                cast_row_num(row_idx)?,
                cast_col_num(col_idx)?,
                &column.name,
                &format,
            )?;
        }
        row_idx += 1;
    }

    for (idx, row) in table.rows.iter().enumerate() {
        if options.include_row_labels {
            let label = match table.row_labels.as_ref().and_then(|labels| labels.get(idx)) {
                Some(label) => label.clone(),
                None => (idx + 1).to_string(),
            };
            let format = styles.format_for(row_idx, first_col, false);
            worksheet.write_string_with_format(
                cast_row_num(row_idx)?,
                cast_col_num(first_col)?,
                &label,
                &format,
            )?;
        }
        for (offset, cell) in row.cells.iter().enumerate() {
            let col_idx = data_col + offset;
            let format = styles.format_for(row_idx, col_idx, false);
            write_cell(
                worksheet,
                row_idx,
                col_idx,
                cell,
                options.missing_placeholder.as_deref(),
                &format,
            )?;
        }
        row_idx += 1;
    }

    for width in &sheet.column_widths {
        worksheet.set_column_width(cast_col_num(width.col)?, width.width)?;
    }

    for decoration in &sheet.decorations {
        let style = decoration
            .default_style()
            .merge(decoration.style.as_ref().unwrap_or(&CellStyle::default()));
        let format = derive_format(&style);
        let row = cast_row_num(decoration.row)?;
        let col = cast_col_num(decoration.col)?;

        match &decoration.kind {
            DecorationKind::Title(text) | DecorationKind::Subtitle(text) => {
                worksheet.write_string_with_format(row, col, text, &format)?;
            }
            DecorationKind::Paragraph {
                text,
                last_row,
                last_col,
            } => {
                let range = CellRange::new(decoration.row, decoration.col, *last_row, *last_col);
                if range.first_row == range.last_row && range.first_col == range.last_col {
                    worksheet.write_string_with_format(row, col, text, &format)?;
                } else {
                    worksheet.merge_range(
                        cast_row_num(range.first_row)?,
                        cast_col_num(range.first_col)?,
                        cast_row_num(range.last_row)?,
                        cast_col_num(range.last_col)?,
                        text,
                        &format,
                    )?;
                }
            }
            DecorationKind::Hyperlink { url, text } => {
                let mut link = Url::new(url.as_str());
                if let Some(text) = text {
                    link = link.set_text(text.as_str());
                }
                worksheet.write_url_with_format(row, col, link, &format)?;
            }
        }
    }

    Ok(())
}

fn write_cell(
    worksheet: &mut Worksheet,
    row_idx: usize,
    col_idx: usize,
    value: &CellValue,
    missing_placeholder: Option<&str>,
    format: &Format,
) -> Result<()> {
    let row = cast_row_num(row_idx)?;
    let col = cast_col_num(col_idx)?;
    match value {
        CellValue::Null => match missing_placeholder {
            Some(text) => {
                worksheet.write_string_with_format(row, col, text, format)?;
            }
            None => {
                worksheet.write_blank(row, col, format)?;
            }
        },
        CellValue::Bool(b) => {
            worksheet.write_boolean_with_format(row, col, *b, format)?;
        }
        CellValue::Int(i) => {
            worksheet.write_number_with_format(row, col, *i as f64, format)?;
        }
        // Sheets have no NaN/Inf numbers
        CellValue::Float(f) if !f.is_finite() => {
            worksheet.write_string_with_format(row, col, format_float(*f), format)?;
        }
        CellValue::Float(f) => {
            worksheet.write_number_with_format(row, col, *f, format)?;
        }
        CellValue::String(s) => {
            worksheet.write_string_with_format(row, col, s.to_string(), format)?;
        }
    }
    Ok(())
}

/// Resolves the effective format of a cell from the base styles and the
/// style rules covering it, caching one `Format` per rule combination
struct StyleResolver<'a> {
    rules: &'a [StyleRule],
    header: &'a CellStyle,
    body: &'a CellStyle,
    cache: HashMap<(bool, Vec<usize>), Format>,
}

impl<'a> StyleResolver<'a> {
    fn new(rules: &'a [StyleRule], header: &'a CellStyle, body: &'a CellStyle) -> Self {
        Self {
            rules,
            header,
            body,
            cache: HashMap::new(),
        }
    }

    fn format_for(&mut self, row: usize, col: usize, is_header: bool) -> Format {
        let matching: Vec<usize> = self
            .rules
            .iter()
            .enumerate()
            .filter(|(_, rule)| rule.range.contains(row, col))
            .map(|(idx, _)| idx)
            .collect();

        let (rules, header, body) = (self.rules, self.header, self.body);
        self.cache
            .entry((is_header, matching))
            .or_insert_with_key(|(is_header, matching)| {
                let base = if *is_header { body.merge(header) } else { body.clone() };
                let style = matching
                    .iter()
                    .fold(base, |style, idx| style.merge(&rules[*idx].style));
                derive_format(&style)
            })
            .clone()
    }
}

fn derive_format(style: &CellStyle) -> Format {
    let mut format = Format::new();

    if let Some(val) = &style.font_name {
        format = format.set_font_name(val.as_str());
    }
    if let Some(val) = style.font_size {
        format = format.set_font_size(val);
    }
    if let Some(val) = &style.font_color {
        format = format.set_font_color(derive_color(val));
    }
    if style.bold.unwrap_or(false) {
        format = format.set_bold();
    }
    if style.italic.unwrap_or(false) {
        format = format.set_italic();
    }
    if style.underline.unwrap_or(false) {
        format = format.set_underline(FormatUnderline::Single);
    }

    if let Some(val) = style.align {
        format = format.set_align(derive_align(val));
    }
    if let Some(val) = style.valign {
        format = format.set_align(derive_valign(val));
    }
    if style.text_wrap.unwrap_or(false) {
        format = format.set_text_wrap();
    }

    if let Some(val) = &style.num_format {
        format = format.set_num_format(val.as_str());
    }
    if let Some(val) = &style.bg_color {
        format = format.set_background_color(derive_color(val));
    }

    if let Some(border) = &style.border {
        let line = derive_border(border.weight);
        let color = border.color.as_deref().map(derive_color);
        for position in &border.positions {
            format = match position {
                BorderPosition::Top => format.set_border_top(line),
                BorderPosition::Bottom => format.set_border_bottom(line),
                BorderPosition::Left => format.set_border_left(line),
                BorderPosition::Right => format.set_border_right(line),
            };
            if let Some(color) = color {
                format = match position {
                    BorderPosition::Top => format.set_border_top_color(color),
                    BorderPosition::Bottom => format.set_border_bottom_color(color),
                    BorderPosition::Left => format.set_border_left_color(color),
                    BorderPosition::Right => format.set_border_right_color(color),
                };
            }
        }
    }

    format
}

fn derive_border(weight: BorderWeight) -> FormatBorder {
    match weight {
        BorderWeight::Thin => FormatBorder::Thin,
        BorderWeight::Medium => FormatBorder::Medium,
        BorderWeight::Thick => FormatBorder::Thick,
        BorderWeight::Dashed => FormatBorder::Dashed,
        BorderWeight::Dotted => FormatBorder::Dotted,
        BorderWeight::Double => FormatBorder::Double,
        BorderWeight::Hair => FormatBorder::Hair,
    }
}

fn derive_align(align: HorizontalAlign) -> FormatAlign {
    match align {
        HorizontalAlign::General => FormatAlign::General,
        HorizontalAlign::Left => FormatAlign::Left,
        HorizontalAlign::Center => FormatAlign::Center,
        HorizontalAlign::Right => FormatAlign::Right,
        HorizontalAlign::Fill => FormatAlign::Fill,
        HorizontalAlign::Justify => FormatAlign::Justify,
    }
}

fn derive_valign(align: VerticalAlign) -> FormatAlign {
    match align {
        VerticalAlign::Top => FormatAlign::Top,
        VerticalAlign::Center => FormatAlign::VerticalCenter,
        VerticalAlign::Bottom => FormatAlign::Bottom,
    }
}

/// `#RRGGBB` hex or a basic color name
fn derive_color(value: &str) -> Color {
    match value.trim().to_ascii_lowercase().as_str() {
        "black" => Color::Black,
        "blue" => Color::Blue,
        "gray" | "grey" => Color::Gray,
        "green" => Color::Green,
        "navy" => Color::Navy,
        "orange" => Color::Orange,
        "purple" => Color::Purple,
        "red" => Color::Red,
        "white" => Color::White,
        "yellow" => Color::Yellow,
        _ => Color::from(value.trim()),
    }
}

fn cast_row_num(value: usize) -> Result<u32> {
    u32::try_from(value)
        .ok()
        .filter(|v| (*v as usize) < MAX_ROWS)
        .ok_or_else(|| ExportError::Spreadsheet(format!("row index overflow: {}", value)))
}

fn cast_col_num(value: usize) -> Result<u16> {
    u16::try_from(value)
        .ok()
        .filter(|v| (*v as usize) < MAX_COLS)
        .ok_or_else(|| ExportError::Spreadsheet(format!("column index overflow: {}", value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Decoration, Table};

    fn sheet(name: &str) -> SheetSpec {
        let table = Table::from_columns(vec![
            ("a", vec![1.into(), 2.into()]),
            ("b", vec!["x".into(), "y".into()]),
        ])
        .unwrap();
        SheetSpec::new(name, table)
    }

    fn report() -> ExportReport {
        ExportReport::new(Path::new("book.xlsx"), ExportFormat::Spreadsheet)
    }

    #[test]
    fn test_sanitize_sheet_name() {
        assert_eq!(sanitize_sheet_name("Q1/Q2 [draft]"), "Q1_Q2 _draft_");
        assert_eq!(sanitize_sheet_name("   "), "Sheet");
        assert_eq!(sanitize_sheet_name("'quoted'"), "quoted");
        assert_eq!(sanitize_sheet_name(&"x".repeat(40)).len(), MAX_SHEET_NAME_LEN);
    }

    #[test]
    fn test_sheet_name_collision_is_case_insensitive() {
        let workbook = Workbook::new().with_sheet(sheet("Data")).with_sheet(sheet("data"));
        let err = plan_sheet_names(&workbook, &mut report()).unwrap_err();
        assert!(matches!(err, ExportError::SheetNameCollision { .. }));
    }

    #[test]
    fn test_sanitized_names_can_collide() {
        let workbook = Workbook::new().with_sheet(sheet("a/b")).with_sheet(sheet("a:b"));
        assert!(plan_sheet_names(&workbook, &mut report()).is_err());

        let mut report = report();
        let names = plan_sheet_names(&Workbook::new().with_sheet(sheet("a?")), &mut report).unwrap();
        assert_eq!(names, vec!["a_"]);
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_style_target_inside_extent() {
        let options = SpreadsheetOptions::default();
        // Header at row 2, data rows 3..=4, columns B..=C
        let ok = sheet("s")
            .at(2, 1)
            .with_style(CellRange::parse_a1("B3:C5").unwrap(), CellStyle::new().bold())
            .with_column_width(2, 20.0);
        assert!(validate_sheet(&ok, "s", &options, &mut report()).is_ok());
    }

    #[test]
    fn test_style_target_outside_extent() {
        let options = SpreadsheetOptions::default();
        let bad = sheet("s").with_style(CellRange::new(0, 0, 3, 1), CellStyle::new().bold());
        match validate_sheet(&bad, "s", &options, &mut report()).unwrap_err() {
            ExportError::StyleTarget { range, extent, .. } => {
                assert_eq!(range, "A1:B4");
                assert_eq!(extent, "A1:B3");
            }
            other => panic!("unexpected error: {other}"),
        }

        let bad_width = sheet("s").with_column_width(5, 10.0);
        assert!(matches!(
            validate_sheet(&bad_width, "s", &options, &mut report()),
            Err(ExportError::StyleTarget { .. })
        ));
    }

    #[test]
    fn test_style_on_empty_table_is_rejected() {
        let empty = SheetSpec::new("e", Table::default()).with_style(CellRange::cell(0, 0), CellStyle::new());
        let options = SpreadsheetOptions::default();
        assert!(matches!(
            validate_sheet(&empty, "e", &options, &mut report()),
            Err(ExportError::StyleTarget { .. })
        ));
    }

    #[test]
    fn test_sheet_limits() {
        let options = SpreadsheetOptions::default();
        let too_low = sheet("s").at(MAX_ROWS - 1, 0);
        assert!(matches!(
            validate_sheet(&too_low, "s", &options, &mut report()),
            Err(ExportError::Spreadsheet(_))
        ));
    }

    #[test]
    fn test_decoration_overlap_warns() {
        let options = SpreadsheetOptions::default();
        let spec = sheet("s")
            .at(2, 0)
            .with_decoration(Decoration::title(0, 0, "Title"))
            .with_decoration(Decoration::subtitle(2, 0, "Oops"));
        let mut report = report();
        validate_sheet(&spec, "s", &options, &mut report).unwrap();
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_style_resolver_caches_by_rule_set() {
        let rules = vec![StyleRule {
            range: CellRange::new(1, 0, 2, 0),
            style: CellStyle::new().italic(),
        }];
        let header = CellStyle::header();
        let body = CellStyle::default();
        let mut resolver = StyleResolver::new(&rules, &header, &body);
        let _ = resolver.format_for(0, 0, true);
        let _ = resolver.format_for(1, 0, false);
        let _ = resolver.format_for(2, 0, false);
        let _ = resolver.format_for(1, 1, false);
        assert_eq!(resolver.cache.len(), 3);
    }
}
