use std::fs;

use anyhow::Result;
use tempfile::TempDir;

use dataexport::config::{DelimitedOptions, SpreadsheetOptions};
use dataexport::model::{SheetSpec, Table};
use dataexport::parser::ParserFactory;
use dataexport::{
    import_object, ExportDispatcher, ExportError, ExportFormat, ExportOptions, ExportSource,
    ExportTarget, ObjectPayload, Value, Workbook,
};

fn table() -> Result<Table> {
    Ok(Table::from_columns(vec![
        ("name", vec!["ada".into(), "grace".into()]),
        ("born", vec![1815.into(), 1906.into()]),
    ])?)
}

#[test]
fn test_routes_by_extension() -> Result<()> {
    let dir = TempDir::new()?;
    let dispatcher = ExportDispatcher::new();
    let factory = ParserFactory::new();
    let options = ExportOptions::default().with_delimited(DelimitedOptions::fast());
    let table = table()?;

    for name in ["people.csv", "people.xlsx", "people.rds"] {
        let target = ExportTarget::from_path(dir.path().join(name))?.with_options(options.clone());
        let report = dispatcher.export(ExportSource::Table(&table), &target)?;
        assert_eq!(report.format, target.format);
        assert_eq!(report.rows_written, 2);

        let restored = factory.parse(&target.path, &options)?;
        assert_eq!(restored, table, "{name}");
    }
    Ok(())
}

#[test]
fn test_table_to_spreadsheet_uses_sheet_options() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("placed.xlsx");
    let spreadsheet = SpreadsheetOptions::default()
        .with_sheet_name("People")
        .with_start(3, 2);
    let target = ExportTarget::new(&path, ExportFormat::Spreadsheet)
        .with_options(ExportOptions::default().with_spreadsheet(spreadsheet.clone()));

    let report = ExportDispatcher::new().export(ExportSource::Table(&table()?), &target)?;
    assert_eq!(report.sheets, vec!["People"]);

    assert_eq!(dataexport::import_spreadsheet(&path, &spreadsheet)?, table()?);
    Ok(())
}

#[test]
fn test_table_to_object_container() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("people.bin");

    ExportDispatcher::new().export_to_path(ExportSource::Table(&table()?), &path)?;
    assert_eq!(import_object(&path)?, Value::Table(table()?));
    Ok(())
}

#[test]
fn test_payload_with_table_to_csv() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("people.tsv");
    let payload = ObjectPayload::named("people", table()?);
    let target = ExportTarget::from_path(&path)?
        .with_options(ExportOptions::default().with_delimited(DelimitedOptions::tsv().with_row_labels(false)));

    ExportDispatcher::new().export(ExportSource::Object(&payload), &target)?;
    assert_eq!(fs::read_to_string(&path)?, "name\tborn\nada\t1815\ngrace\t1906\n");
    Ok(())
}

#[test]
fn test_invalid_combinations() -> Result<()> {
    let dir = TempDir::new()?;
    let dispatcher = ExportDispatcher::new();
    let workbook = Workbook::new().with_sheet(SheetSpec::new("s", table()?));
    let value = ObjectPayload::value(Value::Int(1));

    let err = dispatcher
        .export_to_path(ExportSource::Workbook(&workbook), &dir.path().join("book.csv"))
        .unwrap_err();
    assert!(matches!(err, ExportError::InvalidOptions(_)));

    let err = dispatcher
        .export_to_path(ExportSource::Workbook(&workbook), &dir.path().join("book.rds"))
        .unwrap_err();
    assert!(matches!(err, ExportError::InvalidOptions(_)));

    let err = dispatcher
        .export_to_path(ExportSource::Object(&value), &dir.path().join("value.xlsx"))
        .unwrap_err();
    assert!(matches!(err, ExportError::InvalidOptions(_)));

    let err = dispatcher
        .export_to_path(ExportSource::Table(&table()?), &dir.path().join("table.parquet"))
        .unwrap_err();
    assert!(err.to_string().contains("Unsupported file format: parquet"));
    Ok(())
}

#[test]
fn test_options_from_json() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("people.csv");
    let options = ExportOptions::from_json_str(
        r#"{"delimited": {"delimiter": ";", "include_row_labels": false, "quote_policy": "all"}}"#,
    )?;
    let target = ExportTarget::from_path(&path)?.with_options(options);

    ExportDispatcher::new().export(ExportSource::Table(&table()?), &target)?;
    assert_eq!(
        fs::read_to_string(&path)?,
        "\"name\";\"born\"\n\"ada\";\"1815\"\n\"grace\";\"1906\"\n"
    );
    Ok(())
}
