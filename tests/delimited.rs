use std::fs;

use anyhow::Result;
use tempfile::TempDir;

use dataexport::config::{DelimitedOptions, QuotePolicy, TextEncoding};
use dataexport::model::{CellValue, Table};
use dataexport::{export_delimited, import_delimited, ExportError};

fn scenario() -> Result<Table> {
    Ok(Table::from_columns(vec![
        ("var1", vec![10.into(), 25.into(), 8.into()]),
        ("var2", vec!["beer".into(), "wine".into(), "cheese".into()]),
        ("var3", vec![true.into(), true.into(), false.into()]),
    ])?
    .with_row_labels(vec!["billy", "bob", "thornton"])?)
}

#[test]
fn test_scenario_file() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("scenario.csv");

    let report = export_delimited(&scenario()?, &path, &DelimitedOptions::default())?;

    let content = fs::read_to_string(&path)?;
    assert_eq!(
        content,
        "\"\",var1,var2,var3\nbilly,10,beer,TRUE\nbob,25,wine,TRUE\nthornton,8,cheese,FALSE\n"
    );
    assert_eq!(report.rows_written, 3);
    assert_eq!(report.bytes_written, content.len() as u64);
    Ok(())
}

#[test]
fn test_round_trip() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("roundtrip.csv");

    let table = Table::from_columns(vec![
        (
            "note",
            vec![
                "plain".into(),
                "a,b".into(),
                "say \"hi\"".into(),
                " padded ".into(),
            ],
        ),
        (
            "value",
            vec![
                1.5.into(),
                f64::NAN.into(),
                f64::NEG_INFINITY.into(),
                1e300.into(),
            ],
        ),
        (
            "count",
            vec![CellValue::Null, 2.into(), (-7).into(), i64::MAX.into()],
        ),
        (
            "flag",
            vec![true.into(), false.into(), CellValue::Null, true.into()],
        ),
    ])?
    .with_row_labels(vec!["r1", "r2", "line\nbreak", "r4"])?;

    let options = DelimitedOptions::default();
    export_delimited(&table, &path, &options)?;
    let restored = import_delimited(&path, &options)?;

    assert_eq!(restored, table);
    assert!(matches!(restored.cell(1, 1), Some(CellValue::Float(f)) if f.is_nan()));
    Ok(())
}

#[test]
fn test_round_trip_with_options() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("roundtrip.tsv");

    let table = Table::from_columns(vec![
        ("city", vec!["Zürich".into(), "Málaga".into()]),
        ("pop", vec![CellValue::Null, 571_000.into()]),
    ])?;
    let options = DelimitedOptions::tsv()
        .with_row_labels(false)
        .with_missing_placeholder("NA")
        .with_encoding(TextEncoding::Latin1)
        .with_quote_policy(QuotePolicy::All);

    export_delimited(&table, &path, &options)?;
    let bytes = fs::read(&path)?;
    assert!(bytes.contains(&0xFC), "ü is one Latin-1 byte");

    assert_eq!(import_delimited(&path, &options)?, table);
    Ok(())
}

#[test]
fn test_single_column_missing_values_survive() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("single.csv");
    let table = Table::from_columns(vec![("x", vec![1.into(), CellValue::Null, 3.into()])])?;

    for options in [
        DelimitedOptions::fast(),
        DelimitedOptions::fast().with_header(false),
        DelimitedOptions::fast().with_quote_policy(QuotePolicy::Never),
    ] {
        export_delimited(&table, &path, &options)?;
        let restored = import_delimited(&path, &options)?;
        assert_eq!(restored.row_count(), 3);
        assert!(restored.cell(1, 0).is_some_and(CellValue::is_null));
        if options.include_header {
            assert_eq!(restored, table);
        }
    }
    Ok(())
}

#[test]
fn test_quoted_text_keeps_its_type() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("codes.csv");
    let table = Table::from_columns(vec![
        ("zip", vec!["02139".into(), "10001".into()]),
        ("answer", vec!["TRUE".into(), "NaN".into()]),
        ("count", vec![4.into(), CellValue::Null]),
    ])?;
    let options = DelimitedOptions::default().with_quote_policy(QuotePolicy::NonNumeric);

    export_delimited(&table, &path, &options)?;
    assert_eq!(
        fs::read_to_string(&path)?,
        "\"\",\"zip\",\"answer\",\"count\"\n\"1\",\"02139\",\"TRUE\",4\n\"2\",\"10001\",\"NaN\",\n"
    );
    assert_eq!(import_delimited(&path, &options)?, table);
    Ok(())
}

#[test]
fn test_numeric_row_labels_read_back_as_row_numbers() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("numbered.csv");
    let unlabeled = Table::from_columns(vec![("v", vec!["a".into(), "b".into()])])?;
    let labeled = unlabeled.clone().with_row_labels(vec!["1", "2"])?;

    export_delimited(&labeled, &path, &DelimitedOptions::default())?;
    let restored = import_delimited(&path, &DelimitedOptions::default())?;
    assert_eq!(restored.row_labels, None);
    assert_eq!(restored, unlabeled);
    Ok(())
}

#[test]
fn test_reexport_is_byte_identical() -> Result<()> {
    let dir = TempDir::new()?;
    let first = dir.path().join("first.csv");
    let second = dir.path().join("second.csv");
    let options = DelimitedOptions::excel();

    export_delimited(&scenario()?, &first, &options)?;
    let restored = import_delimited(&first, &options)?;
    export_delimited(&restored, &second, &options)?;

    assert_eq!(fs::read(&first)?, fs::read(&second)?);
    assert!(fs::read(&first)?.starts_with(b"\xEF\xBB\xBF"));
    Ok(())
}

#[test]
fn test_overwrites_existing_file() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("out.csv");
    fs::write(&path, "old content that is longer than the new one\n".repeat(10))?;

    export_delimited(&scenario()?, &path, &DelimitedOptions::fast())?;
    assert_eq!(fs::read_to_string(&path)?.lines().count(), 4);
    Ok(())
}

#[test]
fn test_empty_table() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("empty.csv");
    let table = Table::from_columns(vec![("a", vec![]), ("b", vec![])])?;

    let report = export_delimited(&table, &path, &DelimitedOptions::default())?;
    assert_eq!(fs::read_to_string(&path)?, "\"\",a,b\n");
    assert_eq!(report.rows_written, 0);

    let restored = import_delimited(&path, &DelimitedOptions::default())?;
    assert_eq!(restored.column_names(), vec!["a", "b"]);
    assert!(restored.is_empty());

    let bare = DelimitedOptions::fast().with_header(false);
    export_delimited(&table, &path, &bare)?;
    assert_eq!(fs::metadata(&path)?.len(), 0);
    Ok(())
}

#[test]
fn test_missing_parent_directory() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("no/such/dir/out.csv");

    let err = export_delimited(&scenario()?, &path, &DelimitedOptions::default()).unwrap_err();
    match err {
        ExportError::Path { path: reported, .. } => assert_eq!(reported, path),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!path.exists());
    Ok(())
}

#[test]
fn test_unencodable_character() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("prices.csv");
    let table = Table::from_columns(vec![
        ("item", vec!["tea".into(), "cake".into()]),
        ("price", vec!["3 €".into(), "4".into()]),
    ])?;
    let options = DelimitedOptions::fast().with_encoding(TextEncoding::Latin1);

    match export_delimited(&table, &path, &options).unwrap_err() {
        ExportError::Encoding {
            line, column, ch, ..
        } => {
            assert_eq!(line, 2);
            assert_eq!(column, "price");
            assert_eq!(ch, '€');
        }
        other => panic!("unexpected error: {other}"),
    }
    Ok(())
}
