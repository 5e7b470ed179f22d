//! Object container reader

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::{ExportFormat, ExportOptions};
use crate::error::{ExportError, Result};
use crate::export::{ContainerHeader, ContainerKind};
use crate::model::{Namespace, Table, Value};

use super::Parser;

/// Reads the table stored in a single-value container
pub struct ObjectParser;

impl Parser for ObjectParser {
    fn format(&self) -> ExportFormat {
        ExportFormat::Object
    }

    fn parse(&self, path: &Path, _options: &ExportOptions) -> Result<Table> {
        match import_object(path)? {
            Value::Table(table) => Ok(table),
            other => Err(ExportError::InvalidTable(format!(
                "container holds a {} value, not a table",
                other.kind()
            ))),
        }
    }
}

/// Restore the value of a single-value container; the caller binds it to any name
pub fn import_object(path: impl AsRef<Path>) -> Result<Value> {
    read_container(path.as_ref(), ContainerKind::Single)
}

/// Restore a named container into `namespace`, replacing existing bindings
/// of the same names. Returns the names bound, in stored order.
pub fn import_objects(path: impl AsRef<Path>, namespace: &mut Namespace) -> Result<Vec<String>> {
    let values: IndexMap<String, Value> = read_container(path.as_ref(), ContainerKind::Named)?;

    let mut names = Vec::with_capacity(values.len());
    for (name, value) in values {
        if namespace.bind(name.clone(), value).is_some() {
            debug!(name = %name, "binding replaced");
        }
        names.push(name);
    }
    Ok(names)
}

fn read_container<T: DeserializeOwned>(path: &Path, expected: ContainerKind) -> Result<T> {
    let mut reader = BufReader::new(File::open(path)?);
    let header = ContainerHeader::read_from(&mut reader)?;
    if header.kind != expected {
        return Err(ExportError::ContainerMode {
            expected: expected.name(),
            found: header.kind.name(),
        });
    }

    let payload: Box<dyn Read> = if header.compressed {
        Box::new(GzDecoder::new(reader))
    } else {
        Box::new(reader)
    };
    serde_json::from_reader(payload).map_err(|e| ExportError::Deserialization(e.to_string()))
}
