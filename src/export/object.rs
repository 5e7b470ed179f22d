//! Native object containers
//!
//! Layout: 4-byte magic, version byte, kind byte (0 single value, 1 named
//! values), compression byte (0 plain, 1 gzip), then the JSON-encoded payload.

use std::borrow::Cow;
use std::io::{self, Read, Write};
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;
use indexmap::IndexMap;

use super::{create_output, ExportReport, ExportSource, Exporter};
use crate::config::{ExportFormat, ExportTarget, NameMode, ObjectOptions};
use crate::error::{ExportError, Result};
use crate::model::{ObjectPayload, Value, MAX_NESTING};

pub const CONTAINER_MAGIC: &[u8; 4] = b"DXOB";
pub const CONTAINER_VERSION: u8 = 1;

/// Exporter for object containers
pub struct ObjectExporter;

impl Exporter for ObjectExporter {
    fn format(&self) -> ExportFormat {
        ExportFormat::Object
    }

    fn export(&self, source: ExportSource<'_>, target: &ExportTarget) -> Result<ExportReport> {
        let options = &target.options.object;
        match source {
            ExportSource::Object(payload) => export_object(payload, &target.path, options),
            ExportSource::Table(table) => export_object(
                &ObjectPayload::value(Value::Table(table.clone())),
                &target.path,
                options,
            ),
            ExportSource::Workbook(_) => Err(super::unsupported(source, self.format())),
        }
    }
}

/// What a container holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ContainerKind {
    Single,
    Named,
}

impl ContainerKind {
    pub(crate) fn name(self) -> &'static str {
        match self {
            ContainerKind::Single => "single-value",
            ContainerKind::Named => "named",
        }
    }
}

/// Fixed-size prefix of every container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ContainerHeader {
    pub kind: ContainerKind,
    pub compressed: bool,
}

impl ContainerHeader {
    pub(crate) fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(CONTAINER_MAGIC)?;
        writer.write_all(&[
            CONTAINER_VERSION,
            match self.kind {
                ContainerKind::Single => 0,
                ContainerKind::Named => 1,
            },
            u8::from(self.compressed),
        ])
    }

    pub(crate) fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buf = [0u8; 7];
        reader.read_exact(&mut buf).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => {
                ExportError::Deserialization("file is shorter than the container header".into())
            }
            _ => ExportError::Io(e),
        })?;

        if &buf[0..4] != CONTAINER_MAGIC {
            return Err(ExportError::Deserialization(
                "not an object container (bad magic bytes)".into(),
            ));
        }
        if buf[4] != CONTAINER_VERSION {
            return Err(ExportError::Deserialization(format!(
                "unsupported container version {}",
                buf[4]
            )));
        }
        let kind = match buf[5] {
            0 => ContainerKind::Single,
            1 => ContainerKind::Named,
            other => {
                return Err(ExportError::Deserialization(format!(
                    "unknown container kind {}",
                    other
                )))
            }
        };
        let compressed = match buf[6] {
            0 => false,
            1 => true,
            other => {
                return Err(ExportError::Deserialization(format!(
                    "unknown compression flag {}",
                    other
                )))
            }
        };

        Ok(Self { kind, compressed })
    }
}

/// Payload as it will be laid out in the container
enum Planned<'a> {
    Single(Cow<'a, Value>),
    Named(Cow<'a, IndexMap<String, Value>>),
}

impl Planned<'_> {
    fn kind(&self) -> ContainerKind {
        match self {
            Planned::Single(_) => ContainerKind::Single,
            Planned::Named(_) => ContainerKind::Named,
        }
    }

    /// Fails on the first value that cannot be stored
    fn check_storable(&self) -> Result<()> {
        // A named container adds one level around its values
        let too_deep = match self {
            Planned::Single(value) => value.find_too_deep(MAX_NESTING),
            Planned::Named(map) => map.iter().find_map(|(name, value)| {
                value
                    .find_too_deep(MAX_NESTING)
                    .map(|path| rebase_path(name, &path))
            }),
        };
        if let Some(path) = too_deep {
            return Err(ExportError::Serialization {
                path,
                reason: format!("values are nested more than {} levels deep", MAX_NESTING),
            });
        }

        let found = match self {
            Planned::Single(value) => value.find_external(),
            Planned::Named(map) => map.iter().find_map(|(name, value)| {
                value
                    .find_external()
                    .map(|(path, resource)| (rebase_path(name, &path), resource))
            }),
        };

        match found {
            Some((path, resource)) => Err(ExportError::Serialization {
                path,
                reason: format!(
                    "{} resource ({}) only exists in the running process",
                    resource.kind, resource.description
                ),
            }),
            None => Ok(()),
        }
    }

    fn write_json<W: Write>(&self, writer: W) -> Result<()> {
        let written = match self {
            Planned::Single(value) => serde_json::to_writer(writer, &**value),
            Planned::Named(map) => serde_json::to_writer(writer, &**map),
        };
        written.map_err(|e| {
            if e.is_io() {
                ExportError::Io(e.into())
            } else {
                ExportError::Serialization {
                    path: "$".to_string(),
                    reason: e.to_string(),
                }
            }
        })
    }
}

/// `$` path of a binding's value, prefixed with the binding name
fn rebase_path(name: &str, path: &str) -> String {
    match path.strip_prefix('$') {
        Some("") | None => format!("${}", name),
        Some(rest) if rest.starts_with('[') => format!("${}{}", name, rest),
        Some(rest) => format!("${}.{}", name, rest),
    }
}

fn plan(payload: &ObjectPayload, mode: NameMode) -> Result<Planned<'_>> {
    match (mode, payload) {
        (NameMode::Discard, ObjectPayload::Single { value, .. }) => {
            Ok(Planned::Single(Cow::Borrowed(value)))
        }
        (NameMode::Discard, ObjectPayload::Named(map)) if map.len() == 1 => {
            Ok(Planned::Single(Cow::Borrowed(&map[0])))
        }
        (NameMode::Discard, ObjectPayload::Named(map)) => {
            Ok(Planned::Single(Cow::Owned(Value::Record(map.clone()))))
        }
        (NameMode::Preserve, ObjectPayload::Single { name: Some(name), value }) => {
            let mut map = IndexMap::with_capacity(1);
            map.insert(name.clone(), value.clone());
            Ok(Planned::Named(Cow::Owned(map)))
        }
        (NameMode::Preserve, ObjectPayload::Single { name: None, .. }) => {
            Err(ExportError::InvalidOptions(
                "preserving names requires a named value".into(),
            ))
        }
        (NameMode::Preserve, ObjectPayload::Named(map)) => Ok(Planned::Named(Cow::Borrowed(map))),
    }
}

/// Serialize `payload` into an object container at `path`.
///
/// Nothing is written when the payload holds a value that cannot be stored.
pub fn export_object(
    payload: &ObjectPayload,
    path: impl AsRef<Path>,
    options: &ObjectOptions,
) -> Result<ExportReport> {
    let path = path.as_ref();
    let planned = plan(payload, options.mode)?;
    planned.check_storable()?;

    let mut report = ExportReport::new(path, ExportFormat::Object);
    if let Planned::Single(value) = &planned {
        if let Some(table) = value.as_table() {
            report.rows_written = table.row_count();
        }
    }

    let mut writer = create_output(path)?;
    ContainerHeader {
        kind: planned.kind(),
        compressed: options.compress,
    }
    .write_to(&mut writer)?;

    if options.compress {
        let mut encoder = GzEncoder::new(writer, Compression::default());
        planned.write_json(&mut encoder)?;
        encoder.finish()?.flush()?;
    } else {
        planned.write_json(&mut writer)?;
        writer.flush()?;
    }

    report.finish()
}
