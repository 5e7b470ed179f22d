//! Data model for tables, object values and workbook layouts

mod schema;
mod table;
mod value;
mod workbook;

pub use schema::{CellType, Column};
pub use table::{CellValue, Row, Table};
pub use value::{ExternalResource, Namespace, ObjectPayload, Value, MAX_NESTING};
pub use workbook::{
    column_letter, Border, BorderPosition, BorderWeight, CellRange, CellStyle, ColumnWidth,
    Decoration, DecorationKind, HorizontalAlign, SheetSpec, StyleRule, VerticalAlign, Workbook,
};

/// Stores reals by their IEEE-754 bit pattern so NaN payloads and signed
/// zeros survive a container round-trip.
pub(crate) mod float_bits {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.to_bits())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        u64::deserialize(deserializer).map(f64::from_bits)
    }
}
