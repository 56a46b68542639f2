//! Column type inference and schema union
//!
//! A batch's schema comes from the keys present in that batch alone, so the
//! same column may be typed differently in two batches. Types unify the same
//! way within a batch and across batches:
//!
//! | left    | right   | unified |
//! |---------|---------|---------|
//! | T       | T       | T       |
//! | Int64   | Float64 | Float64 |
//! | any     | other   | Utf8    |
//!
//! A batch whose rows carry no values at all still needs one column for its
//! row count to survive a Parquet round trip. Such a batch gets an all-null
//! placeholder column, tagged in the field metadata so the merger leaves it
//! out of the union.

use crate::core::transform::{Row, FEATURE_ID_COLUMN};
use crate::domain::{MatrikelError, Result, Value};
use arrow::array::{ArrayRef, AsArray, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Field metadata key marking the placeholder column
const PLACEHOLDER_KEY: &str = "matrikel.placeholder";

/// Column types produced by the writer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Boolean,
    Int64,
    Float64,
    Utf8,
}

impl ColumnType {
    /// Type of a single value; `None` for null
    pub fn of(value: &Value) -> Option<ColumnType> {
        match value {
            Value::Null => None,
            Value::Bool(_) => Some(ColumnType::Boolean),
            Value::Int(_) => Some(ColumnType::Int64),
            Value::Float(_) => Some(ColumnType::Float64),
            Value::String(_) | Value::Seq(_) | Value::Map(_) => Some(ColumnType::Utf8),
        }
    }

    /// Smallest type both can be stored as
    pub fn unify(self, other: ColumnType) -> ColumnType {
        use ColumnType::*;
        match (self, other) {
            (a, b) if a == b => a,
            (Int64, Float64) | (Float64, Int64) => Float64,
            _ => Utf8,
        }
    }

    /// Arrow data type
    pub fn to_arrow(self) -> DataType {
        match self {
            ColumnType::Boolean => DataType::Boolean,
            ColumnType::Int64 => DataType::Int64,
            ColumnType::Float64 => DataType::Float64,
            ColumnType::Utf8 => DataType::Utf8,
        }
    }

    /// Map an Arrow type read back from a file
    pub fn from_arrow(data_type: &DataType) -> ColumnType {
        match data_type {
            DataType::Boolean => ColumnType::Boolean,
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32 => ColumnType::Int64,
            DataType::Float16 | DataType::Float32 | DataType::Float64 => ColumnType::Float64,
            _ => ColumnType::Utf8,
        }
    }
}

/// Column name to type, ordered by name
pub type ColumnSet = BTreeMap<String, ColumnType>;

/// Infer the column set of a batch from the keys present in its rows
pub fn infer_columns(rows: &[Row]) -> ColumnSet {
    let mut columns = ColumnSet::new();
    for row in rows {
        for (name, value) in row {
            if let Some(ty) = ColumnType::of(value) {
                columns
                    .entry(name.clone())
                    .and_modify(|existing| *existing = existing.unify(ty))
                    .or_insert(ty);
            }
        }
    }
    columns
}

/// Column set of an Arrow schema, without the placeholder column
pub fn columns_of(schema: &Schema) -> ColumnSet {
    schema
        .fields()
        .iter()
        .filter(|f| !f.metadata().contains_key(PLACEHOLDER_KEY))
        .map(|f| (f.name().clone(), ColumnType::from_arrow(f.data_type())))
        .collect()
}

/// Union of column sets; a column typed differently in two sets is unified
pub fn union_columns<'a>(sets: impl IntoIterator<Item = &'a ColumnSet>) -> ColumnSet {
    let mut union = ColumnSet::new();
    for set in sets {
        for (name, ty) in set {
            union
                .entry(name.clone())
                .and_modify(|existing| *existing = existing.unify(*ty))
                .or_insert(*ty);
        }
    }
    union
}

/// Arrow schema for a column set; every column is nullable
///
/// An empty set yields the single placeholder column.
pub fn to_schema(columns: &ColumnSet) -> SchemaRef {
    if columns.is_empty() {
        return Arc::new(Schema::new(vec![placeholder_field()]));
    }
    Arc::new(Schema::new(
        columns
            .iter()
            .map(|(name, ty)| Field::new(name, ty.to_arrow(), true))
            .collect::<Vec<_>>(),
    ))
}

fn placeholder_field() -> Field {
    Field::new(FEATURE_ID_COLUMN, DataType::Utf8, true).with_metadata(HashMap::from([(
        PLACEHOLDER_KEY.to_string(),
        "true".to_string(),
    )]))
}

/// Build a record batch from rows; absent keys become nulls
///
/// # Errors
///
/// Returns `MatrikelError::Columnar` if Arrow rejects the arrays
pub fn build_record_batch(rows: &[Row], schema: SchemaRef) -> Result<RecordBatch> {
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());

    for field in schema.fields() {
        let name = field.name();
        let cells = rows.iter().map(|row| row.get(name));
        let array: ArrayRef = match ColumnType::from_arrow(field.data_type()) {
            ColumnType::Boolean => Arc::new(
                cells
                    .map(|v| match v {
                        Some(Value::Bool(b)) => Some(*b),
                        _ => None,
                    })
                    .collect::<BooleanArray>(),
            ),
            ColumnType::Int64 => Arc::new(
                cells
                    .map(|v| match v {
                        Some(Value::Int(i)) => Some(*i),
                        _ => None,
                    })
                    .collect::<Int64Array>(),
            ),
            ColumnType::Float64 => Arc::new(
                cells
                    .map(|v| match v {
                        Some(Value::Float(f)) => Some(*f),
                        Some(Value::Int(i)) => Some(*i as f64),
                        _ => None,
                    })
                    .collect::<Float64Array>(),
            ),
            ColumnType::Utf8 => text_column(rows, name)?,
        };
        arrays.push(array);
    }

    let options = RecordBatchOptions::new().with_row_count(Some(rows.len()));
    RecordBatch::try_new_with_options(schema, arrays, &options)
        .map_err(|e| MatrikelError::Columnar(format!("Failed to build record batch: {e}")))
}

/// Text column of mixed values
///
/// Floats are rendered by Arrow's own cast, the same one the merger applies
/// when a Float64 column meets a Utf8 column from another batch.
fn text_column(rows: &[Row], name: &str) -> Result<ArrayRef> {
    let floats: Float64Array = rows
        .iter()
        .map(|row| match row.get(name) {
            Some(Value::Float(f)) => Some(*f),
            _ => None,
        })
        .collect();
    let float_text = cast(&floats, &DataType::Utf8)?;
    let float_text = float_text.as_string::<i32>();

    let texts: StringArray = rows
        .iter()
        .enumerate()
        .map(|(i, row)| match row.get(name) {
            Some(Value::Float(_)) => Some(float_text.value(i).to_string()),
            Some(other) => text_of(other),
            None => None,
        })
        .collect();
    Ok(Arc::new(texts))
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Int(i) => Some(i.to_string()),
        Value::Float(f) => Some(f.to_string()),
        Value::Seq(_) | Value::Map(_) => Some(value.to_json_string()),
    }
}
