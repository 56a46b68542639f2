//! Two-pass merge of batch files into one artifact
//!
//! Pass one reads only the footer schema of each batch and builds the union of
//! columns. Pass two streams every batch through, conforming it to the union
//! schema: missing columns are filled with nulls and differently-typed columns
//! are cast to the unified type. Only one record batch is in memory at a time.

use super::schema::{columns_of, to_schema, union_columns, ColumnSet};
use super::writer::{remove_batch_files, writer_properties, BatchFile};
use crate::domain::{MatrikelError, Result};
use arrow::array::{new_null_array, ArrayRef};
use arrow::compute::cast;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};

const READ_BATCH_ROWS: usize = 8192;

/// Result of a successful merge
#[derive(Debug, Clone, Serialize)]
pub struct MergeOutcome {
    pub path: PathBuf,
    pub rows: u64,
    pub columns: usize,
    pub batches: usize,
    pub bytes: u64,
}

/// Merge `files` into a single Parquet file at `output`
///
/// Batch files are deleted once the merged file is closed. On failure the
/// batch files and any partial output are deleted as well.
///
/// # Errors
///
/// Returns `MatrikelError::Columnar` if there is nothing to merge or a batch
/// cannot be read, conformed or written.
pub fn merge_batches(files: &[BatchFile], output: &Path) -> Result<MergeOutcome> {
    let result = merge_inner(files, output);
    remove_batch_files(files);
    if result.is_err() {
        let _ = std::fs::remove_file(output);
    }
    result
}

fn merge_inner(files: &[BatchFile], output: &Path) -> Result<MergeOutcome> {
    if files.is_empty() {
        return Err(MatrikelError::Columnar("no batch files to merge".to_string()));
    }

    let mut sets: Vec<ColumnSet> = Vec::with_capacity(files.len());
    for file in files {
        let builder = open(&file.path)?;
        sets.push(columns_of(builder.schema()));
    }
    let union = union_columns(sets.iter());
    let schema = to_schema(&union);
    tracing::info!(
        batches = files.len(),
        columns = union.len(),
        "Merging batch files"
    );

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let sink = File::create(output).map_err(|e| {
        MatrikelError::Io(format!("Failed to create {}: {e}", output.display()))
    })?;
    let mut writer = ArrowWriter::try_new(sink, schema.clone(), Some(writer_properties()))?;

    let mut rows = 0u64;
    for file in files {
        let reader = open(&file.path)?.with_batch_size(READ_BATCH_ROWS).build()?;
        for batch in reader {
            let batch = batch?;
            let conformed = conform(&batch, &schema)?;
            rows += conformed.num_rows() as u64;
            writer.write(&conformed)?;
        }
        tracing::debug!(batch = file.index, "Merged batch file");
    }
    writer.close()?;

    let bytes = std::fs::metadata(output)?.len();
    tracing::info!(
        rows,
        columns = union.len(),
        bytes,
        path = %output.display(),
        "Merged artifact written"
    );

    Ok(MergeOutcome {
        path: output.to_path_buf(),
        rows,
        columns: union.len(),
        batches: files.len(),
        bytes,
    })
}

fn open(path: &Path) -> Result<ParquetRecordBatchReaderBuilder<File>> {
    let file = File::open(path)
        .map_err(|e| MatrikelError::Io(format!("Failed to open {}: {e}", path.display())))?;
    ParquetRecordBatchReaderBuilder::try_new(file).map_err(|e| {
        MatrikelError::Columnar(format!("Failed to read batch {}: {e}", path.display()))
    })
}

/// Reshape a batch to the union schema
fn conform(batch: &RecordBatch, schema: &SchemaRef) -> Result<RecordBatch> {
    let columns = schema
        .fields()
        .iter()
        .map(|field| -> Result<ArrayRef> {
            match batch.column_by_name(field.name()) {
                Some(column) if column.data_type() == field.data_type() => Ok(column.clone()),
                Some(column) => Ok(cast(column, field.data_type())?),
                None => Ok(new_null_array(field.data_type(), batch.num_rows())),
            }
        })
        .collect::<Result<Vec<_>>>()?;
    let options = RecordBatchOptions::new().with_row_count(Some(batch.num_rows()));
    Ok(RecordBatch::try_new_with_options(schema.clone(), columns, &options)?)
}
