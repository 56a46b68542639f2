//! Bounded-memory batch writer
//!
//! Buffers flattened rows and writes each full buffer to its own Parquet file
//! under the batch directory. Each file's schema comes only from the keys
//! present in that batch; the merger reconciles them afterwards.

use super::schema::{build_record_batch, infer_columns, to_schema};
use crate::core::transform::Row;
use crate::domain::{MatrikelError, Result};
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};

/// A batch file written to disk
#[derive(Debug, Clone, Serialize)]
pub struct BatchFile {
    /// Zero-based batch number
    pub index: usize,
    pub path: PathBuf,
    pub rows: usize,
    pub columns: usize,
}

/// Writer properties shared by batch files and the merged artifact
pub(crate) fn writer_properties() -> WriterProperties {
    WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .set_created_by(format!("matrikel {}", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Accumulates rows and flushes every `batch_size` of them to a new file
///
/// On any write failure the files already written are deleted before the
/// error is returned, so a failed writer never leaves batches behind.
pub struct BatchWriter {
    dir: PathBuf,
    batch_size: usize,
    buffer: Vec<Row>,
    files: Vec<BatchFile>,
    rows_written: u64,
}

impl BatchWriter {
    /// Create a writer that places batch files in `dir`
    ///
    /// # Errors
    ///
    /// Returns an error if `batch_size` is zero or the directory cannot be created
    pub fn new(dir: impl Into<PathBuf>, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(MatrikelError::Configuration(
                "batch size must be greater than 0".to_string(),
            ));
        }
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| {
            MatrikelError::Io(format!(
                "Failed to create batch directory {}: {e}",
                dir.display()
            ))
        })?;

        Ok(Self {
            dir,
            batch_size,
            buffer: Vec::with_capacity(batch_size),
            files: Vec::new(),
            rows_written: 0,
        })
    }

    /// Add a row, flushing when the buffer reaches the batch size
    pub fn push(&mut self, row: Row) -> Result<()> {
        self.buffer.push(row);
        if self.buffer.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Write buffered rows to a new batch file; no-op when the buffer is empty
    pub fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let index = self.files.len();
        let path = self.dir.join(format!("batch_{index:06}.parquet"));
        let rows = std::mem::take(&mut self.buffer);

        match write_batch(&path, &rows) {
            Ok(columns) => {
                tracing::debug!(
                    batch = index,
                    rows = rows.len(),
                    columns,
                    path = %path.display(),
                    "Wrote batch file"
                );
                self.rows_written += rows.len() as u64;
                self.files.push(BatchFile {
                    index,
                    path,
                    rows: rows.len(),
                    columns,
                });
                self.buffer = Vec::with_capacity(self.batch_size);
                Ok(())
            }
            Err(e) => {
                let _ = std::fs::remove_file(&path);
                self.discard();
                Err(e)
            }
        }
    }

    /// Flush the remainder and return every batch file in write order
    pub fn finish(mut self) -> Result<Vec<BatchFile>> {
        self.flush()?;
        tracing::info!(
            batches = self.files.len(),
            rows = self.rows_written,
            "Batch writing complete"
        );
        Ok(std::mem::take(&mut self.files))
    }

    /// Delete every batch file written so far and drop buffered rows
    pub fn discard(&mut self) {
        remove_batch_files(&self.files);
        self.files.clear();
        self.buffer.clear();
    }

    pub fn files(&self) -> &[BatchFile] {
        &self.files
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

fn write_batch(path: &Path, rows: &[Row]) -> Result<usize> {
    let inferred = infer_columns(rows);
    let columns = inferred.len();
    let schema = to_schema(&inferred);
    let batch = build_record_batch(rows, schema.clone())?;

    let file = File::create(path).map_err(|e| {
        MatrikelError::Io(format!("Failed to create {}: {e}", path.display()))
    })?;
    let mut writer = ArrowWriter::try_new(file, schema, Some(writer_properties()))?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(columns)
}

/// Best-effort removal of batch files
pub(crate) fn remove_batch_files(files: &[BatchFile]) {
    for file in files {
        if let Err(e) = std::fs::remove_file(&file.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %file.path.display(), error = %e, "Failed to remove batch file");
            }
        }
    }
}
