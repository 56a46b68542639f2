//! Lazy feature stream over a payload document

use super::scanner::ElementScanner;
use crate::domain::{Feature, MatrikelError, Result, Value};
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

const READ_BUFFER_BYTES: usize = 1 << 20;

/// Running counts for a feature stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReadStats {
    /// Elements found in the feature array, malformed ones included
    pub read: u64,
    /// Elements that could not be parsed into a feature
    pub skipped: u64,
}

impl ReadStats {
    /// Features handed to the caller
    pub fn yielded(&self) -> u64 {
        self.read - self.skipped
    }
}

/// Lazy, finite, non-restartable sequence of features
///
/// Each item is either a parsed feature or a fatal document error. Malformed
/// individual features never surface as items; they are logged, counted in
/// [`ReadStats::skipped`], and the stream moves on.
///
/// # Examples
///
/// ```
/// use matrikel::core::stream::FeatureStream;
/// use std::io::Cursor;
///
/// let doc = r#"{"type": "FeatureCollection", "features": [
///     {"properties": {"n": 1}}, {"properties": }, {"properties": {"n": 3}}
/// ]}"#;
/// let mut stream = FeatureStream::new(Cursor::new(doc), 1 << 20, 50_000);
/// let features: Vec<_> = stream.by_ref().collect::<Result<_, _>>().unwrap();
///
/// assert_eq!(features.len(), 2);
/// assert_eq!(stream.stats().skipped, 1);
/// ```
pub struct FeatureStream<R> {
    scanner: ElementScanner<R>,
    stats: ReadStats,
    progress_interval: u64,
    finished: bool,
}

impl FeatureStream<BufReader<File>> {
    /// Open a payload document on disk
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened
    pub fn open(path: &Path, max_record_bytes: usize, progress_interval: u64) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            MatrikelError::Io(format!("Failed to open payload {}: {e}", path.display()))
        })?;
        let reader = BufReader::with_capacity(READ_BUFFER_BYTES, file);
        Ok(Self::new(reader, max_record_bytes, progress_interval))
    }
}

impl<R: BufRead> FeatureStream<R> {
    /// Create a stream over any buffered reader
    pub fn new(reader: R, max_record_bytes: usize, progress_interval: u64) -> Self {
        Self {
            scanner: ElementScanner::new(reader, max_record_bytes),
            stats: ReadStats::default(),
            progress_interval: progress_interval.max(1),
            finished: false,
        }
    }

    /// Counts so far
    pub fn stats(&self) -> ReadStats {
        self.stats
    }

    fn parse(index: u64, raw: &[u8]) -> Result<Feature> {
        let json: serde_json::Value =
            serde_json::from_slice(raw).map_err(|e| MatrikelError::Record {
                index,
                reason: e.to_string(),
            })?;
        Feature::from_value(index, Value::from(json))
    }
}

impl<R: BufRead> Iterator for FeatureStream<R> {
    type Item = Result<Feature>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            let raw = match self.scanner.next_element() {
                Ok(Some(raw)) => raw,
                Ok(None) => {
                    self.finished = true;
                    tracing::info!(
                        read = self.stats.read,
                        skipped = self.stats.skipped,
                        "Finished reading features"
                    );
                    return None;
                }
                Err(e) => {
                    self.finished = true;
                    tracing::error!(read = self.stats.read, error = %e, "Feature document is broken");
                    return Some(Err(e));
                }
            };

            self.stats.read += 1;
            let index = self.stats.read;
            let parsed = Self::parse(index, raw);

            if index % self.progress_interval == 0 {
                tracing::info!(
                    read = self.stats.read,
                    skipped = self.stats.skipped,
                    "Reading features"
                );
            }

            match parsed {
                Ok(feature) => return Some(Ok(feature)),
                Err(e) => {
                    self.stats.skipped += 1;
                    crate::log_record_skipped!(index, e);
                }
            }
        }
        None
    }
}
