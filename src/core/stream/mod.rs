//! Streaming record reader
//!
//! Yields one feature at a time from a multi-gigabyte document without ever
//! holding the parsed document in memory. Only the raw bytes of the current
//! feature are buffered.

pub mod reader;
pub mod scanner;

pub use reader::{FeatureStream, ReadStats};
pub use scanner::ElementScanner;
