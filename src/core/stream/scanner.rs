//! Byte-level scanner for the top-level feature array
//!
//! Finds the `features` member of the top-level object (or accepts a bare
//! top-level array) and cuts every array element out as raw bytes by tracking
//! nesting depth and string/escape state. Elements are never interpreted here,
//! so one malformed element cannot desynchronize the scan as long as its
//! brackets and quotes balance.

use crate::domain::{MatrikelError, Result};
use std::io::BufRead;

const FEATURES_KEY: &str = "features";
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Start,
    FirstElement,
    InArray,
    Done,
}

/// Splits a JSON document into the raw elements of its feature array
pub struct ElementScanner<R> {
    reader: R,
    state: ScanState,
    max_element_bytes: usize,
    buf: Vec<u8>,
    elements: u64,
}

impl<R: BufRead> ElementScanner<R> {
    /// Create a scanner; elements larger than `max_element_bytes` are fatal
    pub fn new(reader: R, max_element_bytes: usize) -> Self {
        Self {
            reader,
            state: ScanState::Start,
            max_element_bytes,
            buf: Vec::new(),
            elements: 0,
        }
    }

    /// Raw bytes of the next element, or `None` once the array is closed
    ///
    /// # Errors
    ///
    /// Returns `MatrikelError::Document` when the outer structure is broken
    /// and `MatrikelError::Io` when the reader fails. Both are fatal; the
    /// scanner yields nothing further afterwards.
    pub fn next_element(&mut self) -> Result<Option<&[u8]>> {
        let result = self.advance();
        if result.is_err() {
            self.state = ScanState::Done;
        }
        match result? {
            true => Ok(Some(&self.buf)),
            false => Ok(None),
        }
    }

    fn advance(&mut self) -> Result<bool> {
        loop {
            match self.state {
                ScanState::Done => return Ok(false),
                ScanState::Start => {
                    self.locate_array()?;
                    self.state = ScanState::FirstElement;
                }
                ScanState::FirstElement => {
                    self.state = ScanState::InArray;
                    if self.peek_non_ws()? == Some(b']') {
                        self.reader.consume(1);
                        self.state = ScanState::Done;
                        continue;
                    }
                    return self.capture_element();
                }
                ScanState::InArray => match self.peek_non_ws()? {
                    Some(b',') => {
                        self.reader.consume(1);
                        return self.capture_element();
                    }
                    Some(b']') => {
                        self.reader.consume(1);
                        self.state = ScanState::Done;
                    }
                    Some(other) => {
                        return Err(MatrikelError::Document(format!(
                            "expected ',' or ']' after feature #{}, found '{}'",
                            self.elements,
                            char::from(other)
                        )))
                    }
                    None => {
                        return Err(MatrikelError::Document(format!(
                            "document ended inside the feature array after {} feature(s)",
                            self.elements
                        )))
                    }
                },
            }
        }
    }

    fn capture_element(&mut self) -> Result<bool> {
        self.elements += 1;
        if self.peek_non_ws()?.is_none() {
            return Err(MatrikelError::Document(format!(
                "document ended before feature #{}",
                self.elements
            )));
        }
        self.scan_value(true)?;
        Ok(true)
    }

    /// Position the reader just inside the feature array
    fn locate_array(&mut self) -> Result<()> {
        if self.reader.fill_buf()?.starts_with(UTF8_BOM) {
            self.reader.consume(UTF8_BOM.len());
        }

        match self.peek_non_ws()? {
            Some(b'[') => {
                self.reader.consume(1);
                return Ok(());
            }
            Some(b'{') => self.reader.consume(1),
            Some(other) => {
                return Err(MatrikelError::Document(format!(
                    "document must start with '{{' or '[', found '{}'",
                    char::from(other)
                )))
            }
            None => return Err(MatrikelError::Document("document is empty".to_string())),
        }

        loop {
            match self.peek_non_ws()? {
                Some(b'"') => {}
                Some(b'}') | None => {
                    return Err(MatrikelError::Document(format!(
                        "no '{FEATURES_KEY}' array in the top-level object"
                    )))
                }
                Some(other) => {
                    return Err(MatrikelError::Document(format!(
                        "expected a member name in the top-level object, found '{}'",
                        char::from(other)
                    )))
                }
            }

            self.scan_value(true)?;
            let key: String = serde_json::from_slice(&self.buf).map_err(|e| {
                MatrikelError::Document(format!("invalid member name in top-level object: {e}"))
            })?;

            if self.peek_non_ws()? != Some(b':') {
                return Err(MatrikelError::Document(format!(
                    "expected ':' after top-level member '{key}'"
                )));
            }
            self.reader.consume(1);

            let first = self.peek_non_ws()?;
            if key == FEATURES_KEY {
                if first != Some(b'[') {
                    return Err(MatrikelError::Document(format!(
                        "top-level '{FEATURES_KEY}' member is not an array"
                    )));
                }
                self.reader.consume(1);
                return Ok(());
            }

            if first.is_none() {
                return Err(MatrikelError::Document(format!(
                    "document ended in top-level member '{key}'"
                )));
            }
            self.scan_value(false)?;

            match self.peek_non_ws()? {
                Some(b',') => self.reader.consume(1),
                _ => {
                    return Err(MatrikelError::Document(format!(
                        "no '{FEATURES_KEY}' array in the top-level object"
                    )))
                }
            }
        }
    }

    /// Consume one JSON value, copying it into `buf` when `capture` is set
    ///
    /// The reader must be positioned on the first byte of the value. Scalars
    /// end at the first delimiter, which is left unconsumed.
    fn scan_value(&mut self, capture: bool) -> Result<()> {
        self.buf.clear();
        let mut depth: usize = 0;
        let mut in_string = false;
        let mut escaped = false;

        loop {
            let available = self.reader.fill_buf()?;
            if available.is_empty() {
                return Err(MatrikelError::Document(format!(
                    "document ended unexpectedly after {} feature(s)",
                    self.elements
                )));
            }

            let mut end = None;
            for (i, &byte) in available.iter().enumerate() {
                if in_string {
                    if escaped {
                        escaped = false;
                    } else if byte == b'\\' {
                        escaped = true;
                    } else if byte == b'"' {
                        in_string = false;
                        if depth == 0 {
                            end = Some(i + 1);
                            break;
                        }
                    }
                    continue;
                }

                match byte {
                    b'"' => in_string = true,
                    b'{' | b'[' => depth += 1,
                    b'}' | b']' if depth == 0 => {
                        end = Some(i);
                        break;
                    }
                    b'}' | b']' => {
                        depth -= 1;
                        if depth == 0 {
                            end = Some(i + 1);
                            break;
                        }
                    }
                    b',' | b' ' | b'\n' | b'\r' | b'\t' if depth == 0 => {
                        end = Some(i);
                        break;
                    }
                    _ => {}
                }
            }

            let taken = end.unwrap_or(available.len());
            if capture {
                if self.buf.len() + taken > self.max_element_bytes {
                    return Err(MatrikelError::Document(format!(
                        "feature #{} exceeds the {} byte record limit",
                        self.elements, self.max_element_bytes
                    )));
                }
                self.buf.extend_from_slice(&available[..taken]);
            }
            self.reader.consume(taken);

            if end.is_some() {
                return Ok(());
            }
        }
    }

    /// Skip whitespace and return the next byte without consuming it
    fn peek_non_ws(&mut self) -> Result<Option<u8>> {
        loop {
            let available = self.reader.fill_buf()?;
            if available.is_empty() {
                return Ok(None);
            }
            match available.iter().position(|b| !b.is_ascii_whitespace()) {
                Some(i) => {
                    let byte = available[i];
                    self.reader.consume(i);
                    return Ok(Some(byte));
                }
                None => {
                    let len = available.len();
                    self.reader.consume(len);
                }
            }
        }
    }
}
