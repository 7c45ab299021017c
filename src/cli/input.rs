//! Interactive input.

use crate::{Error, Result};
use std::io::BufRead;

/// Reads one keyword line from `reader`.
///
/// Only the line terminator is removed; the keyword is otherwise returned as
/// typed.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] at end of input and
/// [`Error::OperationFailed`] if reading fails.
pub fn read_keyword<R: BufRead>(mut reader: R) -> Result<String> {
    let mut line = String::new();
    let read = reader
        .read_line(&mut line)
        .map_err(|e| Error::operation_failed("read_keyword", e.to_string()))?;
    if read == 0 {
        return Err(Error::InvalidInput("no keyword provided".to_string()));
    }
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    Ok(line)
}
