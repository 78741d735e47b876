//! Guards against malformed or hostile database lines and config paths.
//!
//! Only printable ASCII is accepted, which keeps control characters, binary
//! garbage and non-ASCII look-alikes out of paths before anything is opened.

use crate::error::InvalidRecord;
use crate::record::{FIELD_SEPARATOR, MAX_RECORD_LEN};
use std::fs;
use std::io;

/// Upper bound on a configured path.
pub const MAX_PATH_LEN: usize = 4096;

const PRINTABLE: std::ops::RangeInclusive<u8> = 32..=126;

fn check_printable(bytes: &[u8]) -> Result<(), InvalidRecord> {
    match bytes.iter().position(|b| !PRINTABLE.contains(b)) {
        Some(offset) => Err(InvalidRecord::NonPrintable {
            offset,
            byte: bytes[offset],
        }),
        None => Ok(()),
    }
}

fn as_text(bytes: &[u8]) -> &str {
    // printable ASCII is always valid UTF-8
    std::str::from_utf8(bytes).unwrap_or_default()
}

/// Validate one database line; a single trailing newline is tolerated and
/// does not count towards `MAX_RECORD_LEN`.
///
/// Returns the line text without the newline.
pub fn validate_record(line: &[u8]) -> Result<&str, InvalidRecord> {
    let body = line.strip_suffix(b"\n").unwrap_or(line);
    if body.is_empty() {
        return Err(InvalidRecord::Empty);
    }
    if body.len() > MAX_RECORD_LEN {
        return Err(InvalidRecord::TooLong {
            len: body.len(),
            max: MAX_RECORD_LEN,
        });
    }
    if body[0] != b'/' {
        return Err(InvalidRecord::NotAbsolute);
    }
    check_printable(body)?;
    let text = as_text(body);
    let path = match text.find(FIELD_SEPARATOR) {
        Some(end) if end > 0 => &text[..end],
        _ => return Err(InvalidRecord::MissingPath),
    };
    match fs::metadata(path) {
        Ok(_) => Ok(text),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(InvalidRecord::NoSuchFile(path.to_string()))
        }
        Err(e) => Err(InvalidRecord::StatFailed {
            path: path.to_string(),
            kind: e.kind(),
        }),
    }
}

/// Validate a bare path from the config file list.
pub fn validate_path(path: &[u8]) -> Result<&str, InvalidRecord> {
    if path.is_empty() {
        return Err(InvalidRecord::Empty);
    }
    if path.len() > MAX_PATH_LEN {
        return Err(InvalidRecord::TooLong {
            len: path.len(),
            max: MAX_PATH_LEN,
        });
    }
    if path[0] != b'/' {
        return Err(InvalidRecord::NotAbsolute);
    }
    check_printable(path)?;
    if path.contains(&(FIELD_SEPARATOR as u8)) {
        return Err(InvalidRecord::EmbeddedComma);
    }
    Ok(as_text(path))
}
