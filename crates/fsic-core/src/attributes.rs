//! Canonical text form of the file metadata kept in each database record.
//!
//! Attributes are written as six comma-terminated decimal integers in the
//! fixed order `mode,inode,size,mtime,uid,gid,`.

use crate::error::{FsicError, Result};
use serde::{Deserialize, Serialize};
use std::fs::Metadata;
use std::str::FromStr;
use zeroize::Zeroize;

/// Number of attribute fields in a record.
pub const ATTRIBUTE_FIELDS: usize = 6;

/// Metadata recorded for a file at baseline time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Zeroize)]
pub struct FileAttributes {
    pub mode: u32,
    pub inode: u64,
    pub size: u64,
    pub mtime: i64,
    pub uid: u32,
    pub gid: u32,
}

impl FileAttributes {
    #[cfg(unix)]
    pub fn from_metadata(metadata: &Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;
        Self {
            mode: metadata.mode(),
            inode: metadata.ino(),
            size: metadata.size(),
            mtime: metadata.mtime(),
            uid: metadata.uid(),
            gid: metadata.gid(),
        }
    }

    #[cfg(not(unix))]
    pub fn from_metadata(metadata: &Metadata) -> Self {
        let mtime = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .and_then(|d| i64::try_from(d.as_secs()).ok())
            .unwrap_or(0);
        let mode = if metadata.permissions().readonly() { 0o444 } else { 0o644 };
        Self {
            mode,
            inode: 0,
            size: metadata.len(),
            mtime,
            uid: 0,
            gid: 0,
        }
    }

    pub fn encode(&self) -> String {
        format!(
            "{},{},{},{},{},{},",
            self.mode, self.inode, self.size, self.mtime, self.uid, self.gid
        )
    }

    /// Parse the first six tokens of `fields` positionally.
    pub fn decode(fields: &[&str]) -> Result<Self> {
        if fields.len() < ATTRIBUTE_FIELDS {
            return Err(FsicError::MalformedRecord(format!(
                "expected {} attribute fields, found {}",
                ATTRIBUTE_FIELDS,
                fields.len()
            )));
        }
        Ok(Self {
            mode: parse_field(fields[0], "mode")?,
            inode: parse_field(fields[1], "inode")?,
            size: parse_field(fields[2], "size")?,
            mtime: parse_field(fields[3], "mtime")?,
            uid: parse_field(fields[4], "uid")?,
            gid: parse_field(fields[5], "gid")?,
        })
    }
}

fn parse_field<T: FromStr>(token: &str, name: &str) -> Result<T> {
    if token.is_empty() {
        return Err(FsicError::MalformedRecord(format!("{name} is empty")));
    }
    token
        .parse()
        .map_err(|_| FsicError::MalformedRecord(format!("{name} is not a valid number: {token:?}")))
}
