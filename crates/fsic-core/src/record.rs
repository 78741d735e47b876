//! Database records: `path,mode,inode,size,mtime,uid,gid,digest`.

use crate::attributes::{FileAttributes, ATTRIBUTE_FIELDS};
use crate::crypto::Digest;
use crate::error::{FsicError, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Upper bound on a record line, trailing newline not counted.
pub const MAX_RECORD_LEN: usize = 4096;
pub const FIELD_SEPARATOR: char = ',';
/// Path, six attributes, digest.
pub const RECORD_FIELDS: usize = ATTRIBUTE_FIELDS + 2;

/// Split a record into its comma-separated tokens, in order.
pub fn split_fields(text: &str) -> Vec<&str> {
    text.split(FIELD_SEPARATOR).collect()
}

/// Baseline of one file: its path, attributes and keyed content digest.
#[derive(Clone, PartialEq, Eq, Serialize, Zeroize, ZeroizeOnDrop)]
pub struct FileRecord {
    path: String,
    attributes: FileAttributes,
    digest: Digest,
}

impl FileRecord {
    pub fn new(path: impl Into<String>, attributes: FileAttributes, digest: Digest) -> Self {
        Self {
            path: path.into(),
            attributes,
            digest,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn attributes(&self) -> &FileAttributes {
        &self.attributes
    }

    pub fn digest(&self) -> &Digest {
        &self.digest
    }

    /// Newline-terminated database line.
    pub fn to_line(&self) -> Zeroizing<String> {
        Zeroizing::new(format!(
            "{}{}{}{}\n",
            self.path,
            FIELD_SEPARATOR,
            self.attributes.encode(),
            self.digest
        ))
    }

    pub fn parse(line: &str) -> Result<Self> {
        let line = line.strip_suffix('\n').unwrap_or(line);
        let fields = split_fields(line);
        if fields.len() != RECORD_FIELDS {
            return Err(FsicError::MalformedRecord(format!(
                "expected {} fields, found {}",
                RECORD_FIELDS,
                fields.len()
            )));
        }
        let path = fields[0];
        if !path.starts_with('/') {
            return Err(FsicError::MalformedRecord(format!(
                "path is not absolute: {path:?}"
            )));
        }
        let attributes = FileAttributes::decode(&fields[1..=ATTRIBUTE_FIELDS])?;
        let digest = Digest::parse(fields[RECORD_FIELDS - 1]).ok_or_else(|| {
            FsicError::MalformedRecord(format!("digest is not 0x-prefixed hex for {path}"))
        })?;
        Ok(Self::new(path, attributes, digest))
    }
}

impl std::fmt::Debug for FileRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileRecord")
            .field("path", &self.path)
            .field("attributes", &self.attributes)
            .field("digest", &self.digest)
            .finish()
    }
}

/// Outcome of [`read_line`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineRead {
    Line,
    /// Longer than `MAX_RECORD_LEN`; `buf` holds only the first bytes and
    /// the rest of the line has been discarded.
    Oversize,
    Eof,
}

/// Read one line into `buf` without its trailing newline.
///
/// At most `MAX_RECORD_LEN + 1` bytes are buffered, whatever the input.
pub fn read_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<LineRead> {
    buf.clear();
    let limit = MAX_RECORD_LEN as u64 + 1;
    if reader.by_ref().take(limit).read_until(b'\n', buf)? == 0 {
        return Ok(LineRead::Eof);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        return Ok(LineRead::Line);
    }
    if buf.len() <= MAX_RECORD_LEN {
        return Ok(LineRead::Line);
    }
    skip_line(reader)?;
    Ok(LineRead::Oversize)
}

/// Discard input up to and including the next newline.
fn skip_line<R: BufRead>(reader: &mut R) -> io::Result<()> {
    loop {
        let (used, found) = {
            let available = match reader.fill_buf() {
                Ok(available) => available,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            if available.is_empty() {
                return Ok(());
            }
            match available.iter().position(|&b| b == b'\n') {
                Some(end) => (end + 1, true),
                None => (available.len(), false),
            }
        };
        reader.consume(used);
        if found {
            return Ok(());
        }
    }
}

/// Writes a database from scratch: the target is truncated on creation.
pub struct DatabaseWriter {
    path: PathBuf,
    file: File,
    written: usize,
}

impl DatabaseWriter {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|e| FsicError::file(path, e))?;
        debug!("Truncated database {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            file,
            written: 0,
        })
    }

    pub fn append(&mut self, record: &FileRecord) -> Result<()> {
        let line = record.to_line();
        self.file
            .write_all(line.as_bytes())
            .map_err(|e| FsicError::file(&self.path, e))?;
        self.written += 1;
        Ok(())
    }

    /// Flush to stable storage; returns the number of records written.
    pub fn finish(mut self) -> Result<usize> {
        self.file
            .flush()
            .and_then(|_| self.file.sync_all())
            .map_err(|e| FsicError::file(&self.path, e))?;
        Ok(self.written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{hash_file, FileKey};
    use std::io::BufReader;
    use tempfile::tempdir;

    fn record() -> FileRecord {
        let digest = hash_file(&b"content"[..], 7, &FileKey::compiled_in()).unwrap();
        FileRecord::new(
            "/etc/hosts",
            FileAttributes {
                mode: 33188,
                inode: 42,
                size: 7,
                mtime: 1_700_000_000,
                uid: 0,
                gid: 0,
            },
            digest,
        )
    }

    #[test]
    fn line_layout() {
        let line = record().to_line();
        assert!(line.starts_with("/etc/hosts,33188,42,7,1700000000,0,0,0x"));
        assert!(line.ends_with('\n'));
        assert_eq!(split_fields(line.trim_end()).len(), RECORD_FIELDS);
    }

    #[test]
    fn parse_reads_back_line() {
        let original = record();
        assert_eq!(FileRecord::parse(&original.to_line()).unwrap(), original);
    }

    #[test]
    fn parse_rejects_wrong_field_count() {
        assert!(matches!(
            FileRecord::parse("/etc/hosts,1,2,3,4,5,6"),
            Err(FsicError::MalformedRecord(_))
        ));
        let line = record().to_line();
        let extra = format!("{},extra", line.trim_end());
        assert!(FileRecord::parse(&extra).is_err());
    }

    #[test]
    fn parse_rejects_bad_digest() {
        assert!(FileRecord::parse("/etc/hosts,1,2,3,4,5,6,deadbeef").is_err());
        assert!(FileRecord::parse("/etc/hosts,1,2,3,4,5,6,").is_err());
    }

    #[test]
    fn read_line_strips_newline_and_stops_at_eof() {
        let mut reader = BufReader::new(&b"/a\n/b"[..]);
        let mut buf = Vec::new();
        assert_eq!(read_line(&mut reader, &mut buf).unwrap(), LineRead::Line);
        assert_eq!(buf, b"/a");
        assert_eq!(read_line(&mut reader, &mut buf).unwrap(), LineRead::Line);
        assert_eq!(buf, b"/b");
        assert_eq!(read_line(&mut reader, &mut buf).unwrap(), LineRead::Eof);
    }

    #[test]
    fn read_line_accepts_line_at_the_limit() {
        let mut input = vec![b'/'];
        input.resize(MAX_RECORD_LEN, b'a');
        input.push(b'\n');
        let mut reader = BufReader::new(&input[..]);
        let mut buf = Vec::new();
        assert_eq!(read_line(&mut reader, &mut buf).unwrap(), LineRead::Line);
        assert_eq!(buf.len(), MAX_RECORD_LEN);
    }

    #[test]
    fn huge_line_is_bounded_and_skipped() {
        let mut input = vec![b'/'];
        input.resize(8 * 1024 * 1024, b'a');
        input.extend_from_slice(b"\n/next\n");
        let mut reader = BufReader::new(&input[..]);
        let mut buf = Vec::new();
        assert_eq!(read_line(&mut reader, &mut buf).unwrap(), LineRead::Oversize);
        assert!(buf.len() <= MAX_RECORD_LEN + 1);
        assert_eq!(read_line(&mut reader, &mut buf).unwrap(), LineRead::Line);
        assert_eq!(buf, b"/next");
        assert_eq!(read_line(&mut reader, &mut buf).unwrap(), LineRead::Eof);
    }

    #[test]
    fn huge_unterminated_line_stops_at_eof() {
        let mut input = vec![b'/'];
        input.resize(MAX_RECORD_LEN * 16, b'a');
        let mut reader = BufReader::new(&input[..]);
        let mut buf = Vec::new();
        assert_eq!(read_line(&mut reader, &mut buf).unwrap(), LineRead::Oversize);
        assert!(buf.len() <= MAX_RECORD_LEN + 1);
        assert_eq!(read_line(&mut reader, &mut buf).unwrap(), LineRead::Eof);
    }

    #[test]
    fn writer_truncates_existing_database() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fsic.db");
        std::fs::write(&path, "stale contents that must disappear\n").unwrap();
        let mut writer = DatabaseWriter::create(&path).unwrap();
        writer.append(&record()).unwrap();
        assert_eq!(writer.finish().unwrap(), 1);
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, record().to_line().as_str());
    }
}
