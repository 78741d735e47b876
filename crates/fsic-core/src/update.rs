//! Rebuild the integrity database from the configured file list.

use crate::attributes::FileAttributes;
use crate::config::FsicConfig;
use crate::crypto::{hash_file, FileKey};
use crate::error::{FsicError, InvalidRecord, Result};
use crate::password::Authenticator;
use crate::record::{read_line, DatabaseWriter, FileRecord, LineRead, MAX_RECORD_LEN};
use crate::self_test::SelfTest;
use crate::validate::validate_path;
use serde::Serialize;
use std::fs::{self, File};
use std::io::BufReader;
use tracing::{debug, error, info, warn};
use zeroize::Zeroizing;

/// Outcome of one database rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateSummary {
    /// Non-blank lines in the config file list.
    pub files_listed: usize,
    pub records_written: usize,
    pub skipped: usize,
    pub self_test_refreshed: bool,
}

/// Build the baseline record for the file at `path`.
pub fn baseline_file(path: &str, key: &FileKey) -> Result<FileRecord> {
    let path = validate_path(path.as_bytes())?;
    let file = File::open(path).map_err(|e| FsicError::file(path, e))?;
    match fs::symlink_metadata(path) {
        Ok(link) if link.file_type().is_symlink() => {
            warn!("{} is a symbolic link; recording its target", path);
        }
        _ => {}
    }
    let metadata = file.metadata().map_err(|e| FsicError::file(path, e))?;
    let attributes = FileAttributes::from_metadata(&metadata);
    let digest = hash_file(&file, attributes.size, key)?;
    let record = FileRecord::new(path, attributes, digest);
    let len = record.to_line().trim_end_matches('\n').len();
    if len > MAX_RECORD_LEN {
        return Err(InvalidRecord::TooLong {
            len,
            max: MAX_RECORD_LEN,
        }
        .into());
    }
    Ok(record)
}

/// Authenticate, then truncate and rewrite the database.
///
/// Nothing is opened or written unless `auth` succeeds. Per-file failures
/// are logged and skipped; write errors on the database abort the run.
pub fn update_database(
    config: &FsicConfig,
    key: &FileKey,
    auth: &mut dyn Authenticator,
) -> Result<UpdateSummary> {
    auth.authenticate()?;

    let list = File::open(&config.config_file).map_err(|e| {
        error!("Could not open config file {}: {}", config.config_file.display(), e);
        FsicError::file(&config.config_file, e)
    })?;
    let mut reader = BufReader::new(list);
    let mut writer = DatabaseWriter::create(&config.database_file)?;
    let mut summary = UpdateSummary::default();

    loop {
        let mut buf = Zeroizing::new(Vec::new());
        let read = read_line(&mut reader, &mut buf)
            .map_err(|e| FsicError::file(&config.config_file, e))?;
        match read {
            LineRead::Eof => break,
            LineRead::Oversize => {
                warn!("Skipping config entry longer than {} bytes", MAX_RECORD_LEN);
                summary.files_listed += 1;
                summary.skipped += 1;
                continue;
            }
            LineRead::Line if buf.iter().all(u8::is_ascii_whitespace) => continue,
            LineRead::Line => {}
        }
        summary.files_listed += 1;

        let path = match validate_path(&buf) {
            Ok(path) => path,
            Err(reason) => {
                warn!("Skipping config entry: {}", reason);
                summary.skipped += 1;
                continue;
            }
        };
        match baseline_file(path, key) {
            Ok(record) => {
                writer.append(&record)?;
                debug!("Recorded {}", path);
            }
            Err(e) => {
                warn!("Skipping {}: {}", path, e);
                summary.skipped += 1;
            }
        }
    }
    summary.records_written = writer.finish()?;
    info!(
        "Updated database {}: {} records written, {} skipped",
        config.database_file.display(),
        summary.records_written,
        summary.skipped
    );

    match SelfTest::from_config(config).and_then(|test| test.refresh(key)) {
        Ok(_) => summary.self_test_refreshed = true,
        Err(e) => error!("Could not refresh self-test database: {}", e),
    }
    Ok(summary)
}
