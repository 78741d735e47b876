//! Re-check every database record against the live file system.

use crate::anomaly::{AnomalyKind, AnomalyReport, CheckSummary};
use crate::attributes::FileAttributes;
use crate::crypto::{hash_file, FileKey};
use crate::error::{FsicError, InvalidRecord, Result};
use crate::record::{read_line, FileRecord, LineRead, MAX_RECORD_LEN};
use crate::validate::validate_record;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;
use tracing::{debug, error, info, warn};
use zeroize::Zeroizing;

/// Check every record of the database at `database`.
///
/// Only failing to open the database is fatal; every per-line problem is
/// reported as an anomaly and the run continues.
pub fn check_database(database: &Path, key: &FileKey) -> Result<CheckSummary> {
    let file = File::open(database).map_err(|e| {
        error!("Could not open database {}: {}", database.display(), e);
        FsicError::file(database, e)
    })?;
    let mut reader = BufReader::new(file);
    let mut summary = CheckSummary::new(database.to_path_buf());
    let mut line_no = 0;

    loop {
        let mut buf = Zeroizing::new(Vec::new());
        let read = read_line(&mut reader, &mut buf).map_err(|e| FsicError::file(database, e))?;
        if read == LineRead::Eof {
            break;
        }
        line_no += 1;
        summary.records_read += 1;
        if read == LineRead::Oversize {
            warn!(
                "Line {} of {}: invalid record: longer than {} bytes",
                line_no,
                database.display(),
                MAX_RECORD_LEN
            );
            summary.record(AnomalyReport::single(line_no, None, AnomalyKind::InvalidRecord));
            continue;
        }

        let text = match validate_record(&buf) {
            Ok(text) => text,
            Err(InvalidRecord::NoSuchFile(path)) => {
                warn!("{}: file missing", path);
                summary.record(AnomalyReport::single(line_no, Some(path), AnomalyKind::FileMissing));
                continue;
            }
            Err(InvalidRecord::StatFailed { path, kind }) => {
                warn!("{}: stat failed: {}", path, kind);
                summary.record(AnomalyReport::single(line_no, Some(path), AnomalyKind::StatFailed));
                continue;
            }
            Err(reason) => {
                warn!("Line {} of {}: invalid record: {}", line_no, database.display(), reason);
                summary.record(AnomalyReport::single(line_no, None, AnomalyKind::InvalidRecord));
                continue;
            }
        };
        let record = match FileRecord::parse(text) {
            Ok(record) => record,
            Err(e) => {
                warn!("Line {} of {}: {}", line_no, database.display(), e);
                summary.record(AnomalyReport::single(line_no, None, AnomalyKind::MalformedRecord));
                continue;
            }
        };

        let report = check_record(line_no, &record, key);
        if !report.contains(AnomalyKind::FileMissing)
            && !report.contains(AnomalyKind::Unreadable)
            && !report.contains(AnomalyKind::StatFailed)
        {
            summary.files_checked += 1;
        }
        summary.record(report);
    }

    info!(
        "Checked {} records from {}: {} anomalies",
        summary.records_read,
        database.display(),
        summary.total_anomalies()
    );
    Ok(summary)
}

/// Compare one baseline record with the file it names.
pub fn check_record(line: usize, record: &FileRecord, key: &FileKey) -> AnomalyReport {
    let path = record.path();
    let mut report = AnomalyReport::new(line, Some(path.to_string()));

    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!("{}: file missing", path);
            report.push(AnomalyKind::FileMissing);
            return report;
        }
        Err(e) => {
            warn!("{}: could not open: {}", path, e);
            report.push(AnomalyKind::Unreadable);
            return report;
        }
    };
    let metadata = match file.metadata() {
        Ok(metadata) => metadata,
        Err(e) => {
            warn!("{}: stat failed: {}", path, e);
            report.push(AnomalyKind::StatFailed);
            return report;
        }
    };
    let live = FileAttributes::from_metadata(&metadata);
    let live_digest = match hash_file(&file, live.size, key) {
        Ok(digest) => Some(digest),
        Err(e) => {
            warn!("{}: could not hash: {}", path, e);
            None
        }
    };

    for kind in compare_attributes(record.attributes(), &live) {
        warn!("{}: {}", path, kind);
        report.push(kind);
    }
    if live_digest.as_ref() != Some(record.digest()) {
        warn!("{}: {}", path, AnomalyKind::Digest);
        report.push(AnomalyKind::Digest);
    }

    if report.is_clean() {
        info!("{}: no anomalies", path);
    } else {
        warn!("{}: {} anomalies", path, report.count());
    }
    debug!("{}: live attributes {:?}", path, live);
    report
}

/// Attribute mismatches in the fixed order mode, inode, uid, gid, size, mtime.
pub fn compare_attributes(baseline: &FileAttributes, live: &FileAttributes) -> Vec<AnomalyKind> {
    let checks = [
        (baseline.mode != live.mode, AnomalyKind::Permissions),
        (baseline.inode != live.inode, AnomalyKind::Inode),
        (baseline.uid != live.uid, AnomalyKind::Uid),
        (baseline.gid != live.gid, AnomalyKind::Gid),
        (baseline.size != live.size, AnomalyKind::Size),
        (baseline.mtime != live.mtime, AnomalyKind::ModificationTime),
    ];
    checks
        .into_iter()
        .filter_map(|(differs, kind)| differs.then_some(kind))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::DatabaseWriter;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn baseline(path: &Path, key: &FileKey) -> FileRecord {
        let file = File::open(path).unwrap();
        let metadata = file.metadata().unwrap();
        let attributes = FileAttributes::from_metadata(&metadata);
        let digest = hash_file(&file, attributes.size, key).unwrap();
        FileRecord::new(path.to_str().unwrap(), attributes, digest)
    }

    fn setup(names: &[&str]) -> (TempDir, Vec<FileRecord>) {
        let dir = tempdir().unwrap();
        let key = FileKey::compiled_in();
        let records = names
            .iter()
            .map(|name| {
                let path = dir.path().join(name);
                fs::write(&path, format!("contents of {name}")).unwrap();
                baseline(&path, &key)
            })
            .collect();
        (dir, records)
    }

    fn write_db(dir: &TempDir, records: &[FileRecord]) -> std::path::PathBuf {
        let db = dir.path().join("fsic.db");
        let mut writer = DatabaseWriter::create(&db).unwrap();
        for record in records {
            writer.append(record).unwrap();
        }
        writer.finish().unwrap();
        db
    }

    #[test]
    fn unchanged_files_are_clean() {
        let (dir, records) = setup(&["a", "b"]);
        let db = write_db(&dir, &records);
        let summary = check_database(&db, &FileKey::compiled_in()).unwrap();
        assert_eq!(summary.records_read, 2);
        assert_eq!(summary.files_checked, 2);
        assert_eq!(summary.clean_files, 2);
        assert!(summary.is_clean());
    }

    #[test]
    fn attribute_comparison_order() {
        let base = FileAttributes::default();
        let live = FileAttributes {
            mode: 1,
            mtime: 5,
            gid: 2,
            ..base
        };
        assert_eq!(
            compare_attributes(&base, &live),
            vec![AnomalyKind::Permissions, AnomalyKind::Gid, AnomalyKind::ModificationTime]
        );
    }

    #[test]
    fn same_size_content_change_is_a_digest_anomaly() {
        let (dir, records) = setup(&["a"]);
        let path = dir.path().join("a");
        let mut bytes = fs::read(&path).unwrap();
        bytes[0] ^= 0x20;
        fs::write(&path, &bytes).unwrap();
        let report = check_record(1, &records[0], &FileKey::compiled_in());
        assert!(report.contains(AnomalyKind::Digest));
        assert!(!report.contains(AnomalyKind::Size));
    }

    #[test]
    fn wrong_key_reports_digest_mismatch() {
        let (_dir, records) = setup(&["a"]);
        let report = check_record(1, &records[0], &FileKey::new("another key"));
        assert_eq!(report.anomalies, vec![AnomalyKind::Digest]);
    }

    #[test]
    fn missing_file_is_reported_and_scan_continues() {
        let (dir, records) = setup(&["a", "b"]);
        let db = write_db(&dir, &records);
        fs::remove_file(dir.path().join("a")).unwrap();
        let summary = check_database(&db, &FileKey::compiled_in()).unwrap();
        let missing = summary.report_for(records[0].path()).unwrap();
        assert_eq!(missing.anomalies, vec![AnomalyKind::FileMissing]);
        assert_eq!(summary.clean_files, 1);
        assert_eq!(summary.files_checked, 1);
    }

    #[test]
    fn garbage_lines_are_anomalies_not_errors() {
        let (dir, records) = setup(&["a"]);
        let db = dir.path().join("fsic.db");
        let good = records[0].to_line();
        let bad_fields = format!("{},1,2,3\n", records[0].path());
        fs::write(&db, format!("relative,1\n{}{}", bad_fields, good.as_str())).unwrap();
        let summary = check_database(&db, &FileKey::compiled_in()).unwrap();
        assert_eq!(summary.records_read, 3);
        assert_eq!(summary.reports[0].anomalies, vec![AnomalyKind::InvalidRecord]);
        assert_eq!(summary.reports[1].anomalies, vec![AnomalyKind::MalformedRecord]);
        assert_eq!(summary.clean_files, 1);
    }

    #[test]
    fn oversized_line_is_an_anomaly_and_next_record_is_checked() {
        let (dir, records) = setup(&["a"]);
        let db = dir.path().join("fsic.db");
        let mut contents = vec![b'/'];
        contents.resize(4 * 1024 * 1024, b'x');
        contents.push(b'\n');
        contents.extend_from_slice(records[0].to_line().as_bytes());
        fs::write(&db, contents).unwrap();
        let summary = check_database(&db, &FileKey::compiled_in()).unwrap();
        assert_eq!(summary.records_read, 2);
        assert_eq!(summary.reports.len(), 1);
        assert_eq!(summary.reports[0].line, 1);
        assert_eq!(summary.reports[0].anomalies, vec![AnomalyKind::InvalidRecord]);
        assert_eq!(summary.clean_files, 1);
    }

    #[test]
    fn unreachable_path_is_stat_failure_not_missing() {
        let (dir, records) = setup(&["a"]);
        let db = dir.path().join("fsic.db");
        let below_a_file = format!("{}/child", records[0].path());
        let line = records[0].to_line().replacen(records[0].path(), &below_a_file, 1);
        fs::write(&db, line).unwrap();
        let summary = check_database(&db, &FileKey::compiled_in()).unwrap();
        let report = summary.report_for(&below_a_file).unwrap();
        assert_eq!(report.anomalies, vec![AnomalyKind::StatFailed]);
    }

    #[test]
    fn missing_database_is_fatal() {
        let dir = tempdir().unwrap();
        let err = check_database(&dir.path().join("nope.db"), &FileKey::compiled_in()).unwrap_err();
        assert!(matches!(err, FsicError::File { .. }));
    }
}
