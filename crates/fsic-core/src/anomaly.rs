//! Results of an integrity check.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Category of a discrepancy between baseline and live file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    Permissions,
    Inode,
    Uid,
    Gid,
    Size,
    ModificationTime,
    Digest,
    FileMissing,
    Unreadable,
    StatFailed,
    InvalidRecord,
    MalformedRecord,
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Permissions => "permissions changed",
            Self::Inode => "inode changed",
            Self::Uid => "owner changed",
            Self::Gid => "group changed",
            Self::Size => "size changed",
            Self::ModificationTime => "modification time changed",
            Self::Digest => "content digest changed",
            Self::FileMissing => "file missing",
            Self::Unreadable => "file unreadable",
            Self::StatFailed => "stat failed",
            Self::InvalidRecord => "invalid database record",
            Self::MalformedRecord => "malformed database record",
        };
        f.write_str(text)
    }
}

/// Anomalies found for one database line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnomalyReport {
    /// 1-based line number in the database.
    pub line: usize,
    /// Record path, when the line got far enough to name one.
    pub path: Option<String>,
    pub anomalies: Vec<AnomalyKind>,
}

impl AnomalyReport {
    pub fn new(line: usize, path: Option<String>) -> Self {
        Self {
            line,
            path,
            anomalies: Vec::new(),
        }
    }

    pub fn single(line: usize, path: Option<String>, kind: AnomalyKind) -> Self {
        Self {
            line,
            path,
            anomalies: vec![kind],
        }
    }

    pub fn push(&mut self, kind: AnomalyKind) {
        self.anomalies.push(kind);
    }

    pub fn count(&self) -> usize {
        self.anomalies.len()
    }

    pub fn is_clean(&self) -> bool {
        self.anomalies.is_empty()
    }

    pub fn contains(&self, kind: AnomalyKind) -> bool {
        self.anomalies.contains(&kind)
    }
}

/// Aggregate result of one pass over a database.
#[derive(Debug, Clone, Serialize)]
pub struct CheckSummary {
    pub checked_at: DateTime<Utc>,
    pub database: PathBuf,
    pub records_read: usize,
    pub files_checked: usize,
    pub clean_files: usize,
    /// Only reports with at least one anomaly.
    pub reports: Vec<AnomalyReport>,
}

impl CheckSummary {
    pub fn new(database: PathBuf) -> Self {
        Self {
            checked_at: Utc::now(),
            database,
            records_read: 0,
            files_checked: 0,
            clean_files: 0,
            reports: Vec::new(),
        }
    }

    pub fn record(&mut self, report: AnomalyReport) {
        if report.is_clean() {
            self.clean_files += 1;
        } else {
            self.reports.push(report);
        }
    }

    pub fn total_anomalies(&self) -> usize {
        self.reports.iter().map(AnomalyReport::count).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.reports.is_empty()
    }

    /// Report for `path`, if one was filed.
    pub fn report_for(&self, path: &str) -> Option<&AnomalyReport> {
        self.reports.iter().find(|r| r.path.as_deref() == Some(path))
    }
}
