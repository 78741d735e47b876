//! Baseline and verification of the checker's own files.
//!
//! Four artifacts are covered: the config file list, the integrity database,
//! the password file and the executable. Their records live in a separate
//! self-test database that is rewritten after every successful update.

use crate::anomaly::CheckSummary;
use crate::check::check_database;
use crate::config::FsicConfig;
use crate::crypto::FileKey;
use crate::error::Result;
use crate::record::DatabaseWriter;
use crate::update::baseline_file;
use std::path::PathBuf;
use tracing::{info, warn};

/// The four self-test artifacts and the database holding their baselines.
#[derive(Debug, Clone)]
pub struct SelfTest {
    artifacts: [PathBuf; 4],
    database: PathBuf,
}

impl SelfTest {
    pub fn new(
        config_file: PathBuf,
        database_file: PathBuf,
        password_file: PathBuf,
        binary_file: PathBuf,
        self_test_file: PathBuf,
    ) -> Self {
        Self {
            artifacts: [config_file, database_file, password_file, binary_file],
            database: self_test_file,
        }
    }

    pub fn from_config(config: &FsicConfig) -> Result<Self> {
        Ok(Self::new(
            config.config_file.clone(),
            config.database_file.clone(),
            config.password_file.clone(),
            config.binary_path()?,
            config.self_test_file.clone(),
        ))
    }

    /// Rewrite the self-test database; returns the number of records.
    ///
    /// Artifacts that cannot be baselined are logged and left out.
    pub fn refresh(&self, key: &FileKey) -> Result<usize> {
        let mut writer = DatabaseWriter::create(&self.database)?;
        for artifact in &self.artifacts {
            let Some(path) = artifact.to_str() else {
                warn!("Self-test: skipping non UTF-8 path {}", artifact.display());
                continue;
            };
            match baseline_file(path, key) {
                Ok(record) => writer.append(&record)?,
                Err(e) => warn!("Self-test: skipping {}: {}", path, e),
            }
        }
        let written = writer.finish()?;
        info!("Refreshed self-test database {} ({} records)", self.database.display(), written);
        Ok(written)
    }

    pub fn verify(&self, key: &FileKey) -> Result<CheckSummary> {
        info!("Running self-test against {}", self.database.display());
        check_database(&self.database, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::AnomalyKind;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn fixture() -> (TempDir, SelfTest) {
        let dir = tempdir().unwrap();
        let names = ["fsic.conf", "fsic.db", "fsic.pw", "fsic-bin"];
        for name in names {
            fs::write(dir.path().join(name), format!("{name} body")).unwrap();
        }
        let test = SelfTest::new(
            dir.path().join(names[0]),
            dir.path().join(names[1]),
            dir.path().join(names[2]),
            dir.path().join(names[3]),
            dir.path().join("fsic.sc"),
        );
        (dir, test)
    }

    #[test]
    fn refresh_then_verify_is_clean() {
        let (_dir, test) = fixture();
        let key = FileKey::compiled_in();
        assert_eq!(test.refresh(&key).unwrap(), 4);
        let summary = test.verify(&key).unwrap();
        assert_eq!(summary.clean_files, 4);
        assert!(summary.is_clean());
    }

    #[test]
    fn tampered_config_list_is_detected() {
        let (dir, test) = fixture();
        let key = FileKey::compiled_in();
        test.refresh(&key).unwrap();
        let conf = dir.path().join("fsic.conf");
        fs::write(&conf, "/etc/shadow\n/etc/passwd\n").unwrap();
        let summary = test.verify(&key).unwrap();
        let report = summary.report_for(conf.to_str().unwrap()).unwrap();
        assert!(report.contains(AnomalyKind::Digest));
        assert_eq!(summary.clean_files, 3);
    }

    #[test]
    fn missing_artifact_is_left_out() {
        let (dir, test) = fixture();
        fs::remove_file(dir.path().join("fsic.pw")).unwrap();
        assert_eq!(test.refresh(&FileKey::compiled_in()).unwrap(), 3);
    }
}
