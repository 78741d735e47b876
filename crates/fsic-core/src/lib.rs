//! fsic-core - file-system integrity checking
//!
//! # Design principles
//! - HMAC-SHA512 from audited crates for both file and password digests.
//! - Zeroize record text, file buffers and passwords on drop.
//! - Per-file failures never abort a scan; they become anomalies.
//!
//! # Module layout
//! - `attributes` - text codec for file metadata
//! - `record`     - database line model and writer
//! - `crypto`     - keyed file digests, password digests, salts
//! - `validate`   - checks on database lines and configured paths
//! - `password`   - password file, strength rules, authentication seams
//! - `update`     - rebuilds the database from the config file list
//! - `check`      - compares the database with the live file system
//! - `anomaly`    - per-file reports and run summaries
//! - `self_test`  - baseline of the checker's own files
//! - `config`     - on-disk locations
//! - `error`      - unified error type

pub mod anomaly;
pub mod attributes;
pub mod check;
pub mod config;
pub mod crypto;
pub mod error;
pub mod password;
pub mod paths;
pub mod record;
pub mod self_test;
pub mod update;
pub mod validate;

pub use anomaly::{AnomalyKind, AnomalyReport, CheckSummary};
pub use check::check_database;
pub use config::FsicConfig;
pub use crypto::FileKey;
pub use error::{FsicError, Result};
pub use password::{Authenticator, PasswordAuthenticator, PasswordFile, PasswordPrompt, PromptKind};
pub use self_test::SelfTest;
pub use update::{update_database, UpdateSummary};
