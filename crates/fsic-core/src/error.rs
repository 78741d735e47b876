use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub type Result<T, E = FsicError> = std::result::Result<T, E>;

/// Every failure surfaced by the library.
#[derive(Debug, Error)]
pub enum FsicError {
    /// Opening, reading or writing a file failed.
    #[error("File error on {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A database line does not have the record layout.
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// The password gate refused access.
    #[error("Authentication failed: {0}")]
    Authentication(#[from] AuthFailure),

    /// A file could not be digested.
    #[error("Hash failure: {0}")]
    Hash(#[from] HashFailure),

    /// A line or path failed validation.
    #[error("Invalid record: {0}")]
    InvalidRecord(#[from] InvalidRecord),

    /// A new password does not meet the strength rules.
    #[error("Password rejected: {0}")]
    PasswordRejected(#[from] PasswordRejection),
}

impl FsicError {
    pub fn file(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::File {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Process exit status reported by the command line front end.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Authentication(_) => 1,
            Self::File { .. } => 2,
            Self::MalformedRecord(_) | Self::InvalidRecord(_) => 6,
            Self::Hash(_) => 7,
            Self::PasswordRejected(_) => 8,
        }
    }
}

/// Why `hash_file` failed.
#[derive(Debug, Error)]
pub enum HashFailure {
    #[error("file is empty")]
    EmptyFile,

    #[error("short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: u64, actual: u64 },

    #[error("read failed: {0}")]
    Read(#[source] io::Error),
}

/// Why a database line or configured path was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidRecord {
    #[error("empty line")]
    Empty,

    #[error("{len} bytes exceeds the {max} byte limit")]
    TooLong { len: usize, max: usize },

    #[error("not an absolute path")]
    NotAbsolute,

    #[error("non-printable byte 0x{byte:02x} at offset {offset}")]
    NonPrintable { offset: usize, byte: u8 },

    #[error("path contains a comma")]
    EmbeddedComma,

    #[error("no path field")]
    MissingPath,

    #[error("no such file: {0}")]
    NoSuchFile(String),

    /// The path exists or may exist, but `stat` failed for another reason.
    #[error("cannot stat {path}: {kind}")]
    StatFailed { path: String, kind: io::ErrorKind },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthFailure {
    #[error("wrong password")]
    WrongPassword,

    #[error("password shorter than {0} characters")]
    TooShort(usize),

    #[error("corrupt password file: {0}")]
    CorruptPasswordFile(String),

    #[error("password confirmation does not match")]
    ConfirmationMismatch,

    #[error("password file already exists")]
    AlreadyInitialized,

    #[error("password prompt: {0}")]
    Prompt(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PasswordRejection {
    #[error("password is too weak")]
    Weak,

    #[error("control codes or extended characters are not permitted")]
    Invalid,
}
