//! Password gate for database updates.
//!
//! The password file holds a single line: the salt followed by the keyed
//! digest of the current password.

use crate::crypto::{hash_password, verify_password, Digest, Salt, SALT_LEN};
use crate::error::{AuthFailure, FsicError, PasswordRejection, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{error, info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 255;
/// New-password entries allowed before a change is abandoned.
pub const MAX_NEW_PASSWORD_ATTEMPTS: usize = 3;

/// Accept only 8..=255 printable, non-space ASCII bytes containing a
/// lowercase letter, an uppercase letter and a digit.
pub fn evaluate_password(password: &[u8]) -> Result<(), PasswordRejection> {
    if password.iter().any(|&b| !(33..127).contains(&b)) {
        return Err(PasswordRejection::Invalid);
    }
    let lower = password.iter().any(u8::is_ascii_lowercase);
    let upper = password.iter().any(u8::is_ascii_uppercase);
    let digit = password.iter().any(u8::is_ascii_digit);
    let len_ok = (MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&password.len());
    if lower && upper && digit && len_ok {
        Ok(())
    } else {
        Err(PasswordRejection::Weak)
    }
}

/// Salt and keyed digest of the current password.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct PasswordRecord {
    salt: Salt,
    digest: Digest,
}

impl PasswordRecord {
    pub fn new(salt: Salt, digest: Digest) -> Self {
        Self { salt, digest }
    }

    pub fn salt(&self) -> &Salt {
        &self.salt
    }

    pub fn digest(&self) -> &Digest {
        &self.digest
    }

    pub fn to_line(&self) -> Zeroizing<String> {
        Zeroizing::new(format!("{}{}\n", self.salt.as_str(), self.digest))
    }

    pub fn parse(text: &str) -> Result<Self, AuthFailure> {
        let line = text.strip_suffix('\n').unwrap_or(text);
        if line.len() <= SALT_LEN || !line.is_char_boundary(SALT_LEN) {
            return Err(AuthFailure::CorruptPasswordFile("record too short".into()));
        }
        let (salt, digest) = line.split_at(SALT_LEN);
        let salt = Salt::parse(salt)
            .ok_or_else(|| AuthFailure::CorruptPasswordFile("bad salt".into()))?;
        let digest = Digest::parse(digest)
            .ok_or_else(|| AuthFailure::CorruptPasswordFile("bad digest".into()))?;
        Ok(Self { salt, digest })
    }
}

impl std::fmt::Debug for PasswordRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordRecord")
            .field("salt", &self.salt)
            .finish_non_exhaustive()
    }
}

/// Which password a prompt asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Current,
    New,
    Confirm,
}

impl PromptKind {
    pub fn text(self) -> &'static str {
        match self {
            Self::Current => "Enter Password: ",
            Self::New => "Enter New Password: ",
            Self::Confirm => "Re-enter Password: ",
        }
    }
}

/// Source of passwords typed by the operator.
pub trait PasswordPrompt {
    fn read_password(&mut self, kind: PromptKind) -> Result<Zeroizing<String>>;
}

/// Gate that must pass before the integrity database may be rewritten.
pub trait Authenticator {
    fn authenticate(&mut self) -> Result<()>;
}

/// The single-record password file.
#[derive(Debug, Clone)]
pub struct PasswordFile {
    path: PathBuf,
}

impl PasswordFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn read_record(&self) -> Result<PasswordRecord> {
        let text = Zeroizing::new(
            fs::read_to_string(&self.path).map_err(|e| FsicError::file(&self.path, e))?,
        );
        Ok(PasswordRecord::parse(&text)?)
    }

    pub fn authenticate(&self, prompt: &mut dyn PasswordPrompt) -> Result<()> {
        let record = self.read_record().map_err(|e| {
            error!("Could not read password file {}: {}", self.path.display(), e);
            e
        })?;
        let password = prompt.read_password(PromptKind::Current)?;
        if password.len() < MIN_PASSWORD_LEN {
            error!("Authentication failed: password too short");
            return Err(AuthFailure::TooShort(MIN_PASSWORD_LEN).into());
        }
        if !verify_password(password.as_bytes(), &record) {
            error!("Authentication failed");
            return Err(AuthFailure::WrongPassword.into());
        }
        info!("User authenticated");
        Ok(())
    }

    /// Authenticate, then replace the record with a new password.
    pub fn change(&self, prompt: &mut dyn PasswordPrompt) -> Result<()> {
        self.authenticate(prompt)?;
        let record = new_password_record(prompt)?;
        self.write_record(&record)?;
        info!("Changed password");
        Ok(())
    }

    /// Create the first record; refuses to replace an existing file.
    pub fn initialize(&self, prompt: &mut dyn PasswordPrompt) -> Result<()> {
        if self.exists() {
            error!("Password file already exists: {}", self.path.display());
            return Err(AuthFailure::AlreadyInitialized.into());
        }
        let record = new_password_record(prompt)?;
        self.write_record(&record)?;
        info!("Created password file {}", self.path.display());
        Ok(())
    }

    /// Atomically replace the password file with `record`.
    pub fn write_record(&self, record: &PasswordRecord) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| FsicError::file(dir, e))?;
        tmp.write_all(record.to_line().as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| FsicError::file(tmp.path(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| FsicError::file(&self.path, e.error))?;
        Ok(())
    }
}

fn new_password_record(prompt: &mut dyn PasswordPrompt) -> Result<PasswordRecord> {
    let mut attempt = 0;
    let password = loop {
        attempt += 1;
        let candidate = prompt.read_password(PromptKind::New)?;
        match evaluate_password(candidate.as_bytes()) {
            Ok(()) => break candidate,
            Err(rejection) if attempt < MAX_NEW_PASSWORD_ATTEMPTS => {
                warn!("{}, try again", rejection);
            }
            Err(rejection) => {
                error!("New password rejected: {}", rejection);
                return Err(rejection.into());
            }
        }
    };
    let confirm = prompt.read_password(PromptKind::Confirm)?;
    if password.as_bytes() != confirm.as_bytes() {
        error!("Password confirmation does not match");
        return Err(AuthFailure::ConfirmationMismatch.into());
    }
    Ok(hash_password(password.as_bytes(), &Salt::generate()))
}

/// `Authenticator` backed by the password file and an operator prompt.
pub struct PasswordAuthenticator<P> {
    file: PasswordFile,
    prompt: P,
}

impl<P: PasswordPrompt> PasswordAuthenticator<P> {
    pub fn new(file: PasswordFile, prompt: P) -> Self {
        Self { file, prompt }
    }
}

impl<P: PasswordPrompt> Authenticator for PasswordAuthenticator<P> {
    fn authenticate(&mut self) -> Result<()> {
        self.file.authenticate(&mut self.prompt)
    }
}
