use crate::error::HashFailure;
use crate::password::PasswordRecord;
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::Rng;
use serde::{Serialize, Serializer};
use sha2::Sha512;
use std::fmt;
use std::io::{self, Read};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

type HmacSha512 = Hmac<Sha512>;

pub const FILE_KEY_ENV: &str = "FSIC_FILE_KEY";
pub const COMPILED_IN_KEY: &str = match option_env!("FSIC_COMPILED_KEY") {
    Some(key) => key,
    None => "4300da90c4401052a8efae996119725",
};

pub const DIGEST_PREFIX: &str = "0x";
pub const DIGEST_HEX_LEN: usize = 128;
pub const SALT_MARKER: char = '$';
pub const SALT_CHARS: usize = 8;
/// Salt text length including the leading marker.
pub const SALT_LEN: usize = SALT_CHARS + 1;
pub const SALT_ALPHABET: &[u8] =
    b"./-_=+[]{}0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

const READ_CHUNK: usize = 64 * 1024;

/// Key for the content digests of the integrity database.
#[derive(Clone)]
pub struct FileKey(Zeroizing<Vec<u8>>);

impl FileKey {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self(Zeroizing::new(key.into()))
    }

    pub fn compiled_in() -> Self {
        Self::new(COMPILED_IN_KEY.as_bytes())
    }

    /// `FSIC_FILE_KEY` when set and non-empty, otherwise the compiled-in key.
    pub fn from_env() -> Self {
        match std::env::var(FILE_KEY_ENV) {
            Ok(key) if !key.is_empty() => Self::new(Zeroizing::new(key).as_bytes()),
            _ => Self::compiled_in(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Default for FileKey {
    fn default() -> Self {
        Self::compiled_in()
    }
}

impl fmt::Debug for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FileKey(<redacted>)")
    }
}

/// Hex digest with the `0x` prefix, as stored on disk.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Digest(String);

impl Digest {
    fn from_mac(bytes: &[u8]) -> Self {
        Self(format!("{DIGEST_PREFIX}{}", hex::encode(bytes)))
    }

    pub fn parse(text: &str) -> Option<Self> {
        let hex_part = text.strip_prefix(DIGEST_PREFIX)?;
        if hex_part.is_empty()
            || hex_part.len() % 2 != 0
            || !hex_part.bytes().all(|b| b.is_ascii_hexdigit())
        {
            return None;
        }
        Some(Self(text.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn raw_bytes(&self) -> Option<Vec<u8>> {
        hex::decode(&self.0[DIGEST_PREFIX.len()..]).ok()
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.0)
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Password salt: the `$` marker followed by eight alphabet characters.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Salt(String);

impl Salt {
    pub fn generate() -> Self {
        Self::generate_with(&mut OsRng)
    }

    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut text = String::with_capacity(SALT_LEN);
        text.push(SALT_MARKER);
        for _ in 0..SALT_CHARS {
            text.push(SALT_ALPHABET[rng.gen_range(0..SALT_ALPHABET.len())] as char);
        }
        Self(text)
    }

    pub fn parse(text: &str) -> Option<Self> {
        let chars = text.strip_prefix(SALT_MARKER)?;
        if chars.len() != SALT_CHARS || !chars.bytes().all(|b| SALT_ALPHABET.contains(&b)) {
            return None;
        }
        Some(Self(text.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Salt({})", self.0)
    }
}

fn keyed_mac(key: &[u8]) -> HmacSha512 {
    HmacSha512::new_from_slice(key).expect("HMAC accepts keys of any length")
}

fn password_mac(password: &[u8], salt: &Salt) -> HmacSha512 {
    let mut mac = keyed_mac(salt.as_str().as_bytes());
    mac.update(password);
    mac
}

/// Keyed digest of a password, keyed with the salt text.
pub fn hash_password(password: &[u8], salt: &Salt) -> PasswordRecord {
    let mac = password_mac(password, salt);
    PasswordRecord::new(salt.clone(), Digest::from_mac(&mac.finalize().into_bytes()))
}

/// Constant-time check of `password` against a stored record.
pub fn verify_password(password: &[u8], record: &PasswordRecord) -> bool {
    let Some(expected) = record.digest().raw_bytes().map(Zeroizing::new) else {
        return false;
    };
    password_mac(password, record.salt())
        .verify_slice(&expected)
        .is_ok()
}

/// Keyed digest of a file's contents.
///
/// Exactly `declared_size` bytes are hashed; callers pass the size they got
/// from `stat`. Bytes appended between the `stat` and the read are not
/// covered by the digest (the size comparison of the next check reports the
/// growth). Fewer bytes than declared is a `ShortRead`.
pub fn hash_file<R: Read>(
    reader: R,
    declared_size: u64,
    key: &FileKey,
) -> Result<Digest, HashFailure> {
    if declared_size == 0 {
        return Err(HashFailure::EmptyFile);
    }
    let mut mac = keyed_mac(key.as_bytes());
    let mut limited = reader.take(declared_size);
    let mut buffer = Zeroizing::new(vec![0u8; READ_CHUNK]);
    let mut total: u64 = 0;
    loop {
        let n = match limited.read(&mut buffer[..]) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(HashFailure::Read(e)),
        };
        mac.update(&buffer[..n]);
        total += n as u64;
    }
    if total < declared_size {
        return Err(HashFailure::ShortRead {
            expected: declared_size,
            actual: total,
        });
    }
    Ok(Digest::from_mac(&mac.finalize().into_bytes()))
}
