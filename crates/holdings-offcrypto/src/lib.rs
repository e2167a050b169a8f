//! Password-based decryption of Office-encrypted OOXML workbooks (MS-OFFCRYPTO).
//!
//! Excel wraps a password-protected `.xlsx` in an OLE/CFB container holding two streams:
//! `EncryptionInfo` (the key derivation parameters) and `EncryptedPackage` (the encrypted ZIP).
//! This crate supports:
//! - *Agile* encryption (version 4.4, XML descriptor, SHA-1/SHA-2 + AES-CBC)
//! - *Standard* encryption (version x.2, AES-ECB + SHA-1)
//!
//! [`probe_container`] classifies bytes structurally, and [`decrypt`] turns an encrypted
//! container back into the plain ZIP package.

use std::io::{Cursor, Read, Seek};

use log::{debug, info};

mod agile;
mod crypto;
mod error;
mod standard;

pub use agile::{decrypt_agile, parse_agile_encryption_info, AgileEncryptionInfo};
pub use crypto::{derive_iv, derive_key, hash_password, HashAlgorithm};
pub use error::{DecryptError, DecryptFailureKind};
pub use standard::{
    decrypt_standard, parse_standard_encryption_info, standard_derive_key, standard_verify_key,
    StandardEncryptionInfo,
};

/// Largest accepted Agile `spinCount`. Larger values are treated as a corrupt container.
pub const MAX_SPIN_COUNT: u32 = 10_000_000;

const OLE_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const ZIP_MAGIC: [u8; 2] = *b"PK";

const ENCRYPTION_INFO_STREAM: &str = "EncryptionInfo";
const ENCRYPTED_PACKAGE_STREAM: &str = "EncryptedPackage";

/// Structural classification of an uploaded spreadsheet container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// A plain ZIP/OPC package.
    Zip,
    /// An OLE/CFB container with `EncryptionInfo` and `EncryptedPackage` streams.
    EncryptedOoxml,
    /// Some other OLE/CFB file (for example a legacy `.xls`).
    Ole,
    Unknown,
}

/// Classify `bytes` by magic bytes and stream layout. Never looks at file names.
pub fn probe_container(bytes: &[u8]) -> ContainerKind {
    if bytes.starts_with(&ZIP_MAGIC) {
        return ContainerKind::Zip;
    }
    if !bytes.starts_with(&OLE_MAGIC) {
        return ContainerKind::Unknown;
    }
    let Ok(ole) = cfb::CompoundFile::open(Cursor::new(bytes)) else {
        return ContainerKind::Unknown;
    };
    if ole.is_stream(ENCRYPTION_INFO_STREAM) && ole.is_stream(ENCRYPTED_PACKAGE_STREAM) {
        ContainerKind::EncryptedOoxml
    } else {
        ContainerKind::Ole
    }
}

/// Shorthand for `probe_container(bytes) == ContainerKind::EncryptedOoxml`.
pub fn is_encrypted_ooxml_ole(bytes: &[u8]) -> bool {
    probe_container(bytes) == ContainerKind::EncryptedOoxml
}

fn read_stream<R: Read + Seek>(
    ole: &mut cfb::CompoundFile<R>,
    name: &'static str,
) -> Result<Vec<u8>, DecryptError> {
    if !ole.is_stream(name) {
        return Err(DecryptError::MissingStream { stream: name });
    }
    let mut out = Vec::new();
    ole.open_stream(name)?.read_to_end(&mut out)?;
    Ok(out)
}

/// Decrypt a password-protected OOXML container into its plain ZIP package.
///
/// An empty password fails with [`DecryptError::MissingPassword`] before any work is done. The
/// input is never modified.
pub fn decrypt(container: &[u8], password: &str) -> Result<Vec<u8>, DecryptError> {
    if password.is_empty() {
        return Err(DecryptError::MissingPassword);
    }
    if !container.starts_with(&OLE_MAGIC) {
        return Err(DecryptError::NotEncrypted);
    }
    let mut ole = cfb::CompoundFile::open(Cursor::new(container))?;
    let encryption_info = read_stream(&mut ole, ENCRYPTION_INFO_STREAM)?;
    let encrypted_package = read_stream(&mut ole, ENCRYPTED_PACKAGE_STREAM)?;

    let package = decrypt_encrypted_package(&encryption_info, &encrypted_package, password)?;
    info!("decrypted OOXML package ({} bytes)", package.len());
    Ok(package)
}

/// Decrypt the raw `EncryptionInfo` + `EncryptedPackage` stream pair.
pub fn decrypt_encrypted_package(
    encryption_info: &[u8],
    encrypted_package: &[u8],
    password: &str,
) -> Result<Vec<u8>, DecryptError> {
    if password.is_empty() {
        return Err(DecryptError::MissingPassword);
    }
    let (version, payload) =
        encryption_info
            .split_first_chunk::<8>()
            .ok_or(DecryptError::Truncated {
                context: "EncryptionVersionInfo",
            })?;
    let major = u16::from_le_bytes([version[0], version[1]]);
    let minor = u16::from_le_bytes([version[2], version[3]]);
    debug!("EncryptionInfo version {major}.{minor}");

    let package = match (major, minor) {
        (4, 4) => decrypt_agile(payload, encrypted_package, password)?,
        (2..=4, 2) => decrypt_standard(payload, encrypted_package, password)?,
        _ => return Err(DecryptError::UnsupportedVersion { major, minor }),
    };

    if !package.starts_with(&ZIP_MAGIC) {
        return Err(DecryptError::NotAZipPackage);
    }
    Ok(package)
}
