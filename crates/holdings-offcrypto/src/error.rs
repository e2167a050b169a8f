use thiserror::Error;

/// Errors returned while probing or decrypting an Office-encrypted OOXML container.
///
/// The variants are precise so callers can log and test the exact cause. End users should only
/// ever see the collapsed [`DecryptFailureKind::user_facing`] classification, which does not leak
/// details about container internals.
#[derive(Debug, Error)]
pub enum DecryptError {
    /// No password (or an empty one) was supplied. Decryption was not attempted.
    #[error("password required")]
    MissingPassword,
    /// The password failed the verifier check.
    #[error("invalid password")]
    InvalidPassword,
    /// The bytes are not an OLE/CFB container holding an encrypted OOXML package.
    #[error("not an encrypted OOXML container")]
    NotEncrypted,
    #[error("missing required OLE stream `{stream}`")]
    MissingStream { stream: &'static str },
    #[error("unsupported EncryptionInfo version {major}.{minor}")]
    UnsupportedVersion { major: u16, minor: u16 },
    #[error("unsupported encryption: {0}")]
    UnsupportedEncryption(String),
    #[error("invalid EncryptionInfo: {0}")]
    InvalidEncryptionInfo(String),
    #[error("truncated data while reading {context}")]
    Truncated { context: &'static str },
    #[error("spinCount {spin_count} exceeds maximum allowed {max}")]
    SpinCountTooLarge { spin_count: u32, max: u32 },
    #[error("EncryptedPackage declares {declared} bytes but only {available} are present")]
    PackageSizeMismatch { declared: u64, available: usize },
    #[error("ciphertext for `{field}` is not a multiple of the AES block size (len {len})")]
    CiphertextNotBlockAligned { field: &'static str, len: usize },
    /// The `dataIntegrity` HMAC did not match.
    #[error("integrity check failed")]
    IntegrityCheckFailed,
    /// The plaintext does not start with the ZIP `PK` signature.
    #[error("decrypted package is not a ZIP archive")]
    NotAZipPackage,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Coarse classification of a [`DecryptError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecryptFailureKind {
    MissingPassword,
    WrongPassword,
    CorruptContainer,
}

impl DecryptFailureKind {
    /// Classification shown to end users: a corrupt or non-standard container is reported the
    /// same way as a wrong password.
    pub fn user_facing(self) -> Self {
        match self {
            DecryptFailureKind::CorruptContainer => DecryptFailureKind::WrongPassword,
            other => other,
        }
    }
}

impl DecryptError {
    pub fn kind(&self) -> DecryptFailureKind {
        match self {
            DecryptError::MissingPassword => DecryptFailureKind::MissingPassword,
            DecryptError::InvalidPassword => DecryptFailureKind::WrongPassword,
            _ => DecryptFailureKind::CorruptContainer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corrupt_container_collapses_to_wrong_password_for_users() {
        let err = DecryptError::IntegrityCheckFailed;
        assert_eq!(err.kind(), DecryptFailureKind::CorruptContainer);
        assert_eq!(err.kind().user_facing(), DecryptFailureKind::WrongPassword);

        let err = DecryptError::MissingPassword;
        assert_eq!(err.kind().user_facing(), DecryptFailureKind::MissingPassword);
        assert_eq!(
            DecryptError::InvalidPassword.kind(),
            DecryptFailureKind::WrongPassword
        );
    }
}
