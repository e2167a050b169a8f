use holdings_offcrypto::DecryptError;
use thiserror::Error;

/// Why a single ingestion attempt failed.
///
/// Every variant is recoverable by the user (pick another file, re-enter the password); none
/// of them leaves partial state behind.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("unsupported file format `{extension}` (expected .csv or .xlsx)")]
    UnsupportedFormat { extension: String },
    #[error("file is empty or malformed: {reason}")]
    EmptyOrMalformed { reason: String },
    #[error("workbook has no sheet named `{sheet}`")]
    MissingSheet { sheet: String },
    #[error(transparent)]
    DecryptionFailed(#[from] DecryptionFailure),
}

/// Failure of the password step of an encrypted spreadsheet.
#[derive(Debug, Error)]
pub enum DecryptionFailure {
    /// The file is encrypted and no password was supplied. Prompt and ingest again.
    #[error("this file is encrypted; please enter a password")]
    PasswordRequired,
    /// A password was supplied but it was empty.
    #[error("a non-empty password is required")]
    MissingPassword,
    /// The password did not unlock the file, or the container could not be decrypted.
    #[error("incorrect password or file could not be decrypted")]
    WrongPassword(#[source] DecryptError),
}

/// Stable, `Copy` discriminant of an [`IngestError`], for re-prompt decisions and exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IngestErrorKind {
    UnsupportedFormat,
    EmptyOrMalformed,
    MissingSheet,
    PasswordRequired,
    MissingPassword,
    WrongPassword,
}

impl IngestErrorKind {
    /// Whether asking the user for a (different) password could make the next attempt succeed.
    pub fn needs_password(self) -> bool {
        matches!(
            self,
            IngestErrorKind::PasswordRequired
                | IngestErrorKind::MissingPassword
                | IngestErrorKind::WrongPassword
        )
    }
}

impl IngestError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        IngestError::EmptyOrMalformed {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> IngestErrorKind {
        match self {
            IngestError::UnsupportedFormat { .. } => IngestErrorKind::UnsupportedFormat,
            IngestError::EmptyOrMalformed { .. } => IngestErrorKind::EmptyOrMalformed,
            IngestError::MissingSheet { .. } => IngestErrorKind::MissingSheet,
            IngestError::DecryptionFailed(DecryptionFailure::PasswordRequired) => {
                IngestErrorKind::PasswordRequired
            }
            IngestError::DecryptionFailed(DecryptionFailure::MissingPassword) => {
                IngestErrorKind::MissingPassword
            }
            IngestError::DecryptionFailed(DecryptionFailure::WrongPassword(_)) => {
                IngestErrorKind::WrongPassword
            }
        }
    }

    /// A copy of this error if its outcome does not depend on the credential.
    ///
    /// Decryption failures return `None`: a later attempt with another password may succeed.
    pub(crate) fn credential_independent_clone(&self) -> Option<IngestError> {
        let copy = match self {
            IngestError::UnsupportedFormat { extension } => IngestError::UnsupportedFormat {
                extension: extension.clone(),
            },
            IngestError::EmptyOrMalformed { reason } => IngestError::malformed(reason.clone()),
            IngestError::MissingSheet { sheet } => IngestError::MissingSheet {
                sheet: sheet.clone(),
            },
            IngestError::DecryptionFailed(_) => return None,
        };
        Some(copy)
    }
}
