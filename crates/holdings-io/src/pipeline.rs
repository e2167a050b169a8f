//! The ingestion state machine: one call turns one upload into a [`NormalizedTable`] or a typed
//! failure, asking for a password at most once.

use holdings_model::NormalizedTable;
use holdings_offcrypto::{probe_container, ContainerKind, DecryptError, DecryptFailureKind};
use zeroize::Zeroizing;

use crate::csv_source::parse_csv;
use crate::normalize::{normalize, RawGrid};
use crate::{
    workbook, Credential, DecryptionFailure, IngestError, RawUpload, SourceFormat, EQUITY_SHEET,
    PREAMBLE_ROWS,
};

/// Turns an encrypted container plus a password into the plain OOXML package bytes.
pub trait Decryptor {
    fn decrypt(&self, container: &[u8], credential: &Credential) -> Result<Vec<u8>, DecryptError>;
}

impl<D: Decryptor + ?Sized> Decryptor for &D {
    fn decrypt(&self, container: &[u8], credential: &Credential) -> Result<Vec<u8>, DecryptError> {
        (**self).decrypt(container, credential)
    }
}

/// MS-OFFCRYPTO password decryption (Agile and Standard encryption).
#[derive(Debug, Default, Clone, Copy)]
pub struct OfficeDecryptor;

impl Decryptor for OfficeDecryptor {
    fn decrypt(&self, container: &[u8], credential: &Credential) -> Result<Vec<u8>, DecryptError> {
        holdings_offcrypto::decrypt(container, credential.expose())
    }
}

#[derive(Debug)]
enum State {
    DetectFormat,
    ParseCsv,
    OpenContainer {
        decrypted: Option<Zeroizing<Vec<u8>>>,
    },
    RequestPassword,
    Normalize(RawGrid),
}

#[derive(Debug, Default, Clone)]
pub struct Pipeline<D = OfficeDecryptor> {
    decryptor: D,
}

impl Pipeline<OfficeDecryptor> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<D: Decryptor> Pipeline<D> {
    pub fn with_decryptor(decryptor: D) -> Self {
        Self { decryptor }
    }

    /// Ingest one upload.
    ///
    /// `password_provider` is called only when the upload is an encrypted workbook, and at most
    /// once. Returning `None` fails with [`DecryptionFailure::PasswordRequired`]; the caller
    /// prompts and calls `ingest` again.
    pub fn ingest<P>(
        &self,
        upload: &RawUpload,
        password_provider: P,
    ) -> Result<NormalizedTable, IngestError>
    where
        P: FnOnce() -> Option<Credential>,
    {
        match self.run(upload, password_provider) {
            Ok(table) => {
                log::info!(
                    "ingested `{}`: {} columns, {} rows",
                    upload.filename(),
                    table.columns().len(),
                    table.len()
                );
                Ok(table)
            }
            Err(err) => {
                log::warn!("failed to ingest `{}`: {err}", upload.filename());
                Err(err)
            }
        }
    }

    fn run<P>(
        &self,
        upload: &RawUpload,
        password_provider: P,
    ) -> Result<NormalizedTable, IngestError>
    where
        P: FnOnce() -> Option<Credential>,
    {
        let mut provider = Some(password_provider);
        let mut state = State::DetectFormat;
        loop {
            log::debug!("ingest `{}`: {}", upload.filename(), state.name());
            state = match state {
                State::DetectFormat => match SourceFormat::detect(upload)? {
                    SourceFormat::Csv => State::ParseCsv,
                    SourceFormat::Xlsx => State::OpenContainer { decrypted: None },
                },
                State::ParseCsv => State::Normalize(parse_csv(upload.bytes(), PREAMBLE_ROWS)?),
                State::OpenContainer { decrypted } => {
                    let bytes = decrypted.as_deref().map_or(upload.bytes(), Vec::as_slice);
                    match workbook::open(bytes) {
                        Ok(mut wb) => State::Normalize(workbook::read_sheet(
                            &mut wb,
                            EQUITY_SHEET,
                            PREAMBLE_ROWS as u32,
                        )?),
                        Err(err) => match (probe_container(bytes), decrypted.is_some()) {
                            (ContainerKind::EncryptedOoxml, false) => State::RequestPassword,
                            (ContainerKind::EncryptedOoxml, true) => {
                                return Err(IngestError::malformed(
                                    "decrypted package is still encrypted",
                                ))
                            }
                            (kind, _) => {
                                log::debug!("container probe: {kind:?}");
                                return Err(IngestError::malformed(format!(
                                    "cannot open workbook: {err}"
                                )));
                            }
                        },
                    }
                }
                State::RequestPassword => {
                    let credential = provider.take().and_then(|ask| ask());
                    let Some(credential) = credential else {
                        return Err(DecryptionFailure::PasswordRequired.into());
                    };
                    let decrypted = self.decryptor.decrypt(upload.bytes(), &credential);
                    drop(credential);
                    match decrypted {
                        Ok(plain) => {
                            log::info!("decrypted `{}`", upload.filename());
                            State::OpenContainer {
                                decrypted: Some(Zeroizing::new(plain)),
                            }
                        }
                        Err(err) => return Err(classify_decrypt_error(err).into()),
                    }
                }
                State::Normalize(grid) => return normalize(grid),
            };
        }
    }
}

impl State {
    fn name(&self) -> &'static str {
        match self {
            State::DetectFormat => "detect format",
            State::ParseCsv => "parse csv",
            State::OpenContainer { decrypted: None } => "open container",
            State::OpenContainer { decrypted: Some(_) } => "open decrypted container",
            State::RequestPassword => "request password",
            State::Normalize(_) => "normalize",
        }
    }
}

fn classify_decrypt_error(err: DecryptError) -> DecryptionFailure {
    match err.kind() {
        DecryptFailureKind::MissingPassword => DecryptionFailure::MissingPassword,
        DecryptFailureKind::WrongPassword | DecryptFailureKind::CorruptContainer => {
            DecryptionFailure::WrongPassword(err)
        }
    }
}

/// [`Pipeline::ingest`] with the default [`OfficeDecryptor`].
pub fn ingest<P>(upload: &RawUpload, password_provider: P) -> Result<NormalizedTable, IngestError>
where
    P: FnOnce() -> Option<Credential>,
{
    Pipeline::new().ingest(upload, password_provider)
}
