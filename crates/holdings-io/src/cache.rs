use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;

use holdings_model::NormalizedTable;
use holdings_offcrypto::is_encrypted_ooxml_ole;
use lru::LruCache;
use sha2::{Digest, Sha256};

use crate::{Credential, Decryptor, IngestError, Pipeline, RawUpload};

/// Content address of an upload: SHA-256 over the filename and the raw bytes, hex encoded.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn of(upload: &RawUpload) -> Self {
        let name = upload.filename().as_bytes();
        let mut hasher = Sha256::new();
        hasher.update((name.len() as u64).to_le_bytes());
        hasher.update(name);
        hasher.update(upload.bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

enum Outcome {
    Table(Arc<NormalizedTable>),
    Failed(IngestError),
}

/// Memoizes ingestion results per upload content.
///
/// Successful tables and failures that no password could change are stored. Encrypted workbooks
/// are never stored: every outcome for them depends on the credential, so each attempt runs the
/// pipeline and asks for a password again. Nothing derived from the credential (passwords,
/// decrypted bytes, decrypted tables) is kept.
pub struct IngestCache {
    entries: LruCache<CacheKey, Outcome>,
}

impl Default for IngestCache {
    /// Holds a single upload: ingesting a new file evicts the previous one.
    fn default() -> Self {
        Self::new(NonZeroUsize::MIN)
    }
}

impl IngestCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: LruCache::new(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains(key)
    }

    /// Mark `upload` as the current upload, dropping every entry for other content.
    pub fn begin_upload(&mut self, upload: &RawUpload) -> CacheKey {
        let key = CacheKey::of(upload);
        let stale: Vec<CacheKey> = self
            .entries
            .iter()
            .map(|(k, _)| k)
            .filter(|k| **k != key)
            .cloned()
            .collect();
        for k in &stale {
            self.entries.pop(k);
        }
        if !stale.is_empty() {
            log::debug!("evicted {} cached uploads", stale.len());
        }
        key
    }

    pub fn invalidate(&mut self, key: &CacheKey) -> bool {
        self.entries.pop(key).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Return the cached outcome for `upload`, or run `pipeline` and remember what it produced.
    ///
    /// On a hit `password_provider` is not called. Encrypted workbooks always miss.
    pub fn get_or_ingest<D, P>(
        &mut self,
        pipeline: &Pipeline<D>,
        upload: &RawUpload,
        password_provider: P,
    ) -> Result<Arc<NormalizedTable>, IngestError>
    where
        D: Decryptor,
        P: FnOnce() -> Option<Credential>,
    {
        if is_encrypted_ooxml_ole(upload.bytes()) {
            log::debug!("`{}` is encrypted; bypassing cache", upload.filename());
            return pipeline.ingest(upload, password_provider).map(Arc::new);
        }

        let key = CacheKey::of(upload);
        if let Some(outcome) = self.entries.get(&key) {
            log::debug!("cache hit for `{}` ({key})", upload.filename());
            return match outcome {
                Outcome::Table(table) => Ok(Arc::clone(table)),
                Outcome::Failed(err) => Err(err
                    .credential_independent_clone()
                    .unwrap_or_else(|| IngestError::malformed(err.to_string()))),
            };
        }

        match pipeline.ingest(upload, password_provider) {
            Ok(table) => {
                let table = Arc::new(table);
                self.entries.put(key, Outcome::Table(Arc::clone(&table)));
                Ok(table)
            }
            Err(err) => {
                if let Some(copy) = err.credential_independent_clone() {
                    self.entries.put(key, Outcome::Failed(copy));
                }
                Err(err)
            }
        }
    }
}

impl fmt::Debug for IngestCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestCache")
            .field("len", &self.entries.len())
            .field("capacity", &self.entries.cap())
            .finish()
    }
}
