//! Hash, key-derivation and AES primitives shared by the Agile and Standard schemes.

use aes::cipher::{generic_array::GenericArray, BlockDecrypt, KeyInit};
use aes::{Aes128, Aes192, Aes256};
use cbc::Decryptor;
use cipher::block_padding::NoPadding;
use cipher::{BlockDecryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::DecryptError;

pub(crate) const AES_BLOCK_SIZE: usize = 16;

/// Byte used to pad derived keys and IVs that are shorter than requested.
const DERIVED_PAD_BYTE: u8 = 0x36;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    /// Parse the `hashAlgorithm` attribute value used in Agile `EncryptionInfo` XML.
    pub fn parse_offcrypto_name(name: &str) -> Result<Self, DecryptError> {
        let normalized = name.trim().to_ascii_uppercase().replace('-', "");
        match normalized.as_str() {
            "SHA1" => Ok(HashAlgorithm::Sha1),
            "SHA256" => Ok(HashAlgorithm::Sha256),
            "SHA384" => Ok(HashAlgorithm::Sha384),
            "SHA512" => Ok(HashAlgorithm::Sha512),
            _ => Err(DecryptError::UnsupportedEncryption(format!(
                "hash algorithm `{}`",
                name.trim()
            ))),
        }
    }

    pub fn digest_len(self) -> usize {
        match self {
            HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 => 64,
        }
    }

    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        self.digest_parts(&[data])
    }

    fn digest_parts(self, parts: &[&[u8]]) -> Vec<u8> {
        fn run<D: sha1::Digest>(parts: &[&[u8]]) -> Vec<u8> {
            let mut hasher = D::new();
            for part in parts {
                hasher.update(part);
            }
            hasher.finalize().to_vec()
        }
        match self {
            HashAlgorithm::Sha1 => run::<sha1::Sha1>(parts),
            HashAlgorithm::Sha256 => run::<sha2::Sha256>(parts),
            HashAlgorithm::Sha384 => run::<sha2::Sha384>(parts),
            HashAlgorithm::Sha512 => run::<sha2::Sha512>(parts),
        }
    }

    pub(crate) fn hmac(self, key: &[u8], data: &[u8]) -> Result<Vec<u8>, DecryptError> {
        fn run<M: Mac + KeyInit>(key: &[u8], data: &[u8]) -> Result<Vec<u8>, DecryptError> {
            let mut mac = <M as Mac>::new_from_slice(key).map_err(|_| {
                DecryptError::InvalidEncryptionInfo("invalid HMAC key length".to_string())
            })?;
            mac.update(data);
            Ok(mac.finalize().into_bytes().to_vec())
        }
        match self {
            HashAlgorithm::Sha1 => run::<Hmac<sha1::Sha1>>(key, data),
            HashAlgorithm::Sha256 => run::<Hmac<sha2::Sha256>>(key, data),
            HashAlgorithm::Sha384 => run::<Hmac<sha2::Sha384>>(key, data),
            HashAlgorithm::Sha512 => run::<Hmac<sha2::Sha512>>(key, data),
        }
    }
}

/// Encode a password as UTF-16LE without BOM or terminator.
pub(crate) fn password_utf16le(password: &str) -> Zeroizing<Vec<u8>> {
    let mut out = Zeroizing::new(Vec::with_capacity(password.len() * 2));
    for unit in password.encode_utf16() {
        out.extend_from_slice(&unit.to_le_bytes());
    }
    out
}

/// Iterated password hash:
///
/// 1. `H = Hash(salt || password_utf16le)`
/// 2. for `i in 0..spin_count`: `H = Hash(LE32(i) || H)`
pub fn hash_password(
    password: &str,
    salt: &[u8],
    spin_count: u32,
    alg: HashAlgorithm,
) -> Zeroizing<Vec<u8>> {
    let pw = password_utf16le(password);
    let mut h = Zeroizing::new(alg.digest_parts(&[salt, &pw[..]]));
    for i in 0..spin_count {
        let next = Zeroizing::new(alg.digest_parts(&[&i.to_le_bytes()[..], &h[..]]));
        h.copy_from_slice(&next);
    }
    h
}

fn fit_to_len(mut bytes: Vec<u8>, len: usize) -> Vec<u8> {
    bytes.resize(len, DERIVED_PAD_BYTE);
    bytes
}

/// `Hash(H || block_key)` truncated or padded to `key_len` bytes.
pub fn derive_key(
    h: &[u8],
    block_key: &[u8],
    key_len: usize,
    alg: HashAlgorithm,
) -> Zeroizing<Vec<u8>> {
    Zeroizing::new(fit_to_len(alg.digest_parts(&[h, block_key]), key_len))
}

/// `Hash(salt || block_key)` truncated or padded to `iv_len` bytes.
pub fn derive_iv(salt: &[u8], block_key: &[u8], iv_len: usize, alg: HashAlgorithm) -> Vec<u8> {
    fit_to_len(alg.digest_parts(&[salt, block_key]), iv_len)
}

pub(crate) fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && bool::from(a.ct_eq(b))
}

pub(crate) fn require_block_aligned(field: &'static str, buf: &[u8]) -> Result<(), DecryptError> {
    if buf.len() % AES_BLOCK_SIZE != 0 {
        return Err(DecryptError::CiphertextNotBlockAligned {
            field,
            len: buf.len(),
        });
    }
    Ok(())
}

fn invalid_key(len: usize) -> DecryptError {
    DecryptError::UnsupportedEncryption(format!("AES key length {len}"))
}

/// AES-CBC decryption without padding removal; callers truncate to the semantic length.
pub(crate) fn aes_cbc_decrypt(
    field: &'static str,
    key: &[u8],
    iv: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, DecryptError> {
    require_block_aligned(field, ciphertext)?;
    let iv = iv.get(..AES_BLOCK_SIZE).ok_or(DecryptError::Truncated {
        context: "AES-CBC IV",
    })?;
    let mut buf = ciphertext.to_vec();
    let len = buf.len();
    let unaligned = |_| DecryptError::CiphertextNotBlockAligned { field, len };

    match key.len() {
        16 => {
            Decryptor::<Aes128>::new_from_slices(key, iv)
                .map_err(|_| invalid_key(key.len()))?
                .decrypt_padded_mut::<NoPadding>(&mut buf)
                .map_err(unaligned)?;
        }
        24 => {
            Decryptor::<Aes192>::new_from_slices(key, iv)
                .map_err(|_| invalid_key(key.len()))?
                .decrypt_padded_mut::<NoPadding>(&mut buf)
                .map_err(unaligned)?;
        }
        32 => {
            Decryptor::<Aes256>::new_from_slices(key, iv)
                .map_err(|_| invalid_key(key.len()))?
                .decrypt_padded_mut::<NoPadding>(&mut buf)
                .map_err(unaligned)?;
        }
        other => return Err(invalid_key(other)),
    }
    Ok(buf)
}

pub(crate) fn aes_ecb_decrypt_in_place(
    field: &'static str,
    key: &[u8],
    buf: &mut [u8],
) -> Result<(), DecryptError> {
    require_block_aligned(field, buf)?;

    fn run<C>(key: &[u8], buf: &mut [u8]) -> Result<(), DecryptError>
    where
        C: BlockDecrypt + KeyInit,
    {
        let cipher = C::new_from_slice(key).map_err(|_| invalid_key(key.len()))?;
        for block in buf.chunks_mut(AES_BLOCK_SIZE) {
            cipher.decrypt_block(GenericArray::from_mut_slice(block));
        }
        Ok(())
    }

    match key.len() {
        16 => run::<Aes128>(key, buf),
        24 => run::<Aes192>(key, buf),
        32 => run::<Aes256>(key, buf),
        other => Err(invalid_key(other)),
    }
}
