//! Standard encryption (`EncryptionInfo` version 3.2 / 4.2, AES with SHA-1).

use log::debug;
use sha1::{Digest as _, Sha1};
use zeroize::Zeroizing;

use crate::agile::split_encrypted_package;
use crate::crypto::{aes_ecb_decrypt_in_place, ct_eq, password_utf16le, require_block_aligned};
use crate::DecryptError;

const SPIN_COUNT: u32 = 50_000;
const SHA1_LEN: usize = 20;

const CALG_AES_128: u32 = 0x0000_660E;
const CALG_AES_192: u32 = 0x0000_660F;
const CALG_AES_256: u32 = 0x0000_6610;
const CALG_SHA1: u32 = 0x0000_8004;

/// Fixed-size part of the binary `EncryptionHeader` (eight little-endian u32 fields).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandardEncryptionHeader {
    pub flags: u32,
    pub alg_id: u32,
    pub alg_id_hash: u32,
    pub key_size_bits: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandardEncryptionVerifier {
    pub salt: Vec<u8>,
    pub encrypted_verifier: [u8; 16],
    pub encrypted_verifier_hash: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandardEncryptionInfo {
    pub header: StandardEncryptionHeader,
    pub verifier: StandardEncryptionVerifier,
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize, context: &'static str) -> Result<&'a [u8], DecryptError> {
        let end = self.pos.saturating_add(n);
        let out = self
            .bytes
            .get(self.pos..end)
            .ok_or(DecryptError::Truncated { context })?;
        self.pos = end;
        Ok(out)
    }

    fn read_u32_le(&mut self, context: &'static str) -> Result<u32, DecryptError> {
        let b = self.take(4, context)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

/// Parse the Standard `EncryptionInfo` payload that follows the 8-byte version header.
pub fn parse_standard_encryption_info(
    bytes: &[u8],
) -> Result<StandardEncryptionInfo, DecryptError> {
    let mut r = Reader::new(bytes);
    let header_size = r.read_u32_le("EncryptionInfo.headerSize")? as usize;
    let header_bytes = r.take(header_size, "EncryptionHeader")?;

    let mut hr = Reader::new(header_bytes);
    let flags = hr.read_u32_le("EncryptionHeader.flags")?;
    let _size_extra = hr.read_u32_le("EncryptionHeader.sizeExtra")?;
    let header = StandardEncryptionHeader {
        flags,
        alg_id: hr.read_u32_le("EncryptionHeader.algId")?,
        alg_id_hash: hr.read_u32_le("EncryptionHeader.algIdHash")?,
        key_size_bits: hr.read_u32_le("EncryptionHeader.keySize")?,
    };
    // providerType, reserved1, reserved2 and the CSP name are not needed to decrypt.

    let expected_key_bits = match header.alg_id {
        CALG_AES_128 => 128,
        CALG_AES_192 => 192,
        CALG_AES_256 => 256,
        other => {
            return Err(DecryptError::UnsupportedEncryption(format!(
                "Standard algId {other:#010x}"
            )))
        }
    };
    if header.key_size_bits != expected_key_bits {
        return Err(DecryptError::InvalidEncryptionInfo(format!(
            "keySize {} does not match algId {:#010x}",
            header.key_size_bits, header.alg_id
        )));
    }
    if header.alg_id_hash != CALG_SHA1 {
        return Err(DecryptError::UnsupportedEncryption(format!(
            "Standard algIdHash {:#010x}",
            header.alg_id_hash
        )));
    }

    let salt_size = r.read_u32_le("EncryptionVerifier.saltSize")?;
    if salt_size != 16 {
        return Err(DecryptError::InvalidEncryptionInfo(format!(
            "EncryptionVerifier.saltSize must be 16, got {salt_size}"
        )));
    }
    let salt = r.take(16, "EncryptionVerifier.salt")?.to_vec();
    let mut encrypted_verifier = [0u8; 16];
    encrypted_verifier.copy_from_slice(r.take(16, "EncryptionVerifier.encryptedVerifier")?);
    let verifier_hash_size = r.read_u32_le("EncryptionVerifier.verifierHashSize")?;
    if verifier_hash_size as usize != SHA1_LEN {
        return Err(DecryptError::InvalidEncryptionInfo(format!(
            "EncryptionVerifier.verifierHashSize must be 20, got {verifier_hash_size}"
        )));
    }
    // The 20-byte SHA-1 verifier hash is padded to two AES blocks.
    let encrypted_verifier_hash = r
        .take(32, "EncryptionVerifier.encryptedVerifierHash")?
        .to_vec();

    Ok(StandardEncryptionInfo {
        header,
        verifier: StandardEncryptionVerifier {
            salt,
            encrypted_verifier,
            encrypted_verifier_hash,
        },
    })
}

fn sha1(parts: &[&[u8]]) -> [u8; SHA1_LEN] {
    let mut hasher = Sha1::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Password to AES key derivation for Standard encryption.
pub fn standard_derive_key(
    info: &StandardEncryptionInfo,
    password: &str,
) -> Result<Zeroizing<Vec<u8>>, DecryptError> {
    let key_len = (info.header.key_size_bits / 8) as usize;
    let pw = password_utf16le(password);

    let mut h = Zeroizing::new(sha1(&[&info.verifier.salt[..], &pw[..]]));
    for i in 0..SPIN_COUNT {
        *h = sha1(&[&i.to_le_bytes()[..], &h[..]]);
    }
    let hfinal = Zeroizing::new(sha1(&[&h[..], &0u32.to_le_bytes()[..]]));

    let mut buf1 = Zeroizing::new([0x36u8; 64]);
    let mut buf2 = Zeroizing::new([0x5cu8; 64]);
    for i in 0..SHA1_LEN {
        buf1[i] ^= hfinal[i];
        buf2[i] ^= hfinal[i];
    }
    let mut derived = Zeroizing::new(Vec::with_capacity(SHA1_LEN * 2));
    derived.extend_from_slice(&sha1(&[&buf1[..]]));
    derived.extend_from_slice(&sha1(&[&buf2[..]]));

    if key_len > derived.len() {
        return Err(DecryptError::UnsupportedEncryption(format!(
            "Standard key of {} bits",
            info.header.key_size_bits
        )));
    }
    derived.truncate(key_len);
    Ok(derived)
}

/// Check a derived key against the encrypted verifier.
pub fn standard_verify_key(info: &StandardEncryptionInfo, key: &[u8]) -> Result<(), DecryptError> {
    let mut verifier = Zeroizing::new(info.verifier.encrypted_verifier);
    aes_ecb_decrypt_in_place("encryptedVerifier", key, &mut verifier[..])?;
    let expected = sha1(&[&verifier[..]]);

    let mut verifier_hash = Zeroizing::new(info.verifier.encrypted_verifier_hash.clone());
    aes_ecb_decrypt_in_place("encryptedVerifierHash", key, &mut verifier_hash)?;
    if ct_eq(&expected, &verifier_hash[..SHA1_LEN]) {
        Ok(())
    } else {
        Err(DecryptError::InvalidPassword)
    }
}

/// Decrypt a Standard-encrypted package.
///
/// `info_payload` is the `EncryptionInfo` stream after its 8-byte version header.
pub fn decrypt_standard(
    info_payload: &[u8],
    encrypted_package: &[u8],
    password: &str,
) -> Result<Vec<u8>, DecryptError> {
    let info = parse_standard_encryption_info(info_payload)?;
    let (declared_len, ciphertext) = split_encrypted_package(encrypted_package)?;
    require_block_aligned("EncryptedPackage", ciphertext)?;

    debug!(
        "standard: alg_id={:#x} key_bits={}",
        info.header.alg_id, info.header.key_size_bits
    );
    let key = standard_derive_key(&info, password)?;
    standard_verify_key(&info, &key)?;

    let mut plaintext = ciphertext.to_vec();
    aes_ecb_decrypt_in_place("EncryptedPackage", &key, &mut plaintext)?;
    plaintext.truncate(declared_len);
    Ok(plaintext)
}
