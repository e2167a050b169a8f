//! Agile encryption (`EncryptionInfo` version 4.4).
//!
//! The password unlocks the package key in three steps:
//!
//! 1. `H = iterated_hash(password, p:encryptedKey.saltValue, spinCount)`
//! 2. decrypt `encryptedVerifierHashInput` / `encryptedVerifierHashValue` with keys derived from
//!    `H` and check `Hash(verifierHashInput) == verifierHashValue`
//! 3. decrypt `encryptedKeyValue` to obtain the package key
//!
//! The `EncryptedPackage` stream is then decrypted in 4096-byte segments, each with its own IV
//! derived from `keyData.saltValue` and the little-endian segment index.

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine;
use log::debug;
use zeroize::Zeroizing;

use crate::crypto::{
    aes_cbc_decrypt, ct_eq, derive_iv, derive_key, hash_password, require_block_aligned,
    HashAlgorithm,
};
use crate::{DecryptError, MAX_SPIN_COUNT};

const VERIFIER_HASH_INPUT_BLOCK: [u8; 8] = [0xFE, 0xA7, 0xD2, 0x76, 0x3B, 0x4B, 0x9E, 0x79];
const VERIFIER_HASH_VALUE_BLOCK: [u8; 8] = [0xD7, 0xAA, 0x0F, 0x6D, 0x30, 0x61, 0x34, 0x4E];
const KEY_VALUE_BLOCK: [u8; 8] = [0x14, 0x6E, 0x0B, 0xE7, 0xAB, 0xAC, 0xD0, 0xD6];
const HMAC_KEY_BLOCK: [u8; 8] = [0x5F, 0xB2, 0xAD, 0x01, 0x0C, 0xB9, 0xE1, 0xF6];
const HMAC_VALUE_BLOCK: [u8; 8] = [0xA0, 0x67, 0x7F, 0x02, 0xB2, 0x2C, 0x84, 0x33];

const PASSWORD_KEY_ENCRYPTOR_URI: &str =
    "http://schemas.microsoft.com/office/2006/keyEncryptor/password";

const SEGMENT_SIZE: usize = 4096;

#[derive(Debug, Clone)]
pub struct KeyData {
    pub salt_value: Vec<u8>,
    pub hash_algorithm: HashAlgorithm,
    pub block_size: usize,
    pub key_bits: usize,
    pub hash_size: usize,
}

#[derive(Debug, Clone)]
pub struct DataIntegrity {
    pub encrypted_hmac_key: Vec<u8>,
    pub encrypted_hmac_value: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct PasswordKeyEncryptor {
    pub salt_value: Vec<u8>,
    pub hash_algorithm: HashAlgorithm,
    pub spin_count: u32,
    pub block_size: usize,
    pub key_bits: usize,
    pub hash_size: usize,
    pub encrypted_verifier_hash_input: Vec<u8>,
    pub encrypted_verifier_hash_value: Vec<u8>,
    pub encrypted_key_value: Vec<u8>,
}

/// Parsed Agile `EncryptionInfo` XML descriptor.
#[derive(Debug, Clone)]
pub struct AgileEncryptionInfo {
    pub key_data: KeyData,
    pub data_integrity: DataIntegrity,
    pub password_key: PasswordKeyEncryptor,
}

fn invalid(msg: impl Into<String>) -> DecryptError {
    DecryptError::InvalidEncryptionInfo(msg.into())
}

/// Parse the XML payload that follows the 8-byte version header.
pub fn parse_agile_encryption_info(xml_bytes: &[u8]) -> Result<AgileEncryptionInfo, DecryptError> {
    let xml_bytes = xml_bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(xml_bytes);
    let end = xml_bytes
        .iter()
        .rposition(|b| *b != 0)
        .map(|idx| idx + 1)
        .unwrap_or(0);
    let text = std::str::from_utf8(&xml_bytes[..end])
        .map_err(|_| invalid("EncryptionInfo XML is not UTF-8"))?;
    let doc = roxmltree::Document::parse(text).map_err(|e| invalid(e.to_string()))?;

    let find = |name: &'static str| {
        doc.descendants()
            .find(|n| n.is_element() && n.tag_name().name() == name)
            .ok_or_else(|| invalid(format!("missing <{name}> element")))
    };

    let key_data_node = find("keyData")?;
    let data_integrity_node = find("dataIntegrity")?;

    // Office may list several key encryptors (password, certificate); only the password one is
    // usable here.
    let encrypted_key_node = doc
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "keyEncryptor")
        .filter(|n| n.attribute("uri").map(str::trim) == Some(PASSWORD_KEY_ENCRYPTOR_URI))
        .find_map(|n| {
            n.children()
                .find(|c| c.is_element() && c.tag_name().name() == "encryptedKey")
        })
        .ok_or_else(|| DecryptError::UnsupportedEncryption("no password key encryptor".into()))?;

    validate_cipher_settings(key_data_node)?;
    validate_cipher_settings(encrypted_key_node)?;

    let key_data = KeyData {
        salt_value: base64_attr(key_data_node, "saltValue")?,
        hash_algorithm: hash_attr(key_data_node)?,
        block_size: usize_attr(key_data_node, "blockSize")?,
        key_bits: usize_attr(key_data_node, "keyBits")?,
        hash_size: usize_attr(key_data_node, "hashSize")?,
    };
    let data_integrity = DataIntegrity {
        encrypted_hmac_key: base64_attr(data_integrity_node, "encryptedHmacKey")?,
        encrypted_hmac_value: base64_attr(data_integrity_node, "encryptedHmacValue")?,
    };
    let password_key = PasswordKeyEncryptor {
        salt_value: base64_attr(encrypted_key_node, "saltValue")?,
        hash_algorithm: hash_attr(encrypted_key_node)?,
        spin_count: u32_attr(encrypted_key_node, "spinCount")?,
        block_size: usize_attr(encrypted_key_node, "blockSize")?,
        key_bits: usize_attr(encrypted_key_node, "keyBits")?,
        hash_size: usize_attr(encrypted_key_node, "hashSize")?,
        encrypted_verifier_hash_input: base64_attr(
            encrypted_key_node,
            "encryptedVerifierHashInput",
        )?,
        encrypted_verifier_hash_value: base64_attr(
            encrypted_key_node,
            "encryptedVerifierHashValue",
        )?,
        encrypted_key_value: base64_attr(encrypted_key_node, "encryptedKeyValue")?,
    };

    if password_key.spin_count > MAX_SPIN_COUNT {
        return Err(DecryptError::SpinCountTooLarge {
            spin_count: password_key.spin_count,
            max: MAX_SPIN_COUNT,
        });
    }
    for (what, size) in [
        ("keyData.blockSize", key_data.block_size),
        ("encryptedKey.blockSize", password_key.block_size),
    ] {
        if size != 16 {
            return Err(invalid(format!("{what} must be 16, got {size}")));
        }
    }
    for (what, hash_size, alg) in [
        ("keyData.hashSize", key_data.hash_size, key_data.hash_algorithm),
        (
            "encryptedKey.hashSize",
            password_key.hash_size,
            password_key.hash_algorithm,
        ),
    ] {
        if hash_size != alg.digest_len() {
            return Err(invalid(format!(
                "{what} {hash_size} does not match {alg:?} digest length"
            )));
        }
    }

    Ok(AgileEncryptionInfo {
        key_data,
        data_integrity,
        password_key,
    })
}

fn validate_cipher_settings(node: roxmltree::Node<'_, '_>) -> Result<(), DecryptError> {
    let cipher = required_attr(node, "cipherAlgorithm")?.trim();
    if !cipher.eq_ignore_ascii_case("AES") {
        return Err(DecryptError::UnsupportedEncryption(format!(
            "cipher algorithm `{cipher}`"
        )));
    }
    let chaining = required_attr(node, "cipherChaining")?.trim();
    if !chaining.eq_ignore_ascii_case("ChainingModeCBC") {
        return Err(DecryptError::UnsupportedEncryption(format!(
            "cipher chaining `{chaining}`"
        )));
    }
    Ok(())
}

fn required_attr<'a>(node: roxmltree::Node<'a, '_>, attr: &str) -> Result<&'a str, DecryptError> {
    node.attribute(attr).ok_or_else(|| {
        invalid(format!(
            "<{}> is missing attribute `{attr}`",
            node.tag_name().name()
        ))
    })
}

fn usize_attr(node: roxmltree::Node<'_, '_>, attr: &str) -> Result<usize, DecryptError> {
    required_attr(node, attr)?
        .trim()
        .parse()
        .map_err(|_| invalid(format!("attribute `{attr}` is not a number")))
}

fn u32_attr(node: roxmltree::Node<'_, '_>, attr: &str) -> Result<u32, DecryptError> {
    required_attr(node, attr)?
        .trim()
        .parse()
        .map_err(|_| invalid(format!("attribute `{attr}` is not a number")))
}

fn hash_attr(node: roxmltree::Node<'_, '_>) -> Result<HashAlgorithm, DecryptError> {
    HashAlgorithm::parse_offcrypto_name(required_attr(node, "hashAlgorithm")?)
}

/// Base64 attribute decoding that tolerates embedded whitespace and missing `=` padding.
fn base64_attr(node: roxmltree::Node<'_, '_>, attr: &str) -> Result<Vec<u8>, DecryptError> {
    let raw = required_attr(node, attr)?;
    let cleaned: String = raw.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD
        .decode(&cleaned)
        .or_else(|_| STANDARD_NO_PAD.decode(&cleaned))
        .map_err(|_| invalid(format!("attribute `{attr}` is not valid base64")))
}

fn key_len(key_bits: usize, what: &str) -> Result<usize, DecryptError> {
    match key_bits {
        128 | 192 | 256 => Ok(key_bits / 8),
        other => Err(DecryptError::UnsupportedEncryption(format!(
            "{what} of {other} bits"
        ))),
    }
}

#[derive(Debug, Clone, Copy)]
enum PasswordIv {
    /// `saltValue` used directly as the IV.
    SaltValue,
    /// `Hash(saltValue || blockKey)` truncated to the block size.
    Derived,
}

fn unwrap_package_key(
    info: &AgileEncryptionInfo,
    password_hash: &[u8],
    iv_mode: PasswordIv,
) -> Result<Zeroizing<Vec<u8>>, DecryptError> {
    let pk = &info.password_key;
    let kek_len = key_len(pk.key_bits, "encryptedKey.keyBits")?;
    let package_key_len = key_len(info.key_data.key_bits, "keyData.keyBits")?;

    let decrypt_field = |field: &'static str, block: &[u8; 8], ciphertext: &[u8]| {
        let key = derive_key(password_hash, block, kek_len, pk.hash_algorithm);
        let iv = match iv_mode {
            PasswordIv::SaltValue => pk.salt_value.clone(),
            PasswordIv::Derived => {
                derive_iv(&pk.salt_value, block, pk.block_size, pk.hash_algorithm)
            }
        };
        aes_cbc_decrypt(field, &key, &iv, ciphertext).map(Zeroizing::new)
    };

    let verifier_input = decrypt_field(
        "encryptedVerifierHashInput",
        &VERIFIER_HASH_INPUT_BLOCK,
        &pk.encrypted_verifier_hash_input,
    )?;
    let verifier_hash = decrypt_field(
        "encryptedVerifierHashValue",
        &VERIFIER_HASH_VALUE_BLOCK,
        &pk.encrypted_verifier_hash_value,
    )?;

    let input = verifier_input
        .get(..pk.block_size)
        .ok_or(DecryptError::Truncated {
            context: "verifierHashInput",
        })?;
    let computed = pk.hash_algorithm.digest(input);
    // The stored digest is padded to a block boundary; compare the digest prefix only.
    let expected = verifier_hash
        .get(..pk.hash_size)
        .ok_or(DecryptError::InvalidPassword)?;
    if !ct_eq(&computed[..pk.hash_size], expected) {
        return Err(DecryptError::InvalidPassword);
    }

    let key_value = decrypt_field("encryptedKeyValue", &KEY_VALUE_BLOCK, &pk.encrypted_key_value)?;
    let key = key_value
        .get(..package_key_len)
        .ok_or(DecryptError::Truncated {
            context: "encryptedKeyValue",
        })?;
    Ok(Zeroizing::new(key.to_vec()))
}

/// Split an `EncryptedPackage` stream into its declared plaintext size and ciphertext.
pub(crate) fn split_encrypted_package(stream: &[u8]) -> Result<(usize, &[u8]), DecryptError> {
    let (size, ciphertext) = stream
        .split_first_chunk::<8>()
        .ok_or(DecryptError::Truncated {
            context: "EncryptedPackage size prefix",
        })?;
    let declared = u64::from_le_bytes(*size);
    match usize::try_from(declared) {
        Ok(len) if len <= ciphertext.len() => Ok((len, ciphertext)),
        _ => Err(DecryptError::PackageSizeMismatch {
            declared,
            available: ciphertext.len(),
        }),
    }
}

/// Decrypt an Agile-encrypted package.
///
/// `xml` is the `EncryptionInfo` stream after its 8-byte version header and `encrypted_package`
/// is the whole `EncryptedPackage` stream (size prefix included).
pub fn decrypt_agile(
    xml: &[u8],
    encrypted_package: &[u8],
    password: &str,
) -> Result<Vec<u8>, DecryptError> {
    let info = parse_agile_encryption_info(xml)?;
    let pk = &info.password_key;
    for (field, buf) in [
        ("encryptedVerifierHashInput", &pk.encrypted_verifier_hash_input),
        ("encryptedVerifierHashValue", &pk.encrypted_verifier_hash_value),
        ("encryptedKeyValue", &pk.encrypted_key_value),
        ("encryptedHmacKey", &info.data_integrity.encrypted_hmac_key),
        ("encryptedHmacValue", &info.data_integrity.encrypted_hmac_value),
    ] {
        require_block_aligned(field, buf)?;
    }
    let (declared_len, ciphertext) = split_encrypted_package(encrypted_package)?;
    require_block_aligned("EncryptedPackage", ciphertext)?;

    debug!(
        "agile: hash={:?} spin_count={} key_bits={}",
        pk.hash_algorithm, pk.spin_count, info.key_data.key_bits
    );
    let password_hash = hash_password(password, &pk.salt_value, pk.spin_count, pk.hash_algorithm);

    // Producers disagree on the IV for the password key encryptor fields; a verifier mismatch
    // with one scheme falls back to the other.
    let package_key = match unwrap_package_key(&info, &password_hash, PasswordIv::SaltValue) {
        Ok(key) => key,
        Err(DecryptError::InvalidPassword) => {
            unwrap_package_key(&info, &password_hash, PasswordIv::Derived)?
        }
        Err(other) => return Err(other),
    };

    let kd = &info.key_data;
    let mut plaintext = Vec::with_capacity(ciphertext.len());
    for (idx, segment) in ciphertext.chunks(SEGMENT_SIZE).enumerate() {
        let index = u32::try_from(idx).map_err(|_| invalid("too many package segments"))?;
        let iv = derive_iv(
            &kd.salt_value,
            &index.to_le_bytes(),
            kd.block_size,
            kd.hash_algorithm,
        );
        plaintext.extend_from_slice(&aes_cbc_decrypt(
            "EncryptedPackage",
            &package_key,
            &iv,
            segment,
        )?);
    }
    plaintext.truncate(declared_len);

    verify_data_integrity(&info, &package_key, encrypted_package, &plaintext)?;
    Ok(plaintext)
}

fn verify_data_integrity(
    info: &AgileEncryptionInfo,
    package_key: &[u8],
    encrypted_package: &[u8],
    plaintext: &[u8],
) -> Result<(), DecryptError> {
    let kd = &info.key_data;
    let decrypt_field = |field: &'static str,
                         block: &[u8; 8],
                         ciphertext: &[u8]|
     -> Result<Zeroizing<Vec<u8>>, DecryptError> {
        let iv = derive_iv(&kd.salt_value, block, kd.block_size, kd.hash_algorithm);
        let mut out = aes_cbc_decrypt(field, package_key, &iv, ciphertext)?;
        if out.len() < kd.hash_size {
            return Err(DecryptError::Truncated { context: field });
        }
        out.truncate(kd.hash_size);
        Ok(Zeroizing::new(out))
    };

    let hmac_key = decrypt_field(
        "encryptedHmacKey",
        &HMAC_KEY_BLOCK,
        &info.data_integrity.encrypted_hmac_key,
    )?;
    let expected = decrypt_field(
        "encryptedHmacValue",
        &HMAC_VALUE_BLOCK,
        &info.data_integrity.encrypted_hmac_value,
    )?;

    // The HMAC covers the whole EncryptedPackage stream; some producers hash the plaintext
    // instead, so that target is accepted too.
    let over_stream = kd.hash_algorithm.hmac(&hmac_key, encrypted_package)?;
    if ct_eq(&over_stream, &expected) {
        return Ok(());
    }
    let over_plaintext = kd.hash_algorithm.hmac(&hmac_key, plaintext)?;
    if ct_eq(&over_plaintext, &expected) {
        debug!("agile: dataIntegrity matched the plaintext package");
        return Ok(());
    }
    Err(DecryptError::IntegrityCheckFailed)
}
