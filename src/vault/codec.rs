//! Password-based codec for the vault blob.
//!
//! Blob layout: `[ iv: 16 bytes ][ salt: 16 bytes ][ ciphertext ]`,
//! hex-encoded at rest. The AES key is derived from the password and the
//! embedded salt with scrypt, so the blob is self-contained: the password is
//! the only external secret. A fresh salt and IV are drawn on every call,
//! which makes repeated encryptions of the same plaintext produce different
//! blobs.

use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use rand::RngCore;
use rand::rngs::OsRng;
use zeroize::Zeroizing;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Size of the CBC initialization vector in bytes.
pub const IV_SIZE: usize = 16;

/// Size of the key-derivation salt in bytes.
pub const SALT_SIZE: usize = 16;

/// Size of the derived AES-256 key in bytes.
const KEY_SIZE: usize = 32;

/// AES block size; valid ciphertext is always a whole number of blocks.
const BLOCK_SIZE: usize = 16;

/// Decode failures, split so callers can tell "wrong password" from
/// "corrupt file".
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The blob is structurally invalid and will never decrypt, under any
    /// password.
    #[error("malformed vault blob: {0}")]
    Malformed(&'static str),

    /// The padding check failed. Either the password is wrong or the
    /// ciphertext was altered; the cipher cannot tell the two apart.
    #[error("bad password or corrupt data")]
    BadPassword,
}

/// Derive the AES key from the password and salt.
///
/// The scrypt work factor is fixed: changing it would silently orphan every
/// existing vault file, since the parameters are not recorded in the blob.
fn derive_key(password: &str, salt: &[u8]) -> Zeroizing<[u8; KEY_SIZE]> {
    let params = scrypt::Params::new(14, 8, 1, KEY_SIZE).expect("fixed scrypt parameters are valid");
    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    scrypt::scrypt(password.as_bytes(), salt, &params, key.as_mut())
        .expect("output buffer length is fixed");
    key
}

/// Encrypt `plaintext` under `password` into a hex blob.
pub fn encrypt(plaintext: &[u8], password: &str) -> String {
    let mut iv = [0u8; IV_SIZE];
    OsRng.fill_bytes(&mut iv);
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);

    let key = derive_key(password, &salt);
    let key: &[u8; KEY_SIZE] = &key;
    let ciphertext =
        Aes256CbcEnc::new(key.into(), (&iv).into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut blob = Vec::with_capacity(IV_SIZE + SALT_SIZE + ciphertext.len());
    blob.extend_from_slice(&iv);
    blob.extend_from_slice(&salt);
    blob.extend_from_slice(&ciphertext);
    hex::encode(blob)
}

/// Decrypt a blob produced by [`encrypt`].
///
/// # Errors
/// [`CodecError::Malformed`] when the blob is not valid hex, is shorter than
/// the header plus one cipher block, or carries a ragged ciphertext length.
/// [`CodecError::BadPassword`] when the padding check fails.
pub fn decrypt(blob: &str, password: &str) -> Result<Vec<u8>, CodecError> {
    let bytes = hex::decode(blob.trim()).map_err(|_| CodecError::Malformed("not valid hex"))?;
    if bytes.len() < IV_SIZE + SALT_SIZE + BLOCK_SIZE {
        return Err(CodecError::Malformed("shorter than header plus one block"));
    }

    let (iv, rest) = bytes.split_at(IV_SIZE);
    let (salt, ciphertext) = rest.split_at(SALT_SIZE);
    if ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(CodecError::Malformed("ciphertext is not block-aligned"));
    }

    let iv: &[u8; IV_SIZE] = iv.try_into().expect("length checked above");
    let key = derive_key(password, salt);
    let key: &[u8; KEY_SIZE] = &key;

    Aes256CbcDec::new(key.into(), iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CodecError::BadPassword)
}
