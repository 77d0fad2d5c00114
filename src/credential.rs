//! At-rest sealing of the bearer token.
//!
//! The token is encrypted with AES-128-CBC under a key derived from the
//! machine (hostname + user name). This keeps the token out of casual reads
//! of the data directory; it is not a defence against a local attacker.

use aes::Aes128;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use sha2::{Digest, Sha256};

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

const SEALED_PREFIX: &str = "enc:";
const IV_LEN: usize = 16;

/// Derives the key from machine-specific seed material.
fn machine_key() -> [u8; 16] {
    let hostname = hostname::get().map_or_else(
        |_| "unknown-host".to_string(),
        |h| h.to_string_lossy().into_owned(),
    );
    let username = whoami::username();

    let mut hasher = Sha256::new();
    hasher.update(hostname.as_bytes());
    hasher.update(b":");
    hasher.update(username.as_bytes());
    hasher.update(b":daily-poetry-token");
    let hash = hasher.finalize();

    let mut key = [0u8; 16];
    key.copy_from_slice(&hash[..16]);
    key
}

/// Encrypts a token for storage, returning `enc:<base64(iv || ciphertext)>`.
///
/// Every call draws a fresh IV, so sealing the same token twice gives
/// different output.
#[must_use]
pub fn seal(token: &str) -> String {
    let iv: [u8; IV_LEN] = rand::random();
    let ciphertext = Aes128CbcEnc::new(&machine_key().into(), &iv.into())
        .encrypt_padded_vec_mut::<Pkcs7>(token.as_bytes());

    let mut sealed = Vec::with_capacity(IV_LEN + ciphertext.len());
    sealed.extend_from_slice(&iv);
    sealed.extend_from_slice(&ciphertext);
    format!("{SEALED_PREFIX}{}", BASE64.encode(sealed))
}

/// Recovers a token from its stored form.
///
/// Values without the `enc:` prefix are taken as plaintext (tokens written by
/// hand or by older clients). Sealed values that fail to decrypt, for example
/// after the data directory moved to another machine, yield `None`.
#[must_use]
pub fn open(stored: &str) -> Option<String> {
    let Some(encoded) = stored.strip_prefix(SEALED_PREFIX) else {
        let plain = stored.trim();
        return (!plain.is_empty()).then(|| plain.to_string());
    };

    let data = BASE64.decode(encoded).ok()?;
    // At least one ciphertext block after the IV.
    if data.len() < IV_LEN * 2 || data.len() % 16 != 0 {
        return None;
    }
    let (iv, ciphertext) = data.split_at(IV_LEN);
    let iv: [u8; IV_LEN] = iv.try_into().ok()?;

    let plain = Aes128CbcDec::new(&machine_key().into(), &iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .ok()?;
    String::from_utf8(plain).ok().filter(|t| !t.is_empty())
}
