//! AEAD: AES-256-GCM or ChaCha20-Poly1305
//!
//! Layout: nonce[12] || ciphertext || tag[16]

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::Aes256Gcm;
use chacha20poly1305::ChaCha20Poly1305;
use getrandom::getrandom;

use crate::error::CryptoError;
use crate::suite::CipherSuite;

pub const NONCE_BYTES: usize = 12;
pub const TAG_BYTES: usize = 16;

/// Generate a random 12-byte nonce. Used during encryption only.
pub fn nonce() -> Result<[u8; NONCE_BYTES], CryptoError> {
    let mut n = [0u8; NONCE_BYTES];
    getrandom(&mut n).map_err(|_| CryptoError::Random)?;
    Ok(n)
}

fn check_key(suite: CipherSuite, key: &[u8]) -> Result<(), CryptoError> {
    if key.len() != suite.key_size() {
        return Err(CryptoError::InvalidKeyLength {
            expected: suite.key_size(),
            actual: key.len(),
        });
    }
    Ok(())
}

/// Encrypt under a fresh random nonce.
pub fn seal(suite: CipherSuite, key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    check_key(suite, key)?;
    let n = nonce()?;

    let ct = match suite {
        CipherSuite::Aes256Gcm => {
            let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::EncryptionFailed)?;
            cipher
                .encrypt(aes_gcm::Nonce::from_slice(&n), plaintext)
                .map_err(|_| CryptoError::EncryptionFailed)?
        }
        CipherSuite::ChaCha20Poly1305 => {
            let cipher =
                ChaCha20Poly1305::new_from_slice(key).map_err(|_| CryptoError::EncryptionFailed)?;
            cipher
                .encrypt(chacha20poly1305::Nonce::from_slice(&n), plaintext)
                .map_err(|_| CryptoError::EncryptionFailed)?
        }
    };

    let mut out = Vec::with_capacity(NONCE_BYTES + ct.len());
    out.extend_from_slice(&n);
    out.extend_from_slice(&ct);
    Ok(out)
}

/// Decrypt `nonce || ciphertext || tag`. Every failure is `DecryptionFailed`.
pub fn open(suite: CipherSuite, key: &[u8], sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if key.len() != suite.key_size() || sealed.len() < NONCE_BYTES + TAG_BYTES {
        return Err(CryptoError::DecryptionFailed);
    }
    let (n, ct) = sealed.split_at(NONCE_BYTES);

    match suite {
        CipherSuite::Aes256Gcm => {
            let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::DecryptionFailed)?;
            cipher
                .decrypt(aes_gcm::Nonce::from_slice(n), ct)
                .map_err(|_| CryptoError::DecryptionFailed)
        }
        CipherSuite::ChaCha20Poly1305 => {
            let cipher =
                ChaCha20Poly1305::new_from_slice(key).map_err(|_| CryptoError::DecryptionFailed)?;
            cipher
                .decrypt(chacha20poly1305::Nonce::from_slice(n), ct)
                .map_err(|_| CryptoError::DecryptionFailed)
        }
    }
}
