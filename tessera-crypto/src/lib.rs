//! # Tessera Crypto
//!
//! Symmetric primitives consumed by the Tessera envelope protocol.
//!
//! ## Quick Start
//!
//! ```rust
//! use tessera_crypto::{CryptoManager, generate_key};
//!
//! let crypto = CryptoManager::from_names("AES", "SHA256").unwrap();
//! let key = generate_key(crypto.key_size()).unwrap();
//!
//! let ct = crypto.encrypt(&key, b"secret").unwrap();
//! assert_eq!(crypto.decrypt(&key, &ct).unwrap(), b"secret");
//!
//! let sig = crypto.sign(&key, b"message").unwrap();
//! assert!(crypto.verify(&key, b"message", &sig).unwrap());
//! ```
//!
//! ## Provided
//!
//! - **AEAD**: AES-256-GCM or ChaCha20-Poly1305, random nonce per call
//! - **Signing**: HMAC-SHA256/384/512 with constant-time verification
//! - **HKDF**: RFC 5869 extract/expand over the same hash

#![deny(unsafe_code)]

mod aead;
mod error;
mod kdf;
mod sign;
mod suite;

use zeroize::Zeroizing;

pub use aead::{NONCE_BYTES, TAG_BYTES};
pub use error::CryptoError;
pub use suite::{CipherSuite, HashAlgorithm};

/// Fresh random key material of `len` bytes.
pub fn generate_key(len: usize) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let mut key = Zeroizing::new(vec![0u8; len]);
    getrandom::getrandom(&mut key).map_err(|_| CryptoError::Random)?;
    Ok(key)
}

/// One cipher and one hash, fixed for the lifetime of the manager.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CryptoManager {
    suite: CipherSuite,
    hash: HashAlgorithm,
}

impl CryptoManager {
    pub fn new(suite: CipherSuite, hash: HashAlgorithm) -> Self {
        Self { suite, hash }
    }

    /// Resolve configuration names such as `"AES"` / `"SHA256"`.
    pub fn from_names(enctype: &str, hashtype: &str) -> Result<Self, CryptoError> {
        Ok(Self::new(enctype.parse()?, hashtype.parse()?))
    }

    pub fn suite(&self) -> CipherSuite {
        self.suite
    }

    pub fn hash(&self) -> HashAlgorithm {
        self.hash
    }

    /// Symmetric key size in bytes. Signing keys use the same size.
    pub fn key_size(&self) -> usize {
        self.suite.key_size()
    }

    pub fn encrypt(&self, key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        aead::seal(self.suite, key, plaintext)
    }

    pub fn decrypt(&self, key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        aead::open(self.suite, key, ciphertext)
    }

    pub fn sign(&self, key: &[u8], message: &[u8]) -> Result<Vec<u8>, CryptoError> {
        sign::sign(self.hash, key, message)
    }

    pub fn verify(&self, key: &[u8], message: &[u8], signature: &[u8]) -> Result<bool, CryptoError> {
        sign::verify(self.hash, key, message, signature)
    }

    pub fn extract(&self, salt: &[u8], ikm: &[u8]) -> Zeroizing<Vec<u8>> {
        kdf::extract(self.hash, salt, ikm)
    }

    pub fn expand(
        &self,
        prk: &[u8],
        info: &[u8],
        length: usize,
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        kdf::expand(self.hash, prk, info, length)
    }
}
