//! Error type for the primitive layer.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("encryption failed")]
    EncryptionFailed,

    /// Uniform failure for truncated, tampered, or wrong-key ciphertexts.
    #[error("decryption failed")]
    DecryptionFailed,

    #[error("requested {requested} bytes of HKDF output, maximum is {max}")]
    OutputTooLong { requested: usize, max: usize },

    #[error("pseudorandom key too short: need at least {min} bytes")]
    InvalidPrk { min: usize },

    #[error("random number generator unavailable")]
    Random,

    #[error("unknown algorithm: {0}")]
    UnknownAlgorithm(String),
}
