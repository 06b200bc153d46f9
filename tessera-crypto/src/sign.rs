//! Keyed-hash signing: HMAC over the configured hash.

use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha384, Sha512};
use subtle::ConstantTimeEq;

use crate::error::CryptoError;
use crate::suite::HashAlgorithm;

macro_rules! hmac_digest {
    ($hash:ty, $key:expr, $message:expr) => {{
        let mut mac = <Hmac<$hash>>::new_from_slice($key).map_err(|_| {
            CryptoError::InvalidKeyLength { expected: 0, actual: $key.len() }
        })?;
        mac.update($message);
        mac.finalize().into_bytes().to_vec()
    }};
}

/// HMAC-`hash`(key, message).
pub fn sign(hash: HashAlgorithm, key: &[u8], message: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let tag = match hash {
        HashAlgorithm::Sha256 => hmac_digest!(Sha256, key, message),
        HashAlgorithm::Sha384 => hmac_digest!(Sha384, key, message),
        HashAlgorithm::Sha512 => hmac_digest!(Sha512, key, message),
    };
    Ok(tag)
}

/// Recompute and compare in constant time.
pub fn verify(
    hash: HashAlgorithm,
    key: &[u8],
    message: &[u8],
    signature: &[u8],
) -> Result<bool, CryptoError> {
    let expected = sign(hash, key, message)?;
    Ok(expected.ct_eq(signature).into())
}
