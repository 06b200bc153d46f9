//! HKDF (RFC 5869) over the configured hash.
//!
//! prk = HMAC-Hash(salt, ikm)
//! okm = T(1) || T(2) || ... truncated to `length`, `length <= 255 * HashLen`

use hkdf::Hkdf;
use sha2::{Sha256, Sha384, Sha512};
use zeroize::Zeroizing;

use crate::error::CryptoError;
use crate::suite::HashAlgorithm;

/// HKDF-Extract.
pub fn extract(hash: HashAlgorithm, salt: &[u8], ikm: &[u8]) -> Zeroizing<Vec<u8>> {
    let prk = match hash {
        HashAlgorithm::Sha256 => Hkdf::<Sha256>::extract(Some(salt), ikm).0.to_vec(),
        HashAlgorithm::Sha384 => Hkdf::<Sha384>::extract(Some(salt), ikm).0.to_vec(),
        HashAlgorithm::Sha512 => Hkdf::<Sha512>::extract(Some(salt), ikm).0.to_vec(),
    };
    Zeroizing::new(prk)
}

/// HKDF-Expand.
pub fn expand(
    hash: HashAlgorithm,
    prk: &[u8],
    info: &[u8],
    length: usize,
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let max = 255 * hash.digest_size();
    if length > max {
        return Err(CryptoError::OutputTooLong { requested: length, max });
    }

    let mut okm = Zeroizing::new(vec![0u8; length]);
    let invalid_prk = |_| CryptoError::InvalidPrk { min: hash.digest_size() };
    let too_long = |_| CryptoError::OutputTooLong { requested: length, max };
    match hash {
        HashAlgorithm::Sha256 => Hkdf::<Sha256>::from_prk(prk)
            .map_err(invalid_prk)?
            .expand(info, &mut okm)
            .map_err(too_long)?,
        HashAlgorithm::Sha384 => Hkdf::<Sha384>::from_prk(prk)
            .map_err(invalid_prk)?
            .expand(info, &mut okm)
            .map_err(too_long)?,
        HashAlgorithm::Sha512 => Hkdf::<Sha512>::from_prk(prk)
            .map_err(invalid_prk)?
            .expand(info, &mut okm)
            .map_err(too_long)?,
    }
    Ok(okm)
}
