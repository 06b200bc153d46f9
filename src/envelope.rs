//! Envelope format
//!
//! Envelope = (metadata, body, signature)
//!
//!   metadata  = JSON {source, destination, timestamp, nonce, esek, encryption}
//!   body      = payload, or AEAD(ekey, payload) when `encryption` is set
//!   signature = HMAC(skey, version || metadata || body)
//!
//! The metadata is carried as the exact JSON text that was signed; it is
//! never re-serialized on the receiving side.
//!
//! ESEK plaintext (wrapped under the destination's static or group key):
//!   JSON {key: base64, timestamp, ttl}
//!
//! SEK derivation:
//!   skey || ekey = HKDF-Expand(key, "{source},{destination},{timestamp}", 2 * key_size)
//!   (key is first HKDF-Extracted when it is shorter than the hash output)

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tessera_crypto::{CryptoError, CryptoManager};
use zeroize::Zeroizing;

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Signed envelope header. Every field is required.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub source: String,
    pub destination: String,
    /// Sender clock, unix seconds.
    pub timestamp: f64,
    pub nonce: u64,
    /// Base64 esek from the sender's ticket.
    pub esek: String,
    pub encryption: bool,
}

impl Metadata {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| Error::InvalidArgument(format!("metadata serialization: {}", e)))
    }

    /// Parse received metadata. Missing or mistyped fields are rejected here.
    pub fn parse(text: &str) -> Result<Self> {
        let md: Metadata =
            serde_json::from_str(text).map_err(|e| Error::InvalidMetadata(e.to_string()))?;
        if !md.timestamp.is_finite() {
            return Err(Error::InvalidMetadata("timestamp is not a finite number".into()));
        }
        Ok(md)
    }
}

/// Parse metadata without any verification. For diagnostics only.
pub fn inspect(metadata: &str) -> Result<Metadata> {
    Metadata::parse(metadata)
}

/// Bytes covered by the envelope signature.
pub fn signed_bytes(version: &str, metadata: &str, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(version.len() + metadata.len() + body.len());
    out.extend_from_slice(version.as_bytes());
    out.extend_from_slice(metadata.as_bytes());
    out.extend_from_slice(body);
    out
}

// ---------------------------------------------------------------------------
// Sealed message
// ---------------------------------------------------------------------------

/// The `(metadata, body, signature)` triple produced by `encode`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SealedMessage {
    pub metadata: String,
    pub body: Vec<u8>,
    pub signature: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct SealedMessageWire {
    metadata: String,
    body: String,
    signature: String,
}

impl SealedMessage {
    /// `{"metadata": "...", "body": base64, "signature": base64}`
    pub fn to_json(&self) -> Result<String> {
        let wire = SealedMessageWire {
            metadata: self.metadata.clone(),
            body: BASE64.encode(&self.body),
            signature: BASE64.encode(&self.signature),
        };
        serde_json::to_string(&wire)
            .map_err(|e| Error::InvalidArgument(format!("envelope serialization: {}", e)))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let wire: SealedMessageWire =
            serde_json::from_str(text).map_err(|e| Error::InvalidMetadata(e.to_string()))?;
        let body = BASE64
            .decode(wire.body)
            .map_err(|e| Error::InvalidMetadata(format!("body: {}", e)))?;
        let signature = BASE64
            .decode(wire.signature)
            .map_err(|e| Error::InvalidMetadata(format!("signature: {}", e)))?;
        Ok(Self { metadata: wire.metadata, body, signature })
    }
}

// ---------------------------------------------------------------------------
// ESEK and SEK derivation
// ---------------------------------------------------------------------------

/// Plaintext of an esek blob.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EsekPayload {
    /// Base64 key material the SEK is expanded from.
    pub key: String,
    /// Issue time, unix seconds.
    pub timestamp: f64,
    /// Validity, seconds from `timestamp`.
    pub ttl: f64,
}

impl EsekPayload {
    pub fn new(key: &[u8], timestamp: f64, ttl: f64) -> Self {
        Self { key: BASE64.encode(key), timestamp, ttl }
    }

    pub fn key_bytes(&self) -> Option<Zeroizing<Vec<u8>>> {
        BASE64.decode(&self.key).ok().map(Zeroizing::new)
    }

    /// `None` unless both bounds are finite and `ttl >= 0`.
    pub fn window(&self) -> Option<(f64, f64)> {
        let end = self.timestamp + self.ttl;
        (self.timestamp.is_finite() && end.is_finite() && self.ttl >= 0.0)
            .then_some((self.timestamp, end))
    }

    /// Wrap under `key`, returning the base64 esek carried in metadata.
    pub fn seal(&self, crypto: &CryptoManager, key: &[u8]) -> Result<String> {
        let json = serde_json::to_vec(self)
            .map_err(|e| Error::InvalidArgument(format!("esek serialization: {}", e)))?;
        let sealed = crypto
            .encrypt(key, &json)
            .map_err(|e| Error::InvalidArgument(format!("esek encryption: {}", e)))?;
        Ok(BASE64.encode(sealed))
    }
}

/// HKDF info for SEK derivation.
pub fn sek_info(source: &str, destination: &str, timestamp: f64) -> String {
    format!("{},{},{}", source, destination, timestamp)
}

/// Expand `wrapped_key` into `(skey, ekey)`, each `crypto.key_size()` long.
///
/// A wrapped key shorter than the hash output is not a valid PRK for that
/// hash; it is run through HKDF-Extract (empty salt) first.
pub fn derive_session_keys(
    crypto: &CryptoManager,
    wrapped_key: &[u8],
    source: &str,
    destination: &str,
    timestamp: f64,
) -> std::result::Result<(Zeroizing<Vec<u8>>, Zeroizing<Vec<u8>>), CryptoError> {
    let size = crypto.key_size();
    let info = sek_info(source, destination, timestamp);
    let okm = if wrapped_key.len() < crypto.hash().digest_size() {
        let prk = crypto.extract(&[], wrapped_key);
        crypto.expand(&prk, info.as_bytes(), 2 * size)?
    } else {
        crypto.expand(wrapped_key, info.as_bytes(), 2 * size)?
    };
    let (skey, ekey) = okm.split_at(size);
    Ok((Zeroizing::new(skey.to_vec()), Zeroizing::new(ekey.to_vec())))
}
