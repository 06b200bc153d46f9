//! # Tessera
//!
//! Ticket-based secure messaging envelopes.
//!
//! Two endpoints share no key with each other, only each with a Key
//! Distribution Service. A sender asks the KDS for a ticket to a target,
//! signs (and optionally encrypts) with the session keys in it, and ships
//! the encrypted session key material (esek) inside the envelope metadata.
//! The receiver unwraps the esek with its own static key or its group key,
//! derives the same session keys and verifies.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tessera::{KeyStore, SecureMessage, SecureMessageConfig};
//!
//! # async fn run() -> tessera::Result<()> {
//! let config = SecureMessageConfig::from_env()?;
//! let store = Arc::new(KeyStore::new());
//!
//! let sender = SecureMessage::new("compute", "host1", &config, store.clone())?;
//! let sealed = sender.encode("1.0", "scheduler.host2", b"hello").await?;
//!
//! let receiver = SecureMessage::new("scheduler", "host2", &config, store)?;
//! let (metadata, payload) = receiver.decode_sealed("1.0", &sealed).await?;
//! assert_eq!(metadata.source, "compute.host1");
//! assert_eq!(payload, b"hello");
//! # Ok(())
//! # }
//! ```
//!
//! ## Guarantees
//!
//! - **Authentication**: every envelope carries an HMAC over version,
//!   metadata and body, checked in constant time before any decryption
//! - **Freshness**: an esek is only honored inside its `[timestamp, timestamp + ttl]`
//! - **Binding**: session keys are derived per `(source, destination, esek timestamp)`
//! - **Zeroization**: cached key material is wiped on drop
//!
//! ## What's NOT Provided
//!
//! - Replay detection (nonces are carried, not tracked)
//! - The KDS server itself
//! - Transport of the envelopes

#![deny(unsafe_code)]

pub mod config;
pub mod envelope;
pub mod error;
pub mod kds;
pub mod keys;
pub mod message;
pub mod nonce;

pub use config::SecureMessageConfig;
pub use envelope::{inspect, EsekPayload, Metadata, SealedMessage};
pub use error::{Error, ErrorKind, Result};
pub use kds::KdsClient;
pub use keys::StaticKeys;
pub use message::{group_prefix, SecureMessage};
pub use nonce::NonceGenerator;

pub use tessera_crypto::{generate_key, CipherSuite, CryptoError, CryptoManager, HashAlgorithm};
pub use tessera_keystore::{
    Clock, GroupKey, KeyKind, KeyStore, ManualClock, SessionKeys, SystemClock, Ticket,
};

/// Crate version, sent as part of the KDS `User-Agent`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
