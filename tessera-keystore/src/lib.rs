//! # Tessera Keystore
//!
//! Typed, expiring, thread-safe cache of session key material.
//!
//! Holds tickets fetched from the KDS, session keys derived from inbound
//! eseks, and group keys, each keyed by `(source, destination, kind)`.
//! No cryptography happens here.
//!
//! ## Quick Start
//!
//! ```rust
//! use tessera_keystore::*;
//! use chrono::{Duration, Utc};
//! use std::sync::Arc;
//! use zeroize::Zeroizing;
//!
//! let clock = Arc::new(ManualClock::starting_now());
//! let store = KeyStore::with_clock(clock.clone());
//!
//! let keys = SessionKeys {
//!     skey: Zeroizing::new(vec![1; 32]),
//!     ekey: Zeroizing::new(vec![2; 32]),
//! };
//! store.put_sek("compute.a", "compute.b", keys, clock.now() + Duration::seconds(60));
//! assert!(store.get_sek("compute.a", "compute.b").is_some());
//!
//! clock.advance(Duration::seconds(60));
//! assert!(store.get_sek("compute.a", "compute.b").is_none());
//! ```

pub mod clock;
pub mod store;
pub mod types;

pub use clock::{from_unix_seconds, to_unix_seconds, Clock, ManualClock, SystemClock};
pub use store::KeyStore;
pub use types::{CacheKey, GroupKey, KeyKind, Payload, SessionKeys, Ticket};

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
