//! Core types: KeyKind, CacheKey, and the typed payloads held per kind.

use std::fmt;
use zeroize::Zeroizing;

// ---------------------------------------------------------------------------
// Cache addressing
// ---------------------------------------------------------------------------

/// What an entry holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyKind {
    /// Session key pair derived by a decoder from an inbound esek.
    Sek,
    /// Outbound ticket obtained from the KDS.
    Ticket,
    /// Group key obtained from the KDS.
    GroupKey,
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyKind::Sek => write!(f, "sek"),
            KeyKind::Ticket => write!(f, "ticket"),
            KeyKind::GroupKey => write!(f, "group_key"),
        }
    }
}

/// `(source, destination, kind)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub source: String,
    pub destination: String,
    pub kind: KeyKind,
}

impl CacheKey {
    pub fn new(source: impl Into<String>, destination: impl Into<String>, kind: KeyKind) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            kind,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.source, self.destination, self.kind)
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Outbound ticket: session keys plus the esek the destination can unwrap.
#[derive(Clone)]
pub struct Ticket {
    /// Destination as returned by the KDS (may be host-qualified).
    pub destination: String,
    pub skey: Zeroizing<Vec<u8>>,
    pub ekey: Zeroizing<Vec<u8>>,
    pub esek: String,
}

/// Session keys derived from an inbound esek.
#[derive(Clone)]
pub struct SessionKeys {
    pub skey: Zeroizing<Vec<u8>>,
    pub ekey: Zeroizing<Vec<u8>>,
}

/// Symmetric group key with its KDS generation counter.
#[derive(Clone)]
pub struct GroupKey {
    pub generation: u64,
    pub key: Zeroizing<Vec<u8>>,
}

// Key material never reaches logs.
impl fmt::Debug for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ticket")
            .field("destination", &self.destination)
            .field("esek", &self.esek)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKeys").finish_non_exhaustive()
    }
}

impl fmt::Debug for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupKey")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

/// Stored value. The variant always agrees with the entry's [`KeyKind`].
#[derive(Clone, Debug)]
pub enum Payload {
    Sek(SessionKeys),
    Ticket(Ticket),
    GroupKey(GroupKey),
}

impl Payload {
    pub fn kind(&self) -> KeyKind {
        match self {
            Payload::Sek(_) => KeyKind::Sek,
            Payload::Ticket(_) => KeyKind::Ticket,
            Payload::GroupKey(_) => KeyKind::GroupKey,
        }
    }
}
