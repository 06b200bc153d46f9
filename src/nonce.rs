//! Envelope nonces.
//!
//! nonce = base[32] << 32 | offset[32]
//!
//! `base` is drawn once from the OS RNG; `offset` counts up and wraps at
//! 2^32. Nonces deter replay but are not the freshness check, the esek
//! timestamp window is.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;

use crate::error::{Error, Result};

#[derive(Debug)]
pub struct NonceGenerator {
    base: u32,
    offset: AtomicU32,
}

static GLOBAL: OnceLock<NonceGenerator> = OnceLock::new();

impl NonceGenerator {
    pub fn with_base(base: u32) -> Self {
        Self { base, offset: AtomicU32::new(0) }
    }

    /// Fresh generator with a random base.
    pub fn random() -> Result<Self> {
        let mut buf = [0u8; 4];
        getrandom::getrandom(&mut buf)
            .map_err(|e| Error::InvalidArgument(format!("nonce base: {}", e)))?;
        Ok(Self::with_base(u32::from_be_bytes(buf)))
    }

    /// The process-wide generator, created on first use.
    pub fn global() -> Result<&'static NonceGenerator> {
        if let Some(g) = GLOBAL.get() {
            return Ok(g);
        }
        let candidate = Self::random()?;
        Ok(GLOBAL.get_or_init(|| candidate))
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn next(&self) -> u64 {
        let offset = self.offset.fetch_add(1, Ordering::Relaxed);
        (u64::from(self.base) << 32) | u64::from(offset)
    }
}
