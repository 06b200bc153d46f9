//! Static key source.
//!
//! One entry per line, `name:base64key`. Blank lines and `#` comments are
//! skipped. An entry applies to an endpoint when its name equals the
//! endpoint name or is an ancestor namespace of it (`compute` covers
//! `compute.host1`). The first applicable entry wins.

use std::fmt;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use zeroize::Zeroizing;

use crate::config::SecureMessageConfig;
use crate::error::{Error, Result};

pub struct StaticKeys {
    entries: Vec<(String, Zeroizing<Vec<u8>>)>,
}

impl StaticKeys {
    pub fn parse<I, S>(lines: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries = Vec::new();
        for (lineno, line) in lines.into_iter().enumerate() {
            let line = line.as_ref().trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (name, encoded) = line.rsplit_once(':').ok_or_else(|| {
                Error::InvalidArgument(format!("key entry {}: expected name:base64key", lineno + 1))
            })?;
            let name = name.trim();
            if name.is_empty() {
                return Err(Error::InvalidArgument(format!("key entry {}: empty name", lineno + 1)));
            }
            let key = BASE64.decode(encoded.trim()).map_err(|e| {
                Error::InvalidArgument(format!("key entry {} ({}): {}", lineno + 1, name, e))
            })?;
            entries.push((name.to_string(), Zeroizing::new(key)));
        }
        Ok(Self { entries })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidArgument(format!("read {}: {}", path.display(), e))
        })?;
        Self::parse(text.lines())
    }

    /// A configured key file takes precedence over inline entries.
    pub fn from_config(config: &SecureMessageConfig) -> Result<Self> {
        match &config.secret_keys_file {
            Some(path) => Self::from_file(path),
            None => Self::parse(&config.secret_keys),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Key for endpoint `name`.
    pub fn select(&self, name: &str) -> Result<Zeroizing<Vec<u8>>> {
        if self.entries.is_empty() {
            return Err(Error::SharedKeyNotFound {
                name: name.to_string(),
                reason: "no keys configured".into(),
            });
        }
        self.entries
            .iter()
            .find(|(entry, _)| covers(entry, name))
            .map(|(_, key)| key.clone())
            .ok_or_else(|| Error::SharedKeyNotFound {
                name: name.to_string(),
                reason: "no matching key entry".into(),
            })
    }
}

fn covers(entry: &str, name: &str) -> bool {
    match name.strip_prefix(entry) {
        Some("") => true,
        Some(rest) => rest.starts_with('.'),
        None => false,
    }
}

impl fmt::Debug for StaticKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.entries.iter().map(|(n, _)| n.as_str()).collect();
        f.debug_struct("StaticKeys").field("names", &names).finish()
    }
}
