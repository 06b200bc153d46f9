//! Configuration for a [`SecureMessage`](crate::SecureMessage) endpoint.
//!
//! Environment variables (read by [`SecureMessageConfig::from_env`]):
//!   TESSERA_ENCRYPT             - "true" to encrypt payloads (default: false)
//!   TESSERA_CIPHER              - AEAD name (default: AES-256-GCM)
//!   TESSERA_HASH                - HMAC/HKDF hash name (default: SHA256)
//!   TESSERA_SECRET_KEYS         - Comma-separated `name:base64key` entries
//!   TESSERA_SECRET_KEYS_FILE    - File of `name:base64key` lines (wins over inline keys)
//!   TESSERA_KDS_ENDPOINT        - KDS base URL, e.g. https://kds.internal:9109/v1
//!   TESSERA_KDS_TIMEOUT_SECS    - Per-request KDS timeout (default: 30)
//!   TESSERA_KDS_MAX_REDIRECTS   - Redirects followed per KDS request (default: 10)
//!   TESSERA_GROUP               - Group name override (default: endpoint namespace)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_KDS_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_KDS_MAX_REDIRECTS: usize = 10;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecureMessageConfig {
    pub encrypt: bool,
    pub cipher: String,
    pub hash: String,
    pub secret_keys: Vec<String>,
    pub secret_keys_file: Option<PathBuf>,
    pub kds_endpoint: Option<String>,
    pub kds_timeout_secs: u64,
    pub kds_max_redirects: usize,
    pub group: Option<String>,
}

impl Default for SecureMessageConfig {
    fn default() -> Self {
        Self {
            encrypt: false,
            cipher: "AES-256-GCM".into(),
            hash: "SHA256".into(),
            secret_keys: Vec::new(),
            secret_keys_file: None,
            kds_endpoint: None,
            kds_timeout_secs: DEFAULT_KDS_TIMEOUT_SECS,
            kds_max_redirects: DEFAULT_KDS_MAX_REDIRECTS,
            group: None,
        }
    }
}

impl SecureMessageConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Unset variables keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut cfg = Self::default();

        if let Some(v) = lookup("TESSERA_ENCRYPT") {
            cfg.encrypt = parse_bool("TESSERA_ENCRYPT", &v)?;
        }
        if let Some(v) = lookup("TESSERA_CIPHER") {
            cfg.cipher = v;
        }
        if let Some(v) = lookup("TESSERA_HASH") {
            cfg.hash = v;
        }
        if let Some(v) = lookup("TESSERA_SECRET_KEYS") {
            cfg.secret_keys = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = lookup("TESSERA_SECRET_KEYS_FILE") {
            cfg.secret_keys_file = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("TESSERA_KDS_ENDPOINT") {
            cfg.kds_endpoint = Some(v);
        }
        if let Some(v) = lookup("TESSERA_KDS_TIMEOUT_SECS") {
            cfg.kds_timeout_secs = parse_number("TESSERA_KDS_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("TESSERA_KDS_MAX_REDIRECTS") {
            cfg.kds_max_redirects = parse_number("TESSERA_KDS_MAX_REDIRECTS", &v)?;
        }
        if let Some(v) = lookup("TESSERA_GROUP") {
            cfg.group = Some(v);
        }

        Ok(cfg)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| Error::InvalidArgument(format!("read {}: {}", path.display(), e)))?;
        serde_json::from_str(&data)
            .map_err(|e| Error::InvalidArgument(format!("parse {}: {}", path.display(), e)))
    }

    pub fn kds_timeout(&self) -> Duration {
        Duration::from_secs(self.kds_timeout_secs)
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::InvalidArgument(format!("{}: not a boolean: {}", name, value))),
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::InvalidArgument(format!("{}: not a number: {}", name, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let cfg = SecureMessageConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg, SecureMessageConfig::default());
        assert_eq!(cfg.kds_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn reads_all_variables() {
        let cfg = SecureMessageConfig::from_lookup(lookup(&[
            ("TESSERA_ENCRYPT", "yes"),
            ("TESSERA_CIPHER", "CHACHA20-POLY1305"),
            ("TESSERA_HASH", "SHA512"),
            ("TESSERA_SECRET_KEYS", "compute:AAAA, scheduler:BBBB,"),
            ("TESSERA_KDS_ENDPOINT", "http://kds:9109/v1"),
            ("TESSERA_KDS_TIMEOUT_SECS", "5"),
            ("TESSERA_KDS_MAX_REDIRECTS", "3"),
            ("TESSERA_GROUP", "workers"),
        ]))
        .unwrap();
        assert!(cfg.encrypt);
        assert_eq!(cfg.cipher, "CHACHA20-POLY1305");
        assert_eq!(cfg.hash, "SHA512");
        assert_eq!(cfg.secret_keys, vec!["compute:AAAA", "scheduler:BBBB"]);
        assert_eq!(cfg.kds_endpoint.as_deref(), Some("http://kds:9109/v1"));
        assert_eq!(cfg.kds_timeout_secs, 5);
        assert_eq!(cfg.kds_max_redirects, 3);
        assert_eq!(cfg.group.as_deref(), Some("workers"));
    }

    #[test]
    fn bad_values_are_invalid_argument() {
        assert!(matches!(
            SecureMessageConfig::from_lookup(lookup(&[("TESSERA_ENCRYPT", "maybe")])),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            SecureMessageConfig::from_lookup(lookup(&[("TESSERA_KDS_TIMEOUT_SECS", "-1")])),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn json_file_fills_missing_fields_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"encrypt": true, "kds_endpoint": "http://kds"}}"#).unwrap();
        let cfg = SecureMessageConfig::from_json_file(file.path()).unwrap();
        assert!(cfg.encrypt);
        assert_eq!(cfg.kds_endpoint.as_deref(), Some("http://kds"));
        assert_eq!(cfg.cipher, "AES-256-GCM");
        assert_eq!(cfg.kds_max_redirects, DEFAULT_KDS_MAX_REDIRECTS);
    }
}
