//! The protocol engine.
//!
//! Per `(source, destination)` pair, state lives in the [`KeyStore`]:
//!
//! ```text
//! NO_KEY ──(KDS round trip)──→ HAS_TICKET ──(expiration)──→ NO_KEY
//! ```
//!
//! encode: ticket → metadata → [encrypt] → sign
//! decode: parse → resolve unwrap key → unwrap esek + freshness → derive SEK
//!         → verify signature → cache SEK → [decrypt]

use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use tessera_crypto::CryptoManager;
use tessera_keystore::{
    from_unix_seconds, to_unix_seconds, Clock, GroupKey, KeyStore, SessionKeys, Ticket,
};
use zeroize::Zeroizing;

use crate::config::SecureMessageConfig;
use crate::envelope::{derive_session_keys, signed_bytes, EsekPayload, Metadata, SealedMessage};
use crate::error::{Error, Result};
use crate::kds::{GroupKeyBody, KdsClient, KdsRequest, ReplyMetadata, RequestMetadata, TicketBody};
use crate::keys::StaticKeys;
use crate::nonce::NonceGenerator;

/// Namespace prefix of an endpoint or destination name: the part before
/// the first `.`, or the whole name.
pub fn group_prefix(name: &str) -> &str {
    name.split_once('.').map_or(name, |(prefix, _)| prefix)
}

/// One local endpoint identity speaking the envelope protocol.
pub struct SecureMessage {
    name: String,
    group: String,
    key: Zeroizing<Vec<u8>>,
    encrypt: bool,
    crypto: CryptoManager,
    store: Arc<KeyStore>,
    kds: KdsClient,
    nonces: &'static NonceGenerator,
}

impl SecureMessage {
    /// Endpoint `"{topic}.{host}"`, static key from the configured key source.
    pub fn new(
        topic: &str,
        host: &str,
        config: &SecureMessageConfig,
        store: Arc<KeyStore>,
    ) -> Result<Self> {
        if topic.is_empty() || host.is_empty() {
            return Err(Error::InvalidArgument("topic and host must be non-empty".into()));
        }
        Self::with_name(format!("{}.{}", topic, host), config, store)
    }

    /// Endpoint with a fully formed name.
    pub fn with_name(
        name: impl Into<String>,
        config: &SecureMessageConfig,
        store: Arc<KeyStore>,
    ) -> Result<Self> {
        let name = name.into();
        let key = StaticKeys::from_config(config)?.select(&name)?;
        Self::with_key(name, key, config, store)
    }

    /// Endpoint with an explicitly supplied static key.
    pub fn with_key(
        name: impl Into<String>,
        key: Zeroizing<Vec<u8>>,
        config: &SecureMessageConfig,
        store: Arc<KeyStore>,
    ) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::InvalidArgument("endpoint name must be non-empty".into()));
        }
        let crypto = CryptoManager::from_names(&config.cipher, &config.hash)
            .map_err(|e| Error::InvalidArgument(e.to_string()))?;
        if key.len() != crypto.key_size() {
            return Err(Error::InvalidArgument(format!(
                "static key for {} is {} bytes, {} requires {}",
                name,
                key.len(),
                crypto.suite(),
                crypto.key_size()
            )));
        }
        let group = match &config.group {
            Some(g) if !g.is_empty() => g.clone(),
            _ => group_prefix(&name).to_string(),
        };
        let kds = KdsClient::new(
            config.kds_endpoint.clone(),
            config.kds_timeout(),
            config.kds_max_redirects,
        )?;

        tracing::debug!(%name, %group, encrypt = config.encrypt, "secure message endpoint ready");
        Ok(Self {
            name,
            group,
            key,
            encrypt: config.encrypt,
            crypto,
            store,
            kds,
            nonces: NonceGenerator::global()?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn encrypts(&self) -> bool {
        self.encrypt
    }

    pub fn crypto(&self) -> &CryptoManager {
        &self.crypto
    }

    pub fn store(&self) -> &Arc<KeyStore> {
        &self.store
    }

    fn now(&self) -> DateTime<Utc> {
        self.store.clock().now()
    }

    // -----------------------------------------------------------------------
    // Encode
    // -----------------------------------------------------------------------

    /// Produce an authenticated, optionally encrypted envelope for `target`.
    pub async fn encode(&self, version: &str, target: &str, payload: &[u8]) -> Result<SealedMessage> {
        let ticket = self.get_ticket(target).await?;

        let metadata = Metadata {
            source: self.name.clone(),
            destination: ticket.destination.clone(),
            timestamp: to_unix_seconds(self.now()),
            nonce: self.nonces.next(),
            esek: ticket.esek.clone(),
            encryption: self.encrypt,
        }
        .to_json()?;

        let body = if self.encrypt {
            self.crypto
                .encrypt(&ticket.ekey, payload)
                .map_err(|e| Error::InvalidArgument(format!("payload encryption: {}", e)))?
        } else {
            payload.to_vec()
        };

        let signature = self
            .crypto
            .sign(&ticket.skey, &signed_bytes(version, &metadata, &body))
            .map_err(|e| Error::InvalidArgument(format!("signing: {}", e)))?;

        Ok(SealedMessage { metadata, body, signature })
    }

    /// Cached ticket for `target`, or a fresh one from the KDS.
    async fn get_ticket(&self, target: &str) -> Result<Ticket> {
        if let Some(ticket) = self.store.get_ticket(&self.name, target) {
            tracing::debug!(src = %self.name, dst = %target, "ticket cache hit");
            return Ok(ticket);
        }
        tracing::debug!(src = %self.name, dst = %target, "ticket cache miss, asking KDS");

        let request = self.signed_request(target)?;
        let reply = self.kds.get_ticket(&request).await?;
        let (md, expiration) =
            self.verify_reply(target, &reply.metadata, &reply.ticket, &reply.signature)?;
        let body: TicketBody = self.unwrap_reply(target, &reply.ticket)?;

        let ticket = Ticket {
            destination: md.destination,
            skey: self.reply_key(target, "skey", &body.skey)?,
            ekey: self.reply_key(target, "ekey", &body.ekey)?,
            esek: body.esek,
        };
        self.store.put_ticket(&self.name, target, ticket.clone(), expiration);
        Ok(ticket)
    }

    /// Cached group key, or a fresh one from the KDS.
    async fn get_group_key(&self, group: &str) -> Result<GroupKey> {
        if let Some(key) = self.store.get_group_key(&self.name, group) {
            tracing::debug!(src = %self.name, %group, "group key cache hit");
            return Ok(key);
        }
        tracing::debug!(src = %self.name, %group, "group key cache miss, asking KDS");

        let request = self.signed_request(group)?;
        let reply = self.kds.get_group_key(&request).await?;
        let (_, expiration) =
            self.verify_reply(group, &reply.metadata, &reply.group_key, &reply.signature)?;
        let body: GroupKeyBody = self.unwrap_reply(group, &reply.group_key)?;

        let key = GroupKey {
            generation: body.generation,
            key: self.reply_key(group, "key", &body.key)?,
        };
        self.store.put_group_key(&self.name, group, key.clone(), expiration);
        Ok(key)
    }

    // -----------------------------------------------------------------------
    // KDS request / reply handling
    // -----------------------------------------------------------------------

    fn signed_request(&self, target: &str) -> Result<KdsRequest> {
        let md = RequestMetadata {
            requestor: self.name.clone(),
            target: target.to_string(),
            timestamp: to_unix_seconds(self.now()),
            nonce: self.nonces.next(),
        };
        let json = serde_json::to_vec(&md)
            .map_err(|e| Error::InvalidArgument(format!("request serialization: {}", e)))?;
        let metadata = BASE64.encode(json);
        let signature = self
            .crypto
            .sign(&self.key, metadata.as_bytes())
            .map_err(|e| Error::InvalidArgument(format!("signing: {}", e)))?;
        Ok(KdsRequest { metadata, signature: BASE64.encode(signature) })
    }

    /// Check the reply signature and that it answers our request.
    fn verify_reply(
        &self,
        target: &str,
        metadata: &str,
        sealed: &str,
        signature: &str,
    ) -> Result<(ReplyMetadata, DateTime<Utc>)> {
        let bad = |reason: &str| {
            tracing::warn!(src = %self.name, dst = %target, reason, "rejected KDS reply");
            Error::kds_reply(&self.name, target, reason)
        };

        let signature = BASE64.decode(signature).map_err(|_| bad("signature is not base64"))?;
        let mut signed = Vec::with_capacity(metadata.len() + sealed.len());
        signed.extend_from_slice(metadata.as_bytes());
        signed.extend_from_slice(sealed.as_bytes());
        let valid = self
            .crypto
            .verify(&self.key, &signed, &signature)
            .map_err(|_| bad("signature check failed"))?;
        if !valid {
            return Err(bad("signature mismatch"));
        }

        let raw = BASE64.decode(metadata).map_err(|_| bad("metadata is not base64"))?;
        let md: ReplyMetadata =
            serde_json::from_slice(&raw).map_err(|_| bad("metadata is not valid JSON"))?;

        if md.source != self.name {
            return Err(bad("source does not match requestor"));
        }
        let qualified = md
            .destination
            .strip_prefix(target)
            .map_or(false, |rest| rest.is_empty() || rest.starts_with('.'));
        if !qualified {
            return Err(bad("destination does not match target"));
        }
        let expiration = from_unix_seconds(md.expiration).ok_or_else(|| bad("bad expiration"))?;
        if expiration <= self.now() {
            return Err(bad("already expired"));
        }
        Ok((md, expiration))
    }

    /// Decrypt a reply body sealed under our static key.
    fn unwrap_reply<T: DeserializeOwned>(&self, target: &str, sealed: &str) -> Result<T> {
        let bad = |reason: &str| Error::kds_reply(&self.name, target, reason);
        let raw = BASE64.decode(sealed).map_err(|_| bad("body is not base64"))?;
        let plain = Zeroizing::new(
            self.crypto
                .decrypt(&self.key, &raw)
                .map_err(|_| bad("body does not decrypt"))?,
        );
        serde_json::from_slice(&plain).map_err(|_| bad("body is not valid JSON"))
    }

    fn reply_key(&self, target: &str, field: &str, encoded: &str) -> Result<Zeroizing<Vec<u8>>> {
        let key = Zeroizing::new(BASE64.decode(encoded).map_err(|_| {
            Error::kds_reply(&self.name, target, format!("{} is not base64", field))
        })?);
        if key.len() != self.crypto.key_size() {
            return Err(Error::kds_reply(
                &self.name,
                target,
                format!("{} is {} bytes, expected {}", field, key.len(), self.crypto.key_size()),
            ));
        }
        Ok(key)
    }

    // -----------------------------------------------------------------------
    // Decode
    // -----------------------------------------------------------------------

    /// Verify and, if flagged, decrypt an inbound envelope.
    pub async fn decode(
        &self,
        version: &str,
        metadata: &str,
        body: &[u8],
        signature: &[u8],
    ) -> Result<(Metadata, Vec<u8>)> {
        let md = Metadata::parse(metadata)?;

        let unwrap_key = if md.destination == self.name {
            self.key.clone()
        } else if group_prefix(&md.destination) == self.group {
            self.get_group_key(&self.group).await?.key
        } else {
            tracing::warn!(dst = %md.destination, name = %self.name, "envelope not addressed to us");
            return Err(Error::UnknownDestinationName(md.destination));
        };

        let (sek, expiration) = self.decode_esek(&unwrap_key, &md)?;

        let valid = self
            .crypto
            .verify(&sek.skey, &signed_bytes(version, metadata, body), signature)
            .unwrap_or(false);
        if !valid {
            tracing::warn!(src = %md.source, dst = %md.destination, "envelope signature mismatch");
            return Err(Error::InvalidSignature { src: md.source, dst: md.destination });
        }
        // Only authenticated (source, destination) pairs reach the cache.
        if let Some(expiration) = expiration {
            self.store.put_sek(&md.source, &md.destination, sek.clone(), expiration);
        }

        let plaintext = if md.encryption {
            self.crypto
                .decrypt(&sek.ekey, body)
                .map_err(|_| Error::InvalidMetadata("encrypted payload does not decrypt".into()))?
        } else {
            body.to_vec()
        };

        Ok((md, plaintext))
    }

    /// Convenience for [`decode`](Self::decode) on a [`SealedMessage`].
    pub async fn decode_sealed(&self, version: &str, msg: &SealedMessage) -> Result<(Metadata, Vec<u8>)> {
        self.decode(version, &msg.metadata, &msg.body, &msg.signature).await
    }

    /// Unwrap the esek, enforce its freshness window and derive the SEK.
    /// Returns the keys with the end of their validity window.
    fn decode_esek(
        &self,
        key: &[u8],
        md: &Metadata,
    ) -> Result<(SessionKeys, Option<DateTime<Utc>>)> {
        let invalid = || Error::InvalidEncryptedTicket {
            src: md.source.clone(),
            dst: md.destination.clone(),
        };

        let raw = BASE64.decode(&md.esek).map_err(|_| invalid())?;
        let plain = Zeroizing::new(self.crypto.decrypt(key, &raw).map_err(|_| invalid())?);
        let esek: EsekPayload = serde_json::from_slice(&plain).map_err(|_| invalid())?;
        let wrapped = esek.key_bytes().ok_or_else(invalid)?;
        let (start, end) = esek.window().ok_or_else(invalid)?;

        let now = to_unix_seconds(self.now());
        if md.timestamp < start || md.timestamp > end || now < start || now > end {
            tracing::warn!(src = %md.source, dst = %md.destination, start, end, sent = md.timestamp, now, "esek outside its validity window");
            return Err(Error::InvalidExpiredTicket {
                src: md.source.clone(),
                dst: md.destination.clone(),
            });
        }

        let (skey, ekey) =
            derive_session_keys(&self.crypto, &wrapped, &md.source, &md.destination, esek.timestamp)
                .map_err(|_| invalid())?;
        Ok((SessionKeys { skey, ekey }, from_unix_seconds(end)))
    }
}

impl fmt::Debug for SecureMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureMessage")
            .field("name", &self.name)
            .field("group", &self.group)
            .field("encrypt", &self.encrypt)
            .field("crypto", &self.crypto)
            .field("kds", &self.kds.endpoint())
            .finish_non_exhaustive()
    }
}
