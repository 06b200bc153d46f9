//! In-process KDS for end-to-end tests.
//!
//! Issues tickets and group keys the way a real KDS would, on the same
//! `ManualClock` as the endpoints under test, with switchable misbehavior.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{header::LOCATION, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::Value;

use tessera::envelope::derive_session_keys;
use tessera::kds::{
    GroupKeyBody, GroupKeyReply, KdsRequest, ReplyMetadata, RequestMetadata, TicketBody,
    TicketReply,
};
use tessera::{
    generate_key, group_prefix, Clock, CryptoManager, EsekPayload, KeyStore, ManualClock,
    SecureMessage, SecureMessageConfig, StaticKeys,
};
use tessera_keystore::to_unix_seconds;

pub const VERSION: &str = "1.0";

pub const SCHEDULER_H1: [u8; 32] = [0x11; 32];
pub const SCHEDULER_H2: [u8; 32] = [0x12; 32];
pub const COMPUTE: [u8; 32] = [0x21; 32];
pub const NETWORK_H5: [u8; 32] = [0x31; 32];
pub const COMPUTE_GROUP: [u8; 32] = [0x77; 32];
pub const COMPUTE_GENERATION: u64 = 7;

/// `name:base64` lines shared by the KDS and the endpoints.
pub fn key_lines() -> Vec<String> {
    [
        ("scheduler.h1", &SCHEDULER_H1),
        ("scheduler.h2", &SCHEDULER_H2),
        ("compute", &COMPUTE),
        ("network.h5", &NETWORK_H5),
    ]
    .iter()
    .map(|(name, key)| format!("{}:{}", name, BASE64.encode(key)))
    .collect()
}

#[derive(Clone, Debug)]
pub enum Behavior {
    Normal,
    /// Reply with `"{target}.{suffix}"` as the ticket destination.
    Qualify(String),
    ForgeSignature,
    WrongSource,
    WrongDestination,
    ExpiredReply,
    Status(StatusCode),
    Garbage,
    Empty,
    /// Answer the next `count` requests with a redirect back to the same path.
    Redirect { status: StatusCode, count: usize },
    Stall(Duration),
}

enum Action {
    Serve,
    Redirect(StatusCode),
    Status(StatusCode),
    Garbage,
    Empty,
    Stall(Duration),
}

#[derive(Clone, Copy)]
enum Kind {
    Ticket,
    GroupKey,
}

impl Kind {
    fn path(self) -> &'static str {
        match self {
            Kind::Ticket => tessera::kds::TICKET_PATH,
            Kind::GroupKey => tessera::kds::GROUP_KEY_PATH,
        }
    }
}

pub struct MockKds {
    crypto: CryptoManager,
    clock: Arc<ManualClock>,
    keys: StaticKeys,
    group_keys: HashMap<String, (u64, Vec<u8>)>,
    ticket_ttl: f64,
    esek_ttl: f64,
    behavior: Mutex<Behavior>,
    requests: AtomicUsize,
    issued: AtomicUsize,
}

impl MockKds {
    pub fn new(clock: Arc<ManualClock>) -> Self {
        let mut group_keys = HashMap::new();
        group_keys.insert("compute".to_string(), (COMPUTE_GENERATION, COMPUTE_GROUP.to_vec()));
        Self {
            crypto: CryptoManager::default(),
            clock,
            keys: StaticKeys::parse(key_lines()).unwrap(),
            group_keys,
            ticket_ttl: 3600.0,
            esek_ttl: 3600.0,
            behavior: Mutex::new(Behavior::Normal),
            requests: AtomicUsize::new(0),
            issued: AtomicUsize::new(0),
        }
    }

    pub fn with_crypto(mut self, crypto: CryptoManager) -> Self {
        self.crypto = crypto;
        self
    }

    pub fn with_esek_ttl(mut self, ttl: f64) -> Self {
        self.esek_ttl = ttl;
        self
    }

    pub fn set_behavior(&self, behavior: Behavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    /// HTTP requests received, redirects included.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Tickets and group keys actually issued.
    pub fn issued(&self) -> usize {
        self.issued.load(Ordering::SeqCst)
    }

    /// Serve on an ephemeral localhost port, returning the base URL.
    pub async fn spawn(self) -> (Arc<MockKds>, String) {
        let state = Arc::new(self);
        let app = Router::new()
            .route(tessera::kds::TICKET_PATH, post(ticket))
            .route(tessera::kds::GROUP_KEY_PATH, post(group_key))
            .with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (state, format!("http://{}", addr))
    }

    fn next_action(&self) -> Action {
        let mut behavior = self.behavior.lock().unwrap();
        match &mut *behavior {
            Behavior::Redirect { status, count } if *count > 0 => {
                *count -= 1;
                Action::Redirect(*status)
            }
            Behavior::Status(s) => Action::Status(*s),
            Behavior::Garbage => Action::Garbage,
            Behavior::Empty => Action::Empty,
            Behavior::Stall(d) => Action::Stall(*d),
            _ => Action::Serve,
        }
    }

    async fn handle(&self, kind: Kind, body: String) -> Response {
        self.requests.fetch_add(1, Ordering::SeqCst);
        match self.next_action() {
            Action::Serve => {}
            Action::Redirect(status) => return (status, [(LOCATION, kind.path())]).into_response(),
            Action::Status(status) => return (status, "kds failure").into_response(),
            Action::Garbage => return (StatusCode::OK, "this is not json").into_response(),
            Action::Empty => return StatusCode::OK.into_response(),
            Action::Stall(d) => tokio::time::sleep(d).await,
        }
        match self.issue(kind, &body) {
            Ok(reply) => (StatusCode::OK, Json(reply)).into_response(),
            Err(status) => status.into_response(),
        }
    }

    fn wrap_key_for(&self, destination: &str) -> Result<Vec<u8>, StatusCode> {
        if let Some((_, key)) = self.group_keys.get(destination) {
            return Ok(key.clone());
        }
        self.keys
            .select(destination)
            .map(|k| k.to_vec())
            .map_err(|_| StatusCode::NOT_FOUND)
    }

    fn issue(&self, kind: Kind, body: &str) -> Result<Value, StatusCode> {
        let envelope: Value = serde_json::from_str(body).map_err(|_| StatusCode::BAD_REQUEST)?;
        let request: KdsRequest = serde_json::from_value(envelope["request"].clone())
            .map_err(|_| StatusCode::BAD_REQUEST)?;
        let raw = BASE64.decode(&request.metadata).map_err(|_| StatusCode::BAD_REQUEST)?;
        let md: RequestMetadata = serde_json::from_slice(&raw).map_err(|_| StatusCode::BAD_REQUEST)?;

        let requestor_key = self.keys.select(&md.requestor).map_err(|_| StatusCode::FORBIDDEN)?;
        let signature = BASE64.decode(&request.signature).map_err(|_| StatusCode::BAD_REQUEST)?;
        if !self
            .crypto
            .verify(&requestor_key, request.metadata.as_bytes(), &signature)
            .unwrap_or(false)
        {
            return Err(StatusCode::FORBIDDEN);
        }

        let behavior = self.behavior.lock().unwrap().clone();
        let now = to_unix_seconds(self.clock.now());
        let mut destination = md.target.clone();
        if let Behavior::Qualify(suffix) = &behavior {
            destination = format!("{}.{}", md.target, suffix);
        }

        let plain = match kind {
            Kind::Ticket => {
                let wrap_key = self.wrap_key_for(&destination)?;
                let key = generate_key(self.crypto.key_size()).unwrap();
                let esek = EsekPayload::new(&key, now, self.esek_ttl)
                    .seal(&self.crypto, &wrap_key)
                    .unwrap();
                let (skey, ekey) =
                    derive_session_keys(&self.crypto, &key, &md.requestor, &destination, now)
                        .unwrap();
                serde_json::to_vec(&TicketBody {
                    skey: BASE64.encode(&*skey),
                    ekey: BASE64.encode(&*ekey),
                    esek,
                })
                .unwrap()
            }
            Kind::GroupKey => {
                if group_prefix(&md.requestor) != md.target {
                    return Err(StatusCode::FORBIDDEN);
                }
                let (generation, key) =
                    self.group_keys.get(&md.target).ok_or(StatusCode::NOT_FOUND)?;
                serde_json::to_vec(&GroupKeyBody { key: BASE64.encode(key), generation: *generation })
                    .unwrap()
            }
        };
        let sealed = BASE64.encode(self.crypto.encrypt(&requestor_key, &plain).unwrap());

        let reply_md = ReplyMetadata {
            source: match behavior {
                Behavior::WrongSource => "intruder.h9".to_string(),
                _ => md.requestor.clone(),
            },
            destination: match behavior {
                Behavior::WrongDestination => "elsewhere.h9".to_string(),
                _ => destination,
            },
            expiration: match behavior {
                Behavior::ExpiredReply => now - 1.0,
                _ => now + self.ticket_ttl,
            },
        };
        let metadata = BASE64.encode(serde_json::to_vec(&reply_md).unwrap());

        let sign_key = match behavior {
            Behavior::ForgeSignature => vec![0x5A; 32],
            _ => requestor_key.to_vec(),
        };
        let mut signed = metadata.clone().into_bytes();
        signed.extend_from_slice(sealed.as_bytes());
        let signature = BASE64.encode(self.crypto.sign(&sign_key, &signed).unwrap());

        self.issued.fetch_add(1, Ordering::SeqCst);
        let reply = match kind {
            Kind::Ticket => serde_json::to_value(TicketReply { metadata, ticket: sealed, signature }),
            Kind::GroupKey => {
                serde_json::to_value(GroupKeyReply { metadata, group_key: sealed, signature })
            }
        }
        .unwrap();
        Ok(serde_json::json!({ "reply": reply }))
    }
}

async fn ticket(State(kds): State<Arc<MockKds>>, body: String) -> Response {
    kds.handle(Kind::Ticket, body).await
}

async fn group_key(State(kds): State<Arc<MockKds>>, body: String) -> Response {
    kds.handle(Kind::GroupKey, body).await
}

// ---------------------------------------------------------------------------
// Endpoint fixtures
// ---------------------------------------------------------------------------

pub struct Harness {
    pub kds: Arc<MockKds>,
    pub url: String,
    pub clock: Arc<ManualClock>,
    pub store: Arc<KeyStore>,
}

impl Harness {
    pub async fn start() -> Self {
        Self::start_with(|kds| kds).await
    }

    pub async fn start_with(configure: impl FnOnce(MockKds) -> MockKds) -> Self {
        let clock = Arc::new(ManualClock::starting_now());
        let (kds, url) = configure(MockKds::new(clock.clone())).spawn().await;
        let store = Arc::new(KeyStore::with_clock(clock.clone()));
        Self { kds, url, clock, store }
    }

    pub fn config(&self, encrypt: bool) -> SecureMessageConfig {
        SecureMessageConfig {
            encrypt,
            secret_keys: key_lines(),
            kds_endpoint: Some(self.url.clone()),
            kds_timeout_secs: 5,
            ..SecureMessageConfig::default()
        }
    }

    pub fn endpoint(&self, topic: &str, host: &str, encrypt: bool) -> SecureMessage {
        SecureMessage::new(topic, host, &self.config(encrypt), self.store.clone()).unwrap()
    }

    pub fn endpoint_with(&self, topic: &str, host: &str, config: &SecureMessageConfig) -> SecureMessage {
        SecureMessage::new(topic, host, config, self.store.clone()).unwrap()
    }

    pub fn advance_secs(&self, secs: i64) {
        self.clock.advance(chrono::Duration::seconds(secs));
    }
}
