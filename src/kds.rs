//! KDS client and wire types.
//!
//! Request (POST `<endpoint>/kds/ticket` or `<endpoint>/kds/group_key`):
//!   {"request": {"metadata": base64(json{requestor, target, timestamp, nonce}),
//!                "signature": base64(sign(static_key, metadata))}}
//!
//! Ticket reply:
//!   {"reply": {"metadata": base64(json{source, destination, expiration}),
//!              "ticket": base64(encrypt(static_key, json{skey, ekey, esek})),
//!              "signature": base64(sign(static_key, metadata || ticket))}}
//!
//! Group key reply: as above with `group_key` in place of `ticket`,
//! wrapping json{key, generation}.
//!
//! The client only moves bytes. Signing requests and validating replies
//! is done by the caller, which holds the static key.

use std::time::Duration;

use reqwest::header::LOCATION;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const TICKET_PATH: &str = "/kds/ticket";
pub const GROUP_KEY_PATH: &str = "/kds/group_key";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Signed request body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdsRequest {
    pub metadata: String,
    pub signature: String,
}

/// Decoded `KdsRequest::metadata`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestMetadata {
    pub requestor: String,
    pub target: String,
    pub timestamp: f64,
    pub nonce: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketReply {
    pub metadata: String,
    pub ticket: String,
    pub signature: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupKeyReply {
    pub metadata: String,
    pub group_key: String,
    pub signature: String,
}

/// Decoded reply metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplyMetadata {
    pub source: String,
    pub destination: String,
    pub expiration: f64,
}

/// Decrypted `TicketReply::ticket`.
#[derive(Clone, Serialize, Deserialize)]
pub struct TicketBody {
    pub skey: String,
    pub ekey: String,
    pub esek: String,
}

/// Decrypted `GroupKeyReply::group_key`.
#[derive(Clone, Serialize, Deserialize)]
pub struct GroupKeyBody {
    pub key: String,
    pub generation: u64,
}

#[derive(Serialize)]
struct RequestEnvelope<'a> {
    request: &'a KdsRequest,
}

#[derive(Deserialize)]
struct ReplyEnvelope<T> {
    reply: T,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Stateless request/reply client for the KDS.
#[derive(Clone, Debug)]
pub struct KdsClient {
    http: reqwest::Client,
    endpoint: Option<String>,
    max_redirects: usize,
}

impl KdsClient {
    /// `max_redirects` counts redirects followed, not requests sent.
    pub fn new(endpoint: Option<String>, timeout: Duration, max_redirects: usize) -> Result<Self> {
        // Redirects are followed by hand so a POST stays a POST on 301/302.
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("tessera/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::InvalidArgument(format!("KDS client: {}", e)))?;
        Ok(Self { http, endpoint, max_redirects })
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    pub async fn get_ticket(&self, request: &KdsRequest) -> Result<TicketReply> {
        self.call(TICKET_PATH, request).await
    }

    pub async fn get_group_key(&self, request: &KdsRequest) -> Result<GroupKeyReply> {
        self.call(GROUP_KEY_PATH, request).await
    }

    fn url_for(&self, path: &str) -> Result<Url> {
        let endpoint = self
            .endpoint
            .as_deref()
            .ok_or_else(|| Error::communication(path, "no KDS endpoint configured"))?;
        let joined = format!("{}{}", endpoint.trim_end_matches('/'), path);
        Url::parse(&joined).map_err(|e| Error::communication(joined.as_str(), e.to_string()))
    }

    async fn call<T: DeserializeOwned>(&self, path: &str, request: &KdsRequest) -> Result<T> {
        let mut url = self.url_for(path)?;
        let body = RequestEnvelope { request };

        for hop in 0..=self.max_redirects {
            tracing::debug!(url = %url, hop, "KDS request");
            let resp = self
                .http
                .post(url.clone())
                .json(&body)
                .send()
                .await
                .map_err(|e| transport_error(&url, e))?;

            let status = resp.status();
            if is_followed_redirect(status) {
                let location = resp
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| {
                        Error::communication(url.as_str(), format!("{} without Location", status))
                    })?;
                let next = url
                    .join(location)
                    .map_err(|e| Error::communication(url.as_str(), format!("bad Location: {}", e)))?;
                tracing::debug!(from = %url, to = %next, %status, "KDS redirect");
                url = next;
                continue;
            }

            let text = resp.text().await.map_err(|e| transport_error(&url, e))?;
            if !status.is_success() {
                tracing::warn!(url = %url, %status, "KDS request failed");
                return Err(Error::communication(
                    url.as_str(),
                    format!("request returned failure status: {} ({})", status, text),
                ));
            }
            if text.is_empty() {
                return Err(Error::communication(url.as_str(), "no reply data was returned"));
            }
            let reply: ReplyEnvelope<T> = serde_json::from_str(&text).map_err(|e| {
                Error::communication(url.as_str(), format!("failed to decode the reply: {}", e))
            })?;
            return Ok(reply.reply);
        }

        tracing::warn!(url = %url, max = self.max_redirects, "KDS redirect limit reached");
        Err(Error::communication(url.as_str(), "too many redirects"))
    }
}

fn is_followed_redirect(status: StatusCode) -> bool {
    matches!(status.as_u16(), 301 | 302 | 303 | 305 | 307 | 308)
}

fn transport_error(url: &Url, e: reqwest::Error) -> Error {
    let reason = if e.is_timeout() {
        format!("timed out: {}", e)
    } else if e.is_connect() {
        format!("unable to establish connection: {}", e)
    } else {
        e.to_string()
    };
    tracing::warn!(url = %url, %reason, "KDS transport error");
    Error::communication(url.as_str(), reason)
}
