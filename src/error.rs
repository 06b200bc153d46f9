//! Unified error type for the envelope protocol.
//!
//! Three kinds of failure, see [`ErrorKind`]:
//! - configuration errors make the instance unusable
//! - protocol errors fail one `encode`/`decode` call
//! - transport errors fail one KDS round trip

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Protocol,
    Transport,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("no shared key found for {name}: {reason}")]
    SharedKeyNotFound { name: String, reason: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("unknown destination name: {0}")]
    UnknownDestinationName(String),

    #[error("invalid encrypted ticket ({src} -> {dst})")]
    InvalidEncryptedTicket { src: String, dst: String },

    #[error("expired ticket ({src} -> {dst})")]
    InvalidExpiredTicket { src: String, dst: String },

    #[error("invalid signature ({src} -> {dst})")]
    InvalidSignature { src: String, dst: String },

    #[error("invalid KDS reply ({src} -> {dst}): {reason}")]
    InvalidKdsReply { src: String, dst: String, reason: String },

    #[error("communication with {url} failed: {reason}")]
    CommunicationError { url: String, reason: String },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::SharedKeyNotFound { .. } | Error::InvalidArgument(_) => ErrorKind::Configuration,
            Error::CommunicationError { .. } => ErrorKind::Transport,
            Error::InvalidMetadata(_)
            | Error::UnknownDestinationName(_)
            | Error::InvalidEncryptedTicket { .. }
            | Error::InvalidExpiredTicket { .. }
            | Error::InvalidSignature { .. }
            | Error::InvalidKdsReply { .. } => ErrorKind::Protocol,
        }
    }

    pub(crate) fn communication(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::CommunicationError { url: url.into(), reason: reason.into() }
    }

    pub(crate) fn kds_reply(src: &str, dst: &str, reason: impl Into<String>) -> Self {
        Error::InvalidKdsReply {
            src: src.to_string(),
            dst: dst.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
