//! Error types for the cache node.
//!
//! One enum covers the store, the wire protocol and the client. Error text
//! is part of the wire contract: servers send `Display` output in error
//! frames and clients map it back with [`Error::from_response_text`], so
//! the redirect message in particular must stay byte-for-byte stable.

use thiserror::Error;

/// Prefix of the redirect error text; the suffix is the owner address.
const REDIRECT_PREFIX: &str = "redirect to node ";

#[derive(Error, Debug)]
pub enum Error {
    /// The set would breach the per-segment budget.
    #[error("the entry size will exceed if you set this entry")]
    CapacityExceeded,

    /// Get miss.
    #[error("not found")]
    NotFound,

    /// The command arrived with fewer arguments than its layout requires.
    #[error("command needs more arguments")]
    NeedsMoreArguments,

    /// The key belongs to another node; the payload is the owner address.
    #[error("redirect to node {0}")]
    Redirect(String),

    /// The client followed redirects past its retry bound.
    #[error("reached the max times of redirect")]
    ReachedMaxRedirects,

    /// The client has no reachable peer left to query membership from.
    #[error("no client is available")]
    NoClientAvailable,

    /// A configuration value the core cannot work with.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// An error string sent by a peer that matches no known kind.
    #[error("{0}")]
    Server(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Encode(#[from] bincode::Error),
}

impl Error {
    /// Maps the error text of a response frame back to a typed error.
    /// Unrecognized text is carried through as [`Error::Server`].
    pub fn from_response_text(text: &str) -> Error {
        if let Some(owner) = text.strip_prefix(REDIRECT_PREFIX) {
            return Error::Redirect(owner.to_string());
        }
        match text {
            "not found" => Error::NotFound,
            "command needs more arguments" => Error::NeedsMoreArguments,
            "the entry size will exceed if you set this entry" => Error::CapacityExceeded,
            other => Error::Server(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_text_round_trip() {
        let err = Error::Redirect("10.0.0.7:5837".to_string());
        let text = err.to_string();
        assert_eq!(text, "redirect to node 10.0.0.7:5837");

        match Error::from_response_text(&text) {
            Error::Redirect(owner) => assert_eq!(owner, "10.0.0.7:5837"),
            other => panic!("expected redirect, got {other:?}"),
        }
    }

    #[test]
    fn test_known_kinds_round_trip() {
        assert!(matches!(
            Error::from_response_text(&Error::NotFound.to_string()),
            Error::NotFound
        ));
        assert!(matches!(
            Error::from_response_text(&Error::NeedsMoreArguments.to_string()),
            Error::NeedsMoreArguments
        ));
        assert!(matches!(
            Error::from_response_text(&Error::CapacityExceeded.to_string()),
            Error::CapacityExceeded
        ));
    }

    #[test]
    fn test_unknown_text_becomes_server_error() {
        match Error::from_response_text("something else went wrong") {
            Error::Server(text) => assert_eq!(text, "something else went wrong"),
            other => panic!("expected server error, got {other:?}"),
        }
    }
}
