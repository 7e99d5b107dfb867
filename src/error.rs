// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Error types for the Sieppari proxy

use thiserror::Error;

/// Result type alias for Sieppari operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the Sieppari proxy
#[derive(Error, Debug)]
pub enum Error {
    /// Outbound HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Upstream host could not be reached
    #[error("Upstream unreachable: {0}")]
    Upstream(String),

    /// Client request could not be parsed
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// Decision outside the allowed kinds, or an invalid modification
    #[error("Invalid decision: {0}")]
    InvalidDecision(String),

    /// Decision or claim on a flow that is not pending
    #[error("Unknown flow: {0}")]
    UnknownFlow(String),

    /// HTML rewrite or injection bookkeeping failed
    #[error("Injection failed: {0}")]
    Injection(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a new upstream error
    pub fn upstream<S: Into<String>>(msg: S) -> Self {
        Error::Upstream(msg.into())
    }

    /// Create a new malformed-request error
    pub fn malformed<S: Into<String>>(msg: S) -> Self {
        Error::MalformedRequest(msg.into())
    }

    /// Create a new invalid-decision error
    pub fn invalid_decision<S: Into<String>>(msg: S) -> Self {
        Error::InvalidDecision(msg.into())
    }

    /// Create a new injection error
    pub fn injection<S: Into<String>>(msg: S) -> Self {
        Error::Injection(msg.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is an upstream failure
    pub fn is_upstream(&self) -> bool {
        matches!(self, Error::Upstream(_) | Error::Http(_))
    }

    /// Check if this is an unknown-flow error
    pub fn is_unknown_flow(&self) -> bool {
        matches!(self, Error::UnknownFlow(_))
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}
