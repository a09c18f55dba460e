// ABOUTME: The pre-shared credential a request must present: a header name and its expected value.
// ABOUTME: Validates construction and performs the exact, timing-independent value comparison.

use std::fmt;

use http::HeaderName;
use thiserror::Error;

/// Header name used when none is configured.
pub const DEFAULT_HEADER: &str = "privateKey";

/// Errors that can occur while building a credential.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("invalid header name: {0:?}")]
    InvalidHeaderName(String),

    #[error("secret must not be empty")]
    EmptySecret,
}

/// A static header credential. The header name is stored in its canonical
/// lowercase form; lookups against a `HeaderMap` are case-insensitive.
#[derive(Clone)]
pub struct Credential {
    header: HeaderName,
    secret: String,
}

impl Credential {
    /// Build a credential for `header` carrying `secret`.
    pub fn new(header: &str, secret: impl Into<String>) -> Result<Self, CredentialError> {
        let header = HeaderName::from_bytes(header.as_bytes())
            .map_err(|_| CredentialError::InvalidHeaderName(header.to_string()))?;
        let secret = secret.into();
        if secret.is_empty() {
            return Err(CredentialError::EmptySecret);
        }
        Ok(Self { header, secret })
    }

    pub fn header(&self) -> &HeaderName {
        &self.header
    }

    /// Exact byte comparison of `presented` against the secret. No trimming,
    /// no case folding. Runs over every byte regardless of where they differ.
    pub fn matches(&self, presented: &[u8]) -> bool {
        let expected = self.secret.as_bytes();
        if presented.len() != expected.len() {
            return false;
        }
        presented
            .iter()
            .zip(expected)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

// Keep the secret out of logs and panic messages.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("header", &self.header)
            .field("secret", &"<redacted>")
            .finish()
    }
}
