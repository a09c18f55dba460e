// ABOUTME: The authorization gate: evaluates one request's headers against the credential.
// ABOUTME: Returns an explicit Allow/Deny decision so callers choose how to continue or respond.

use std::sync::Arc;

use http::{HeaderMap, StatusCode};

use crate::credential::Credential;

/// Outcome of evaluating a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Pass the request, unchanged, to the next stage.
    Allow,
    /// Terminate the request with this status and an empty body.
    Deny(StatusCode),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Stateless per-request gate around a shared, immutable credential.
#[derive(Debug, Clone)]
pub struct Gate {
    credential: Arc<Credential>,
}

impl Gate {
    pub fn new(credential: Credential) -> Self {
        Self {
            credential: Arc::new(credential),
        }
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Decide whether a request carrying `headers` may proceed.
    ///
    /// The credential header must appear exactly once and its value must
    /// equal the secret byte for byte. A missing header, an empty value, a
    /// repeated header, or any other value yields `Deny(401)`.
    pub fn check(&self, headers: &HeaderMap) -> Decision {
        let mut values = headers.get_all(self.credential.header()).iter();

        let presented = match (values.next(), values.next()) {
            (Some(value), None) => value,
            _ => return Decision::Deny(StatusCode::UNAUTHORIZED),
        };

        if self.credential.matches(presented.as_bytes()) {
            Decision::Allow
        } else {
            Decision::Deny(StatusCode::UNAUTHORIZED)
        }
    }
}
