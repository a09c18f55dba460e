// ABOUTME: Core authorization types for keygate: the pre-shared credential and the gate decision.
// ABOUTME: Pure, synchronous logic with no HTTP server dependencies so it can be tested in isolation.

pub mod credential;
pub mod gate;

pub use credential::{Credential, CredentialError, DEFAULT_HEADER};
pub use gate::{Decision, Gate};
