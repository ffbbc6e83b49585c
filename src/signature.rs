//! Authorization tokens binding a caller identity to a PIN.
//!
//! A token is `hex(sha256("<identity>-<pin>"))`. Entities store the token minted
//! at creation; later transactions prove authorship by presenting the same
//! identity and PIN, which are hashed again and compared.

use crate::model::Pin;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<String> for AuthToken {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl fmt::Display for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Proof that a signature check passed during the current transaction.
///
/// Only [`verify`] can produce one, and it is neither `Clone` nor serializable,
/// so a state change that demands a `Verified` can only run after a fresh check.
#[derive(Debug)]
pub struct Verified {
    _private: (),
}

pub fn derive(caller_identity: &str, pin: &Pin) -> AuthToken {
    let mut hasher = Sha256::new();
    hasher.update(caller_identity.as_bytes());
    hasher.update(b"-");
    hasher.update(pin.expose().as_bytes());
    AuthToken(hex::encode(hasher.finalize()))
}

pub fn verify(stored: &AuthToken, caller_identity: &str, pin: &Pin) -> Option<Verified> {
    if stored.is_empty() {
        return None;
    }
    if derive(caller_identity, pin) == *stored {
        Some(Verified { _private: () })
    } else {
        tracing::debug!("Signature mismatch for caller {}", caller_identity);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pin(raw: &str) -> Pin {
        Pin::new(raw).unwrap()
    }

    #[test]
    fn test_derive_is_deterministic() {
        let a = derive("x509::CN=broker", &pin("1234"));
        let b = derive("x509::CN=broker", &pin("1234"));
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn test_derive_matches_protocol_shape() {
        let expected = hex::encode(Sha256::digest(b"alice-42"));
        assert_eq!(derive("alice", &pin("42")).as_str(), expected);
    }

    #[test]
    fn test_verify() {
        let token = derive("operator", &pin("4321"));
        assert!(verify(&token, "operator", &pin("4321")).is_some());
        assert!(verify(&token, "operator", &pin("1234")).is_none());
        assert!(verify(&token, "broker", &pin("4321")).is_none());
    }

    #[test]
    fn test_empty_token_never_verifies() {
        let token = AuthToken::from(String::new());
        assert!(verify(&token, "", &pin("0")).is_none());
    }
}
