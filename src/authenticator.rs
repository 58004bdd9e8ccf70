use crate::config::{AuthenticatorKind, DigestAlgorithm};
use crate::entity::User;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256, Sha512};
use std::sync::Arc;

/// Password check strategy.
///
/// `encode` turns a clear-text password into the form kept in the store;
/// `authenticate` checks a clear-text attempt against the stored form.
pub trait Authenticator: Send + Sync {
    /// Returns whether `password` matches the user's stored password.
    fn authenticate(&self, user: Option<&User>, password: &str) -> bool;

    /// Encodes a clear-text password for storage.
    fn encode(&self, password: &str) -> String {
        password.to_string()
    }
}

impl<T: Authenticator + ?Sized> Authenticator for Arc<T> {
    fn authenticate(&self, user: Option<&User>, password: &str) -> bool {
        (**self).authenticate(user, password)
    }

    fn encode(&self, password: &str) -> String {
        (**self).encode(password)
    }
}

/// Accepts every attempt.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpAuthenticator;

impl Authenticator for NoOpAuthenticator {
    fn authenticate(&self, _user: Option<&User>, _password: &str) -> bool {
        true
    }
}

/// Compares the attempt with the stored password verbatim.
#[derive(Clone, Copy, Debug, Default)]
pub struct TextMatchAuthenticator;

impl Authenticator for TextMatchAuthenticator {
    fn authenticate(&self, user: Option<&User>, password: &str) -> bool {
        user.and_then(User::password)
            .is_some_and(|stored| stored == password)
    }
}

/// Stores base64-encoded digests and compares digests of attempts.
#[derive(Clone, Copy, Debug, Default)]
pub struct CryptoAuthenticator {
    algorithm: DigestAlgorithm,
}

impl CryptoAuthenticator {
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        Self { algorithm }
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }
}

impl Authenticator for CryptoAuthenticator {
    fn authenticate(&self, user: Option<&User>, password: &str) -> bool {
        user.and_then(User::password)
            .is_some_and(|stored| stored == self.encode(password))
    }

    fn encode(&self, password: &str) -> String {
        match self.algorithm {
            DigestAlgorithm::Sha256 => STANDARD.encode(Sha256::digest(password.as_bytes())),
            DigestAlgorithm::Sha512 => STANDARD.encode(Sha512::digest(password.as_bytes())),
        }
    }
}

/// Builds the authenticator named by configuration.
pub(crate) fn from_kind(
    kind: AuthenticatorKind,
    algorithm: DigestAlgorithm,
) -> Arc<dyn Authenticator> {
    match kind {
        AuthenticatorKind::NoOp => Arc::new(NoOpAuthenticator),
        AuthenticatorKind::TextMatch => Arc::new(TextMatchAuthenticator),
        AuthenticatorKind::Crypto => Arc::new(CryptoAuthenticator::new(algorithm)),
    }
}
