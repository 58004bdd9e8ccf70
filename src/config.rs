use crate::error::{Error, Result};
use crate::types::{ModelKind, define_tag_enum};

define_tag_enum!(
    /// Backing store selected by configuration.
    StoreKind, "store", {
        /// Process-local [`crate::MemoryStore`].
        Memory => "memory",
    }
);

define_tag_enum!(
    /// Password check strategy selected by configuration.
    AuthenticatorKind, "authenticator", {
        /// Accepts every password.
        NoOp => "noop",
        /// Compares the stored password verbatim.
        TextMatch => "textmatch",
        /// Compares digests of the password.
        Crypto => "crypto",
    }
);

define_tag_enum!(
    /// Digest used by the crypto authenticator.
    DigestAlgorithm, "digest algorithm", {
        Sha256 => "sha256",
        Sha512 => "sha512",
    }
);

impl Default for DigestAlgorithm {
    fn default() -> Self {
        DigestAlgorithm::Sha256
    }
}

/// Settings for building a [`crate::SecurityService`].
///
/// Defaults to the dynamic model on the memory store with plain text
/// password matching.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SecurityConfig {
    pub model: ModelKind,
    pub store: StoreKind,
    pub authenticator: AuthenticatorKind,
    /// Only read by [`AuthenticatorKind::Crypto`].
    pub algorithm: DigestAlgorithm,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            model: ModelKind::Dynamic,
            store: StoreKind::Memory,
            authenticator: AuthenticatorKind::TextMatch,
            algorithm: DigestAlgorithm::default(),
        }
    }
}

impl SecurityConfig {
    /// Builds a config from `key = value` pairs, starting from the defaults.
    ///
    /// Keys and values are case-insensitive; unknown keys are rejected.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Result<Self>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = Self::default();
        for (key, value) in pairs {
            let value = value.as_ref();
            match key.as_ref().trim().to_ascii_lowercase().as_str() {
                "model" => config.model = value.parse()?,
                "store" => config.store = value.parse()?,
                "authenticator" => config.authenticator = value.parse()?,
                "algorithm" => config.algorithm = value.parse()?,
                other => return Err(Error::Config(format!("unknown key '{other}'"))),
            }
        }
        Ok(config)
    }

    pub fn with_model(mut self, model: ModelKind) -> Self {
        self.model = model;
        self
    }

    pub fn with_authenticator(mut self, authenticator: AuthenticatorKind) -> Self {
        self.authenticator = authenticator;
        self
    }

    pub fn with_algorithm(mut self, algorithm: DigestAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }
}
