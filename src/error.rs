use crate::relationship::RelationshipKind;
use crate::types::{EntityKind, ModelKind};
use thiserror::Error;

/// Store-layer error type.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Backing store failure.
    #[error("data backend error: {0}")]
    DataBackend(#[source] StoreError),
    /// Entity is transient or missing from the backing store.
    #[error("unknown {kind} '{name}'")]
    UnknownEntity { kind: EntityKind, name: String },
    /// Another persisted entity already owns the name.
    #[error("{kind} '{name}' already exists")]
    EntityExists { kind: EntityKind, name: String },
    /// A set already holds a different entity with the same name.
    #[error("duplicate {kind} name '{name}' in set")]
    DuplicateName { kind: EntityKind, name: String },
    /// Invalid entity name input.
    #[error("invalid name: {0}")]
    InvalidName(String),
    /// Entity already carries an id and cannot be added again.
    #[error("{kind} '{name}' is already persisted")]
    AlreadyPersisted { kind: EntityKind, name: String },
    /// Entity belongs to a different topology.
    #[error("{kind} belongs to the {found} model, expected {expected}")]
    ModelMismatch {
        kind: EntityKind,
        expected: ModelKind,
        found: ModelKind,
    },
    /// Relationship kind is not legal in the active topology.
    #[error("{relationship} relationships are not supported by the {model} model")]
    UnsupportedRelationship {
        model: ModelKind,
        relationship: RelationshipKind,
    },
    /// Delegation would close a cycle.
    #[error("delegation from '{delegator}' to '{delegatee}' would create a cycle")]
    DelegationCycle { delegator: String, delegatee: String },
    /// The global group cannot be removed or renamed.
    #[error("the global group cannot be removed or renamed")]
    GlobalGroupProtected,
    /// Submitted password does not match the stored one.
    #[error("password mismatch for user '{0}'")]
    PasswordMismatch(String),
    /// Invalid configuration input.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<StoreError> for Error {
    fn from(error: StoreError) -> Self {
        Self::DataBackend(error)
    }
}

impl Error {
    pub(crate) fn unknown(kind: EntityKind, name: impl Into<String>) -> Self {
        Self::UnknownEntity {
            kind,
            name: name.into(),
        }
    }
}
