use crate::error::{Error, Result};
use crate::types::{EntityId, EntityKind, ModelKind, canonical_name};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Storage row shared by every entity kind.
///
/// Backing stores persist and return this shape; typed entities convert to
/// and from it through [`SecurityEntity`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EntityRecord {
    /// Entity kind.
    pub kind: EntityKind,
    /// Durable id, `None` while transient.
    pub id: Option<EntityId>,
    /// Display name as entered.
    pub name: String,
    /// Topology the entity was created for.
    pub model: ModelKind,
    /// Encoded password, users only.
    pub password: Option<String>,
}

/// Common behavior of users, groups, roles and permissions.
///
/// Identity is the store-assigned id once present. Two transient entities
/// compare equal when their names match case-insensitively; a transient
/// entity never equals a persisted one.
pub trait SecurityEntity: Clone + fmt::Debug + Eq + Hash + Send + Sync + 'static {
    /// Kind tag used by stores and error messages.
    const KIND: EntityKind;

    /// Creates a transient entity.
    fn new(model: ModelKind, name: impl Into<String>) -> Self;

    /// Returns the durable id, if persisted.
    fn id(&self) -> Option<EntityId>;

    /// Returns the name as entered.
    fn name(&self) -> &str;

    /// Returns the topology tag.
    fn model(&self) -> ModelKind;

    /// Converts into a storage row.
    fn to_record(&self) -> EntityRecord;

    /// Restores an entity from a storage row.
    fn from_record(record: EntityRecord) -> Result<Self>;

    /// Returns whether the entity has a durable id.
    fn is_persisted(&self) -> bool {
        self.id().is_some()
    }

    /// Returns the case-folded name used for comparisons.
    fn canonical_name(&self) -> String {
        canonical_name(self.name())
    }
}

macro_rules! define_entity {
    (@common $name:ident, $kind:expr) => {
        impl SecurityEntity for $name {
            const KIND: EntityKind = $kind;

            fn new(model: ModelKind, name: impl Into<String>) -> Self {
                Self::from_parts(None, name.into(), model, None)
            }

            fn id(&self) -> Option<EntityId> {
                self.id
            }

            fn name(&self) -> &str {
                &self.name
            }

            fn model(&self) -> ModelKind {
                self.model
            }

            fn to_record(&self) -> EntityRecord {
                EntityRecord {
                    kind: $kind,
                    id: self.id,
                    name: self.name.clone(),
                    model: self.model,
                    password: self.record_password(),
                }
            }

            fn from_record(record: EntityRecord) -> Result<Self> {
                if record.kind != $kind {
                    return Err(Error::DataBackend(
                        format!(
                            "store returned a {} record where a {} was expected",
                            record.kind, $kind
                        )
                        .into(),
                    ));
                }
                Ok(Self::from_parts(
                    record.id,
                    record.name,
                    record.model,
                    record.password,
                ))
            }
        }

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                match (self.id, other.id) {
                    (Some(left), Some(right)) => left == right,
                    (None, None) => canonical_name(&self.name) == canonical_name(&other.name),
                    _ => false,
                }
            }
        }

        impl Eq for $name {}

        impl Hash for $name {
            fn hash<H: Hasher>(&self, state: &mut H) {
                match self.id {
                    Some(id) => {
                        0u8.hash(state);
                        id.hash(state);
                    }
                    None => {
                        1u8.hash(state);
                        canonical_name(&self.name).hash(state);
                    }
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.name)
            }
        }
    };
    ($(#[$doc:meta])* $name:ident, $kind:expr) => {
        $(#[$doc])*
        #[derive(Clone, Debug)]
        pub struct $name {
            id: Option<EntityId>,
            name: String,
            model: ModelKind,
        }

        impl $name {
            fn from_parts(
                id: Option<EntityId>,
                name: String,
                model: ModelKind,
                _password: Option<String>,
            ) -> Self {
                Self { id, name, model }
            }

            fn record_password(&self) -> Option<String> {
                None
            }
        }

        define_entity!(@common $name, $kind);
    };
    ($(#[$doc:meta])* $name:ident, $kind:expr, with_password) => {
        $(#[$doc])*
        #[derive(Clone, Debug)]
        pub struct $name {
            id: Option<EntityId>,
            name: String,
            model: ModelKind,
            password: Option<String>,
        }

        impl $name {
            fn from_parts(
                id: Option<EntityId>,
                name: String,
                model: ModelKind,
                password: Option<String>,
            ) -> Self {
                Self {
                    id,
                    name,
                    model,
                    password,
                }
            }

            fn record_password(&self) -> Option<String> {
                self.password.clone()
            }

            /// Returns the stored password in its encoded form.
            pub fn password(&self) -> Option<&str> {
                self.password.as_deref()
            }
        }

        define_entity!(@common $name, $kind);
    };
}

define_entity!(
    /// A principal that can authenticate and be granted memberships.
    User,
    EntityKind::User,
    with_password
);
define_entity!(
    /// A named collection of users.
    Group,
    EntityKind::Group
);
define_entity!(
    /// A named bundle of permissions.
    Role,
    EntityKind::Role
);
define_entity!(
    /// A named capability attached to roles.
    Permission,
    EntityKind::Permission
);
