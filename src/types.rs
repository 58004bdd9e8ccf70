use crate::error::{Error, Result};
use crate::relationship::RelationshipKind;
use std::fmt;

const MAX_NAME_LEN: usize = 128;

/// Validates an entity name and returns its trimmed form.
pub(crate) fn validate_name(value: &str, kind: EntityKind) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidName(format!("{kind} name must not be empty")));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(Error::InvalidName(format!(
            "{kind} name length must be <= {MAX_NAME_LEN}"
        )));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(Error::InvalidName(format!(
            "{kind} name contains control characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Case-folded form used for every name comparison.
pub(crate) fn canonical_name(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Durable entity identifier assigned by the backing store.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct EntityId(i64);

impl EntityId {
    /// Creates an identifier from a raw store value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw store value.
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for EntityId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

macro_rules! define_tag_enum {
    ($(#[$doc:meta])* $name:ident, $what:expr, { $($(#[$vdoc:meta])* $variant:ident => $text:expr),+ $(,)? }) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
        pub enum $name {
            $($(#[$vdoc])* $variant,)+
        }

        impl $name {
            /// All variants in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Returns the configuration identifier.
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::error::Error;

            fn from_str(value: &str) -> $crate::error::Result<Self> {
                let wanted = value.trim();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|candidate| candidate.as_str().eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| $crate::error::Error::Config(format!("unknown {} '{wanted}'", $what)))
            }
        }
    };
}

pub(crate) use define_tag_enum;

define_tag_enum!(
    /// Kind of security entity.
    EntityKind, "entity kind", {
        /// A principal that can log in.
        User => "user",
        /// A named collection of users.
        Group => "group",
        /// A named collection of permissions.
        Role => "role",
        /// A named capability.
        Permission => "permission",
    }
);

define_tag_enum!(
    /// Relationship topology of a security domain.
    ModelKind, "model", {
        /// Users belong to groups.
        Basic => "basic",
        /// User → group → role → permission chain.
        Simple => "simple",
        /// Simple chain plus user delegation.
        Dynamic => "dynamic",
        /// User/group/role triples plus role permissions.
        Turbine => "turbine",
    }
);

impl ModelKind {
    /// Returns whether the topology allows a relationship kind.
    pub fn supports(self, relationship: RelationshipKind) -> bool {
        use RelationshipKind as R;
        match self {
            ModelKind::Basic => matches!(relationship, R::UserGroup),
            ModelKind::Simple => matches!(
                relationship,
                R::UserGroup | R::GroupRole | R::RolePermission
            ),
            ModelKind::Dynamic => matches!(
                relationship,
                R::UserGroup | R::GroupRole | R::RolePermission | R::UserDelegate
            ),
            ModelKind::Turbine => matches!(relationship, R::RolePermission | R::UserGroupRole),
        }
    }
}
