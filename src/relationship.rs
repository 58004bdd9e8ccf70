use crate::entity::{Group, Role, SecurityEntity, User};
use crate::error::{Error, Result};
use crate::types::{EntityId, EntityKind};
use std::fmt;

/// Kind of relationship edge.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RelationshipKind {
    /// User is a member of a group.
    UserGroup,
    /// Group holds a role.
    GroupRole,
    /// Role holds a permission.
    RolePermission,
    /// User delegates to another user.
    UserDelegate,
    /// User holds a role within a group.
    UserGroupRole,
}

impl RelationshipKind {
    /// All relationship kinds.
    pub const ALL: &'static [RelationshipKind] = &[
        RelationshipKind::UserGroup,
        RelationshipKind::GroupRole,
        RelationshipKind::RolePermission,
        RelationshipKind::UserDelegate,
        RelationshipKind::UserGroupRole,
    ];

    /// Entity kind on the owning side; stores index edges by this endpoint.
    pub fn owner(self) -> EntityKind {
        match self {
            RelationshipKind::UserGroup
            | RelationshipKind::UserDelegate
            | RelationshipKind::UserGroupRole => EntityKind::User,
            RelationshipKind::GroupRole => EntityKind::Group,
            RelationshipKind::RolePermission => EntityKind::Role,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RelationshipKind::UserGroup => "user-group",
            RelationshipKind::GroupRole => "group-role",
            RelationshipKind::RolePermission => "role-permission",
            RelationshipKind::UserDelegate => "user-delegate",
            RelationshipKind::UserGroupRole => "user-group-role",
        }
    }
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user holding a role within a group.
///
/// Equality and hashing use the three ids captured at construction, so a
/// triple never changes identity after it is stored in a hashed container.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UserGroupRole {
    user: EntityId,
    group: EntityId,
    role: EntityId,
}

impl UserGroupRole {
    /// Builds a triple from persisted entities.
    pub fn new(user: &User, group: &Group, role: &Role) -> Result<Self> {
        Ok(Self {
            user: require_id(user)?,
            group: require_id(group)?,
            role: require_id(role)?,
        })
    }

    /// Builds a triple from raw ids.
    pub fn from_ids(user: EntityId, group: EntityId, role: EntityId) -> Self {
        Self { user, group, role }
    }

    pub fn user(&self) -> EntityId {
        self.user
    }

    pub fn group(&self) -> EntityId {
        self.group
    }

    pub fn role(&self) -> EntityId {
        self.role
    }
}

/// Typed many-to-many edge between persisted entities.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Relationship {
    /// User is a member of a group.
    UserGroup { user: EntityId, group: EntityId },
    /// Group holds a role.
    GroupRole { group: EntityId, role: EntityId },
    /// Role holds a permission.
    RolePermission { role: EntityId, permission: EntityId },
    /// Delegator hands its grants to the delegatee.
    UserDelegate {
        delegator: EntityId,
        delegatee: EntityId,
    },
    /// User holds a role within a group.
    UserGroupRole(UserGroupRole),
}

impl Relationship {
    /// Returns the edge kind.
    pub fn kind(&self) -> RelationshipKind {
        match self {
            Relationship::UserGroup { .. } => RelationshipKind::UserGroup,
            Relationship::GroupRole { .. } => RelationshipKind::GroupRole,
            Relationship::RolePermission { .. } => RelationshipKind::RolePermission,
            Relationship::UserDelegate { .. } => RelationshipKind::UserDelegate,
            Relationship::UserGroupRole(_) => RelationshipKind::UserGroupRole,
        }
    }

    /// Returns every endpoint of the edge.
    pub fn endpoints(&self) -> Vec<(EntityKind, EntityId)> {
        match *self {
            Relationship::UserGroup { user, group } => {
                vec![(EntityKind::User, user), (EntityKind::Group, group)]
            }
            Relationship::GroupRole { group, role } => {
                vec![(EntityKind::Group, group), (EntityKind::Role, role)]
            }
            Relationship::RolePermission { role, permission } => {
                vec![(EntityKind::Role, role), (EntityKind::Permission, permission)]
            }
            Relationship::UserDelegate {
                delegator,
                delegatee,
            } => vec![(EntityKind::User, delegator), (EntityKind::User, delegatee)],
            Relationship::UserGroupRole(triple) => vec![
                (EntityKind::User, triple.user),
                (EntityKind::Group, triple.group),
                (EntityKind::Role, triple.role),
            ],
        }
    }

    /// Returns the id on the owning side (see [`RelationshipKind::owner`]).
    pub fn owner(&self) -> EntityId {
        match *self {
            Relationship::UserGroup { user, .. } => user,
            Relationship::GroupRole { group, .. } => group,
            Relationship::RolePermission { role, .. } => role,
            Relationship::UserDelegate { delegator, .. } => delegator,
            Relationship::UserGroupRole(triple) => triple.user,
        }
    }

    /// Returns whether the edge references the entity.
    pub fn involves(&self, kind: EntityKind, id: EntityId) -> bool {
        self.endpoints()
            .into_iter()
            .any(|endpoint| endpoint == (kind, id))
    }
}

pub(crate) fn require_id<T: SecurityEntity>(entity: &T) -> Result<EntityId> {
    entity
        .id()
        .ok_or_else(|| Error::unknown(T::KIND, entity.name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ModelKind;
    use std::collections::HashSet;

    fn ids(user: i64, group: i64, role: i64) -> UserGroupRole {
        UserGroupRole::from_ids(
            EntityId::new(user),
            EntityId::new(group),
            EntityId::new(role),
        )
    }

    #[test]
    fn triple_equality_is_structural() {
        let mut set = HashSet::new();
        set.insert(Relationship::UserGroupRole(ids(1, 2, 3)));
        set.insert(Relationship::UserGroupRole(ids(1, 2, 3)));
        set.insert(Relationship::UserGroupRole(ids(1, 3, 2)));

        assert_eq!(set.len(), 2);
    }

    #[test]
    fn triple_requires_persisted_members() {
        let user = User::new(ModelKind::Turbine, "clint");
        let group = Group::new(ModelKind::Turbine, "dev");
        let role = Role::new(ModelKind::Turbine, "admin");

        let result = UserGroupRole::new(&user, &group, &role);
        assert!(matches!(
            result,
            Err(Error::UnknownEntity {
                kind: EntityKind::User,
                ..
            })
        ));
    }

    #[test]
    fn delegation_involves_both_users() {
        let edge = Relationship::UserDelegate {
            delegator: EntityId::new(1),
            delegatee: EntityId::new(2),
        };

        assert!(edge.involves(EntityKind::User, EntityId::new(1)));
        assert!(edge.involves(EntityKind::User, EntityId::new(2)));
        assert!(!edge.involves(EntityKind::Group, EntityId::new(1)));
        assert_eq!(edge.kind().owner(), EntityKind::User);
    }
}
