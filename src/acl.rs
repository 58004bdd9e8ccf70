use crate::entity::{Group, Role, SecurityEntity};
use crate::error::Result;
use crate::set::{GroupSet, PermissionSet, RoleSet};
use crate::types::canonical_name;
use std::collections::HashMap;

/// Point-in-time view of a user's groups, roles and permissions.
///
/// Built by [`crate::ModelManager::access_control_list`]. All lookups are by
/// case-insensitive name; later grants or revokes do not affect an existing
/// list.
#[derive(Clone, Debug, Default)]
pub struct AccessControlList {
    groups: GroupSet,
    roles: RoleSet,
    permissions: PermissionSet,
    roles_by_group: HashMap<String, RoleSet>,
    permissions_by_group: HashMap<String, PermissionSet>,
}

impl AccessControlList {
    pub(crate) fn new(
        groups: GroupSet,
        group_roles: Vec<(Group, RoleSet)>,
        role_permissions: Vec<(Role, PermissionSet)>,
    ) -> Result<Self> {
        let permissions_by_role: HashMap<String, PermissionSet> = role_permissions
            .into_iter()
            .map(|(role, permissions)| (role.canonical_name(), permissions))
            .collect();

        let mut roles = RoleSet::new();
        let mut permissions = PermissionSet::new();
        let mut roles_by_group = HashMap::with_capacity(group_roles.len());
        let mut permissions_by_group = HashMap::with_capacity(group_roles.len());
        for (group, held) in group_roles {
            let mut group_permissions = PermissionSet::new();
            for role in &held {
                if let Some(granted) = permissions_by_role.get(&role.canonical_name()) {
                    group_permissions.add_all(granted.iter().cloned())?;
                }
                roles.add(role.clone())?;
            }
            permissions.add_all(group_permissions.iter().cloned())?;
            roles_by_group.insert(group.canonical_name(), held);
            permissions_by_group.insert(group.canonical_name(), group_permissions);
        }

        Ok(Self {
            groups,
            roles,
            permissions,
            roles_by_group,
            permissions_by_group,
        })
    }

    /// Every group the user acts in.
    pub fn groups(&self) -> &GroupSet {
        &self.groups
    }

    /// Every role the user holds, across groups.
    pub fn roles(&self) -> &RoleSet {
        &self.roles
    }

    /// Every permission the user holds, across groups.
    pub fn permissions(&self) -> &PermissionSet {
        &self.permissions
    }

    pub fn in_group(&self, group: &str) -> bool {
        self.groups.contains_name(group)
    }

    pub fn roles_in_group(&self, group: &str) -> Option<&RoleSet> {
        self.roles_by_group.get(&canonical_name(group))
    }

    pub fn permissions_in_group(&self, group: &str) -> Option<&PermissionSet> {
        self.permissions_by_group.get(&canonical_name(group))
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains_name(role)
    }

    pub fn has_role_in_group(&self, role: &str, group: &str) -> bool {
        self.roles_in_group(group)
            .is_some_and(|roles| roles.contains_name(role))
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains_name(permission)
    }

    pub fn has_permission_in_group(&self, permission: &str, group: &str) -> bool {
        self.permissions_in_group(group)
            .is_some_and(|permissions| permissions.contains_name(permission))
    }
}
