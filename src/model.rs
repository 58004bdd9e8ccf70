use crate::acl::AccessControlList;
use crate::domain::Domain;
use crate::entity::{Group, Permission, Role, SecurityEntity, User};
use crate::error::{Error, Result};
use crate::graph::RelationshipGraph;
use crate::relationship::{Relationship, RelationshipKind, UserGroupRole, require_id};
use crate::set::{GroupSet, PermissionSet, RoleSet, UserSet};
use crate::store::{EntityLookup, Store};
use crate::types::{EntityId, EntityKind, ModelKind};
use futures::lock::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Name of the turbine model's global group.
pub const GLOBAL_GROUP_NAME: &str = "global";

/// Result of a revoke call.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RevokeOutcome {
    /// The edge existed and was removed.
    Revoked,
    /// No such edge was granted; nothing changed.
    NotFound,
}

impl RevokeOutcome {
    pub fn is_revoked(self) -> bool {
        self == RevokeOutcome::Revoked
    }
}

/// Grants, revokes and traverses relationships for one topology.
///
/// The active [`ModelKind`] decides which relationship kinds are legal.
/// Every mutation resolves its endpoints against the store, updates the
/// in-memory index and persists the edge while holding the domain lock; a
/// store failure rolls the index back and surfaces as
/// [`Error::DataBackend`].
pub struct ModelManager<S> {
    domain: Arc<Domain<S>>,
    global_group: Mutex<Option<Group>>,
}

impl<S> fmt::Debug for ModelManager<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelManager")
            .field("model", &self.domain.model)
            .finish()
    }
}

impl<S: Store> ModelManager<S> {
    pub(crate) fn new(domain: Arc<Domain<S>>) -> Self {
        Self {
            domain,
            global_group: Mutex::new(None),
        }
    }

    /// Returns the active topology.
    pub fn model(&self) -> ModelKind {
        self.domain.model
    }

    fn ensure_supported(&self, relationship: RelationshipKind) -> Result<()> {
        if !self.domain.model.supports(relationship) {
            return Err(Error::UnsupportedRelationship {
                model: self.domain.model,
                relationship,
            });
        }
        Ok(())
    }

    /// Puts a user into a group.
    pub async fn grant_user_group(&self, user: &User, group: &Group) -> Result<()> {
        self.ensure_supported(RelationshipKind::UserGroup)?;
        let mut graph = self.domain.graph.lock().await;
        let edge = Relationship::UserGroup {
            user: self.domain.resolve(user).await?,
            group: self.domain.resolve(group).await?,
        };
        self.insert_edge(&mut graph, edge).await
    }

    /// Takes a user out of a group.
    pub async fn revoke_user_group(&self, user: &User, group: &Group) -> Result<RevokeOutcome> {
        self.ensure_supported(RelationshipKind::UserGroup)?;
        let mut graph = self.domain.graph.lock().await;
        let edge = Relationship::UserGroup {
            user: self.domain.resolve(user).await?,
            group: self.domain.resolve(group).await?,
        };
        self.remove_edge(&mut graph, edge).await
    }

    /// Gives a role to a group.
    pub async fn grant_group_role(&self, group: &Group, role: &Role) -> Result<()> {
        self.ensure_supported(RelationshipKind::GroupRole)?;
        let mut graph = self.domain.graph.lock().await;
        let edge = Relationship::GroupRole {
            group: self.domain.resolve(group).await?,
            role: self.domain.resolve(role).await?,
        };
        self.insert_edge(&mut graph, edge).await
    }

    pub async fn revoke_group_role(&self, group: &Group, role: &Role) -> Result<RevokeOutcome> {
        self.ensure_supported(RelationshipKind::GroupRole)?;
        let mut graph = self.domain.graph.lock().await;
        let edge = Relationship::GroupRole {
            group: self.domain.resolve(group).await?,
            role: self.domain.resolve(role).await?,
        };
        self.remove_edge(&mut graph, edge).await
    }

    /// Gives a permission to a role.
    pub async fn grant_role_permission(&self, role: &Role, permission: &Permission) -> Result<()> {
        self.ensure_supported(RelationshipKind::RolePermission)?;
        let mut graph = self.domain.graph.lock().await;
        let edge = Relationship::RolePermission {
            role: self.domain.resolve(role).await?,
            permission: self.domain.resolve(permission).await?,
        };
        self.insert_edge(&mut graph, edge).await
    }

    pub async fn revoke_role_permission(
        &self,
        role: &Role,
        permission: &Permission,
    ) -> Result<RevokeOutcome> {
        self.ensure_supported(RelationshipKind::RolePermission)?;
        let mut graph = self.domain.graph.lock().await;
        let edge = Relationship::RolePermission {
            role: self.domain.resolve(role).await?,
            permission: self.domain.resolve(permission).await?,
        };
        self.remove_edge(&mut graph, edge).await
    }

    /// Lets `delegatee` act with the groups of `delegator`.
    ///
    /// Self-delegation and edges that would close a delegation cycle fail
    /// with [`Error::DelegationCycle`].
    pub async fn grant_delegate(&self, delegator: &User, delegatee: &User) -> Result<()> {
        self.ensure_supported(RelationshipKind::UserDelegate)?;
        let mut graph = self.domain.graph.lock().await;
        let from = self.domain.resolve(delegator).await?;
        let to = self.domain.resolve(delegatee).await?;
        let edge = Relationship::UserDelegate {
            delegator: from,
            delegatee: to,
        };
        if !graph.contains(&edge) && (from == to || graph.delegation_reaches(to, from)) {
            return Err(Error::DelegationCycle {
                delegator: delegator.name().to_string(),
                delegatee: delegatee.name().to_string(),
            });
        }
        self.insert_edge(&mut graph, edge).await
    }

    pub async fn revoke_delegate(&self, delegator: &User, delegatee: &User) -> Result<RevokeOutcome> {
        self.ensure_supported(RelationshipKind::UserDelegate)?;
        let mut graph = self.domain.graph.lock().await;
        let edge = Relationship::UserDelegate {
            delegator: self.domain.resolve(delegator).await?,
            delegatee: self.domain.resolve(delegatee).await?,
        };
        self.remove_edge(&mut graph, edge).await
    }

    /// Gives a user a role inside a group.
    pub async fn grant_user_group_role(&self, user: &User, group: &Group, role: &Role) -> Result<()> {
        self.ensure_supported(RelationshipKind::UserGroupRole)?;
        let mut graph = self.domain.graph.lock().await;
        let edge = Relationship::UserGroupRole(UserGroupRole::from_ids(
            self.domain.resolve(user).await?,
            self.domain.resolve(group).await?,
            self.domain.resolve(role).await?,
        ));
        self.insert_edge(&mut graph, edge).await
    }

    pub async fn revoke_user_group_role(
        &self,
        user: &User,
        group: &Group,
        role: &Role,
    ) -> Result<RevokeOutcome> {
        self.ensure_supported(RelationshipKind::UserGroupRole)?;
        let mut graph = self.domain.graph.lock().await;
        let edge = Relationship::UserGroupRole(UserGroupRole::from_ids(
            self.domain.resolve(user).await?,
            self.domain.resolve(group).await?,
            self.domain.resolve(role).await?,
        ));
        self.remove_edge(&mut graph, edge).await
    }

    /// Strips every relationship referencing the entity but keeps the
    /// entity. Returns the number of edges removed.
    pub async fn revoke_all<T: SecurityEntity>(&self, entity: &T) -> Result<usize> {
        self.domain.remove_entity(entity, false).await
    }

    /// Strips every relationship referencing the entity, then deletes it.
    pub async fn remove_entity<T: SecurityEntity>(&self, entity: &T) -> Result<()> {
        self.domain.remove_entity(entity, true).await.map(|_| ())
    }

    /// Returns the turbine model's global group, creating it on first use.
    ///
    /// The group is cached per manager; call
    /// [`ModelManager::invalidate_global_group`] after changing the store
    /// behind the manager's back.
    pub async fn global_group(&self) -> Result<Group> {
        if self.domain.model != ModelKind::Turbine {
            return Err(Error::UnsupportedRelationship {
                model: self.domain.model,
                relationship: RelationshipKind::UserGroupRole,
            });
        }
        let mut cached = self.global_group.lock().await;
        if let Some(group) = cached.as_ref() {
            return Ok(group.clone());
        }
        let lookup = EntityLookup::Name(GLOBAL_GROUP_NAME.to_string());
        let group = match self.domain.load::<Group>(lookup.clone()).await? {
            Some(group) => group,
            None => match self
                .domain
                .insert(Group::new(ModelKind::Turbine, GLOBAL_GROUP_NAME))
                .await
            {
                Ok(group) => group,
                // Someone else created it between the lookup and the insert.
                Err(Error::EntityExists { .. }) => self
                    .domain
                    .load::<Group>(lookup)
                    .await?
                    .ok_or_else(|| Error::unknown(EntityKind::Group, GLOBAL_GROUP_NAME))?,
                Err(error) => return Err(error),
            },
        };
        tracing::debug!(id = ?group.id(), "global group cached");
        *cached = Some(group.clone());
        Ok(group)
    }

    /// Drops the cached global group.
    pub async fn invalidate_global_group(&self) {
        *self.global_group.lock().await = None;
    }

    /// Groups the user belongs to. In the turbine model these are the
    /// groups of the user's triples.
    pub async fn groups_of(&self, user: &User) -> Result<GroupSet> {
        let id = require_id(user)?;
        let ids = if self.domain.model == ModelKind::Turbine {
            self.related(EntityKind::User, id, RelationshipKind::UserGroupRole, |edge| {
                triple(edge).map(|t| t.group())
            })
            .await
        } else {
            self.related(EntityKind::User, id, RelationshipKind::UserGroup, |edge| {
                match *edge {
                    Relationship::UserGroup { group, .. } => Some(group),
                    _ => None,
                }
            })
            .await
        };
        self.domain.load_set(ids).await
    }

    /// Members of the group.
    pub async fn users_of(&self, group: &Group) -> Result<UserSet> {
        let id = require_id(group)?;
        let ids = if self.domain.model == ModelKind::Turbine {
            self.related(EntityKind::Group, id, RelationshipKind::UserGroupRole, |edge| {
                triple(edge).map(|t| t.user())
            })
            .await
        } else {
            self.related(EntityKind::Group, id, RelationshipKind::UserGroup, |edge| {
                match *edge {
                    Relationship::UserGroup { user, .. } => Some(user),
                    _ => None,
                }
            })
            .await
        };
        self.domain.load_set(ids).await
    }

    /// Roles held by the group. In the turbine model, every role any user
    /// holds inside the group.
    pub async fn roles_of(&self, group: &Group) -> Result<RoleSet> {
        let id = require_id(group)?;
        let ids = if self.domain.model == ModelKind::Turbine {
            self.related(EntityKind::Group, id, RelationshipKind::UserGroupRole, |edge| {
                triple(edge).map(|t| t.role())
            })
            .await
        } else {
            self.related(EntityKind::Group, id, RelationshipKind::GroupRole, |edge| {
                match *edge {
                    Relationship::GroupRole { role, .. } => Some(role),
                    _ => None,
                }
            })
            .await
        };
        self.domain.load_set(ids).await
    }

    /// Groups holding the role.
    pub async fn groups_with_role(&self, role: &Role) -> Result<GroupSet> {
        let id = require_id(role)?;
        let ids = if self.domain.model == ModelKind::Turbine {
            self.related(EntityKind::Role, id, RelationshipKind::UserGroupRole, |edge| {
                triple(edge).map(|t| t.group())
            })
            .await
        } else {
            self.related(EntityKind::Role, id, RelationshipKind::GroupRole, |edge| {
                match *edge {
                    Relationship::GroupRole { group, .. } => Some(group),
                    _ => None,
                }
            })
            .await
        };
        self.domain.load_set(ids).await
    }

    pub async fn permissions_of(&self, role: &Role) -> Result<PermissionSet> {
        let id = require_id(role)?;
        let ids = self
            .related(EntityKind::Role, id, RelationshipKind::RolePermission, |edge| {
                match *edge {
                    Relationship::RolePermission { permission, .. } => Some(permission),
                    _ => None,
                }
            })
            .await;
        self.domain.load_set(ids).await
    }

    pub async fn roles_with_permission(&self, permission: &Permission) -> Result<RoleSet> {
        let id = require_id(permission)?;
        let ids = self
            .related(
                EntityKind::Permission,
                id,
                RelationshipKind::RolePermission,
                |edge| match *edge {
                    Relationship::RolePermission { role, .. } => Some(role),
                    _ => None,
                },
            )
            .await;
        self.domain.load_set(ids).await
    }

    /// Users the given user delegates to.
    pub async fn delegatees_of(&self, user: &User) -> Result<UserSet> {
        let id = require_id(user)?;
        let ids = self
            .related(EntityKind::User, id, RelationshipKind::UserDelegate, |edge| {
                match *edge {
                    Relationship::UserDelegate {
                        delegator,
                        delegatee,
                    } if delegator == id => Some(delegatee),
                    _ => None,
                }
            })
            .await;
        self.domain.load_set(ids).await
    }

    /// Users delegating directly to the given user.
    pub async fn delegators_of(&self, user: &User) -> Result<UserSet> {
        let id = require_id(user)?;
        let ids = self
            .related(EntityKind::User, id, RelationshipKind::UserDelegate, |edge| {
                match *edge {
                    Relationship::UserDelegate {
                        delegator,
                        delegatee,
                    } if delegatee == id => Some(delegator),
                    _ => None,
                }
            })
            .await;
        self.domain.load_set(ids).await
    }

    /// Roles the user holds inside one group.
    ///
    /// Outside the turbine model a member holds every role of the group and
    /// a non-member holds none.
    pub async fn roles_in_group(&self, user: &User, group: &Group) -> Result<RoleSet> {
        let user_id = require_id(user)?;
        let group_id = require_id(group)?;
        let ids = {
            let graph = self.domain.graph.lock().await;
            match self.domain.model {
                ModelKind::Turbine => triple_roles(&graph, &BTreeSet::from([user_id]), group_id),
                _ if graph.contains(&Relationship::UserGroup {
                    user: user_id,
                    group: group_id,
                }) =>
                {
                    group_roles(&graph, group_id)
                }
                _ => BTreeSet::new(),
            }
        };
        self.domain.load_set(ids).await
    }

    /// The user's triples, ordered by group then role id.
    pub async fn user_group_roles(&self, user: &User) -> Result<Vec<UserGroupRole>> {
        let id = require_id(user)?;
        let graph = self.domain.graph.lock().await;
        let mut triples: Vec<UserGroupRole> = graph
            .touching_of(EntityKind::User, id, RelationshipKind::UserGroupRole)
            .filter_map(triple)
            .collect();
        triples.sort_by_key(|t| (t.group(), t.role()));
        Ok(triples)
    }

    /// Builds a snapshot of everything the user is allowed to do.
    ///
    /// In the dynamic model the groups of every user delegating to this
    /// one, directly or transitively, are folded in.
    pub async fn access_control_list(&self, user: &User) -> Result<AccessControlList> {
        let user_id = self.domain.resolve(user).await?;
        let snapshot = {
            let graph = self.domain.graph.lock().await;
            self.snapshot(&graph, user_id)
        };

        let groups: GroupSet = self.domain.load_set(snapshot.groups.keys().copied()).await?;
        let role_ids: BTreeSet<EntityId> = snapshot.groups.values().flatten().copied().collect();
        let roles: RoleSet = self.domain.load_set(role_ids).await?;
        let permission_ids: BTreeSet<EntityId> =
            snapshot.roles.values().flatten().copied().collect();
        let permissions: PermissionSet = self.domain.load_set(permission_ids).await?;

        let mut group_roles = Vec::with_capacity(groups.len());
        for group in &groups {
            let mut held = RoleSet::new();
            if let Some(ids) = group.id().and_then(|id| snapshot.groups.get(&id)) {
                for role in ids.iter().filter_map(|id| roles.get_by_id(*id)) {
                    held.add(role.clone())?;
                }
            }
            group_roles.push((group.clone(), held));
        }
        let mut role_permissions = Vec::with_capacity(roles.len());
        for role in &roles {
            let mut held = PermissionSet::new();
            if let Some(ids) = role.id().and_then(|id| snapshot.roles.get(&id)) {
                for permission in ids.iter().filter_map(|id| permissions.get_by_id(*id)) {
                    held.add(permission.clone())?;
                }
            }
            role_permissions.push((role.clone(), held));
        }
        AccessControlList::new(groups, group_roles, role_permissions)
    }

    fn snapshot(&self, graph: &RelationshipGraph, user_id: EntityId) -> AclSnapshot {
        let mut principals = BTreeSet::from([user_id]);
        if self.domain.model == ModelKind::Dynamic {
            principals.extend(graph.delegators_of(user_id));
        }

        let mut group_ids = BTreeSet::new();
        for principal in &principals {
            if self.domain.model == ModelKind::Turbine {
                group_ids.extend(
                    graph
                        .touching_of(EntityKind::User, *principal, RelationshipKind::UserGroupRole)
                        .filter_map(triple)
                        .map(|t| t.group()),
                );
            } else {
                group_ids.extend(
                    graph
                        .touching_of(EntityKind::User, *principal, RelationshipKind::UserGroup)
                        .filter_map(|edge| match *edge {
                            Relationship::UserGroup { group, .. } => Some(group),
                            _ => None,
                        }),
                );
            }
        }

        let mut groups = BTreeMap::new();
        for group_id in group_ids {
            let roles = match self.domain.model {
                ModelKind::Turbine => triple_roles(graph, &principals, group_id),
                ModelKind::Basic => BTreeSet::new(),
                ModelKind::Simple | ModelKind::Dynamic => group_roles(graph, group_id),
            };
            groups.insert(group_id, roles);
        }

        let mut roles = BTreeMap::new();
        for role_id in groups.values().flatten() {
            let permissions: BTreeSet<EntityId> = graph
                .touching_of(EntityKind::Role, *role_id, RelationshipKind::RolePermission)
                .filter_map(|edge| match *edge {
                    Relationship::RolePermission { permission, .. } => Some(permission),
                    _ => None,
                })
                .collect();
            roles.insert(*role_id, permissions);
        }
        AclSnapshot { groups, roles }
    }

    async fn related(
        &self,
        kind: EntityKind,
        id: EntityId,
        relationship: RelationshipKind,
        pick: impl Fn(&Relationship) -> Option<EntityId>,
    ) -> BTreeSet<EntityId> {
        let graph = self.domain.graph.lock().await;
        graph
            .touching_of(kind, id, relationship)
            .filter_map(pick)
            .collect()
    }

    async fn insert_edge(&self, graph: &mut RelationshipGraph, edge: Relationship) -> Result<()> {
        if !graph.insert(edge) {
            tracing::debug!(relationship = %edge.kind(), "relationship already granted");
            return Ok(());
        }
        if let Err(error) = self.domain.store.save_relationship(edge).await {
            graph.remove(&edge);
            tracing::warn!(relationship = %edge.kind(), %error, "grant rolled back");
            return Err(Error::DataBackend(error));
        }
        tracing::info!(relationship = %edge.kind(), owner = %edge.owner(), "relationship granted");
        Ok(())
    }

    async fn remove_edge(
        &self,
        graph: &mut RelationshipGraph,
        edge: Relationship,
    ) -> Result<RevokeOutcome> {
        if !graph.remove(&edge) {
            tracing::debug!(relationship = %edge.kind(), "relationship not granted");
            return Ok(RevokeOutcome::NotFound);
        }
        if let Err(error) = self.domain.store.delete_relationship(edge).await {
            graph.insert(edge);
            tracing::warn!(relationship = %edge.kind(), %error, "revoke rolled back");
            return Err(Error::DataBackend(error));
        }
        tracing::info!(relationship = %edge.kind(), owner = %edge.owner(), "relationship revoked");
        Ok(RevokeOutcome::Revoked)
    }
}

/// Group id to role ids, role id to permission ids.
struct AclSnapshot {
    groups: BTreeMap<EntityId, BTreeSet<EntityId>>,
    roles: BTreeMap<EntityId, BTreeSet<EntityId>>,
}

fn triple(edge: &Relationship) -> Option<UserGroupRole> {
    match *edge {
        Relationship::UserGroupRole(triple) => Some(triple),
        _ => None,
    }
}

fn group_roles(graph: &RelationshipGraph, group: EntityId) -> BTreeSet<EntityId> {
    graph
        .touching_of(EntityKind::Group, group, RelationshipKind::GroupRole)
        .filter_map(|edge| match *edge {
            Relationship::GroupRole { role, .. } => Some(role),
            _ => None,
        })
        .collect()
}

fn triple_roles(
    graph: &RelationshipGraph,
    users: &BTreeSet<EntityId>,
    group: EntityId,
) -> BTreeSet<EntityId> {
    graph
        .touching_of(EntityKind::Group, group, RelationshipKind::UserGroupRole)
        .filter_map(triple)
        .filter(|t| users.contains(&t.user()))
        .map(|t| t.role())
        .collect()
}
