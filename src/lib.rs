//! Role-based security model with pluggable topologies and backing stores.
//!
//! Users, groups, roles and permissions are persisted through a [`Store`]
//! and related to each other by a [`ModelManager`] whose [`ModelKind`]
//! decides the legal relationships: `basic` (users in groups), `simple`
//! (users in groups, groups holding roles, roles holding permissions),
//! `dynamic` (simple plus user delegation) and `turbine` (user/group/role
//! triples). Start from [`SecurityServiceBuilder`] or
//! [`SecurityService::from_config`].
//!
//! # Examples
//!
//! Granting a role and checking the resulting access (enable `memory-store`):
//! ```no_run
//! # #[cfg(feature = "memory-store")]
//! # futures::executor::block_on(async {
//! use fulcrum_security::{MemoryStore, ModelKind, SecurityEntity, SecurityServiceBuilder};
//! let service = SecurityServiceBuilder::new(MemoryStore::new())
//!     .model(ModelKind::Simple)
//!     .build()
//!     .await?;
//! let clint = service.user_manager().add(service.user_manager().instance_named("clint").await?).await?;
//! let dev = service.group_manager().add(service.group_manager().instance_named("dev").await?).await?;
//! let admin = service.role_manager().add(service.role_manager().instance_named("admin").await?).await?;
//! service.model_manager().grant_user_group(&clint, &dev).await?;
//! service.model_manager().grant_group_role(&dev, &admin).await?;
//! let acl = service.access_control_list(&clint).await?;
//! assert!(acl.has_role_in_group("admin", "dev"));
//! # Ok::<(), fulcrum_security::Error>(())
//! # });
//! ```
//!
//! Building from key/value configuration:
//! ```no_run
//! # #[cfg(feature = "memory-store")]
//! # futures::executor::block_on(async {
//! use fulcrum_security::{SecurityConfig, SecurityService};
//! let config = SecurityConfig::from_pairs([("model", "turbine"), ("authenticator", "crypto")])?;
//! let service = SecurityService::from_config(&config).await?;
//! let global = service.model_manager().global_group().await?;
//! # let _ = global;
//! # Ok::<(), fulcrum_security::Error>(())
//! # });
//! ```
#![forbid(unsafe_code)]

mod acl;
mod authenticator;
mod config;
mod domain;
mod entity;
mod error;
mod graph;
mod manager;
mod model;
mod relationship;
mod service;
mod set;
mod store;
mod types;

#[cfg(feature = "memory-store")]
mod memory_store;

pub use crate::acl::AccessControlList;
pub use crate::authenticator::{
    Authenticator, CryptoAuthenticator, NoOpAuthenticator, TextMatchAuthenticator,
};
pub use crate::config::{AuthenticatorKind, DigestAlgorithm, SecurityConfig, StoreKind};
pub use crate::entity::{EntityRecord, Group, Permission, Role, SecurityEntity, User};
pub use crate::error::{Error, Result, StoreError};
pub use crate::manager::{EntityManager, GroupManager, PermissionManager, RoleManager, UserManager};
pub use crate::model::{GLOBAL_GROUP_NAME, ModelManager, RevokeOutcome};
pub use crate::relationship::{Relationship, RelationshipKind, UserGroupRole};
pub use crate::service::{SecurityService, SecurityServiceBuilder};
pub use crate::set::{EntitySet, GroupSet, PermissionSet, RoleSet, UserSet};
pub use crate::store::{EntityLookup, EntityStore, RelationshipStore, Store};
pub use crate::types::{EntityId, EntityKind, ModelKind};

#[cfg(feature = "memory-store")]
pub use crate::memory_store::MemoryStore;
