use crate::acl::AccessControlList;
use crate::authenticator::{self, Authenticator, TextMatchAuthenticator};
use crate::config::SecurityConfig;
use crate::domain::Domain;
use crate::entity::{SecurityEntity, User};
use crate::error::{Error, Result};
use crate::manager::{EntityManager, GroupManager, PermissionManager, RoleManager, UserManager};
use crate::model::ModelManager;
use crate::relationship::require_id;
use crate::store::Store;
use crate::types::ModelKind;
use std::fmt;
use std::sync::Arc;

/// Builder for [`SecurityService`].
pub struct SecurityServiceBuilder<S> {
    store: S,
    model: ModelKind,
    authenticator: Arc<dyn Authenticator>,
}

impl<S> SecurityServiceBuilder<S> {
    /// Creates a builder for the dynamic model with text-match passwords.
    pub fn new(store: S) -> Self {
        Self {
            store,
            model: ModelKind::Dynamic,
            authenticator: Arc::new(TextMatchAuthenticator),
        }
    }

    /// Sets the relationship topology.
    pub fn model(mut self, model: ModelKind) -> Self {
        self.model = model;
        self
    }

    /// Sets the password check strategy.
    pub fn authenticator(mut self, authenticator: impl Authenticator + 'static) -> Self {
        self.authenticator = Arc::new(authenticator);
        self
    }

    /// Applies the model and authenticator named by a config.
    pub fn config(mut self, config: &SecurityConfig) -> Self {
        self.model = config.model;
        self.authenticator = authenticator::from_kind(config.authenticator, config.algorithm);
        self
    }
}

impl<S: Store> SecurityServiceBuilder<S> {
    /// Builds the service, loading every stored relationship the model
    /// allows into memory.
    pub async fn build(self) -> Result<SecurityService<S>> {
        let domain = Arc::new(Domain::hydrate(self.store, self.model).await?);
        tracing::info!(model = %self.model, "security service ready");
        Ok(SecurityService {
            users: EntityManager::new(Arc::clone(&domain)),
            groups: EntityManager::new(Arc::clone(&domain)),
            roles: EntityManager::new(Arc::clone(&domain)),
            permissions: EntityManager::new(Arc::clone(&domain)),
            model: ModelManager::new(Arc::clone(&domain)),
            domain,
            authenticator: self.authenticator,
        })
    }
}

/// Entry point to one security domain.
///
/// Owns the backing store handle, the four entity managers, the model
/// manager and the authenticator. All managers share one relationship index
/// and one write lock.
pub struct SecurityService<S> {
    domain: Arc<Domain<S>>,
    users: UserManager<S>,
    groups: GroupManager<S>,
    roles: RoleManager<S>,
    permissions: PermissionManager<S>,
    model: ModelManager<S>,
    authenticator: Arc<dyn Authenticator>,
}

impl<S> fmt::Debug for SecurityService<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityService")
            .field("model", &self.domain.model)
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "memory-store")]
impl SecurityService<crate::memory_store::MemoryStore> {
    /// Builds a service on a fresh store as described by the config.
    pub async fn from_config(config: &SecurityConfig) -> Result<Self> {
        let store = match config.store {
            crate::config::StoreKind::Memory => crate::memory_store::MemoryStore::new(),
        };
        SecurityServiceBuilder::new(store).config(config).build().await
    }
}

impl<S: Store> SecurityService<S> {
    pub fn user_manager(&self) -> &UserManager<S> {
        &self.users
    }

    pub fn group_manager(&self) -> &GroupManager<S> {
        &self.groups
    }

    pub fn role_manager(&self) -> &RoleManager<S> {
        &self.roles
    }

    pub fn permission_manager(&self) -> &PermissionManager<S> {
        &self.permissions
    }

    pub fn model_manager(&self) -> &ModelManager<S> {
        &self.model
    }

    /// Returns the backing store.
    pub fn store(&self) -> &S {
        &self.domain.store
    }

    pub fn model(&self) -> ModelKind {
        self.domain.model
    }

    pub fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }

    /// Checks a password for the named user.
    ///
    /// Fails with [`Error::UnknownEntity`] when no such user exists.
    pub async fn authenticate(&self, name: &str, password: &str) -> Result<bool> {
        let user = self.users.by_name(name).await?;
        let accepted = self.authenticator.authenticate(Some(&user), password);
        if !accepted {
            tracing::debug!(user = %user.name(), "authentication rejected");
        }
        Ok(accepted)
    }

    /// Encodes and stores a new password without checking the old one.
    pub async fn force_password(&self, user: &User, password: &str) -> Result<User> {
        let encoded = self.authenticator.encode(password);
        self.users.set_password(user, encoded).await
    }

    /// Replaces the password after checking the current one.
    pub async fn change_password(
        &self,
        user: &User,
        old_password: &str,
        new_password: &str,
    ) -> Result<User> {
        let stored = self.users.by_id(require_id(user)?).await?;
        if !self.authenticator.authenticate(Some(&stored), old_password) {
            return Err(Error::PasswordMismatch(stored.name().to_string()));
        }
        self.force_password(&stored, new_password).await
    }

    /// Shortcut for [`ModelManager::access_control_list`].
    pub async fn access_control_list(&self, user: &User) -> Result<AccessControlList> {
        self.model.access_control_list(user).await
    }
}
