use crate::domain::Domain;
use crate::entity::{Group, Permission, Role, SecurityEntity, User};
use crate::error::{Error, Result};
use crate::set::EntitySet;
use crate::store::{EntityLookup, Store};
use crate::types::{EntityId, canonical_name, validate_name};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// CRUD and name-uniqueness rules for one entity kind.
///
/// Every manager of a [`crate::SecurityService`] shares the same store handle
/// and relationship index, so removing an entity here cascades exactly like
/// [`crate::ModelManager::remove_entity`].
pub struct EntityManager<T, S> {
    domain: Arc<Domain<S>>,
    _entity: PhantomData<fn() -> T>,
}

/// Manager for users.
pub type UserManager<S> = EntityManager<User, S>;
/// Manager for groups.
pub type GroupManager<S> = EntityManager<Group, S>;
/// Manager for roles.
pub type RoleManager<S> = EntityManager<Role, S>;
/// Manager for permissions.
pub type PermissionManager<S> = EntityManager<Permission, S>;

impl<T, S> Clone for EntityManager<T, S> {
    fn clone(&self) -> Self {
        Self {
            domain: Arc::clone(&self.domain),
            _entity: PhantomData,
        }
    }
}

impl<T: SecurityEntity, S> fmt::Debug for EntityManager<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityManager")
            .field("kind", &T::KIND)
            .field("model", &self.domain.model)
            .finish()
    }
}

impl<T, S> EntityManager<T, S>
where
    T: SecurityEntity,
    S: Store,
{
    pub(crate) fn new(domain: Arc<Domain<S>>) -> Self {
        Self {
            domain,
            _entity: PhantomData,
        }
    }

    /// Creates a blank transient entity for the active model.
    pub fn instance(&self) -> T {
        T::new(self.domain.model, String::new())
    }

    /// Creates a named transient entity.
    ///
    /// Fails with [`Error::EntityExists`] when the name is already stored.
    pub async fn instance_named(&self, name: &str) -> Result<T> {
        let name = validate_name(name, T::KIND)?;
        if self.check_exists(&name).await? {
            return Err(Error::EntityExists {
                kind: T::KIND,
                name,
            });
        }
        Ok(T::new(self.domain.model, name))
    }

    /// Snapshot of every stored entity of this kind.
    pub async fn all(&self) -> Result<EntitySet<T>> {
        let records = self.domain.store.load_entities(T::KIND).await?;
        let mut set = EntitySet::new();
        for record in records {
            set.add(T::from_record(record)?)?;
        }
        Ok(set)
    }

    /// Case-insensitive existence check by name.
    pub async fn check_exists(&self, name: &str) -> Result<bool> {
        if canonical_name(name).is_empty() {
            return Ok(false);
        }
        Ok(self
            .domain
            .store
            .load_entity(T::KIND, EntityLookup::Name(name.trim().to_string()))
            .await?
            .is_some())
    }

    /// Returns whether the entity is persisted in the store.
    pub async fn contains(&self, entity: &T) -> Result<bool> {
        let Some(id) = entity.id() else {
            return Ok(false);
        };
        Ok(self
            .domain
            .store
            .load_entity(T::KIND, EntityLookup::Id(id))
            .await?
            .is_some())
    }

    /// Loads an entity by case-insensitive name.
    pub async fn by_name(&self, name: &str) -> Result<T> {
        self.domain
            .load(EntityLookup::Name(name.trim().to_string()))
            .await?
            .ok_or_else(|| Error::unknown(T::KIND, name))
    }

    /// Loads an entity by id.
    pub async fn by_id(&self, id: EntityId) -> Result<T> {
        self.domain
            .load(EntityLookup::Id(id))
            .await?
            .ok_or_else(|| Error::unknown(T::KIND, format!("#{id}")))
    }

    /// Persists a transient entity and returns it with its id.
    pub async fn add(&self, entity: T) -> Result<T> {
        self.domain.insert(entity).await
    }

    /// Renames a persisted entity, re-checking name uniqueness.
    pub async fn rename(&self, entity: &T, new_name: &str) -> Result<T> {
        let name = validate_name(new_name, T::KIND)?;
        let _guard = self.domain.graph.lock().await;
        let mut record = self.domain.resolve_record(entity).await?;
        if self.domain.is_global_group(T::KIND, &record.name) {
            return Err(Error::GlobalGroupProtected);
        }
        if let Some(existing) = self
            .domain
            .store
            .load_entity(T::KIND, EntityLookup::Name(name.clone()))
            .await?
            && existing.id != record.id
        {
            return Err(Error::EntityExists {
                kind: T::KIND,
                name,
            });
        }
        tracing::info!(kind = %T::KIND, from = %record.name, to = %name, "entity renamed");
        record.name = name;
        self.domain.store.save_entity(record.clone()).await?;
        T::from_record(record)
    }

    /// Deletes the entity after stripping every relationship referencing it.
    pub async fn remove(&self, entity: &T) -> Result<()> {
        self.domain.remove_entity(entity, true).await.map(|_| ())
    }
}

impl<S: Store> EntityManager<User, S> {
    /// Stores an already encoded password for the user.
    pub async fn set_password(&self, user: &User, encoded: impl Into<String>) -> Result<User> {
        let _guard = self.domain.graph.lock().await;
        let mut record = self.domain.resolve_record(user).await?;
        record.password = Some(encoded.into());
        self.domain.store.save_entity(record.clone()).await?;
        tracing::debug!(user = %record.name, "password updated");
        User::from_record(record)
    }
}
