use crate::entity::{Group, Permission, Role, SecurityEntity, User};
use crate::error::{Error, Result};
use crate::types::{EntityId, canonical_name};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Name-ordered set of security entities.
///
/// Elements are unique by identity and by case-insensitive name. Lookups by
/// name fold case; stored names are kept as entered. The set is a plain
/// value: share it across threads behind your own lock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntitySet<T> {
    by_name: BTreeMap<String, T>,
    ids: HashMap<EntityId, String>,
}

/// Set of users.
pub type UserSet = EntitySet<User>;
/// Set of groups.
pub type GroupSet = EntitySet<Group>;
/// Set of roles.
pub type RoleSet = EntitySet<Role>;
/// Set of permissions.
pub type PermissionSet = EntitySet<Permission>;

impl<T> Default for EntitySet<T> {
    fn default() -> Self {
        Self {
            by_name: BTreeMap::new(),
            ids: HashMap::new(),
        }
    }
}

impl<T: SecurityEntity> EntitySet<T> {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set, failing on the first name collision.
    pub fn try_from_iter(entities: impl IntoIterator<Item = T>) -> Result<Self> {
        let mut set = Self::new();
        for entity in entities {
            set.add(entity)?;
        }
        Ok(set)
    }

    /// Adds an entity; returns whether the set changed.
    ///
    /// Fails with [`Error::DuplicateName`] when a different entity already
    /// owns the same case-insensitive name.
    pub fn add(&mut self, entity: T) -> Result<bool> {
        let key = entity.canonical_name();
        if let Some(existing) = self.by_name.get(&key) {
            if *existing == entity {
                return Ok(false);
            }
            return Err(Error::DuplicateName {
                kind: T::KIND,
                name: entity.name().to_string(),
            });
        }
        if let Some(id) = entity.id() {
            if self.ids.contains_key(&id) {
                return Ok(false);
            }
            self.ids.insert(id, key.clone());
        }
        self.by_name.insert(key, entity);
        Ok(true)
    }

    /// Adds every entity or none of them.
    pub fn add_all(&mut self, entities: impl IntoIterator<Item = T>) -> Result<bool> {
        let mut staged = self.clone();
        let mut changed = false;
        for entity in entities {
            changed |= staged.add(entity)?;
        }
        *self = staged;
        Ok(changed)
    }

    /// Removes the element with the same identity.
    pub fn remove(&mut self, entity: &T) -> bool {
        let key = match entity.id() {
            Some(id) => match self.ids.remove(&id) {
                Some(key) => key,
                None => return false,
            },
            None => {
                let key = entity.canonical_name();
                match self.by_name.get(&key) {
                    Some(existing) if existing == entity => key,
                    _ => return false,
                }
            }
        };
        self.by_name.remove(&key).is_some()
    }

    /// Removes every listed entity; returns whether anything was removed.
    pub fn remove_all<'a>(&mut self, entities: impl IntoIterator<Item = &'a T>) -> bool {
        let mut changed = false;
        for entity in entities {
            changed |= self.remove(entity);
        }
        changed
    }

    /// Identity check.
    pub fn contains(&self, entity: &T) -> bool {
        match entity.id() {
            Some(id) => self.ids.contains_key(&id),
            None => self
                .by_name
                .get(&entity.canonical_name())
                .is_some_and(|existing| existing == entity),
        }
    }

    /// Returns whether every listed entity is present.
    pub fn contains_all<'a>(&self, entities: impl IntoIterator<Item = &'a T>) -> bool {
        entities.into_iter().all(|entity| self.contains(entity))
    }

    /// Case-insensitive name check; an empty name is never contained.
    pub fn contains_name(&self, name: &str) -> bool {
        let key = canonical_name(name);
        !key.is_empty() && self.by_name.contains_key(&key)
    }

    /// Returns whether an element carries the id.
    pub fn contains_id(&self, id: EntityId) -> bool {
        self.ids.contains_key(&id)
    }

    /// Case-insensitive lookup.
    pub fn get_by_name(&self, name: &str) -> Option<&T> {
        self.by_name.get(&canonical_name(name))
    }

    /// Lookup by id.
    pub fn get_by_id(&self, id: EntityId) -> Option<&T> {
        self.ids.get(&id).and_then(|key| self.by_name.get(key))
    }

    /// Names as entered, in set order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.values().map(|entity| entity.name())
    }

    /// Ids of persisted elements, in set order.
    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.by_name.values().filter_map(|entity| entity.id())
    }

    /// Elements in set order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.by_name.values()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_name.clear();
        self.ids.clear();
    }
}

impl<T> IntoIterator for EntitySet<T> {
    type Item = T;
    type IntoIter = std::collections::btree_map::IntoValues<String, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.by_name.into_values()
    }
}

impl<'a, T> IntoIterator for &'a EntitySet<T> {
    type Item = &'a T;
    type IntoIter = std::collections::btree_map::Values<'a, String, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.by_name.values()
    }
}

impl<T: SecurityEntity> fmt::Display for EntitySet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for entity in self.by_name.values() {
            if !first {
                f.write_str(", ")?;
            }
            f.write_str(entity.name())?;
            first = false;
        }
        Ok(())
    }
}
