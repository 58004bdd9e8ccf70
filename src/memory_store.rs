use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock};
use async_trait::async_trait;
use crate::entity::EntityRecord;
use crate::relationship::{Relationship, RelationshipKind};
use crate::store::{EntityLookup, EntityStore, RelationshipStore};
use crate::types::{EntityId, EntityKind, canonical_name};

/// In-memory store implementation for tests and demos.
///
/// Nothing survives the process. Names are unique per kind,
/// case-insensitively, mirroring the unique index a relational store carries.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    next_id: AtomicI64,
    entities: RwLock<HashMap<EntityKind, BTreeMap<EntityId, EntityRecord>>>,
    relationships: RwLock<HashSet<Relationship>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            inner: Arc::new(Inner {
                next_id: AtomicI64::new(1),
                entities: RwLock::new(HashMap::new()),
                relationships: RwLock::new(HashSet::new()),
            }),
        }
    }
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored entities of a kind.
    pub fn entity_count(&self, kind: EntityKind) -> usize {
        let guard = self.inner.entities.read().expect("poisoned lock");
        guard.get(&kind).map(BTreeMap::len).unwrap_or(0)
    }

    /// Returns the number of stored edges.
    pub fn relationship_count(&self) -> usize {
        let guard = self.inner.relationships.read().expect("poisoned lock");
        guard.len()
    }

    /// Returns whether an edge is stored.
    pub fn contains_relationship(&self, relationship: &Relationship) -> bool {
        let guard = self.inner.relationships.read().expect("poisoned lock");
        guard.contains(relationship)
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn load_entity(
        &self,
        kind: EntityKind,
        lookup: EntityLookup,
    ) -> std::result::Result<Option<EntityRecord>, crate::StoreError> {
        let guard = self.inner.entities.read().expect("poisoned lock");
        let Some(rows) = guard.get(&kind) else {
            return Ok(None);
        };
        Ok(match lookup {
            EntityLookup::Id(id) => rows.get(&id).cloned(),
            EntityLookup::Name(name) => {
                let wanted = canonical_name(&name);
                rows.values()
                    .find(|row| canonical_name(&row.name) == wanted)
                    .cloned()
            }
        })
    }

    async fn load_entities(
        &self,
        kind: EntityKind,
    ) -> std::result::Result<Vec<EntityRecord>, crate::StoreError> {
        let guard = self.inner.entities.read().expect("poisoned lock");
        Ok(guard
            .get(&kind)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn save_entity(
        &self,
        mut record: EntityRecord,
    ) -> std::result::Result<EntityId, crate::StoreError> {
        let mut guard = self.inner.entities.write().expect("poisoned lock");
        let rows = guard.entry(record.kind).or_default();
        let wanted = canonical_name(&record.name);
        if rows
            .values()
            .any(|row| row.id != record.id && canonical_name(&row.name) == wanted)
        {
            return Err(format!(
                "unique constraint violated: {} name '{}'",
                record.kind, record.name
            )
            .into());
        }
        let id = match record.id {
            Some(id) if rows.contains_key(&id) => id,
            Some(id) => return Err(format!("no {} row with id {id}", record.kind).into()),
            None => EntityId::new(self.inner.next_id.fetch_add(1, Ordering::Relaxed)),
        };
        record.id = Some(id);
        rows.insert(id, record);
        Ok(id)
    }

    async fn delete_entity(
        &self,
        kind: EntityKind,
        id: EntityId,
    ) -> std::result::Result<(), crate::StoreError> {
        let mut guard = self.inner.entities.write().expect("poisoned lock");
        if let Some(rows) = guard.get_mut(&kind) {
            rows.remove(&id);
        }
        Ok(())
    }
}

#[async_trait]
impl RelationshipStore for MemoryStore {
    async fn load_relationships(
        &self,
        kind: RelationshipKind,
        entity_kind: EntityKind,
        id: EntityId,
    ) -> std::result::Result<Vec<Relationship>, crate::StoreError> {
        let guard = self.inner.relationships.read().expect("poisoned lock");
        let mut edges: Vec<Relationship> = guard
            .iter()
            .filter(|edge| edge.kind() == kind && edge.involves(entity_kind, id))
            .copied()
            .collect();
        edges.sort();
        Ok(edges)
    }

    async fn save_relationship(
        &self,
        relationship: Relationship,
    ) -> std::result::Result<(), crate::StoreError> {
        let mut guard = self.inner.relationships.write().expect("poisoned lock");
        guard.insert(relationship);
        Ok(())
    }

    async fn delete_relationship(
        &self,
        relationship: Relationship,
    ) -> std::result::Result<(), crate::StoreError> {
        let mut guard = self.inner.relationships.write().expect("poisoned lock");
        guard.remove(&relationship);
        Ok(())
    }
}
