use crate::entity::EntityRecord;
use crate::error::StoreError;
use crate::relationship::{Relationship, RelationshipKind};
use crate::types::{EntityId, EntityKind};
use async_trait::async_trait;

/// Key used to load a single entity.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum EntityLookup {
    /// Exact id match.
    Id(EntityId),
    /// Case-insensitive name match.
    Name(String),
}

/// Store interface for entity rows.
#[async_trait]
pub trait EntityStore {
    /// Loads one entity by id or case-insensitive name.
    async fn load_entity(
        &self,
        kind: EntityKind,
        lookup: EntityLookup,
    ) -> std::result::Result<Option<EntityRecord>, StoreError>;

    /// Loads every entity of a kind.
    async fn load_entities(
        &self,
        kind: EntityKind,
    ) -> std::result::Result<Vec<EntityRecord>, StoreError>;

    /// Inserts a transient row or updates a persisted one; returns its id.
    async fn save_entity(&self, record: EntityRecord)
    -> std::result::Result<EntityId, StoreError>;

    /// Deletes an entity row.
    async fn delete_entity(
        &self,
        kind: EntityKind,
        id: EntityId,
    ) -> std::result::Result<(), StoreError>;
}

/// Store interface for relationship edges.
#[async_trait]
pub trait RelationshipStore {
    /// Returns edges of `kind` that reference the entity on any side.
    async fn load_relationships(
        &self,
        kind: RelationshipKind,
        entity_kind: EntityKind,
        id: EntityId,
    ) -> std::result::Result<Vec<Relationship>, StoreError>;

    /// Persists an edge.
    async fn save_relationship(
        &self,
        relationship: Relationship,
    ) -> std::result::Result<(), StoreError>;

    /// Deletes an edge.
    async fn delete_relationship(
        &self,
        relationship: Relationship,
    ) -> std::result::Result<(), StoreError>;
}

/// Composite store trait.
pub trait Store: EntityStore + RelationshipStore + Send + Sync {}

impl<T> Store for T where T: EntityStore + RelationshipStore + Send + Sync {}
