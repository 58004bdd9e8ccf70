use crate::entity::{EntityRecord, SecurityEntity};
use crate::error::{Error, Result};
use crate::graph::RelationshipGraph;
use crate::model::GLOBAL_GROUP_NAME;
use crate::relationship::{Relationship, RelationshipKind, require_id};
use crate::set::EntitySet;
use crate::store::{EntityLookup, Store};
use crate::types::{EntityId, EntityKind, ModelKind, canonical_name, validate_name};
use futures::lock::Mutex;

/// State shared by the entity managers and the model manager of one
/// security domain.
///
/// The graph mutex doubles as the domain write lock: every mutation holds it
/// from entity resolution until the store has acknowledged the change.
#[derive(Debug)]
pub(crate) struct Domain<S> {
    pub(crate) store: S,
    pub(crate) model: ModelKind,
    pub(crate) graph: Mutex<RelationshipGraph>,
}

impl<S: Store> Domain<S> {
    /// Builds the domain and mirrors every stored edge the topology allows.
    pub(crate) async fn hydrate(store: S, model: ModelKind) -> Result<Self> {
        let mut graph = RelationshipGraph::default();
        for kind in RelationshipKind::ALL
            .iter()
            .copied()
            .filter(|kind| model.supports(*kind))
        {
            let owners = store.load_entities(kind.owner()).await?;
            for owner in owners {
                let Some(id) = owner.id else {
                    continue;
                };
                for edge in store.load_relationships(kind, kind.owner(), id).await? {
                    graph.insert(edge);
                }
            }
        }
        Ok(Self {
            store,
            model,
            graph: Mutex::new(graph),
        })
    }

    pub(crate) fn check_model<T: SecurityEntity>(&self, entity: &T) -> Result<()> {
        if entity.model() != self.model {
            return Err(Error::ModelMismatch {
                kind: T::KIND,
                expected: self.model,
                found: entity.model(),
            });
        }
        Ok(())
    }

    pub(crate) fn is_global_group(&self, kind: EntityKind, name: &str) -> bool {
        self.model == ModelKind::Turbine
            && kind == EntityKind::Group
            && canonical_name(name) == GLOBAL_GROUP_NAME
    }

    /// Returns the id of an entity that is persisted in this domain.
    pub(crate) async fn resolve<T: SecurityEntity>(&self, entity: &T) -> Result<EntityId> {
        self.resolve_record(entity).await?;
        require_id(entity)
    }

    /// Returns the stored row of an entity that is persisted in this domain.
    pub(crate) async fn resolve_record<T: SecurityEntity>(
        &self,
        entity: &T,
    ) -> Result<EntityRecord> {
        self.check_model(entity)?;
        let id = require_id(entity)?;
        let mut record = self
            .store
            .load_entity(T::KIND, EntityLookup::Id(id))
            .await?
            .ok_or_else(|| Error::unknown(T::KIND, entity.name()))?;
        record.id = Some(id);
        Ok(record)
    }

    pub(crate) async fn load<T: SecurityEntity>(&self, lookup: EntityLookup) -> Result<Option<T>> {
        self.store
            .load_entity(T::KIND, lookup)
            .await?
            .map(T::from_record)
            .transpose()
    }

    /// Loads a set of entities by id, skipping rows that vanished.
    pub(crate) async fn load_set<T: SecurityEntity>(
        &self,
        ids: impl IntoIterator<Item = EntityId>,
    ) -> Result<EntitySet<T>> {
        let mut set = EntitySet::new();
        for id in ids {
            match self.load::<T>(EntityLookup::Id(id)).await? {
                Some(entity) => {
                    set.add(entity)?;
                }
                None => tracing::warn!(kind = %T::KIND, %id, "related entity missing from store"),
            }
        }
        Ok(set)
    }

    /// Validates and persists a transient entity under the domain lock.
    pub(crate) async fn insert<T: SecurityEntity>(&self, entity: T) -> Result<T> {
        self.check_model(&entity)?;
        if entity.is_persisted() {
            return Err(Error::AlreadyPersisted {
                kind: T::KIND,
                name: entity.name().to_string(),
            });
        }
        let name = validate_name(entity.name(), T::KIND)?;

        let _guard = self.graph.lock().await;
        if self
            .store
            .load_entity(T::KIND, EntityLookup::Name(name.clone()))
            .await?
            .is_some()
        {
            return Err(Error::EntityExists {
                kind: T::KIND,
                name,
            });
        }

        let mut record = entity.to_record();
        record.name = name;
        let id = self.store.save_entity(record.clone()).await?;
        record.id = Some(id);
        tracing::info!(kind = %T::KIND, %id, name = %record.name, "entity added");
        T::from_record(record)
    }

    /// Detaches an entity from every relationship, then deletes it when
    /// `delete` is set. Returns the number of edges removed.
    pub(crate) async fn remove_entity<T: SecurityEntity>(
        &self,
        entity: &T,
        delete: bool,
    ) -> Result<usize> {
        let mut graph = self.graph.lock().await;
        let record = self.resolve_record(entity).await?;
        if delete && self.is_global_group(T::KIND, &record.name) {
            return Err(Error::GlobalGroupProtected);
        }
        let id = require_id(entity)?;
        let removed = self.detach(&mut graph, T::KIND, id, delete).await?;
        if delete {
            tracing::info!(kind = %T::KIND, %id, edges = removed, "entity removed");
        } else {
            tracing::info!(kind = %T::KIND, %id, edges = removed, "relationships revoked");
        }
        Ok(removed)
    }

    /// Removes every edge referencing the entity and, when `delete` is set,
    /// the entity itself. The caller holds the graph lock.
    ///
    /// Store deletions happen first; the graph is only touched once every
    /// store call succeeded. On failure the deleted edges are re-saved.
    pub(crate) async fn detach(
        &self,
        graph: &mut RelationshipGraph,
        kind: EntityKind,
        id: EntityId,
        delete: bool,
    ) -> Result<usize> {
        let edges = graph.touching(kind, id);
        let mut deleted = Vec::with_capacity(edges.len());
        for edge in &edges {
            if let Err(error) = self.store.delete_relationship(*edge).await {
                self.restore(&deleted).await;
                return Err(Error::DataBackend(error));
            }
            deleted.push(*edge);
        }
        if delete && let Err(error) = self.store.delete_entity(kind, id).await {
            self.restore(&deleted).await;
            return Err(Error::DataBackend(error));
        }
        for edge in &edges {
            graph.remove(edge);
        }
        Ok(edges.len())
    }

    async fn restore(&self, edges: &[Relationship]) {
        for edge in edges {
            tracing::warn!(relationship = %edge.kind(), "restoring relationship after failed cascade");
            if let Err(error) = self.store.save_relationship(*edge).await {
                tracing::warn!(
                    relationship = %edge.kind(),
                    %error,
                    "failed to restore relationship"
                );
            }
        }
    }
}
