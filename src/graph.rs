use crate::relationship::{Relationship, RelationshipKind};
use crate::types::{EntityId, EntityKind};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

/// In-memory mirror of the persisted relationship edges, indexed by endpoint.
#[derive(Debug, Default)]
pub(crate) struct RelationshipGraph {
    edges: HashSet<Relationship>,
    index: HashMap<(EntityKind, EntityId), BTreeSet<Relationship>>,
}

impl RelationshipGraph {
    pub(crate) fn contains(&self, edge: &Relationship) -> bool {
        self.edges.contains(edge)
    }

    pub(crate) fn insert(&mut self, edge: Relationship) -> bool {
        if !self.edges.insert(edge) {
            return false;
        }
        for endpoint in edge.endpoints() {
            self.index.entry(endpoint).or_default().insert(edge);
        }
        true
    }

    pub(crate) fn remove(&mut self, edge: &Relationship) -> bool {
        if !self.edges.remove(edge) {
            return false;
        }
        for endpoint in edge.endpoints() {
            if let Some(bucket) = self.index.get_mut(&endpoint) {
                bucket.remove(edge);
                if bucket.is_empty() {
                    self.index.remove(&endpoint);
                }
            }
        }
        true
    }

    /// Every edge referencing the entity, in stable order.
    pub(crate) fn touching(&self, kind: EntityKind, id: EntityId) -> Vec<Relationship> {
        self.index
            .get(&(kind, id))
            .map(|bucket| bucket.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Edges of one kind referencing the entity.
    pub(crate) fn touching_of(
        &self,
        kind: EntityKind,
        id: EntityId,
        relationship: RelationshipKind,
    ) -> impl Iterator<Item = &Relationship> + '_ {
        self.index
            .get(&(kind, id))
            .into_iter()
            .flatten()
            .filter(move |edge| edge.kind() == relationship)
    }

    /// Whether `to` is reachable from `from` along delegation edges.
    pub(crate) fn delegation_reaches(&self, from: EntityId, to: EntityId) -> bool {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([from]);
        while let Some(current) = queue.pop_front() {
            if current == to {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            for edge in self.touching_of(EntityKind::User, current, RelationshipKind::UserDelegate)
            {
                if let Relationship::UserDelegate {
                    delegator,
                    delegatee,
                } = *edge
                    && delegator == current
                {
                    queue.push_back(delegatee);
                }
            }
        }
        false
    }

    /// Every user that delegates to `to`, directly or transitively.
    pub(crate) fn delegators_of(&self, to: EntityId) -> BTreeSet<EntityId> {
        let mut found = BTreeSet::new();
        let mut queue = VecDeque::from([to]);
        while let Some(current) = queue.pop_front() {
            for edge in self.touching_of(EntityKind::User, current, RelationshipKind::UserDelegate)
            {
                if let Relationship::UserDelegate {
                    delegator,
                    delegatee,
                } = *edge
                    && delegatee == current
                    && delegator != to
                    && found.insert(delegator)
                {
                    queue.push_back(delegator);
                }
            }
        }
        found
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.edges.len()
    }
}
