//! Entity storage.
//!
//! Entities live in a `bevy_ecs` [`World`], which serves as the
//! type-indexed component table: each component kind is a Rust type, and an
//! entity holds at most one value per kind. Every city entity carries its
//! [`EntityId`] and [`GridPosition`] as components. The store keeps an
//! ordered id index next to the world so all listings come back in
//! ascending id order.

use std::any::TypeId;
use std::collections::BTreeMap;

use bevy_ecs::prelude::*;
use bevy_ecs::world::EntityRef;
use city_common::GridPosition;

use crate::components::EntityId;

const FIRST_ENTITY_ID: u64 = 1;

/// Read-only view of one entity.
pub struct EntityView<'w> {
    id: EntityId,
    position: &'w GridPosition,
    entity: EntityRef<'w>,
}

impl<'w> EntityView<'w> {
    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn position(&self) -> &'w GridPosition {
        self.position
    }

    /// Component of kind `T`, if attached.
    pub fn get<T: Component>(&self) -> Option<&'w T> {
        self.entity.get::<T>()
    }

    pub fn has<T: Component>(&self) -> bool {
        self.entity.contains::<T>()
    }
}

/// Owner of every live entity and its components.
pub struct EntityStore {
    world: World,
    index: BTreeMap<EntityId, Entity>,
    next_id: u64,
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityStore {
    pub fn new() -> Self {
        Self {
            world: World::new(),
            index: BTreeMap::new(),
            next_id: FIRST_ENTITY_ID,
        }
    }

    /// Allocates the next id and stores a new entity.
    ///
    /// The id and position are attached by the store. An `EntityId` or
    /// `GridPosition` inside `bundle` is overwritten by them.
    pub(crate) fn spawn(&mut self, position: GridPosition, bundle: impl Bundle) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        let mut entity = self.world.spawn(bundle);
        if entity.contains::<EntityId>() || entity.contains::<GridPosition>() {
            tracing::warn!(entity = %id, "bundle carried an id or position, replaced by the store's");
        }
        entity.insert((id, position));
        self.index.insert(id, entity.id());
        id
    }

    pub(crate) fn despawn(&mut self, id: EntityId) -> bool {
        match self.index.remove(&id) {
            Some(entity) => self.world.despawn(entity),
            None => false,
        }
    }

    /// Drops every entity and restarts id allocation.
    pub(crate) fn clear(&mut self) {
        self.world.clear_entities();
        self.index.clear();
        self.next_id = FIRST_ENTITY_ID;
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn entity(&self, id: EntityId) -> Option<EntityView<'_>> {
        let entity = self.world.get_entity(*self.index.get(&id)?)?;
        let position = entity.get::<GridPosition>()?;
        Some(EntityView { id, position, entity })
    }

    /// Snapshot of every live id, ascending.
    pub fn ids(&self) -> Vec<EntityId> {
        self.index.keys().copied().collect()
    }

    pub fn position(&self, id: EntityId) -> Option<GridPosition> {
        self.component::<GridPosition>(id).copied()
    }

    /// Moves an entity. Spatial indexes holding it must be updated by the caller.
    pub fn set_position(&mut self, id: EntityId, position: GridPosition) -> bool {
        match self.component_mut::<GridPosition>(id) {
            Some(mut current) => {
                *current = position;
                true
            }
            None => false,
        }
    }

    pub fn component<T: Component>(&self, id: EntityId) -> Option<&T> {
        self.world.get::<T>(*self.index.get(&id)?)
    }

    pub fn component_mut<T: Component>(&mut self, id: EntityId) -> Option<Mut<'_, T>> {
        self.world.get_mut::<T>(*self.index.get(&id)?)
    }

    pub fn has_component<T: Component>(&self, id: EntityId) -> bool {
        self.component::<T>(id).is_some()
    }

    /// Attaches `component`, replacing any existing value of the same kind.
    ///
    /// The id and position are structural: inserting either returns `false`.
    /// Move entities with [`set_position`](Self::set_position).
    pub fn insert_component<T: Component>(&mut self, id: EntityId, component: T) -> bool {
        if is_structural::<T>() {
            return false;
        }
        let Some(entity) = self.index.get(&id).copied() else {
            return false;
        };
        self.world.entity_mut(entity).insert(component);
        true
    }

    /// Detaches and returns the component of kind `T`.
    ///
    /// The id and position are structural and cannot be removed.
    pub fn remove_component<T: Component>(&mut self, id: EntityId) -> Option<T> {
        if is_structural::<T>() {
            return None;
        }
        let entity = *self.index.get(&id)?;
        self.world.get_entity_mut(entity)?.take::<T>()
    }

    /// Ids of entities carrying a `T`, ascending.
    pub fn with_component<T: Component>(&self) -> Vec<EntityId> {
        self.index
            .iter()
            .filter(|(_, entity)| self.world.get::<T>(**entity).is_some())
            .map(|(id, _)| *id)
            .collect()
    }

    /// Ids of entities overlapping `area`, by brute-force scan.
    ///
    /// O(n) over all entities; use a `SpatialGrid` for repeated queries.
    pub fn in_area(&self, area: &GridPosition) -> Vec<EntityId> {
        self.index
            .iter()
            .filter(|(_, entity)| {
                self.world
                    .get::<GridPosition>(**entity)
                    .is_some_and(|position| area.overlaps(position))
            })
            .map(|(id, _)| *id)
            .collect()
    }
}

fn is_structural<T: Component>() -> bool {
    let kind = TypeId::of::<T>();
    kind == TypeId::of::<EntityId>() || kind == TypeId::of::<GridPosition>()
}
