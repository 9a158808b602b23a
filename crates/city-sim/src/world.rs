//! The city simulation container.
//!
//! [`CityWorld`] ties the entity store to the system scheduler: it is the
//! only path for creating and removing entities, so every registered system
//! hears about both, and it drives ticks.

use bevy_ecs::prelude::{Bundle, Component};
use city_common::{GridPosition, Result};

use crate::components::EntityId;
use crate::scheduler::{Cadence, Scheduler, System};
use crate::store::{EntityStore, EntityView};

/// Entity store plus ordered systems.
#[derive(Default)]
pub struct CityWorld {
    store: EntityStore,
    scheduler: Scheduler,
}

impl CityWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a system that runs on every tick, after those already present.
    pub fn add_system(&mut self, system: impl System) -> Result<()> {
        self.scheduler.register(Box::new(system), None)
    }

    /// Registers a system that runs once at least `interval` simulated
    /// seconds have passed since it last ran.
    pub fn add_system_every(&mut self, system: impl System, interval: f64) -> Result<()> {
        self.scheduler
            .register(Box::new(system), Some(Cadence::every(interval)))
    }

    pub fn remove_system(&mut self, name: &str) -> bool {
        self.scheduler.remove(name)
    }

    pub fn system<T: System>(&self, name: &str) -> Option<&T> {
        self.scheduler.get(name)
    }

    pub fn system_mut<T: System>(&mut self, name: &str) -> Option<&mut T> {
        self.scheduler.get_mut(name)
    }

    pub fn system_names(&self) -> Vec<&str> {
        self.scheduler.names()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Creates an entity with no components.
    pub fn create_entity(&mut self, position: GridPosition) -> EntityId {
        self.create_entity_with(position, ())
    }

    /// Creates an entity with `components` already attached when systems
    /// are notified.
    pub fn create_entity_with(&mut self, position: GridPosition, components: impl Bundle) -> EntityId {
        let id = self.store.spawn(position, components);
        if let Some(view) = self.store.entity(id) {
            self.scheduler.notify_added(&view);
        }
        tracing::trace!(entity = %id, x = position.x, y = position.y, "entity created");
        id
    }

    /// Notifies every system, then deletes the entity.
    /// Returns `false` for an unknown id.
    pub fn remove_entity(&mut self, id: EntityId) -> bool {
        let Some(view) = self.store.entity(id) else {
            return false;
        };
        self.scheduler.notify_removed(&view);
        let removed = self.store.despawn(id);
        tracing::trace!(entity = %id, "entity removed");
        removed
    }

    pub fn entity(&self, id: EntityId) -> Option<EntityView<'_>> {
        self.store.entity(id)
    }

    /// Snapshot of every live entity id, ascending.
    pub fn all_entities(&self) -> Vec<EntityId> {
        self.store.ids()
    }

    pub fn entities_with_component<T: Component>(&self) -> Vec<EntityId> {
        self.store.with_component::<T>()
    }

    /// Brute-force overlap scan over all entities.
    pub fn entities_in_area(&self, area: &GridPosition) -> Vec<EntityId> {
        self.store.in_area(area)
    }

    pub fn entity_count(&self) -> usize {
        self.store.len()
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    /// Mutable component access between ticks.
    pub fn store_mut(&mut self) -> &mut EntityStore {
        &mut self.store
    }

    /// Advances the simulation by one tick of `delta_time` seconds.
    pub fn update(&mut self, delta_time: f64) {
        self.scheduler.run(delta_time, &mut self.store);
    }

    /// Removes every entity (notifying systems) and restarts id allocation.
    pub fn clear(&mut self) {
        for id in self.store.ids() {
            if let Some(view) = self.store.entity(id) {
                self.scheduler.notify_removed(&view);
            }
        }
        let count = self.store.len();
        self.store.clear();
        tracing::debug!(count, "world cleared");
    }
}
