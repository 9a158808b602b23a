//! System contract and the ordered system registry.
//!
//! A tick hands every registered [`System`] the same entity snapshot, one
//! after another, in registration order. A system therefore sees component
//! changes made earlier in the same tick by systems registered before it,
//! and only last tick's values from systems registered after it.
//!
//! Systems that should not run every tick are registered with a cadence.
//! The scheduler, not the system, tracks when a cadenced system last fired.

use std::any::Any;

use city_common::{CityError, Result};

use crate::components::EntityId;
use crate::store::{EntityStore, EntityView};

/// Tolerance for accumulated floating-point tick lengths.
const CADENCE_EPSILON: f64 = 1e-9;

/// Downcasting support for registered systems.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A unit of per-tick simulation logic.
///
/// Systems may mutate components and positions of the entities they are
/// given. Entities can be created or removed only between ticks, through
/// `CityWorld`; a snapshot id whose entity has gone simply resolves to
/// `None` in the store.
pub trait System: AsAny + 'static {
    /// Unique name within a scheduler.
    fn name(&self) -> &str;

    /// Advance by `delta_time` seconds over the tick's entity snapshot.
    fn update(&mut self, delta_time: f64, entities: &[EntityId], store: &mut EntityStore);

    /// Called after an entity is created, in registration order.
    fn on_entity_added(&mut self, _entity: &EntityView<'_>) {}

    /// Called before an entity is deleted, while it is still readable.
    fn on_entity_removed(&mut self, _entity: &EntityView<'_>) {}
}

/// Firing schedule of a system that runs less often than every tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cadence {
    /// Seconds between firings.
    pub interval: f64,
    /// Scheduler clock value at the last firing.
    pub last_fired: f64,
}

impl Cadence {
    pub fn every(interval: f64) -> Self {
        Self {
            interval,
            last_fired: 0.0,
        }
    }

    /// Elapsed time since the last firing, if the interval has been reached.
    fn due(&self, now: f64) -> Option<f64> {
        let elapsed = now - self.last_fired;
        (elapsed + CADENCE_EPSILON >= self.interval).then_some(elapsed)
    }
}

struct Registered {
    system: Box<dyn System>,
    cadence: Option<Cadence>,
}

/// Ordered list of systems plus the simulated clock driving them.
#[derive(Default)]
pub struct Scheduler {
    systems: Vec<Registered>,
    /// Total simulated seconds advanced so far.
    clock: f64,
    ticks: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a system. `cadence` of `None` means every tick.
    ///
    /// A cadence interval must be a positive, finite number of seconds.
    pub fn register(&mut self, system: Box<dyn System>, cadence: Option<Cadence>) -> Result<()> {
        let name = system.name().to_string();
        if let Some(Cadence { interval, .. }) = cadence {
            if !interval.is_finite() || interval <= 0.0 {
                return Err(CityError::Config(format!(
                    "interval of system {name} must be a positive number, got {interval}"
                )));
            }
        }
        if self.systems.iter().any(|r| r.system.name() == name) {
            return Err(CityError::DuplicateSystem(name));
        }
        let cadence = cadence.map(|c| Cadence {
            last_fired: self.clock,
            ..c
        });
        tracing::debug!(system = %name, interval = ?cadence.map(|c| c.interval), "system registered");
        self.systems.push(Registered { system, cadence });
        Ok(())
    }

    /// Unregisters by name. Returns `false` if no such system exists.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.systems.len();
        self.systems.retain(|r| r.system.name() != name);
        let removed = self.systems.len() != before;
        if removed {
            tracing::debug!(system = %name, "system removed");
        }
        removed
    }

    /// Names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.systems.iter().map(|r| r.system.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    /// Typed access to a registered system.
    pub fn get<T: System>(&self, name: &str) -> Option<&T> {
        self.systems
            .iter()
            .find(|r| r.system.name() == name)
            .and_then(|r| r.system.as_ref().as_any().downcast_ref::<T>())
    }

    pub fn get_mut<T: System>(&mut self, name: &str) -> Option<&mut T> {
        self.systems
            .iter_mut()
            .find(|r| r.system.name() == name)
            .and_then(|r| r.system.as_mut().as_any_mut().downcast_mut::<T>())
    }

    pub fn cadence(&self, name: &str) -> Option<Cadence> {
        self.systems
            .iter()
            .find(|r| r.system.name() == name)
            .and_then(|r| r.cadence)
    }

    pub(crate) fn notify_added(&mut self, entity: &EntityView<'_>) {
        for registered in &mut self.systems {
            registered.system.on_entity_added(entity);
        }
    }

    pub(crate) fn notify_removed(&mut self, entity: &EntityView<'_>) {
        for registered in &mut self.systems {
            registered.system.on_entity_removed(entity);
        }
    }

    /// Runs one tick: a single snapshot, then every due system in order.
    pub fn run(&mut self, delta_time: f64, store: &mut EntityStore) {
        self.clock += delta_time;
        self.ticks += 1;
        let snapshot = store.ids();

        for registered in &mut self.systems {
            let elapsed = match registered.cadence.as_mut() {
                None => delta_time,
                Some(cadence) => match cadence.due(self.clock) {
                    Some(elapsed) => {
                        cadence.last_fired = self.clock;
                        elapsed
                    }
                    None => continue,
                },
            };
            registered.system.update(elapsed, &snapshot, store);
        }
    }

    /// Simulated seconds since creation.
    pub fn clock(&self) -> f64 {
        self.clock
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use city_common::GridPosition;

    /// Records every delta it is updated with.
    struct Recorder {
        name: &'static str,
        deltas: Vec<f64>,
        added: Vec<EntityId>,
    }

    impl Recorder {
        fn new(name: &'static str) -> Self {
            Self { name, deltas: Vec::new(), added: Vec::new() }
        }
    }

    impl System for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn update(&mut self, delta_time: f64, _entities: &[EntityId], _store: &mut EntityStore) {
            self.deltas.push(delta_time);
        }

        fn on_entity_added(&mut self, entity: &EntityView<'_>) {
            self.added.push(entity.id());
        }
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut scheduler = Scheduler::new();
        scheduler.register(Box::new(Recorder::new("recorder")), None).unwrap();
        let err = scheduler.register(Box::new(Recorder::new("recorder")), None).unwrap_err();
        assert_eq!(err, CityError::DuplicateSystem("recorder".to_string()));
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn cadenced_system_fires_with_accumulated_time() {
        let mut scheduler = Scheduler::new();
        let mut store = EntityStore::new();
        scheduler.register(Box::new(Recorder::new("every")), None).unwrap();
        scheduler
            .register(Box::new(Recorder::new("slow")), Some(Cadence::every(2.0)))
            .unwrap();

        for _ in 0..5 {
            scheduler.run(0.5, &mut store);
        }

        let every = scheduler.get::<Recorder>("every").unwrap();
        assert_eq!(every.deltas.len(), 5);
        let slow = scheduler.get::<Recorder>("slow").unwrap();
        assert_eq!(slow.deltas, vec![2.0]);
        assert_eq!(scheduler.cadence("slow").unwrap().last_fired, 2.0);
    }

    #[test]
    fn cadence_tolerates_float_drift() {
        let mut scheduler = Scheduler::new();
        let mut store = EntityStore::new();
        scheduler
            .register(Box::new(Recorder::new("slow")), Some(Cadence::every(1.0)))
            .unwrap();
        for _ in 0..10 {
            scheduler.run(0.1, &mut store);
        }
        assert_eq!(scheduler.get::<Recorder>("slow").unwrap().deltas.len(), 1);
    }

    #[test]
    fn remove_and_lookup_by_name() {
        let mut scheduler = Scheduler::new();
        scheduler.register(Box::new(Recorder::new("a")), None).unwrap();
        scheduler.register(Box::new(Recorder::new("b")), None).unwrap();
        assert_eq!(scheduler.names(), vec!["a", "b"]);
        assert!(scheduler.remove("a"));
        assert!(!scheduler.remove("a"));
        assert_eq!(scheduler.names(), vec!["b"]);
        assert!(scheduler.get_mut::<Recorder>("b").is_some());
    }

    #[test]
    fn notifications_reach_every_system() {
        let mut scheduler = Scheduler::new();
        let mut store = EntityStore::new();
        scheduler.register(Box::new(Recorder::new("a")), None).unwrap();
        scheduler.register(Box::new(Recorder::new("b")), None).unwrap();

        let id = store.spawn(GridPosition::cell(0, 0), ());
        let view = store.entity(id).unwrap();
        scheduler.notify_added(&view);

        assert_eq!(scheduler.get::<Recorder>("a").unwrap().added, vec![id]);
        assert_eq!(scheduler.get::<Recorder>("b").unwrap().added, vec![id]);
    }
}
