//! City simulation core.
//!
//! Entities are grid rectangles with attached components, kept in an
//! [`EntityStore`] and driven by ordered [`System`]s through a [`CityWorld`].
//! The bundled [`TrafficSimulator`] turns building demand into routed trips
//! on the road graph from `city_common::map`.

// Component types
pub mod components;
pub use components::{
    BuildingClass, BuildingInfo, EntityId, PowerConsumer, TaxGenerator, TrafficGenerator,
};

// Entity storage
pub mod store;
pub use store::{EntityStore, EntityView};

// System contract and scheduling
pub mod scheduler;
pub use scheduler::{Cadence, Scheduler, System};

// World container
pub mod world;
pub use world::CityWorld;

// Spatial index
pub mod spatial;
pub use spatial::SpatialGrid;

// Simulation systems
pub mod systems;
pub use systems::{TimeOfDay, TrafficSimulator, TripCategory, TripPolicy};

pub use city_common::map::{RoadClass, RoadGraph, Route};
pub use city_common::{Config, GridPosition};
