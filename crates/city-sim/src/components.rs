use std::fmt;

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

// --- Identity ---

/// Stable id of a city entity, displayed as `entity_N`.
///
/// Allocated by the entity store starting at 1. Ids are only handed out again
/// after the store is cleared.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity_{}", self.0)
    }
}

// --- Buildings ---

/// Zoning class of a building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BuildingClass {
    Residential,
    Commercial,
    Industrial,
    Municipal,
}

impl BuildingClass {
    pub const ALL: [BuildingClass; 4] = [
        BuildingClass::Residential,
        BuildingClass::Commercial,
        BuildingClass::Industrial,
        BuildingClass::Municipal,
    ];
}

/// Descriptive data of a placed building.
#[derive(Component, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingInfo {
    pub class: BuildingClass,
    pub name: String,
    pub level: u32,
    pub max_level: u32,
    pub construction_cost: f64,
    pub maintenance_cost: f64,
    pub population: Option<u32>,
    pub jobs: Option<u32>,
}

impl BuildingInfo {
    pub fn new(class: BuildingClass, name: impl Into<String>) -> Self {
        Self {
            class,
            name: name.into(),
            level: 1,
            max_level: 3,
            construction_cost: 1000.0,
            maintenance_cost: 100.0,
            population: None,
            jobs: None,
        }
    }

    pub fn can_upgrade(&self) -> bool {
        self.level < self.max_level
    }

    /// Cost of moving to the next level.
    pub fn upgrade_cost(&self) -> f64 {
        self.construction_cost * self.level as f64 * 0.5
    }

    /// Raises the level by one, scaling costs and occupancy.
    /// Returns `false` at max level.
    pub fn upgrade(&mut self) -> bool {
        if !self.can_upgrade() {
            return false;
        }
        self.level += 1;
        self.construction_cost *= 1.5;
        self.maintenance_cost *= 1.3;
        self.population = self.population.map(|p| (p as f64 * 1.4).floor() as u32);
        self.jobs = self.jobs.map(|j| (j as f64 * 1.4).floor() as u32);
        true
    }
}

// --- Demand producers ---

/// Travel demand produced by a building.
#[derive(Component, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficGenerator {
    /// Trips per simulated day, before the time-of-day multiplier.
    pub daily_trips: f64,
    pub peak_hour_multiplier: f64,
    /// Free-form destination hints for peripheral systems.
    pub destinations: Vec<String>,
}

impl TrafficGenerator {
    pub fn new(daily_trips: f64) -> Self {
        Self {
            daily_trips,
            peak_hour_multiplier: 1.5,
            destinations: Vec::new(),
        }
    }
}

/// Electricity draw of a building.
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerConsumer {
    pub power_required: f64,
    pub is_powered: bool,
    pub priority: u32,
}

impl PowerConsumer {
    pub fn new(power_required: f64) -> Self {
        Self {
            power_required,
            is_powered: false,
            priority: 1,
        }
    }
}

/// Tax base of a building.
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TaxGenerator {
    pub annual_revenue: f64,
    pub tax_rate: f64,
    pub land_value: f64,
}
