//! Travel demand model: when trips happen, where they go, and what kind they are.

use chrono::Timelike;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::components::BuildingClass;

/// Source of the hour of day used by the demand curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeOfDay {
    /// Always the given hour (taken modulo 24).
    Fixed(u32),
    /// The local wall clock.
    WallClock,
}

impl TimeOfDay {
    pub fn hour(&self) -> u32 {
        match self {
            TimeOfDay::Fixed(hour) => hour % 24,
            TimeOfDay::WallClock => chrono::Local::now().hour(),
        }
    }
}

/// Demand multiplier for an hour of the day.
///
/// Commute peaks 7-9 and 17-19, daytime 10-16, evening 20-23, night otherwise.
pub fn demand_multiplier(hour: u32) -> f64 {
    match hour {
        7..=9 | 17..=19 => 2.5,
        10..=16 => 1.2,
        20..=23 => 0.8,
        _ => 0.3,
    }
}

/// Whole trips a generator produces in one cycle at `hour`.
pub fn trips_per_cycle(daily_trips: f64, hour: u32) -> usize {
    let trips = (daily_trips * demand_multiplier(hour) / 24.0).floor();
    if trips.is_finite() && trips > 0.0 {
        trips as usize
    } else {
        0
    }
}

/// Rows are origin classes, columns destination classes, in
/// `BuildingClass::ALL` order.
const COMPATIBILITY: [[bool; 4]; 4] = [
    // residential -> commercial, industrial, municipal
    [false, true, true, true],
    // commercial -> residential, industrial
    [true, false, true, false],
    // industrial -> residential, commercial
    [true, true, false, false],
    // municipal -> residential, commercial
    [true, true, false, false],
];

fn class_index(class: BuildingClass) -> usize {
    match class {
        BuildingClass::Residential => 0,
        BuildingClass::Commercial => 1,
        BuildingClass::Industrial => 2,
        BuildingClass::Municipal => 3,
    }
}

/// Whether a trip from `origin` may end at a `destination` building.
/// Unclassified origins may travel to any classified building.
pub fn accepts(origin: Option<BuildingClass>, destination: BuildingClass) -> bool {
    match origin {
        Some(origin) => COMPATIBILITY[class_index(origin)][class_index(destination)],
        None => true,
    }
}

/// Purpose of a trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TripCategory {
    Commute,
    Shopping,
    Leisure,
    Freight,
}

impl TripCategory {
    /// Road load one trip of this kind adds to each edge it uses.
    pub fn load_weight(self) -> f64 {
        match self {
            TripCategory::Freight => 3.0,
            TripCategory::Leisure => 0.8,
            TripCategory::Commute | TripCategory::Shopping => 1.0,
        }
    }

    /// Draws a category from the origin class's distribution.
    pub fn sample<R: Rng + ?Sized>(origin: Option<BuildingClass>, rng: &mut R) -> Self {
        let roll: f64 = rng.gen();
        match origin {
            Some(BuildingClass::Residential) => {
                if roll < 0.6 {
                    TripCategory::Commute
                } else if roll < 0.8 {
                    TripCategory::Shopping
                } else {
                    TripCategory::Leisure
                }
            }
            Some(BuildingClass::Commercial) => {
                if roll < 0.7 {
                    TripCategory::Shopping
                } else {
                    TripCategory::Leisure
                }
            }
            Some(BuildingClass::Industrial) => {
                if roll < 0.8 {
                    TripCategory::Freight
                } else {
                    TripCategory::Commute
                }
            }
            Some(BuildingClass::Municipal) | None => TripCategory::Leisure,
        }
    }
}
