//! Systems shipped with the simulation core.
//!
//! - `demand` - time-of-day demand curve, destination compatibility and trip
//!   categories
//! - `traffic` - the traffic simulator, which regenerates trips on a cadence
//!   and writes congestion into the road graph
//!
//! Power, economy, crime and land value are left to peripheral crates; they
//! plug in through the same `System` trait.

pub mod demand;
pub mod traffic;

pub use demand::{TimeOfDay, TripCategory};
pub use traffic::{
    CongestionLevel, CycleReport, TrafficSimulator, TrafficStatistics, TrafficTrip, TripId,
    TripPolicy, TRAFFIC_SYSTEM_NAME,
};
