//! Common library for the city simulation core.
//!
//! This crate provides the pieces shared by every part of the simulation:
//! configuration management, error handling, telemetry, grid geometry and
//! the road network graph with its shortest-path routing.

// Configuration management
pub mod config;
pub use config::Config;

// Error handling types
pub mod error;
pub use error::{CityError, Result};

// Telemetry and observability
pub mod telemetry;

// Axis-aligned grid rectangles
pub mod grid;
pub use grid::GridPosition;

// Road network graph and routing
pub mod map;

pub use telemetry::init_tracing;
