use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::CityError;

/// Runtime settings for the simulation core, read from `CITY_*` variables.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Config {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Side length of a spatial grid cell, in grid units.
    #[serde(default = "default_cell_size")]
    pub cell_size: i32,
    /// Simulated seconds between traffic generation cycles.
    #[serde(default = "default_traffic_interval_secs")]
    pub traffic_interval_secs: f64,
    #[serde(default = "default_rng_seed")]
    pub rng_seed: u64,
    /// Fixed hour of day for demand; unset means the local wall clock.
    #[serde(default)]
    pub sim_hour: Option<u32>,
    /// Keep trips across cycles and reap them individually.
    #[serde(default)]
    pub trip_carry_over: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_cell_size() -> i32 {
    10
}

fn default_traffic_interval_secs() -> f64 {
    2.0
}

fn default_rng_seed() -> u64 {
    42
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            cell_size: default_cell_size(),
            traffic_interval_secs: default_traffic_interval_secs(),
            rng_seed: default_rng_seed(),
            sim_hour: None,
            trip_carry_over: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();
        let config: Config = envy::prefixed("CITY_")
            .from_env()
            .context("Failed to load config from environment")?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the simulation cannot run with.
    pub fn validate(&self) -> crate::Result<()> {
        if self.cell_size <= 0 {
            return Err(CityError::Config(format!(
                "cell_size must be positive, got {}",
                self.cell_size
            )));
        }
        if !self.traffic_interval_secs.is_finite() || self.traffic_interval_secs <= 0.0 {
            return Err(CityError::Config(format!(
                "traffic_interval_secs must be a positive number, got {}",
                self.traffic_interval_secs
            )));
        }
        if let Some(hour) = self.sim_hour {
            if hour > 23 {
                return Err(CityError::Config(format!("sim_hour must be 0..=23, got {hour}")));
            }
        }
        Ok(())
    }
}
