//! Traffic demand simulation.
//!
//! The traffic simulator turns the travel demand of buildings into trips
//! routed over the road graph and accumulates their load on each road
//! segment. It runs once per generation cycle; the scheduler decides how
//! often that is (see `CityWorld::add_system_every`).

use std::collections::BTreeMap;
use std::fmt;

use city_common::map::{EdgeId, NetworkStatistics, NodeId, RoadGraph, Route};
use city_common::{Config, GridPosition};
use rand::distributions::{Distribution, WeightedIndex};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::components::{BuildingClass, BuildingInfo, EntityId, TrafficGenerator};
use crate::scheduler::System;
use crate::store::EntityStore;
use crate::systems::demand::{self, TimeOfDay, TripCategory};

/// Name the simulator registers under.
pub const TRAFFIC_SYSTEM_NAME: &str = "traffic";

/// Default simulated seconds between generation cycles.
pub const DEFAULT_INTERVAL_SECS: f64 = 2.0;

const DEFAULT_SEED: u64 = 42;

/// Identifier of a trip, displayed as `trip_N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TripId(pub u64);

impl fmt::Display for TripId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "trip_{}", self.0)
    }
}

/// A single vehicle journey between two buildings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficTrip {
    pub id: TripId,
    pub origin: EntityId,
    pub destination: EntityId,
    pub route: Route,
    pub category: TripCategory,
    /// Simulator clock (seconds) when the trip was created.
    pub created_at: f64,
    /// Predicted duration in minutes, from the route estimate.
    pub duration: f64,
}

impl TrafficTrip {
    /// True once more simulated time than the predicted duration has passed.
    pub fn is_expired(&self, now: f64) -> bool {
        now - self.created_at > self.duration * 60.0
    }
}

/// What happens to last cycle's trips when a new cycle starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TripPolicy {
    /// Drop every trip and all road load, then generate from scratch.
    #[default]
    Regenerate,
    /// Keep trips; reap the expired ones individually and withdraw their load.
    CarryOver,
}

/// Network-wide congestion bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CongestionLevel {
    Low,
    Medium,
    High,
}

impl CongestionLevel {
    /// Buckets a mean edge density: below 0.3 low, below 0.7 medium.
    pub fn from_density(average_density: f64) -> Self {
        if average_density < 0.3 {
            CongestionLevel::Low
        } else if average_density < 0.7 {
            CongestionLevel::Medium
        } else {
            CongestionLevel::High
        }
    }
}

/// Snapshot of traffic conditions for dashboards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficStatistics {
    #[serde(flatten)]
    pub network: NetworkStatistics,
    pub active_trips: usize,
    pub trips_by_category: BTreeMap<TripCategory, usize>,
    pub congestion: CongestionLevel,
}

/// Outcome of one generation cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub created: usize,
    pub reaped: usize,
    /// Unit trips dropped because no compatible destination existed.
    pub no_destination: usize,
    /// Unit trips dropped because no road node or route was found.
    pub no_route: usize,
}

/// Candidate destination gathered once per cycle.
#[derive(Debug, Clone, Copy)]
struct Destination {
    id: EntityId,
    position: GridPosition,
    class: BuildingClass,
}

/// The traffic simulator system.
///
/// Owns the road graph. Each cycle it reads every entity with a
/// [`TrafficGenerator`], picks destinations and trip categories at random
/// (seeded, so runs are reproducible), routes each trip and adds its load to
/// the segments of the route.
pub struct TrafficSimulator {
    graph: RoadGraph,
    trips: BTreeMap<TripId, TrafficTrip>,
    next_trip_id: u64,
    rng: ChaCha8Rng,
    time_of_day: TimeOfDay,
    policy: TripPolicy,
    /// Simulated seconds received through `update`.
    clock: f64,
    last_report: CycleReport,
}

impl TrafficSimulator {
    pub fn new(graph: RoadGraph) -> Self {
        Self {
            graph,
            trips: BTreeMap::new(),
            next_trip_id: 1,
            rng: ChaCha8Rng::seed_from_u64(DEFAULT_SEED),
            time_of_day: TimeOfDay::WallClock,
            policy: TripPolicy::default(),
            clock: 0.0,
            last_report: CycleReport::default(),
        }
    }

    /// Seed, hour source and trip policy taken from `config`.
    pub fn from_config(graph: RoadGraph, config: &Config) -> Self {
        let time_of_day = config.sim_hour.map_or(TimeOfDay::WallClock, TimeOfDay::Fixed);
        let policy = if config.trip_carry_over {
            TripPolicy::CarryOver
        } else {
            TripPolicy::Regenerate
        };
        Self::new(graph)
            .with_seed(config.rng_seed)
            .with_time_of_day(time_of_day)
            .with_trip_policy(policy)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self
    }

    pub fn with_time_of_day(mut self, time_of_day: TimeOfDay) -> Self {
        self.time_of_day = time_of_day;
        self
    }

    pub fn with_trip_policy(mut self, policy: TripPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Runs one generation cycle over `entities`.
    ///
    /// # Behavior
    ///
    /// 1. Under [`TripPolicy::Regenerate`] all trips and all road load are
    ///    dropped; under [`TripPolicy::CarryOver`] only expired trips are
    ///    reaped and their load withdrawn.
    /// 2. Each generator yields `floor(daily_trips * demand(hour) / 24)` unit
    ///    trips.
    /// 3. Each unit trip picks a compatible destination with probability
    ///    proportional to `1 / (distance + 1)`.
    /// 4. Both ends snap to their nearest road node and the trip is routed;
    ///    trips without a route are dropped for this cycle.
    /// 5. A routed trip adds its category's load weight to every segment on
    ///    its route.
    pub fn run_cycle(&mut self, entities: &[EntityId], store: &EntityStore) -> CycleReport {
        let mut report = CycleReport::default();
        match self.policy {
            TripPolicy::Regenerate => {
                self.graph.clear_traffic();
                self.trips.clear();
            }
            TripPolicy::CarryOver => report.reaped = self.reap_expired(),
        }

        let hour = self.time_of_day.hour();
        let destinations: Vec<Destination> = entities
            .iter()
            .filter_map(|id| {
                let view = store.entity(*id)?;
                let info = view.get::<BuildingInfo>()?;
                Some(Destination {
                    id: *id,
                    position: *view.position(),
                    class: info.class,
                })
            })
            .collect();

        for &origin in entities {
            let Some(view) = store.entity(origin) else {
                continue;
            };
            let Some(generator) = view.get::<TrafficGenerator>() else {
                continue;
            };
            let count = demand::trips_per_cycle(generator.daily_trips, hour);
            if count == 0 {
                continue;
            }
            let origin_class = view.get::<BuildingInfo>().map(|info| info.class);
            let origin_position = *view.position();

            let candidates: Vec<&Destination> = destinations
                .iter()
                .filter(|d| d.id != origin && demand::accepts(origin_class, d.class))
                .collect();
            let weights = candidates
                .iter()
                .map(|d| 1.0 / (origin_position.origin_distance_to(&d.position) + 1.0));
            let picker = match WeightedIndex::new(weights) {
                Ok(picker) => picker,
                Err(_) => {
                    tracing::trace!(entity = %origin, "no destination for trips");
                    report.no_destination += count;
                    continue;
                }
            };

            for _ in 0..count {
                let destination = candidates[picker.sample(&mut self.rng)];
                let category = TripCategory::sample(origin_class, &mut self.rng);
                match self.create_trip(origin, &origin_position, destination, category) {
                    Some(_) => report.created += 1,
                    None => report.no_route += 1,
                }
            }
        }

        tracing::info!(
            hour,
            created = report.created,
            reaped = report.reaped,
            no_destination = report.no_destination,
            no_route = report.no_route,
            active = self.trips.len(),
            congestion = ?self.congestion_level(),
            "🚦 Traffic cycle complete"
        );
        self.last_report = report;
        report
    }

    fn create_trip(
        &mut self,
        origin: EntityId,
        origin_position: &GridPosition,
        destination: &Destination,
        category: TripCategory,
    ) -> Option<TripId> {
        let start = self.graph.nearest_node(origin_position)?;
        let end = self.graph.nearest_node(&destination.position)?;
        let Some(route) = self.graph.find_path(start, end) else {
            tracing::trace!(%origin, destination = %destination.id, "no route, trip skipped");
            return None;
        };

        let id = TripId(self.next_trip_id);
        self.next_trip_id += 1;

        let weight = category.load_weight();
        for edge in &route.edges {
            self.graph.update_traffic(*edge, weight);
        }

        self.trips.insert(
            id,
            TrafficTrip {
                id,
                origin,
                destination: destination.id,
                duration: route.estimated_time,
                route,
                category,
                created_at: self.clock,
            },
        );
        Some(id)
    }

    /// Removes trips past their predicted duration, withdrawing their load.
    fn reap_expired(&mut self) -> usize {
        let now = self.clock;
        let expired: Vec<TripId> = self
            .trips
            .values()
            .filter(|trip| trip.is_expired(now))
            .map(|trip| trip.id)
            .collect();

        for id in &expired {
            if let Some(trip) = self.trips.remove(id) {
                let weight = trip.category.load_weight();
                for edge in &trip.route.edges {
                    self.graph.update_traffic(*edge, -weight);
                }
            }
        }
        expired.len()
    }

    pub fn active_trip_count(&self) -> usize {
        self.trips.len()
    }

    /// Active trips in creation order.
    pub fn active_trips(&self) -> impl Iterator<Item = &TrafficTrip> + '_ {
        self.trips.values()
    }

    pub fn trips_by_category(&self) -> BTreeMap<TripCategory, usize> {
        let mut counts = BTreeMap::new();
        for trip in self.trips.values() {
            *counts.entry(trip.category).or_insert(0) += 1;
        }
        counts
    }

    pub fn congestion_level(&self) -> CongestionLevel {
        CongestionLevel::from_density(self.graph.statistics().average_density)
    }

    /// Density of every segment, keyed by id.
    pub fn density_map(&self) -> BTreeMap<EdgeId, f64> {
        self.graph
            .edges()
            .map(|edge| (edge.id, edge.density()))
            .collect()
    }

    pub fn statistics(&self) -> TrafficStatistics {
        let network = self.graph.statistics();
        TrafficStatistics {
            congestion: CongestionLevel::from_density(network.average_density),
            network,
            active_trips: self.trips.len(),
            trips_by_category: self.trips_by_category(),
        }
    }

    /// Places a street node, auto-connecting it to its neighbours.
    pub fn add_road(&mut self, position: GridPosition) -> NodeId {
        self.graph.add_street(position)
    }

    pub fn graph(&self) -> &RoadGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut RoadGraph {
        &mut self.graph
    }

    pub fn last_report(&self) -> CycleReport {
        self.last_report
    }

    /// Simulated seconds this system has been advanced by.
    pub fn clock(&self) -> f64 {
        self.clock
    }
}

impl System for TrafficSimulator {
    fn name(&self) -> &str {
        TRAFFIC_SYSTEM_NAME
    }

    fn update(&mut self, delta_time: f64, entities: &[EntityId], store: &mut EntityStore) {
        self.clock += delta_time;
        self.run_cycle(entities, store);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::CityWorld;

    /// Two street nodes two units apart with a home by the first and a shop
    /// by the second.
    fn two_block_city(daily_trips: f64) -> (CityWorld, TrafficSimulator, EntityId, EntityId) {
        let mut graph = RoadGraph::new();
        graph.add_street(GridPosition::cell(0, 0));
        graph.add_street(GridPosition::cell(2, 0));

        let mut world = CityWorld::new();
        let home = world.create_entity_with(
            GridPosition::cell(0, 1),
            (
                BuildingInfo::new(BuildingClass::Residential, "Home"),
                TrafficGenerator::new(daily_trips),
            ),
        );
        let shop = world.create_entity_with(
            GridPosition::cell(2, 1),
            BuildingInfo::new(BuildingClass::Commercial, "Shop"),
        );
        let traffic = TrafficSimulator::new(graph).with_time_of_day(TimeOfDay::Fixed(8));
        (world, traffic, home, shop)
    }

    #[test]
    fn generates_routed_trips_and_load() {
        let (world, mut traffic, home, shop) = two_block_city(24.0);
        let report = traffic.run_cycle(&world.all_entities(), world.store());

        assert_eq!(report.created, 2);
        assert_eq!(traffic.active_trip_count(), 2);
        for trip in traffic.active_trips() {
            assert_eq!(trip.origin, home);
            assert_eq!(trip.destination, shop);
            assert_eq!(trip.route.edges.len(), 1);
            assert!(matches!(
                trip.category,
                TripCategory::Commute | TripCategory::Shopping | TripCategory::Leisure
            ));
        }
        let edge = traffic.graph().edges().next().unwrap().id;
        assert!(traffic.graph().edge(edge).unwrap().current_traffic > 0.0);
        assert_eq!(traffic.trips_by_category().values().sum::<usize>(), 2);
        assert_eq!(traffic.congestion_level(), CongestionLevel::Low);
    }

    #[test]
    fn regenerate_policy_never_accumulates() {
        let (world, mut traffic, _, _) = two_block_city(240.0);
        let entities = world.all_entities();
        traffic.run_cycle(&entities, world.store());
        let first = traffic.statistics();
        traffic.run_cycle(&entities, world.store());
        let second = traffic.statistics();

        assert_eq!(first.active_trips, 25);
        assert_eq!(second.active_trips, 25);
        assert!(second.network.total_traffic <= 25.0 * 1.0 + 1e-9);
    }

    #[test]
    fn carry_over_policy_reaps_expired_trips() {
        let (mut world, traffic, _, _) = two_block_city(24.0);
        let mut traffic = traffic.with_trip_policy(TripPolicy::CarryOver);
        let entities = world.all_entities();
        let store = world.store_mut();

        traffic.update(0.0, &entities, store);
        assert_eq!(traffic.active_trip_count(), 2);

        // a 2-unit street trip takes under 5 minutes; jump an hour ahead
        traffic.update(3_600.0, &entities, store);
        let report = traffic.last_report();
        assert_eq!(report.reaped, 2);
        assert_eq!(report.created, 2);
        assert_eq!(traffic.active_trip_count(), 2);

        // load equals only the two fresh trips
        let edge = traffic.graph().edges().next().unwrap();
        assert!(edge.current_traffic <= 2.0 + 1e-9);
        assert!(edge.current_traffic > 0.0);
    }

    #[test]
    fn unreachable_destinations_are_skipped() {
        let mut graph = RoadGraph::new();
        graph.add_street(GridPosition::cell(0, 0));
        graph.add_street(GridPosition::cell(50, 50));

        let mut world = CityWorld::new();
        world.create_entity_with(
            GridPosition::cell(0, 1),
            (
                BuildingInfo::new(BuildingClass::Residential, "Home"),
                TrafficGenerator::new(24.0),
            ),
        );
        world.create_entity_with(
            GridPosition::cell(50, 51),
            BuildingInfo::new(BuildingClass::Industrial, "Mill"),
        );

        let mut traffic = TrafficSimulator::new(graph).with_time_of_day(TimeOfDay::Fixed(8));
        let report = traffic.run_cycle(&world.all_entities(), world.store());
        assert_eq!(report.created, 0);
        assert_eq!(report.no_route, 2);
        assert_eq!(traffic.active_trip_count(), 0);
    }

    #[test]
    fn incompatible_destinations_are_skipped() {
        let mut graph = RoadGraph::new();
        graph.add_street(GridPosition::cell(0, 0));
        let mut world = CityWorld::new();
        world.create_entity_with(
            GridPosition::cell(0, 1),
            (
                BuildingInfo::new(BuildingClass::Residential, "Home"),
                TrafficGenerator::new(24.0),
            ),
        );
        world.create_entity_with(
            GridPosition::cell(1, 1),
            BuildingInfo::new(BuildingClass::Residential, "Next door"),
        );

        let mut traffic = TrafficSimulator::new(graph).with_time_of_day(TimeOfDay::Fixed(8));
        let report = traffic.run_cycle(&world.all_entities(), world.store());
        assert_eq!(report.no_destination, 2);
        assert_eq!(report.created, 0);
    }

    #[test]
    fn same_seed_same_trips() {
        let run = || {
            let (world, traffic, _, _) = two_block_city(240.0);
            let mut traffic = traffic.with_seed(9);
            traffic.run_cycle(&world.all_entities(), world.store());
            traffic.trips_by_category()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn add_road_and_density_map() {
        let mut traffic = TrafficSimulator::new(RoadGraph::new());
        let a = traffic.add_road(GridPosition::cell(0, 0));
        let b = traffic.add_road(GridPosition::cell(1, 0));
        let edge = traffic.graph().edge_between(a, b).unwrap().id;
        traffic.graph_mut().update_traffic(edge, 150.0);

        let densities = traffic.density_map();
        assert_eq!(densities.len(), 1);
        assert!((densities[&edge] - 1.5).abs() < 1e-9);
        assert_eq!(traffic.congestion_level(), CongestionLevel::High);
        assert_eq!(traffic.statistics().congestion, CongestionLevel::High);
    }

    #[test]
    fn congestion_buckets() {
        assert_eq!(CongestionLevel::from_density(0.0), CongestionLevel::Low);
        assert_eq!(CongestionLevel::from_density(0.3), CongestionLevel::Medium);
        assert_eq!(CongestionLevel::from_density(0.69), CongestionLevel::Medium);
        assert_eq!(CongestionLevel::from_density(0.7), CongestionLevel::High);
    }

    #[test]
    fn from_config_wires_policy_and_hour() {
        let config = Config {
            sim_hour: Some(3),
            trip_carry_over: true,
            ..Config::default()
        };
        let traffic = TrafficSimulator::from_config(RoadGraph::new(), &config);
        assert_eq!(traffic.time_of_day, TimeOfDay::Fixed(3));
        assert_eq!(traffic.policy, TripPolicy::CarryOver);
    }
}
