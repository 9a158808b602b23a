use anyhow::{Context, Result};
use city_common::map::{RoadClass, RoadGraph};
use city_common::{init_tracing, Config, GridPosition};
use city_sim::systems::TRAFFIC_SYSTEM_NAME;
use city_sim::{
    BuildingClass, BuildingInfo, CityWorld, PowerConsumer, SpatialGrid, TrafficGenerator,
    TrafficSimulator,
};

/// Road nodes per side of the generated street grid.
const BLOCKS: i32 = 6;
/// Simulated seconds per tick.
const TICK_SECS: f64 = 1.0;
const TICKS: u32 = 20;

fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_tracing("city-sim", &config.log_level);

    let mut world = CityWorld::new();
    let mut grid = SpatialGrid::new(config.cell_size);

    let traffic = TrafficSimulator::from_config(build_roads(), &config);
    world
        .add_system_every(traffic, config.traffic_interval_secs)
        .context("Failed to register traffic system")?;

    populate(&mut world, &mut grid)?;
    tracing::info!(
        entities = world.entity_count(),
        cells = grid.cell_count(),
        "City populated"
    );

    for _ in 0..TICKS {
        world.update(TICK_SECS);
    }

    let Some(traffic) = world.system::<TrafficSimulator>(TRAFFIC_SYSTEM_NAME) else {
        anyhow::bail!("traffic system missing after run");
    };
    let stats = traffic.statistics();
    tracing::info!(
        active_trips = stats.active_trips,
        total_traffic = stats.network.total_traffic,
        average_density = stats.network.average_density,
        congestion = ?stats.congestion,
        "Simulation finished"
    );

    let downtown = GridPosition::cell(BLOCKS, BLOCKS);
    let nearby = grid.entities_in_radius(&downtown, 4.0);
    tracing::info!(count = nearby.len(), "Buildings near downtown");

    Ok(())
}

/// Streets every two cells; the middle row is an avenue.
fn build_roads() -> RoadGraph {
    let mut graph = RoadGraph::new();
    for y in 0..BLOCKS {
        for x in 0..BLOCKS {
            let class = if y == BLOCKS / 2 {
                RoadClass::Avenue
            } else {
                RoadClass::Street
            };
            graph.add_node(GridPosition::cell(x * 2, y * 2), class);
        }
    }
    graph
}

/// One building per block, cycling through the classes.
fn populate(world: &mut CityWorld, grid: &mut SpatialGrid) -> Result<()> {
    let mut index = 0usize;
    for y in 0..BLOCKS - 1 {
        for x in 0..BLOCKS - 1 {
            let class = BuildingClass::ALL[index % BuildingClass::ALL.len()];
            index += 1;

            let position = GridPosition::new(x * 2 + 1, y * 2 + 1, 1, 1)?;
            let info = BuildingInfo::new(class, format!("{class:?} {index}"));
            let id = match class {
                BuildingClass::Residential => world.create_entity_with(
                    position,
                    (info, TrafficGenerator::new(48.0), PowerConsumer::new(5.0)),
                ),
                BuildingClass::Commercial => world.create_entity_with(
                    position,
                    (info, TrafficGenerator::new(24.0), PowerConsumer::new(20.0)),
                ),
                BuildingClass::Industrial => world.create_entity_with(
                    position,
                    (info, TrafficGenerator::new(36.0), PowerConsumer::new(50.0)),
                ),
                BuildingClass::Municipal => {
                    world.create_entity_with(position, (info, PowerConsumer::new(10.0)))
                }
            };
            grid.add_entity(id, position);
        }
    }
    Ok(())
}
