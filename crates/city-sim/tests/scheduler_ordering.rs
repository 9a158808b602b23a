use city_sim::{CityWorld, EntityId, EntityStore, GridPosition, PowerConsumer, System};

/// Writes the tick number into every power consumer.
struct Writer {
    tick: f64,
}

impl System for Writer {
    fn name(&self) -> &str {
        "writer"
    }

    fn update(&mut self, _delta_time: f64, entities: &[EntityId], store: &mut EntityStore) {
        self.tick += 1.0;
        for id in entities {
            if let Some(mut consumer) = store.component_mut::<PowerConsumer>(*id) {
                consumer.power_required = self.tick;
            }
        }
    }
}

/// Records the power requirement it sees each tick.
#[derive(Default)]
struct Reader {
    seen: Vec<f64>,
}

impl System for Reader {
    fn name(&self) -> &str {
        "reader"
    }

    fn update(&mut self, _delta_time: f64, entities: &[EntityId], store: &mut EntityStore) {
        for id in entities {
            if let Some(consumer) = store.component::<PowerConsumer>(*id) {
                self.seen.push(consumer.power_required);
            }
        }
    }
}

fn world_with_consumer() -> CityWorld {
    let mut world = CityWorld::new();
    world.create_entity_with(GridPosition::cell(0, 0), PowerConsumer::new(0.0));
    world
}

#[test]
fn later_systems_see_changes_from_the_same_tick() {
    let mut world = world_with_consumer();
    world.add_system(Writer { tick: 0.0 }).unwrap();
    world.add_system(Reader::default()).unwrap();

    for _ in 0..3 {
        world.update(0.1);
    }

    let reader = world.system::<Reader>("reader").unwrap();
    assert_eq!(reader.seen, vec![1.0, 2.0, 3.0]);
}

#[test]
fn earlier_systems_see_last_ticks_values() {
    let mut world = world_with_consumer();
    world.add_system(Reader::default()).unwrap();
    world.add_system(Writer { tick: 0.0 }).unwrap();

    for _ in 0..3 {
        world.update(0.1);
    }

    let reader = world.system::<Reader>("reader").unwrap();
    assert_eq!(reader.seen, vec![0.0, 1.0, 2.0]);
}

#[test]
fn removed_system_stops_running() {
    let mut world = world_with_consumer();
    world.add_system(Writer { tick: 0.0 }).unwrap();
    world.update(0.1);
    assert!(world.remove_system("writer"));
    world.update(0.1);

    let id = world.all_entities()[0];
    let consumer = world.store().component::<PowerConsumer>(id).unwrap();
    assert_eq!(consumer.power_required, 1.0);
    assert!(world.system_names().is_empty());
}
