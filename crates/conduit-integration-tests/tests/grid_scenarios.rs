//! End-to-end grid scenarios: lossy delivery, cable runs, overload
//! recovery and explosions with entities nearby.

use conduit_core::fixed::{Energy, Fixed64, Ticks, f64_to_fixed64};
use conduit_core::id::EntityId;
use conduit_core::position::BlockPos;
use conduit_core::test_utils::{TestBattery, TestGenerator, TestSink, fixed};
use conduit_transmission::hybrid::{ConversionRatio, HybridAccumulator};
use conduit_transmission::overload::{EmptySurroundings, OverloadPhase, Surroundings};
use conduit_transmission::{
    EnergyTier, TierRegistry, TransmissionConfig, TransmissionEvent, TransmissionGrid,
};

fn p(x: i32, y: i32, z: i32) -> BlockPos {
    BlockPos::new(x, y, z)
}

/// Entities standing at fixed positions.
struct Village(Vec<(EntityId, BlockPos)>);

impl Surroundings for Village {
    fn living_entities_near(&self, center: BlockPos, radius: u32) -> Vec<(EntityId, Fixed64)> {
        self.0
            .iter()
            .filter_map(|(id, pos)| {
                let distance = (center.distance_squared(pos) as f64).sqrt();
                (distance <= f64::from(radius)).then(|| (*id, f64_to_fixed64(distance)))
            })
            .collect()
    }
}

/// A grid with one extra tier "hot" that overloads at its own rate.
fn hot_grid(warning_ticks: u32, explosion_ticks: u32) -> TransmissionGrid {
    let mut tiers = TierRegistry::standard();
    tiers
        .register(EnergyTier::new("hot", 100, Some(100), Fixed64::ZERO))
        .unwrap();
    let config = TransmissionConfig {
        overload_warning_ticks: warning_ticks,
        overload_explosion_ticks: explosion_ticks,
        ..TransmissionConfig::default()
    };
    TransmissionGrid::new(config, tiers)
}

fn run(
    grid: &mut TransmissionGrid,
    ticks: std::ops::RangeInclusive<Ticks>,
    world: &dyn Surroundings,
) -> Vec<TransmissionEvent> {
    ticks.flat_map(|t| grid.tick(t, world)).collect()
}

#[test]
fn reference_node_delivers_460_of_512() {
    let mut grid = TransmissionGrid::with_standard_tiers();
    grid.register_tier(EnergyTier::new("ref", 512, None, fixed(0.1)))
        .unwrap();
    let node = p(0, 64, 0);
    grid.place_node_named(node, "ref").unwrap();
    let sink = grid
        .add_device(p(0, 65, 0), Box::new(TestSink::unlimited()))
        .unwrap();
    assert_eq!(grid.receive_energy(node, 1000, false).unwrap(), 1000);

    grid.tick(1, &EmptySurroundings);

    assert_eq!(grid.device(sink).unwrap().energy_stored(), 460);
    assert_eq!(grid.node(node).unwrap().stored_energy(), 488);
}

#[test]
fn producer_feeds_consumer_through_mixed_run() {
    let mut grid = TransmissionGrid::with_standard_tiers();
    let tiers = ["copper", "insulated_copper", "gold", "gold", "insulated_gold", "diamond"];
    for (x, tier) in tiers.iter().enumerate() {
        grid.place_node_named(p(x as i32, 0, 0), tier).unwrap();
    }
    grid.add_device(p(-1, 0, 0), Box::new(TestGenerator::endless(128)))
        .unwrap();
    let sink = grid
        .add_device(p(6, 0, 0), Box::new(TestBattery::new(1_000_000, 1_000_000)))
        .unwrap();

    let events = run(&mut grid, 1..=200, &EmptySurroundings);
    assert!(!events
        .iter()
        .any(|e| matches!(e, TransmissionEvent::NodeExploded { .. })));

    let delivered = grid.device(sink).unwrap().energy_stored();
    assert!(delivered > 0);
    // Never more than the generator could have supplied.
    assert!(delivered <= 128 * 200);

    let network = grid.network_of(p(0, 0, 0)).unwrap();
    assert_eq!(network.members.len(), tiers.len());
    assert_eq!(grid.network_transfer_rate(network.id), 128);
}

#[test]
fn injected_energy_is_never_exceeded() {
    let mut grid = TransmissionGrid::with_standard_tiers();
    for x in 0..8 {
        for z in 0..3 {
            grid.place_node_named(p(x, 0, z), "gold").unwrap();
        }
    }
    let mut injected: Energy = 0;
    for z in 0..3 {
        injected += grid.receive_energy(p(0, 0, z), 1000, false).unwrap();
    }
    let sink = grid
        .add_device(p(8, 0, 1), Box::new(TestSink::unlimited()))
        .unwrap();

    run(&mut grid, 1..=100, &EmptySurroundings);

    let stored: Energy = grid.nodes().map(|n| n.stored_energy()).sum();
    let delivered = grid.device(sink).unwrap().energy_stored();
    assert!(delivered > 0);
    assert!(stored + delivered <= injected);
}

#[test]
fn overload_held_one_step_short_then_relieved_survives() {
    let mut grid = hot_grid(3, 6);
    let node = p(0, 0, 0);
    grid.place_node_named(node, "hot").unwrap();
    let source = p(-1, 0, 0);
    grid.add_device(source, Box::new(TestGenerator::endless(100)))
        .unwrap();
    grid.add_device(p(1, 0, 0), Box::new(TestSink::unlimited()))
        .unwrap();

    // Exactly at threshold for explosion_ticks - 1 steps.
    let events = run(&mut grid, 1..=5, &EmptySurroundings);
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, TransmissionEvent::OverloadWarning { .. }))
            .count(),
        1
    );
    let state = grid.node(node).unwrap().overload;
    assert_eq!(state.counter, 5);
    assert_eq!(state.phase(), OverloadPhase::Warning);

    grid.remove_device(source).unwrap();
    grid.tick(6, &EmptySurroundings);
    let state = grid.node(node).unwrap().overload;
    assert_eq!(state.counter, 0);
    assert!(!state.has_warned);

    // Long after, still standing.
    run(&mut grid, 7..=50, &EmptySurroundings);
    assert!(grid.node(node).is_some());
}

#[test]
fn sustained_overload_explodes_and_hurts_neighbours() {
    let mut grid = hot_grid(3, 6);
    let node = p(0, 0, 0);
    grid.place_node_named(node, "hot").unwrap();
    grid.place_node_named(p(0, 0, 1), "copper").unwrap();
    grid.add_device(p(-1, 0, 0), Box::new(TestGenerator::endless(100)))
        .unwrap();
    grid.add_device(p(1, 0, 0), Box::new(TestSink::unlimited()))
        .unwrap();

    let village = Village(vec![
        (EntityId(1), p(0, 0, 0)),
        (EntityId(2), p(3, 0, 4)),
        (EntityId(3), p(30, 0, 0)),
    ]);

    let early = run(&mut grid, 1..=5, &village);
    assert!(!early
        .iter()
        .any(|e| matches!(e, TransmissionEvent::NodeExploded { .. })));

    // Cache a route into the doomed node.
    let route = grid.find_optimal_path(p(0, 0, 1), node);
    assert_eq!(route, vec![p(0, 0, 1), node]);
    assert_eq!(grid.path_cache().len(), 1);

    let events = grid.tick(6, &village);
    let (damage, radius) = events
        .iter()
        .find_map(|e| match e {
            TransmissionEvent::NodeExploded {
                pos,
                damage,
                notify_radius,
                message,
                ..
            } if *pos == node => {
                assert!(message.contains("hot"));
                Some((damage.clone(), *notify_radius))
            }
            _ => None,
        })
        .expect("node should explode on the sixth step");
    assert_eq!(radius, 16);
    assert_eq!(damage.len(), 2);
    assert_eq!(damage[0].entity, EntityId(1));
    assert_eq!(damage[0].amount, fixed(10.0));
    // Distance 5 is the edge of the blast: damage floors at the minimum.
    assert_eq!(damage[1].entity, EntityId(2));
    assert_eq!(damage[1].amount, fixed(2.0));

    assert!(grid.node(node).is_none());
    assert!(grid.path_cache().is_empty());
    let misses = grid.path_cache().misses();
    assert!(grid.find_optimal_path(p(0, 0, 1), node).is_empty());
    assert_eq!(grid.path_cache().misses(), misses + 1);

    // The surviving neighbour forms its own network on the next step.
    grid.tick(7, &village);
    let survivor = grid.network_of(p(0, 0, 1)).unwrap();
    assert_eq!(survivor.members.len(), 1);
}

#[test]
fn netherite_never_explodes() {
    let mut grid = TransmissionGrid::with_standard_tiers();
    let node = p(0, 0, 0);
    grid.place_node_named(node, "netherite").unwrap();
    grid.add_device(p(-1, 0, 0), Box::new(TestGenerator::endless(8192)))
        .unwrap();
    grid.add_device(p(1, 0, 0), Box::new(TestSink::unlimited()))
        .unwrap();
    let events = run(&mut grid, 1..=250, &EmptySurroundings);
    assert!(events.iter().all(|e| !matches!(
        e,
        TransmissionEvent::OverloadWarning { .. } | TransmissionEvent::NodeExploded { .. }
    )));
    assert_eq!(grid.node(node).unwrap().overload.counter, 0);
}

#[test]
fn hybrid_store_charges_from_the_grid() {
    let mut grid = TransmissionGrid::with_standard_tiers();
    grid.place_node_named(p(0, 0, 0), "gold").unwrap();
    let store = grid
        .add_device(
            p(1, 0, 0),
            Box::new(HybridAccumulator::new(10_000, 400, ConversionRatio::new(4))),
        )
        .unwrap();
    grid.receive_energy(p(0, 0, 0), 1000, false).unwrap();
    grid.tick(1, &EmptySurroundings);
    // Rate-limited at 400; gold loses 3% in transit.
    let stored = grid.device(store).unwrap().energy_stored();
    assert_eq!(stored, 400);
    assert!(grid.node(p(0, 0, 0)).unwrap().stored_energy() < 600);
}

#[test]
fn placement_merges_networks() {
    let mut grid = TransmissionGrid::with_standard_tiers();
    grid.place_node_named(p(0, 0, 0), "copper").unwrap();
    grid.place_node_named(p(2, 0, 0), "copper").unwrap();
    grid.tick(1, &EmptySurroundings);
    assert_ne!(
        grid.network_of(p(0, 0, 0)).unwrap().id,
        grid.network_of(p(2, 0, 0)).unwrap().id
    );

    grid.place_node_named(p(1, 0, 0), "copper").unwrap();
    let events = grid.tick(2, &EmptySurroundings);
    let rebuilt: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            TransmissionEvent::NetworkRebuilt { members, .. } => Some(members.len()),
            _ => None,
        })
        .collect();
    assert_eq!(rebuilt, vec![3]);
    assert_eq!(grid.discover(p(0, 0, 0)).len(), 2);
}
