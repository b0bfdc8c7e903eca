//! Saving a grid mid-simulation and resuming it elsewhere.

use conduit_core::fixed::{Fixed64, Ticks};
use conduit_core::position::BlockPos;
use conduit_core::test_utils::{TestGenerator, TestSink, fixed};
use conduit_transmission::overload::EmptySurroundings;
use conduit_transmission::snapshot::{DeserializeError, SNAPSHOT_MAGIC};
use conduit_transmission::{
    EnergyTier, TierRegistry, TransmissionConfig, TransmissionEvent, TransmissionGrid,
};

const NODE: BlockPos = BlockPos { x: 0, y: 0, z: 0 };
const SOURCE: BlockPos = BlockPos { x: -1, y: 0, z: 0 };
const SINK: BlockPos = BlockPos { x: 1, y: 0, z: 0 };

fn config() -> TransmissionConfig {
    TransmissionConfig {
        overload_warning_ticks: 3,
        overload_explosion_ticks: 6,
        ..TransmissionConfig::default()
    }
}

fn hot_tier() -> EnergyTier {
    EnergyTier::new("hot", 100, Some(100), Fixed64::ZERO)
}

fn attach_devices(grid: &mut TransmissionGrid) {
    grid.add_device(SOURCE, Box::new(TestGenerator::endless(100)))
        .unwrap();
    grid.add_device(SINK, Box::new(TestSink::unlimited()))
        .unwrap();
}

fn overloaded_grid() -> TransmissionGrid {
    let mut tiers = TierRegistry::standard();
    tiers.register(hot_tier()).unwrap();
    let mut grid = TransmissionGrid::new(config(), tiers);
    grid.place_node_named(NODE, "hot").unwrap();
    attach_devices(&mut grid);
    grid
}

/// First step at which the node exploded, and warnings seen before it.
fn exploded_at(
    grid: &mut TransmissionGrid,
    ticks: std::ops::RangeInclusive<Ticks>,
) -> (Option<Ticks>, usize) {
    let mut warnings = 0;
    for t in ticks {
        for event in grid.tick(t, &EmptySurroundings) {
            match event {
                TransmissionEvent::OverloadWarning { .. } => warnings += 1,
                TransmissionEvent::NodeExploded { pos, tick, .. } if pos == NODE => {
                    return (Some(tick), warnings);
                }
                _ => {}
            }
        }
    }
    (None, warnings)
}

#[test]
fn resumed_grid_explodes_on_the_same_step() {
    let mut original = overloaded_grid();
    let (early, warnings) = exploded_at(&mut original, 1..=4);
    assert_eq!(early, None);
    assert_eq!(warnings, 1);
    assert_eq!(original.node(NODE).unwrap().overload.counter, 4);

    let bytes = original.save_nodes(4).unwrap();

    // The restoring grid has never heard of the "hot" tier.
    let mut resumed = TransmissionGrid::new(config(), TierRegistry::standard());
    assert_eq!(resumed.load_nodes(&bytes).unwrap(), 4);
    assert!(resumed.tiers().by_name("hot").is_some());
    attach_devices(&mut resumed);

    let restored = resumed.node(NODE).unwrap();
    assert_eq!(restored.overload.counter, 4);
    assert!(restored.overload.has_warned);
    assert_eq!(restored.stored_energy(), original.node(NODE).unwrap().stored_energy());

    let a = exploded_at(&mut original, 5..=10);
    let b = exploded_at(&mut resumed, 5..=10);
    assert_eq!(a, (Some(6), 0));
    assert_eq!(a, b);
}

#[test]
fn buffers_survive_a_round_trip() {
    let mut grid = TransmissionGrid::with_standard_tiers();
    grid.register_tier(EnergyTier::new("lossy", 200, None, fixed(0.25)))
        .unwrap();
    for x in 0..5 {
        grid.place_node_named(BlockPos::new(x, 0, 0), "lossy").unwrap();
    }
    grid.place_node_named(BlockPos::new(5, 0, 0), "insulated_gold")
        .unwrap();
    grid.receive_energy(BlockPos::new(0, 0, 0), 400, false).unwrap();
    for t in 1..=3 {
        grid.tick(t, &EmptySurroundings);
    }

    let bytes = grid.save_nodes(3).unwrap();
    let mut copy = TransmissionGrid::with_standard_tiers();
    copy.load_nodes(&bytes).unwrap();

    let stored = |g: &TransmissionGrid| -> Vec<_> {
        g.nodes().map(|n| (n.pos(), n.stored_energy())).collect()
    };
    assert_eq!(stored(&grid), stored(&copy));

    for t in 4..=10 {
        let left = grid.tick(t, &EmptySurroundings);
        let right = copy.tick(t, &EmptySurroundings);
        let removed = |events: &[TransmissionEvent]| {
            events
                .iter()
                .filter(|e| matches!(e, TransmissionEvent::NodeRemoved { .. }))
                .count()
        };
        assert_eq!(removed(&left), removed(&right));
    }
    assert_eq!(stored(&grid), stored(&copy));
}

#[test]
fn conflicting_tier_profile_is_rejected() {
    let mut grid = overloaded_grid();
    grid.tick(1, &EmptySurroundings);
    let bytes = grid.save_nodes(1).unwrap();

    let mut tiers = TierRegistry::standard();
    tiers
        .register(EnergyTier::new("hot", 100, Some(150), Fixed64::ZERO))
        .unwrap();
    let mut other = TransmissionGrid::new(config(), tiers);
    other.place_node_named(BlockPos::new(9, 9, 9), "copper").unwrap();

    assert!(matches!(
        other.load_nodes(&bytes),
        Err(DeserializeError::TierMismatch(ref name)) if name == "hot"
    ));
    // Nothing was replaced.
    assert!(other.node(BlockPos::new(9, 9, 9)).is_some());
    assert!(other.node(NODE).is_none());
}

#[test]
fn garbage_is_rejected() {
    let mut grid = TransmissionGrid::with_standard_tiers();
    assert!(grid.load_nodes(&[]).is_err());
    assert!(grid.load_nodes(&[0xFF; 32]).is_err());
    assert_eq!(SNAPSHOT_MAGIC, 0xC0DE_0001);
}
