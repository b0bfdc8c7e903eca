//! Property-based tests for the conduit core types.
//!
//! Random positions, directions, fixed-point values and device operations,
//! checked against the lattice and rounding invariants the grid relies on.

use conduit_core::device::EnergyStorage;
use conduit_core::dirty::DirtyTracker;
use conduit_core::fixed::*;
use conduit_core::position::{BlockPos, Direction, PerFace};
use conduit_core::test_utils::TestBattery;
use proptest::prelude::*;

// ===========================================================================
// Generators
// ===========================================================================

fn arb_pos() -> impl Strategy<Value = BlockPos> {
    (-10_000i32..10_000, -256i32..256, -10_000i32..10_000)
        .prop_map(|(x, y, z)| BlockPos::new(x, y, z))
}

fn arb_direction() -> impl Strategy<Value = Direction> {
    (0usize..6).prop_map(|i| Direction::ALL[i])
}

/// Non-negative fixed-point values well inside the `u64` energy range.
fn arb_amount() -> impl Strategy<Value = Fixed64> {
    (0i64..(1i64 << 40)).prop_map(Fixed64::from_bits)
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Stepping across a face and back returns to the start.
    #[test]
    fn offset_then_opposite_is_identity(pos in arb_pos(), dir in arb_direction()) {
        prop_assert_eq!(pos.offset(dir).offset(dir.opposite()), pos);
        prop_assert_eq!(dir.opposite().opposite(), dir);
        prop_assert_eq!(pos.manhattan_distance(&pos.offset(dir)), 1);
    }

    /// Every neighbour is one step away and they are all distinct.
    #[test]
    fn neighbours_are_distinct_unit_steps(pos in arb_pos()) {
        let neighbours = pos.neighbors();
        for (i, (dir, n)) in neighbours.iter().enumerate() {
            prop_assert_eq!(*dir, Direction::ALL[i]);
            prop_assert_eq!(pos.distance_squared(n), 1);
            for (_, other) in &neighbours[i + 1..] {
                prop_assert_ne!(n, other);
            }
        }
    }

    /// `set` only changes the addressed face.
    #[test]
    fn per_face_set_get(dir in arb_direction(), value in any::<u32>()) {
        let mut faces = PerFace::<u32>::default();
        faces.set(dir, value);
        for (d, v) in faces.iter() {
            let expected = if d == dir { value } else { 0 };
            prop_assert_eq!(*v, expected);
        }
        prop_assert_eq!(*faces.get(dir), value);
    }

    /// Rounding down never exceeds rounding up, and they differ by at most one.
    #[test]
    fn floor_never_exceeds_ceil(v in arb_amount()) {
        let lo = floor_energy(v);
        let hi = ceil_energy(v);
        prop_assert!(lo <= hi);
        prop_assert!(hi - lo <= 1);
        prop_assert_eq!(lo == hi, v.frac() == Fixed64::ZERO);
    }

    /// A part of a whole is a ratio in [0, 1].
    #[test]
    fn ratio_of_part_is_bounded(whole in 1u64..1_000_000, pick in 0u64..1_000_000) {
        let part = pick % (whole + 1);
        let r = ratio(part, whole);
        prop_assert!(r >= Fixed64::ZERO);
        prop_assert!(r <= Fixed64::ONE);
        prop_assert_eq!(r == Fixed64::ONE, part == whole);
    }

    /// Marking a position dirties it and all six neighbours, and taking
    /// the set leaves the tracker clean.
    #[test]
    fn dirty_marks_neighbourhood(pos in arb_pos()) {
        let mut tracker = DirtyTracker::new();
        tracker.mark_with_neighbors(pos);
        prop_assert!(tracker.is_position_dirty(pos));
        for (_, n) in pos.neighbors() {
            prop_assert!(tracker.is_position_dirty(n));
        }
        prop_assert_eq!(tracker.take_positions().len(), 7);
        prop_assert!(!tracker.is_dirty());
    }

    /// Battery receive/extract stay within rate, headroom and charge.
    #[test]
    fn battery_is_clamped(
        capacity in 1u64..10_000,
        rate in 1u64..1_000,
        ops in proptest::collection::vec((any::<bool>(), 0u64..5_000, any::<bool>()), 1..40),
    ) {
        let mut battery = TestBattery::new(capacity, rate);
        for (receive, amount, simulate) in ops {
            let before = battery.energy_stored();
            let moved = if receive {
                battery.receive_energy(amount, simulate)
            } else {
                battery.extract_energy(amount, simulate)
            };
            prop_assert!(moved <= amount.min(rate));
            let after = battery.energy_stored();
            match (receive, simulate) {
                (_, true) => prop_assert_eq!(after, before),
                (true, false) => prop_assert_eq!(after, before + moved),
                (false, false) => prop_assert_eq!(after, before - moved),
            }
            prop_assert!(after <= battery.max_energy_stored());
        }
    }
}
