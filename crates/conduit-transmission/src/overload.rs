//! Overload detection and the explosion that ends it.
//!
//! Each node carries an [`OverloadState`]. Once per step the node feeds it
//! the incoming flow observed since its previous evaluation:
//!
//! ```text
//!   Safe --flow >= threshold--> Warning --counter >= explosion_ticks--> Exploded
//!     ^                            |
//!     +------flow < threshold------+   (counter and warning latch reset)
//! ```
//!
//! There is no cooldown band: a node flapping around its threshold resets
//! every time it dips under, so only sustained overload destroys it.

use conduit_core::fixed::{Energy, Fixed64};
use conduit_core::id::EntityId;
use conduit_core::position::BlockPos;
use serde::{Deserialize, Serialize};

use crate::config::TransmissionConfig;

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Coarse overload phase, derived from [`OverloadState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverloadPhase {
    Safe,
    Warning,
    Exploded,
}

/// What a single evaluation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverloadOutcome {
    /// Under threshold and was already safe.
    Safe,
    /// Dropped back under threshold; the counter was reset.
    Recovered { previous_counter: u32 },
    /// Still overloaded; counter advanced.
    Overloaded { counter: u32 },
    /// Counter reached the warning mark; the one-time alert should fire.
    Warned { counter: u32 },
    /// Counter reached the explosion mark.
    Exploded { counter: u32 },
}

/// Per-node overload bookkeeping. Persisted with the node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverloadState {
    pub counter: u32,
    pub has_warned: bool,
    pub exploded: bool,
}

impl OverloadState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> OverloadPhase {
        if self.exploded {
            OverloadPhase::Exploded
        } else if self.counter > 0 {
            OverloadPhase::Warning
        } else {
            OverloadPhase::Safe
        }
    }

    /// Advance the machine by one step given the observed flow.
    ///
    /// A `threshold` of `None` can never overload. Once exploded the state
    /// is terminal and further observations report `Exploded` again.
    pub fn observe(
        &mut self,
        flow: Energy,
        threshold: Option<Energy>,
        warning_ticks: u32,
        explosion_ticks: u32,
    ) -> OverloadOutcome {
        if self.exploded {
            return OverloadOutcome::Exploded {
                counter: self.counter,
            };
        }

        let overloaded = threshold.is_some_and(|t| flow >= t);
        if !overloaded {
            let previous_counter = self.counter;
            self.counter = 0;
            self.has_warned = false;
            return if previous_counter > 0 {
                OverloadOutcome::Recovered { previous_counter }
            } else {
                OverloadOutcome::Safe
            };
        }

        self.counter = self.counter.saturating_add(1);
        if self.counter >= explosion_ticks {
            self.exploded = true;
            return OverloadOutcome::Exploded {
                counter: self.counter,
            };
        }
        if self.counter == warning_ticks && !self.has_warned {
            self.has_warned = true;
            return OverloadOutcome::Warned {
                counter: self.counter,
            };
        }
        OverloadOutcome::Overloaded {
            counter: self.counter,
        }
    }
}

// ---------------------------------------------------------------------------
// Blast
// ---------------------------------------------------------------------------

/// Damage dealt to one entity by an explosion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityDamage {
    pub entity: EntityId,
    pub amount: Fixed64,
}

/// The host world as seen by an exploding node.
pub trait Surroundings {
    /// Living entities within `radius` blocks of `center`, each with its
    /// distance from `center`.
    fn living_entities_near(&self, center: BlockPos, radius: u32) -> Vec<(EntityId, Fixed64)>;
}

/// A world with nobody in it.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptySurroundings;

impl Surroundings for EmptySurroundings {
    fn living_entities_near(&self, _center: BlockPos, _radius: u32) -> Vec<(EntityId, Fixed64)> {
        Vec::new()
    }
}

/// Damage at `distance` from the epicentre: linear falloff from the maximum
/// to zero at the radius, floored at the minimum. `None` outside the radius.
pub fn blast_damage(distance: Fixed64, config: &TransmissionConfig) -> Option<Fixed64> {
    let radius = Fixed64::saturating_from_num(config.explosion_radius);
    if distance > radius || distance < Fixed64::ZERO {
        return None;
    }
    let falloff = if radius == Fixed64::ZERO {
        Fixed64::ONE
    } else {
        Fixed64::ONE - distance / radius
    };
    let scaled = config.explosion_max_damage.saturating_mul(falloff);
    Some(scaled.max(config.explosion_min_damage))
}

/// Resolve per-entity damage for an explosion at `center`.
pub fn resolve_blast(
    center: BlockPos,
    surroundings: &dyn Surroundings,
    config: &TransmissionConfig,
) -> Vec<EntityDamage> {
    surroundings
        .living_entities_near(center, config.explosion_radius)
        .into_iter()
        .filter_map(|(entity, distance)| {
            blast_damage(distance, config).map(|amount| EntityDamage { entity, amount })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::test_utils::fixed;

    const WARN: u32 = 60;
    const EXPLODE: u32 = 100;

    fn run(state: &mut OverloadState, flow: Energy, steps: u32) -> Vec<OverloadOutcome> {
        (0..steps)
            .map(|_| state.observe(flow, Some(192), WARN, EXPLODE))
            .collect()
    }

    #[test]
    fn held_at_threshold_then_dropped_does_not_explode() {
        let mut state = OverloadState::new();
        let outcomes = run(&mut state, 192, EXPLODE - 1);
        assert!(outcomes.iter().all(|o| !matches!(o, OverloadOutcome::Exploded { .. })));
        assert_eq!(state.counter, EXPLODE - 1);
        assert_eq!(state.phase(), OverloadPhase::Warning);

        let outcome = state.observe(191, Some(192), WARN, EXPLODE);
        assert_eq!(
            outcome,
            OverloadOutcome::Recovered {
                previous_counter: EXPLODE - 1
            }
        );
        assert_eq!(state.counter, 0);
        assert!(!state.has_warned);
        assert_eq!(state.phase(), OverloadPhase::Safe);
    }

    #[test]
    fn explodes_exactly_on_last_step() {
        let mut state = OverloadState::new();
        let outcomes = run(&mut state, 193, EXPLODE);
        for o in &outcomes[..(EXPLODE as usize - 1)] {
            assert!(!matches!(o, OverloadOutcome::Exploded { .. }));
        }
        assert_eq!(
            outcomes[EXPLODE as usize - 1],
            OverloadOutcome::Exploded { counter: EXPLODE }
        );
        assert_eq!(state.phase(), OverloadPhase::Exploded);
    }

    #[test]
    fn warning_fires_once_per_excursion() {
        let mut state = OverloadState::new();
        let outcomes = run(&mut state, 500, WARN + 10);
        let warnings = outcomes
            .iter()
            .filter(|o| matches!(o, OverloadOutcome::Warned { .. }))
            .count();
        assert_eq!(warnings, 1);
        assert_eq!(outcomes[WARN as usize - 1], OverloadOutcome::Warned { counter: WARN });
        assert!(state.has_warned);

        // Recover, then a second excursion warns again.
        state.observe(0, Some(192), WARN, EXPLODE);
        let outcomes = run(&mut state, 500, WARN);
        assert_eq!(outcomes.last(), Some(&OverloadOutcome::Warned { counter: WARN }));
    }

    #[test]
    fn flapping_never_explodes() {
        let mut state = OverloadState::new();
        for step in 0..1000 {
            let flow = if step % 2 == 0 { 192 } else { 100 };
            let outcome = state.observe(flow, Some(192), WARN, EXPLODE);
            assert!(!matches!(outcome, OverloadOutcome::Exploded { .. }));
        }
    }

    #[test]
    fn unbounded_threshold_stays_safe() {
        let mut state = OverloadState::new();
        for _ in 0..(EXPLODE * 2) {
            assert_eq!(
                state.observe(Energy::MAX, None, WARN, EXPLODE),
                OverloadOutcome::Safe
            );
        }
        assert_eq!(state.phase(), OverloadPhase::Safe);
    }

    #[test]
    fn exploded_is_terminal() {
        let mut state = OverloadState::new();
        run(&mut state, 1000, EXPLODE);
        assert!(matches!(
            state.observe(0, Some(192), WARN, EXPLODE),
            OverloadOutcome::Exploded { .. }
        ));
    }

    #[test]
    fn blast_damage_falls_off_and_floors() {
        let cfg = TransmissionConfig::default();
        assert_eq!(blast_damage(fixed(0.0), &cfg), Some(fixed(10.0)));
        // Halfway: 10 * 0.5 = 5.
        assert_eq!(blast_damage(fixed(2.5), &cfg), Some(fixed(5.0)));
        // Near the edge the floor of 2 applies.
        assert_eq!(blast_damage(fixed(4.9), &cfg), Some(fixed(2.0)));
        assert_eq!(blast_damage(fixed(5.5), &cfg), None);
    }

    struct Crowd(Vec<(EntityId, Fixed64)>);

    impl Surroundings for Crowd {
        fn living_entities_near(&self, _c: BlockPos, _r: u32) -> Vec<(EntityId, Fixed64)> {
            self.0.clone()
        }
    }

    #[test]
    fn resolve_blast_skips_entities_outside_radius() {
        let cfg = TransmissionConfig::default();
        let crowd = Crowd(vec![
            (EntityId(1), fixed(2.5)),
            (EntityId(2), fixed(9.0)),
        ]);
        let hits = resolve_blast(BlockPos::ORIGIN, &crowd, &cfg);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].entity, EntityId(1));
        assert_eq!(hits[0].amount, fixed(5.0));
        assert!(resolve_blast(BlockPos::ORIGIN, &EmptySurroundings, &cfg).is_empty());
    }
}
