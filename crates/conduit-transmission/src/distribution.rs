//! Lossy transfer arithmetic and the even-split rule.
//!
//! Every hop loses a fraction of what is sent. The receiver gets the
//! post-loss amount rounded down, and the sender is debited the least
//! amount whose post-loss value covers what the receiver actually took.
//! Loss is therefore always paid by the sender and energy is never
//! created.

use conduit_core::device::EnergyStorage;
use conduit_core::fixed::{Energy, Fixed64, ceil_energy, checked_div_64, energy_to_fixed, floor_energy};

/// Result of one lossy transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferOutcome {
    /// Energy removed from the sender.
    pub debited: Energy,
    /// Energy that arrived at the receiver.
    pub delivered: Energy,
}

impl TransferOutcome {
    /// Energy that vanished in transit.
    pub fn lost(&self) -> Energy {
        self.debited - self.delivered
    }
}

/// `floor(attempted * (1 - loss))`.
pub fn deliverable_after_loss(attempted: Energy, loss: Fixed64) -> Energy {
    let keep = Fixed64::ONE - loss.clamp(Fixed64::ZERO, Fixed64::ONE);
    floor_energy(energy_to_fixed(attempted).saturating_mul(keep))
}

/// The least debit whose post-loss value covers `delivered`, never more than
/// `attempted`.
pub fn debit_for_delivery(delivered: Energy, attempted: Energy, loss: Fixed64) -> Energy {
    if delivered == 0 {
        return 0;
    }
    let keep = Fixed64::ONE - loss.clamp(Fixed64::ZERO, Fixed64::ONE);
    let ceiling = attempted.max(delivered);
    let Some(gross) = checked_div_64(energy_to_fixed(delivered), keep) else {
        return ceiling;
    };
    let debit = ceil_energy(gross).clamp(delivered, ceiling);
    // Division truncates; bump once if that left the debit a hair short.
    if debit < ceiling && deliverable_after_loss(debit, loss) < delivered {
        debit + 1
    } else {
        debit
    }
}

/// Offer `attempted` to `target` through a hop losing `loss`.
pub fn transfer_with_loss(
    target: &mut dyn EnergyStorage,
    attempted: Energy,
    loss: Fixed64,
) -> TransferOutcome {
    let deliverable = deliverable_after_loss(attempted, loss);
    if deliverable == 0 {
        return TransferOutcome::default();
    }
    let delivered = target.receive_energy(deliverable, false).min(deliverable);
    TransferOutcome {
        debited: debit_for_delivery(delivered, attempted, loss),
        delivered,
    }
}

/// Split `available` evenly over `receivers`, each share capped at
/// `per_receiver_cap`. Any remainder goes one unit at a time to the earliest
/// receivers, so shares differ by at most one.
pub fn even_shares(available: Energy, receivers: usize, per_receiver_cap: Energy) -> Vec<Energy> {
    if receivers == 0 {
        return Vec::new();
    }
    let n = receivers as u64;
    let base = available / n;
    let remainder = available % n;
    (0..n)
        .map(|i| {
            let share = if i < remainder { base + 1 } else { base };
            share.min(per_receiver_cap)
        })
        .collect()
}
