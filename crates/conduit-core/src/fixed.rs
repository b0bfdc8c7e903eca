use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits.
pub type Fixed64 = I32F32;

/// Ticks are the atomic unit of simulation time.
pub type Ticks = u64;

/// A discrete amount of energy. Never negative by construction.
pub type Energy = u64;

/// Convert an f64 to Fixed64. Use only for initialization, never in sim loop.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

/// Convert Fixed64 to f64. Use only for display, never in sim loop.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}

/// Lift an energy amount into fixed-point, saturating at `Fixed64::MAX`.
#[inline]
pub fn energy_to_fixed(amount: Energy) -> Fixed64 {
    Fixed64::saturating_from_num(amount)
}

/// Round a fixed-point amount down to whole energy. Negative values give 0.
#[inline]
pub fn floor_energy(v: Fixed64) -> Energy {
    if v <= Fixed64::ZERO {
        0
    } else {
        v.floor().to_num::<u64>()
    }
}

/// Round a fixed-point amount up to whole energy. Negative values give 0.
#[inline]
pub fn ceil_energy(v: Fixed64) -> Energy {
    if v <= Fixed64::ZERO {
        0
    } else {
        v.saturating_ceil().to_num::<u64>()
    }
}

/// Checked division for Fixed64 that returns None on zero divisor.
#[inline]
pub fn checked_div_64(a: Fixed64, b: Fixed64) -> Option<Fixed64> {
    a.checked_div(b)
}

/// Ratio `part / whole` as Fixed64; zero when `whole` is zero.
#[inline]
pub fn ratio(part: Energy, whole: Energy) -> Fixed64 {
    if whole == 0 {
        return Fixed64::ZERO;
    }
    checked_div_64(energy_to_fixed(part), energy_to_fixed(whole)).unwrap_or(Fixed64::MAX)
}
