use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits.
///
/// Every volume, capacity, fraction and flowrate in the engine uses this type.
/// Addition and subtraction are exact, which keeps running queue totals equal
/// to the sum over their events.
pub type Fixed64 = I32F32;

/// Iterations are the atomic unit of simulation time.
pub type Ticks = u64;

/// Convert an f64 to Fixed64. Use only for setup, never in the iteration loop.
///
/// Returns None for NaN, infinities and values outside the Fixed64 range.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Option<Fixed64> {
    Fixed64::checked_from_num(v)
}

/// Convert Fixed64 to f64. Use only for display.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}

/// Checked division for Fixed64 that returns None on zero divisor.
#[inline]
pub fn checked_div_64(a: Fixed64, b: Fixed64) -> Option<Fixed64> {
    a.checked_div(b)
}

/// `num / den`, or zero when the denominator is zero (or the quotient
/// overflows). Proportional splits with no feed resolve to a zero fraction.
#[inline]
pub fn ratio_or_zero(num: Fixed64, den: Fixed64) -> Fixed64 {
    if den == Fixed64::ZERO {
        return Fixed64::ZERO;
    }
    checked_div_64(num, den).unwrap_or(Fixed64::ZERO)
}

/// Ceiling of a non-negative fixed-point value as a whole count.
/// Negative inputs clamp to 0.
#[inline]
pub fn ceil_to_u32(v: Fixed64) -> u32 {
    if v <= Fixed64::ZERO {
        return 0;
    }
    let whole: i64 = v.to_num();
    let ceiled = if v.frac() > Fixed64::ZERO { whole + 1 } else { whole };
    ceiled.clamp(0, u32::MAX as i64) as u32
}

/// Clamp a fraction into [0, 1].
#[inline]
pub fn clamp_unit(v: Fixed64) -> Fixed64 {
    v.clamp(Fixed64::ZERO, Fixed64::ONE)
}
