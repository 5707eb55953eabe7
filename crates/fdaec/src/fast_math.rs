//! Approximate `log2`, `exp2` and `pow` for the suppression gain.
//!
//! `pow(x, y)` is evaluated as `exp2(y · log2(x))`. Both halves use bit-level
//! range reduction followed by a small polynomial:
//!
//! - `log2`: `x = m · 2^n` with `m` in `[1, 2)`, `log2(m) ≈ (m - 1)·p5(m)`,
//!   max relative error about 0.00086%.
//! - `exp2`: `x = n + f` with `f` in `[0.5, 1.5)`, `2^f ≈ p2(f)`, max relative
//!   error about 0.17%.
//!
//! The vectorized kernel performs the same operations in the same order, so
//! both backends produce the same gains.

pub(crate) const FLOAT_EXPONENT_MASK: u32 = 0x7F80_0000;
pub(crate) const EIGHT_BIASED_EXPONENT: u32 = 0x4380_0000;
pub(crate) const IMPLICIT_LEADING_ONE: u32 = 0x43BF_8000;
pub(crate) const MANTISSA_MASK: u32 = 0x007F_FFFF;
pub(crate) const ZERO_BIASED_EXPONENT_IS_ONE: u32 = 0x3F80_0000;

pub(crate) const LOG2_C5: f32 = -3.4436006e-2;
pub(crate) const LOG2_C4: f32 = 3.1821337e-1;
pub(crate) const LOG2_C3: f32 = -1.2315303;
pub(crate) const LOG2_C2: f32 = 2.5988452;
pub(crate) const LOG2_C1: f32 = -3.3241990;
pub(crate) const LOG2_C0: f32 = 3.1157899;

pub(crate) const EXP2_C2: f32 = 3.3718944e-1;
pub(crate) const EXP2_C1: f32 = 6.5763628e-1;
pub(crate) const EXP2_C0: f32 = 1.0017247;

/// `exp2` input range; keeps `2^n` a normal float.
pub(crate) const EXP2_MIN_INPUT: f32 = -126.99999;
pub(crate) const EXP2_MAX_INPUT: f32 = 129.0;

/// Approximate base-2 logarithm for positive finite `x`.
///
/// Zero maps to `-127`, which drives any positive power to zero.
#[inline]
pub fn log2_approx(x: f32) -> f32 {
    let bits = x.to_bits();

    // Exponent shifted into the top of the mantissa of 2^8, minus the
    // implicit leading one and the bias.
    let n_biased = f32::from_bits(((bits & FLOAT_EXPONENT_MASK) >> 8) | EIGHT_BIASED_EXPONENT);
    let n = n_biased - f32::from_bits(IMPLICIT_LEADING_ONE);

    let y = f32::from_bits((bits & MANTISSA_MASK) | ZERO_BIASED_EXPONENT_IS_ONE);
    let mut pol5 = y * LOG2_C5 + LOG2_C4;
    pol5 = pol5 * y + LOG2_C3;
    pol5 = pol5 * y + LOG2_C2;
    pol5 = pol5 * y + LOG2_C1;
    pol5 = pol5 * y + LOG2_C0;
    let log2_y = (y - 1.0) * pol5;

    n + log2_y
}

/// Approximate `2^x`. Input is clamped to `[-126.99999, 129]`.
#[inline]
pub fn exp2_approx(x: f32) -> f32 {
    let x = x.min(EXP2_MAX_INPUT).max(EXP2_MIN_INPUT);

    // Round-half-to-even, matching the default MXCSR conversion.
    let n = (x - 0.5).round_ties_even() as i32;
    let two_n = f32::from_bits(((n + 127) as u32) << 23);

    let y = x - n as f32;
    let mut exp2_y = y * EXP2_C2 + EXP2_C1;
    exp2_y = exp2_y * y + EXP2_C0;

    exp2_y * two_n
}

/// Approximate `x^y` for non-negative `x`.
#[inline]
pub fn pow_approx(x: f32, y: f32) -> f32 {
    exp2_approx(y * log2_approx(x))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use test_strategy::proptest;

    use super::*;

    #[test]
    fn log2_of_powers_of_two_is_exact_enough() {
        for n in -20..20 {
            let x = 2.0f32.powi(n);
            assert!((log2_approx(x) - n as f32).abs() < 1e-4, "log2(2^{n})");
        }
    }

    #[test]
    fn log2_of_zero_is_floor() {
        assert_eq!(log2_approx(0.0), -127.0);
    }

    #[test]
    fn exp2_clamps_extremes() {
        assert_eq!(exp2_approx(-1000.0), exp2_approx(EXP2_MIN_INPUT));
        assert_eq!(exp2_approx(1000.0), exp2_approx(EXP2_MAX_INPUT));
        assert!(exp2_approx(EXP2_MIN_INPUT) >= 0.0);
    }

    #[test]
    fn pow_of_zero_gain_stays_zero() {
        assert_eq!(pow_approx(0.0, 2.0), 0.0);
        assert_eq!(pow_approx(0.0, 4.0), 0.0);
    }

    #[test]
    fn pow_of_one_is_near_one() {
        for y in [0.0f32, 0.5, 1.0, 2.0, 4.0] {
            let p = pow_approx(1.0, y);
            assert!((p - 1.0).abs() < 2e-3, "1^{y} = {p}");
        }
    }

    #[proptest]
    fn pow_matches_reference(#[strategy(1e-3f32..=4.0)] x: f32, #[strategy(0.0f32..=4.0)] y: f32) {
        let exact = (x as f64).powf(y as f64);
        let approx = pow_approx(x, y) as f64;
        let rel = (approx - exact).abs() / exact;
        prop_assert!(rel < 2e-3, "pow({x}, {y}): approx={approx}, exact={exact}, rel={rel}");
    }

    #[proptest]
    fn log2_matches_reference(#[strategy(1e-6f32..1e6)] x: f32) {
        let exact = (x as f64).log2();
        let approx = log2_approx(x) as f64;
        prop_assert!((approx - exact).abs() < 1e-4, "log2({x}): {approx} vs {exact}");
    }
}
