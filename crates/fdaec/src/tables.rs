//! Window, curve and smoothing tables plus the tuned step-size constants.

use crate::common::PART_LEN1;
use crate::config::{AecConfig, FilterMode};

/// `sin(π·i/128)`: first half of a square-root Hann window over 128 samples.
#[rustfmt::skip]
pub(crate) static SQRT_HANNING: [f32; PART_LEN1] = [
    0.00000000, 0.02454123, 0.04906767, 0.07356456, 0.09801714, 0.12241068,
    0.14673047, 0.17096189, 0.19509032, 0.21910124, 0.24298018, 0.26671276,
    0.29028468, 0.31368174, 0.33688985, 0.35989504, 0.38268343, 0.40524131,
    0.42755509, 0.44961133, 0.47139674, 0.49289819, 0.51410274, 0.53499762,
    0.55557023, 0.57580819, 0.59569930, 0.61523159, 0.63439328, 0.65317284,
    0.67155895, 0.68954054, 0.70710678, 0.72424708, 0.74095113, 0.75720885,
    0.77301045, 0.78834643, 0.80320753, 0.81758481, 0.83146961, 0.84485357,
    0.85772861, 0.87008699, 0.88192126, 0.89322430, 0.90398929, 0.91420976,
    0.92387953, 0.93299280, 0.94154407, 0.94952818, 0.95694034, 0.96377607,
    0.97003125, 0.97570213, 0.98078528, 0.98527764, 0.98917651, 0.99247953,
    0.99518473, 0.99729046, 0.99879546, 0.99969882, 1.00000000,
];

/// Blend weight toward the full-band gain: `[0; 0.3·sqrt(linspace(0,1,64)) + 0.1]`.
#[rustfmt::skip]
pub(crate) static WEIGHT_CURVE: [f32; PART_LEN1] = [
    0.0000, 0.1000, 0.1378, 0.1535, 0.1655, 0.1756, 0.1845, 0.1926, 0.2000,
    0.2069, 0.2134, 0.2195, 0.2254, 0.2309, 0.2363, 0.2414, 0.2464, 0.2512,
    0.2558, 0.2604, 0.2648, 0.2690, 0.2732, 0.2773, 0.2813, 0.2852, 0.2890,
    0.2927, 0.2964, 0.3000, 0.3035, 0.3070, 0.3104, 0.3138, 0.3171, 0.3204,
    0.3236, 0.3268, 0.3299, 0.3330, 0.3360, 0.3390, 0.3420, 0.3449, 0.3478,
    0.3507, 0.3535, 0.3563, 0.3591, 0.3619, 0.3646, 0.3673, 0.3699, 0.3726,
    0.3752, 0.3777, 0.3803, 0.3828, 0.3854, 0.3878, 0.3903, 0.3928, 0.3952,
    0.3976, 0.4000,
];

/// Per-bin overdrive exponent scale: `sqrt(linspace(0,1,65)) + 1`.
#[rustfmt::skip]
pub(crate) static OVERDRIVE_CURVE: [f32; PART_LEN1] = [
    1.0000, 1.1250, 1.1768, 1.2165, 1.2500, 1.2795, 1.3062, 1.3307, 1.3536,
    1.3750, 1.3953, 1.4146, 1.4330, 1.4507, 1.4677, 1.4841, 1.5000, 1.5154,
    1.5303, 1.5449, 1.5590, 1.5728, 1.5863, 1.5995, 1.6124, 1.6250, 1.6374,
    1.6495, 1.6614, 1.6731, 1.6847, 1.6960, 1.7071, 1.7181, 1.7289, 1.7395,
    1.7500, 1.7603, 1.7706, 1.7806, 1.7906, 1.8004, 1.8101, 1.8197, 1.8292,
    1.8385, 1.8478, 1.8570, 1.8660, 1.8750, 1.8839, 1.8927, 1.9014, 1.9100,
    1.9186, 1.9270, 1.9354, 1.9437, 1.9520, 1.9601, 1.9682, 1.9763, 1.9843,
    1.9922, 2.0000,
];

/// PSD smoothing `(g0, g1)` indexed by `mult - 1`.
pub(crate) static NORMAL_SMOOTHING: [(f32, f32); 2] = [(0.9, 0.1), (0.93, 0.07)];
pub(crate) static EXTENDED_SMOOTHING: [(f32, f32); 2] = [(0.9, 0.1), (0.92, 0.08)];

/// Far-end PSD floor.
pub(crate) const MIN_FAR_END_PSD: f32 = 15.0;

/// Divergence hysteresis once the diverged state is set.
pub(crate) const DIVERGENCE_HYSTERESIS: f32 = 1.05;

/// `seSum / sdSum` above which the whole filter is reset (about 13 dB).
pub(crate) const RESET_RATIO: f32 = 19.95;

/// Far-end power smoothing `(decay, gain)`.
pub(crate) const FAR_POWER_SMOOTHING: (f32, f32) = (0.9, 0.1);

/// Overdrive smoothing `(decay, gain)` when the target is below / above the
/// current value.
pub(crate) const OVERDRIVE_FALLING: (f32, f32) = (0.99, 0.01);
pub(crate) const OVERDRIVE_RISING: (f32, f32) = (0.9, 0.1);

/// Initial value of the smoothed overdrive.
pub(crate) const INITIAL_OVERDRIVE: f32 = 2.0;

/// Blocks between partition-delay estimates, per unit of `mult`.
pub(crate) const DELAY_ESTIMATE_INTERVAL: usize = 10;

/// NLMS step size and error clipping threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepSize {
    pub mu: f32,
    pub threshold: f32,
}

const EXTENDED_STEP: StepSize = StepSize {
    mu: 0.4,
    threshold: 1e-6,
};
const NARROWBAND_STEP: StepSize = StepSize {
    mu: 0.6,
    threshold: 2e-6,
};
const WIDEBAND_STEP: StepSize = StepSize {
    mu: 0.5,
    threshold: 1.5e-6,
};

impl StepSize {
    pub(crate) fn for_config(config: &AecConfig) -> Self {
        match config.filter_mode {
            FilterMode::Extended => EXTENDED_STEP,
            FilterMode::Normal if config.sample_rate_hz == 8_000 => NARROWBAND_STEP,
            FilterMode::Normal => WIDEBAND_STEP,
        }
    }
}

/// PSD smoothing coefficients for a validated config.
pub(crate) fn smoothing_coefficients(mode: FilterMode, mult: usize) -> (f32, f32) {
    let table = match mode {
        FilterMode::Normal => &NORMAL_SMOOTHING,
        FilterMode::Extended => &EXTENDED_SMOOTHING,
    };
    table[mult.clamp(1, table.len()) - 1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqrt_hanning_matches_sine() {
        for (i, &w) in SQRT_HANNING.iter().enumerate() {
            let expected = (std::f64::consts::PI * i as f64 / 128.0).sin() as f32;
            assert!((w - expected).abs() < 1e-6, "index {i}: {w} vs {expected}");
        }
    }

    #[test]
    fn curves_are_monotonic() {
        for pair in WEIGHT_CURVE.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
        for pair in OVERDRIVE_CURVE.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
        assert_eq!(OVERDRIVE_CURVE[0], 1.0);
        assert_eq!(OVERDRIVE_CURVE[64], 2.0);
    }

    #[test]
    fn smoothing_coefficients_sum_to_one() {
        for table in [&NORMAL_SMOOTHING, &EXTENDED_SMOOTHING] {
            for &(g0, g1) in table.iter() {
                assert!((g0 + g1 - 1.0).abs() < 1e-6);
            }
        }
        assert_eq!(smoothing_coefficients(FilterMode::Normal, 2), (0.93, 0.07));
        assert_eq!(smoothing_coefficients(FilterMode::Extended, 2), (0.92, 0.08));
        assert_eq!(smoothing_coefficients(FilterMode::Extended, 1), (0.9, 0.1));
    }

    #[test]
    fn step_size_follows_mode_and_rate() {
        let narrow = AecConfig::for_sample_rate(8_000).unwrap();
        assert_eq!(StepSize::for_config(&narrow), NARROWBAND_STEP);
        let wide = AecConfig::for_sample_rate(32_000).unwrap();
        assert_eq!(StepSize::for_config(&wide), WIDEBAND_STEP);
        assert_eq!(StepSize::for_config(&narrow.extended()), EXTENDED_STEP);
    }
}
