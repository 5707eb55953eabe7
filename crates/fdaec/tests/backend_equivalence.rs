//! Scalar and detected backends driven through the full engine must agree.
//!
//! On CPUs without a vector backend both engines run the scalar kernels and
//! the comparison is trivially exact.

use fdaec::{
    AecConfig, AecCore, AnalysisSpectra, FilterMode, PART_LEN, PART_LEN1, SimdBackend,
    Spectrum, detect_backend,
};
use fdaec_proptest::comparison::{ComparisonResult, compare_f32_relative};
use fdaec_proptest::generators::{audio_block, block_sequence, gain_curve, sample_rate_hz};
use proptest::prelude::*;
use test_strategy::proptest;

const REL_TOLERANCE: f32 = 1e-5;
const ABS_FLOOR: f32 = 1e-6;

// ── Helpers ──────────────────────────────────────────────────────────────────

fn engines(config: AecConfig) -> (AecCore, AecCore) {
    let scalar = AecCore::with_backend(config, SimdBackend::Scalar).unwrap();
    let detected = AecCore::with_backend(config, detect_backend()).unwrap();
    (scalar, detected)
}

fn compare(actual: &[f32], expected: &[f32]) -> ComparisonResult {
    compare_f32_relative(actual, expected, REL_TOLERANCE, ABS_FLOOR)
}

fn assert_spectrum_eq(a: &Spectrum, b: &Spectrum, what: &str) {
    let re = compare(&b.re, &a.re);
    assert!(re.mismatches == 0, "{what} (re): {re}");
    let im = compare(&b.im, &a.im);
    assert!(im.mismatches == 0, "{what} (im): {im}");
}

fn assert_filters_eq(a: &AecCore, b: &AecCore, block: usize) {
    for (p, (wa, wb)) in a.filter().iter().zip(b.filter()).enumerate() {
        assert_spectrum_eq(wa, wb, &format!("block {block} partition {p}"));
    }
}

/// Deterministic uniform noise at 16-bit scale.
fn gen_noise(seed: u32, amplitude: f32) -> impl FnMut() -> [f32; PART_LEN] {
    let mut state = seed;
    move || {
        std::array::from_fn(|_| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            ((state >> 8) as f32 / (1u32 << 24) as f32 * 2.0 - 1.0) * amplitude
        })
    }
}

/// Runs one full block through both engines and compares every output.
fn run_block(
    scalar: &mut AecCore,
    detected: &mut AecCore,
    far: &[f32; PART_LEN],
    near: &[f32; PART_LEN],
    block: usize,
) {
    let mut error_s = [0.0; PART_LEN];
    let mut error_d = [0.0; PART_LEN];
    scalar.process_block(far, near, &mut error_s);
    detected.process_block(far, near, &mut error_d);
    let result = compare(&error_d, &error_s);
    assert!(result.mismatches == 0, "error block {block}: {result}");
    assert_filters_eq(scalar, detected, block);

    let mut spectra_s = AnalysisSpectra::default();
    let mut spectra_d = AnalysisSpectra::default();
    let coh_s = scalar.subband_coherence(&mut spectra_s);
    let coh_d = detected.subband_coherence(&mut spectra_d);
    assert_eq!(scalar.is_diverged(), detected.is_diverged(), "block {block}");
    assert_eq!(scalar.delay_partition(), detected.delay_partition());
    let cohde = compare(&coh_d.cohde, &coh_s.cohde);
    assert!(cohde.mismatches == 0, "cohde block {block}: {cohde}");
    let cohxd = compare(&coh_d.cohxd, &coh_s.cohxd);
    assert!(cohxd.mismatches == 0, "cohxd block {block}: {cohxd}");
    assert_spectrum_eq(&spectra_s.error, &spectra_d.error, "analysis error");

    let mut gain_s = coh_s.cohde;
    let mut gain_d = coh_s.cohde;
    scalar.overdrive_and_suppress(&mut gain_s, 0.6, &mut spectra_s.error);
    detected.overdrive_and_suppress(&mut gain_d, 0.6, &mut spectra_d.error);
    let gains = compare(&gain_d, &gain_s);
    assert!(gains.mismatches == 0, "gain block {block}: {gains}");
    assert_spectrum_eq(&spectra_s.error, &spectra_d.error, "suppressed error");
}

// ── Deterministic sequences ──────────────────────────────────────────────────

#[test]
fn echo_path_sequence_matches() {
    for mode in [FilterMode::Normal, FilterMode::Extended] {
        let config = AecConfig {
            filter_mode: mode,
            ..Default::default()
        };
        let (mut scalar, mut detected) = engines(config);
        let mut noise = gen_noise(7, 6_000.0);
        let mut previous = [0.0f32; PART_LEN];
        for block in 0..60 {
            let far = noise();
            // Half-gain echo delayed by 16 samples.
            let near: [f32; PART_LEN] = std::array::from_fn(|i| {
                0.5 * if i >= 16 {
                    far[i - 16]
                } else {
                    previous[PART_LEN - 16 + i]
                }
            });
            run_block(&mut scalar, &mut detected, &far, &near, block);
            previous = far;
        }
    }
}

#[test]
fn unrelated_near_end_matches() {
    let (mut scalar, mut detected) = engines(AecConfig::for_sample_rate(8_000).unwrap());
    let mut far_noise = gen_noise(1, 10_000.0);
    let mut near_noise = gen_noise(2, 3_000.0);
    for block in 0..50 {
        let far = far_noise();
        let near = near_noise();
        run_block(&mut scalar, &mut detected, &far, &near, block);
    }
}

#[test]
fn smooth_overdrive_is_backend_independent() {
    let (mut scalar, mut detected) = engines(AecConfig::default());
    for target in [0.5, 8.0, 3.0, 1.0] {
        assert_eq!(
            scalar.smooth_overdrive(target),
            detected.smooth_overdrive(target)
        );
    }
}

// ── Property tests ───────────────────────────────────────────────────────────

#[proptest(ProptestConfig { cases: 24, ..ProptestConfig::default() })]
fn random_blocks_match(
    #[strategy(sample_rate_hz())] sample_rate: u32,
    #[strategy(block_sequence(12_000.0, 1..=24))] far: Vec<[f32; PART_LEN]>,
    #[strategy(audio_block())] near_offset: [f32; PART_LEN],
) {
    let (mut scalar, mut detected) = engines(AecConfig::for_sample_rate(sample_rate).unwrap());
    for (block, far) in far.iter().enumerate() {
        let near: [f32; PART_LEN] = std::array::from_fn(|i| 0.3 * far[i] + near_offset[i]);
        run_block(&mut scalar, &mut detected, far, &near, block);
    }
}

#[proptest]
fn suppression_matches(
    #[strategy(gain_curve())] gain: [f32; PART_LEN1],
    #[strategy(0.0f32..1.0)] gain_fb: f32,
    #[strategy(0.5f32..6.0)] overdrive: f32,
) {
    let (mut scalar, mut detected) = engines(AecConfig::default());
    scalar.smooth_overdrive(overdrive);
    detected.smooth_overdrive(overdrive);

    let mut error_s = Spectrum::ZERO;
    for i in 0..PART_LEN1 {
        error_s.re[i] = 100.0 * i as f32;
        error_s.im[i] = -50.0 * i as f32;
    }
    let mut error_d = error_s;
    let mut gain_s = gain;
    let mut gain_d = gain;
    scalar.overdrive_and_suppress(&mut gain_s, gain_fb, &mut error_s);
    detected.overdrive_and_suppress(&mut gain_d, gain_fb, &mut error_d);

    let gains = compare(&gain_d, &gain_s);
    prop_assert!(gains.mismatches == 0, "{gains}");
    let re = compare(&error_d.re, &error_s.re);
    prop_assert!(re.mismatches == 0, "{re}");
    let im = compare(&error_d.im, &error_s.im);
    prop_assert!(im.mismatches == 0, "{im}");
}
