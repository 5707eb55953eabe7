//! Proptest strategies for echo canceller inputs.
//!
//! Signal amplitudes default to 16-bit integer scale, the range the
//! engine's step-size constants are tuned for.

use proptest::prelude::*;

/// Samples per block.
pub const BLOCK_LEN: usize = 64;
/// Bins per block spectrum.
pub const NUM_BINS: usize = BLOCK_LEN + 1;

/// Peak amplitude of a full-scale 16-bit sample.
pub const FULL_SCALE: f32 = 32_768.0;

fn to_array<const N: usize>(values: Vec<f32>) -> [f32; N] {
    let mut out = [0.0; N];
    out.copy_from_slice(&values);
    out
}

/// One block of uniform samples in `[-amplitude, amplitude]`.
pub fn block(amplitude: f32) -> impl Strategy<Value = [f32; BLOCK_LEN]> {
    prop::collection::vec(-amplitude..=amplitude, BLOCK_LEN).prop_map(to_array::<BLOCK_LEN>)
}

/// One block of speech-range samples.
pub fn audio_block() -> impl Strategy<Value = [f32; BLOCK_LEN]> {
    block(8_000.0)
}

/// Real and imaginary parts of a spectrum with every component in
/// `[-scale, scale]`.
pub fn spectrum_parts(scale: f32) -> impl Strategy<Value = ([f32; NUM_BINS], [f32; NUM_BINS])> {
    (
        prop::collection::vec(-scale..=scale, NUM_BINS).prop_map(to_array::<NUM_BINS>),
        prop::collection::vec(-scale..=scale, NUM_BINS).prop_map(to_array::<NUM_BINS>),
    )
}

/// Per-bin values in `[min, max]`, e.g. powers or PSDs.
pub fn bins(min: f32, max: f32) -> impl Strategy<Value = [f32; NUM_BINS]> {
    prop::collection::vec(min..=max, NUM_BINS).prop_map(to_array::<NUM_BINS>)
}

/// Per-bin suppression gains in `[0, 1]`.
pub fn gain_curve() -> impl Strategy<Value = [f32; NUM_BINS]> {
    bins(0.0, 1.0)
}

/// A sample rate the engine has tuning for.
pub fn sample_rate_hz() -> impl Strategy<Value = u32> {
    prop_oneof![Just(8_000u32), Just(16_000), Just(32_000), Just(48_000)]
}

/// Filter lengths from a single partition up to a long tail.
pub fn num_partitions() -> impl Strategy<Value = usize> {
    1usize..=32
}

/// A sequence of `len` blocks at the given amplitude.
pub fn block_sequence(
    amplitude: f32,
    len: std::ops::RangeInclusive<usize>,
) -> impl Strategy<Value = Vec<[f32; BLOCK_LEN]>> {
    prop::collection::vec(block(amplitude), len)
}
