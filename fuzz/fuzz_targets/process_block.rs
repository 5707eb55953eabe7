#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use fdaec::{AecConfig, AecCore, AnalysisSpectra, PART_LEN, PART_LEN1};

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    /// Sample rate index: 0=8k, 1=16k, 2=32k, 3=48k
    sample_rate_idx: u8,
    /// Filter length (clamped to 1-64 partitions)
    partitions: u8,
    extended: bool,
    /// Interleaved far/near samples (clamped to 16-bit range)
    samples: Vec<f32>,
    /// Full-band suppression gain (clamped to [0, 1])
    gain_fb: f32,
    /// Overdrive targets fed to the smoother, one per block
    overdrive: Vec<f32>,
}

fn sample_rate(idx: u8) -> u32 {
    match idx % 4 {
        0 => 8000,
        1 => 16000,
        2 => 32000,
        _ => 48000,
    }
}

/// Clamp to the 16-bit range, replacing NaN/inf with 0.
fn sanitize_sample(s: f32) -> f32 {
    if s.is_finite() {
        s.clamp(-32768.0, 32767.0)
    } else {
        0.0
    }
}

fuzz_target!(|input: FuzzInput| {
    let Ok(mut config) = AecConfig::for_sample_rate(sample_rate(input.sample_rate_idx)) else {
        return;
    };
    if input.extended {
        config = config.extended();
    }
    config.num_partitions = usize::from(input.partitions % 64) + 1;
    let mut aec = AecCore::new(config).unwrap();

    let gain_fb = if input.gain_fb.is_finite() {
        input.gain_fb.clamp(0.0, 1.0)
    } else {
        0.5
    };

    let sanitized: Vec<f32> = input.samples.iter().copied().map(sanitize_sample).collect();
    let mut error = [0.0f32; PART_LEN];
    let mut spectra = AnalysisSpectra::default();
    for (block, chunk) in sanitized.chunks_exact(2 * PART_LEN).enumerate() {
        let far: [f32; PART_LEN] = std::array::from_fn(|i| chunk[2 * i]);
        let near: [f32; PART_LEN] = std::array::from_fn(|i| chunk[2 * i + 1]);

        aec.process_block(&far, &near, &mut error);
        assert!(error.iter().all(|v| v.is_finite()), "non-finite error");

        let coherence = aec.subband_coherence(&mut spectra);
        assert!(coherence.cohde.iter().all(|c| c.is_finite() && *c >= 0.0));
        assert!(coherence.cohxd.iter().all(|c| c.is_finite() && *c >= 0.0));
        assert!(aec.delay_partition() < config.num_partitions);

        if let Some(&target) = input.overdrive.get(block) {
            if target.is_finite() {
                aec.smooth_overdrive(target.clamp(0.0, 10.0));
            }
        }
        let mut gain: [f32; PART_LEN1] = coherence.cohde.map(|c| c.min(1.0));
        aec.overdrive_and_suppress(&mut gain, gain_fb, &mut spectra.error);
        assert!(gain.iter().all(|g| g.is_finite()));
    }
});
