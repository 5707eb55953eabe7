#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use fdaec::{AecConfig, AecCore, PART_LEN1, SimdBackend, Spectrum, detect_backend};

/// One block operation applied to both backends.
#[derive(Debug, Arbitrary)]
enum Op {
    InsertFar { scale: u8, seed: u32 },
    FilterFar,
    Adapt { seed: u32 },
    Psd { seed: u32, error_scale: u8 },
    CompareFilters,
}

fn spectrum(seed: u32, scale: f32) -> Spectrum {
    let mut state = seed;
    let mut next = move || {
        state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        ((state >> 8) as f32 / (1u32 << 24) as f32 * 2.0 - 1.0) * scale
    };
    let mut s = Spectrum::ZERO;
    for i in 0..PART_LEN1 {
        s.re[i] = next();
        s.im[i] = next();
    }
    s
}

fn close(a: f32, b: f32) -> bool {
    let diff = (a - b).abs();
    diff <= 1e-6 || diff <= 1e-4 * a.abs().max(b.abs())
}

fuzz_target!(|ops: Vec<Op>| {
    let config = AecConfig::default();
    let mut scalar = AecCore::with_backend(config, SimdBackend::Scalar).unwrap();
    let mut detected = AecCore::with_backend(config, detect_backend()).unwrap();

    for op in ops.iter().take(256) {
        match *op {
            Op::InsertFar { scale, seed } => {
                let far = spectrum(seed, f32::from(scale) * 1_000.0);
                scalar.insert_far_spectrum(&far);
                detected.insert_far_spectrum(&far);
            }
            Op::FilterFar => {
                let mut a = Spectrum::ZERO;
                let mut b = Spectrum::ZERO;
                scalar.filter_far(&mut a);
                detected.filter_far(&mut b);
                for i in 0..PART_LEN1 {
                    assert!(close(a.re[i], b.re[i]) && close(a.im[i], b.im[i]));
                }
            }
            Op::Adapt { seed } => {
                let mut error = spectrum(seed, 1.0e4);
                scalar.scale_error_signal(&mut error);
                scalar.filter_adaptation(&error);
                detected.filter_adaptation(&error);
            }
            Op::Psd { seed, error_scale } => {
                let near = spectrum(seed, 1.0e4);
                let far = spectrum(seed.rotate_left(7), 1.0e4);
                let error = spectrum(seed ^ 0x5555_5555, f32::from(error_scale) * 100.0);
                let (mut ea, mut eb) = (error, error);
                scalar.smoothed_psd(&near, &mut ea, &far);
                detected.smoothed_psd(&near, &mut eb, &far);
                assert_eq!(scalar.is_diverged(), detected.is_diverged());
            }
            Op::CompareFilters => {
                for (wa, wb) in scalar.filter().iter().zip(detected.filter()) {
                    for i in 0..PART_LEN1 {
                        assert!(close(wa.re[i], wb.re[i]) && close(wa.im[i], wb.im[i]));
                    }
                }
            }
        }
    }
});
