//! Portable implementations of the block kernels.

use fdaec_fft::Rdft;
use fdaec_simd::SimdBackend;

use crate::common::{EPSILON, PART_LEN, PART_LEN1, PART_LEN2, Spectrum};
use crate::far_history::FarHistory;
use crate::fast_math::pow_approx;
use crate::kernels::{Coherence, constrain_gradient};
use crate::psd::PsdState;
use crate::tables::{MIN_FAR_END_PSD, OVERDRIVE_CURVE, SQRT_HANNING, StepSize, WEIGHT_CURVE};

pub(crate) fn filter_far(history: &FarHistory, filter: &[Spectrum], echo: &mut Spectrum) {
    for (i, weights) in filter.iter().enumerate() {
        let x = history.slot(i);
        for j in 0..PART_LEN1 {
            echo.re[j] += x.re[j] * weights.re[j] - x.im[j] * weights.im[j];
            echo.im[j] += x.re[j] * weights.im[j] + x.im[j] * weights.re[j];
        }
    }
}

pub(crate) fn scale_error_signal(
    far_power: &[f32; PART_LEN1],
    step: StepSize,
    error: &mut Spectrum,
) {
    for i in 0..PART_LEN1 {
        let mut re = error.re[i] / (far_power[i] + EPSILON);
        let mut im = error.im[i] / (far_power[i] + EPSILON);
        let abs = (re * re + im * im).sqrt();
        if abs > step.threshold {
            let clip = step.threshold / (abs + EPSILON);
            re *= clip;
            im *= clip;
        }
        error.re[i] = re * step.mu;
        error.im[i] = im * step.mu;
    }
}

/// Packs `conj(x) · e` for one partition into transform layout. The real
/// part of the Nyquist product goes into slot 1.
pub(crate) fn conjugate_product(x: &Spectrum, gradient: &Spectrum, packed: &mut [f32; PART_LEN2]) {
    for j in 0..PART_LEN {
        packed[2 * j] = x.re[j] * gradient.re[j] + x.im[j] * gradient.im[j];
        packed[2 * j + 1] = x.re[j] * gradient.im[j] - x.im[j] * gradient.re[j];
    }
    packed[1] = x.re[PART_LEN] * gradient.re[PART_LEN] + x.im[PART_LEN] * gradient.im[PART_LEN];
}

/// Adds a constrained packed update to one partition's weights. The DC
/// imaginary part is left as is; the Nyquist real part takes slot 1.
pub(crate) fn accumulate_update(packed: &[f32; PART_LEN2], weights: &mut Spectrum) {
    weights.re[0] += packed[0];
    weights.re[PART_LEN] += packed[1];
    for j in 1..PART_LEN {
        weights.re[j] += packed[2 * j];
        weights.im[j] += packed[2 * j + 1];
    }
}

pub(crate) fn filter_adaptation(
    rdft: &Rdft,
    history: &FarHistory,
    gradient: &Spectrum,
    filter: &mut [Spectrum],
) {
    let mut packed = [0.0f32; PART_LEN2];
    for (i, weights) in filter.iter_mut().enumerate() {
        conjugate_product(history.slot(i), gradient, &mut packed);
        constrain_gradient(rdft, SimdBackend::Scalar, &mut packed);
        accumulate_update(&packed, weights);
    }
}

pub(crate) fn overdrive_and_suppress(
    overdrive: f32,
    gain: &mut [f32; PART_LEN1],
    gain_fb: f32,
    error: &mut Spectrum,
) {
    for i in 0..PART_LEN1 {
        if gain[i] > gain_fb {
            gain[i] = WEIGHT_CURVE[i] * gain_fb + (1.0 - WEIGHT_CURVE[i]) * gain[i];
        }
        gain[i] = pow_approx(gain[i], overdrive * OVERDRIVE_CURVE[i]);

        error.re[i] *= gain[i];
        error.im[i] *= gain[i];
        // Undo the transform's inverted imaginary sign.
        error.im[i] = -error.im[i];
    }
}

pub(crate) fn window_data(input: &[f32; PART_LEN2], out: &mut [f32; PART_LEN2]) {
    for i in 0..PART_LEN {
        out[i] = input[i] * SQRT_HANNING[i];
        out[PART_LEN + i] = input[PART_LEN + i] * SQRT_HANNING[PART_LEN - i];
    }
}

pub(crate) fn store_as_complex(packed: &[f32; PART_LEN2], out: &mut Spectrum) {
    *out = Spectrum::from_packed(packed);
}

/// One smoothing step of every PSD. Returns `(sd_sum, se_sum)` over the
/// updated near-end and error PSDs.
pub(crate) fn smoothed_psd(
    psd: &mut PsdState,
    (g0, g1): (f32, f32),
    near: &Spectrum,
    error: &Spectrum,
    far: &Spectrum,
) -> (f32, f32) {
    let (d, e, x) = (near, error, far);
    let mut sd_sum = 0.0;
    let mut se_sum = 0.0;
    for i in 0..PART_LEN1 {
        psd.sd[i] = g0 * psd.sd[i] + g1 * (d.re[i] * d.re[i] + d.im[i] * d.im[i]);
        psd.se[i] = g0 * psd.se[i] + g1 * (e.re[i] * e.re[i] + e.im[i] * e.im[i]);
        psd.sx[i] = g0 * psd.sx[i]
            + g1 * (x.re[i] * x.re[i] + x.im[i] * x.im[i]).max(MIN_FAR_END_PSD);

        psd.sde.re[i] = g0 * psd.sde.re[i] + g1 * (d.re[i] * e.re[i] + d.im[i] * e.im[i]);
        psd.sde.im[i] = g0 * psd.sde.im[i] + g1 * (d.re[i] * e.im[i] - d.im[i] * e.re[i]);

        psd.sxd.re[i] = g0 * psd.sxd.re[i] + g1 * (d.re[i] * x.re[i] + d.im[i] * x.im[i]);
        psd.sxd.im[i] = g0 * psd.sxd.im[i] + g1 * (d.re[i] * x.im[i] - d.im[i] * x.re[i]);

        sd_sum += psd.sd[i];
        se_sum += psd.se[i];
    }
    (sd_sum, se_sum)
}

pub(crate) fn coherence(psd: &PsdState, out: &mut Coherence) {
    for i in 0..PART_LEN1 {
        out.cohde[i] = (psd.sde.re[i] * psd.sde.re[i] + psd.sde.im[i] * psd.sde.im[i])
            / (psd.sd[i] * psd.se[i] + EPSILON);
        out.cohxd[i] = (psd.sxd.re[i] * psd.sxd.re[i] + psd.sxd.im[i] * psd.sxd.im[i])
            / (psd.sx[i] * psd.sd[i] + EPSILON);
    }
}
