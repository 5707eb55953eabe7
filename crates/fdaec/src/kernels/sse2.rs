//! SSE2 block kernels (x86/x86_64).
//!
//! Bins are processed four at a time over `0..PART_LEN`; the Nyquist bin is
//! handled by a scalar tail using the same arithmetic as the portable
//! kernels.

#[cfg(target_arch = "x86")]
use std::arch::x86::*;
#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

use fdaec_fft::Rdft;
use fdaec_simd::SimdBackend;

use crate::common::{EPSILON, PART_LEN, PART_LEN1, PART_LEN2, Spectrum};
use crate::far_history::FarHistory;
use crate::fast_math::{
    EIGHT_BIASED_EXPONENT, EXP2_C0, EXP2_C1, EXP2_C2, EXP2_MAX_INPUT, EXP2_MIN_INPUT,
    FLOAT_EXPONENT_MASK, IMPLICIT_LEADING_ONE, LOG2_C0, LOG2_C1, LOG2_C2, LOG2_C3, LOG2_C4,
    LOG2_C5, MANTISSA_MASK, ZERO_BIASED_EXPONENT_IS_ONE, pow_approx,
};
use crate::kernels::{Coherence, constrain_gradient};
use crate::psd::PsdState;
use crate::tables::{MIN_FAR_END_PSD, OVERDRIVE_CURVE, SQRT_HANNING, StepSize, WEIGHT_CURVE};

const SHUFFLE_EVEN: i32 = 0b10_00_10_00; // _MM_SHUFFLE(2,0,2,0)
const SHUFFLE_ODD: i32 = 0b11_01_11_01; // _MM_SHUFFLE(3,1,3,1)
const SHUFFLE_REVERSE: i32 = 0b00_01_10_11; // _MM_SHUFFLE(0,1,2,3)

/// # Safety
///
/// The CPU must support SSE2.
#[target_feature(enable = "sse2")]
pub(crate) unsafe fn filter_far(history: &FarHistory, filter: &[Spectrum], echo: &mut Spectrum) {
    for (i, w) in filter.iter().enumerate() {
        let x = history.slot(i);
        // SAFETY: every access covers `j..j + 4` with `j + 4 <= PART_LEN`.
        unsafe {
            for j in (0..PART_LEN).step_by(4) {
                let x_re = _mm_loadu_ps(x.re.as_ptr().add(j));
                let x_im = _mm_loadu_ps(x.im.as_ptr().add(j));
                let w_re = _mm_loadu_ps(w.re.as_ptr().add(j));
                let w_im = _mm_loadu_ps(w.im.as_ptr().add(j));
                let y_re = _mm_loadu_ps(echo.re.as_ptr().add(j));
                let y_im = _mm_loadu_ps(echo.im.as_ptr().add(j));
                let a = _mm_mul_ps(x_re, w_re);
                let b = _mm_mul_ps(x_im, w_im);
                let c = _mm_mul_ps(x_re, w_im);
                let d = _mm_mul_ps(x_im, w_re);
                let e = _mm_sub_ps(a, b);
                let f = _mm_add_ps(c, d);
                _mm_storeu_ps(echo.re.as_mut_ptr().add(j), _mm_add_ps(y_re, e));
                _mm_storeu_ps(echo.im.as_mut_ptr().add(j), _mm_add_ps(y_im, f));
            }
        }
        let j = PART_LEN;
        echo.re[j] += x.re[j] * w.re[j] - x.im[j] * w.im[j];
        echo.im[j] += x.re[j] * w.im[j] + x.im[j] * w.re[j];
    }
}

/// # Safety
///
/// The CPU must support SSE2.
#[target_feature(enable = "sse2")]
pub(crate) unsafe fn scale_error_signal(
    far_power: &[f32; PART_LEN1],
    step: StepSize,
    error: &mut Spectrum,
) {
    let eps = _mm_set1_ps(EPSILON);
    let mu = _mm_set1_ps(step.mu);
    let threshold = _mm_set1_ps(step.threshold);

    // SAFETY: every access covers `i..i + 4` with `i + 4 <= PART_LEN`.
    unsafe {
        for i in (0..PART_LEN).step_by(4) {
            let x_pow = _mm_add_ps(_mm_loadu_ps(far_power.as_ptr().add(i)), eps);
            let mut re = _mm_div_ps(_mm_loadu_ps(error.re.as_ptr().add(i)), x_pow);
            let mut im = _mm_div_ps(_mm_loadu_ps(error.im.as_ptr().add(i)), x_pow);

            let abs = _mm_sqrt_ps(_mm_add_ps(_mm_mul_ps(re, re), _mm_mul_ps(im, im)));
            let bigger = _mm_cmpgt_ps(abs, threshold);
            let clip = _mm_div_ps(threshold, _mm_add_ps(abs, eps));
            let re_clipped = _mm_and_ps(bigger, _mm_mul_ps(re, clip));
            let im_clipped = _mm_and_ps(bigger, _mm_mul_ps(im, clip));
            re = _mm_or_ps(_mm_andnot_ps(bigger, re), re_clipped);
            im = _mm_or_ps(_mm_andnot_ps(bigger, im), im_clipped);

            _mm_storeu_ps(error.re.as_mut_ptr().add(i), _mm_mul_ps(re, mu));
            _mm_storeu_ps(error.im.as_mut_ptr().add(i), _mm_mul_ps(im, mu));
        }
    }

    let i = PART_LEN;
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

/// # Safety
///
/// The CPU must support SSE2.
#[target_feature(enable = "sse2")]
pub(crate) unsafe fn filter_adaptation(
    rdft: &Rdft,
    history: &FarHistory,
    gradient: &Spectrum,
    filter: &mut [Spectrum],
) {
    let g = gradient;
    let mut packed = [0.0f32; PART_LEN2];
    for (i, w) in filter.iter_mut().enumerate() {
        let x = history.slot(i);

        // SAFETY: spectrum reads cover `j..j + 4` with `j + 4 <= PART_LEN`;
        // packed writes cover `2j..2j + 8 <= PART_LEN2`.
        unsafe {
            for j in (0..PART_LEN).step_by(4) {
                let x_re = _mm_loadu_ps(x.re.as_ptr().add(j));
                let x_im = _mm_loadu_ps(x.im.as_ptr().add(j));
                let e_re = _mm_loadu_ps(g.re.as_ptr().add(j));
                let e_im = _mm_loadu_ps(g.im.as_ptr().add(j));
                // conj(x) · e
                let a = _mm_mul_ps(x_re, e_re);
                let b = _mm_mul_ps(x_im, e_im);
                let c = _mm_mul_ps(x_re, e_im);
                let d = _mm_mul_ps(x_im, e_re);
                let re = _mm_add_ps(a, b);
                let im = _mm_sub_ps(c, d);
                _mm_storeu_ps(packed.as_mut_ptr().add(2 * j), _mm_unpacklo_ps(re, im));
                _mm_storeu_ps(packed.as_mut_ptr().add(2 * j + 4), _mm_unpackhi_ps(re, im));
            }
        }
        packed[1] = x.re[PART_LEN] * g.re[PART_LEN] + x.im[PART_LEN] * g.im[PART_LEN];

        constrain_gradient(rdft, SimdBackend::Sse2, &mut packed);

        let dc_im = w.im[0];
        w.re[PART_LEN] += packed[1];
        // SAFETY: same bounds as above.
        unsafe {
            for j in (0..PART_LEN).step_by(4) {
                let p0 = _mm_loadu_ps(packed.as_ptr().add(2 * j));
                let p4 = _mm_loadu_ps(packed.as_ptr().add(2 * j + 4));
                let p_re = _mm_shuffle_ps(p0, p4, SHUFFLE_EVEN);
                let p_im = _mm_shuffle_ps(p0, p4, SHUFFLE_ODD);
                let w_re = _mm_loadu_ps(w.re.as_ptr().add(j));
                let w_im = _mm_loadu_ps(w.im.as_ptr().add(j));
                _mm_storeu_ps(w.re.as_mut_ptr().add(j), _mm_add_ps(w_re, p_re));
                _mm_storeu_ps(w.im.as_mut_ptr().add(j), _mm_add_ps(w_im, p_im));
            }
        }
        // Slot 1 held the Nyquist real part, not the DC imaginary part.
        w.im[0] = dc_im;
    }
}

/// Four-wide `a^b`, operation for operation the same as
/// [`pow_approx`](crate::fast_math::pow_approx).
///
/// # Safety
///
/// The CPU must support SSE2.
#[inline]
#[target_feature(enable = "sse2")]
unsafe fn pow_ps(a: __m128, b: __m128) -> __m128 {
    let one = _mm_castsi128_ps(_mm_set1_epi32(ZERO_BIASED_EXPONENT_IS_ONE as i32));

    let log2_a = {
        let exponent = _mm_and_ps(a, _mm_castsi128_ps(_mm_set1_epi32(FLOAT_EXPONENT_MASK as i32)));
        let n_1 = _mm_castsi128_ps(_mm_srli_epi32(_mm_castps_si128(exponent), 8));
        let n_0 = _mm_or_ps(n_1, _mm_castsi128_ps(_mm_set1_epi32(EIGHT_BIASED_EXPONENT as i32)));
        let n = _mm_sub_ps(n_0, _mm_castsi128_ps(_mm_set1_epi32(IMPLICIT_LEADING_ONE as i32)));

        let mantissa = _mm_and_ps(a, _mm_castsi128_ps(_mm_set1_epi32(MANTISSA_MASK as i32)));
        let y = _mm_or_ps(mantissa, one);

        let mut pol5 = _mm_add_ps(_mm_mul_ps(y, _mm_set1_ps(LOG2_C5)), _mm_set1_ps(LOG2_C4));
        pol5 = _mm_add_ps(_mm_mul_ps(pol5, y), _mm_set1_ps(LOG2_C3));
        pol5 = _mm_add_ps(_mm_mul_ps(pol5, y), _mm_set1_ps(LOG2_C2));
        pol5 = _mm_add_ps(_mm_mul_ps(pol5, y), _mm_set1_ps(LOG2_C1));
        pol5 = _mm_add_ps(_mm_mul_ps(pol5, y), _mm_set1_ps(LOG2_C0));
        let log2_y = _mm_mul_ps(_mm_sub_ps(y, one), pol5);

        _mm_add_ps(n, log2_y)
    };

    let x = _mm_mul_ps(b, log2_a);

    let x = _mm_max_ps(
        _mm_min_ps(x, _mm_set1_ps(EXP2_MAX_INPUT)),
        _mm_set1_ps(EXP2_MIN_INPUT),
    );
    let n = _mm_cvtps_epi32(_mm_sub_ps(x, _mm_set1_ps(0.5)));
    let two_n = _mm_castsi128_ps(_mm_slli_epi32(_mm_add_epi32(n, _mm_set1_epi32(127)), 23));
    let y = _mm_sub_ps(x, _mm_cvtepi32_ps(n));
    let mut exp2_y = _mm_add_ps(_mm_mul_ps(y, _mm_set1_ps(EXP2_C2)), _mm_set1_ps(EXP2_C1));
    exp2_y = _mm_add_ps(_mm_mul_ps(exp2_y, y), _mm_set1_ps(EXP2_C0));

    _mm_mul_ps(exp2_y, two_n)
}

/// # Safety
///
/// The CPU must support SSE2.
#[target_feature(enable = "sse2")]
pub(crate) unsafe fn overdrive_and_suppress(
    overdrive: f32,
    gain: &mut [f32; PART_LEN1],
    gain_fb: f32,
    error: &mut Spectrum,
) {
    let fb = _mm_set1_ps(gain_fb);
    let one = _mm_set1_ps(1.0);
    let minus_one = _mm_set1_ps(-1.0);
    let od = _mm_set1_ps(overdrive);

    // SAFETY: every access covers `i..i + 4` with `i + 4 <= PART_LEN`.
    unsafe {
        for i in (0..PART_LEN).step_by(4) {
            let mut h = _mm_loadu_ps(gain.as_ptr().add(i));
            let wc = _mm_loadu_ps(WEIGHT_CURVE.as_ptr().add(i));
            let bigger = _mm_cmpgt_ps(h, fb);
            let blended = _mm_add_ps(_mm_mul_ps(wc, fb), _mm_mul_ps(_mm_sub_ps(one, wc), h));
            h = _mm_or_ps(_mm_andnot_ps(bigger, h), _mm_and_ps(bigger, blended));

            let exponent = _mm_mul_ps(od, _mm_loadu_ps(OVERDRIVE_CURVE.as_ptr().add(i)));
            h = pow_ps(h, exponent);
            _mm_storeu_ps(gain.as_mut_ptr().add(i), h);

            let re = _mm_mul_ps(_mm_loadu_ps(error.re.as_ptr().add(i)), h);
            let im = _mm_mul_ps(_mm_loadu_ps(error.im.as_ptr().add(i)), h);
            // Undo the transform's inverted imaginary sign.
            let im = _mm_mul_ps(im, minus_one);
            _mm_storeu_ps(error.re.as_mut_ptr().add(i), re);
            _mm_storeu_ps(error.im.as_mut_ptr().add(i), im);
        }
    }

    let i = PART_LEN;
    if gain[i] > gain_fb {
        gain[i] = WEIGHT_CURVE[i] * gain_fb + (1.0 - WEIGHT_CURVE[i]) * gain[i];
    }
    gain[i] = pow_approx(gain[i], overdrive * OVERDRIVE_CURVE[i]);
    error.re[i] *= gain[i];
    error.im[i] *= gain[i];
    error.im[i] = -error.im[i];
}

/// # Safety
///
/// The CPU must support SSE2.
#[target_feature(enable = "sse2")]
pub(crate) unsafe fn window_data(input: &[f32; PART_LEN2], out: &mut [f32; PART_LEN2]) {
    // SAFETY: `i + 4 <= PART_LEN`, and the reversed window load starts at
    // `PART_LEN - i - 3 >= 1` and ends at `PART_LEN - i + 1 <= PART_LEN + 1`.
    unsafe {
        for i in (0..PART_LEN).step_by(4) {
            let first = _mm_loadu_ps(input.as_ptr().add(i));
            let second = _mm_loadu_ps(input.as_ptr().add(PART_LEN + i));
            let window = _mm_loadu_ps(SQRT_HANNING.as_ptr().add(i));
            let window_rev = _mm_loadu_ps(SQRT_HANNING.as_ptr().add(PART_LEN - i - 3));
            let window_rev = _mm_shuffle_ps(window_rev, window_rev, SHUFFLE_REVERSE);
            _mm_storeu_ps(out.as_mut_ptr().add(i), _mm_mul_ps(first, window));
            _mm_storeu_ps(out.as_mut_ptr().add(PART_LEN + i), _mm_mul_ps(second, window_rev));
        }
    }
}

/// # Safety
///
/// The CPU must support SSE2.
#[target_feature(enable = "sse2")]
pub(crate) unsafe fn store_as_complex(packed: &[f32; PART_LEN2], out: &mut Spectrum) {
    // SAFETY: reads cover `2i..2i + 8 <= PART_LEN2`, writes `i..i + 4 <= PART_LEN`.
    unsafe {
        for i in (0..PART_LEN).step_by(4) {
            let p0 = _mm_loadu_ps(packed.as_ptr().add(2 * i));
            let p4 = _mm_loadu_ps(packed.as_ptr().add(2 * i + 4));
            _mm_storeu_ps(out.re.as_mut_ptr().add(i), _mm_shuffle_ps(p0, p4, SHUFFLE_EVEN));
            _mm_storeu_ps(out.im.as_mut_ptr().add(i), _mm_shuffle_ps(p0, p4, SHUFFLE_ODD));
        }
    }
    out.im[0] = 0.0;
    out.im[PART_LEN] = 0.0;
    out.re[0] = packed[0];
    out.re[PART_LEN] = packed[1];
}

/// # Safety
///
/// The CPU must support SSE2.
#[target_feature(enable = "sse2")]
pub(crate) unsafe fn smoothed_psd(
    psd: &mut PsdState,
    (g0, g1): (f32, f32),
    near: &Spectrum,
    error: &Spectrum,
    far: &Spectrum,
) -> (f32, f32) {
    let (d, e, x) = (near, error, far);
    let g0v = _mm_set1_ps(g0);
    let g1v = _mm_set1_ps(g1);
    let floor = _mm_set1_ps(MIN_FAR_END_PSD);

    // SAFETY: every access covers `i..i + 4` with `i + 4 <= PART_LEN`.
    unsafe {
        for i in (0..PART_LEN).step_by(4) {
            let d_re = _mm_loadu_ps(d.re.as_ptr().add(i));
            let d_im = _mm_loadu_ps(d.im.as_ptr().add(i));
            let e_re = _mm_loadu_ps(e.re.as_ptr().add(i));
            let e_im = _mm_loadu_ps(e.im.as_ptr().add(i));
            let x_re = _mm_loadu_ps(x.re.as_ptr().add(i));
            let x_im = _mm_loadu_ps(x.im.as_ptr().add(i));

            let d_pow = _mm_add_ps(_mm_mul_ps(d_re, d_re), _mm_mul_ps(d_im, d_im));
            let e_pow = _mm_add_ps(_mm_mul_ps(e_re, e_re), _mm_mul_ps(e_im, e_im));
            let x_pow = _mm_max_ps(
                _mm_add_ps(_mm_mul_ps(x_re, x_re), _mm_mul_ps(x_im, x_im)),
                floor,
            );

            let sd = _mm_add_ps(
                _mm_mul_ps(g0v, _mm_loadu_ps(psd.sd.as_ptr().add(i))),
                _mm_mul_ps(g1v, d_pow),
            );
            let se = _mm_add_ps(
                _mm_mul_ps(g0v, _mm_loadu_ps(psd.se.as_ptr().add(i))),
                _mm_mul_ps(g1v, e_pow),
            );
            let sx = _mm_add_ps(
                _mm_mul_ps(g0v, _mm_loadu_ps(psd.sx.as_ptr().add(i))),
                _mm_mul_ps(g1v, x_pow),
            );
            _mm_storeu_ps(psd.sd.as_mut_ptr().add(i), sd);
            _mm_storeu_ps(psd.se.as_mut_ptr().add(i), se);
            _mm_storeu_ps(psd.sx.as_mut_ptr().add(i), sx);

            let de_re = _mm_add_ps(_mm_mul_ps(d_re, e_re), _mm_mul_ps(d_im, e_im));
            let de_im = _mm_sub_ps(_mm_mul_ps(d_re, e_im), _mm_mul_ps(d_im, e_re));
            let sde_re = _mm_add_ps(
                _mm_mul_ps(g0v, _mm_loadu_ps(psd.sde.re.as_ptr().add(i))),
                _mm_mul_ps(g1v, de_re),
            );
            let sde_im = _mm_add_ps(
                _mm_mul_ps(g0v, _mm_loadu_ps(psd.sde.im.as_ptr().add(i))),
                _mm_mul_ps(g1v, de_im),
            );
            _mm_storeu_ps(psd.sde.re.as_mut_ptr().add(i), sde_re);
            _mm_storeu_ps(psd.sde.im.as_mut_ptr().add(i), sde_im);

            let dx_re = _mm_add_ps(_mm_mul_ps(d_re, x_re), _mm_mul_ps(d_im, x_im));
            let dx_im = _mm_sub_ps(_mm_mul_ps(d_re, x_im), _mm_mul_ps(d_im, x_re));
            let sxd_re = _mm_add_ps(
                _mm_mul_ps(g0v, _mm_loadu_ps(psd.sxd.re.as_ptr().add(i))),
                _mm_mul_ps(g1v, dx_re),
            );
            let sxd_im = _mm_add_ps(
                _mm_mul_ps(g0v, _mm_loadu_ps(psd.sxd.im.as_ptr().add(i))),
                _mm_mul_ps(g1v, dx_im),
            );
            _mm_storeu_ps(psd.sxd.re.as_mut_ptr().add(i), sxd_re);
            _mm_storeu_ps(psd.sxd.im.as_mut_ptr().add(i), sxd_im);
        }
    }

    let i = PART_LEN;
    psd.sd[i] = g0 * psd.sd[i] + g1 * (d.re[i] * d.re[i] + d.im[i] * d.im[i]);
    psd.se[i] = g0 * psd.se[i] + g1 * (e.re[i] * e.re[i] + e.im[i] * e.im[i]);
    psd.sx[i] =
        g0 * psd.sx[i] + g1 * (x.re[i] * x.re[i] + x.im[i] * x.im[i]).max(MIN_FAR_END_PSD);
    psd.sde.re[i] = g0 * psd.sde.re[i] + g1 * (d.re[i] * e.re[i] + d.im[i] * e.im[i]);
    psd.sde.im[i] = g0 * psd.sde.im[i] + g1 * (d.re[i] * e.im[i] - d.im[i] * e.re[i]);
    psd.sxd.re[i] = g0 * psd.sxd.re[i] + g1 * (d.re[i] * x.re[i] + d.im[i] * x.im[i]);
    psd.sxd.im[i] = g0 * psd.sxd.im[i] + g1 * (d.re[i] * x.im[i] - d.im[i] * x.re[i]);

    // Summed in bin order so the divergence decision matches the portable
    // kernel exactly.
    let mut sd_sum = 0.0;
    let mut se_sum = 0.0;
    for (&sd, &se) in psd.sd.iter().zip(&psd.se) {
        sd_sum += sd;
        se_sum += se;
    }
    (sd_sum, se_sum)
}

/// # Safety
///
/// The CPU must support SSE2.
#[target_feature(enable = "sse2")]
pub(crate) unsafe fn coherence(psd: &PsdState, out: &mut Coherence) {
    let eps = _mm_set1_ps(EPSILON);

    // SAFETY: every access covers `i..i + 4` with `i + 4 <= PART_LEN`.
    unsafe {
        for i in (0..PART_LEN).step_by(4) {
            let sd = _mm_loadu_ps(psd.sd.as_ptr().add(i));
            let se = _mm_loadu_ps(psd.se.as_ptr().add(i));
            let sx = _mm_loadu_ps(psd.sx.as_ptr().add(i));
            let sd_se = _mm_add_ps(_mm_mul_ps(sd, se), eps);
            let sx_sd = _mm_add_ps(_mm_mul_ps(sx, sd), eps);

            let sde_re = _mm_loadu_ps(psd.sde.re.as_ptr().add(i));
            let sde_im = _mm_loadu_ps(psd.sde.im.as_ptr().add(i));
            let sxd_re = _mm_loadu_ps(psd.sxd.re.as_ptr().add(i));
            let sxd_im = _mm_loadu_ps(psd.sxd.im.as_ptr().add(i));

            let cohde = _mm_add_ps(_mm_mul_ps(sde_re, sde_re), _mm_mul_ps(sde_im, sde_im));
            let cohxd = _mm_add_ps(_mm_mul_ps(sxd_re, sxd_re), _mm_mul_ps(sxd_im, sxd_im));
            _mm_storeu_ps(out.cohde.as_mut_ptr().add(i), _mm_div_ps(cohde, sd_se));
            _mm_storeu_ps(out.cohxd.as_mut_ptr().add(i), _mm_div_ps(cohxd, sx_sd));
        }
    }

    let i = PART_LEN;
    out.cohde[i] = (psd.sde.re[i] * psd.sde.re[i] + psd.sde.im[i] * psd.sde.im[i])
        / (psd.sd[i] * psd.se[i] + EPSILON);
    out.cohxd[i] = (psd.sxd.re[i] * psd.sxd.re[i] + psd.sxd.im[i] * psd.sxd.im[i])
        / (psd.sx[i] * psd.sd[i] + EPSILON);
}
