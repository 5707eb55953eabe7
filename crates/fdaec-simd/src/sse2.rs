//! SSE2 implementations of SIMD operations (x86/x86_64).

#[cfg(target_arch = "x86")]
use std::arch::x86::*;
#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

/// SSE2 energy of a split complex vector, 4 bins at a time.
///
/// # Safety
///
/// The CPU must support SSE2.
#[target_feature(enable = "sse2")]
pub(crate) unsafe fn energy(re: &[f32], im: &[f32]) -> f32 {
    let len = re.len().min(im.len());
    let chunks = len / 4;

    let re_ptr = re.as_ptr();
    let im_ptr = im.as_ptr();

    // SAFETY: all loads stay below `chunks * 4 <= len`.
    let mut result = unsafe {
        let mut acc = _mm_setzero_ps();
        for i in 0..chunks {
            let offset = i * 4;
            let vr = _mm_loadu_ps(re_ptr.add(offset));
            let vi = _mm_loadu_ps(im_ptr.add(offset));
            acc = _mm_add_ps(acc, _mm_mul_ps(vr, vr));
            acc = _mm_add_ps(acc, _mm_mul_ps(vi, vi));
        }
        horizontal_sum(acc)
    };

    for i in chunks * 4..len {
        result += re[i] * re[i] + im[i] * im[i];
    }
    result
}

/// SSE2 in-place scaling.
///
/// # Safety
///
/// The CPU must support SSE2.
#[target_feature(enable = "sse2")]
pub(crate) unsafe fn scale(x: &mut [f32], factor: f32) {
    let len = x.len();
    let chunks = len / 4;
    let ptr = x.as_mut_ptr();

    // SAFETY: all loads and stores stay below `chunks * 4 <= len`.
    unsafe {
        let vf = _mm_set1_ps(factor);
        for i in 0..chunks {
            let offset = i * 4;
            let v = _mm_loadu_ps(ptr.add(offset));
            _mm_storeu_ps(ptr.add(offset), _mm_mul_ps(v, vf));
        }
    }

    for v in &mut x[chunks * 4..] {
        *v *= factor;
    }
}

/// Reduce an __m128 to a scalar sum: `(A+C) + (B+D)`.
#[inline]
#[target_feature(enable = "sse2")]
unsafe fn horizontal_sum(v: __m128) -> f32 {
    let hi = _mm_movehl_ps(v, v);
    let sum = _mm_add_ps(v, hi);
    let shuf = _mm_shuffle_ps(sum, sum, 1);
    _mm_cvtss_f32(_mm_add_ss(sum, shuf))
}
