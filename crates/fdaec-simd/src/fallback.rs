//! Scalar fallback implementations of SIMD operations.

pub(crate) fn energy(re: &[f32], im: &[f32]) -> f32 {
    re.iter().zip(im.iter()).map(|(r, i)| r * r + i * i).sum()
}

pub(crate) fn scale(x: &mut [f32], factor: f32) {
    for v in x.iter_mut() {
        *v *= factor;
    }
}
