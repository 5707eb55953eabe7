//! 128-point real FFT.
//!
//! The real sequence is folded into a 64-point complex sequence
//! (`z[j] = x[2j] + i·x[2j+1]`), transformed with an iterative radix-2
//! FFT and then split back into the 65 bins of the real spectrum.
//!
//! Output uses the packed layout described in the crate docs: `a[0]` = DC,
//! `a[1]` = Nyquist, `a[2k], a[2k+1]` = bin `k` with the imaginary sign
//! inverted. The inverse is scaled by `N/2`.

use std::f64::consts::PI;

/// Fixed 128-point real FFT size.
pub const FFT_SIZE: usize = 128;

const HALF: usize = FFT_SIZE / 2;

/// Precomputed tables for the 128-point real FFT.
///
/// Construction computes the twiddles once; both transforms take `&self`
/// and work in place, so one instance can serve any number of blocks.
#[derive(Debug, Clone)]
pub struct Rdft {
    /// `(cos, sin)` of `2π·m/64`, `m < 32`, for the complex butterflies.
    butterfly: [(f32, f32); HALF / 2],
    /// `(cos, sin)` of `2π·k/128`, `k <= 64`, for the real/complex split.
    split: [(f32, f32); HALF + 1],
    /// 6-bit reversal permutation of `0..64`.
    bit_reverse: [u8; HALF],
}

impl Default for Rdft {
    fn default() -> Self {
        Self::new()
    }
}

impl Rdft {
    pub fn new() -> Self {
        let butterfly = std::array::from_fn(|m| {
            let theta = 2.0 * PI * m as f64 / HALF as f64;
            (theta.cos() as f32, theta.sin() as f32)
        });
        let split = std::array::from_fn(|k| {
            let theta = 2.0 * PI * k as f64 / FFT_SIZE as f64;
            (theta.cos() as f32, theta.sin() as f32)
        });
        let bits = HALF.trailing_zeros();
        let bit_reverse = std::array::from_fn(|j| ((j as u32).reverse_bits() >> (32 - bits)) as u8);
        Self {
            butterfly,
            split,
            bit_reverse,
        }
    }

    /// Forward transform: 128 real samples in, packed spectrum out.
    pub fn forward(&self, a: &mut [f32; FFT_SIZE]) {
        let mut zr = [0.0f32; HALF];
        let mut zi = [0.0f32; HALF];
        self.load_reversed(a, &mut zr, &mut zi);
        self.butterflies(&mut zr, &mut zi, false);

        for k in 1..HALF {
            let m = HALF - k;
            // E = (Z[k] + conj Z[m]) / 2, D = (Z[k] - conj Z[m]) / 2.
            let er = 0.5 * (zr[k] + zr[m]);
            let ei = 0.5 * (zi[k] - zi[m]);
            let dr = 0.5 * (zr[k] - zr[m]);
            let di = 0.5 * (zi[k] + zi[m]);
            // O = D / i.
            let (or, oi) = (di, -dr);
            // X = E + W^k·O with W = e^{-2πi/128}.
            let (c, s) = self.split[k];
            let xr = er + (or * c + oi * s);
            let xi = ei + (oi * c - or * s);
            a[2 * k] = xr;
            a[2 * k + 1] = -xi;
        }
        a[0] = zr[0] + zi[0];
        a[1] = zr[0] - zi[0];
    }

    /// Inverse transform: packed spectrum in, 128 real samples scaled by
    /// `N/2` out.
    pub fn inverse(&self, a: &mut [f32; FFT_SIZE]) {
        let bin = |k: usize| -> (f32, f32) {
            match k {
                0 => (a[0], 0.0),
                HALF => (a[1], 0.0),
                _ => (a[2 * k], -a[2 * k + 1]),
            }
        };

        let mut zr = [0.0f32; HALF];
        let mut zi = [0.0f32; HALF];
        for k in 0..HALF {
            let (xr, xi) = bin(k);
            let (yr, yi) = bin(HALF - k);
            // E = (X[k] + conj X[64-k]) / 2, D = (X[k] - conj X[64-k]) / 2.
            let er = 0.5 * (xr + yr);
            let ei = 0.5 * (xi - yi);
            let dr = 0.5 * (xr - yr);
            let di = 0.5 * (xi + yi);
            // O = W^{-k}·D.
            let (c, s) = self.split[k];
            let or = dr * c - di * s;
            let oi = di * c + dr * s;
            // Z = E + i·O, stored bit-reversed for the butterflies.
            let r = self.bit_reverse[k] as usize;
            zr[r] = er - oi;
            zi[r] = ei + or;
        }
        self.butterflies(&mut zr, &mut zi, true);

        for j in 0..HALF {
            a[2 * j] = zr[j];
            a[2 * j + 1] = zi[j];
        }
    }

    fn load_reversed(&self, a: &[f32; FFT_SIZE], zr: &mut [f32; HALF], zi: &mut [f32; HALF]) {
        for j in 0..HALF {
            let r = self.bit_reverse[j] as usize;
            zr[r] = a[2 * j];
            zi[r] = a[2 * j + 1];
        }
    }

    /// In-place radix-2 decimation-in-time butterflies over bit-reversed
    /// input. `inverse` selects `e^{+i}` twiddles; no normalization.
    fn butterflies(&self, zr: &mut [f32; HALF], zi: &mut [f32; HALF], inverse: bool) {
        let mut len = 2;
        while len <= HALF {
            let half = len / 2;
            let step = HALF / len;
            for start in (0..HALF).step_by(len) {
                for k in 0..half {
                    let (c, s) = self.butterfly[k * step];
                    let s = if inverse { s } else { -s };
                    let lo = start + k;
                    let hi = lo + half;
                    let vr = zr[hi] * c - zi[hi] * s;
                    let vi = zr[hi] * s + zi[hi] * c;
                    zr[hi] = zr[lo] - vr;
                    zi[hi] = zi[lo] - vi;
                    zr[lo] += vr;
                    zi[lo] += vi;
                }
            }
            len *= 2;
        }
    }
}
