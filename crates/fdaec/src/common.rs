//! Block sizes and the split-complex spectrum type shared by every stage.

use fdaec_fft::FFT_SIZE;

/// Samples per block.
pub const PART_LEN: usize = 64;
/// Complex bins per block spectrum (DC through Nyquist).
pub const PART_LEN1: usize = PART_LEN + 1;
/// Transform size: two blocks.
pub const PART_LEN2: usize = PART_LEN * 2;

const _: () = assert!(PART_LEN2 == FFT_SIZE);

/// Small additive guard used before every division.
pub(crate) const EPSILON: f32 = 1e-10;

/// One block spectrum stored as separate real and imaginary arrays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spectrum {
    pub re: [f32; PART_LEN1],
    pub im: [f32; PART_LEN1],
}

impl Default for Spectrum {
    fn default() -> Self {
        Self::ZERO
    }
}

impl Spectrum {
    pub const ZERO: Self = Self {
        re: [0.0; PART_LEN1],
        im: [0.0; PART_LEN1],
    };

    /// Unpacks a forward-transform output into complex form.
    ///
    /// The DC and Nyquist bins only carry real parts, so their imaginary
    /// parts are forced to zero.
    pub fn from_packed(packed: &[f32; PART_LEN2]) -> Self {
        let mut out = Self::ZERO;
        for i in 1..PART_LEN {
            out.re[i] = packed[2 * i];
            out.im[i] = packed[2 * i + 1];
        }
        out.re[0] = packed[0];
        out.re[PART_LEN] = packed[1];
        out
    }

    /// Packs back into the transform layout. Inverse of [`Self::from_packed`]
    /// for spectra whose DC and Nyquist imaginary parts are zero.
    pub fn to_packed(&self) -> [f32; PART_LEN2] {
        let mut packed = [0.0; PART_LEN2];
        packed[0] = self.re[0];
        packed[1] = self.re[PART_LEN];
        for i in 1..PART_LEN {
            packed[2 * i] = self.re[i];
            packed[2 * i + 1] = self.im[i];
        }
        packed
    }

    /// Per-bin squared magnitude.
    pub fn power(&self) -> [f32; PART_LEN1] {
        std::array::from_fn(|i| self.re[i] * self.re[i] + self.im[i] * self.im[i])
    }

    pub fn clear(&mut self) {
        *self = Self::ZERO;
    }

    pub fn is_zero(&self) -> bool {
        self.re.iter().chain(self.im.iter()).all(|&v| v == 0.0)
    }
}
