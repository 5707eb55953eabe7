//! Backend-dispatched block kernels.
//!
//! [`Kernels`] holds the backend chosen at engine construction and routes
//! each block operation to either the portable implementation in
//! [`generic`] or the SSE2 implementation. Both produce the same results
//! within floating-point tolerance and can be swapped freely.

pub(crate) mod generic;
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub(crate) mod sse2;

use fdaec_fft::Rdft;
use fdaec_simd::SimdBackend;

use crate::common::{PART_LEN, PART_LEN1, PART_LEN2, Spectrum};
use crate::far_history::FarHistory;
use crate::psd::PsdState;
use crate::tables::StepSize;

/// Per-bin coherence ratios from one Subband-Coherence step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coherence {
    /// Near-end / error coherence. Low values point to residual echo.
    pub cohde: [f32; PART_LEN1],
    /// Far-end / near-end coherence. High values point to echo leakage.
    pub cohxd: [f32; PART_LEN1],
}

impl Default for Coherence {
    fn default() -> Self {
        Self {
            cohde: [0.0; PART_LEN1],
            cohxd: [0.0; PART_LEN1],
        }
    }
}

/// Inverse-transforms a packed per-partition update and applies the
/// gradient constraint: samples `[PART_LEN, PART_LEN2)` are zeroed and the
/// first half is rescaled by `2 / PART_LEN2`.
pub fn time_domain_gradient(rdft: &Rdft, backend: SimdBackend, packed: &mut [f32; PART_LEN2]) {
    rdft.inverse(packed);
    packed[PART_LEN..].fill(0.0);
    backend.scale(&mut packed[..PART_LEN], 2.0 / PART_LEN2 as f32);
}

/// [`time_domain_gradient`] followed by the forward transform back to
/// packed spectral form.
pub fn constrain_gradient(rdft: &Rdft, backend: SimdBackend, packed: &mut [f32; PART_LEN2]) {
    time_domain_gradient(rdft, backend, packed);
    rdft.forward(packed);
}

/// The block kernels bound to one backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Kernels {
    backend: SimdBackend,
}

impl Kernels {
    pub fn new(backend: SimdBackend) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> SimdBackend {
        self.backend
    }

    /// Adds `sum_i slot(i) · filter[i]` into `echo`.
    pub(crate) fn filter_far(
        &self,
        history: &FarHistory,
        filter: &[Spectrum],
        echo: &mut Spectrum,
    ) {
        match self.backend {
            SimdBackend::Scalar => generic::filter_far(history, filter, echo),
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            // SAFETY: Sse2 is only constructed after confirming sse2 support.
            SimdBackend::Sse2 => unsafe { sse2::filter_far(history, filter, echo) },
        }
    }

    /// Whitens, clips and step-scales the error spectrum in place.
    pub(crate) fn scale_error_signal(
        &self,
        far_power: &[f32; PART_LEN1],
        step: StepSize,
        error: &mut Spectrum,
    ) {
        match self.backend {
            SimdBackend::Scalar => generic::scale_error_signal(far_power, step, error),
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            // SAFETY: Sse2 is only constructed after confirming sse2 support.
            SimdBackend::Sse2 => unsafe { sse2::scale_error_signal(far_power, step, error) },
        }
    }

    /// Adds the constrained gradient of every partition to the filter.
    pub(crate) fn filter_adaptation(
        &self,
        rdft: &Rdft,
        history: &FarHistory,
        gradient: &Spectrum,
        filter: &mut [Spectrum],
    ) {
        match self.backend {
            SimdBackend::Scalar => generic::filter_adaptation(rdft, history, gradient, filter),
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            // SAFETY: Sse2 is only constructed after confirming sse2 support.
            SimdBackend::Sse2 => unsafe {
                sse2::filter_adaptation(rdft, history, gradient, filter)
            },
        }
    }

    /// Blends, overdrives and applies the suppression gain.
    pub(crate) fn overdrive_and_suppress(
        &self,
        overdrive: f32,
        gain: &mut [f32; PART_LEN1],
        gain_fb: f32,
        error: &mut Spectrum,
    ) {
        match self.backend {
            SimdBackend::Scalar => generic::overdrive_and_suppress(overdrive, gain, gain_fb, error),
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            // SAFETY: Sse2 is only constructed after confirming sse2 support.
            SimdBackend::Sse2 => unsafe {
                sse2::overdrive_and_suppress(overdrive, gain, gain_fb, error)
            },
        }
    }

    /// Applies the symmetric square-root Hann window.
    pub(crate) fn window_data(&self, input: &[f32; PART_LEN2], out: &mut [f32; PART_LEN2]) {
        match self.backend {
            SimdBackend::Scalar => generic::window_data(input, out),
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            // SAFETY: Sse2 is only constructed after confirming sse2 support.
            SimdBackend::Sse2 => unsafe { sse2::window_data(input, out) },
        }
    }

    pub(crate) fn store_as_complex(&self, packed: &[f32; PART_LEN2], out: &mut Spectrum) {
        match self.backend {
            SimdBackend::Scalar => generic::store_as_complex(packed, out),
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            // SAFETY: Sse2 is only constructed after confirming sse2 support.
            SimdBackend::Sse2 => unsafe { sse2::store_as_complex(packed, out) },
        }
    }

    /// One PSD smoothing step. Returns `(sd_sum, se_sum)`.
    pub(crate) fn smoothed_psd(
        &self,
        psd: &mut PsdState,
        coefficients: (f32, f32),
        near: &Spectrum,
        error: &Spectrum,
        far: &Spectrum,
    ) -> (f32, f32) {
        match self.backend {
            SimdBackend::Scalar => generic::smoothed_psd(psd, coefficients, near, error, far),
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            // SAFETY: Sse2 is only constructed after confirming sse2 support.
            SimdBackend::Sse2 => unsafe { sse2::smoothed_psd(psd, coefficients, near, error, far) },
        }
    }

    pub(crate) fn coherence(&self, psd: &PsdState, out: &mut Coherence) {
        match self.backend {
            SimdBackend::Scalar => generic::coherence(psd, out),
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            // SAFETY: Sse2 is only constructed after confirming sse2 support.
            SimdBackend::Sse2 => unsafe { sse2::coherence(psd, out) },
        }
    }
}
