#![doc = include_str!("../README.md")]
#![deny(unsafe_op_in_unsafe_fn)]

mod fallback;

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
mod sse2;

/// Available SIMD backends, selected at runtime based on CPU features.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimdBackend {
    /// Scalar fallback, available on every platform.
    Scalar,
    /// x86/x86_64 SSE2 (128-bit, 4 floats at a time).
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    Sse2,
}

impl SimdBackend {
    /// Returns the name of this backend.
    pub fn name(self) -> &'static str {
        match self {
            Self::Scalar => "scalar",
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            Self::Sse2 => "sse2",
        }
    }

    /// Whether this backend processes more than one float per instruction.
    pub fn is_vectorized(self) -> bool {
        !matches!(self, Self::Scalar)
    }

    /// Energy of a split complex vector: `sum(re[i]^2 + im[i]^2)`.
    ///
    /// `re` and `im` must have the same length.
    pub fn energy(self, re: &[f32], im: &[f32]) -> f32 {
        debug_assert_eq!(re.len(), im.len());
        match self {
            Self::Scalar => fallback::energy(re, im),
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            // SAFETY: detect_backend() only returns Sse2 after confirming sse2 support.
            Self::Sse2 => unsafe { sse2::energy(re, im) },
        }
    }

    /// In-place scaling: `x[i] *= factor`.
    pub fn scale(self, x: &mut [f32], factor: f32) {
        match self {
            Self::Scalar => fallback::scale(x, factor),
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            // SAFETY: detect_backend() only returns Sse2 after confirming sse2 support.
            Self::Sse2 => unsafe { sse2::scale(x, factor) },
        }
    }
}

// Runtime CPU feature detection via cpufeatures (atomic-cached).
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
cpufeatures::new!(has_sse2, "sse2");

/// Detect the best available SIMD backend for the current CPU.
///
/// Uses runtime feature detection on x86/x86_64 (cached atomically after
/// first call via `cpufeatures`). Falls back to scalar everywhere else, or
/// when the `force-scalar` feature is enabled.
pub fn detect_backend() -> SimdBackend {
    #[cfg(all(
        any(target_arch = "x86", target_arch = "x86_64"),
        not(feature = "force-scalar")
    ))]
    {
        if has_sse2::get() {
            return SimdBackend::Sse2;
        }
    }

    SimdBackend::Scalar
}
