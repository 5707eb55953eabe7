//! Partitioned-block frequency-domain echo canceller core.
//!
//! Provides the linear NLMS echo path (far-end history, filter-far,
//! error normalization, constrained filter adaptation), the smoothed PSD
//! tracker with divergence recovery, partition delay estimation, subband
//! coherence and the overdrive/suppress stage. Every block operation runs on
//! either a portable or an SSE2 backend chosen once per engine.
//!
//! Samples are expected at 16-bit integer scale (`-32768.0..32767.0`); the
//! step-size clipping thresholds are calibrated for that range.
//!
//! # Quick Start
//!
//! ```
//! use fdaec::{AecConfig, AecCore, AnalysisSpectra, PART_LEN, PART_LEN1};
//!
//! let config = AecConfig::for_sample_rate(16_000)?;
//! let mut aec = AecCore::new(config)?;
//!
//! let far = [0.0f32; PART_LEN];
//! let near = [0.0f32; PART_LEN];
//! let mut error = [0.0f32; PART_LEN];
//!
//! // For each 64-sample block:
//! aec.process_block(&far, &near, &mut error);
//! let mut spectra = AnalysisSpectra::default();
//! let coherence = aec.subband_coherence(&mut spectra);
//! let mut gain = coherence.cohde;
//! aec.overdrive_and_suppress(&mut gain, 0.5, &mut spectra.error);
//! # Ok::<(), fdaec::Error>(())
//! ```

#![deny(unsafe_op_in_unsafe_fn)]

pub(crate) mod analysis_buffer;
pub(crate) mod common;
pub mod config;
pub(crate) mod engine;
pub(crate) mod far_history;
pub mod fast_math;
pub mod kernels;
pub(crate) mod psd;
pub(crate) mod tables;

// Public re-exports.
pub use analysis_buffer::AnalysisBuffer;
pub use common::{PART_LEN, PART_LEN1, PART_LEN2, Spectrum};
pub use config::{AecConfig, Error, FilterMode};
pub use engine::{AecCore, AnalysisSpectra};
pub use far_history::FarHistory;
pub use fdaec_simd::{SimdBackend, detect_backend};
pub use kernels::{Coherence, Kernels};
pub use psd::PsdState;
pub use tables::StepSize;
