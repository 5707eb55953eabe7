//! The partitioned-block frequency-domain echo canceller core.
//!
//! [`AecCore`] owns every piece of per-stream state: the far-end spectrum
//! history, the filter bank, the smoothed far-end power, the two-block
//! analysis buffers, the PSD tracker and the delay estimate. Per block the
//! surrounding pipeline calls, in order:
//!
//! 1. [`AecCore::project`] (insert far-end spectrum and estimate the echo),
//! 2. [`AecCore::scale_error_signal`] on the caller-formed error spectrum,
//! 3. [`AecCore::filter_adaptation`] with the resulting gradient,
//! 4. [`AecCore::push_near_block`] / [`AecCore::push_error_block`],
//! 5. [`AecCore::subband_coherence`],
//! 6. [`AecCore::overdrive_and_suppress`].
//!
//! [`AecCore::process_block`] runs steps 1-4 on time-domain blocks using
//! overlap-save.

use derive_more::Debug;
use fdaec_fft::Rdft;
use fdaec_simd::{SimdBackend, detect_backend};
use tracing::{debug, trace, warn};

use crate::analysis_buffer::AnalysisBuffer;
use crate::common::{PART_LEN, PART_LEN1, PART_LEN2, Spectrum};
use crate::config::{AecConfig, Error};
use crate::far_history::FarHistory;
use crate::kernels::{Coherence, Kernels};
use crate::psd::PsdState;
use crate::tables::{
    DELAY_ESTIMATE_INTERVAL, FAR_POWER_SMOOTHING, INITIAL_OVERDRIVE, OVERDRIVE_FALLING,
    OVERDRIVE_RISING, StepSize, smoothing_coefficients,
};

/// Spectra produced by [`AecCore::subband_coherence`] for the suppressor.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AnalysisSpectra {
    /// Windowed near-end spectrum.
    pub near: Spectrum,
    /// Windowed error spectrum, replaced by `near` while diverged.
    pub error: Spectrum,
    /// Far-end spectrum aligned to the estimated echo delay.
    pub far: Spectrum,
}

/// Echo canceller core for one stream.
#[derive(Debug)]
pub struct AecCore {
    config: AecConfig,
    step: StepSize,
    coefficients: (f32, f32),
    kernels: Kernels,
    #[debug(skip)]
    rdft: Rdft,
    history: FarHistory,
    #[debug(skip)]
    filter: Vec<Spectrum>,
    #[debug(skip)]
    far_power: [f32; PART_LEN1],
    far_buffer: AnalysisBuffer,
    near_buffer: AnalysisBuffer,
    error_buffer: AnalysisBuffer,
    psd: PsdState,
    overdrive_smoothed: f32,
    delay_partition: usize,
    delay_countdown: usize,
}

impl AecCore {
    /// Creates an engine with the backend detected for this CPU.
    pub fn new(config: AecConfig) -> Result<Self, Error> {
        Self::with_backend(config, detect_backend())
    }

    /// Creates an engine bound to `backend` for its whole lifetime.
    pub fn with_backend(config: AecConfig, backend: SimdBackend) -> Result<Self, Error> {
        config.check()?;
        let num_partitions = config.num_partitions;
        debug!(
            backend = backend.name(),
            num_partitions,
            mult = config.mult,
            mode = ?config.filter_mode,
            "Creating echo canceller core"
        );
        Ok(Self {
            config,
            step: StepSize::for_config(&config),
            coefficients: smoothing_coefficients(config.filter_mode, config.mult),
            kernels: Kernels::new(backend),
            rdft: Rdft::new(),
            history: FarHistory::new(num_partitions),
            filter: vec![Spectrum::ZERO; num_partitions],
            far_power: [0.0; PART_LEN1],
            far_buffer: AnalysisBuffer::new(),
            near_buffer: AnalysisBuffer::new(),
            error_buffer: AnalysisBuffer::new(),
            psd: PsdState::new(),
            overdrive_smoothed: INITIAL_OVERDRIVE,
            delay_partition: 0,
            delay_countdown: 0,
        })
    }

    /// Returns every piece of state to its initial value. The config and
    /// backend are kept.
    pub fn reset(&mut self) {
        self.history.clear();
        self.filter.fill(Spectrum::ZERO);
        self.far_power = [0.0; PART_LEN1];
        self.far_buffer.clear();
        self.near_buffer.clear();
        self.error_buffer.clear();
        self.psd = PsdState::new();
        self.overdrive_smoothed = INITIAL_OVERDRIVE;
        self.delay_partition = 0;
        self.delay_countdown = 0;
    }

    pub fn config(&self) -> &AecConfig {
        &self.config
    }

    pub fn backend(&self) -> SimdBackend {
        self.kernels.backend()
    }

    pub fn step_size(&self) -> StepSize {
        self.step
    }

    /// Filter weights, partition `i` pairing with `history().slot(i)`.
    pub fn filter(&self) -> &[Spectrum] {
        &self.filter
    }

    pub fn history(&self) -> &FarHistory {
        &self.history
    }

    /// Smoothed far-end power used to whiten the error.
    pub fn far_power(&self) -> &[f32; PART_LEN1] {
        &self.far_power
    }

    pub fn psd(&self) -> &PsdState {
        &self.psd
    }

    pub fn is_diverged(&self) -> bool {
        self.psd.is_diverged()
    }

    /// Partition index of the last delay estimate.
    pub fn delay_partition(&self) -> usize {
        self.delay_partition
    }

    pub fn overdrive_smoothed(&self) -> f32 {
        self.overdrive_smoothed
    }

    /// Stores `far` as the newest history slot and folds its power into the
    /// smoothed far-end power.
    pub fn insert_far_spectrum(&mut self, far: &Spectrum) {
        self.history.push(far);
        let (decay, gain) = FAR_POWER_SMOOTHING;
        let scale = gain * self.config.num_partitions as f32;
        for (p, x) in self.far_power.iter_mut().zip(far.power()) {
            *p = decay * *p + scale * x;
        }
    }

    /// Adds the echo estimate for the current history into `echo`.
    pub fn filter_far(&self, echo: &mut Spectrum) {
        debug_assert_eq!(self.filter.len(), self.history.capacity());
        self.kernels.filter_far(&self.history, &self.filter, echo);
    }

    /// [`insert_far_spectrum`](Self::insert_far_spectrum) followed by
    /// [`filter_far`](Self::filter_far).
    pub fn project(&mut self, far: &Spectrum, echo: &mut Spectrum) {
        self.insert_far_spectrum(far);
        self.filter_far(echo);
    }

    /// Turns an error spectrum into the adaptation gradient in place.
    pub fn scale_error_signal(&self, error: &mut Spectrum) {
        self.kernels
            .scale_error_signal(&self.far_power, self.step, error);
    }

    /// Adds the constrained gradient to every partition of the filter.
    pub fn filter_adaptation(&mut self, gradient: &Spectrum) {
        debug_assert_eq!(self.filter.len(), self.history.capacity());
        self.kernels
            .filter_adaptation(&self.rdft, &self.history, gradient, &mut self.filter);
    }

    /// Partition holding the most filter energy. Ties go to the lowest
    /// index, so an all-zero filter yields 0.
    pub fn partition_delay(&self) -> usize {
        let backend = self.kernels.backend();
        let mut best = 0;
        let mut best_energy = 0.0;
        for (i, weights) in self.filter.iter().enumerate() {
            let energy = backend.energy(&weights.re, &weights.im);
            if energy > best_energy {
                best_energy = energy;
                best = i;
            }
        }
        best
    }

    pub fn push_near_block(&mut self, block: &[f32; PART_LEN]) {
        self.near_buffer.push(block);
    }

    pub fn push_error_block(&mut self, block: &[f32; PART_LEN]) {
        self.error_buffer.push(block);
    }

    /// One PSD smoothing step followed by the divergence check.
    ///
    /// While diverged, `error` is overwritten with `near`. In normal mode an
    /// error PSD more than 19.95 times the near-end PSD also zeroes the
    /// whole filter bank.
    pub fn smoothed_psd(&mut self, near: &Spectrum, error: &mut Spectrum, far: &Spectrum) {
        let was_diverged = self.psd.is_diverged();
        let (sd_sum, se_sum) =
            self.kernels
                .smoothed_psd(&mut self.psd, self.coefficients, near, error, far);
        let check = self.psd.check_divergence(sd_sum, se_sum);

        if check.diverged != was_diverged {
            debug!(diverged = check.diverged, sd_sum, se_sum, "Divergence state changed");
        }
        if check.diverged {
            *error = *near;
        }
        if check.reset && !self.config.filter_mode.is_extended() {
            warn!(sd_sum, se_sum, "Error energy far above near-end, resetting filter");
            self.filter.fill(Spectrum::ZERO);
        }
    }

    /// Windows and transforms the analysis buffers, updates the PSDs and
    /// returns the per-bin coherence.
    ///
    /// The delay estimate is refreshed every `10 * mult` calls, starting
    /// with the first.
    pub fn subband_coherence(&mut self, out: &mut AnalysisSpectra) -> Coherence {
        if self.delay_countdown == 0 {
            self.delay_partition = self.partition_delay();
            self.delay_countdown = DELAY_ESTIMATE_INTERVAL * self.config.mult;
            trace!(delay_partition = self.delay_partition, "Refreshed partition delay");
        }
        self.delay_countdown -= 1;

        out.far = *self.history.slot(self.delay_partition);

        let mut packed = [0.0f32; PART_LEN2];
        self.kernels
            .window_data(self.near_buffer.samples(), &mut packed);
        self.rdft.forward(&mut packed);
        self.kernels.store_as_complex(&packed, &mut out.near);

        self.kernels
            .window_data(self.error_buffer.samples(), &mut packed);
        self.rdft.forward(&mut packed);
        self.kernels.store_as_complex(&packed, &mut out.error);

        self.smoothed_psd(&out.near, &mut out.error, &out.far);

        let mut coherence = Coherence::default();
        self.kernels.coherence(&self.psd, &mut coherence);
        coherence
    }

    /// Blends `gain` toward `gain_fb` where it is higher, raises it to the
    /// smoothed overdrive and applies it to `error`.
    pub fn overdrive_and_suppress(
        &self,
        gain: &mut [f32; PART_LEN1],
        gain_fb: f32,
        error: &mut Spectrum,
    ) {
        self.kernels
            .overdrive_and_suppress(self.overdrive_smoothed, gain, gain_fb, error);
    }

    /// Moves the smoothed overdrive toward `target`, slowly when falling and
    /// quickly when rising. Returns the new value.
    pub fn smooth_overdrive(&mut self, target: f32) -> f32 {
        let (decay, gain) = if target < self.overdrive_smoothed {
            OVERDRIVE_FALLING
        } else {
            OVERDRIVE_RISING
        };
        self.overdrive_smoothed = decay * self.overdrive_smoothed + gain * target;
        self.overdrive_smoothed
    }

    /// Runs the linear echo path for one block.
    ///
    /// The far-end spectrum is taken over the two most recent far-end blocks
    /// and the echo estimate is read from the second half of its inverse
    /// transform. `error` receives `near - estimate`, and both `near` and
    /// `error` are pushed into the analysis buffers.
    pub fn process_block(
        &mut self,
        far: &[f32; PART_LEN],
        near: &[f32; PART_LEN],
        error: &mut [f32; PART_LEN],
    ) {
        self.far_buffer.push(far);
        let mut packed = *self.far_buffer.samples();
        self.rdft.forward(&mut packed);
        let mut far_spectrum = Spectrum::ZERO;
        self.kernels.store_as_complex(&packed, &mut far_spectrum);

        let mut echo = Spectrum::ZERO;
        self.project(&far_spectrum, &mut echo);

        let mut packed = echo.to_packed();
        self.rdft.inverse(&mut packed);
        let scale = 2.0 / PART_LEN2 as f32;
        for ((e, &d), &y) in error.iter_mut().zip(near).zip(&packed[PART_LEN..]) {
            *e = d - y * scale;
        }

        let mut packed = [0.0f32; PART_LEN2];
        packed[PART_LEN..].copy_from_slice(error);
        self.rdft.forward(&mut packed);
        let mut gradient = Spectrum::ZERO;
        self.kernels.store_as_complex(&packed, &mut gradient);

        self.scale_error_signal(&mut gradient);
        self.filter_adaptation(&gradient);

        self.push_near_block(near);
        self.push_error_block(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilterMode;

    fn core() -> AecCore {
        AecCore::with_backend(AecConfig::default(), SimdBackend::Scalar).unwrap()
    }

    fn tone(amplitude: f32) -> Spectrum {
        let mut s = Spectrum::ZERO;
        for i in 0..PART_LEN1 {
            s.re[i] = amplitude;
            s.im[i] = -amplitude * 0.5;
        }
        s
    }

    #[test]
    fn rejects_invalid_config() {
        let config = AecConfig {
            num_partitions: 0,
            ..Default::default()
        };
        assert_eq!(
            AecCore::new(config).unwrap_err(),
            Error::InvalidPartitionCount { num_partitions: 0 }
        );
    }

    #[test]
    fn starts_from_zero_state() {
        let aec = core();
        assert!(aec.filter().iter().all(Spectrum::is_zero));
        assert!(aec.far_power().iter().all(|&p| p == 0.0));
        assert_eq!(aec.overdrive_smoothed(), 2.0);
        assert_eq!(aec.delay_partition(), 0);
        assert!(!aec.is_diverged());
    }

    #[test]
    fn far_power_is_smoothed_and_scaled() {
        let mut aec = core();
        let far = tone(2.0);
        aec.insert_far_spectrum(&far);
        // 0.1 * 12 * (4 + 1)
        assert!((aec.far_power()[3] - 6.0).abs() < 1e-5);
        aec.insert_far_spectrum(&far);
        assert!((aec.far_power()[3] - (0.9 * 6.0 + 6.0)).abs() < 1e-4);
    }

    #[test]
    fn partition_delay_finds_energy() {
        let mut aec = core();
        assert_eq!(aec.partition_delay(), 0);
        aec.filter[7].re[10] = 1.0;
        aec.filter[3].im[4] = 0.5;
        assert_eq!(aec.partition_delay(), 7);
    }

    #[test]
    fn partition_delay_prefers_lowest_index_on_tie() {
        let mut aec = core();
        aec.filter[2].re[0] = 1.0;
        aec.filter[5].im[1] = 1.0;
        assert_eq!(aec.partition_delay(), 2);
    }

    #[test]
    fn overdrive_falls_slowly_and_rises_fast() {
        let mut aec = core();
        let fallen = aec.smooth_overdrive(0.0);
        assert!((fallen - 1.98).abs() < 1e-6);
        let risen = aec.smooth_overdrive(10.0);
        assert!((risen - (0.9 * 1.98 + 1.0)).abs() < 1e-5);
    }

    #[test]
    fn diverged_error_is_replaced_by_near() {
        let mut aec = core();
        let near = tone(1.0);
        let mut error = tone(2.0);
        let far = tone(1.0);
        aec.smoothed_psd(&near, &mut error, &far);
        assert!(aec.is_diverged());
        assert_eq!(error, near);
    }

    #[test]
    fn reset_only_in_normal_mode() {
        for mode in [FilterMode::Normal, FilterMode::Extended] {
            let config = AecConfig {
                filter_mode: mode,
                ..Default::default()
            };
            let mut aec = AecCore::with_backend(config, SimdBackend::Scalar).unwrap();
            aec.filter[1].re[5] = 0.25;
            let near = tone(1.0);
            let mut error = tone(5.0);
            aec.smoothed_psd(&near, &mut error, &near);
            assert_eq!(
                aec.filter().iter().all(Spectrum::is_zero),
                !mode.is_extended(),
                "{mode:?}"
            );
        }
    }

    #[test]
    fn reset_restores_initial_state() {
        let mut aec = core();
        aec.insert_far_spectrum(&tone(3.0));
        aec.filter[0].re[0] = 1.0;
        aec.smooth_overdrive(9.0);
        aec.reset();
        assert!(aec.filter().iter().all(Spectrum::is_zero));
        assert!(aec.history().iter().all(Spectrum::is_zero));
        assert_eq!(aec.overdrive_smoothed(), 2.0);
        assert!(aec.far_power().iter().all(|&p| p == 0.0));
    }

    #[test]
    fn silent_block_leaves_filter_untouched() {
        let mut aec = core();
        let mut error = [1.0; PART_LEN];
        aec.process_block(&[0.0; PART_LEN], &[0.0; PART_LEN], &mut error);
        assert!(error.iter().all(|&e| e == 0.0));
        assert!(aec.filter().iter().all(Spectrum::is_zero));
    }
}
