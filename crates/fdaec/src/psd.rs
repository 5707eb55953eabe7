//! Smoothed auto- and cross-power spectra with divergence tracking.

use derive_more::Debug;

use crate::common::{PART_LEN1, Spectrum};
use crate::tables::{DIVERGENCE_HYSTERESIS, MIN_FAR_END_PSD, RESET_RATIO};

/// Exponentially smoothed PSDs of the near-end (`sd`), error (`se`) and
/// far-end (`sx`) spectra, plus the near/error (`sde`) and near/far (`sxd`)
/// cross-spectra.
#[derive(Debug, Clone)]
pub struct PsdState {
    #[debug(skip)]
    pub(crate) sd: [f32; PART_LEN1],
    #[debug(skip)]
    pub(crate) se: [f32; PART_LEN1],
    #[debug(skip)]
    pub(crate) sx: [f32; PART_LEN1],
    #[debug(skip)]
    pub(crate) sde: Spectrum,
    #[debug(skip)]
    pub(crate) sxd: Spectrum,
    pub(crate) diverged: bool,
}

impl Default for PsdState {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of the divergence check after one PSD update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DivergenceCheck {
    /// Error spectrum should be replaced by the near-end spectrum.
    pub(crate) diverged: bool,
    /// Error energy dominates the near-end by more than the reset ratio.
    pub(crate) reset: bool,
}

impl PsdState {
    pub fn new() -> Self {
        Self {
            sd: [0.0; PART_LEN1],
            se: [0.0; PART_LEN1],
            sx: [MIN_FAR_END_PSD; PART_LEN1],
            sde: Spectrum::ZERO,
            sxd: Spectrum::ZERO,
            diverged: false,
        }
    }

    /// Near-end PSD.
    pub fn sd(&self) -> &[f32; PART_LEN1] {
        &self.sd
    }

    /// Error PSD.
    pub fn se(&self) -> &[f32; PART_LEN1] {
        &self.se
    }

    /// Far-end PSD, floored at the minimum far-end level.
    pub fn sx(&self) -> &[f32; PART_LEN1] {
        &self.sx
    }

    /// Near/error cross-PSD.
    pub fn sde(&self) -> &Spectrum {
        &self.sde
    }

    /// Near/far cross-PSD.
    pub fn sxd(&self) -> &Spectrum {
        &self.sxd
    }

    pub fn is_diverged(&self) -> bool {
        self.diverged
    }

    /// Updates the diverged flag from the summed PSDs.
    ///
    /// Once set, the error sum must fall below `sd_sum / 1.05` to clear it.
    pub(crate) fn check_divergence(&mut self, sd_sum: f32, se_sum: f32) -> DivergenceCheck {
        let bias = if self.diverged {
            DIVERGENCE_HYSTERESIS
        } else {
            1.0
        };
        self.diverged = bias * se_sum > sd_sum;
        DivergenceCheck {
            diverged: self.diverged,
            reset: se_sum > RESET_RATIO * sd_sum,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_converged_with_floored_far_end() {
        let psd = PsdState::new();
        assert!(!psd.is_diverged());
        assert!(psd.sx().iter().all(|&v| v == MIN_FAR_END_PSD));
        assert!(psd.sd().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn divergence_needs_error_above_near() {
        let mut psd = PsdState::new();
        assert!(!psd.check_divergence(100.0, 100.0).diverged);
        assert!(psd.check_divergence(100.0, 100.5).diverged);
    }

    #[test]
    fn recovery_uses_hysteresis_band() {
        let mut psd = PsdState::new();
        assert!(psd.check_divergence(100.0, 101.0).diverged);
        // Inside the band: 1.05 * 97 > 100, still diverged.
        assert!(psd.check_divergence(100.0, 97.0).diverged);
        // Below sd_sum / 1.05.
        assert!(!psd.check_divergence(100.0, 95.0).diverged);
        // Back in the band, but the flag is cleared so no bias applies.
        assert!(!psd.check_divergence(100.0, 97.0).diverged);
    }

    #[test]
    fn reset_only_above_ratio() {
        let mut psd = PsdState::new();
        assert!(!psd.check_divergence(1.0, 19.9).reset);
        assert!(psd.check_divergence(1.0, 20.0).reset);
    }
}
