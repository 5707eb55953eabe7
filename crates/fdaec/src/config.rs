//! Engine configuration.

/// Upper bound on the filter length in partitions.
pub const MAX_PARTITIONS: usize = 64;

/// Partitions used by [`AecConfig::default`].
pub const DEFAULT_PARTITIONS: usize = 12;

/// Partitions used for the extended filter in [`AecConfig::extended`].
pub const EXTENDED_PARTITIONS: usize = 32;

/// Sample rates the engine has step-size tuning for.
pub const SUPPORTED_SAMPLE_RATES_HZ: [u32; 4] = [8_000, 16_000, 32_000, 48_000];

/// Selects the step size, error threshold and PSD smoothing table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FilterMode {
    /// Sample-rate dependent step size with catastrophic-divergence reset.
    #[default]
    Normal,
    /// Fixed, smaller step size for long tails. Never resets the filter.
    Extended,
}

impl FilterMode {
    pub fn is_extended(self) -> bool {
        matches!(self, Self::Extended)
    }
}

/// Error returned when an [`AecConfig`] cannot be used to build an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Zero partitions, or more than [`MAX_PARTITIONS`].
    InvalidPartitionCount { num_partitions: usize },
    /// Block-size multiplier outside `1..=2`.
    InvalidMultiplier { mult: usize },
    /// Sample rate without step-size tuning.
    UnsupportedSampleRate { sample_rate_hz: u32 },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::InvalidPartitionCount { num_partitions } => write!(
                f,
                "invalid partition count {num_partitions}; expected 1..={MAX_PARTITIONS}",
            ),
            Self::InvalidMultiplier { mult } => {
                write!(f, "invalid block-size multiplier {mult}; expected 1 or 2")
            }
            Self::UnsupportedSampleRate { sample_rate_hz } => write!(
                f,
                "unsupported sample rate {sample_rate_hz}; expected one of {SUPPORTED_SAMPLE_RATES_HZ:?}",
            ),
        }
    }
}

impl std::error::Error for Error {}

/// Fixed configuration of one engine instance.
///
/// All fields are read once at construction; there is no hot reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AecConfig {
    /// Filter length in blocks (default: 12).
    pub num_partitions: usize,
    /// Sample-rate block-size multiplier, 1 for 8 kHz, 2 otherwise (default: 2).
    pub mult: usize,
    /// Normal or extended filter (default: normal).
    pub filter_mode: FilterMode,
    /// Stream sample rate, selects the normal-mode step size (default: 16000).
    pub sample_rate_hz: u32,
}

impl Default for AecConfig {
    fn default() -> Self {
        Self {
            num_partitions: DEFAULT_PARTITIONS,
            mult: 2,
            filter_mode: FilterMode::Normal,
            sample_rate_hz: 16_000,
        }
    }
}

impl AecConfig {
    /// Config for `sample_rate_hz` with the multiplier derived from it.
    pub fn for_sample_rate(sample_rate_hz: u32) -> Result<Self, Error> {
        if !SUPPORTED_SAMPLE_RATES_HZ.contains(&sample_rate_hz) {
            return Err(Error::UnsupportedSampleRate { sample_rate_hz });
        }
        Ok(Self {
            mult: if sample_rate_hz == 8_000 { 1 } else { 2 },
            sample_rate_hz,
            ..Default::default()
        })
    }

    /// Switches to the extended filter with its longer default tail.
    pub fn extended(self) -> Self {
        Self {
            num_partitions: EXTENDED_PARTITIONS,
            filter_mode: FilterMode::Extended,
            ..self
        }
    }

    /// Validates and clamps parameters to usable ranges.
    /// Returns `true` if no changes were needed.
    pub fn validate(&mut self) -> bool {
        let mut ok = true;
        ok &= limit_usize(&mut self.num_partitions, 1, MAX_PARTITIONS);
        ok &= limit_usize(&mut self.mult, 1, 2);
        if !SUPPORTED_SAMPLE_RATES_HZ.contains(&self.sample_rate_hz) {
            self.sample_rate_hz = 16_000;
            ok = false;
        }
        ok
    }

    /// Checks the config without modifying it.
    pub fn check(&self) -> Result<(), Error> {
        if self.num_partitions == 0 || self.num_partitions > MAX_PARTITIONS {
            return Err(Error::InvalidPartitionCount {
                num_partitions: self.num_partitions,
            });
        }
        if !(1..=2).contains(&self.mult) {
            return Err(Error::InvalidMultiplier { mult: self.mult });
        }
        if !SUPPORTED_SAMPLE_RATES_HZ.contains(&self.sample_rate_hz) {
            return Err(Error::UnsupportedSampleRate {
                sample_rate_hz: self.sample_rate_hz,
            });
        }
        Ok(())
    }
}

fn limit_usize(value: &mut usize, min: usize, max: usize) -> bool {
    let clamped = (*value).clamp(min, max);
    let unchanged = *value == clamped;
    *value = clamped;
    unchanged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let mut config = AecConfig::default();
        assert!(config.check().is_ok());
        assert!(config.validate());
        assert_eq!(config, AecConfig::default());
    }

    #[test]
    fn narrowband_uses_unit_multiplier() {
        let config = AecConfig::for_sample_rate(8_000).unwrap();
        assert_eq!(config.mult, 1);
        let config = AecConfig::for_sample_rate(48_000).unwrap();
        assert_eq!(config.mult, 2);
    }

    #[test]
    fn rejects_unsupported_sample_rate() {
        let err = AecConfig::for_sample_rate(44_100).unwrap_err();
        assert_eq!(
            err,
            Error::UnsupportedSampleRate {
                sample_rate_hz: 44_100
            }
        );
        assert!(err.to_string().contains("44100"));
    }

    #[test]
    fn check_reports_each_problem() {
        let config = AecConfig {
            num_partitions: 0,
            ..Default::default()
        };
        assert_eq!(
            config.check(),
            Err(Error::InvalidPartitionCount { num_partitions: 0 })
        );

        let config = AecConfig {
            mult: 3,
            ..Default::default()
        };
        assert_eq!(config.check(), Err(Error::InvalidMultiplier { mult: 3 }));
    }

    #[test]
    fn validate_clamps_out_of_range_values() {
        let mut config = AecConfig {
            num_partitions: 1000,
            mult: 0,
            filter_mode: FilterMode::Normal,
            sample_rate_hz: 11_025,
        };
        assert!(!config.validate());
        assert_eq!(config.num_partitions, MAX_PARTITIONS);
        assert_eq!(config.mult, 1);
        assert_eq!(config.sample_rate_hz, 16_000);
        assert!(config.check().is_ok());
    }

    #[test]
    fn extended_switches_mode_and_tail() {
        let config = AecConfig::default().extended();
        assert!(config.filter_mode.is_extended());
        assert_eq!(config.num_partitions, EXTENDED_PARTITIONS);
        assert!(config.check().is_ok());
    }
}
