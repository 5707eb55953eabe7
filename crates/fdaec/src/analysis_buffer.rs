//! Two-block sliding window of time-domain samples for windowed analysis.

use derive_more::Debug;

use crate::common::{PART_LEN, PART_LEN2};

/// The two most recent blocks of one signal, oldest first.
#[derive(Debug, Clone)]
pub struct AnalysisBuffer {
    #[debug(skip)]
    samples: [f32; PART_LEN2],
}

impl Default for AnalysisBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisBuffer {
    pub fn new() -> Self {
        Self {
            samples: [0.0; PART_LEN2],
        }
    }

    /// Shifts out the older block and appends `block` as the newest.
    pub fn push(&mut self, block: &[f32; PART_LEN]) {
        self.samples.copy_within(PART_LEN.., 0);
        self.samples[PART_LEN..].copy_from_slice(block);
    }

    pub fn samples(&self) -> &[f32; PART_LEN2] {
        &self.samples
    }

    pub fn clear(&mut self) {
        self.samples.fill(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_last_two_blocks() {
        let mut buffer = AnalysisBuffer::new();
        buffer.push(&[1.0; PART_LEN]);
        assert!(buffer.samples()[..PART_LEN].iter().all(|&v| v == 0.0));
        assert!(buffer.samples()[PART_LEN..].iter().all(|&v| v == 1.0));

        buffer.push(&[2.0; PART_LEN]);
        buffer.push(&[3.0; PART_LEN]);
        assert!(buffer.samples()[..PART_LEN].iter().all(|&v| v == 2.0));
        assert!(buffer.samples()[PART_LEN..].iter().all(|&v| v == 3.0));

        buffer.clear();
        assert!(buffer.samples().iter().all(|&v| v == 0.0));
    }
}
