//! Element-wise comparison of float buffers.

use std::fmt;

/// Outcome of comparing two equally long buffers.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonResult {
    pub max_abs_diff: f32,
    pub max_abs_diff_index: usize,
    pub mean_abs_diff: f32,
    /// Elements outside the tolerance.
    pub mismatches: usize,
    pub total: usize,
}

impl fmt::Display for ComparisonResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} mismatches, max |diff| {:e} at {}, mean |diff| {:e}",
            self.mismatches,
            self.total,
            self.max_abs_diff,
            self.max_abs_diff_index,
            self.mean_abs_diff,
        )
    }
}

/// Compares with an absolute tolerance: `|a - b| > tolerance` is a mismatch.
pub fn compare_f32(actual: &[f32], expected: &[f32], tolerance: f32) -> ComparisonResult {
    compare_with(actual, expected, |a, b| (a - b).abs() <= tolerance)
}

/// Compares with a relative tolerance scaled by the larger magnitude.
/// Differences at or below `abs_floor` always pass, so values near zero
/// don't fail on rounding noise.
pub fn compare_f32_relative(
    actual: &[f32],
    expected: &[f32],
    rel_tolerance: f32,
    abs_floor: f32,
) -> ComparisonResult {
    compare_with(actual, expected, |a, b| {
        let diff = (a - b).abs();
        diff <= abs_floor || diff <= rel_tolerance * a.abs().max(b.abs())
    })
}

fn compare_with(
    actual: &[f32],
    expected: &[f32],
    within: impl Fn(f32, f32) -> bool,
) -> ComparisonResult {
    assert_eq!(actual.len(), expected.len(), "buffer length mismatch");
    let mut result = ComparisonResult {
        max_abs_diff: 0.0,
        max_abs_diff_index: 0,
        mean_abs_diff: 0.0,
        mismatches: 0,
        total: actual.len(),
    };
    let mut sum = 0.0f64;
    for (i, (&a, &b)) in actual.iter().zip(expected).enumerate() {
        let diff = (a - b).abs();
        // NaN in either buffer always counts as a mismatch.
        if diff.is_nan() || !within(a, b) {
            result.mismatches += 1;
        }
        if diff > result.max_abs_diff || (diff.is_nan() && !result.max_abs_diff.is_nan()) {
            result.max_abs_diff = diff;
            result.max_abs_diff_index = i;
        }
        sum += f64::from(diff);
    }
    if !actual.is_empty() {
        result.mean_abs_diff = (sum / actual.len() as f64) as f32;
    }
    result
}
