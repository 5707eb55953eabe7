//! Property-based test infrastructure for fdaec.
//!
//! Provides block and spectrum generators and comparison utilities for
//! verifying that the scalar and SIMD backends agree.

pub mod comparison;
pub mod generators;

pub use proptest;
pub use test_strategy;
