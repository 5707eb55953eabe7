#![doc = include_str!("../README.md")]

mod rdft;

pub use rdft::{FFT_SIZE, Rdft};
