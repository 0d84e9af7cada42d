//! DSP — integer tone synthesis and 8-bit mixing.
//!
//! Tones are rendered bit-exactly from table-driven oscillators and a
//! fixed-point IIR cascade, so the same track always produces the same bytes
//! whether rendered natively or through WASM. The noise table comes from a
//! fixed-seed PCG32 stream, whose output does not change between releases.

/// Output sample rate of every rendered track. Fixed by the format.
pub const SAMPLE_RATE: u32 = 22050;

pub mod envelope;
pub mod filter;
pub mod mixer;
pub mod oscillator;
pub mod renderer;
pub mod tone;
