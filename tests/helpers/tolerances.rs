//! Tolerance constants for audio testing.
//!
//! Different operations require different precision levels.

/// Floating point rounding errors (for passthrough, exact gain).
pub const FLOAT_EPSILON: f32 = 1e-6;

/// DSP processing tolerance (interpolation, table lookups, smoothing).
pub const DSP_EPSILON: f32 = 1e-4;

/// Gain comparisons through the dB table, about 0.4 dB.
pub const GAIN_RATIO_EPSILON: f32 = 0.05;

/// Silence threshold (~-80dB).
/// Values below this are considered silent.
pub const SILENCE_THRESHOLD: f32 = 0.0001;
