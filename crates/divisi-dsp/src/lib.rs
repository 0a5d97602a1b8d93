//! Real-time DSP building blocks for the divisi sampler.
//!
//! Everything here is allocation-free after construction and meant to be
//! owned by a single voice on the audio thread.
//!
//! - [`BiquadFilter`]: stereo biquad with per-sample coefficient smoothing
//! - [`Ahdsr`]: block-rate attack/hold/decay/sustain/release envelope
//! - [`Modulator`]: step, curve and contour LFOs

pub mod biquad;
pub use biquad::{omega_from_hz, omega_from_note, BiquadCoefficients, BiquadFilter};

pub mod envelope;
pub use envelope::{Ahdsr, AhdsrParams, EnvelopeStage};

pub mod lfo;
pub use lfo::{
    ContourParams, Modulator, ModulatorParams, ModulatorShape, RateMode, StepData, Transport,
};
