//! Error types for divisi-synth.

use crate::sample::SampleId;
use crate::zone::{ZoneId, ZoneParam};
use thiserror::Error;

/// Result type alias for divisi-synth operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Control-side failures. The audio thread never returns these; it reports
/// through notifications instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Zone limit reached ({max} zones)")]
    ZoneLimitReached { max: usize },

    #[error("Sample limit reached ({max} samples)")]
    SampleLimitReached { max: usize },

    #[error("Unknown zone {0:?}")]
    UnknownZone(ZoneId),

    #[error("Unknown sample {0:?}")]
    UnknownSample(SampleId),

    #[error("Sample {id:?} is still used by {zones} zone(s)")]
    SampleInUse { id: SampleId, zones: usize },

    #[error("Invalid sample: {0}")]
    InvalidSample(String),

    #[error("Slot {slot} out of range ({max} slots)")]
    InvalidSlot { slot: usize, max: usize },

    #[error("Part {0} out of range")]
    InvalidPart(usize),

    #[error("Parameter {0:?} does not exist")]
    InvalidParam(ZoneParam),
}
