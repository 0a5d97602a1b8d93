//! Centralized error type for the divisi umbrella crate.
//!
//! Wraps all subsystem errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] divisi_core::Error),

    #[error("Synth: {0}")]
    Synth(#[from] divisi_synth::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
