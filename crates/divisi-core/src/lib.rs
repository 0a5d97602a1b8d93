//! Core primitives shared by every divisi crate.
//!
//! # Primary API
//!
//! - [`EngineConfig`]: validated engine configuration
//! - [`Lag`] / [`Lipol`]: per-sample and per-block parameter smoothers
//! - [`Tables`]: pitch, gain and envelope lookup tables built once per sample rate
//! - [`bus`]: bounded SPSC message queues between the control and audio threads
//! - [`ParamRange`]: normalized ↔ real conversion for zone parameters
//!
//! Nothing in this crate allocates after construction except the control-side
//! constructors (`Tables::new`, `bus::channel`).

pub mod error;
pub use error::{Error, Result};

pub mod config;
pub use config::{EngineConfig, StealPolicy, MAX_BLOCK_SIZE, NUM_PARTS};

pub(crate) mod lockfree;
pub use lockfree::{AtomicFlag, AtomicFloat};

pub mod parameter;
pub use parameter::{ParamRange, ParamScale, ParamUnit};

pub mod smooth;
pub use smooth::{Lag, Lipol};

pub mod tables;
pub use tables::{curve_shape, Tables};

pub mod bus;
pub use bus::{Full, Message, Receiver, Sender, PROTOCOL_VERSION};
