//! Polyphonic sampler voice engine.
//!
//! # Primary API
//!
//! - [`Engine`]: audio-thread side; note events and `process_block`
//! - [`Zone`] / [`PartConfig`]: what plays and how parts treat it
//! - [`Command`] / [`Notification`]: the control ↔ audio message set
//! - [`VoicePool`]: fixed arena of pre-built voices with generation-checked handles
//! - [`MatrixEntry`]: one modulation route
//!
//! # Example
//!
//! ```
//! use divisi_core::EngineConfig;
//! use divisi_synth::{connect, Command, Engine, Zone, ZoneId};
//!
//! let config = EngineConfig::default();
//! let (mut control, links) = connect(&config);
//! let mut engine = Engine::new(config, links).unwrap();
//!
//! control
//!     .commands
//!     .send(Command::AddZone {
//!         zone: ZoneId(0),
//!         data: Box::new(Zone::new(0).with_keys(48, 72)),
//!     })
//!     .unwrap();
//! engine.process_block();
//! engine.note_on(0, 60, 100, 0.0);
//! assert_eq!(engine.playing_voices(), 1);
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod sample;
pub use sample::{Sample, SampleId, SampleTable, SharedSampleTable};

pub mod zone;
pub use zone::{
    EnvParam, FadeRange, FilterMode, FilterParam, FilterParams, ModulatorParam, ParamDescriptor,
    PlayMode, Zone, ZoneId, ZoneParam, AUX_OFF_DB, ZONE_MATRIX_SLOTS,
};

pub mod part;
pub use part::{KeyStack, PartConfig, PolyMode, PART_MATRIX_SLOTS};

pub mod modulation;
pub use modulation::{
    DestinationValues, MatrixEntry, ModCurve, ModDestination, ModSource, ModulationMatrix,
    SourceValues,
};

pub mod glide;
pub use glide::{Glide, GlideConfig, GlideCurve, GlideMode};

pub mod voice;
pub use voice::{BlockContext, NoteStart, Scratch, Voice};

pub mod pool;
pub use pool::{Reservation, VoiceHandle, VoicePool};

pub mod hold;
pub use hold::{HeldNote, HoldBuffer, SharedHoldBuffer};

pub mod command;
pub use command::{Command, LimitKind, Notification};

pub mod output;
pub use output::{BlockOutput, EngineMeters, StereoBuffer};

pub mod engine;
pub use engine::{cc, connect, ControlLinks, Engine, EngineLinks};
