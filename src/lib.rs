//! # Divisi - Real-time Polyphonic Sampler
//!
//! A sampler voice engine split across two threads.
//!
//! ## Architecture
//!
//! Divisi is an umbrella crate that coordinates:
//! - **divisi-core** - Config, lock-free message bus, parameter ranges, smoothing, lookup tables
//! - **divisi-dsp** - Biquad filter, AHDSR envelope, modulators (curve, step, contour)
//! - **divisi-synth** - Zones, parts, modulation matrix, voices, voice pool, the audio-thread [`Engine`]
//!
//! The [`SamplerHandle`] lives on the control thread. It owns the editable copy
//! of every zone and part and sends edits as [`Command`]s. The [`Engine`] lives
//! on the audio thread, applies commands at the top of each block and answers
//! with [`Notification`]s. Nothing on the audio path allocates, blocks on a
//! queue, or frees sample memory.
//!
//! ## Quick Start
//!
//! ```
//! use divisi::prelude::*;
//!
//! let (mut sampler, mut engine) = SamplerBuilder::new().max_voices(16).build()?;
//!
//! let piano = sampler.load_sample(Sample::mono(vec![0.5; 4410], 44100.0)?)?;
//! let zone = sampler.add_zone(Zone::new(0).with_keys(48, 72).with_sample(piano))?;
//! sampler.set_zone_param(zone, ZoneParam::GainDb, -6.0)?;
//!
//! // Audio thread
//! engine.process_block();
//! engine.note_on(0, 60, 100, 0.0);
//! engine.process_block();
//! assert_eq!(engine.playing_voices(), 1);
//!
//! // Control thread
//! for note in sampler.poll_notifications() {
//!     println!("{note:?}");
//! }
//! # Ok::<(), divisi::Error>(())
//! ```

/// Re-export of divisi-core for direct access
pub use divisi_core as core;

/// Re-export of divisi-dsp
pub use divisi_dsp as dsp;

/// Re-export of divisi-synth
pub use divisi_synth as synth;

pub use divisi_core::{EngineConfig, ParamRange, ParamScale, ParamUnit, StealPolicy, NUM_PARTS};

pub use divisi_dsp::{AhdsrParams, ModulatorParams, ModulatorShape, RateMode, StepData};

pub use divisi_synth::{
    cc, Command, Engine, EngineMeters, FadeRange, FilterMode, FilterParams, LimitKind,
    MatrixEntry, ModCurve, ModDestination, ModSource, Notification, ParamDescriptor, PartConfig,
    PlayMode, PolyMode, Sample, SampleId, Zone, ZoneId, ZoneParam,
};

mod builder;
mod error;
mod handle;

pub use builder::SamplerBuilder;
pub use error::{Error, Result};
pub use handle::SamplerHandle;

/// Convenience prelude for common imports
pub mod prelude {
    // Entry points
    pub use crate::{Engine, SamplerBuilder, SamplerHandle};

    // Errors
    pub use crate::{Error, Result};

    // Configuration
    pub use crate::{EngineConfig, StealPolicy};

    // Samples and zones
    pub use crate::{FadeRange, PlayMode, Sample, SampleId, Zone, ZoneId, ZoneParam};

    // Parts
    pub use crate::{PartConfig, PolyMode};

    // Modulation
    pub use crate::{MatrixEntry, ModCurve, ModDestination, ModSource, ModulatorParams};

    // Messages
    pub use crate::{Command, LimitKind, Notification};
}
