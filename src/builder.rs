//! Builder for configuring and constructing a sampler.

use crate::{Engine, Result, SamplerHandle};
use divisi_core::{EngineConfig, StealPolicy};

/// Every setting defaults to [`EngineConfig::default`].
///
/// `build` returns the two halves: the [`SamplerHandle`] stays on the control
/// thread, the [`Engine`] moves to the audio thread.
///
/// # Example
///
/// ```
/// use divisi::prelude::*;
///
/// let (mut sampler, mut engine) = SamplerBuilder::new()
///     .sample_rate(48000.0)
///     .block_size(64)
///     .max_voices(32)
///     .build()?;
///
/// let zone = sampler.add_zone(Zone::new(0).with_keys(36, 84))?;
/// engine.process_block();
/// engine.note_on(0, 60, 100, 0.0);
/// # let _ = zone;
/// # Ok::<(), divisi::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct SamplerBuilder {
    config: EngineConfig,
}

impl SamplerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a complete configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Default: 44100
    pub fn sample_rate(mut self, sample_rate: f64) -> Self {
        self.config.sample_rate = sample_rate;
        self
    }

    /// Default: 32. Must be a multiple of 4.
    pub fn block_size(mut self, block_size: usize) -> Self {
        self.config.block_size = block_size;
        self
    }

    /// Engine-wide polyphony. Default: 64
    pub fn max_voices(mut self, max_voices: usize) -> Self {
        self.config.max_voices = max_voices;
        self
    }

    pub fn steal_policy(mut self, policy: StealPolicy) -> Self {
        self.config.steal_policy = policy;
        self
    }

    pub fn command_capacity(mut self, capacity: usize) -> Self {
        self.config.command_capacity = capacity;
        self
    }

    pub fn notification_capacity(mut self, capacity: usize) -> Self {
        self.config.notification_capacity = capacity;
        self
    }

    pub fn max_zones(mut self, max_zones: usize) -> Self {
        self.config.max_zones = max_zones;
        self
    }

    pub fn max_samples(mut self, max_samples: usize) -> Self {
        self.config.max_samples = max_samples;
        self
    }

    pub fn hold_buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.hold_buffer_capacity = capacity;
        self
    }

    pub fn build(self) -> Result<(SamplerHandle, Engine)> {
        self.config.validate()?;
        let (control, links) = divisi_synth::connect(&self.config);
        let engine = Engine::new(self.config.clone(), links)?;

        tracing::info!(
            sample_rate = self.config.sample_rate,
            block_size = self.config.block_size,
            max_voices = self.config.max_voices,
            steal_policy = ?self.config.steal_policy,
            "Sampler built"
        );

        Ok((SamplerHandle::new(self.config, control), engine))
    }
}
