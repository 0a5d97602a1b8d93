//! Sampler engine configuration.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Largest block the engine will render in one `process_block` call.
pub const MAX_BLOCK_SIZE: usize = 1024;

/// Number of parts (one per MIDI channel).
pub const NUM_PARTS: usize = 16;

/// What happens when a note-on finds the polyphony cap reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StealPolicy {
    /// Drop the new note.
    None,
    /// Fast-release the oldest voice not started by the same note-on.
    #[default]
    Oldest,
}

/// Configuration for the sampler engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub sample_rate: f64,
    /// Samples per `process_block` call. Multiple of 4.
    pub block_size: usize,
    /// Engine-wide polyphony cap. Voices fading out after a steal do not count.
    pub max_voices: usize,
    pub steal_policy: StealPolicy,
    /// Control → audio queue capacity. Sends beyond it are rejected.
    pub command_capacity: usize,
    /// Audio → control queue capacity. Informational messages beyond it are dropped.
    pub notification_capacity: usize,
    pub max_zones: usize,
    pub max_samples: usize,
    /// Notes whose release is deferred by the hold pedal.
    pub hold_buffer_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100.0,
            block_size: 32,
            max_voices: 64,
            steal_policy: StealPolicy::Oldest,
            command_capacity: 512,
            notification_capacity: 512,
            max_zones: 512,
            max_samples: 256,
            hold_buffer_capacity: 256,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate < 8000.0 || self.sample_rate > 384000.0 {
            return Err(Error::InvalidConfig(format!(
                "sample_rate {} out of range (8000-384000 Hz)",
                self.sample_rate
            )));
        }
        if self.block_size < 8 || self.block_size > MAX_BLOCK_SIZE || self.block_size % 4 != 0 {
            return Err(Error::InvalidConfig(format!(
                "block_size {} must be a multiple of 4 in 8-{}",
                self.block_size, MAX_BLOCK_SIZE
            )));
        }
        if self.max_voices == 0 || self.max_voices > 256 {
            return Err(Error::InvalidConfig(format!(
                "max_voices {} out of range (1-256)",
                self.max_voices
            )));
        }
        if self.command_capacity == 0 || self.notification_capacity == 0 {
            return Err(Error::InvalidConfig(
                "queue capacities must be non-zero".to_string(),
            ));
        }
        if self.max_zones == 0 || self.max_samples == 0 {
            return Err(Error::InvalidConfig(
                "max_zones and max_samples must be non-zero".to_string(),
            ));
        }
        if self.hold_buffer_capacity == 0 {
            return Err(Error::InvalidConfig(
                "hold_buffer_capacity must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Voice slots to preallocate: the cap plus room for voices fading out after a steal.
    pub fn voice_arena_size(&self) -> usize {
        self.max_voices + (self.max_voices / 2).max(4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.sample_rate, 44100.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_sample_rate() {
        let config = EngineConfig {
            sample_rate: 1000.0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_unaligned_block() {
        let config = EngineConfig {
            block_size: 30,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = EngineConfig {
            block_size: 2048,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_voices() {
        let config = EngineConfig {
            max_voices: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_arena_has_headroom() {
        let config = EngineConfig {
            max_voices: 2,
            ..Default::default()
        };
        assert_eq!(config.voice_arena_size(), 6);

        let config = EngineConfig::default();
        assert_eq!(config.voice_arena_size(), 96);
    }
}
