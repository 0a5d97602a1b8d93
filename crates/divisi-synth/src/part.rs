//! Parts: per-channel playback settings shared by a set of zones.

use crate::glide::GlideConfig;
use crate::modulation::{MatrixEntry, NUM_MACROS};
use serde::{Deserialize, Serialize};

pub const PART_MATRIX_SLOTS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PolyMode {
    #[default]
    Poly,
    /// One note at a time; every new note retriggers.
    Mono,
    /// One note at a time; overlapping notes retune the sounding voice.
    Legato,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartConfig {
    pub midi_channel: u8,
    /// Part-level polyphony cap.
    pub polyphony: usize,
    pub poly_mode: PolyMode,
    pub glide: GlideConfig,
    /// Pitch bend range, semitones.
    pub bend_up: f32,
    pub bend_down: f32,
    /// Layer every matching zone; when false only the first match sounds.
    pub add_zones_to_group: bool,
    pub gain_db: f32,
    pub pan: f32,
    pub matrix: [MatrixEntry; PART_MATRIX_SLOTS],
    pub macros: [f32; NUM_MACROS],
}

impl Default for PartConfig {
    fn default() -> Self {
        Self {
            midi_channel: 0,
            polyphony: 64,
            poly_mode: PolyMode::Poly,
            glide: GlideConfig::default(),
            bend_up: 2.0,
            bend_down: 2.0,
            add_zones_to_group: true,
            gain_db: 0.0,
            pan: 0.0,
            matrix: [MatrixEntry::default(); PART_MATRIX_SLOTS],
            macros: [0.0; NUM_MACROS],
        }
    }
}

impl PartConfig {
    /// Part `index` listening on the channel of the same number.
    pub fn for_part(index: usize) -> Self {
        Self {
            midi_channel: index as u8,
            ..Default::default()
        }
    }

    /// Semitones for a -1..1 bend amount.
    #[inline]
    pub fn bend_semitones(&self, bend: f32) -> f32 {
        if bend >= 0.0 {
            bend * self.bend_up
        } else {
            bend * self.bend_down
        }
    }

    #[inline]
    pub fn is_monophonic(&self) -> bool {
        self.poly_mode != PolyMode::Poly
    }
}

/// Keys held on a monophonic part, newest last.
#[derive(Debug, Clone)]
pub struct KeyStack {
    keys: [(u8, u8); 128],
    len: usize,
}

impl Default for KeyStack {
    fn default() -> Self {
        Self {
            keys: [(0, 0); 128],
            len: 0,
        }
    }
}

impl KeyStack {
    /// Push `key` (moving it to the top if already held).
    pub fn push(&mut self, key: u8, velocity: u8) {
        self.remove(key);
        if self.len < self.keys.len() {
            self.keys[self.len] = (key, velocity);
            self.len += 1;
        }
    }

    /// Remove `key`; returns true when it was the newest.
    pub fn remove(&mut self, key: u8) -> bool {
        let Some(pos) = self.keys[..self.len].iter().position(|&(k, _)| k == key) else {
            return false;
        };
        let was_top = pos + 1 == self.len;
        self.keys.copy_within(pos + 1..self.len, pos);
        self.len -= 1;
        was_top
    }

    /// Newest held key and its velocity.
    #[inline]
    pub fn top(&self) -> Option<(u8, u8)> {
        self.len.checked_sub(1).map(|i| self.keys[i])
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }
}
