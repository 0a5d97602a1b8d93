//! Portamento between notes of a part.
//!
//! Works in semitones, so interpolation is already in log-frequency space.
//! The voice advances the glide once per block and feeds the result into its
//! per-sample pitch interpolator.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GlideMode {
    /// Glide on every note with a previous pitch.
    Always,
    /// Glide only when the previous key is still held.
    LegatoOnly,
    #[default]
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GlideCurve {
    #[default]
    Linear,
    /// Slow start, fast finish.
    Exponential,
    /// Fast start, slow finish.
    Logarithmic,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlideConfig {
    pub mode: GlideMode,
    pub curve: GlideCurve,
    /// Seconds.
    pub time: f32,
    /// When false the time is per octave, so wider intervals take longer.
    pub constant_time: bool,
}

impl Default for GlideConfig {
    fn default() -> Self {
        Self {
            mode: GlideMode::Off,
            curve: GlideCurve::Linear,
            time: 0.1,
            constant_time: true,
        }
    }
}

/// Per-voice glide state, in semitones.
#[derive(Debug, Clone, Default)]
pub struct Glide {
    start: f32,
    target: f32,
    current: f32,
    progress: f32,
    /// Progress per block.
    rate: f32,
}

impl Glide {
    pub fn new() -> Self {
        Self {
            progress: 1.0,
            ..Default::default()
        }
    }

    /// Jump to `note` with no glide.
    pub fn reset(&mut self, note: f32) {
        self.start = note;
        self.target = note;
        self.current = note;
        self.progress = 1.0;
        self.rate = 0.0;
    }

    /// Glide from `from` (the part's previous pitch) to `note`.
    pub fn start(
        &mut self,
        from: Option<f32>,
        note: f32,
        is_legato: bool,
        config: &GlideConfig,
        blocks_per_second: f32,
    ) {
        match from {
            Some(from) => {
                self.current = from;
                self.set_target(note, is_legato, config, blocks_per_second);
            }
            None => self.reset(note),
        }
    }

    /// Retarget from wherever the glide currently is.
    pub fn set_target(
        &mut self,
        note: f32,
        is_legato: bool,
        config: &GlideConfig,
        blocks_per_second: f32,
    ) {
        let should_glide = match config.mode {
            GlideMode::Off => false,
            GlideMode::Always => true,
            GlideMode::LegatoOnly => is_legato,
        };

        if !should_glide || config.time <= 0.0 || (note - self.current).abs() < 1e-6 {
            self.reset(note);
            return;
        }

        self.start = self.current;
        self.target = note;
        let time = if config.constant_time {
            config.time
        } else {
            config.time * ((note - self.start).abs() / 12.0).max(0.1)
        };
        let blocks = time * blocks_per_second;
        self.rate = if blocks > 1.0 { 1.0 / blocks } else { 1.0 };
        self.progress = 0.0;
    }

    /// Advance one block and return the pitch in semitones.
    #[inline]
    pub fn advance(&mut self, curve: GlideCurve) -> f32 {
        if self.progress >= 1.0 {
            self.current = self.target;
            return self.current;
        }
        self.progress = (self.progress + self.rate).min(1.0);
        let t = match curve {
            GlideCurve::Linear => self.progress,
            GlideCurve::Exponential => self.progress * self.progress,
            GlideCurve::Logarithmic => self.progress.sqrt(),
        };
        self.current = self.start + (self.target - self.start) * t;
        self.current
    }

    #[inline]
    pub fn current(&self) -> f32 {
        self.current
    }

    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.progress >= 1.0
    }
}
