//! DAHDSR contour generator used as a modulator shape.
//!
//! Unlike [`Ahdsr`](crate::Ahdsr) the segment times are plain seconds and the
//! contour may loop back to its attack while the gate is held.

use divisi_core::curve_shape;
use serde::{Deserialize, Serialize};

/// Upper bound on segment transitions handled in one call.
const MAX_TRANSITIONS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContourParams {
    pub delay: f32,
    pub attack: f32,
    pub hold: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
    pub attack_curve: f32,
    pub decay_curve: f32,
    pub release_curve: f32,
    /// Restart the attack after the decay instead of sustaining.
    pub looping: bool,
}

impl Default for ContourParams {
    fn default() -> Self {
        Self {
            delay: 0.0,
            attack: 0.1,
            hold: 0.0,
            decay: 0.2,
            sustain: 0.5,
            release: 0.3,
            attack_curve: 0.0,
            decay_curve: 0.0,
            release_curve: 0.0,
            looping: false,
        }
    }
}

impl ContourParams {
    /// Total duration of one gated pass plus release, ignoring sustain.
    pub fn time_taken(&self) -> f32 {
        [self.delay, self.attack, self.hold, self.decay, self.release]
            .iter()
            .map(|t| t.max(0.0))
            .sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContourStage {
    Delay,
    Attack,
    Hold,
    Decay,
    Sustain,
    Release,
    #[default]
    Done,
}

#[derive(Debug, Clone, Default)]
pub struct ContourLfo {
    stage: ContourStage,
    time: f32,
    level: f32,
    start_level: f32,
}

impl ContourLfo {
    pub fn attack(&mut self) {
        self.stage = ContourStage::Delay;
        self.time = 0.0;
        self.level = 0.0;
        self.start_level = 0.0;
    }

    pub fn release(&mut self) {
        if matches!(self.stage, ContourStage::Release | ContourStage::Done) {
            return;
        }
        self.enter(ContourStage::Release);
    }

    #[inline]
    pub fn stage(&self) -> ContourStage {
        self.stage
    }

    #[inline]
    pub fn level(&self) -> f32 {
        self.level
    }

    fn enter(&mut self, stage: ContourStage) {
        self.stage = stage;
        self.time = 0.0;
        self.start_level = self.level;
    }

    fn duration(&self, params: &ContourParams) -> f32 {
        match self.stage {
            ContourStage::Delay => params.delay,
            ContourStage::Attack => params.attack,
            ContourStage::Hold => params.hold,
            ContourStage::Decay => params.decay,
            ContourStage::Release => params.release,
            ContourStage::Sustain | ContourStage::Done => f32::INFINITY,
        }
        .max(0.0)
    }

    fn level_at(&self, params: &ContourParams, t: f32) -> f32 {
        let sustain = params.sustain.clamp(0.0, 1.0);
        match self.stage {
            ContourStage::Delay | ContourStage::Done => 0.0,
            ContourStage::Attack => {
                self.start_level + (1.0 - self.start_level) * curve_shape(params.attack_curve, t)
            }
            ContourStage::Hold => 1.0,
            ContourStage::Decay => sustain + (1.0 - sustain) * (1.0 - curve_shape(params.decay_curve, t)),
            ContourStage::Sustain => sustain,
            ContourStage::Release => self.start_level * (1.0 - curve_shape(params.release_curve, t)),
        }
    }

    fn next_stage(&self, params: &ContourParams) -> ContourStage {
        match self.stage {
            ContourStage::Delay => ContourStage::Attack,
            ContourStage::Attack => ContourStage::Hold,
            ContourStage::Hold => ContourStage::Decay,
            ContourStage::Decay if params.looping => ContourStage::Attack,
            ContourStage::Decay => ContourStage::Sustain,
            ContourStage::Sustain => ContourStage::Sustain,
            ContourStage::Release | ContourStage::Done => ContourStage::Done,
        }
    }

    /// Advance by `dt` seconds and return the level, 0..1.
    pub fn process(&mut self, params: &ContourParams, dt: f32) -> f32 {
        let mut remaining = dt.max(0.0);
        for _ in 0..MAX_TRANSITIONS {
            let duration = self.duration(params);
            if self.time + remaining < duration {
                self.time += remaining;
                self.level = self.level_at(params, self.time / duration);
                break;
            }
            remaining -= (duration - self.time).max(0.0);
            self.level = self.level_at(params, 1.0);
            if matches!(self.stage, ContourStage::Sustain | ContourStage::Done) {
                break;
            }
            let next = self.next_stage(params);
            self.enter(next);
        }
        self.level = self.level.clamp(0.0, 1.0);
        self.level
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_contour_segments() {
        let params = ContourParams {
            delay: 0.1,
            attack: 0.1,
            hold: 0.1,
            decay: 0.1,
            sustain: 0.25,
            release: 0.1,
            ..Default::default()
        };
        let mut c = ContourLfo::default();
        c.attack();

        assert_eq!(c.process(&params, 0.05), 0.0);
        assert_relative_eq!(c.process(&params, 0.1), 0.5, epsilon = 1e-4);
        assert_eq!(c.stage(), ContourStage::Attack);
        assert_eq!(c.process(&params, 0.1), 1.0);
        assert_eq!(c.stage(), ContourStage::Hold);
        c.process(&params, 0.5);
        assert_eq!(c.stage(), ContourStage::Sustain);
        assert_relative_eq!(c.level(), 0.25);

        c.release();
        assert_relative_eq!(c.process(&params, 0.05), 0.125, epsilon = 1e-4);
        assert_eq!(c.process(&params, 0.1), 0.0);
        assert_eq!(c.stage(), ContourStage::Done);
    }

    #[test]
    fn test_looping_contour_never_sustains() {
        let params = ContourParams {
            attack: 0.05,
            decay: 0.05,
            sustain: 0.0,
            looping: true,
            ..Default::default()
        };
        let mut c = ContourLfo::default();
        c.attack();
        let mut saw_peak = 0;
        for _ in 0..100 {
            c.process(&params, 0.01);
            assert_ne!(c.stage(), ContourStage::Sustain);
            if c.level() > 0.99 {
                saw_peak += 1;
            }
        }
        assert!(saw_peak >= 5);
    }

    #[test]
    fn test_zero_length_segments_are_skipped() {
        let params = ContourParams {
            delay: 0.0,
            attack: 0.0,
            hold: 0.0,
            decay: 0.0,
            sustain: 0.7,
            ..Default::default()
        };
        let mut c = ContourLfo::default();
        c.attack();
        assert_relative_eq!(c.process(&params, 0.001), 0.7);
        assert_eq!(c.stage(), ContourStage::Sustain);
    }

    #[test]
    fn test_time_taken() {
        let params = ContourParams {
            delay: 0.5,
            attack: 1.0,
            hold: 0.25,
            decay: 0.25,
            release: 2.0,
            ..Default::default()
        };
        assert_relative_eq!(params.time_taken(), 4.0);
    }

    #[test]
    fn test_idle_contour_is_silent() {
        let mut c = ContourLfo::default();
        assert_eq!(c.process(&ContourParams::default(), 1.0), 0.0);
    }
}
