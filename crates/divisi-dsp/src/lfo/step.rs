//! Step sequencer modulator.

use serde::{Deserialize, Serialize};

pub const MAX_STEPS: usize = 32;

/// Step values in -1..1, played over the first `repeat` steps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepData {
    pub values: [f32; MAX_STEPS],
    pub repeat: u8,
    /// Fraction of each step spent crossfading from the previous one, 0..1.
    pub smooth: f32,
}

impl Default for StepData {
    fn default() -> Self {
        let mut values = [0.0; MAX_STEPS];
        for (i, v) in values.iter_mut().take(16).enumerate() {
            *v = 1.0 - 2.0 * i as f32 / 15.0;
        }
        Self {
            values,
            repeat: 16,
            smooth: 0.0,
        }
    }
}

impl StepData {
    /// Number of steps in the loop, at least one.
    #[inline]
    pub fn active_steps(&self) -> usize {
        (self.repeat as usize).clamp(1, MAX_STEPS)
    }

    pub fn set(&mut self, index: usize, value: f32) {
        if let Some(slot) = self.values.get_mut(index) {
            *slot = value.clamp(-1.0, 1.0);
        }
    }

    /// Shift the active steps one position earlier.
    pub fn rotate_left(&mut self) {
        let len = self.active_steps();
        self.values[..len].rotate_left(1);
    }

    pub fn rotate_right(&mut self) {
        let len = self.active_steps();
        self.values[..len].rotate_right(1);
    }

    #[inline]
    fn value(&self, index: usize) -> f32 {
        self.values[index].clamp(-1.0, 1.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct StepLfo {
    phase: f64,
    latched: bool,
}

impl StepLfo {
    pub fn attack(&mut self, phase_offset: f32) {
        self.phase = (phase_offset as f64).rem_euclid(1.0);
        self.latched = false;
    }

    /// Advance by `inc` cycles and return the output.
    pub fn process(&mut self, data: &StepData, inc: f64, one_shot: bool) -> f32 {
        let len = data.active_steps();
        if self.latched {
            return data.value(len - 1);
        }

        self.phase += inc.max(0.0);
        if self.phase >= 1.0 {
            if one_shot {
                self.latched = true;
                return data.value(len - 1);
            }
            self.phase = self.phase.fract();
        }

        let pos = self.phase * len as f64;
        let index = (pos as usize).min(len - 1);
        let frac = (pos - index as f64) as f32;
        let current = data.value(index);

        let smooth = data.smooth.clamp(0.0, 1.0);
        if smooth > 0.0 && frac < smooth {
            let previous = data.value((index + len - 1) % len);
            let t = frac / smooth;
            let t = t * t * (3.0 - 2.0 * t);
            return previous + (current - previous) * t;
        }
        current
    }
}
