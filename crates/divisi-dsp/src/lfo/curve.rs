//! Periodic and noise modulator with a delay/fade-in/fade-out amplitude envelope.

use super::{ModulatorParams, ModulatorShape, RandomState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum FadeStage {
    #[default]
    Delay,
    Attack,
    Sustain,
    Release,
    Done,
}

/// Evaluate a periodic shape at `phase` in 0..=1. `angle` skews pulse width
/// and triangle symmetry. Noise shapes return zero here.
pub fn evaluate_shape(shape: ModulatorShape, phase: f32, angle: f32) -> f32 {
    let angle = angle.clamp(-1.0, 1.0);
    match shape {
        ModulatorShape::Sine => (phase * std::f32::consts::TAU).sin(),
        ModulatorShape::Saw => phase * 2.0 - 1.0,
        ModulatorShape::Ramp => 1.0 - phase * 2.0,
        ModulatorShape::Pulse => {
            let width = 0.5 + 0.49 * angle;
            if phase < width {
                1.0
            } else {
                -1.0
            }
        }
        ModulatorShape::Triangle => {
            // Quarter-cycle offset so phase 0 starts at the zero crossing.
            let p = (phase + 0.25).fract();
            let peak = 0.5 + 0.49 * angle;
            if p < peak {
                -1.0 + 2.0 * p / peak
            } else {
                1.0 - 2.0 * (p - peak) / (1.0 - peak)
            }
        }
        ModulatorShape::Steps
        | ModulatorShape::SmoothNoise
        | ModulatorShape::SampleHoldNoise
        | ModulatorShape::Contour => 0.0,
    }
}

/// Bend a bipolar value toward the peaks (`amount > 0`) or toward full scale.
#[inline]
pub fn deform(x: f32, amount: f32) -> f32 {
    let amount = amount.clamp(-1.0, 1.0);
    if amount.abs() < 1e-4 {
        return x;
    }
    let exponent = (2.0 * amount).exp2();
    x.abs().powf(exponent).copysign(x)
}

#[inline]
fn hermite(y: &[f32; 4], t: f32) -> f32 {
    let c0 = y[1];
    let c1 = 0.5 * (y[2] - y[0]);
    let c2 = y[0] - 2.5 * y[1] + 2.0 * y[2] - 0.5 * y[3];
    let c3 = 0.5 * (y[3] - y[0]) + 1.5 * (y[1] - y[2]);
    ((c3 * t + c2) * t + c1) * t + c0
}

#[derive(Debug, Clone)]
pub struct CurveLfo {
    phase: f64,
    latched: bool,
    rng: RandomState,
    noise: [f32; 4],
    held: f32,
    fade: FadeStage,
    fade_time: f32,
    fade_level: f32,
    release_from: f32,
}

impl Default for CurveLfo {
    fn default() -> Self {
        Self {
            phase: 0.0,
            latched: false,
            rng: RandomState::new(0),
            noise: [0.0; 4],
            held: 0.0,
            fade: FadeStage::Delay,
            fade_time: 0.0,
            fade_level: 0.0,
            release_from: 0.0,
        }
    }
}

impl CurveLfo {
    pub fn attack(&mut self, params: &ModulatorParams, seed: u32) {
        self.phase = (params.phase as f64).rem_euclid(1.0);
        self.latched = false;
        self.rng = RandomState::new(seed);
        for n in self.noise.iter_mut() {
            *n = self.rng.next_bipolar();
        }
        self.held = self.rng.next_bipolar();
        self.fade = FadeStage::Delay;
        self.fade_time = 0.0;
        self.fade_level = 0.0;
    }

    /// Start the fade-out. Without a fade-out time the modulator keeps running.
    pub fn release(&mut self, params: &ModulatorParams) {
        if params.fade_out <= 0.0 || matches!(self.fade, FadeStage::Release | FadeStage::Done) {
            return;
        }
        self.release_from = self.fade_level;
        self.fade = FadeStage::Release;
        self.fade_time = 0.0;
    }

    fn wrap(&mut self) {
        self.noise = [
            self.noise[1],
            self.noise[2],
            self.noise[3],
            self.rng.next_bipolar(),
        ];
        self.held = self.rng.next_bipolar();
    }

    fn advance_fade(&mut self, params: &ModulatorParams, dt: f32) {
        let mut remaining = dt;
        loop {
            match self.fade {
                FadeStage::Delay => {
                    self.fade_level = 0.0;
                    self.fade_time += remaining;
                    if self.fade_time < params.delay {
                        return;
                    }
                    remaining = self.fade_time - params.delay.max(0.0);
                    self.fade_time = 0.0;
                    self.fade = FadeStage::Attack;
                }
                FadeStage::Attack => {
                    self.fade_time += remaining;
                    if params.fade_in <= 0.0 || self.fade_time >= params.fade_in {
                        self.fade_level = 1.0;
                        self.fade = FadeStage::Sustain;
                    } else {
                        self.fade_level = self.fade_time / params.fade_in;
                    }
                    return;
                }
                FadeStage::Sustain => {
                    self.fade_level = 1.0;
                    return;
                }
                FadeStage::Release => {
                    self.fade_time += remaining;
                    let t = self.fade_time / params.fade_out.max(f32::EPSILON);
                    if t >= 1.0 {
                        self.fade_level = 0.0;
                        self.fade = FadeStage::Done;
                    } else {
                        self.fade_level = self.release_from * (1.0 - t);
                    }
                    return;
                }
                FadeStage::Done => {
                    self.fade_level = 0.0;
                    return;
                }
            }
        }
    }

    /// Advance by `inc` cycles over `dt` seconds and return the output.
    pub fn process(&mut self, params: &ModulatorParams, inc: f64, dt: f32) -> f32 {
        if !self.latched {
            self.phase += inc.max(0.0);
            if self.phase >= 1.0 {
                if params.one_shot {
                    self.latched = true;
                    self.phase = 1.0;
                } else {
                    self.phase = self.phase.fract();
                }
                self.wrap();
            }
        }
        self.advance_fade(params, dt);

        let phase = self.phase as f32;
        let raw = match params.shape {
            ModulatorShape::SmoothNoise => hermite(&self.noise, phase).clamp(-1.0, 1.0),
            ModulatorShape::SampleHoldNoise => self.held,
            shape => deform(evaluate_shape(shape, phase, params.angle), params.deform),
        };

        let value = if params.unipolar { raw * 0.5 + 0.5 } else { raw };
        value * self.fade_level
    }
}
