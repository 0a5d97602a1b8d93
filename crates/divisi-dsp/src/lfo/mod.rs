//! Per-voice modulators.
//!
//! A [`Modulator`] runs one of three generator families chosen by
//! [`ModulatorShape`]:
//!
//! - step sequencer ([`StepLfo`])
//! - periodic curves and noise ([`CurveLfo`])
//! - DAHDSR contour ([`ContourLfo`])
//!
//! Modulators advance once per block. Random shapes are seeded at
//! [`attack`](Modulator::attack), so the same seed reproduces the same output.

mod contour;
mod curve;
mod step;

pub use contour::{ContourLfo, ContourParams, ContourStage};
pub use curve::{deform, evaluate_shape, CurveLfo};
pub use step::{StepData, StepLfo, MAX_STEPS};

use serde::{Deserialize, Serialize};

/// Lowest and highest free-running rate, log2 Hz.
pub const RATE_MIN: f32 = -7.0;
pub const RATE_MAX: f32 = 9.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ModulatorShape {
    Steps,
    #[default]
    Sine,
    Saw,
    Ramp,
    Pulse,
    Triangle,
    SmoothNoise,
    SampleHoldNoise,
    Contour,
}

impl ModulatorShape {
    pub fn all() -> &'static [ModulatorShape] {
        &[
            ModulatorShape::Steps,
            ModulatorShape::Sine,
            ModulatorShape::Saw,
            ModulatorShape::Ramp,
            ModulatorShape::Pulse,
            ModulatorShape::Triangle,
            ModulatorShape::SmoothNoise,
            ModulatorShape::SampleHoldNoise,
            ModulatorShape::Contour,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ModulatorShape::Steps => "Steps",
            ModulatorShape::Sine => "Sine",
            ModulatorShape::Saw => "Saw",
            ModulatorShape::Ramp => "Ramp",
            ModulatorShape::Pulse => "Pulse",
            ModulatorShape::Triangle => "Triangle",
            ModulatorShape::SmoothNoise => "Noise",
            ModulatorShape::SampleHoldNoise => "S&H",
            ModulatorShape::Contour => "Envelope",
        }
    }

    fn family(self) -> Family {
        match self {
            ModulatorShape::Steps => Family::Steps,
            ModulatorShape::Contour => Family::Contour,
            _ => Family::Curve,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Steps,
    Curve,
    Contour,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RateMode {
    #[default]
    Free,
    /// One cycle every `sync_beats` beats.
    TempoSync,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModulatorParams {
    pub shape: ModulatorShape,
    /// log2 Hz.
    pub rate: f32,
    pub rate_mode: RateMode,
    pub sync_beats: f32,
    pub deform: f32,
    pub angle: f32,
    /// Start phase, 0..1.
    pub phase: f32,
    pub unipolar: bool,
    pub one_shot: bool,
    /// Seconds before the fade-in starts.
    pub delay: f32,
    pub fade_in: f32,
    pub fade_out: f32,
    pub steps: StepData,
    pub contour: ContourParams,
}

impl Default for ModulatorParams {
    fn default() -> Self {
        Self {
            shape: ModulatorShape::Sine,
            rate: 0.0,
            rate_mode: RateMode::Free,
            sync_beats: 1.0,
            deform: 0.0,
            angle: 0.0,
            phase: 0.0,
            unipolar: false,
            one_shot: false,
            delay: 0.0,
            fade_in: 0.0,
            fade_out: 0.0,
            steps: StepData::default(),
            contour: ContourParams::default(),
        }
    }
}

/// Host timing the modulators follow.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transport {
    pub sample_rate: f64,
    /// Beats per minute.
    pub tempo: f64,
}

impl Default for Transport {
    fn default() -> Self {
        Self {
            sample_rate: 44100.0,
            tempo: 120.0,
        }
    }
}

/// Xorshift32 source for the noise shapes.
#[derive(Debug, Clone)]
pub(crate) struct RandomState {
    seed: u32,
}

impl RandomState {
    pub(crate) fn new(seed: u32) -> Self {
        Self {
            seed: if seed == 0 { 0x9E37_79B9 } else { seed },
        }
    }

    pub(crate) fn next_u32(&mut self) -> u32 {
        self.seed ^= self.seed << 13;
        self.seed ^= self.seed >> 17;
        self.seed ^= self.seed << 5;
        self.seed
    }

    pub(crate) fn next_bipolar(&mut self) -> f32 {
        (self.next_u32() as f32 / u32::MAX as f32) * 2.0 - 1.0
    }
}

#[derive(Debug, Clone)]
enum Generator {
    Steps(StepLfo),
    Curve(CurveLfo),
    Contour(ContourLfo),
}

impl Generator {
    fn for_family(family: Family) -> Self {
        match family {
            Family::Steps => Generator::Steps(StepLfo::default()),
            Family::Curve => Generator::Curve(CurveLfo::default()),
            Family::Contour => Generator::Contour(ContourLfo::default()),
        }
    }

    fn family(&self) -> Family {
        match self {
            Generator::Steps(_) => Family::Steps,
            Generator::Curve(_) => Family::Curve,
            Generator::Contour(_) => Family::Contour,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Modulator {
    params: ModulatorParams,
    generator: Generator,
    /// Cycles per sample.
    increment: f64,
    sample_rate: f64,
    output: f32,
}

impl Default for Modulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Modulator {
    pub fn new() -> Self {
        let params = ModulatorParams::default();
        Self {
            generator: Generator::for_family(params.shape.family()),
            params,
            increment: 0.0,
            sample_rate: Transport::default().sample_rate,
            output: 0.0,
        }
    }

    /// Load parameters for the coming block. `rate_mod` is in octaves.
    ///
    /// Changing shape family swaps the generator in place.
    pub fn assign(&mut self, params: &ModulatorParams, rate_mod: f32, transport: &Transport) {
        let family = params.shape.family();
        if self.generator.family() != family {
            self.generator = Generator::for_family(family);
        }
        self.params = *params;
        self.sample_rate = transport.sample_rate.max(1.0);

        let octaves = rate_mod.clamp(-16.0, 16.0) as f64;
        let hz = match params.rate_mode {
            RateMode::Free => (params.rate.clamp(RATE_MIN, RATE_MAX) as f64 + octaves).exp2(),
            RateMode::TempoSync => {
                let beats = (params.sync_beats as f64).max(1.0 / 64.0);
                transport.tempo.max(1.0) / 60.0 / beats * octaves.exp2()
            }
        };
        self.increment = hz / self.sample_rate;
    }

    pub fn attack(&mut self, seed: u32) {
        match &mut self.generator {
            Generator::Steps(lfo) => lfo.attack(self.params.phase),
            Generator::Curve(lfo) => lfo.attack(&self.params, seed),
            Generator::Contour(lfo) => lfo.attack(),
        }
        self.output = 0.0;
    }

    pub fn release(&mut self) {
        match &mut self.generator {
            Generator::Steps(_) => {}
            Generator::Curve(lfo) => lfo.release(&self.params),
            Generator::Contour(lfo) => lfo.release(),
        }
    }

    /// Advance by `block_samples` and return the new output.
    pub fn process(&mut self, block_samples: usize) -> f32 {
        let inc = self.increment * block_samples as f64;
        let dt = (block_samples as f64 / self.sample_rate) as f32;
        self.output = match &mut self.generator {
            Generator::Steps(lfo) => {
                let v = lfo.process(&self.params.steps, inc, self.params.one_shot);
                if self.params.unipolar {
                    v * 0.5 + 0.5
                } else {
                    v
                }
            }
            Generator::Curve(lfo) => lfo.process(&self.params, inc, dt),
            Generator::Contour(lfo) => lfo.process(&self.params.contour, dt),
        };
        self.output
    }

    #[inline]
    pub fn output(&self) -> f32 {
        self.output
    }

    #[inline]
    pub fn shape(&self) -> ModulatorShape {
        self.params.shape
    }

    /// Frequency currently in effect.
    pub fn frequency(&self) -> f64 {
        self.increment * self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const SR: f64 = 48000.0;

    fn transport() -> Transport {
        Transport {
            sample_rate: SR,
            tempo: 120.0,
        }
    }

    fn run(m: &mut Modulator, blocks: usize) -> Vec<f32> {
        (0..blocks).map(|_| m.process(32)).collect()
    }

    #[test]
    fn test_free_rate_is_log2_hz() {
        let mut m = Modulator::new();
        let params = ModulatorParams {
            rate: 2.0,
            ..Default::default()
        };
        m.assign(&params, 0.0, &transport());
        assert_relative_eq!(m.frequency(), 4.0, epsilon = 1e-9);
        m.assign(&params, 1.0, &transport());
        assert_relative_eq!(m.frequency(), 8.0, epsilon = 1e-9);
    }

    #[test]
    fn test_tempo_sync() {
        let params = ModulatorParams {
            shape: ModulatorShape::Saw,
            rate_mode: RateMode::TempoSync,
            sync_beats: 1.0,
            ..Default::default()
        };
        let mut m = Modulator::new();
        m.assign(&params, 0.0, &transport());
        // 120 bpm, one cycle per beat.
        assert_relative_eq!(m.frequency(), 2.0, epsilon = 1e-9);

        m.attack(1);
        // Quarter second is half a cycle: saw crosses zero.
        let out = m.process(12000);
        assert!(out.abs() < 1e-4);
    }

    #[test]
    fn test_same_seed_is_bitwise_identical() {
        for shape in [ModulatorShape::SmoothNoise, ModulatorShape::SampleHoldNoise] {
            let params = ModulatorParams {
                shape,
                rate: 5.0,
                ..Default::default()
            };
            let mut a = Modulator::new();
            let mut b = Modulator::new();
            a.assign(&params, 0.0, &transport());
            b.assign(&params, 0.0, &transport());
            a.attack(1234);
            b.attack(1234);
            let xa = run(&mut a, 500);
            let xb = run(&mut b, 500);
            assert!(xa.iter().zip(&xb).all(|(x, y)| x.to_bits() == y.to_bits()));

            let mut c = Modulator::new();
            c.assign(&params, 0.0, &transport());
            c.attack(4321);
            assert_ne!(run(&mut c, 500), xa);
        }
    }

    #[test]
    fn test_family_switch() {
        let mut m = Modulator::new();
        let steps = ModulatorParams {
            shape: ModulatorShape::Steps,
            ..Default::default()
        };
        m.assign(&steps, 0.0, &transport());
        m.attack(0);
        let first = m.process(1);
        assert_relative_eq!(first, 1.0, epsilon = 1e-6);

        let contour = ModulatorParams {
            shape: ModulatorShape::Contour,
            ..Default::default()
        };
        m.assign(&contour, 0.0, &transport());
        m.attack(0);
        let rising = run(&mut m, 10);
        assert!(rising.windows(2).all(|w| w[1] >= w[0]));
        assert_eq!(m.shape(), ModulatorShape::Contour);
    }

    #[test]
    fn test_contour_release() {
        let params = ModulatorParams {
            shape: ModulatorShape::Contour,
            contour: ContourParams {
                attack: 0.0,
                decay: 0.0,
                sustain: 1.0,
                release: 0.01,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut m = Modulator::new();
        m.assign(&params, 0.0, &transport());
        m.attack(0);
        assert_eq!(m.process(32), 1.0);
        m.release();
        run(&mut m, 20);
        assert_eq!(m.output(), 0.0);
    }

    #[test]
    fn test_unipolar_steps() {
        let mut params = ModulatorParams {
            shape: ModulatorShape::Steps,
            unipolar: true,
            ..Default::default()
        };
        params.steps.values[0] = -1.0;
        let mut m = Modulator::new();
        m.assign(&params, 0.0, &transport());
        m.attack(0);
        assert_eq!(m.process(1), 0.0);
    }

    #[test]
    fn test_outputs_bounded_for_every_shape() {
        for &shape in ModulatorShape::all() {
            let params = ModulatorParams {
                shape,
                rate: 3.0,
                deform: 0.4,
                angle: -0.3,
                ..Default::default()
            };
            let mut m = Modulator::new();
            m.assign(&params, 0.0, &transport());
            m.attack(7);
            for v in run(&mut m, 1000) {
                assert!((-1.0..=1.0).contains(&v), "{} produced {}", shape.name(), v);
            }
        }
    }

    #[test]
    fn test_params_serde() {
        let params = ModulatorParams {
            shape: ModulatorShape::Pulse,
            rate_mode: RateMode::TempoSync,
            ..Default::default()
        };
        let json = serde_json::to_string(&params).unwrap();
        let back: ModulatorParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
    }
}
