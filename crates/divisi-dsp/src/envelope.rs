//! Block-rate AHDSR envelope.
//!
//! Segment times are log2 seconds and are read through
//! [`Tables::env_phase_increment`], so a segment advances a fixed-point phase
//! once per block. Callers smooth the per-block output across the block with a
//! [`Lipol`](divisi_core::Lipol).

use divisi_core::tables::ENV_PHASE_MAX;
use divisi_core::Tables;
use serde::{Deserialize, Serialize};

/// Level below which a decaying envelope is considered finished.
pub const SILENCE: f32 = 1e-5;

/// Release rate (log2 seconds) used by [`Ahdsr::uber_release`]. Roughly 11 ms.
pub const UBER_RELEASE_RATE: f32 = -6.5;

/// Worst case: attack, hold and decay all instant in one block.
const MAX_TRANSITIONS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AhdsrParams {
    pub attack: f32,
    pub hold: f32,
    pub decay: f32,
    /// Level, 0..1.
    pub sustain: f32,
    pub release: f32,
    pub attack_curve: f32,
    pub decay_curve: f32,
    pub release_curve: f32,
}

impl Default for AhdsrParams {
    fn default() -> Self {
        Self {
            attack: -10.0,
            hold: -10.0,
            decay: -2.0,
            sustain: 1.0,
            release: -5.0,
            attack_curve: 0.0,
            decay_curve: 0.0,
            release_curve: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvelopeStage {
    #[default]
    Idle,
    Attack,
    Hold,
    Decay,
    Sustain,
    Release,
}

#[derive(Debug, Clone, Default)]
pub struct Ahdsr {
    stage: EnvelopeStage,
    phase: u32,
    output: f32,
    attack_from: f32,
    droplevel: f32,
    uber: bool,
}

impl Ahdsr {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the attack from the current level.
    pub fn attack(&mut self) {
        self.attack_from = self.output.clamp(0.0, 1.0);
        self.enter(EnvelopeStage::Attack);
        self.uber = false;
    }

    /// Move to release, capturing the current level. No-op when idle or releasing.
    pub fn release(&mut self) {
        if matches!(self.stage, EnvelopeStage::Idle | EnvelopeStage::Release) {
            return;
        }
        self.droplevel = self.output;
        self.enter(EnvelopeStage::Release);
    }

    /// Fast fixed-rate release that overrides any configured release time.
    pub fn uber_release(&mut self) {
        if self.stage == EnvelopeStage::Idle {
            return;
        }
        self.droplevel = self.output;
        self.enter(EnvelopeStage::Release);
        self.uber = true;
    }

    /// Drop to silence immediately.
    pub fn kill(&mut self) {
        self.enter(EnvelopeStage::Idle);
        self.output = 0.0;
        self.uber = false;
    }

    #[inline]
    pub fn stage(&self) -> EnvelopeStage {
        self.stage
    }

    #[inline]
    pub fn output(&self) -> f32 {
        self.output
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.stage == EnvelopeStage::Idle
    }

    #[inline]
    pub fn is_releasing(&self) -> bool {
        self.stage == EnvelopeStage::Release
    }

    /// True after [`uber_release`](Self::uber_release) until the envelope goes idle.
    #[inline]
    pub fn is_uber_released(&self) -> bool {
        self.uber && self.stage == EnvelopeStage::Release
    }

    fn enter(&mut self, stage: EnvelopeStage) {
        self.stage = stage;
        self.phase = 0;
    }

    fn increment(&self, params: &AhdsrParams, tables: &Tables) -> u32 {
        match self.stage {
            EnvelopeStage::Attack => tables.env_phase_increment(params.attack),
            EnvelopeStage::Hold => tables.env_phase_increment(params.hold),
            EnvelopeStage::Decay => tables.env_phase_increment(params.decay),
            EnvelopeStage::Release if self.uber => tables.env_phase_increment(UBER_RELEASE_RATE),
            EnvelopeStage::Release => tables.env_phase_increment(params.release),
            EnvelopeStage::Idle | EnvelopeStage::Sustain => 0,
        }
    }

    /// Advance one block and return the level at its end.
    pub fn process(&mut self, params: &AhdsrParams, tables: &Tables) -> f32 {
        let sustain = params.sustain.clamp(0.0, 1.0);

        for _ in 0..MAX_TRANSITIONS {
            let inc = self.increment(params, tables);
            self.phase = self.phase.saturating_add(inc);
            let done = self.phase >= ENV_PHASE_MAX;
            let x = self.phase.min(ENV_PHASE_MAX) as f32 / ENV_PHASE_MAX as f32;

            match self.stage {
                EnvelopeStage::Idle => {
                    self.output = 0.0;
                    break;
                }
                EnvelopeStage::Attack => {
                    if done {
                        self.output = 1.0;
                        self.enter(EnvelopeStage::Hold);
                        continue;
                    }
                    let shape = tables.curve(params.attack_curve, x);
                    self.output = self.attack_from + (1.0 - self.attack_from) * shape;
                    break;
                }
                EnvelopeStage::Hold => {
                    self.output = 1.0;
                    if done {
                        self.enter(EnvelopeStage::Decay);
                        continue;
                    }
                    break;
                }
                EnvelopeStage::Decay => {
                    if done {
                        self.output = sustain;
                        if sustain <= SILENCE {
                            self.droplevel = sustain;
                            self.enter(EnvelopeStage::Release);
                        } else {
                            self.enter(EnvelopeStage::Sustain);
                        }
                        continue;
                    }
                    let shape = tables.curve(params.decay_curve, x);
                    self.output = sustain + (1.0 - sustain) * (1.0 - shape);
                    if sustain <= SILENCE && self.output < SILENCE {
                        self.kill();
                    }
                    break;
                }
                EnvelopeStage::Sustain => {
                    self.output = sustain;
                    break;
                }
                EnvelopeStage::Release => {
                    let curve = if self.uber { 0.0 } else { params.release_curve };
                    let level = self.droplevel * (1.0 - tables.curve(curve, x));
                    if done || level < SILENCE {
                        self.kill();
                    } else {
                        self.output = level;
                    }
                    break;
                }
            }
        }

        self.output = self.output.clamp(0.0, 1.0);
        self.output
    }
}
