//! Zones: key/velocity-addressable sample playback regions.
//!
//! A [`Zone`] is plain data. The control thread edits its own copy and ships
//! it to the engine in a command; voices read the engine's copy by slot each
//! block and never write to it.
//!
//! Numeric fields that editors and the modulation matrix address individually
//! are listed in [`ZoneParam`]. Each one has a [`ParamDescriptor`] with a name
//! and a [`ParamRange`], and is read and written through [`Zone::param`] and
//! [`Zone::set_param`].

use crate::modulation::{MatrixEntry, NUM_AUX, NUM_FILTERS, NUM_MODULATORS};
use crate::sample::SampleId;
use divisi_core::{ParamRange, ParamScale, ParamUnit};
use divisi_dsp::{AhdsrParams, ModulatorParams};
use serde::{Deserialize, Serialize};

pub const ZONE_MATRIX_SLOTS: usize = 12;

/// Aux send levels at or below this are off.
pub const AUX_OFF_DB: f32 = -96.0;

/// Engine zone slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ZoneId(pub u32);

impl ZoneId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Inclusive MIDI range with optional fades at either edge.
///
/// Inside `fade_low` steps of `low` (or `fade_high` of `high`) the zone
/// sounds at reduced gain, which gives layered zones a crossfade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FadeRange {
    pub low: u8,
    pub high: u8,
    pub fade_low: u8,
    pub fade_high: u8,
}

impl Default for FadeRange {
    fn default() -> Self {
        Self::new(0, 127)
    }
}

impl FadeRange {
    pub const fn new(low: u8, high: u8) -> Self {
        Self {
            low,
            high,
            fade_low: 0,
            fade_high: 0,
        }
    }

    pub const fn with_fades(mut self, fade_low: u8, fade_high: u8) -> Self {
        self.fade_low = fade_low;
        self.fade_high = fade_high;
        self
    }

    #[inline]
    pub fn contains(&self, value: u8) -> bool {
        value >= self.low && value <= self.high
    }

    /// Linear crossfade gain, 0..1. Zero outside the range.
    #[inline]
    pub fn gain(&self, value: u8) -> f32 {
        if !self.contains(value) {
            return 0.0;
        }
        let mut gain = 1.0;
        let from_low = (value - self.low) as f32;
        if from_low < self.fade_low as f32 {
            gain *= (from_low + 1.0) / (self.fade_low as f32 + 1.0);
        }
        let from_high = (self.high - value) as f32;
        if from_high < self.fade_high as f32 {
            gain *= (from_high + 1.0) / (self.fade_high as f32 + 1.0);
        }
        gain
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlayMode {
    /// Play start to end once, stopping early on release.
    #[default]
    Forward,
    /// Loop between the loop points for as long as the envelope runs.
    Loop,
    /// Loop while the key is held, then play through to the end.
    LoopUntilRelease,
    /// Play start to end once and ignore note-off.
    OneShot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FilterMode {
    #[default]
    Off,
    Lowpass,
    Highpass,
    Bandpass,
    Notch,
    Allpass,
    PeakEq,
    LowShelf,
    HighShelf,
    /// Lowpass through bandpass to highpass as `morph` goes 0..1.
    LpHpMorph,
    /// Lowpass with resonance given as bandwidth in octaves.
    LowpassBw,
    HighpassBw,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterParams {
    pub mode: FilterMode,
    /// MIDI note number.
    pub cutoff: f32,
    /// 0..1.
    pub resonance: f32,
    /// Shelf and peak gain.
    pub gain_db: f32,
    /// Octaves, for the peak and bandwidth modes.
    pub bandwidth: f32,
    pub morph: f32,
    /// Cutoff semitones per key semitone away from the root.
    pub keytrack: f32,
    /// Wet amount, 0..1.
    pub mix: f32,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            mode: FilterMode::Off,
            cutoff: 100.0,
            resonance: 0.0,
            gain_db: 0.0,
            bandwidth: 1.0,
            morph: 0.0,
            keytrack: 0.0,
            mix: 1.0,
        }
    }
}

impl FilterParams {
    /// Q for a 0..1 resonance: Butterworth at zero, five octaves sharper at one.
    #[inline]
    pub fn q(resonance: f32) -> f64 {
        std::f64::consts::FRAC_1_SQRT_2 * (resonance.clamp(0.0, 1.0) as f64 * 5.0).exp2()
    }
}

/// One sample region and everything needed to play it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Zone {
    /// Owning part, 0..16.
    pub part: u8,
    pub key: FadeRange,
    /// Inclusive, compared against the incoming velocity as is: a note
    /// matches when `low <= velocity <= high`.
    pub velocity: FadeRange,
    pub root_key: u8,
    /// Semitones.
    pub transpose: f32,
    /// Cents.
    pub tune: f32,
    /// Pitch semitones per key semitone; 0 plays every key at the root pitch.
    pub keytrack: f32,
    pub sample: Option<SampleId>,
    pub sample_start: usize,
    /// Exclusive end frame; 0 means the end of the sample.
    pub sample_end: usize,
    pub loop_start: usize,
    /// Exclusive; 0 means the sample end.
    pub loop_end: usize,
    pub play_mode: PlayMode,
    pub pre_filter_gain_db: f32,
    pub filters: [FilterParams; NUM_FILTERS],
    pub amp_env: AhdsrParams,
    pub filter_env: AhdsrParams,
    pub modulators: [ModulatorParams; NUM_MODULATORS],
    pub matrix: [MatrixEntry; ZONE_MATRIX_SLOTS],
    pub gain_db: f32,
    /// -1..1.
    pub pan: f32,
    /// 0 ignores velocity, 1 maps velocity 0 to silence.
    pub velocity_sens: f32,
    /// Send levels in dB.
    pub aux: [f32; NUM_AUX],
    /// Zero for none. Starting a zone releases the part's other voices in the same group.
    pub mute_group: u8,
    /// Always play polyphonically, whatever the part's poly mode.
    pub ignore_part_polymode: bool,
}

impl Default for Zone {
    fn default() -> Self {
        Self {
            part: 0,
            key: FadeRange::default(),
            velocity: FadeRange::default(),
            root_key: 60,
            transpose: 0.0,
            tune: 0.0,
            keytrack: 1.0,
            sample: None,
            sample_start: 0,
            sample_end: 0,
            loop_start: 0,
            loop_end: 0,
            play_mode: PlayMode::Forward,
            pre_filter_gain_db: 0.0,
            filters: [FilterParams::default(); NUM_FILTERS],
            amp_env: AhdsrParams::default(),
            filter_env: AhdsrParams::default(),
            modulators: [ModulatorParams::default(); NUM_MODULATORS],
            matrix: [MatrixEntry::default(); ZONE_MATRIX_SLOTS],
            gain_db: 0.0,
            pan: 0.0,
            velocity_sens: 1.0,
            aux: [AUX_OFF_DB; NUM_AUX],
            mute_group: 0,
            ignore_part_polymode: false,
        }
    }
}

impl Zone {
    pub fn new(part: u8) -> Self {
        Self {
            part,
            ..Default::default()
        }
    }

    pub fn with_keys(mut self, low: u8, high: u8) -> Self {
        self.key = FadeRange::new(low, high);
        self
    }

    pub fn with_velocities(mut self, low: u8, high: u8) -> Self {
        self.velocity = FadeRange::new(low, high);
        self
    }

    pub fn with_root_key(mut self, root_key: u8) -> Self {
        self.root_key = root_key;
        self
    }

    pub fn with_sample(mut self, sample: SampleId) -> Self {
        self.sample = Some(sample);
        self
    }

    pub fn with_play_mode(mut self, play_mode: PlayMode) -> Self {
        self.play_mode = play_mode;
        self
    }

    /// True when the event falls inside both ranges.
    #[inline]
    pub fn matches(&self, key: u8, velocity: u8) -> bool {
        self.key.contains(key) && self.velocity.contains(velocity)
    }

    /// Key and velocity crossfade gain for the event.
    #[inline]
    pub fn crossfade_gain(&self, key: u8, velocity: u8) -> f32 {
        self.key.gain(key) * self.velocity.gain(velocity)
    }

    /// Playback region `[start, end)` clamped to `frames`.
    pub fn play_region(&self, frames: usize) -> (usize, usize) {
        let end = if self.sample_end == 0 {
            frames
        } else {
            self.sample_end.min(frames)
        };
        (self.sample_start.min(end), end)
    }

    /// Loop region `[start, end)` clamped to the play region. `None` when empty.
    pub fn loop_region(&self, frames: usize) -> Option<(usize, usize)> {
        let (play_start, play_end) = self.play_region(frames);
        let end = if self.loop_end == 0 {
            play_end
        } else {
            self.loop_end.min(play_end)
        };
        let start = self.loop_start.clamp(play_start, end);
        (end > start).then_some((start, end))
    }

    /// Current value of an addressable field, or `None` for an out-of-range slot.
    pub fn param(&self, param: ZoneParam) -> Option<f32> {
        Some(match param {
            ZoneParam::GainDb => self.gain_db,
            ZoneParam::Pan => self.pan,
            ZoneParam::VelocitySens => self.velocity_sens,
            ZoneParam::Transpose => self.transpose,
            ZoneParam::Tune => self.tune,
            ZoneParam::Keytrack => self.keytrack,
            ZoneParam::PreFilterGain => self.pre_filter_gain_db,
            ZoneParam::RootKey => self.root_key as f32,
            ZoneParam::KeyLow => self.key.low as f32,
            ZoneParam::KeyHigh => self.key.high as f32,
            ZoneParam::KeyFadeLow => self.key.fade_low as f32,
            ZoneParam::KeyFadeHigh => self.key.fade_high as f32,
            ZoneParam::VelocityLow => self.velocity.low as f32,
            ZoneParam::VelocityHigh => self.velocity.high as f32,
            ZoneParam::VelocityFadeLow => self.velocity.fade_low as f32,
            ZoneParam::VelocityFadeHigh => self.velocity.fade_high as f32,
            ZoneParam::MuteGroup => self.mute_group as f32,
            ZoneParam::AuxLevel(i) => *self.aux.get(i as usize)?,
            ZoneParam::Filter(i, p) => {
                let f = self.filters.get(i as usize)?;
                match p {
                    FilterParam::Cutoff => f.cutoff,
                    FilterParam::Resonance => f.resonance,
                    FilterParam::Gain => f.gain_db,
                    FilterParam::Bandwidth => f.bandwidth,
                    FilterParam::Morph => f.morph,
                    FilterParam::Keytrack => f.keytrack,
                    FilterParam::Mix => f.mix,
                }
            }
            ZoneParam::AmpEnv(p) => p.get(&self.amp_env),
            ZoneParam::FilterEnv(p) => p.get(&self.filter_env),
            ZoneParam::Modulator(i, p) => {
                let m = self.modulators.get(i as usize)?;
                match p {
                    ModulatorParam::Rate => m.rate,
                    ModulatorParam::Deform => m.deform,
                    ModulatorParam::Angle => m.angle,
                    ModulatorParam::Phase => m.phase,
                }
            }
            ZoneParam::MatrixDepth(i) => self.matrix.get(i as usize)?.depth,
        })
    }

    /// Write one field, clamped to its descriptor range. Returns false for an
    /// out-of-range slot.
    pub fn set_param(&mut self, param: ZoneParam, value: f32) -> bool {
        let value = param.descriptor().range.clamp(value);
        // Integer ranges are already rounded and within 0..=127.
        let byte = value as u8;
        match param {
            ZoneParam::GainDb => self.gain_db = value,
            ZoneParam::Pan => self.pan = value,
            ZoneParam::VelocitySens => self.velocity_sens = value,
            ZoneParam::Transpose => self.transpose = value,
            ZoneParam::Tune => self.tune = value,
            ZoneParam::Keytrack => self.keytrack = value,
            ZoneParam::PreFilterGain => self.pre_filter_gain_db = value,
            ZoneParam::RootKey => self.root_key = byte,
            ZoneParam::KeyLow => self.key.low = byte,
            ZoneParam::KeyHigh => self.key.high = byte,
            ZoneParam::KeyFadeLow => self.key.fade_low = byte,
            ZoneParam::KeyFadeHigh => self.key.fade_high = byte,
            ZoneParam::VelocityLow => self.velocity.low = byte,
            ZoneParam::VelocityHigh => self.velocity.high = byte,
            ZoneParam::VelocityFadeLow => self.velocity.fade_low = byte,
            ZoneParam::VelocityFadeHigh => self.velocity.fade_high = byte,
            ZoneParam::MuteGroup => self.mute_group = byte,
            ZoneParam::AuxLevel(i) => match self.aux.get_mut(i as usize) {
                Some(level) => *level = value,
                None => return false,
            },
            ZoneParam::Filter(i, p) => {
                let Some(f) = self.filters.get_mut(i as usize) else {
                    return false;
                };
                match p {
                    FilterParam::Cutoff => f.cutoff = value,
                    FilterParam::Resonance => f.resonance = value,
                    FilterParam::Gain => f.gain_db = value,
                    FilterParam::Bandwidth => f.bandwidth = value,
                    FilterParam::Morph => f.morph = value,
                    FilterParam::Keytrack => f.keytrack = value,
                    FilterParam::Mix => f.mix = value,
                }
            }
            ZoneParam::AmpEnv(p) => p.set(&mut self.amp_env, value),
            ZoneParam::FilterEnv(p) => p.set(&mut self.filter_env, value),
            ZoneParam::Modulator(i, p) => {
                let Some(m) = self.modulators.get_mut(i as usize) else {
                    return false;
                };
                match p {
                    ModulatorParam::Rate => m.rate = value,
                    ModulatorParam::Deform => m.deform = value,
                    ModulatorParam::Angle => m.angle = value,
                    ModulatorParam::Phase => m.phase = value,
                }
            }
            ZoneParam::MatrixDepth(i) => match self.matrix.get_mut(i as usize) {
                Some(entry) => entry.depth = value,
                None => return false,
            },
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnvParam {
    Attack,
    Hold,
    Decay,
    Sustain,
    Release,
    AttackCurve,
    DecayCurve,
    ReleaseCurve,
}

impl EnvParam {
    fn get(self, env: &AhdsrParams) -> f32 {
        match self {
            EnvParam::Attack => env.attack,
            EnvParam::Hold => env.hold,
            EnvParam::Decay => env.decay,
            EnvParam::Sustain => env.sustain,
            EnvParam::Release => env.release,
            EnvParam::AttackCurve => env.attack_curve,
            EnvParam::DecayCurve => env.decay_curve,
            EnvParam::ReleaseCurve => env.release_curve,
        }
    }

    fn set(self, env: &mut AhdsrParams, value: f32) {
        let field = match self {
            EnvParam::Attack => &mut env.attack,
            EnvParam::Hold => &mut env.hold,
            EnvParam::Decay => &mut env.decay,
            EnvParam::Sustain => &mut env.sustain,
            EnvParam::Release => &mut env.release,
            EnvParam::AttackCurve => &mut env.attack_curve,
            EnvParam::DecayCurve => &mut env.decay_curve,
            EnvParam::ReleaseCurve => &mut env.release_curve,
        };
        *field = value;
    }

    fn descriptor(self, group: &'static str) -> ParamDescriptor {
        let defaults = AhdsrParams::default();
        let range = match self {
            EnvParam::Sustain => ParamRange::linear(0.0, 1.0, 1.0, ParamUnit::Percent),
            EnvParam::AttackCurve | EnvParam::DecayCurve | EnvParam::ReleaseCurve => {
                ParamRange::linear(-1.0, 1.0, 0.0, ParamUnit::None)
            }
            _ => ParamRange::linear(-10.0, 6.0, self.get(&defaults), ParamUnit::Log2Seconds),
        };
        ParamDescriptor {
            group,
            name: self.label(),
            range,
        }
    }

    fn label(self) -> &'static str {
        match self {
            EnvParam::Attack => "Attack",
            EnvParam::Hold => "Hold",
            EnvParam::Decay => "Decay",
            EnvParam::Sustain => "Sustain",
            EnvParam::Release => "Release",
            EnvParam::AttackCurve => "Attack Curve",
            EnvParam::DecayCurve => "Decay Curve",
            EnvParam::ReleaseCurve => "Release Curve",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterParam {
    Cutoff,
    Resonance,
    Gain,
    Bandwidth,
    Morph,
    Keytrack,
    Mix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModulatorParam {
    Rate,
    Deform,
    Angle,
    Phase,
}

/// A single addressable numeric field of a [`Zone`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ZoneParam {
    GainDb,
    Pan,
    VelocitySens,
    Transpose,
    Tune,
    Keytrack,
    PreFilterGain,
    RootKey,
    KeyLow,
    KeyHigh,
    KeyFadeLow,
    KeyFadeHigh,
    VelocityLow,
    VelocityHigh,
    VelocityFadeLow,
    VelocityFadeHigh,
    MuteGroup,
    AuxLevel(u8),
    Filter(u8, FilterParam),
    AmpEnv(EnvParam),
    FilterEnv(EnvParam),
    Modulator(u8, ModulatorParam),
    MatrixDepth(u8),
}

/// Name and range of a [`ZoneParam`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamDescriptor {
    /// Editor section, e.g. `"Filter 1"`.
    pub group: &'static str,
    pub name: &'static str,
    pub range: ParamRange,
}

const FILTER_GROUPS: [&str; 2] = ["Filter 1", "Filter 2"];
const MODULATOR_GROUPS: [&str; 3] = ["LFO 1", "LFO 2", "LFO 3"];

fn indexed(groups: &'static [&'static str], i: u8) -> &'static str {
    groups.get(i as usize).copied().unwrap_or("")
}

impl ZoneParam {
    pub fn descriptor(self) -> ParamDescriptor {
        use ParamUnit::*;
        let key = |name, default| ("Mapping", name, ParamRange::integer(0, 127, default));
        let (group, name, range) = match self {
            ZoneParam::GainDb => ("Amp", "Gain", ParamRange::linear(-96.0, 24.0, 0.0, Decibels)),
            ZoneParam::Pan => ("Amp", "Pan", ParamRange::linear(-1.0, 1.0, 0.0, None)),
            ZoneParam::VelocitySens => {
                ("Amp", "Velocity Sensitivity", ParamRange::linear(0.0, 1.0, 1.0, Percent))
            }
            ZoneParam::Transpose => (
                "Pitch",
                "Transpose",
                ParamRange::new(-48.0, 48.0, 0.0, ParamScale::Integer, Semitones),
            ),
            ZoneParam::Tune => ("Pitch", "Tune", ParamRange::linear(-100.0, 100.0, 0.0, Cents)),
            ZoneParam::Keytrack => ("Pitch", "Keytrack", ParamRange::linear(-2.0, 2.0, 1.0, None)),
            ZoneParam::PreFilterGain => {
                ("Filter", "Pre-Filter Gain", ParamRange::linear(-24.0, 24.0, 0.0, Decibels))
            }
            ZoneParam::RootKey => key("Root Key", 60),
            ZoneParam::KeyLow => key("Key Low", 0),
            ZoneParam::KeyHigh => key("Key High", 127),
            ZoneParam::KeyFadeLow => key("Key Fade Low", 0),
            ZoneParam::KeyFadeHigh => key("Key Fade High", 0),
            ZoneParam::VelocityLow => key("Velocity Low", 0),
            ZoneParam::VelocityHigh => key("Velocity High", 127),
            ZoneParam::VelocityFadeLow => key("Velocity Fade Low", 0),
            ZoneParam::VelocityFadeHigh => key("Velocity Fade High", 0),
            ZoneParam::MuteGroup => ("Mapping", "Mute Group", ParamRange::integer(0, 127, 0)),
            ZoneParam::AuxLevel(_) => (
                "Output",
                "Aux Send",
                ParamRange::linear(AUX_OFF_DB, 12.0, AUX_OFF_DB, Decibels),
            ),
            ZoneParam::Filter(i, p) => {
                let group = indexed(&FILTER_GROUPS, i);
                let (name, range) = match p {
                    FilterParam::Cutoff => ("Cutoff", ParamRange::linear(-12.0, 140.0, 100.0, Semitones)),
                    FilterParam::Resonance => ("Resonance", ParamRange::linear(0.0, 1.0, 0.0, Percent)),
                    FilterParam::Gain => ("Gain", ParamRange::linear(-48.0, 48.0, 0.0, Decibels)),
                    FilterParam::Bandwidth => ("Bandwidth", ParamRange::logarithmic(0.05, 8.0, 1.0, None)),
                    FilterParam::Morph => ("Morph", ParamRange::linear(0.0, 1.0, 0.0, Percent)),
                    FilterParam::Keytrack => ("Keytrack", ParamRange::linear(-2.0, 2.0, 0.0, None)),
                    FilterParam::Mix => ("Mix", ParamRange::linear(0.0, 1.0, 1.0, Percent)),
                };
                (group, name, range)
            }
            ZoneParam::AmpEnv(p) => return p.descriptor("Amp Envelope"),
            ZoneParam::FilterEnv(p) => return p.descriptor("Filter Envelope"),
            ZoneParam::Modulator(i, p) => {
                let group = indexed(&MODULATOR_GROUPS, i);
                let (name, range) = match p {
                    ModulatorParam::Rate => ("Rate", ParamRange::linear(-7.0, 9.0, 0.0, None)),
                    ModulatorParam::Deform => ("Deform", ParamRange::linear(-1.0, 1.0, 0.0, None)),
                    ModulatorParam::Angle => ("Angle", ParamRange::linear(-1.0, 1.0, 0.0, None)),
                    ModulatorParam::Phase => ("Phase", ParamRange::linear(0.0, 1.0, 0.0, Percent)),
                };
                (group, name, range)
            }
            ZoneParam::MatrixDepth(_) => {
                ("Modulation", "Depth", ParamRange::linear(-96.0, 96.0, 0.0, None))
            }
        };
        ParamDescriptor { group, name, range }
    }

    /// Every addressable field, in editor order.
    pub fn all() -> Vec<ZoneParam> {
        let env = [
            EnvParam::Attack,
            EnvParam::Hold,
            EnvParam::Decay,
            EnvParam::Sustain,
            EnvParam::Release,
            EnvParam::AttackCurve,
            EnvParam::DecayCurve,
            EnvParam::ReleaseCurve,
        ];
        let filter = [
            FilterParam::Cutoff,
            FilterParam::Resonance,
            FilterParam::Gain,
            FilterParam::Bandwidth,
            FilterParam::Morph,
            FilterParam::Keytrack,
            FilterParam::Mix,
        ];
        let modulator = [
            ModulatorParam::Rate,
            ModulatorParam::Deform,
            ModulatorParam::Angle,
            ModulatorParam::Phase,
        ];

        let mut all = vec![
            ZoneParam::GainDb,
            ZoneParam::Pan,
            ZoneParam::VelocitySens,
            ZoneParam::Transpose,
            ZoneParam::Tune,
            ZoneParam::Keytrack,
            ZoneParam::PreFilterGain,
            ZoneParam::RootKey,
            ZoneParam::KeyLow,
            ZoneParam::KeyHigh,
            ZoneParam::KeyFadeLow,
            ZoneParam::KeyFadeHigh,
            ZoneParam::VelocityLow,
            ZoneParam::VelocityHigh,
            ZoneParam::VelocityFadeLow,
            ZoneParam::VelocityFadeHigh,
            ZoneParam::MuteGroup,
        ];
        all.extend((0..NUM_AUX as u8).map(ZoneParam::AuxLevel));
        for i in 0..NUM_FILTERS as u8 {
            all.extend(filter.iter().map(|&p| ZoneParam::Filter(i, p)));
        }
        all.extend(env.iter().map(|&p| ZoneParam::AmpEnv(p)));
        all.extend(env.iter().map(|&p| ZoneParam::FilterEnv(p)));
        for i in 0..NUM_MODULATORS as u8 {
            all.extend(modulator.iter().map(|&p| ZoneParam::Modulator(i, p)));
        }
        all.extend((0..ZONE_MATRIX_SLOTS as u8).map(ZoneParam::MatrixDepth));
        all
    }
}
