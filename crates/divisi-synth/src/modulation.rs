//! Modulation matrix.
//!
//! Routes modulation sources (envelopes, modulators, MIDI controllers, note
//! data, macros) to synthesis destinations with a depth and a shaping curve.
//!
//! Sources live in a flat [`SourceValues`] table indexed by
//! [`ModSource::index`]; results accumulate into [`DestinationValues`] in entry
//! order, so the same inputs and routing always produce the same offsets.
//! Nothing here allocates.

use serde::{Deserialize, Serialize};

pub const NUM_MODULATORS: usize = 3;
pub const NUM_MACROS: usize = 8;
pub const NUM_CCS: usize = 128;
pub const NUM_FILTERS: usize = 2;
pub const NUM_AUX: usize = 2;

const MODULATOR_BASE: usize = 9;
const MACRO_BASE: usize = MODULATOR_BASE + NUM_MODULATORS + 4;
const CC_BASE: usize = MACRO_BASE + NUM_MACROS;

/// Size of the flat source table.
pub const NUM_SOURCES: usize = CC_BASE + NUM_CCS;

/// Modulation source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ModSource {
    /// Always zero.
    #[default]
    Off,
    /// Always one.
    Constant,
    /// Note-on velocity, 0..1.
    Velocity,
    /// Note-off velocity, 0..1 (zero while the note is held).
    ReleaseVelocity,
    /// Key relative to middle C, one unit per octave.
    KeyTrack,
    /// Per-note random value, -1..1.
    Random,
    /// One while the key is held.
    Gate,
    AmpEnvelope,
    FilterEnvelope,
    Modulator(u8),
    ModWheel,
    /// -1..1.
    PitchBend,
    ChannelAftertouch,
    PolyAftertouch,
    Macro(u8),
    Cc(u8),
}

impl ModSource {
    /// Position in the flat source table. Out-of-range sub-indices map to [`ModSource::Off`].
    #[inline]
    pub fn index(self) -> usize {
        match self {
            ModSource::Off => 0,
            ModSource::Constant => 1,
            ModSource::Velocity => 2,
            ModSource::ReleaseVelocity => 3,
            ModSource::KeyTrack => 4,
            ModSource::Random => 5,
            ModSource::Gate => 6,
            ModSource::AmpEnvelope => 7,
            ModSource::FilterEnvelope => 8,
            ModSource::Modulator(i) if (i as usize) < NUM_MODULATORS => MODULATOR_BASE + i as usize,
            ModSource::ModWheel => MODULATOR_BASE + NUM_MODULATORS,
            ModSource::PitchBend => MODULATOR_BASE + NUM_MODULATORS + 1,
            ModSource::ChannelAftertouch => MODULATOR_BASE + NUM_MODULATORS + 2,
            ModSource::PolyAftertouch => MODULATOR_BASE + NUM_MODULATORS + 3,
            ModSource::Macro(i) if (i as usize) < NUM_MACROS => MACRO_BASE + i as usize,
            ModSource::Cc(cc) if (cc as usize) < NUM_CCS => CC_BASE + cc as usize,
            ModSource::Modulator(_) | ModSource::Macro(_) | ModSource::Cc(_) => 0,
        }
    }

    /// True for sources that only exist per voice (note data, envelopes, modulators).
    pub fn is_per_voice(self) -> bool {
        matches!(
            self,
            ModSource::Velocity
                | ModSource::ReleaseVelocity
                | ModSource::KeyTrack
                | ModSource::Random
                | ModSource::Gate
                | ModSource::AmpEnvelope
                | ModSource::FilterEnvelope
                | ModSource::Modulator(_)
                | ModSource::PolyAftertouch
        )
    }
}

/// Modulation destination. Depth units follow the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ModDestination {
    /// Semitones.
    #[default]
    Pitch,
    /// Decibels.
    Amplitude,
    /// -1..1, added to the zone pan.
    Pan,
    /// Decibels before the filters.
    PreFilterGain,
    /// Semitones.
    FilterCutoff(u8),
    /// Added to the 0..1 resonance.
    FilterResonance(u8),
    /// Added to the 0..1 wet mix.
    FilterMix(u8),
    /// Octaves.
    ModulatorRate(u8),
    /// Decibels.
    AuxLevel(u8),
}

/// Size of the flat destination table.
pub const NUM_DESTINATIONS: usize = 4 + 3 * NUM_FILTERS + NUM_MODULATORS + NUM_AUX;

impl ModDestination {
    /// Position in the flat destination table, or `None` for out-of-range sub-indices.
    #[inline]
    pub fn index(self) -> Option<usize> {
        let filters = 4;
        let modulators = filters + 3 * NUM_FILTERS;
        let aux = modulators + NUM_MODULATORS;
        match self {
            ModDestination::Pitch => Some(0),
            ModDestination::Amplitude => Some(1),
            ModDestination::Pan => Some(2),
            ModDestination::PreFilterGain => Some(3),
            ModDestination::FilterCutoff(i) if (i as usize) < NUM_FILTERS => Some(filters + i as usize),
            ModDestination::FilterResonance(i) if (i as usize) < NUM_FILTERS => {
                Some(filters + NUM_FILTERS + i as usize)
            }
            ModDestination::FilterMix(i) if (i as usize) < NUM_FILTERS => {
                Some(filters + 2 * NUM_FILTERS + i as usize)
            }
            ModDestination::ModulatorRate(i) if (i as usize) < NUM_MODULATORS => {
                Some(modulators + i as usize)
            }
            ModDestination::AuxLevel(i) if (i as usize) < NUM_AUX => Some(aux + i as usize),
            _ => None,
        }
    }
}

/// Shaping applied to the source before depth scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ModCurve {
    #[default]
    Linear,
    /// `x·|x|`, sign preserved.
    Squared,
    Cubed,
    /// Slow start, `(2^(4|x|) - 1) / 15`, sign preserved.
    Exponential,
    /// Soft clip, `tanh(2x) / tanh(2)`.
    BipolarSaturate,
    /// `1 - x`.
    Invert,
    /// Unipolar to bipolar, `2x - 1`.
    Bipolar,
}

impl ModCurve {
    #[inline]
    pub fn apply(self, x: f32) -> f32 {
        match self {
            ModCurve::Linear => x,
            ModCurve::Squared => x * x.abs(),
            ModCurve::Cubed => x * x * x,
            ModCurve::Exponential => ((4.0 * x.abs()).exp2() - 1.0) / 15.0 * x.signum(),
            ModCurve::BipolarSaturate => (2.0 * x).tanh() / 2.0f32.tanh(),
            ModCurve::Invert => 1.0 - x,
            ModCurve::Bipolar => 2.0 * x - 1.0,
        }
    }
}

/// One routing.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MatrixEntry {
    pub source: ModSource,
    /// Optional multiplier applied after the curve.
    pub source2: Option<ModSource>,
    pub destination: ModDestination,
    pub depth: f32,
    pub curve: ModCurve,
    pub active: bool,
}

impl MatrixEntry {
    pub fn new(source: ModSource, destination: ModDestination, depth: f32) -> Self {
        Self {
            source,
            source2: None,
            destination,
            depth,
            curve: ModCurve::Linear,
            active: true,
        }
    }

    pub fn with_curve(mut self, curve: ModCurve) -> Self {
        self.curve = curve;
        self
    }

    pub fn with_source2(mut self, source2: ModSource) -> Self {
        self.source2 = Some(source2);
        self
    }

    /// Contribution for the given sources; zero when inactive.
    #[inline]
    pub fn contribution(&self, sources: &SourceValues) -> f32 {
        if !self.active {
            return 0.0;
        }
        let value = self.curve.apply(sources.get(self.source));
        let scale = self.source2.map_or(1.0, |s| sources.get(s));
        self.depth * value * scale
    }
}

/// Flat table of current source values.
#[derive(Debug, Clone)]
pub struct SourceValues {
    values: [f32; NUM_SOURCES],
}

impl Default for SourceValues {
    fn default() -> Self {
        let mut values = [0.0; NUM_SOURCES];
        values[ModSource::Constant.index()] = 1.0;
        Self { values }
    }
}

impl SourceValues {
    #[inline]
    pub fn get(&self, source: ModSource) -> f32 {
        self.values[source.index()]
    }

    /// Writes to `Off`, `Constant` and out-of-range sources are ignored.
    #[inline]
    pub fn set(&mut self, source: ModSource, value: f32) {
        let index = source.index();
        if index > 1 {
            self.values[index] = value;
        }
    }

    /// Copy all 128 controller values (0..1).
    pub fn set_ccs(&mut self, ccs: &[f32; NUM_CCS]) {
        self.values[CC_BASE..CC_BASE + NUM_CCS].copy_from_slice(ccs);
    }

    pub fn set_macros(&mut self, macros: &[f32; NUM_MACROS]) {
        self.values[MACRO_BASE..MACRO_BASE + NUM_MACROS].copy_from_slice(macros);
    }
}

/// Accumulated offsets per destination.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DestinationValues {
    values: [f32; NUM_DESTINATIONS],
}

impl DestinationValues {
    #[inline]
    pub fn get(&self, destination: ModDestination) -> f32 {
        destination.index().map_or(0.0, |i| self.values[i])
    }

    #[inline]
    pub fn add(&mut self, destination: ModDestination, value: f32) {
        if let Some(i) = destination.index() {
            self.values[i] += value;
        }
    }

    /// Element-wise sum, used to layer part offsets under zone offsets.
    #[inline]
    pub fn accumulate(&mut self, other: &DestinationValues) {
        for (a, b) in self.values.iter_mut().zip(other.values.iter()) {
            *a += *b;
        }
    }

    #[inline]
    pub fn reset(&mut self) {
        self.values = [0.0; NUM_DESTINATIONS];
    }
}

/// Sum every entry into `out`, in index order.
#[inline]
pub fn evaluate(entries: &[MatrixEntry], sources: &SourceValues, out: &mut DestinationValues) {
    for entry in entries {
        if entry.active {
            out.add(entry.destination, entry.contribution(sources));
        }
    }
}

/// Per-voice (or per-part) matrix evaluator holding the last block's offsets.
#[derive(Debug, Clone, Default)]
pub struct ModulationMatrix {
    destinations: DestinationValues,
}

impl ModulationMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute all offsets from `entries`. `base` is added first (part offsets).
    #[inline]
    pub fn compute(
        &mut self,
        entries: &[MatrixEntry],
        sources: &SourceValues,
        base: Option<&DestinationValues>,
    ) -> &DestinationValues {
        self.destinations.reset();
        if let Some(base) = base {
            self.destinations.accumulate(base);
        }
        evaluate(entries, sources, &mut self.destinations);
        &self.destinations
    }

    /// Offsets from the last [`compute`](Self::compute) call.
    #[inline]
    pub fn destinations(&self) -> &DestinationValues {
        &self.destinations
    }

    pub fn reset(&mut self) {
        self.destinations.reset();
    }
}
