//! One sounding instance of a zone.
//!
//! Per block a voice:
//!
//! 1. refreshes its modulation sources (part controllers, note data, last
//!    block's envelope and modulator outputs)
//! 2. advances modulators and envelopes
//! 3. evaluates the zone matrix on top of the part offsets
//! 4. reads the sample with 4-point Hermite interpolation, the playback rate
//!    linearly interpolated per sample
//! 5. runs the pre-filter gain and both filters
//! 6. applies amplitude and equal-power pan and sums into the main and aux buses
//!
//! Voices never allocate. The sample is held as an `Arc` clone and dropped
//! only when the voice is killed or restarted; the engine keeps its own
//! reference until the control thread takes it back.

use crate::glide::Glide;
use crate::modulation::{
    DestinationValues, ModDestination, ModSource, ModulationMatrix, SourceValues, NUM_AUX,
    NUM_FILTERS, NUM_MODULATORS,
};
use crate::output::BlockOutput;
use crate::part::PartConfig;
use crate::sample::Sample;
use crate::zone::{FilterMode, FilterParams, PlayMode, Zone, ZoneId, AUX_OFF_DB};
use divisi_core::{Lipol, Tables, MAX_BLOCK_SIZE};
use divisi_dsp::{omega_from_note, Ahdsr, BiquadFilter, Modulator, Transport};
use std::f32::consts::FRAC_PI_4;
use std::sync::Arc;

/// Shared per-block working buffers. The engine owns one and lends it to each voice in turn.
#[derive(Debug, Clone)]
pub struct Scratch {
    left: [f32; MAX_BLOCK_SIZE],
    right: [f32; MAX_BLOCK_SIZE],
    dry_left: [f32; MAX_BLOCK_SIZE],
    dry_right: [f32; MAX_BLOCK_SIZE],
}

impl Default for Scratch {
    fn default() -> Self {
        Self {
            left: [0.0; MAX_BLOCK_SIZE],
            right: [0.0; MAX_BLOCK_SIZE],
            dry_left: [0.0; MAX_BLOCK_SIZE],
            dry_right: [0.0; MAX_BLOCK_SIZE],
        }
    }
}

/// Everything a note-on decides about a new voice.
#[derive(Debug, Clone, Copy)]
pub struct NoteStart {
    pub zone: ZoneId,
    pub part: u8,
    pub channel: u8,
    pub key: u8,
    pub velocity: u8,
    /// Semitones.
    pub detune: f32,
    /// Voices started by the same note-on share this id.
    pub note_id: u64,
    pub seed: u32,
    /// Previous pitch of the part, for portamento.
    pub glide_from: Option<f32>,
    /// The previous key was still held.
    pub is_legato: bool,
}

/// Per-block inputs shared by all voices of a part.
#[derive(Debug, Clone, Copy)]
pub struct BlockContext<'a> {
    pub tables: &'a Tables,
    pub transport: &'a Transport,
    pub part: &'a PartConfig,
    /// Controllers, bend, channel aftertouch and macros of the part's channel.
    pub part_sources: &'a SourceValues,
    /// Part matrix result plus pitch bend.
    pub part_offsets: &'a DestinationValues,
    pub poly_aftertouch: f32,
}

#[derive(Debug, Clone, Copy)]
struct Region {
    start: usize,
    end: usize,
    loop_start: usize,
    loop_end: usize,
    looping: bool,
}

impl Region {
    #[inline]
    fn tap(&self, data: &[f32], index: isize) -> f32 {
        let mut i = index;
        if self.looping && i >= self.loop_end as isize {
            i -= (self.loop_end - self.loop_start) as isize;
        }
        let i = i.clamp(self.start as isize, self.end as isize - 1);
        data[i as usize]
    }

    #[inline]
    fn read(&self, data: &[f32], index: usize, t: f32) -> f32 {
        let i = index as isize;
        hermite(
            self.tap(data, i - 1),
            self.tap(data, i),
            self.tap(data, i + 1),
            self.tap(data, i + 2),
            t,
        )
    }
}

#[inline]
fn hermite(x0: f32, x1: f32, x2: f32, x3: f32, t: f32) -> f32 {
    let c1 = 0.5 * (x2 - x0);
    let c2 = x0 - 2.5 * x1 + 2.0 * x2 - 0.5 * x3;
    let c3 = 0.5 * (x3 - x0) + 1.5 * (x1 - x2);
    ((c3 * t + c2) * t + c1) * t + x1
}

#[derive(Debug, Clone)]
pub struct Voice {
    zone: ZoneId,
    part: u8,
    channel: u8,
    key: u8,
    velocity: u8,
    release_velocity: u8,
    note_id: u64,
    mute_group: u8,
    gate: bool,
    finished: bool,
    random: f32,
    detune: f32,
    crossfade: f32,

    sample: Option<Arc<Sample>>,
    position: f64,

    amp_env: Ahdsr,
    filter_env: Ahdsr,
    modulators: [Modulator; NUM_MODULATORS],
    filters: [BiquadFilter; NUM_FILTERS],
    matrix: ModulationMatrix,
    sources: SourceValues,
    glide: Glide,

    rate: Lipol,
    pre_gain: Lipol,
    filter_mix: [Lipol; NUM_FILTERS],
    amp: [Lipol; 2],
    aux: [[Lipol; 2]; NUM_AUX],
}

impl Voice {
    pub fn new(block_size: usize) -> Self {
        let lipol = Lipol::new(block_size);
        Self {
            zone: ZoneId(0),
            part: 0,
            channel: 0,
            key: 0,
            velocity: 0,
            release_velocity: 0,
            note_id: 0,
            mute_group: 0,
            gate: false,
            finished: true,
            random: 0.0,
            detune: 0.0,
            crossfade: 1.0,
            sample: None,
            position: 0.0,
            amp_env: Ahdsr::new(),
            filter_env: Ahdsr::new(),
            modulators: Default::default(),
            filters: Default::default(),
            matrix: ModulationMatrix::new(),
            sources: SourceValues::default(),
            glide: Glide::new(),
            rate: lipol,
            pre_gain: lipol,
            filter_mix: [lipol; NUM_FILTERS],
            amp: [lipol; 2],
            aux: [[lipol; 2]; NUM_AUX],
        }
    }

    /// Bind to a zone and start from silence.
    pub fn start(
        &mut self,
        note: &NoteStart,
        zone: &Zone,
        sample: Option<Arc<Sample>>,
        part: &PartConfig,
        tables: &Tables,
        transport: &Transport,
    ) {
        self.zone = note.zone;
        self.part = note.part;
        self.channel = note.channel;
        self.key = note.key;
        self.velocity = note.velocity;
        self.release_velocity = 0;
        self.note_id = note.note_id;
        self.mute_group = zone.mute_group;
        self.gate = true;
        self.finished = false;
        self.detune = note.detune;
        self.crossfade = zone.crossfade_gain(note.key, note.velocity);
        self.random = (note.seed as f32 / u32::MAX as f32) * 2.0 - 1.0;

        self.position = sample
            .as_ref()
            .map_or(0.0, |s| zone.play_region(s.len()).0 as f64);
        self.sample = sample;

        self.amp_env.kill();
        self.amp_env.attack();
        self.filter_env.kill();
        self.filter_env.attack();

        for (i, (modulator, params)) in self
            .modulators
            .iter_mut()
            .zip(zone.modulators.iter())
            .enumerate()
        {
            modulator.assign(params, 0.0, transport);
            modulator.attack(note.seed.wrapping_add((i as u32).wrapping_mul(0x9E37_79B9)));
        }
        for filter in self.filters.iter_mut() {
            filter.suspend();
        }
        self.matrix.reset();
        self.sources = SourceValues::default();

        let blocks_per_second = blocks_per_second(tables);
        self.glide.start(
            note.glide_from,
            note.key as f32,
            note.is_legato,
            &part.glide,
            blocks_per_second,
        );

        self.rate.reset();
        self.pre_gain.reset();
        for lipol in self
            .filter_mix
            .iter_mut()
            .chain(self.amp.iter_mut())
            .chain(self.aux.iter_mut().flatten())
        {
            lipol.reset();
        }
    }

    /// Gate off. One-shot zones keep playing to the end of the sample.
    pub fn release(&mut self, velocity: u8, play_mode: PlayMode) {
        if !self.gate {
            return;
        }
        self.gate = false;
        self.release_velocity = velocity;
        if play_mode == PlayMode::OneShot {
            return;
        }
        self.amp_env.release();
        self.filter_env.release();
        for modulator in self.modulators.iter_mut() {
            modulator.release();
        }
    }

    /// Fast fade used for stealing and mute groups.
    pub fn uber_release(&mut self) {
        self.gate = false;
        self.amp_env.uber_release();
        self.filter_env.release();
    }

    /// Silence now and drop the sample reference.
    pub fn kill(&mut self) {
        self.finished = true;
        self.gate = false;
        self.amp_env.kill();
        self.filter_env.kill();
        self.sample = None;
    }

    /// Retune a gated voice to `key` without retriggering.
    pub fn legato(&mut self, key: u8, velocity: u8, part: &PartConfig, tables: &Tables) {
        self.key = key;
        self.velocity = velocity;
        self.gate = true;
        self.glide
            .set_target(key as f32, true, &part.glide, blocks_per_second(tables));
    }

    #[inline]
    pub fn zone(&self) -> ZoneId {
        self.zone
    }

    #[inline]
    pub fn part(&self) -> u8 {
        self.part
    }

    #[inline]
    pub fn channel(&self) -> u8 {
        self.channel
    }

    #[inline]
    pub fn key(&self) -> u8 {
        self.key
    }

    #[inline]
    pub fn velocity(&self) -> u8 {
        self.velocity
    }

    #[inline]
    pub fn note_id(&self) -> u64 {
        self.note_id
    }

    #[inline]
    pub fn mute_group(&self) -> u8 {
        self.mute_group
    }

    #[inline]
    pub fn is_gated(&self) -> bool {
        self.gate
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    #[inline]
    pub fn is_uber_released(&self) -> bool {
        self.amp_env.is_uber_released()
    }

    /// Counted against polyphony: not finished and not fading out after a steal.
    #[inline]
    pub fn is_playing(&self) -> bool {
        !self.finished && !self.amp_env.is_uber_released()
    }

    /// Amplitude envelope level.
    #[inline]
    pub fn level(&self) -> f32 {
        self.amp_env.output()
    }

    /// Current pitch in semitones (key after glide).
    #[inline]
    pub fn pitch(&self) -> f32 {
        self.glide.current()
    }

    #[inline]
    pub fn has_sample(&self) -> bool {
        self.sample.is_some()
    }

    #[inline]
    pub fn position(&self) -> f64 {
        self.position
    }

    /// Render one block and sum it into `out`. A missing zone kills the voice.
    pub fn process_block(
        &mut self,
        zone: Option<&Zone>,
        ctx: &BlockContext<'_>,
        scratch: &mut Scratch,
        out: &mut BlockOutput,
    ) {
        if self.finished {
            return;
        }
        let Some(zone) = zone else {
            self.kill();
            return;
        };
        let n = out.len();
        let tables = ctx.tables;

        self.update_sources(ctx);

        for (i, modulator) in self.modulators.iter_mut().enumerate() {
            let rate_mod = self
                .matrix
                .destinations()
                .get(ModDestination::ModulatorRate(i as u8));
            modulator.assign(&zone.modulators[i], rate_mod, ctx.transport);
            let value = modulator.process(n);
            self.sources.set(ModSource::Modulator(i as u8), value);
        }

        let amp_level = self.amp_env.process(&zone.amp_env, tables);
        let filter_level = self.filter_env.process(&zone.filter_env, tables);
        self.sources.set(ModSource::AmpEnvelope, amp_level);
        self.sources.set(ModSource::FilterEnvelope, filter_level);

        let offsets = *self
            .matrix
            .compute(&zone.matrix, &self.sources, Some(ctx.part_offsets));

        let sample_done = self.render_sample(zone, &offsets, ctx, scratch, n);

        let left = &mut scratch.left[..n];
        let right = &mut scratch.right[..n];

        let pre_db = zone.pre_filter_gain_db + offsets.get(ModDestination::PreFilterGain);
        self.pre_gain.set_target(tables.db_to_linear(pre_db));
        if (self.pre_gain.value() - 1.0).abs() > 1e-6 || self.pre_gain.delta() != 0.0 {
            let mut ramp = self.pre_gain;
            ramp.multiply_block(left);
            self.pre_gain.multiply_block(right);
        }

        for f in 0..NUM_FILTERS {
            self.run_filter(f, zone, &offsets, ctx, scratch, n);
        }

        self.mix(zone, &offsets, ctx, scratch, out, amp_level, n);

        if sample_done || self.amp_env.is_idle() {
            self.kill();
        }
    }

    fn update_sources(&mut self, ctx: &BlockContext<'_>) {
        let previous = self.sources.clone();
        self.sources = ctx.part_sources.clone();
        self.sources.set(ModSource::Velocity, self.velocity as f32 / 127.0);
        self.sources
            .set(ModSource::ReleaseVelocity, self.release_velocity as f32 / 127.0);
        self.sources
            .set(ModSource::KeyTrack, (self.key as f32 - 60.0) / 12.0);
        self.sources.set(ModSource::Random, self.random);
        self.sources
            .set(ModSource::Gate, if self.gate { 1.0 } else { 0.0 });
        self.sources
            .set(ModSource::PolyAftertouch, ctx.poly_aftertouch);
        for source in [ModSource::AmpEnvelope, ModSource::FilterEnvelope]
            .into_iter()
            .chain((0..NUM_MODULATORS as u8).map(ModSource::Modulator))
        {
            self.sources.set(source, previous.get(source));
        }
    }

    /// Fill `scratch.left/right` with resampled audio. Returns true when the
    /// sample ran out.
    fn render_sample(
        &mut self,
        zone: &Zone,
        offsets: &DestinationValues,
        ctx: &BlockContext<'_>,
        scratch: &mut Scratch,
        n: usize,
    ) -> bool {
        let note = self.glide.advance(ctx.part.glide.curve);
        let Some(sample) = self.sample.as_ref() else {
            scratch.left[..n].fill(0.0);
            scratch.right[..n].fill(0.0);
            return false;
        };

        let semitones = (note - zone.root_key as f32) * zone.keytrack
            + zone.transpose
            + zone.tune / 100.0
            + self.detune
            + offsets.get(ModDestination::Pitch);
        let ratio = ctx.tables.pitch(semitones) as f64 * sample.sample_rate()
            / ctx.tables.sample_rate();
        self.rate.set_target(ratio as f32);

        let (start, end) = zone.play_region(sample.len());
        let looping = match zone.play_mode {
            PlayMode::Loop => true,
            PlayMode::LoopUntilRelease => self.gate,
            PlayMode::Forward | PlayMode::OneShot => false,
        };
        let (loop_start, loop_end, looping) = match zone.loop_region(sample.len()) {
            Some((ls, le)) if looping => (ls, le, true),
            _ => (start, end, false),
        };
        let region = Region {
            start,
            end,
            loop_start,
            loop_end,
            looping,
        };
        if start >= end {
            scratch.left[..n].fill(0.0);
            scratch.right[..n].fill(0.0);
            return true;
        }

        let stereo = sample.channels() == 2;
        let data_l = sample.left();
        let data_r = sample.right();
        let limit = if looping { loop_end } else { end } as f64;
        let mut pos = self.position;

        for i in 0..n {
            if pos >= limit {
                if looping && pos >= loop_start as f64 {
                    let len = (loop_end - loop_start) as f64;
                    pos = loop_start as f64 + (pos - loop_start as f64) % len;
                } else {
                    scratch.left[i..n].fill(0.0);
                    scratch.right[i..n].fill(0.0);
                    self.position = pos;
                    return true;
                }
            }
            let index = pos as usize;
            let t = (pos - index as f64) as f32;
            let l = region.read(data_l, index, t);
            scratch.left[i] = l;
            scratch.right[i] = if stereo {
                region.read(data_r, index, t)
            } else {
                l
            };
            pos += self.rate.next() as f64;
        }
        self.position = pos;
        false
    }

    fn run_filter(
        &mut self,
        f: usize,
        zone: &Zone,
        offsets: &DestinationValues,
        ctx: &BlockContext<'_>,
        scratch: &mut Scratch,
        n: usize,
    ) {
        let params = &zone.filters[f];
        if params.mode == FilterMode::Off {
            return;
        }
        let i = f as u8;
        let sample_rate = ctx.tables.sample_rate();
        let cutoff = params.cutoff
            + params.keytrack * (self.glide.current() - zone.root_key as f32)
            + offsets.get(ModDestination::FilterCutoff(i));
        let omega = omega_from_note(cutoff as f64, sample_rate);
        let resonance = params.resonance + offsets.get(ModDestination::FilterResonance(i));
        let q = FilterParams::q(resonance);
        let gain = params.gain_db as f64;
        let bandwidth = params.bandwidth.max(0.01) as f64;

        let filter = &mut self.filters[f];
        match params.mode {
            FilterMode::Off => return,
            FilterMode::Lowpass => filter.coeff_lp(omega, q),
            FilterMode::Highpass => filter.coeff_hp(omega, q),
            FilterMode::Bandpass => filter.coeff_bp(omega, q),
            FilterMode::Notch => filter.coeff_notch(omega, q),
            FilterMode::Allpass => filter.coeff_apf(omega, q),
            FilterMode::PeakEq => filter.coeff_peak_eq(omega, bandwidth, gain),
            FilterMode::LowShelf => filter.coeff_low_shelf(omega, q, gain),
            FilterMode::HighShelf => filter.coeff_high_shelf(omega, q, gain),
            FilterMode::LpHpMorph => {
                filter.coeff_lp_hp_morph(omega, q, params.morph.clamp(0.0, 1.0) as f64)
            }
            FilterMode::LowpassBw => filter.coeff_lp_bw(omega, bandwidth),
            FilterMode::HighpassBw => filter.coeff_hp_bw(omega, bandwidth),
        }

        let mix = (params.mix + offsets.get(ModDestination::FilterMix(i))).clamp(0.0, 1.0);
        let lipol = &mut self.filter_mix[f];
        lipol.set_target(mix);

        let Scratch {
            left,
            right,
            dry_left,
            dry_right,
        } = scratch;
        let (left, right) = (&mut left[..n], &mut right[..n]);

        if lipol.delta() == 0.0 && lipol.value() >= 1.0 {
            filter.process_block_stereo(left, right);
            return;
        }

        dry_left[..n].copy_from_slice(left);
        dry_right[..n].copy_from_slice(right);
        filter.process_block_stereo(left, right);
        for j in 0..n {
            let m = lipol.next();
            left[j] = dry_left[j] + (left[j] - dry_left[j]) * m;
            right[j] = dry_right[j] + (right[j] - dry_right[j]) * m;
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn mix(
        &mut self,
        zone: &Zone,
        offsets: &DestinationValues,
        ctx: &BlockContext<'_>,
        scratch: &Scratch,
        out: &mut BlockOutput,
        amp_level: f32,
        n: usize,
    ) {
        let tables = ctx.tables;
        let velocity_gain = 1.0 - zone.velocity_sens.clamp(0.0, 1.0) * (1.0 - self.velocity as f32 / 127.0);
        let db = zone.gain_db + ctx.part.gain_db + offsets.get(ModDestination::Amplitude);
        let gain = tables.db_to_linear(db) * velocity_gain * self.crossfade * amp_level;

        let pan = (zone.pan + ctx.part.pan + offsets.get(ModDestination::Pan)).clamp(-1.0, 1.0);
        let angle = (pan + 1.0) * FRAC_PI_4;
        let (gain_l, gain_r) = (gain * angle.cos(), gain * angle.sin());

        for (a, sends) in self.aux.iter_mut().enumerate() {
            let send = if zone.aux[a] <= AUX_OFF_DB {
                0.0
            } else {
                tables.db_to_linear(zone.aux[a] + offsets.get(ModDestination::AuxLevel(a as u8)))
            };
            sends[0].set_target(gain_l * send);
            sends[1].set_target(gain_r * send);
            if sends[0].value() == 0.0 && sends[0].delta() == 0.0 && sends[1].delta() == 0.0 {
                continue;
            }
            sends[0].mac_block(&scratch.left[..n], &mut out.aux[a].left[..n]);
            sends[1].mac_block(&scratch.right[..n], &mut out.aux[a].right[..n]);
        }

        self.amp[0].set_target(gain_l);
        self.amp[1].set_target(gain_r);
        self.amp[0].mac_block(&scratch.left[..n], &mut out.main.left[..n]);
        self.amp[1].mac_block(&scratch.right[..n], &mut out.main.right[..n]);
    }
}

#[inline]
fn blocks_per_second(tables: &Tables) -> f32 {
    (tables.sample_rate() / tables.block_size().max(1) as f64) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modulation::MatrixEntry;
    use approx::assert_relative_eq;

    const SR: f64 = 48000.0;
    const BLOCK: usize = 32;

    struct Rig {
        tables: Tables,
        transport: Transport,
        part: PartConfig,
        sources: SourceValues,
        offsets: DestinationValues,
        scratch: Box<Scratch>,
        out: BlockOutput,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                tables: Tables::new(SR, BLOCK),
                transport: Transport {
                    sample_rate: SR,
                    tempo: 120.0,
                },
                part: PartConfig::default(),
                sources: SourceValues::default(),
                offsets: DestinationValues::default(),
                scratch: Box::default(),
                out: BlockOutput::new(BLOCK),
            }
        }

        fn start(&self, voice: &mut Voice, zone: &Zone, sample: Option<Arc<Sample>>, key: u8) {
            let note = NoteStart {
                zone: ZoneId(0),
                part: 0,
                channel: 0,
                key,
                velocity: 127,
                detune: 0.0,
                note_id: 1,
                seed: 99,
                glide_from: None,
                is_legato: false,
            };
            voice.start(&note, zone, sample, &self.part, &self.tables, &self.transport);
        }

        fn block(&mut self, voice: &mut Voice, zone: &Zone) {
            self.out.clear();
            let ctx = BlockContext {
                tables: &self.tables,
                transport: &self.transport,
                part: &self.part,
                part_sources: &self.sources,
                part_offsets: &self.offsets,
                poly_aftertouch: 0.0,
            };
            voice.process_block(Some(zone), &ctx, &mut self.scratch, &mut self.out);
        }
    }

    fn dc(frames: usize) -> Arc<Sample> {
        Arc::new(Sample::mono(vec![1.0; frames], SR).unwrap())
    }

    #[test]
    fn test_center_pan_is_equal_power() {
        let mut rig = Rig::new();
        let zone = Zone::default();
        let mut voice = Voice::new(BLOCK);
        rig.start(&mut voice, &zone, Some(dc(4096)), 60);
        rig.block(&mut voice, &zone);

        for (&l, &r) in rig.out.left().iter().zip(rig.out.right()) {
            assert_relative_eq!(l, std::f32::consts::FRAC_1_SQRT_2, epsilon = 1e-3);
            assert_relative_eq!(l, r, epsilon = 1e-6);
        }
        assert!(voice.is_playing());
    }

    #[test]
    fn test_octave_up_reads_twice_as_fast() {
        let mut rig = Rig::new();
        let zone = Zone::default();
        let mut voice = Voice::new(BLOCK);
        rig.start(&mut voice, &zone, Some(dc(4096)), 72);
        rig.block(&mut voice, &zone);
        assert_relative_eq!(voice.position(), 64.0, epsilon = 1e-2);
    }

    #[test]
    fn test_forward_stops_at_sample_end() {
        let mut rig = Rig::new();
        let zone = Zone::default();
        let mut voice = Voice::new(BLOCK);
        rig.start(&mut voice, &zone, Some(dc(40)), 60);
        rig.block(&mut voice, &zone);
        assert!(!voice.is_finished());
        rig.block(&mut voice, &zone);
        assert!(voice.is_finished());
        assert!(!voice.has_sample());
        assert!(rig.out.left()[8..].iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_loop_keeps_playing() {
        let mut rig = Rig::new();
        let mut zone = Zone::default().with_play_mode(PlayMode::Loop);
        zone.loop_start = 10;
        zone.loop_end = 30;
        let mut voice = Voice::new(BLOCK);
        rig.start(&mut voice, &zone, Some(dc(40)), 60);
        for _ in 0..50 {
            rig.block(&mut voice, &zone);
        }
        assert!(!voice.is_finished());
        assert!(voice.position() >= 10.0 && voice.position() < 30.0);
    }

    #[test]
    fn test_loop_until_release_plays_out() {
        let mut rig = Rig::new();
        let mut zone = Zone::default().with_play_mode(PlayMode::LoopUntilRelease);
        zone.loop_start = 10;
        zone.loop_end = 30;
        zone.amp_env.release = 4.0;
        let mut voice = Voice::new(BLOCK);
        rig.start(&mut voice, &zone, Some(dc(100)), 60);
        for _ in 0..10 {
            rig.block(&mut voice, &zone);
        }
        assert!(voice.position() < 30.0);
        voice.release(64, zone.play_mode);
        for _ in 0..4 {
            rig.block(&mut voice, &zone);
        }
        assert!(voice.is_finished());
    }

    #[test]
    fn test_one_shot_ignores_release() {
        let mut rig = Rig::new();
        let zone = Zone::default().with_play_mode(PlayMode::OneShot);
        let mut voice = Voice::new(BLOCK);
        rig.start(&mut voice, &zone, Some(dc(1000)), 60);
        rig.block(&mut voice, &zone);
        voice.release(0, zone.play_mode);
        for _ in 0..10 {
            rig.block(&mut voice, &zone);
        }
        assert!(!voice.is_finished());
        assert!(rig.out.left().iter().all(|s| *s > 0.5));
    }

    #[test]
    fn test_missing_sample_is_silent() {
        let mut rig = Rig::new();
        let zone = Zone::default();
        let mut voice = Voice::new(BLOCK);
        rig.start(&mut voice, &zone, None, 60);
        rig.block(&mut voice, &zone);
        assert!(rig.out.left().iter().all(|s| *s == 0.0));
        assert!(!voice.is_finished());

        voice.release(0, zone.play_mode);
        for _ in 0..2000 {
            rig.block(&mut voice, &zone);
        }
        assert!(voice.is_finished());
    }

    #[test]
    fn test_uber_release_stops_counting() {
        let mut rig = Rig::new();
        let zone = Zone::default();
        let mut voice = Voice::new(BLOCK);
        rig.start(&mut voice, &zone, Some(dc(48000)), 60);
        rig.block(&mut voice, &zone);
        voice.uber_release();
        assert!(!voice.is_playing());
        assert!(!voice.is_finished());
        for _ in 0..100 {
            rig.block(&mut voice, &zone);
        }
        assert!(voice.is_finished());
    }

    #[test]
    fn test_removed_zone_kills_voice() {
        let mut rig = Rig::new();
        let zone = Zone::default();
        let mut voice = Voice::new(BLOCK);
        rig.start(&mut voice, &zone, Some(dc(1000)), 60);
        let ctx = BlockContext {
            tables: &rig.tables,
            transport: &rig.transport,
            part: &rig.part,
            part_sources: &rig.sources,
            part_offsets: &rig.offsets,
            poly_aftertouch: 0.0,
        };
        voice.process_block(None, &ctx, &mut rig.scratch, &mut rig.out);
        assert!(voice.is_finished());
        assert!(!voice.has_sample());
    }

    #[test]
    fn test_matrix_amplitude_offset() {
        let mut rig = Rig::new();
        let mut zone = Zone::default();
        zone.matrix[0] = MatrixEntry::new(ModSource::Constant, ModDestination::Amplitude, -6.0);
        let mut voice = Voice::new(BLOCK);
        rig.start(&mut voice, &zone, Some(dc(4096)), 60);
        rig.block(&mut voice, &zone);
        let expected = std::f32::consts::FRAC_1_SQRT_2 * 10f32.powf(-6.0 / 20.0);
        assert_relative_eq!(rig.out.left()[0], expected, epsilon = 1e-3);
    }

    #[test]
    fn test_aux_send() {
        let mut rig = Rig::new();
        let mut zone = Zone::default();
        zone.aux[1] = 0.0;
        let mut voice = Voice::new(BLOCK);
        rig.start(&mut voice, &zone, Some(dc(4096)), 60);
        rig.block(&mut voice, &zone);
        assert!(rig.out.aux_left(0).iter().all(|s| *s == 0.0));
        assert_relative_eq!(rig.out.aux_left(1)[5], rig.out.left()[5], epsilon = 1e-6);
    }

    #[test]
    fn test_lowpass_attenuates_nyquist() {
        let mut rig = Rig::new();
        let mut zone = Zone::default();
        zone.filters[0].mode = FilterMode::Lowpass;
        zone.filters[0].cutoff = 40.0;
        let data = (0..8192).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let sample = Arc::new(Sample::mono(data, SR).unwrap());
        let mut voice = Voice::new(BLOCK);
        rig.start(&mut voice, &zone, Some(sample), 60);
        for _ in 0..20 {
            rig.block(&mut voice, &zone);
        }
        let peak = rig.out.left().iter().fold(0.0f32, |p, s| p.max(s.abs()));
        assert!(peak < 0.01, "peak {}", peak);
    }

    #[test]
    fn test_velocity_sensitivity() {
        let mut rig = Rig::new();
        let zone = Zone::default();
        let mut voice = Voice::new(BLOCK);
        let note = NoteStart {
            zone: ZoneId(0),
            part: 0,
            channel: 0,
            key: 60,
            velocity: 0,
            detune: 0.0,
            note_id: 1,
            seed: 1,
            glide_from: None,
            is_legato: false,
        };
        voice.start(&note, &zone, Some(dc(4096)), &rig.part, &rig.tables, &rig.transport);
        rig.block(&mut voice, &zone);
        assert!(rig.out.left().iter().all(|s| *s == 0.0));
    }
}
