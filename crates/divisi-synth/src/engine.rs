//! The realtime side of the sampler.
//!
//! [`Engine`] owns the voice pool, the committed zone table and the per-part
//! and per-channel controller state. It is driven from the audio thread: MIDI
//! style events through [`Engine::note_on`] and friends, and
//! [`Engine::process_block`] once per block.
//!
//! Control-thread edits arrive as [`Command`]s and are applied only at the top
//! of `process_block`. Data the engine lets go of (replaced zones, released
//! sample handles) goes back as [`Notification`]s and is dropped on the control
//! thread. When the notification queue is full those notifications wait in a
//! preallocated pending list; the engine stops taking commands until the list
//! has room again, so nothing is ever freed on the audio thread.
//!
//! Two narrow locks are taken from this side: `cs_patch` (the sample table)
//! to resolve a sample handle when a zone is bound, and `cs_engine` (the hold
//! buffer) on note-off while the hold pedal is down and when it lifts.

use crate::command::{Command, LimitKind, Notification};
use crate::hold::{HeldNote, HoldBuffer, SharedHoldBuffer};
use crate::modulation::{
    evaluate, DestinationValues, ModDestination, ModSource, SourceValues, NUM_CCS, NUM_MACROS,
};
use crate::output::{BlockOutput, EngineMeters};
use crate::part::{KeyStack, PartConfig, PolyMode, PART_MATRIX_SLOTS};
use crate::pool::{VoiceHandle, VoicePool};
use crate::sample::{Sample, SampleId, SampleTable, SharedSampleTable};
use crate::voice::{BlockContext, NoteStart, Scratch, Voice};
use crate::zone::{PlayMode, Zone, ZoneId, ZONE_MATRIX_SLOTS};
use divisi_core::{bus, EngineConfig, Full, Receiver, Sender, StealPolicy, Tables, NUM_PARTS};
use divisi_dsp::Transport;
use std::sync::Arc;

/// MIDI controller numbers with engine-level meaning.
pub mod cc {
    pub const MOD_WHEEL: u8 = 1;
    pub const HOLD_PEDAL: u8 = 64;
    pub const ALL_SOUND_OFF: u8 = 120;
    pub const ALL_NOTES_OFF: u8 = 123;
}

/// The engine's ends of the shared state.
pub struct EngineLinks {
    pub samples: SharedSampleTable,
    pub hold: SharedHoldBuffer,
    pub commands: Receiver<Command>,
    pub notifications: Sender<Notification>,
    pub meters: Arc<EngineMeters>,
}

/// The control thread's ends of the shared state.
pub struct ControlLinks {
    pub samples: SharedSampleTable,
    pub hold: SharedHoldBuffer,
    pub commands: Sender<Command>,
    pub notifications: Receiver<Notification>,
    pub meters: Arc<EngineMeters>,
}

/// Create both queues, the sample table, the hold buffer and the meters.
pub fn connect(config: &EngineConfig) -> (ControlLinks, EngineLinks) {
    let samples = SampleTable::shared(config.max_samples);
    let hold = HoldBuffer::shared(config.hold_buffer_capacity);
    let meters = Arc::new(EngineMeters::new());
    let (command_tx, command_rx) = bus::channel(config.command_capacity);
    let (notify_tx, notify_rx) = bus::channel(config.notification_capacity);
    (
        ControlLinks {
            samples: Arc::clone(&samples),
            hold: Arc::clone(&hold),
            commands: command_tx,
            notifications: notify_rx,
            meters: Arc::clone(&meters),
        },
        EngineLinks {
            samples,
            hold,
            commands: command_rx,
            notifications: notify_tx,
            meters,
        },
    )
}

#[derive(Debug)]
struct PartState {
    config: PartConfig,
    sources: SourceValues,
    offsets: DestinationValues,
    keys: KeyStack,
    last_pitch: Option<f32>,
}

impl PartState {
    fn new(index: usize) -> Self {
        Self {
            config: PartConfig::for_part(index),
            sources: SourceValues::default(),
            offsets: DestinationValues::default(),
            keys: KeyStack::default(),
            last_pitch: None,
        }
    }

    #[inline]
    fn channel(&self) -> u8 {
        self.config.midi_channel & 0x0F
    }
}

#[derive(Debug)]
struct ChannelState {
    cc: [f32; NUM_CCS],
    /// -1..1.
    bend: f32,
    aftertouch: f32,
    poly_aftertouch: [f32; 128],
    hold: bool,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self {
            cc: [0.0; NUM_CCS],
            bend: 0.0,
            aftertouch: 0.0,
            poly_aftertouch: [0.0; 128],
            hold: false,
        }
    }
}

pub struct Engine {
    config: EngineConfig,
    tables: Arc<Tables>,
    transport: Transport,

    zones: Vec<Option<Box<Zone>>>,
    zone_samples: Vec<Option<Arc<Sample>>>,
    parts: Vec<PartState>,
    channels: Vec<ChannelState>,

    pool: VoicePool,
    scratch: Box<Scratch>,
    output: Box<BlockOutput>,

    samples: SharedSampleTable,
    hold: SharedHoldBuffer,
    commands: Receiver<Command>,
    notifications: Sender<Notification>,
    pending: Vec<Notification>,
    meters: Arc<EngineMeters>,

    selected_zone: Option<ZoneId>,
    last_status: (usize, usize),
    note_counter: u64,
    rng: u32,
}

impl Engine {
    /// Build an engine. Everything the audio thread touches is allocated here.
    pub fn new(config: EngineConfig, links: EngineLinks) -> divisi_core::Result<Self> {
        config.validate()?;
        let tables = Arc::new(Tables::new(config.sample_rate, config.block_size));
        let arena = config.voice_arena_size();

        tracing::info!(
            sample_rate = config.sample_rate,
            block_size = config.block_size,
            max_voices = config.max_voices,
            arena,
            max_zones = config.max_zones,
            "Sampler engine initialized"
        );

        let mut zones = Vec::with_capacity(config.max_zones);
        zones.resize_with(config.max_zones, || None);
        let mut zone_samples = Vec::with_capacity(config.max_zones);
        zone_samples.resize_with(config.max_zones, || None);

        Ok(Self {
            transport: Transport {
                sample_rate: config.sample_rate,
                tempo: 120.0,
            },
            tables,
            zones,
            zone_samples,
            parts: (0..NUM_PARTS).map(PartState::new).collect(),
            channels: (0..16).map(|_| ChannelState::default()).collect(),
            pool: VoicePool::new(arena, config.block_size),
            scratch: Box::default(),
            output: Box::new(BlockOutput::new(config.block_size)),
            samples: links.samples,
            hold: links.hold,
            commands: links.commands,
            notifications: links.notifications,
            pending: Vec::with_capacity(config.command_capacity),
            meters: links.meters,
            selected_zone: None,
            last_status: (0, 0),
            note_counter: 0,
            rng: 0x2545_F491,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tables(&self) -> &Arc<Tables> {
        &self.tables
    }

    pub fn zone(&self, id: ZoneId) -> Option<&Zone> {
        self.zones.get(id.index()).and_then(|z| z.as_deref())
    }

    pub fn part(&self, part: usize) -> Option<&PartConfig> {
        self.parts.get(part).map(|p| &p.config)
    }

    pub fn selected_zone(&self) -> Option<ZoneId> {
        self.selected_zone
    }

    pub fn tempo(&self) -> f64 {
        self.transport.tempo
    }

    /// Voices holding a slot, oldest first.
    pub fn voices(&self) -> impl Iterator<Item = (VoiceHandle, &Voice)> + '_ {
        self.pool.iter()
    }

    pub fn active_voices(&self) -> usize {
        self.pool.active_count()
    }

    /// Voices counted against polyphony.
    pub fn playing_voices(&self) -> usize {
        self.pool.playing_count()
    }

    pub fn output(&self) -> &BlockOutput {
        &self.output
    }

    /// Ownership-carrying notifications waiting for room in the queue.
    pub fn pending_notifications(&self) -> usize {
        self.pending.len()
    }

    /// Start one voice per matching zone of `part`. Velocity 0 is a note-off.
    pub fn note_on(&mut self, part: u8, key: u8, velocity: u8, detune: f32) {
        let p = part as usize;
        if p >= NUM_PARTS || key > 127 {
            return;
        }
        if velocity == 0 {
            self.note_off(part, key, 0);
            return;
        }
        let velocity = velocity.min(127);
        let channel = self.parts[p].channel();
        if self.channels[channel as usize].hold {
            self.release_restruck(channel, key);
        }
        self.start_note(part, key, velocity, detune, false);
    }

    /// `returning` marks a mono handover back to a key that is still down.
    /// Its voices in zones that ignore the part's poly mode never stopped, so
    /// only the mode-following zones start again.
    fn start_note(&mut self, part: u8, key: u8, velocity: u8, detune: f32, returning: bool) {
        let p = part as usize;
        self.note_counter += 1;
        let note_id = self.note_counter;

        let state = &mut self.parts[p];
        let previous = state.keys.top();
        state.keys.push(key, velocity);
        let poly_mode = state.config.poly_mode;
        let layered = state.config.add_zones_to_group;
        let channel = state.channel();
        let glide_from = state.last_pitch;
        state.last_pitch = Some(key as f32);

        let mut mono_sounding = false;
        if poly_mode != PolyMode::Poly {
            let retune = poly_mode == PolyMode::Legato && previous.is_some();
            mono_sounding = self.mono_handover(part, key, velocity, retune);
        }

        for z in 0..self.zones.len() {
            let (follows_mode, mute_group) = match self.zones[z].as_deref() {
                Some(zone) if zone.part == part && zone.matches(key, velocity) => {
                    (!zone.ignore_part_polymode, zone.mute_group)
                }
                _ => continue,
            };
            // Legato keeps the retuned voice instead of starting another.
            let start = if follows_mode { !mono_sounding } else { !returning };
            if start {
                if mute_group != 0 {
                    self.choke(part, mute_group, note_id);
                }
                let note = NoteStart {
                    zone: ZoneId(z as u32),
                    part,
                    channel,
                    key,
                    velocity,
                    detune,
                    note_id,
                    seed: self.next_seed(),
                    glide_from,
                    is_legato: previous.is_some(),
                };
                self.start_voice(z, &note);
            }
            if !layered {
                break;
            }
        }
    }

    /// Release the voices of `key`, or park them while the hold pedal is down.
    pub fn note_off(&mut self, part: u8, key: u8, velocity: u8) {
        let p = part as usize;
        if p >= NUM_PARTS || key > 127 {
            return;
        }
        let state = &mut self.parts[p];
        let was_top = state.keys.remove(key);
        if state.config.poly_mode != PolyMode::Poly && was_top {
            if let Some((previous_key, previous_velocity)) = state.keys.top() {
                // Mode-following voices hand over to the previous key.
                self.release_key(part, key, velocity, true);
                self.start_note(part, previous_key, previous_velocity, 0.0, true);
                return;
            }
        }
        self.release_key(part, key, velocity, false);
    }

    /// Release the gated voices of `key`, or park them while the hold pedal
    /// is down. `mode_free_only` limits this to zones that ignore the part's
    /// poly mode.
    fn release_key(&mut self, part: u8, key: u8, velocity: u8, mode_free_only: bool) {
        let channel = self.parts[part as usize].channel();
        let held = self.channels[channel as usize].hold;
        let Self {
            pool, zones, hold, ..
        } = self;
        let mut overflow = false;
        let mut parked = held.then(|| hold.lock());
        for (handle, voice) in pool.iter_mut() {
            if voice.part() != part || voice.key() != key || !voice.is_gated() {
                continue;
            }
            if mode_free_only && follows_part_mode(zones, voice) {
                continue;
            }
            if let Some(buffer) = parked.as_mut() {
                let note = HeldNote {
                    channel,
                    key,
                    voice: handle,
                    release_velocity: velocity,
                };
                if buffer.push(note).is_ok() {
                    continue;
                }
                overflow = true;
            }
            let mode = play_mode(zones, voice);
            voice.release(velocity, mode);
        }
        drop(parked);
        if overflow {
            self.notify(Notification::LimitReached {
                kind: LimitKind::HoldBuffer,
                part,
            });
        }
    }

    /// A key struck again while its earlier voices sit in the hold buffer
    /// releases those voices now.
    fn release_restruck(&mut self, channel: u8, key: u8) {
        let Self {
            pool, zones, hold, ..
        } = self;
        let mut buffer = hold.lock();
        if !buffer.contains_key(channel, key) {
            return;
        }
        for (handle, voice) in pool.iter_mut() {
            if voice.channel() != channel || voice.key() != key {
                continue;
            }
            if let Some(note) = buffer.remove_voice(handle) {
                let mode = play_mode(zones, voice);
                voice.release(note.release_velocity, mode);
            }
        }
    }

    /// `value` is -1..1, scaled by each part's bend range.
    pub fn pitch_bend(&mut self, channel: u8, value: f32) {
        if let Some(state) = self.channels.get_mut(channel as usize) {
            state.bend = value.clamp(-1.0, 1.0);
        }
    }

    pub fn channel_aftertouch(&mut self, channel: u8, value: u8) {
        if let Some(state) = self.channels.get_mut(channel as usize) {
            state.aftertouch = value.min(127) as f32 / 127.0;
        }
    }

    pub fn poly_aftertouch(&mut self, channel: u8, key: u8, value: u8) {
        if let Some(state) = self.channels.get_mut(channel as usize) {
            if let Some(slot) = state.poly_aftertouch.get_mut(key as usize) {
                *slot = value.min(127) as f32 / 127.0;
            }
        }
    }

    /// Store a controller value. Hold pedal, all-sound-off and all-notes-off act immediately.
    pub fn channel_controller(&mut self, channel: u8, controller: u8, value: u8) {
        let Some(state) = self.channels.get_mut(channel as usize) else {
            return;
        };
        let Some(slot) = state.cc.get_mut(controller as usize) else {
            return;
        };
        *slot = value.min(127) as f32 / 127.0;

        match controller {
            cc::HOLD_PEDAL => {
                let down = value >= 64;
                let was_down = std::mem::replace(&mut state.hold, down);
                if was_down && !down {
                    self.purge_hold_buffer(channel);
                }
            }
            cc::ALL_SOUND_OFF => self.all_sound_off(Some(channel)),
            cc::ALL_NOTES_OFF => self.all_notes_off(Some(channel)),
            _ => {}
        }
    }

    /// Release every note parked on `channel`.
    pub fn purge_hold_buffer(&mut self, channel: u8) -> usize {
        let Self {
            pool, zones, hold, ..
        } = self;
        hold.lock().purge(channel, |note| {
            if let Some(voice) = pool.get_mut(note.voice) {
                let mode = play_mode(zones, voice);
                voice.release(note.release_velocity, mode);
            }
        })
    }

    /// Release gated voices and forget held notes, on one channel or all.
    pub fn all_notes_off(&mut self, channel: Option<u8>) {
        let Self {
            pool, zones, hold, parts, ..
        } = self;
        for (_, voice) in pool.iter_mut() {
            if channel.map_or(true, |c| voice.channel() == c) {
                let mode = play_mode(zones, voice);
                voice.release(0, mode);
            }
        }
        clear_channel(&mut hold.lock(), channel);
        for state in parts.iter_mut() {
            if channel.map_or(true, |c| state.channel() == c) {
                state.keys.clear();
            }
        }
    }

    /// Silence now, on one channel or all.
    pub fn all_sound_off(&mut self, channel: Option<u8>) {
        match channel {
            None => self.pool.kill_all(),
            Some(c) => {
                for (_, voice) in self.pool.iter_mut() {
                    if voice.channel() == c {
                        voice.kill();
                    }
                }
                self.pool.retire_finished();
            }
        }
        clear_channel(&mut self.hold.lock(), channel);
        for state in self.parts.iter_mut() {
            if channel.map_or(true, |c| state.channel() == c) {
                state.keys.clear();
            }
        }
    }

    /// Apply queued commands, render every voice and retire the finished ones.
    pub fn process_block(&mut self) -> &BlockOutput {
        self.flush_pending();
        self.drain_commands();
        self.update_parts();

        self.output.clear();
        let Self {
            pool,
            zones,
            parts,
            channels,
            scratch,
            output,
            tables,
            transport,
            ..
        } = self;
        for (_, voice) in pool.iter_mut() {
            let state = &parts[voice.part() as usize % NUM_PARTS];
            let channel = &channels[voice.channel() as usize % 16];
            let ctx = BlockContext {
                tables: &**tables,
                transport: &*transport,
                part: &state.config,
                part_sources: &state.sources,
                part_offsets: &state.offsets,
                poly_aftertouch: channel.poly_aftertouch[voice.key() as usize % 128],
            };
            let zone = zones.get(voice.zone().index()).and_then(|z| z.as_deref());
            voice.process_block(zone, &ctx, scratch, output);
        }

        if self.pool.retire_finished() > 0 {
            self.prune_hold_buffer();
        }

        let status = (self.pool.active_count(), self.pool.playing_count());
        self.meters.record_block(&self.output, status.0, status.1);
        if status != self.last_status {
            self.last_status = status;
            self.notify(Notification::EngineStatus {
                active_voices: status.0,
                playing_voices: status.1,
            });
        }
        &self.output
    }

    fn drain_commands(&mut self) {
        // Each command hands back at most one notification that must not be dropped.
        while self.pending.len() < self.pending.capacity() {
            let Some(command) = self.commands.recv() else {
                break;
            };
            self.apply(command);
        }
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::AddZone { zone, data } => self.add_zone(zone, data),
            Command::RemoveZone { zone } => self.remove_zone(zone),
            Command::UpdateZone { zone, data } => self.update_zone(zone, data),
            Command::SetZoneSample { zone, sample } => self.set_zone_sample(zone, sample),
            Command::SetZoneParam { zone, param, value } => {
                if let Some(z) = self.zone_mut(zone) {
                    z.set_param(param, value);
                }
            }
            Command::SetMatrixEntry { zone, slot, entry } => {
                if let Some(z) = self.zone_mut(zone) {
                    if slot < ZONE_MATRIX_SLOTS {
                        z.matrix[slot] = entry;
                    }
                }
            }
            Command::SetModulator { zone, slot, params } => {
                if let Some(z) = self.zone_mut(zone) {
                    if let Some(m) = z.modulators.get_mut(slot) {
                        *m = params;
                    }
                }
            }
            Command::SetPart { part, config } => {
                if let Some(state) = self.parts.get_mut(part) {
                    if state.config.poly_mode != config.poly_mode {
                        state.keys.clear();
                    }
                    state.config = config;
                }
            }
            Command::SetPartMatrixEntry { part, slot, entry } => {
                if let Some(state) = self.parts.get_mut(part) {
                    if slot < PART_MATRIX_SLOTS {
                        state.config.matrix[slot] = entry;
                    }
                }
            }
            Command::SetMacro { part, index, value } => {
                if let Some(state) = self.parts.get_mut(part) {
                    if index < NUM_MACROS {
                        state.config.macros[index] = value.clamp(0.0, 1.0);
                    }
                }
            }
            Command::SelectZone(zone) => {
                self.selected_zone = zone;
                self.notify(Notification::ZoneSelected { zone });
            }
            Command::NoteOn {
                part,
                key,
                velocity,
            } => self.note_on(part, key, velocity, 0.0),
            Command::NoteOff {
                part,
                key,
                velocity,
            } => self.note_off(part, key, velocity),
            Command::AllNotesOff => self.all_notes_off(None),
            Command::AllSoundOff => self.all_sound_off(None),
            Command::SetTempo(bpm) => {
                if bpm.is_finite() && bpm > 0.0 {
                    self.transport.tempo = bpm;
                }
            }
        }
    }

    fn zone_mut(&mut self, id: ZoneId) -> Option<&mut Zone> {
        self.zones.get_mut(id.index()).and_then(|z| z.as_deref_mut())
    }

    fn resolve_sample(&self, id: Option<SampleId>) -> Option<Arc<Sample>> {
        let id = id?;
        self.samples.lock().get(id).cloned()
    }

    fn add_zone(&mut self, id: ZoneId, data: Box<Zone>) {
        let i = id.index();
        let free = matches!(self.zones.get(i), Some(None));
        if !free || data.part as usize >= NUM_PARTS {
            self.notify(Notification::ZoneRejected { zone: id, data });
            return;
        }
        self.zone_samples[i] = self.resolve_sample(data.sample);
        self.zones[i] = Some(data);
        self.notify(Notification::ZoneAdded { zone: id });
    }

    fn remove_zone(&mut self, id: ZoneId) {
        let i = id.index();
        let Some(data) = self.zones.get_mut(i).and_then(Option::take) else {
            return;
        };
        if self.pool.kill_zone(id) > 0 {
            self.prune_hold_buffer();
        }
        let sample = self.zone_samples[i].take();
        if self.selected_zone == Some(id) {
            self.selected_zone = None;
        }
        self.notify(Notification::ZoneRemoved {
            zone: id,
            data,
            sample,
        });
    }

    fn update_zone(&mut self, id: ZoneId, mut data: Box<Zone>) {
        let Some(slot) = self.zones.get_mut(id.index()) else {
            self.notify(Notification::ZoneRejected { zone: id, data });
            return;
        };
        match slot {
            Some(current) if (data.part as usize) < NUM_PARTS => {
                data.sample = current.sample;
                let old = std::mem::replace(current, data);
                self.notify(Notification::ZoneUpdated { zone: id, old });
            }
            _ => self.notify(Notification::ZoneRejected { zone: id, data }),
        }
    }

    /// Kill the zone's voices, then rebind. An unknown zone reports the
    /// requested sample as `old` so the control side can drop its reference.
    fn set_zone_sample(&mut self, id: ZoneId, sample: Option<SampleId>) {
        let i = id.index();
        let Some(old) = self.zone(id).map(|z| z.sample) else {
            self.notify(Notification::ZoneSampleReplaced {
                zone: id,
                old: sample,
                new: None,
                released: None,
            });
            return;
        };
        if self.pool.kill_zone(id) > 0 {
            self.prune_hold_buffer();
        }
        let resolved = self.resolve_sample(sample);
        if let Some(zone) = self.zone_mut(id) {
            zone.sample = sample;
        }
        let released = std::mem::replace(&mut self.zone_samples[i], resolved);
        self.notify(Notification::ZoneSampleReplaced {
            zone: id,
            old,
            new: sample,
            released,
        });
    }

    fn update_parts(&mut self) {
        let Self {
            parts, channels, ..
        } = self;
        for state in parts.iter_mut() {
            let channel = &channels[state.channel() as usize];
            let sources = &mut state.sources;
            sources.set_ccs(&channel.cc);
            sources.set_macros(&state.config.macros);
            sources.set(ModSource::ModWheel, channel.cc[cc::MOD_WHEEL as usize]);
            sources.set(ModSource::PitchBend, channel.bend);
            sources.set(ModSource::ChannelAftertouch, channel.aftertouch);

            state.offsets.reset();
            evaluate(&state.config.matrix, &state.sources, &mut state.offsets);
            state
                .offsets
                .add(ModDestination::Pitch, state.config.bend_semitones(channel.bend));
        }
    }

    /// Mono and legato handover before a new note of `part` sounds. Returns
    /// true when a gated voice was retuned instead of released.
    fn mono_handover(&mut self, part: u8, key: u8, velocity: u8, retune: bool) -> bool {
        let Self {
            pool,
            zones,
            parts,
            tables,
            ..
        } = self;
        let config = &parts[part as usize].config;
        let mut retuned = false;
        for (_, voice) in pool.iter_mut() {
            if voice.part() != part || !voice.is_gated() {
                continue;
            }
            if !follows_part_mode(zones, voice) {
                continue;
            }
            if retune {
                voice.legato(key, velocity, config, tables);
                retuned = true;
            } else {
                let mode = play_mode(zones, voice);
                voice.release(0, mode);
            }
        }
        retuned
    }

    /// Fast-release the part's other voices in `group`.
    fn choke(&mut self, part: u8, group: u8, note_id: u64) {
        for (_, voice) in self.pool.iter_mut() {
            if voice.part() == part
                && voice.mute_group() == group
                && voice.note_id() != note_id
                && voice.is_playing()
            {
                voice.uber_release();
            }
        }
    }

    /// Enforce the engine and part caps, then make sure a slot is free.
    fn make_room(&mut self, part: u8, note_id: u64) -> bool {
        let cap = self.config.max_voices;
        let part_cap = self.parts[part as usize].config.polyphony.clamp(1, cap);
        let engine_full = self.pool.playing_count() >= cap;
        let part_full = self.pool.part_playing_count(part) >= part_cap;

        if engine_full || part_full {
            let stolen = match self.config.steal_policy {
                StealPolicy::None => None,
                StealPolicy::Oldest => self.pool.steal_oldest(note_id, part_full.then_some(part)),
            };
            self.notify(Notification::LimitReached {
                kind: LimitKind::Voices,
                part,
            });
            if stolen.is_none() {
                return false;
            }
        }
        if self.pool.free_slots() == 0 && !self.pool.reclaim_quietest() {
            self.notify(Notification::LimitReached {
                kind: LimitKind::Voices,
                part,
            });
            return false;
        }
        true
    }

    fn start_voice(&mut self, z: usize, note: &NoteStart) -> bool {
        if !self.make_room(note.part, note.note_id) {
            return false;
        }
        let Self {
            pool,
            zones,
            zone_samples,
            parts,
            tables,
            transport,
            ..
        } = self;
        let Some(zone) = zones[z].as_deref() else {
            return false;
        };
        let Some(mut reservation) = pool.reserve() else {
            return false;
        };
        reservation.voice().start(
            note,
            zone,
            zone_samples[z].clone(),
            &parts[note.part as usize].config,
            tables,
            transport,
        );
        reservation.commit();
        true
    }

    /// Drop parked notes whose voice has been retired.
    fn prune_hold_buffer(&mut self) {
        let pool = &self.pool;
        self.hold.lock().prune(|handle| pool.get(handle).is_some());
    }

    fn next_seed(&mut self) -> u32 {
        let mut x = self.rng;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.rng = x;
        x
    }

    fn notify(&mut self, note: Notification) {
        if !note.carries_ownership() {
            self.notifications.send_or_drop(note);
            return;
        }
        if self.pending.is_empty() {
            match self.notifications.send(note) {
                Ok(_) => {}
                Err(Full(note)) => self.pending.push(note),
            }
        } else {
            self.pending.push(note);
        }
    }

    fn flush_pending(&mut self) {
        let ready = self.pending.len().min(self.notifications.vacant_len());
        for note in self.pending.drain(..ready) {
            // Room was checked above and this is the only producer.
            let _ = self.notifications.send(note);
        }
    }
}

#[inline]
fn play_mode(zones: &[Option<Box<Zone>>], voice: &Voice) -> PlayMode {
    zones
        .get(voice.zone().index())
        .and_then(|z| z.as_deref())
        .map_or(PlayMode::Forward, |z| z.play_mode)
}

#[inline]
fn follows_part_mode(zones: &[Option<Box<Zone>>], voice: &Voice) -> bool {
    zones
        .get(voice.zone().index())
        .and_then(|z| z.as_deref())
        .map_or(true, |z| !z.ignore_part_polymode)
}

fn clear_channel(buffer: &mut HoldBuffer, channel: Option<u8>) {
    match channel {
        None => buffer.clear(),
        Some(c) => {
            buffer.purge(c, |_| {});
        }
    }
}
