//! Control-thread handle for the sampler.
//!
//! [`SamplerHandle`] keeps a mirror of every zone and part it has sent to the
//! engine, so reads never touch the audio thread. Edits are validated against
//! the mirror, applied to it, and forwarded as commands. Sample reference
//! counts are taken when a zone binds a sample and released when the engine
//! reports the binding gone, which is what makes freeing a sample safe.

use crate::{Error, Result};
use divisi_core::{EngineConfig, Receiver, Sender, NUM_PARTS};
use divisi_dsp::ModulatorParams;
use divisi_synth::{
    Command, ControlLinks, EngineMeters, LimitKind, MatrixEntry, Notification, PartConfig,
    Sample, SampleId, SharedHoldBuffer, SharedSampleTable, Zone, ZoneId, ZoneParam,
    PART_MATRIX_SLOTS, ZONE_MATRIX_SLOTS,
};
use divisi_synth::modulation::{NUM_MACROS, NUM_MODULATORS};
use std::sync::Arc;

pub struct SamplerHandle {
    config: EngineConfig,
    samples: SharedSampleTable,
    hold: SharedHoldBuffer,
    commands: Sender<Command>,
    notifications: Receiver<Notification>,
    meters: Arc<EngineMeters>,
    zones: Vec<Option<Zone>>,
    parts: Vec<PartConfig>,
    selected: Option<ZoneId>,
}

impl SamplerHandle {
    pub(crate) fn new(config: EngineConfig, links: ControlLinks) -> Self {
        let mut zones = Vec::with_capacity(config.max_zones);
        zones.resize_with(config.max_zones, || None);
        Self {
            samples: links.samples,
            hold: links.hold,
            commands: links.commands,
            notifications: links.notifications,
            meters: links.meters,
            zones,
            parts: (0..NUM_PARTS).map(PartConfig::for_part).collect(),
            selected: None,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ---- Samples ----

    /// Add a sample to the shared table.
    pub fn load_sample(&mut self, sample: Sample) -> Result<SampleId> {
        let frames = sample.len();
        let id = self.samples.lock().insert(sample)?;
        tracing::debug!(id = id.0, frames, "Sample loaded");
        Ok(id)
    }

    /// Drop a sample no zone uses.
    pub fn remove_sample(&mut self, id: SampleId) -> Result<()> {
        let sample = self.samples.lock().remove(id)?;
        // Released outside the lock.
        drop(sample);
        tracing::debug!(id = id.0, "Sample removed");
        Ok(())
    }

    /// Zones currently bound to the sample.
    pub fn sample_refcount(&self, id: SampleId) -> usize {
        self.samples.lock().refcount(id)
    }

    pub fn has_sample(&self, id: SampleId) -> bool {
        self.samples.lock().contains(id)
    }

    // ---- Zones ----

    /// Install a zone in the first free slot.
    pub fn add_zone(&mut self, zone: Zone) -> Result<ZoneId> {
        check_part(zone.part as usize)?;
        let slot = self
            .zones
            .iter()
            .position(Option::is_none)
            .ok_or(divisi_synth::Error::ZoneLimitReached {
                max: self.zones.len(),
            })?;
        self.check_room()?;
        if let Some(sample) = zone.sample {
            self.samples.lock().remember(sample)?;
        }

        let id = ZoneId(slot as u32);
        let command = Command::AddZone {
            zone: id,
            data: Box::new(zone.clone()),
        };
        if let Err(e) = self.send(command) {
            if let Some(sample) = zone.sample {
                let released = self.samples.lock().forget(sample);
                drop(released);
            }
            return Err(e);
        }
        self.zones[slot] = Some(zone);
        tracing::debug!(zone = id.0, "Zone added");
        Ok(id)
    }

    /// Remove a zone. Its sample reference is released once the engine hands the zone back.
    pub fn remove_zone(&mut self, id: ZoneId) -> Result<()> {
        self.zone_ref(id)?;
        self.send(Command::RemoveZone { zone: id })?;
        self.zones[id.index()] = None;
        if self.selected == Some(id) {
            self.selected = None;
        }
        Ok(())
    }

    /// Bind a zone to a different sample (or none). Voices of the zone stop.
    pub fn set_zone_sample(&mut self, id: ZoneId, sample: Option<SampleId>) -> Result<()> {
        self.zone_ref(id)?;
        self.check_room()?;
        if let Some(sample) = sample {
            self.samples.lock().remember(sample)?;
        }
        if let Err(e) = self.send(Command::SetZoneSample { zone: id, sample }) {
            if let Some(sample) = sample {
                let released = self.samples.lock().forget(sample);
                drop(released);
            }
            return Err(e);
        }
        if let Some(zone) = self.zone_slot(id) {
            zone.sample = sample;
        }
        Ok(())
    }

    /// Edit a zone in place and send the whole zone. The sample binding cannot
    /// change here; use [`set_zone_sample`](Self::set_zone_sample).
    pub fn edit_zone(&mut self, id: ZoneId, edit: impl FnOnce(&mut Zone)) -> Result<()> {
        let current = self.zone_ref(id)?;
        let mut zone = current.clone();
        edit(&mut zone);
        zone.sample = current.sample;
        check_part(zone.part as usize)?;

        self.send(Command::UpdateZone {
            zone: id,
            data: Box::new(zone.clone()),
        })?;
        self.zones[id.index()] = Some(zone);
        Ok(())
    }

    /// Set one addressable field. Returns the value after clamping to its range.
    pub fn set_zone_param(&mut self, id: ZoneId, param: ZoneParam, value: f32) -> Result<f32> {
        let mut zone = self.zone_ref(id)?.clone();
        if !zone.set_param(param, value) {
            return Err(divisi_synth::Error::InvalidParam(param).into());
        }
        let value = zone.param(param).unwrap_or(value);
        self.send(Command::SetZoneParam {
            zone: id,
            param,
            value,
        })?;
        self.zones[id.index()] = Some(zone);
        Ok(value)
    }

    /// Set a field from a 0..1 knob position.
    pub fn set_zone_param_normalized(
        &mut self,
        id: ZoneId,
        param: ZoneParam,
        normalized: f32,
    ) -> Result<f32> {
        let value = param.descriptor().range.denormalize(normalized);
        self.set_zone_param(id, param, value)
    }

    pub fn zone_param(&self, id: ZoneId, param: ZoneParam) -> Option<f32> {
        self.zone(id).and_then(|zone| zone.param(param))
    }

    /// Knob position of a field, 0..1.
    pub fn zone_param_normalized(&self, id: ZoneId, param: ZoneParam) -> Option<f32> {
        self.zone_param(id, param)
            .map(|value| param.descriptor().range.normalize(value))
    }

    pub fn zone(&self, id: ZoneId) -> Option<&Zone> {
        self.zones.get(id.index()).and_then(Option::as_ref)
    }

    pub fn zone_count(&self) -> usize {
        self.zones.iter().filter(|z| z.is_some()).count()
    }

    pub fn zone_ids(&self) -> impl Iterator<Item = ZoneId> + '_ {
        self.zones
            .iter()
            .enumerate()
            .filter(|(_, z)| z.is_some())
            .map(|(i, _)| ZoneId(i as u32))
    }

    // ---- Modulation ----

    pub fn set_matrix_entry(&mut self, id: ZoneId, slot: usize, entry: MatrixEntry) -> Result<()> {
        self.zone_ref(id)?;
        check_slot(slot, ZONE_MATRIX_SLOTS)?;
        self.send(Command::SetMatrixEntry {
            zone: id,
            slot,
            entry,
        })?;
        if let Some(zone) = self.zone_slot(id) {
            zone.matrix[slot] = entry;
        }
        Ok(())
    }

    pub fn set_modulator(&mut self, id: ZoneId, slot: usize, params: ModulatorParams) -> Result<()> {
        self.zone_ref(id)?;
        check_slot(slot, NUM_MODULATORS)?;
        self.send(Command::SetModulator {
            zone: id,
            slot,
            params,
        })?;
        if let Some(zone) = self.zone_slot(id) {
            zone.modulators[slot] = params;
        }
        Ok(())
    }

    /// Edit one step of a step modulator.
    pub fn set_step(&mut self, id: ZoneId, slot: usize, step: usize, value: f32) -> Result<()> {
        self.edit_modulator(id, slot, |params| params.steps.set(step, value))
    }

    pub fn rotate_steps_left(&mut self, id: ZoneId, slot: usize) -> Result<()> {
        self.edit_modulator(id, slot, |params| params.steps.rotate_left())
    }

    pub fn rotate_steps_right(&mut self, id: ZoneId, slot: usize) -> Result<()> {
        self.edit_modulator(id, slot, |params| params.steps.rotate_right())
    }

    fn edit_modulator(
        &mut self,
        id: ZoneId,
        slot: usize,
        edit: impl FnOnce(&mut ModulatorParams),
    ) -> Result<()> {
        check_slot(slot, NUM_MODULATORS)?;
        let mut params = self.zone_ref(id)?.modulators[slot];
        edit(&mut params);
        self.set_modulator(id, slot, params)
    }

    // ---- Parts ----

    pub fn part(&self, part: usize) -> Option<&PartConfig> {
        self.parts.get(part)
    }

    pub fn set_part(&mut self, part: usize, config: PartConfig) -> Result<()> {
        check_part(part)?;
        self.send(Command::SetPart { part, config })?;
        self.parts[part] = config;
        Ok(())
    }

    pub fn set_part_matrix_entry(
        &mut self,
        part: usize,
        slot: usize,
        entry: MatrixEntry,
    ) -> Result<()> {
        check_part(part)?;
        check_slot(slot, PART_MATRIX_SLOTS)?;
        self.send(Command::SetPartMatrixEntry { part, slot, entry })?;
        self.parts[part].matrix[slot] = entry;
        Ok(())
    }

    /// Macro knobs are 0..1 modulation sources shared by the part's zones.
    pub fn set_macro(&mut self, part: usize, index: usize, value: f32) -> Result<()> {
        check_part(part)?;
        check_slot(index, NUM_MACROS)?;
        let value = value.clamp(0.0, 1.0);
        self.send(Command::SetMacro { part, index, value })?;
        self.parts[part].macros[index] = value;
        Ok(())
    }

    // ---- Transport and preview ----

    pub fn select_zone(&mut self, zone: Option<ZoneId>) -> Result<()> {
        if let Some(id) = zone {
            self.zone_ref(id)?;
        }
        self.send(Command::SelectZone(zone))?;
        self.selected = zone;
        Ok(())
    }

    pub fn selected_zone(&self) -> Option<ZoneId> {
        self.selected
    }

    /// Audition a note through the engine's regular note path.
    pub fn preview_note_on(&mut self, part: u8, key: u8, velocity: u8) -> Result<()> {
        check_part(part as usize)?;
        self.send(Command::NoteOn {
            part,
            key,
            velocity,
        })
    }

    pub fn preview_note_off(&mut self, part: u8, key: u8) -> Result<()> {
        check_part(part as usize)?;
        self.send(Command::NoteOff {
            part,
            key,
            velocity: 0,
        })
    }

    pub fn all_notes_off(&mut self) -> Result<()> {
        self.send(Command::AllNotesOff)
    }

    pub fn all_sound_off(&mut self) -> Result<()> {
        self.send(Command::AllSoundOff)
    }

    pub fn set_tempo(&mut self, bpm: f64) -> Result<()> {
        self.send(Command::SetTempo(bpm))
    }

    // ---- Feedback ----

    /// Take every queued notification, settling sample references and
    /// returned zones before handing them out.
    pub fn poll_notifications(&mut self) -> Vec<Notification> {
        let notes = self.notifications.drain();
        for note in &notes {
            self.settle(note);
        }
        notes
    }

    fn settle(&mut self, note: &Notification) {
        match note {
            Notification::ZoneRemoved { zone, data, .. } => {
                if let Some(sample) = data.sample {
                    self.release_sample(sample);
                }
                tracing::debug!(zone = zone.0, "Zone returned by engine");
            }
            Notification::ZoneSampleReplaced { zone, old, .. } => {
                if let Some(sample) = *old {
                    self.release_sample(sample);
                }
                tracing::debug!(zone = zone.0, "Zone sample replaced");
            }
            Notification::ZoneRejected { zone, .. } => {
                tracing::warn!(zone = zone.0, "Engine rejected zone");
                if let Some(rejected) = self.zones.get_mut(zone.index()).and_then(Option::take) {
                    if let Some(sample) = rejected.sample {
                        self.release_sample(sample);
                    }
                }
            }
            Notification::ZoneSelected { zone } => self.selected = *zone,
            Notification::LimitReached { kind, part } => match kind {
                LimitKind::Voices => tracing::debug!(part, "Voice limit reached"),
                LimitKind::HoldBuffer => tracing::warn!(part, "Hold buffer full"),
            },
            Notification::ZoneAdded { .. }
            | Notification::ZoneUpdated { .. }
            | Notification::EngineStatus { .. } => {}
        }
    }

    fn release_sample(&mut self, sample: SampleId) {
        let freed = self.samples.lock().forget(sample);
        if freed.is_some() {
            tracing::debug!(id = sample.0, "Sample freed");
        }
    }

    pub fn meters(&self) -> &Arc<EngineMeters> {
        &self.meters
    }

    /// Note-offs parked by the hold pedal.
    pub fn held_note_count(&self) -> usize {
        self.hold.lock().len()
    }

    /// Informational notifications lost to a full queue.
    pub fn dropped_notifications(&self) -> u64 {
        self.notifications.dropped()
    }

    // ---- Internals ----

    fn send(&mut self, command: Command) -> Result<()> {
        self.commands.send(command).map(|_| ()).map_err(|_| self.queue_full())
    }

    fn check_room(&self) -> Result<()> {
        if self.commands.is_full() {
            return Err(self.queue_full());
        }
        Ok(())
    }

    fn queue_full(&self) -> Error {
        divisi_core::Error::QueueFull {
            queue: "command",
            capacity: self.commands.capacity(),
        }
        .into()
    }

    fn zone_ref(&self, id: ZoneId) -> Result<&Zone> {
        self.zone(id)
            .ok_or_else(|| divisi_synth::Error::UnknownZone(id).into())
    }

    fn zone_slot(&mut self, id: ZoneId) -> Option<&mut Zone> {
        self.zones.get_mut(id.index()).and_then(Option::as_mut)
    }
}

fn check_part(part: usize) -> Result<()> {
    if part >= NUM_PARTS {
        return Err(divisi_synth::Error::InvalidPart(part).into());
    }
    Ok(())
}

fn check_slot(slot: usize, max: usize) -> Result<()> {
    if slot >= max {
        return Err(divisi_synth::Error::InvalidSlot { slot, max }.into());
    }
    Ok(())
}
