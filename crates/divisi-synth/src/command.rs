//! Messages between the control thread and the engine.
//!
//! [`Command`]s flow control → audio and are applied at the top of the next
//! block. [`Notification`]s flow back. Both travel inside
//! [`divisi_core::Message`] envelopes.
//!
//! Zones cross the boundary as `Box<Zone>` and always come back: the engine
//! keeps the box it is given and returns the one it replaces, so no zone is
//! ever freed on the audio thread. The same holds for samples: the engine
//! returns the `Arc<Sample>` it lets go of and the control thread drops it.

use crate::modulation::MatrixEntry;
use crate::part::PartConfig;
use crate::sample::{Sample, SampleId};
use crate::zone::{Zone, ZoneId, ZoneParam};
use divisi_dsp::ModulatorParams;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Install a zone in an empty slot.
    AddZone { zone: ZoneId, data: Box<Zone> },
    /// Kill the zone's voices and hand the zone back.
    RemoveZone { zone: ZoneId },
    /// Replace a zone's data. The engine keeps the zone's current sample binding.
    UpdateZone { zone: ZoneId, data: Box<Zone> },
    /// Kill the zone's voices and rebind its sample.
    SetZoneSample {
        zone: ZoneId,
        sample: Option<SampleId>,
    },
    SetZoneParam {
        zone: ZoneId,
        param: ZoneParam,
        value: f32,
    },
    SetMatrixEntry {
        zone: ZoneId,
        slot: usize,
        entry: MatrixEntry,
    },
    /// Replace a modulator slot, including its step data.
    SetModulator {
        zone: ZoneId,
        slot: usize,
        params: ModulatorParams,
    },
    SetPart { part: usize, config: PartConfig },
    SetPartMatrixEntry {
        part: usize,
        slot: usize,
        entry: MatrixEntry,
    },
    SetMacro { part: usize, index: usize, value: f32 },
    SelectZone(Option<ZoneId>),
    /// Audition from the editor.
    NoteOn { part: u8, key: u8, velocity: u8 },
    NoteOff { part: u8, key: u8, velocity: u8 },
    AllNotesOff,
    AllSoundOff,
    /// Beats per minute, for tempo-synced modulators.
    SetTempo(f64),
}

impl Command {
    /// Whether applying this command may produce an ownership-carrying notification.
    pub fn returns_ownership(&self) -> bool {
        matches!(
            self,
            Command::AddZone { .. }
                | Command::RemoveZone { .. }
                | Command::UpdateZone { .. }
                | Command::SetZoneSample { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LimitKind {
    /// A note was dropped or had to steal.
    Voices,
    /// A held note-off was released early.
    HoldBuffer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Notification {
    ZoneAdded {
        zone: ZoneId,
    },
    /// The command could not be applied; the zone comes back unchanged.
    ZoneRejected {
        zone: ZoneId,
        data: Box<Zone>,
    },
    ZoneRemoved {
        zone: ZoneId,
        data: Box<Zone>,
        #[serde(skip)]
        sample: Option<Arc<Sample>>,
    },
    ZoneUpdated {
        zone: ZoneId,
        old: Box<Zone>,
    },
    /// Voices of the zone were killed before the swap.
    ZoneSampleReplaced {
        zone: ZoneId,
        old: Option<SampleId>,
        new: Option<SampleId>,
        #[serde(skip)]
        released: Option<Arc<Sample>>,
    },
    ZoneSelected {
        zone: Option<ZoneId>,
    },
    /// Sent when the voice counts change.
    EngineStatus {
        active_voices: usize,
        playing_voices: usize,
    },
    LimitReached {
        kind: LimitKind,
        part: u8,
    },
}

impl Notification {
    /// Notifications that hand data back and must never be dropped.
    pub fn carries_ownership(&self) -> bool {
        matches!(
            self,
            Notification::ZoneRejected { .. }
                | Notification::ZoneRemoved { .. }
                | Notification::ZoneUpdated { .. }
                | Notification::ZoneSampleReplaced { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modulation::{ModDestination, ModSource};
    use divisi_core::{bus, Message};

    #[test]
    fn test_command_wire_round_trip() {
        let commands = vec![
            Command::AddZone {
                zone: ZoneId(4),
                data: Box::new(Zone::new(2).with_keys(60, 72)),
            },
            Command::SetZoneParam {
                zone: ZoneId(4),
                param: ZoneParam::Pan,
                value: -0.5,
            },
            Command::SetMatrixEntry {
                zone: ZoneId(4),
                slot: 3,
                entry: MatrixEntry::new(ModSource::ModWheel, ModDestination::Pitch, 2.0),
            },
            Command::SelectZone(None),
            Command::SetTempo(96.0),
        ];
        let (mut tx, mut rx) = bus::channel(8);
        for command in commands.clone() {
            tx.send(command).unwrap();
        }
        for (seq, expected) in commands.into_iter().enumerate() {
            let message = rx.recv_message().unwrap();
            let json = serde_json::to_string(&message).unwrap();
            let back: Message<Command> = serde_json::from_str(&json).unwrap();
            back.check_version().unwrap();
            assert_eq!(back.seq, seq as u64);
            assert_eq!(back.body, expected);
        }
    }

    #[test]
    fn test_sample_handles_stay_off_the_wire() {
        let sample = Arc::new(Sample::mono(vec![0.0; 4], 44100.0).unwrap());
        let note = Notification::ZoneSampleReplaced {
            zone: ZoneId(1),
            old: Some(SampleId(0)),
            new: Some(SampleId(1)),
            released: Some(sample),
        };
        let json = serde_json::to_string(&note).unwrap();
        let back: Notification = serde_json::from_str(&json).unwrap();
        match back {
            Notification::ZoneSampleReplaced { released, new, .. } => {
                assert!(released.is_none());
                assert_eq!(new, Some(SampleId(1)));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(note.carries_ownership());
    }

    #[test]
    fn test_ownership_classification() {
        assert!(Command::RemoveZone { zone: ZoneId(0) }.returns_ownership());
        assert!(!Command::AllNotesOff.returns_ownership());
        assert!(!Notification::ZoneAdded { zone: ZoneId(0) }.carries_ownership());
        assert!(!Notification::EngineStatus {
            active_voices: 1,
            playing_voices: 1
        }
        .carries_ownership());
    }
}
