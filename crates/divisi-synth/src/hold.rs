//! Deferred note-offs while a channel's hold pedal is down.
//!
//! Shared between the engine and observers as [`SharedHoldBuffer`], the
//! `cs_engine` lock. Every operation is bounded by the fixed capacity.

use crate::pool::VoiceHandle;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeldNote {
    pub channel: u8,
    pub key: u8,
    pub voice: VoiceHandle,
    pub release_velocity: u8,
}

#[derive(Debug)]
pub struct HoldBuffer {
    notes: Vec<HeldNote>,
    capacity: usize,
}

/// The `cs_engine` critical section.
pub type SharedHoldBuffer = Arc<Mutex<HoldBuffer>>;

impl HoldBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            notes: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn shared(capacity: usize) -> SharedHoldBuffer {
        Arc::new(Mutex::new(Self::new(capacity)))
    }

    /// Park a note-off. Hands the note back when full so the caller can release it now.
    pub fn push(&mut self, note: HeldNote) -> Result<(), HeldNote> {
        if self.notes.len() >= self.capacity {
            return Err(note);
        }
        if !self.notes.contains(&note) {
            self.notes.push(note);
        }
        Ok(())
    }

    /// Remove and visit every note parked on `channel`, in arrival order.
    pub fn purge(&mut self, channel: u8, mut release: impl FnMut(HeldNote)) -> usize {
        let before = self.notes.len();
        self.notes.retain(|note| {
            if note.channel == channel {
                release(*note);
                false
            } else {
                true
            }
        });
        before - self.notes.len()
    }

    /// Take the parked note for `voice`. The engine uses this when the key is
    /// struck again and the old voice must release now.
    pub fn remove_voice(&mut self, voice: VoiceHandle) -> Option<HeldNote> {
        let i = self.notes.iter().position(|note| note.voice == voice)?;
        Some(self.notes.remove(i))
    }

    /// Drop notes whose voice is gone. `live` reports whether a handle still resolves.
    pub fn prune(&mut self, mut live: impl FnMut(VoiceHandle) -> bool) -> usize {
        let before = self.notes.len();
        self.notes.retain(|note| live(note.voice));
        before - self.notes.len()
    }

    pub fn clear(&mut self) {
        self.notes.clear();
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether any note of `key` is parked on `channel`.
    pub fn contains_key(&self, channel: u8, key: u8) -> bool {
        self.notes
            .iter()
            .any(|note| note.channel == channel && note.key == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::VoicePool;

    fn handles(n: usize) -> Vec<VoiceHandle> {
        let mut pool = VoicePool::new(n, 32);
        (0..n)
            .map(|_| pool.reserve().unwrap().commit())
            .collect()
    }

    fn note(channel: u8, key: u8, voice: VoiceHandle) -> HeldNote {
        HeldNote {
            channel,
            key,
            voice,
            release_velocity: 0,
        }
    }

    #[test]
    fn test_purge_releases_only_that_channel() {
        let h = handles(3);
        let mut buffer = HoldBuffer::new(8);
        buffer.push(note(0, 60, h[0])).unwrap();
        buffer.push(note(1, 62, h[1])).unwrap();
        buffer.push(note(0, 64, h[2])).unwrap();

        let mut released = Vec::new();
        assert_eq!(buffer.purge(0, |n| released.push(n.key)), 2);
        assert_eq!(released, vec![60, 64]);
        assert_eq!(buffer.len(), 1);
        assert!(buffer.contains_key(1, 62));
    }

    #[test]
    fn test_overflow_hands_note_back() {
        let h = handles(2);
        let mut buffer = HoldBuffer::new(1);
        buffer.push(note(0, 60, h[0])).unwrap();
        let rejected = buffer.push(note(0, 61, h[1])).unwrap_err();
        assert_eq!(rejected.key, 61);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_duplicates_and_removal() {
        let h = handles(1);
        let mut buffer = HoldBuffer::new(4);
        buffer.push(note(0, 60, h[0])).unwrap();
        buffer.push(note(0, 60, h[0])).unwrap();
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.remove_voice(h[0]), Some(note(0, 60, h[0])));
        assert_eq!(buffer.remove_voice(h[0]), None);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_prune_stale_handles() {
        let h = handles(3);
        let mut buffer = HoldBuffer::new(4);
        for (i, &voice) in h.iter().enumerate() {
            buffer.push(note(0, 60 + i as u8, voice)).unwrap();
        }
        assert_eq!(buffer.prune(|voice| voice != h[1]), 1);
        assert_eq!(buffer.len(), 2);
        assert!(!buffer.contains_key(0, 61));
    }
}
