//! Fixed arena of pre-constructed voices.
//!
//! Slots are addressed by [`VoiceHandle`], an index plus a generation that is
//! bumped every time the slot is retired, so a stale handle (for example one
//! parked in the hold buffer) can never reach a voice started later.
//!
//! A slot is taken with [`VoicePool::reserve`], which returns a [`Reservation`]
//! guard. Committing the guard makes the voice active; dropping it without
//! committing puts the slot back on the free list. Nothing here allocates after
//! [`VoicePool::new`].

use crate::voice::Voice;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceHandle {
    index: u32,
    generation: u32,
}

impl VoiceHandle {
    #[inline]
    pub fn index(&self) -> usize {
        self.index as usize
    }

    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

#[derive(Debug)]
pub struct VoicePool {
    voices: Vec<Voice>,
    generations: Vec<u32>,
    free: Vec<u32>,
    /// Active slots, oldest first.
    active: Vec<u32>,
}

impl VoicePool {
    pub fn new(slots: usize, block_size: usize) -> Self {
        Self {
            voices: (0..slots).map(|_| Voice::new(block_size)).collect(),
            generations: vec![0; slots],
            // Popped from the back, so slot 0 is handed out first.
            free: (0..slots as u32).rev().collect(),
            active: Vec::with_capacity(slots),
        }
    }

    /// Take a free slot, or `None` when the arena is exhausted.
    pub fn reserve(&mut self) -> Option<Reservation<'_>> {
        let index = self.free.pop()?;
        Some(Reservation {
            pool: self,
            index,
            committed: false,
        })
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.voices.len()
    }

    #[inline]
    pub fn free_slots(&self) -> usize {
        self.free.len()
    }

    /// Voices holding a slot, including finished ones not yet retired.
    #[inline]
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Voices counted against polyphony.
    pub fn playing_count(&self) -> usize {
        self.active
            .iter()
            .filter(|&&i| self.voices[i as usize].is_playing())
            .count()
    }

    pub fn part_playing_count(&self, part: u8) -> usize {
        self.active
            .iter()
            .map(|&i| &self.voices[i as usize])
            .filter(|v| v.part() == part && v.is_playing())
            .count()
    }

    #[inline]
    pub fn get(&self, handle: VoiceHandle) -> Option<&Voice> {
        self.check(handle).map(|i| &self.voices[i])
    }

    #[inline]
    pub fn get_mut(&mut self, handle: VoiceHandle) -> Option<&mut Voice> {
        self.check(handle).map(move |i| &mut self.voices[i])
    }

    fn check(&self, handle: VoiceHandle) -> Option<usize> {
        let i = handle.index as usize;
        (self.generations.get(i) == Some(&handle.generation) && !self.voices[i].is_finished())
            .then_some(i)
    }

    fn handle(&self, index: u32) -> VoiceHandle {
        VoiceHandle {
            index,
            generation: self.generations[index as usize],
        }
    }

    /// Active voices, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = (VoiceHandle, &Voice)> + '_ {
        self.active
            .iter()
            .map(move |&i| (self.handle(i), &self.voices[i as usize]))
    }

    /// Unfinished voices in slot order, for rendering and bulk edits.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (VoiceHandle, &mut Voice)> + '_ {
        let generations = &self.generations;
        self.voices
            .iter_mut()
            .enumerate()
            .filter(|(_, v)| !v.is_finished())
            .map(move |(i, v)| {
                (
                    VoiceHandle {
                        index: i as u32,
                        generation: generations[i],
                    },
                    v,
                )
            })
    }

    /// Fast-release the oldest playing voice not started by `protect` and,
    /// when `part` is given, belonging to that part. Exactly one voice at most.
    pub fn steal_oldest(&mut self, protect: u64, part: Option<u8>) -> Option<VoiceHandle> {
        let index = self.active.iter().copied().find(|&i| {
            let v = &self.voices[i as usize];
            v.is_playing() && v.note_id() != protect && part.map_or(true, |p| v.part() == p)
        })?;
        self.voices[index as usize].uber_release();
        Some(self.handle(index))
    }

    /// Free a slot when the arena is full: kill the quietest voice already
    /// fading out. Returns false when every slot is still playing.
    pub fn reclaim_quietest(&mut self) -> bool {
        let quietest = self
            .active
            .iter()
            .copied()
            .filter(|&i| !self.voices[i as usize].is_playing())
            .min_by(|&a, &b| {
                let la = self.voices[a as usize].level();
                let lb = self.voices[b as usize].level();
                la.total_cmp(&lb)
            });
        match quietest {
            Some(i) => {
                self.voices[i as usize].kill();
                self.retire_finished();
                true
            }
            None => false,
        }
    }

    /// Kill every voice of `zone`. Their sample references are dropped now.
    pub fn kill_zone(&mut self, zone: crate::zone::ZoneId) -> usize {
        let mut killed = 0;
        for (_, voice) in self.iter_mut() {
            if voice.zone() == zone {
                voice.kill();
                killed += 1;
            }
        }
        self.retire_finished();
        killed
    }

    pub fn kill_all(&mut self) {
        for (_, voice) in self.iter_mut() {
            voice.kill();
        }
        self.retire_finished();
    }

    /// Return finished voices to the free list. Keeps the start order of the rest.
    pub fn retire_finished(&mut self) -> usize {
        let Self {
            voices,
            generations,
            free,
            active,
        } = self;
        let before = active.len();
        active.retain(|&i| {
            if voices[i as usize].is_finished() {
                generations[i as usize] = generations[i as usize].wrapping_add(1);
                free.push(i);
                false
            } else {
                true
            }
        });
        before - active.len()
    }
}

/// A reserved slot. Dropping it uncommitted returns the slot to the pool.
pub struct Reservation<'a> {
    pool: &'a mut VoicePool,
    index: u32,
    committed: bool,
}

impl Reservation<'_> {
    #[inline]
    pub fn voice(&mut self) -> &mut Voice {
        &mut self.pool.voices[self.index as usize]
    }

    /// Make the voice active.
    pub fn commit(mut self) -> VoiceHandle {
        self.committed = true;
        self.pool.active.push(self.index);
        self.pool.handle(self.index)
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.pool.voices[self.index as usize].kill();
            self.pool.free.push(self.index);
        }
    }
}
