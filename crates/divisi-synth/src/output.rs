//! Block output buffers and shared meters.

use crate::modulation::NUM_AUX;
use divisi_core::{AtomicFlag, AtomicFloat, MAX_BLOCK_SIZE};
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone)]
pub struct StereoBuffer {
    pub left: [f32; MAX_BLOCK_SIZE],
    pub right: [f32; MAX_BLOCK_SIZE],
}

impl Default for StereoBuffer {
    fn default() -> Self {
        Self {
            left: [0.0; MAX_BLOCK_SIZE],
            right: [0.0; MAX_BLOCK_SIZE],
        }
    }
}

/// One block of engine output: the main stereo mix and the aux sends.
#[derive(Debug, Clone)]
pub struct BlockOutput {
    len: usize,
    pub main: StereoBuffer,
    pub aux: [StereoBuffer; NUM_AUX],
}

impl BlockOutput {
    pub fn new(block_size: usize) -> Self {
        Self {
            len: block_size.min(MAX_BLOCK_SIZE),
            main: StereoBuffer::default(),
            aux: Default::default(),
        }
    }

    /// Frames per block.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        let len = self.len;
        for buffer in std::iter::once(&mut self.main).chain(self.aux.iter_mut()) {
            buffer.left[..len].fill(0.0);
            buffer.right[..len].fill(0.0);
        }
    }

    pub fn left(&self) -> &[f32] {
        &self.main.left[..self.len]
    }

    pub fn right(&self) -> &[f32] {
        &self.main.right[..self.len]
    }

    pub fn aux_left(&self, bus: usize) -> &[f32] {
        match self.aux.get(bus) {
            Some(b) => &b.left[..self.len],
            None => &[],
        }
    }

    pub fn aux_right(&self, bus: usize) -> &[f32] {
        match self.aux.get(bus) {
            Some(b) => &b.right[..self.len],
            None => &[],
        }
    }
}

/// Lock-free engine meters, written by the audio thread and read anywhere.
#[derive(Debug, Default)]
pub struct EngineMeters {
    peak: [AtomicFloat; 2],
    clipped: AtomicFlag,
    active_voices: AtomicUsize,
    playing_voices: AtomicUsize,
}

impl EngineMeters {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_block(&self, output: &BlockOutput, active: usize, playing: usize) {
        let peak_l = output.left().iter().fold(0.0f32, |p, s| p.max(s.abs()));
        let peak_r = output.right().iter().fold(0.0f32, |p, s| p.max(s.abs()));
        self.peak[0].fetch_max(peak_l);
        self.peak[1].fetch_max(peak_r);
        if peak_l > 1.0 || peak_r > 1.0 {
            self.clipped.set(true);
        }
        self.active_voices.store(active, Ordering::Relaxed);
        self.playing_voices.store(playing, Ordering::Relaxed);
    }

    /// Peak since the last call, per channel, then reset.
    pub fn take_peak(&self) -> (f32, f32) {
        (self.peak[0].take(), self.peak[1].take())
    }

    /// Whether any block clipped since the last call.
    pub fn take_clipped(&self) -> bool {
        self.clipped.take()
    }

    /// Voices holding an arena slot, including ones fading out.
    pub fn active_voices(&self) -> usize {
        self.active_voices.load(Ordering::Relaxed)
    }

    /// Voices counted against the polyphony cap.
    pub fn playing_voices(&self) -> usize {
        self.playing_voices.load(Ordering::Relaxed)
    }
}
