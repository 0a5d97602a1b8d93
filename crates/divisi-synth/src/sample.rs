//! Immutable sample buffers and the reference-counted sample table.
//!
//! A [`Sample`] never changes after it is loaded. Zones name samples by
//! [`SampleId`]; the [`SampleTable`] maps ids to `Arc<Sample>` and counts how
//! many zones reference each one. The table is shared between the control
//! thread and the engine as [`SharedSampleTable`] (the `cs_patch` lock). The
//! engine only takes the lock to clone an `Arc` when a zone's sample is bound,
//! never while reading frames.

use crate::{Error, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SampleId(pub u32);

/// Mono or stereo `f32` audio at its own sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    left: Vec<f32>,
    right: Option<Vec<f32>>,
    sample_rate: f64,
}

impl Sample {
    pub fn mono(data: Vec<f32>, sample_rate: f64) -> Result<Self> {
        Self::validate(data.len(), sample_rate)?;
        Ok(Self {
            left: data,
            right: None,
            sample_rate,
        })
    }

    pub fn stereo(left: Vec<f32>, right: Vec<f32>, sample_rate: f64) -> Result<Self> {
        Self::validate(left.len(), sample_rate)?;
        if left.len() != right.len() {
            return Err(Error::InvalidSample(format!(
                "channel lengths differ ({} vs {})",
                left.len(),
                right.len()
            )));
        }
        Ok(Self {
            left,
            right: Some(right),
            sample_rate,
        })
    }

    /// Split interleaved frames. Only one or two channels are accepted.
    pub fn from_interleaved(data: &[f32], channels: usize, sample_rate: f64) -> Result<Self> {
        match channels {
            1 => Self::mono(data.to_vec(), sample_rate),
            2 => {
                if data.len() % 2 != 0 {
                    return Err(Error::InvalidSample(
                        "odd number of interleaved stereo values".to_string(),
                    ));
                }
                let left = data.iter().step_by(2).copied().collect();
                let right = data.iter().skip(1).step_by(2).copied().collect();
                Self::stereo(left, right, sample_rate)
            }
            n => Err(Error::InvalidSample(format!("{} channels not supported", n))),
        }
    }

    fn validate(frames: usize, sample_rate: f64) -> Result<()> {
        if frames == 0 {
            return Err(Error::InvalidSample("no frames".to_string()));
        }
        if sample_rate.is_nan() || sample_rate <= 0.0 {
            return Err(Error::InvalidSample(format!(
                "invalid sample rate {}",
                sample_rate
            )));
        }
        Ok(())
    }

    /// Frame count.
    #[inline]
    pub fn len(&self) -> usize {
        self.left.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    #[inline]
    pub fn channels(&self) -> usize {
        if self.right.is_some() {
            2
        } else {
            1
        }
    }

    #[inline]
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    #[inline]
    pub fn left(&self) -> &[f32] {
        &self.left
    }

    /// Right channel; the left channel for mono samples.
    #[inline]
    pub fn right(&self) -> &[f32] {
        self.right.as_deref().unwrap_or(&self.left)
    }

    pub fn duration_seconds(&self) -> f64 {
        self.len() as f64 / self.sample_rate
    }

    pub fn peak(&self) -> f32 {
        self.left
            .iter()
            .chain(self.right.iter().flatten())
            .fold(0.0f32, |peak, s| peak.max(s.abs()))
    }
}

#[derive(Debug)]
struct Entry {
    sample: Arc<Sample>,
    zones: usize,
}

/// Id → sample map with per-sample zone reference counts.
#[derive(Debug)]
pub struct SampleTable {
    slots: Vec<Option<Entry>>,
}

/// The `cs_patch` critical section.
pub type SharedSampleTable = Arc<Mutex<SampleTable>>;

impl SampleTable {
    pub fn with_capacity(max_samples: usize) -> Self {
        let mut slots = Vec::with_capacity(max_samples);
        slots.resize_with(max_samples, || None);
        Self { slots }
    }

    pub fn shared(max_samples: usize) -> SharedSampleTable {
        Arc::new(Mutex::new(Self::with_capacity(max_samples)))
    }

    pub fn insert(&mut self, sample: Sample) -> Result<SampleId> {
        let index = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(Error::SampleLimitReached {
                max: self.slots.len(),
            })?;
        self.slots[index] = Some(Entry {
            sample: Arc::new(sample),
            zones: 0,
        });
        Ok(SampleId(index as u32))
    }

    #[inline]
    pub fn get(&self, id: SampleId) -> Option<&Arc<Sample>> {
        self.entry(id).map(|entry| &entry.sample)
    }

    pub fn contains(&self, id: SampleId) -> bool {
        self.entry(id).is_some()
    }

    /// Add a zone reference.
    pub fn remember(&mut self, id: SampleId) -> Result<()> {
        let entry = self
            .slots
            .get_mut(id.0 as usize)
            .and_then(Option::as_mut)
            .ok_or(Error::UnknownSample(id))?;
        entry.zones += 1;
        Ok(())
    }

    /// Drop a zone reference. At zero the sample leaves the table and is
    /// returned so the caller controls where the last `Arc` is dropped.
    pub fn forget(&mut self, id: SampleId) -> Option<Arc<Sample>> {
        let slot = self.slots.get_mut(id.0 as usize)?;
        let entry = slot.as_mut()?;
        entry.zones = entry.zones.saturating_sub(1);
        if entry.zones == 0 {
            return slot.take().map(|entry| entry.sample);
        }
        None
    }

    /// Remove a sample no zone references.
    pub fn remove(&mut self, id: SampleId) -> Result<Arc<Sample>> {
        let slot = self
            .slots
            .get_mut(id.0 as usize)
            .ok_or(Error::UnknownSample(id))?;
        let zones = slot
            .as_ref()
            .map(|entry| entry.zones)
            .ok_or(Error::UnknownSample(id))?;
        if zones > 0 {
            return Err(Error::SampleInUse { id, zones });
        }
        slot.take()
            .map(|entry| entry.sample)
            .ok_or(Error::UnknownSample(id))
    }

    pub fn refcount(&self, id: SampleId) -> usize {
        self.entry(id).map_or(0, |entry| entry.zones)
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn entry(&self, id: SampleId) -> Option<&Entry> {
        self.slots.get(id.0 as usize).and_then(Option::as_ref)
    }
}
