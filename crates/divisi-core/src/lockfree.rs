//! Lock-free meters shared between the audio thread and observers.

use atomic_float::AtomicF32;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cache-line aligned atomic f32.
#[derive(Debug)]
#[repr(align(64))]
pub struct AtomicFloat {
    value: AtomicF32,
}

impl AtomicFloat {
    pub fn new(value: f32) -> Self {
        Self {
            value: AtomicF32::new(value),
        }
    }

    #[inline]
    pub fn get(&self) -> f32 {
        self.value.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set(&self, value: f32) {
        self.value.store(value, Ordering::Release);
    }

    /// Raise the stored value to `value` if larger. Returns the previous value.
    #[inline]
    pub fn fetch_max(&self, value: f32) -> f32 {
        self.value.fetch_max(value, Ordering::AcqRel)
    }

    #[inline]
    pub fn take(&self) -> f32 {
        self.value.swap(0.0, Ordering::AcqRel)
    }
}

impl Default for AtomicFloat {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// Cache-line aligned atomic bool.
#[derive(Debug, Default)]
#[repr(align(64))]
pub struct AtomicFlag {
    value: AtomicBool,
}

impl AtomicFlag {
    pub fn new(value: bool) -> Self {
        Self {
            value: AtomicBool::new(value),
        }
    }

    #[inline]
    pub fn get(&self) -> bool {
        self.value.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set(&self, value: bool) {
        self.value.store(value, Ordering::Release);
    }

    /// Clear the flag and report whether it was set.
    #[inline]
    pub fn take(&self) -> bool {
        self.value.swap(false, Ordering::AcqRel)
    }
}
