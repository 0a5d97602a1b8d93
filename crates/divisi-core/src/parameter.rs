//! Parameter ranges for the zone field-descriptor table.
//!
//! Editors work in normalized 0.0-1.0 knob positions; the engine stores real
//! values. A [`ParamRange`] converts between the two and clamps incoming edits.
//!
//! # Example
//!
//! ```
//! use divisi_core::{ParamRange, ParamUnit};
//!
//! let cutoff = ParamRange::logarithmic(20.0, 20000.0, 1000.0, ParamUnit::Hertz);
//! let hz = cutoff.denormalize(0.5); // geometric mean, ~632 Hz
//! assert!((cutoff.normalize(hz) - 0.5).abs() < 1e-4);
//! ```

use serde::{Deserialize, Serialize};

/// Mapping between normalized and real values.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum ParamScale {
    #[default]
    Linear,
    /// `real = min * (max/min)^normalized`; requires `min > 0`.
    Logarithmic,
    /// Rounded to whole numbers.
    Integer,
    /// `min` below 0.5, `max` from 0.5 up.
    Toggle,
}

/// Display unit, used only for formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ParamUnit {
    #[default]
    None,
    Semitones,
    Cents,
    Hertz,
    Decibels,
    /// log2 seconds, as used by envelope segments.
    Log2Seconds,
    Seconds,
    Percent,
}

/// Valid range, default and scaling of one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamRange {
    pub min: f32,
    pub max: f32,
    pub default: f32,
    pub scale: ParamScale,
    pub unit: ParamUnit,
}

impl ParamRange {
    pub const fn new(min: f32, max: f32, default: f32, scale: ParamScale, unit: ParamUnit) -> Self {
        Self {
            min,
            max,
            default,
            scale,
            unit,
        }
    }

    pub const fn linear(min: f32, max: f32, default: f32, unit: ParamUnit) -> Self {
        Self::new(min, max, default, ParamScale::Linear, unit)
    }

    pub const fn logarithmic(min: f32, max: f32, default: f32, unit: ParamUnit) -> Self {
        Self::new(min, max, default, ParamScale::Logarithmic, unit)
    }

    pub fn integer(min: i32, max: i32, default: i32) -> Self {
        Self::new(
            min as f32,
            max as f32,
            default as f32,
            ParamScale::Integer,
            ParamUnit::None,
        )
    }

    pub const fn toggle(default_on: bool) -> Self {
        Self::new(
            0.0,
            1.0,
            if default_on { 1.0 } else { 0.0 },
            ParamScale::Toggle,
            ParamUnit::None,
        )
    }

    /// Clamp a real value into range, quantizing integer and toggle parameters.
    #[inline]
    pub fn clamp(&self, value: f32) -> f32 {
        let value = if value.is_nan() { self.default } else { value };
        let value = value.clamp(self.min, self.max);
        match self.scale {
            ParamScale::Integer => value.round(),
            ParamScale::Toggle => {
                if value >= (self.min + self.max) * 0.5 {
                    self.max
                } else {
                    self.min
                }
            }
            _ => value,
        }
    }

    /// Real value → 0.0-1.0.
    #[inline]
    pub fn normalize(&self, value: f32) -> f32 {
        let value = self.clamp(value);
        let span = self.max - self.min;
        if span <= 0.0 {
            return 0.0;
        }
        match self.scale {
            ParamScale::Logarithmic if self.min > 0.0 => {
                (value / self.min).ln() / (self.max / self.min).ln()
            }
            _ => (value - self.min) / span,
        }
    }

    /// 0.0-1.0 → real value.
    #[inline]
    pub fn denormalize(&self, normalized: f32) -> f32 {
        let n = normalized.clamp(0.0, 1.0);
        let real = match self.scale {
            ParamScale::Logarithmic if self.min > 0.0 => self.min * (self.max / self.min).powf(n),
            _ => self.min + n * (self.max - self.min),
        };
        self.clamp(real)
    }

    #[inline]
    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn format(&self, value: f32) -> String {
        match self.unit {
            ParamUnit::None => format!("{:.2}", value),
            ParamUnit::Semitones => format!("{:.2} st", value),
            ParamUnit::Cents => format!("{:.1} ct", value),
            ParamUnit::Hertz if value >= 1000.0 => format!("{:.2} kHz", value / 1000.0),
            ParamUnit::Hertz => format!("{:.1} Hz", value),
            ParamUnit::Decibels => format!("{:.1} dB", value),
            ParamUnit::Log2Seconds => {
                let seconds = value.exp2();
                if seconds < 1.0 {
                    format!("{:.1} ms", seconds * 1000.0)
                } else {
                    format!("{:.2} s", seconds)
                }
            }
            ParamUnit::Seconds => format!("{:.3} s", value),
            ParamUnit::Percent => format!("{:.0} %", value * 100.0),
        }
    }
}

impl Default for ParamRange {
    fn default() -> Self {
        Self::linear(0.0, 1.0, 0.5, ParamUnit::None)
    }
}
