//! Lookup tables computed once per sample-rate configuration.
//!
//! [`Tables`] is immutable after construction and shared by `Arc`. The audio
//! thread reads it by reference; rebuilding for a new sample rate means
//! building a new engine.

use std::f64::consts::LN_2;

/// Semitone range covered by [`Tables::pitch`] on either side of zero.
pub const PITCH_RANGE: i32 = 256;
const PITCH_FINE_STEPS: usize = 1024;

/// Lowest dB value with a non-zero gain.
pub const DB_MIN: f32 = -192.0;
pub const DB_MAX: f32 = 64.0;
const DB_STEPS_PER_UNIT: f32 = 4.0;

/// Envelope segment rates are log2 seconds. At or below this the segment is instant.
pub const ENV_RATE_MIN: f32 = -10.0;
pub const ENV_RATE_MAX: f32 = 6.0;
const ENV_RATE_STEPS_PER_UNIT: f32 = 32.0;

/// Fixed-point phase that ends an envelope segment.
pub const ENV_PHASE_MAX: u32 = 1 << 24;

const CURVE_AMOUNTS: usize = 33;
const CURVE_POINTS: usize = 257;
const CURVE_STEEPNESS: f32 = 6.0;

/// Segment shape for a curve amount in -1..1 at phase `x` in 0..1.
///
/// Zero is linear, positive amounts start slow (exponential), negative amounts
/// start fast (logarithmic). Always `f(0) = 0`, `f(1) = 1`, monotonic.
pub fn curve_shape(amount: f32, x: f32) -> f32 {
    let x = x.clamp(0.0, 1.0);
    let amount = amount.clamp(-1.0, 1.0);
    if amount.abs() < 1e-4 {
        return x;
    }
    let k = amount.abs() * CURVE_STEEPNESS;
    let norm = 1.0 / (k.exp() - 1.0);
    let rise = |t: f32| ((k * t).exp() - 1.0) * norm;
    if amount > 0.0 {
        rise(x)
    } else {
        1.0 - rise(1.0 - x)
    }
}

#[derive(Debug, Clone)]
pub struct Tables {
    sample_rate: f64,
    block_size: usize,
    pitch_coarse: Vec<f32>,
    pitch_fine: Vec<f32>,
    db: Vec<f32>,
    env_rate: Vec<f64>,
    curve: Vec<f32>,
}

impl Tables {
    pub fn new(sample_rate: f64, block_size: usize) -> Self {
        let pitch_coarse = (-PITCH_RANGE..=PITCH_RANGE)
            .map(|st| (st as f64 / 12.0).exp2() as f32)
            .collect();

        let pitch_fine = (0..=PITCH_FINE_STEPS)
            .map(|i| (i as f64 / (PITCH_FINE_STEPS as f64 * 12.0)).exp2() as f32)
            .collect();

        let db_len = ((DB_MAX - DB_MIN) * DB_STEPS_PER_UNIT) as usize + 1;
        let db = (0..db_len)
            .map(|i| {
                let db = DB_MIN as f64 + i as f64 / DB_STEPS_PER_UNIT as f64;
                10f64.powf(db / 20.0) as f32
            })
            .collect();

        // Phase increment per block for a segment lasting 2^rate seconds.
        let rate_len = ((ENV_RATE_MAX - ENV_RATE_MIN) * ENV_RATE_STEPS_PER_UNIT) as usize + 1;
        let block_seconds = block_size as f64 / sample_rate;
        let env_rate = (0..rate_len)
            .map(|i| {
                let rate = ENV_RATE_MIN as f64 + i as f64 / ENV_RATE_STEPS_PER_UNIT as f64;
                ENV_PHASE_MAX as f64 * block_seconds * (-rate * LN_2).exp()
            })
            .collect();

        let mut curve = Vec::with_capacity(CURVE_AMOUNTS * CURVE_POINTS);
        for a in 0..CURVE_AMOUNTS {
            let amount = a as f32 / (CURVE_AMOUNTS - 1) as f32 * 2.0 - 1.0;
            for p in 0..CURVE_POINTS {
                curve.push(curve_shape(amount, p as f32 / (CURVE_POINTS - 1) as f32));
            }
        }

        tracing::debug!(sample_rate, block_size, "built lookup tables");

        Self {
            sample_rate,
            block_size,
            pitch_coarse,
            pitch_fine,
            db,
            env_rate,
            curve,
        }
    }

    #[inline]
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// `2^(semitones/12)`.
    #[inline]
    pub fn pitch(&self, semitones: f32) -> f32 {
        let limit = PITCH_RANGE as f32 - 1e-3;
        let x = semitones.clamp(-limit, limit);
        let whole = x.floor();
        let frac = (x - whole) * PITCH_FINE_STEPS as f32;
        let fi = (frac as usize).min(PITCH_FINE_STEPS - 1);
        let ft = frac - fi as f32;
        let fine = self.pitch_fine[fi] + (self.pitch_fine[fi + 1] - self.pitch_fine[fi]) * ft;
        self.pitch_coarse[(whole as i32 + PITCH_RANGE) as usize] * fine
    }

    /// Decibels to linear gain; zero at or below [`DB_MIN`].
    #[inline]
    pub fn db_to_linear(&self, db: f32) -> f32 {
        if db.is_nan() || db <= DB_MIN {
            return 0.0;
        }
        let pos = (db.min(DB_MAX) - DB_MIN) * DB_STEPS_PER_UNIT;
        let i = (pos as usize).min(self.db.len() - 2);
        let t = pos - i as f32;
        self.db[i] + (self.db[i + 1] - self.db[i]) * t
    }

    /// Fixed-point phase increment per block for a segment of `2^rate` seconds.
    #[inline]
    pub fn env_phase_increment(&self, rate: f32) -> u32 {
        if rate.is_nan() || rate <= ENV_RATE_MIN {
            return ENV_PHASE_MAX;
        }
        let pos = (rate.min(ENV_RATE_MAX) - ENV_RATE_MIN) * ENV_RATE_STEPS_PER_UNIT;
        let i = (pos as usize).min(self.env_rate.len() - 2);
        let t = (pos - i as f32) as f64;
        let inc = self.env_rate[i] + (self.env_rate[i + 1] - self.env_rate[i]) * t;
        inc.clamp(1.0, ENV_PHASE_MAX as f64) as u32
    }

    /// Table-interpolated [`curve_shape`].
    #[inline]
    pub fn curve(&self, amount: f32, x: f32) -> f32 {
        let a = (amount.clamp(-1.0, 1.0) + 1.0) * 0.5 * (CURVE_AMOUNTS - 1) as f32;
        let p = x.clamp(0.0, 1.0) * (CURVE_POINTS - 1) as f32;
        let ai = (a as usize).min(CURVE_AMOUNTS - 2);
        let pi = (p as usize).min(CURVE_POINTS - 2);
        let at = a - ai as f32;
        let pt = p - pi as f32;

        let row = |r: usize| {
            let base = r * CURVE_POINTS + pi;
            self.curve[base] + (self.curve[base + 1] - self.curve[base]) * pt
        };
        let lo = row(ai);
        let hi = row(ai + 1);
        lo + (hi - lo) * at
    }
}
