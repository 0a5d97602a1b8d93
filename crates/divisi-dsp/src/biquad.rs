//! Smoothed biquad filter, Transposed Direct Form II.
//!
//! Coefficients are computed from a normalized angular frequency
//! `omega = 2π·f/fs` and a Q, bandwidth or gain. Each of the five coefficients
//! then glides toward its new value through a one-pole [`Lag`], advanced once
//! per sample inside [`BiquadFilter::process_block`], so live cutoff and
//! resonance changes never step the output.
//!
//! State and arithmetic are `f64`; buffers are `f32`.

use divisi_core::Lag;
use std::f64::consts::{LN_2, PI};

/// Per-sample approach fraction of the coefficient smoothers.
pub const COEFF_SMOOTHING: f64 = 0.004;

const DENORMAL_FLOOR: f64 = 1e-24;
const MIN_OMEGA: f64 = 1e-5;
const MAX_OMEGA: f64 = PI * 0.999;

/// Normalized biquad coefficients (`a0 == 1`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoefficients {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl Default for BiquadCoefficients {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl BiquadCoefficients {
    /// Pass-through.
    pub const IDENTITY: Self = Self {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    /// Divide through by `a0`.
    pub fn from_raw(a0: f64, a1: f64, a2: f64, b0: f64, b1: f64, b2: f64) -> Self {
        let inv = 1.0 / a0;
        Self {
            b0: b0 * inv,
            b1: b1 * inv,
            b2: b2 * inv,
            a1: a1 * inv,
            a2: a2 * inv,
        }
    }

    fn prewarp(omega: f64, q: f64) -> (f64, f64) {
        let omega = omega.clamp(MIN_OMEGA, MAX_OMEGA);
        let alpha = omega.sin() / (2.0 * q.max(0.01));
        (omega.cos(), alpha)
    }

    /// Alpha for a bandwidth given in octaves.
    fn prewarp_bw(omega: f64, bandwidth: f64) -> (f64, f64) {
        let omega = omega.clamp(MIN_OMEGA, MAX_OMEGA);
        let sin = omega.sin();
        let alpha = sin * (LN_2 / 2.0 * bandwidth.max(0.01) * omega / sin).sinh();
        (omega.cos(), alpha)
    }

    fn lowpass_from(cos: f64, alpha: f64) -> Self {
        Self::from_raw(
            1.0 + alpha,
            -2.0 * cos,
            1.0 - alpha,
            (1.0 - cos) * 0.5,
            1.0 - cos,
            (1.0 - cos) * 0.5,
        )
    }

    fn highpass_from(cos: f64, alpha: f64) -> Self {
        Self::from_raw(
            1.0 + alpha,
            -2.0 * cos,
            1.0 - alpha,
            (1.0 + cos) * 0.5,
            -(1.0 + cos),
            (1.0 + cos) * 0.5,
        )
    }

    fn bandpass_from(cos: f64, alpha: f64) -> Self {
        Self::from_raw(1.0 + alpha, -2.0 * cos, 1.0 - alpha, alpha, 0.0, -alpha)
    }

    pub fn lowpass(omega: f64, q: f64) -> Self {
        let (cos, alpha) = Self::prewarp(omega, q);
        Self::lowpass_from(cos, alpha)
    }

    pub fn highpass(omega: f64, q: f64) -> Self {
        let (cos, alpha) = Self::prewarp(omega, q);
        Self::highpass_from(cos, alpha)
    }

    /// Constant 0 dB peak gain.
    pub fn bandpass(omega: f64, q: f64) -> Self {
        let (cos, alpha) = Self::prewarp(omega, q);
        Self::bandpass_from(cos, alpha)
    }

    pub fn notch(omega: f64, q: f64) -> Self {
        let (cos, alpha) = Self::prewarp(omega, q);
        Self::from_raw(1.0 + alpha, -2.0 * cos, 1.0 - alpha, 1.0, -2.0 * cos, 1.0)
    }

    pub fn allpass(omega: f64, q: f64) -> Self {
        let (cos, alpha) = Self::prewarp(omega, q);
        Self::from_raw(
            1.0 + alpha,
            -2.0 * cos,
            1.0 - alpha,
            1.0 - alpha,
            -2.0 * cos,
            1.0 + alpha,
        )
    }

    /// Lowpass with the -3 dB width given in octaves instead of Q.
    pub fn lowpass_bw(omega: f64, bandwidth: f64) -> Self {
        let (cos, alpha) = Self::prewarp_bw(omega, bandwidth);
        Self::lowpass_from(cos, alpha)
    }

    pub fn highpass_bw(omega: f64, bandwidth: f64) -> Self {
        let (cos, alpha) = Self::prewarp_bw(omega, bandwidth);
        Self::highpass_from(cos, alpha)
    }

    /// Continuous sweep lowpass (0.0) → bandpass (0.5) → highpass (1.0).
    ///
    /// The denominator is shared, only the numerator is crossfaded.
    pub fn lp_hp_morph(omega: f64, q: f64, morph: f64) -> Self {
        let (cos, alpha) = Self::prewarp(omega, q);
        let m = morph.clamp(0.0, 1.0);
        let (from, to, t) = if m < 0.5 {
            (
                Self::lowpass_from(cos, alpha),
                Self::bandpass_from(cos, alpha),
                m * 2.0,
            )
        } else {
            (
                Self::bandpass_from(cos, alpha),
                Self::highpass_from(cos, alpha),
                m * 2.0 - 1.0,
            )
        };
        Self {
            b0: from.b0 + (to.b0 - from.b0) * t,
            b1: from.b1 + (to.b1 - from.b1) * t,
            b2: from.b2 + (to.b2 - from.b2) * t,
            a1: from.a1,
            a2: from.a2,
        }
    }

    pub fn low_shelf(omega: f64, q: f64, gain_db: f64) -> Self {
        let (cos, alpha) = Self::prewarp(omega, q);
        let a = 10f64.powf(gain_db / 40.0);
        let k = 2.0 * a.sqrt() * alpha;
        Self::from_raw(
            (a + 1.0) + (a - 1.0) * cos + k,
            -2.0 * ((a - 1.0) + (a + 1.0) * cos),
            (a + 1.0) + (a - 1.0) * cos - k,
            a * ((a + 1.0) - (a - 1.0) * cos + k),
            2.0 * a * ((a - 1.0) - (a + 1.0) * cos),
            a * ((a + 1.0) - (a - 1.0) * cos - k),
        )
    }

    pub fn high_shelf(omega: f64, q: f64, gain_db: f64) -> Self {
        let (cos, alpha) = Self::prewarp(omega, q);
        let a = 10f64.powf(gain_db / 40.0);
        let k = 2.0 * a.sqrt() * alpha;
        Self::from_raw(
            (a + 1.0) - (a - 1.0) * cos + k,
            2.0 * ((a - 1.0) - (a + 1.0) * cos),
            (a + 1.0) - (a - 1.0) * cos - k,
            a * ((a + 1.0) + (a - 1.0) * cos + k),
            -2.0 * a * ((a - 1.0) + (a + 1.0) * cos),
            a * ((a + 1.0) + (a - 1.0) * cos - k),
        )
    }

    /// Peaking EQ with Orfanidis' Nyquist-matched design.
    ///
    /// Unity gain at DC, `gain_db` at `omega`, band edges at half the gain in
    /// dB, and a Nyquist gain matching the analog prototype so the bell does
    /// not cramp near fs/2.
    pub fn peak_eq(omega: f64, bandwidth: f64, gain_db: f64) -> Self {
        let g = 10f64.powf(gain_db / 20.0);
        if (g - 1.0).abs() < 1e-6 {
            return Self::IDENTITY;
        }
        let w0 = omega.clamp(MIN_OMEGA, MAX_OMEGA);
        let g0 = 1.0;
        let gb = g.sqrt();
        let half = 2f64.powf(bandwidth.max(0.01) * 0.5);
        let dw = (w0 * (half - 1.0 / half)).clamp(MIN_OMEGA, MAX_OMEGA);

        let pi2 = PI * PI;
        let f = (g * g - gb * gb).abs();
        let g00 = (g * g - g0 * g0).abs();
        let f00 = (gb * gb - g0 * g0).abs();
        let edge = (w0 * w0 - pi2) * (w0 * w0 - pi2);
        let num = g0 * g0 * edge + g * g * f00 * pi2 * dw * dw / f;
        let den = edge + f00 * pi2 * dw * dw / f;
        let g1 = (num / den).sqrt();

        let g01 = (g * g - g0 * g1).abs();
        let g11 = (g * g - g1 * g1).abs();
        let f01 = (gb * gb - g0 * g1).abs();
        let f11 = (gb * gb - g1 * g1).abs().max(1e-12);
        let tan_w0 = (w0 * 0.5).tan();
        let w2 = (g11 / g00).sqrt() * tan_w0 * tan_w0;
        let dww = (1.0 + (f00 / f11).sqrt() * w2) * (dw * 0.5).tan();
        let c = f11 * dww * dww - 2.0 * w2 * (f01 - (f00 * f11).sqrt());
        let d = 2.0 * w2 * (g01 - (g00 * g11).sqrt());
        let a = ((c + d) / f).max(0.0).sqrt();
        let b = ((g * g * c + gb * gb * d) / f).max(0.0).sqrt();

        Self::from_raw(
            1.0 + w2 + a,
            -2.0 * (1.0 - w2),
            1.0 + w2 - a,
            g1 + g0 * w2 + b,
            -2.0 * (g1 - g0 * w2),
            g1 - b + g0 * w2,
        )
    }

    /// Magnitude response at `omega`.
    pub fn magnitude_at(&self, omega: f64) -> f64 {
        let (c1, s1) = (omega.cos(), omega.sin());
        let (c2, s2) = ((2.0 * omega).cos(), (2.0 * omega).sin());
        let nr = self.b0 + self.b1 * c1 + self.b2 * c2;
        let ni = self.b1 * s1 + self.b2 * s2;
        let dr = 1.0 + self.a1 * c1 + self.a2 * c2;
        let di = self.a1 * s1 + self.a2 * s2;
        ((nr * nr + ni * ni) / (dr * dr + di * di)).sqrt()
    }

    /// Poles inside the unit circle.
    pub fn is_stable(&self) -> bool {
        self.a2.abs() < 1.0 && self.a1.abs() < 1.0 + self.a2
    }
}

/// Stereo biquad with per-coefficient smoothing.
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    b0: Lag,
    b1: Lag,
    b2: Lag,
    a1: Lag,
    a2: Lag,
    /// `[channel][s1, s2]`
    state: [[f64; 2]; 2],
}

impl Default for BiquadFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl BiquadFilter {
    pub fn new() -> Self {
        Self {
            b0: Lag::new(COEFF_SMOOTHING),
            b1: Lag::new(COEFF_SMOOTHING),
            b2: Lag::new(COEFF_SMOOTHING),
            a1: Lag::new(COEFF_SMOOTHING),
            a2: Lag::new(COEFF_SMOOTHING),
            state: [[0.0; 2]; 2],
        }
    }

    /// Set new target coefficients. The first call after [`suspend`](Self::suspend) is instant.
    #[inline]
    pub fn set_coefficients(&mut self, c: BiquadCoefficients) {
        self.b0.set_target(c.b0);
        self.b1.set_target(c.b1);
        self.b2.set_target(c.b2);
        self.a1.set_target(c.a1);
        self.a2.set_target(c.a2);
    }

    pub fn coeff_lp(&mut self, omega: f64, q: f64) {
        self.set_coefficients(BiquadCoefficients::lowpass(omega, q));
    }

    pub fn coeff_hp(&mut self, omega: f64, q: f64) {
        self.set_coefficients(BiquadCoefficients::highpass(omega, q));
    }

    pub fn coeff_bp(&mut self, omega: f64, q: f64) {
        self.set_coefficients(BiquadCoefficients::bandpass(omega, q));
    }

    pub fn coeff_notch(&mut self, omega: f64, q: f64) {
        self.set_coefficients(BiquadCoefficients::notch(omega, q));
    }

    pub fn coeff_apf(&mut self, omega: f64, q: f64) {
        self.set_coefficients(BiquadCoefficients::allpass(omega, q));
    }

    pub fn coeff_lp_bw(&mut self, omega: f64, bandwidth: f64) {
        self.set_coefficients(BiquadCoefficients::lowpass_bw(omega, bandwidth));
    }

    pub fn coeff_hp_bw(&mut self, omega: f64, bandwidth: f64) {
        self.set_coefficients(BiquadCoefficients::highpass_bw(omega, bandwidth));
    }

    pub fn coeff_lp_hp_morph(&mut self, omega: f64, q: f64, morph: f64) {
        self.set_coefficients(BiquadCoefficients::lp_hp_morph(omega, q, morph));
    }

    pub fn coeff_low_shelf(&mut self, omega: f64, q: f64, gain_db: f64) {
        self.set_coefficients(BiquadCoefficients::low_shelf(omega, q, gain_db));
    }

    pub fn coeff_high_shelf(&mut self, omega: f64, q: f64, gain_db: f64) {
        self.set_coefficients(BiquadCoefficients::high_shelf(omega, q, gain_db));
    }

    pub fn coeff_peak_eq(&mut self, omega: f64, bandwidth: f64, gain_db: f64) {
        self.set_coefficients(BiquadCoefficients::peak_eq(omega, bandwidth, gain_db));
    }

    /// Jump all coefficients to their targets.
    pub fn coeff_instantize(&mut self) {
        self.b0.instantize();
        self.b1.instantize();
        self.b2.instantize();
        self.a1.instantize();
        self.a2.instantize();
    }

    /// Clear filter memory and re-arm instant coefficient assignment.
    ///
    /// Outputs silence until coefficients are set again.
    pub fn suspend(&mut self) {
        self.state = [[0.0; 2]; 2];
        self.b0.reset();
        self.b1.reset();
        self.b2.reset();
        self.a1.reset();
        self.a2.reset();
    }

    /// Coefficients currently in effect.
    pub fn current(&self) -> BiquadCoefficients {
        BiquadCoefficients {
            b0: self.b0.value(),
            b1: self.b1.value(),
            b2: self.b2.value(),
            a1: self.a1.value(),
            a2: self.a2.value(),
        }
    }

    /// Coefficients being approached.
    pub fn target(&self) -> BiquadCoefficients {
        BiquadCoefficients {
            b0: self.b0.target(),
            b1: self.b1.target(),
            b2: self.b2.target(),
            a1: self.a1.target(),
            a2: self.a2.target(),
        }
    }

    pub fn is_silent(&self) -> bool {
        self.state.iter().flatten().all(|s| *s == 0.0)
    }

    /// Filter one channel in place.
    pub fn process_block(&mut self, data: &mut [f32]) {
        let [s1, s2] = &mut self.state[0];
        for sample in data.iter_mut() {
            let b0 = self.b0.process();
            let b1 = self.b1.process();
            let b2 = self.b2.process();
            let a1 = self.a1.process();
            let a2 = self.a2.process();

            let x = *sample as f64;
            let y = b0 * x + *s1;
            *s1 = b1 * x - a1 * y + *s2;
            *s2 = b2 * x - a2 * y;
            *sample = y as f32;
        }
        self.flush_denormals();
    }

    /// Filter a stereo pair in place. Both channels share the coefficient ramp.
    pub fn process_block_stereo(&mut self, left: &mut [f32], right: &mut [f32]) {
        let [[l1, l2], [r1, r2]] = &mut self.state;
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let b0 = self.b0.process();
            let b1 = self.b1.process();
            let b2 = self.b2.process();
            let a1 = self.a1.process();
            let a2 = self.a2.process();

            let xl = *l as f64;
            let yl = b0 * xl + *l1;
            *l1 = b1 * xl - a1 * yl + *l2;
            *l2 = b2 * xl - a2 * yl;
            *l = yl as f32;

            let xr = *r as f64;
            let yr = b0 * xr + *r1;
            *r1 = b1 * xr - a1 * yr + *r2;
            *r2 = b2 * xr - a2 * yr;
            *r = yr as f32;
        }
        self.flush_denormals();
    }

    fn flush_denormals(&mut self) {
        for s in self.state.iter_mut().flatten() {
            if s.abs() < DENORMAL_FLOOR || !s.is_finite() {
                *s = 0.0;
            }
        }
    }
}

/// Angular frequency for `hz` at `sample_rate`, limited below Nyquist.
#[inline]
pub fn omega_from_hz(hz: f64, sample_rate: f64) -> f64 {
    (2.0 * PI * hz / sample_rate).clamp(MIN_OMEGA, MAX_OMEGA)
}

/// Angular frequency for a MIDI note number (69 = 440 Hz).
#[inline]
pub fn omega_from_note(note: f64, sample_rate: f64) -> f64 {
    omega_from_hz(440.0 * ((note - 69.0) / 12.0).exp2(), sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const SR: f64 = 48000.0;

    fn db(x: f64) -> f64 {
        20.0 * x.log10()
    }

    #[test]
    fn test_lowpass_response() {
        let c = BiquadCoefficients::lowpass(omega_from_hz(1000.0, SR), 0.707);
        assert_relative_eq!(c.magnitude_at(0.0), 1.0, epsilon = 1e-9);
        assert!(c.magnitude_at(PI * 0.99) < 1e-3);
        assert!((db(c.magnitude_at(omega_from_hz(1000.0, SR))) + 3.0).abs() < 0.1);
        assert!(c.is_stable());
    }

    #[test]
    fn test_highpass_blocks_dc() {
        let c = BiquadCoefficients::highpass(omega_from_hz(200.0, SR), 0.707);
        assert!(c.magnitude_at(0.0) < 1e-9);
        assert_relative_eq!(c.magnitude_at(PI), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_notch_and_allpass() {
        let w = omega_from_hz(3000.0, SR);
        let notch = BiquadCoefficients::notch(w, 2.0);
        assert!(notch.magnitude_at(w) < 1e-6);

        let ap = BiquadCoefficients::allpass(w, 2.0);
        for f in [50.0, 500.0, 3000.0, 15000.0] {
            assert_relative_eq!(ap.magnitude_at(omega_from_hz(f, SR)), 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_bandpass_peak_is_unity() {
        let w = omega_from_hz(2000.0, SR);
        let bp = BiquadCoefficients::bandpass(w, 4.0);
        assert_relative_eq!(bp.magnitude_at(w), 1.0, epsilon = 1e-6);
        assert!(bp.magnitude_at(0.0) < 1e-9);
    }

    #[test]
    fn test_bandwidth_variants_match_q_forms() {
        let w = omega_from_hz(1000.0, SR);
        let lp = BiquadCoefficients::lowpass_bw(w, 1.0);
        assert_relative_eq!(lp.magnitude_at(0.0), 1.0, epsilon = 1e-9);
        let hp = BiquadCoefficients::highpass_bw(w, 1.0);
        assert!(hp.magnitude_at(0.0) < 1e-9);
    }

    #[test]
    fn test_morph_endpoints() {
        let w = omega_from_hz(1000.0, SR);
        assert_eq!(
            BiquadCoefficients::lp_hp_morph(w, 0.707, 0.0),
            BiquadCoefficients::lowpass(w, 0.707)
        );
        let hp = BiquadCoefficients::lp_hp_morph(w, 0.707, 1.0);
        let expected = BiquadCoefficients::highpass(w, 0.707);
        assert_relative_eq!(hp.b0, expected.b0, epsilon = 1e-12);
        assert_relative_eq!(hp.b1, expected.b1, epsilon = 1e-12);
        assert_relative_eq!(hp.b2, expected.b2, epsilon = 1e-12);
    }

    #[test]
    fn test_shelves() {
        let w = omega_from_hz(500.0, SR);
        let low = BiquadCoefficients::low_shelf(w, 0.707, 6.0);
        assert!((db(low.magnitude_at(0.0)) - 6.0).abs() < 0.05);
        assert!(db(low.magnitude_at(PI * 0.9)).abs() < 0.2);

        let high = BiquadCoefficients::high_shelf(w, 0.707, -6.0);
        assert!((db(high.magnitude_at(PI)) + 6.0).abs() < 0.05);
        assert!(db(high.magnitude_at(0.0)).abs() < 0.05);
    }

    #[test]
    fn test_peak_eq_matches_gain_at_center() {
        let w = omega_from_hz(1000.0, SR);
        for gain in [-12.0, -3.0, 6.0, 12.0] {
            let c = BiquadCoefficients::peak_eq(w, 1.0, gain);
            assert!(c.is_stable());
            assert_relative_eq!(c.magnitude_at(0.0), 1.0, epsilon = 1e-6);
            let center = db(c.magnitude_at(w));
            assert!(
                (center - gain).abs() < 1.0,
                "gain {} dB produced {} dB at center",
                gain,
                center
            );
        }
        assert_eq!(
            BiquadCoefficients::peak_eq(w, 1.0, 0.0),
            BiquadCoefficients::IDENTITY
        );
    }

    #[test]
    fn test_stable_across_sweep() {
        for i in 1..60 {
            let w = PI * i as f64 / 60.0;
            for q in [0.5, 0.707, 4.0, 20.0] {
                assert!(BiquadCoefficients::lowpass(w, q).is_stable());
                assert!(BiquadCoefficients::highpass(w, q).is_stable());
                assert!(BiquadCoefficients::lp_hp_morph(w, q, 0.3).is_stable());
            }
        }
    }

    #[test]
    fn test_first_assignment_is_instant() {
        let mut filter = BiquadFilter::new();
        filter.coeff_lp(0.1, 0.707);
        assert_eq!(filter.current(), filter.target());

        filter.coeff_lp(0.3, 0.707);
        assert_ne!(filter.current(), filter.target());
        filter.coeff_instantize();
        assert_eq!(filter.current(), filter.target());
    }

    #[test]
    fn test_coefficients_glide_toward_target() {
        let mut filter = BiquadFilter::new();
        filter.coeff_lp(0.05, 0.707);
        filter.coeff_lp(0.2, 0.707);
        let mut buffer = vec![0.0f32; 8192];
        filter.process_block(&mut buffer);
        let current = filter.current();
        let target = filter.target();
        assert_relative_eq!(current.a1, target.a1, epsilon = 1e-9);
        assert_relative_eq!(current.b0, target.b0, epsilon = 1e-9);
    }

    #[test]
    fn test_cutoff_jump_does_not_click() {
        let mut filter = BiquadFilter::new();
        filter.coeff_lp(0.05, 0.707);
        let mut warmup = vec![0.5f32; 4096];
        filter.process_block(&mut warmup);

        filter.coeff_lp(0.2, 0.707);
        let mut block = vec![0.5f32; 2048];
        filter.process_block(&mut block);
        let mut prev = warmup[4095];
        for sample in block {
            assert!((sample - prev).abs() < 0.01, "step {} -> {}", prev, sample);
            prev = sample;
        }
    }

    #[test]
    fn test_suspend_clears_state() {
        let mut filter = BiquadFilter::new();
        filter.coeff_lp(0.1, 4.0);
        let mut impulse = vec![0.0f32; 64];
        impulse[0] = 1.0;
        filter.process_block(&mut impulse);
        assert!(!filter.is_silent());

        filter.suspend();
        assert!(filter.is_silent());
        filter.coeff_lp(0.1, 4.0);
        let mut silence = vec![0.0f32; 64];
        filter.process_block(&mut silence);
        assert!(silence.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_denormals_flushed() {
        let mut filter = BiquadFilter::new();
        filter.coeff_lp(0.1, 0.707);
        let mut tiny = vec![1e-30f32; 16];
        filter.process_block(&mut tiny);
        assert!(filter.is_silent());
    }

    #[test]
    fn test_stereo_channels_independent() {
        let mut filter = BiquadFilter::new();
        filter.coeff_lp(0.2, 0.707);
        let mut left = vec![1.0f32; 128];
        let mut right = vec![0.0f32; 128];
        filter.process_block_stereo(&mut left, &mut right);
        assert!(left[127] > 0.9);
        assert!(right.iter().all(|s| *s == 0.0));
    }
}
