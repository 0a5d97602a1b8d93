//! Parameter smoothers for click-free modulation.
//!
//! - [`Lag`]: one-pole exponential approach toward a target, advanced per sample.
//!   Used for filter coefficients.
//! - [`Lipol`]: linear interpolation from the previous target to the new one
//!   across exactly one block. Used for control-rate values (gain, pan,
//!   pitch) that are updated once per block and applied per sample.
//!
//! # Example
//!
//! ```
//! use divisi_core::Lipol;
//!
//! let mut gain = Lipol::new(32);
//! gain.set_target(1.0); // first target is taken immediately
//! gain.set_target(0.5);
//!
//! let mut block = [1.0f32; 32];
//! gain.multiply_block(&mut block);
//! assert!(block[0] > block[31]);
//! ```

/// One-pole exponential smoother.
///
/// Each call to [`process`](Lag::process) moves the value `coeff` of the
/// remaining distance toward the target. The first target after construction
/// or [`reset`](Lag::reset) is taken immediately.
#[derive(Debug, Clone, Copy)]
pub struct Lag {
    value: f64,
    target: f64,
    coeff: f64,
    first_run: bool,
}

impl Lag {
    /// `coeff` is the per-sample approach fraction in (0, 1].
    pub fn new(coeff: f64) -> Self {
        Self {
            value: 0.0,
            target: 0.0,
            coeff: coeff.clamp(f64::EPSILON, 1.0),
            first_run: true,
        }
    }

    /// Approach coefficient for a time constant of `seconds`.
    pub fn coeff_for_time(seconds: f64, sample_rate: f64) -> f64 {
        if seconds <= 0.0 {
            return 1.0;
        }
        1.0 - (-1.0 / (seconds * sample_rate)).exp()
    }

    #[inline]
    pub fn set_target(&mut self, target: f64) {
        self.target = target;
        if self.first_run {
            self.value = target;
            self.first_run = false;
        }
    }

    /// Jump to the target.
    #[inline]
    pub fn instantize(&mut self) {
        self.value = self.target;
        self.first_run = false;
    }

    /// Forget the current value; the next target is applied immediately.
    #[inline]
    pub fn reset(&mut self) {
        self.value = 0.0;
        self.target = 0.0;
        self.first_run = true;
    }

    #[inline]
    pub fn process(&mut self) -> f64 {
        self.value += (self.target - self.value) * self.coeff;
        self.value
    }

    #[inline]
    pub fn value(&self) -> f64 {
        self.value
    }

    #[inline]
    pub fn target(&self) -> f64 {
        self.target
    }

    /// Largest change a single `process` call can make right now.
    #[inline]
    pub fn max_step(&self) -> f64 {
        (self.target - self.value).abs() * self.coeff
    }
}

impl Default for Lag {
    fn default() -> Self {
        Self::new(0.004)
    }
}

/// Linear block interpolator.
///
/// Call [`set_target`](Lipol::set_target) once per block, then read one value
/// per sample with [`next`](Lipol::next) (or use the block helpers). After
/// `block_size` reads the value sits exactly on the target.
#[derive(Debug, Clone, Copy)]
pub struct Lipol {
    value: f32,
    target: f32,
    delta: f32,
    block_size_inv: f32,
    first_run: bool,
}

impl Lipol {
    pub fn new(block_size: usize) -> Self {
        Self {
            value: 0.0,
            target: 0.0,
            delta: 0.0,
            block_size_inv: 1.0 / block_size.max(1) as f32,
            first_run: true,
        }
    }

    #[inline]
    pub fn set_target(&mut self, target: f32) {
        if self.first_run {
            self.value = target;
            self.target = target;
            self.delta = 0.0;
            self.first_run = false;
            return;
        }
        self.value = self.target;
        self.target = target;
        self.delta = (self.target - self.value) * self.block_size_inv;
    }

    #[inline]
    pub fn instantize(&mut self) {
        self.value = self.target;
        self.delta = 0.0;
    }

    #[inline]
    pub fn reset(&mut self) {
        self.value = 0.0;
        self.target = 0.0;
        self.delta = 0.0;
        self.first_run = true;
    }

    /// Current value, then advance one sample.
    #[inline]
    pub fn next(&mut self) -> f32 {
        let out = self.value;
        self.value += self.delta;
        out
    }

    #[inline]
    pub fn value(&self) -> f32 {
        self.value
    }

    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    /// Per-sample step of the current ramp.
    #[inline]
    pub fn delta(&self) -> f32 {
        self.delta
    }

    /// Multiply `buffer` by the ramp.
    #[inline]
    pub fn multiply_block(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample *= self.next();
        }
    }

    /// Write the ramp itself into `buffer`.
    #[inline]
    pub fn fill_block(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.next();
        }
    }

    /// `dst += src * ramp`.
    #[inline]
    pub fn mac_block(&mut self, src: &[f32], dst: &mut [f32]) {
        for (d, s) in dst.iter_mut().zip(src) {
            *d += *s * self.next();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    const EPSILON: f32 = 0.0001;

    #[test]
    fn test_lag_first_target_is_immediate() {
        let mut lag = Lag::new(0.01);
        lag.set_target(0.8);
        assert_eq!(lag.value(), 0.8);

        lag.set_target(0.0);
        let v = lag.process();
        assert!(v < 0.8 && v > 0.7);
    }

    #[test]
    fn test_lag_converges() {
        let mut lag = Lag::new(0.01);
        lag.set_target(0.0);
        lag.set_target(1.0);
        for _ in 0..5000 {
            lag.process();
        }
        assert_abs_diff_eq!(lag.value(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_lag_step_never_exceeds_coeff_fraction() {
        let mut lag = Lag::new(0.004);
        lag.set_target(0.0);
        lag.set_target(2.0);
        let mut prev = lag.value();
        for _ in 0..1000 {
            let bound = lag.max_step();
            let v = lag.process();
            assert!((v - prev).abs() <= bound + 1e-12);
            prev = v;
        }
    }

    #[test]
    fn test_lag_reset_rearms_first_run() {
        let mut lag = Lag::new(0.01);
        lag.set_target(1.0);
        lag.reset();
        lag.set_target(-3.0);
        assert_eq!(lag.value(), -3.0);
    }

    #[test]
    fn test_lag_time_coefficient() {
        let coeff = Lag::coeff_for_time(0.001, 48000.0);
        assert!(coeff > 0.0 && coeff < 1.0);
        assert_eq!(Lag::coeff_for_time(0.0, 48000.0), 1.0);
    }

    #[test]
    fn test_lipol_reaches_target_after_one_block() {
        let mut lipol = Lipol::new(16);
        lipol.set_target(0.0);
        lipol.set_target(1.0);
        let mut buffer = [0.0f32; 16];
        lipol.fill_block(&mut buffer);
        assert_abs_diff_eq!(buffer[0], 0.0, epsilon = EPSILON);
        assert_abs_diff_eq!(buffer[8], 0.5, epsilon = EPSILON);
        assert_abs_diff_eq!(lipol.value(), 1.0, epsilon = EPSILON);
    }

    #[test]
    fn test_lipol_blocks_are_continuous() {
        let mut lipol = Lipol::new(8);
        lipol.set_target(0.0);
        let mut last = 0.0f32;
        for target in [1.0, -1.0, 0.25, 0.25] {
            lipol.set_target(target);
            let mut block = [0.0f32; 8];
            lipol.fill_block(&mut block);
            assert!((block[0] - last).abs() <= 2.0 / 8.0 + EPSILON);
            last = block[7];
        }
    }

    #[test]
    fn test_lipol_multiply_and_mac() {
        let mut lipol = Lipol::new(4);
        lipol.set_target(0.5);
        let mut buffer = [2.0f32; 4];
        lipol.multiply_block(&mut buffer);
        for s in buffer {
            assert_abs_diff_eq!(s, 1.0, epsilon = EPSILON);
        }

        lipol.set_target(0.5);
        let mut dst = [1.0f32; 4];
        lipol.mac_block(&[1.0; 4], &mut dst);
        for s in dst {
            assert_abs_diff_eq!(s, 1.5, epsilon = EPSILON);
        }
    }

    #[test]
    fn test_lipol_instantize() {
        let mut lipol = Lipol::new(32);
        lipol.set_target(0.0);
        lipol.set_target(1.0);
        lipol.instantize();
        assert_eq!(lipol.next(), 1.0);
        assert_eq!(lipol.next(), 1.0);
    }

    proptest! {
        #[test]
        fn prop_lag_approaches_without_overshoot(
            start in -10.0f64..10.0,
            target in -10.0f64..10.0,
            coeff in 0.001f64..1.0,
        ) {
            let mut lag = Lag::new(coeff);
            lag.set_target(start);
            lag.set_target(target);
            let tolerance = 1e-9 * (1.0 + target.abs());
            let mut distance = (target - start).abs();
            for _ in 0..2000 {
                let v = lag.process();
                prop_assert!(v >= start.min(target) - tolerance);
                prop_assert!(v <= start.max(target) + tolerance);
                let now = (target - v).abs();
                prop_assert!(now <= distance + tolerance);
                distance = now;
            }
        }

        #[test]
        fn prop_lipol_ramps_stay_between_endpoints(
            block_exp in 2u32..8,
            targets in prop::collection::vec(-4.0f32..4.0, 1..12),
        ) {
            let block = 1usize << block_exp;
            let mut lipol = Lipol::new(block);
            lipol.set_target(0.0);
            let mut buffer = vec![0.0f32; block];
            let mut from = 0.0f32;
            for target in targets {
                lipol.set_target(target);
                lipol.fill_block(&mut buffer);
                for &v in &buffer {
                    prop_assert!(v >= from.min(target) - EPSILON);
                    prop_assert!(v <= from.max(target) + EPSILON);
                }
                prop_assert!((lipol.value() - target).abs() <= EPSILON);
                from = target;
            }
        }
    }
}
