//! Test helpers and fixtures for divisi integration tests
//!
//! The engine is driven by hand, one `process_block` at a time, so every
//! test is deterministic and needs no audio device.
//!
//! ## Tolerance Levels
//!
//! Use the appropriate tolerance from [`tolerances`] module:
//! - `FLOAT_EPSILON` (1e-6): Exact operations
//! - `DSP_EPSILON` (1e-4): Interpolated playback
//! - `GAIN_RATIO_EPSILON` (0.05): Level ratios through the dB table
//! - `SILENCE_THRESHOLD` (0.0001): Silence detection (-80dB)

#![allow(dead_code)]

pub mod tolerances;

use divisi::prelude::*;

/// Default test sample rate (matches common hardware)
pub const TEST_SAMPLE_RATE: f64 = 48000.0;

/// Block size used by every test engine.
pub const TEST_BLOCK_SIZE: usize = 64;

pub fn test_builder() -> SamplerBuilder {
    SamplerBuilder::new()
        .sample_rate(TEST_SAMPLE_RATE)
        .block_size(TEST_BLOCK_SIZE)
}

/// Create a sampler with the test sample rate and block size.
pub fn test_sampler() -> (SamplerHandle, Engine) {
    test_builder().build().expect("Failed to create test sampler")
}

/// Route `tracing` output to the test harness. Safe to call more than once.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Constant-level mono sample.
pub fn dc_sample(level: f32, frames: usize) -> Sample {
    Sample::mono(vec![level; frames], TEST_SAMPLE_RATE).expect("Invalid test sample")
}

/// Generate a test signal: sine wave at given frequency for specified samples.
pub fn generate_sine(frequency: f64, sample_rate: f64, num_samples: usize) -> Vec<f32> {
    (0..num_samples)
        .map(|i| {
            let t = i as f64 / sample_rate;
            (2.0 * std::f64::consts::PI * frequency * t).sin() as f32
        })
        .collect()
}

/// One second of a 440 Hz sine, played in a loop.
pub fn looping_sine_zone(sampler: &mut SamplerHandle, part: u8) -> (SampleId, ZoneId) {
    let data = generate_sine(440.0, TEST_SAMPLE_RATE, TEST_SAMPLE_RATE as usize);
    let sample = sampler
        .load_sample(Sample::mono(data, TEST_SAMPLE_RATE).expect("Invalid sine"))
        .expect("Failed to load sample");
    let zone = sampler
        .add_zone(
            Zone::new(part)
                .with_sample(sample)
                .with_play_mode(PlayMode::Loop),
        )
        .expect("Failed to add zone");
    (sample, zone)
}

/// Render `blocks` blocks and collect the main stereo output.
pub fn render_blocks(engine: &mut Engine, blocks: usize) -> (Vec<f32>, Vec<f32>) {
    let mut left = Vec::with_capacity(blocks * TEST_BLOCK_SIZE);
    let mut right = Vec::with_capacity(blocks * TEST_BLOCK_SIZE);
    for _ in 0..blocks {
        let out = engine.process_block();
        left.extend_from_slice(out.left());
        right.extend_from_slice(out.right());
    }
    (left, right)
}

/// Process blocks until no voice is active. Returns the number of blocks it took.
pub fn render_until_idle(engine: &mut Engine, max_blocks: usize) -> Option<usize> {
    (1..=max_blocks).find(|_| {
        engine.process_block();
        engine.active_voices() == 0
    })
}

/// Calculate RMS of a signal.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Calculate peak amplitude of a signal.
pub fn peak(samples: &[f32]) -> f32 {
    samples
        .iter()
        .map(|s| s.abs())
        .fold(0.0_f32, |a, b| a.max(b))
}

/// Assert that a signal is approximately silent (all values near zero).
pub fn assert_silence(samples: &[f32], tolerance: f32) {
    let max = peak(samples);
    assert!(
        max <= tolerance,
        "Expected silence, but peak amplitude was {}",
        max
    );
}

/// Assert that a signal has content (not silent).
pub fn assert_has_audio(samples: &[f32], min_rms: f32) {
    let r = rms(samples);
    assert!(
        r >= min_rms,
        "Expected audio content with RMS >= {}, but RMS was {}",
        min_rms,
        r
    );
}
