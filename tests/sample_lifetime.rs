//! Sample lifetime across the thread boundary
//!
//! Zones hold counted references to samples. A sample can only be dropped
//! once no zone uses it, and sample memory is released on the control thread
//! after the engine has stopped every voice reading it.

mod helpers;

use divisi::prelude::*;
use divisi::synth::Error as SynthError;
use helpers::*;

#[test]
fn test_sample_in_use_cannot_be_removed() {
    let (mut sampler, mut engine) = test_sampler();
    let sample = sampler.load_sample(dc_sample(0.5, 4096)).unwrap();
    let zone = sampler.add_zone(Zone::new(0).with_sample(sample)).unwrap();
    engine.process_block();

    assert!(matches!(
        sampler.remove_sample(sample),
        Err(Error::Synth(SynthError::SampleInUse { zones: 1, .. }))
    ));

    sampler.remove_zone(zone).unwrap();
    // Still referenced until the engine hands the zone back.
    assert_eq!(sampler.sample_refcount(sample), 1);
    engine.process_block();
    let notes = sampler.poll_notifications();
    assert!(notes
        .iter()
        .any(|n| matches!(n, Notification::ZoneRemoved { zone: z, .. } if *z == zone)));

    assert_eq!(sampler.sample_refcount(sample), 0);
    assert!(!sampler.has_sample(sample));
    assert!(matches!(
        sampler.remove_sample(sample),
        Err(Error::Synth(SynthError::UnknownSample(_)))
    ));
}

#[test]
fn test_unbound_sample_can_be_removed() {
    let (mut sampler, _engine) = test_sampler();
    let sample = sampler.load_sample(dc_sample(0.5, 64)).unwrap();
    sampler.remove_sample(sample).unwrap();
    assert!(!sampler.has_sample(sample));
}

#[test]
fn test_removing_zone_stops_its_voices() {
    let (mut sampler, mut engine) = test_sampler();
    let (_, zone) = looping_sine_zone(&mut sampler, 0);
    engine.process_block();
    engine.note_on(0, 60, 100, 0.0);
    engine.note_on(0, 64, 100, 0.0);
    render_blocks(&mut engine, 2);
    assert_eq!(engine.active_voices(), 2);

    sampler.remove_zone(zone).unwrap();
    let (left, _) = render_blocks(&mut engine, 1);
    assert_eq!(engine.active_voices(), 0);
    assert!(engine.zone(zone).is_none());
    assert_silence(&left, helpers::tolerances::SILENCE_THRESHOLD);
}

#[test]
fn test_replacing_sample_moves_reference() {
    let (mut sampler, mut engine) = test_sampler();
    let first = sampler.load_sample(dc_sample(0.5, 4096)).unwrap();
    let second = sampler.load_sample(dc_sample(0.25, 4096)).unwrap();
    let zone = sampler.add_zone(Zone::new(0).with_sample(first)).unwrap();
    engine.process_block();
    engine.note_on(0, 60, 100, 0.0);

    sampler.set_zone_sample(zone, Some(second)).unwrap();
    assert_eq!(sampler.sample_refcount(first), 1);
    assert_eq!(sampler.sample_refcount(second), 1);

    engine.process_block();
    assert_eq!(engine.active_voices(), 0);
    let notes = sampler.poll_notifications();
    assert!(notes.iter().any(|n| matches!(
        n,
        Notification::ZoneSampleReplaced { old, new, .. }
            if *old == Some(first) && *new == Some(second)
    )));

    // The old sample is freed once its last zone lets go.
    assert!(!sampler.has_sample(first));
    assert_eq!(sampler.sample_refcount(second), 1);
    assert_eq!(sampler.zone(zone).unwrap().sample, Some(second));
}

#[test]
fn test_shared_sample_survives_one_zone_removal() {
    let (mut sampler, mut engine) = test_sampler();
    let sample = sampler.load_sample(dc_sample(0.5, 4096)).unwrap();
    let a = sampler.add_zone(Zone::new(0).with_sample(sample)).unwrap();
    let b = sampler.add_zone(Zone::new(1).with_sample(sample)).unwrap();
    engine.process_block();
    assert_eq!(sampler.sample_refcount(sample), 2);

    sampler.remove_zone(a).unwrap();
    engine.process_block();
    sampler.poll_notifications();
    assert_eq!(sampler.sample_refcount(sample), 1);
    assert!(sampler.has_sample(sample));

    engine.note_on(1, 60, 100, 0.0);
    let (left, _) = render_blocks(&mut engine, 4);
    assert_has_audio(&left, 0.05);
    assert_eq!(engine.voices().next().map(|(_, v)| v.zone()), Some(b));
}

#[test]
fn test_sample_table_limit() {
    let (mut sampler, _engine) = test_builder().max_samples(2).build().unwrap();
    sampler.load_sample(dc_sample(0.5, 64)).unwrap();
    sampler.load_sample(dc_sample(0.5, 64)).unwrap();
    assert!(matches!(
        sampler.load_sample(dc_sample(0.5, 64)),
        Err(Error::Synth(SynthError::SampleLimitReached { max: 2 }))
    ));
}
