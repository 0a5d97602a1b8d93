//! Voice allocation: engine and part caps, stealing, arena bounds.

mod helpers;

use divisi::prelude::*;
use helpers::*;
use proptest::prelude::*;

fn keys_where(engine: &Engine, keep: impl Fn(&divisi::synth::Voice) -> bool) -> Vec<u8> {
    let mut keys: Vec<u8> = engine
        .voices()
        .filter(|(_, v)| keep(v))
        .map(|(_, v)| v.key())
        .collect();
    keys.sort_unstable();
    keys
}

fn playing_keys(engine: &Engine) -> Vec<u8> {
    keys_where(engine, |v| v.is_playing())
}

fn gated_keys(engine: &Engine) -> Vec<u8> {
    keys_where(engine, |v| v.is_gated())
}

#[test]
fn test_oldest_voice_is_stolen() {
    let (mut sampler, mut engine) = test_builder().max_voices(3).build().unwrap();
    looping_sine_zone(&mut sampler, 0);
    engine.process_block();

    for key in [60, 62, 64, 65] {
        engine.note_on(0, key, 100, 0.0);
    }
    assert_eq!(playing_keys(&engine), vec![62, 64, 65]);
    assert_eq!(engine.playing_voices(), 3);

    // The stolen voice fades out and gives its slot back.
    render_blocks(&mut engine, 50);
    assert_eq!(engine.active_voices(), 3);
}

#[test]
fn test_no_steal_policy_keeps_old_notes() {
    let (mut sampler, mut engine) = test_builder()
        .max_voices(2)
        .steal_policy(StealPolicy::None)
        .build()
        .unwrap();
    looping_sine_zone(&mut sampler, 0);
    engine.process_block();
    sampler.poll_notifications();

    for key in [60, 62, 64] {
        engine.note_on(0, key, 100, 0.0);
    }
    assert_eq!(playing_keys(&engine), vec![60, 62]);

    engine.process_block();
    let notes = sampler.poll_notifications();
    assert!(notes.contains(&Notification::LimitReached {
        kind: LimitKind::Voices,
        part: 0
    }));
}

#[test]
fn test_part_cap_steals_within_part() {
    let (mut sampler, mut engine) = test_sampler();
    looping_sine_zone(&mut sampler, 0);
    looping_sine_zone(&mut sampler, 1);
    sampler
        .set_part(
            1,
            PartConfig {
                polyphony: 2,
                ..PartConfig::for_part(1)
            },
        )
        .unwrap();
    engine.process_block();

    engine.note_on(0, 40, 100, 0.0);
    engine.note_on(1, 60, 100, 0.0);
    engine.note_on(1, 62, 100, 0.0);
    engine.note_on(1, 64, 100, 0.0);
    assert_eq!(playing_keys(&engine), vec![40, 62, 64]);
}

#[test]
fn test_mono_part_plays_one_note() {
    let (mut sampler, mut engine) = test_sampler();
    looping_sine_zone(&mut sampler, 0);
    sampler
        .set_part(
            0,
            PartConfig {
                poly_mode: PolyMode::Mono,
                ..PartConfig::for_part(0)
            },
        )
        .unwrap();
    engine.process_block();

    engine.note_on(0, 60, 100, 0.0);
    engine.note_on(0, 67, 100, 0.0);
    assert_eq!(gated_keys(&engine), vec![67]);

    engine.note_off(0, 67, 0);
    assert_eq!(gated_keys(&engine), vec![60]);
}

#[test]
fn test_all_sound_off_frees_every_slot() {
    let (mut sampler, mut engine) = test_sampler();
    looping_sine_zone(&mut sampler, 0);
    engine.process_block();
    for key in 40..60 {
        engine.note_on(0, key, 100, 0.0);
    }
    assert_eq!(engine.active_voices(), 20);

    sampler.all_sound_off().unwrap();
    let (left, _) = render_blocks(&mut engine, 1);
    assert_eq!(engine.active_voices(), 0);
    assert_silence(&left, helpers::tolerances::SILENCE_THRESHOLD);
}

#[derive(Debug, Clone)]
enum Event {
    On(u8, u8),
    Off(u8, u8),
    Block,
}

fn event() -> impl Strategy<Value = Event> {
    prop_oneof![
        (0u8..3, 36u8..48).prop_map(|(part, key)| Event::On(part, key)),
        (0u8..3, 36u8..48).prop_map(|(part, key)| Event::Off(part, key)),
        Just(Event::Block),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_voice_counts_stay_bounded(
        max_voices in 1usize..8,
        events in prop::collection::vec(event(), 1..200),
    ) {
        let (mut sampler, mut engine) = test_builder().max_voices(max_voices).build().unwrap();
        for part in 0..3 {
            looping_sine_zone(&mut sampler, part);
        }
        let arena = engine.config().voice_arena_size();
        engine.process_block();

        for event in events {
            match event {
                Event::On(part, key) => engine.note_on(part, key, 100, 0.0),
                Event::Off(part, key) => engine.note_off(part, key, 0),
                Event::Block => {
                    engine.process_block();
                }
            }
            prop_assert!(engine.playing_voices() <= max_voices);
            prop_assert!(engine.active_voices() <= arena);
        }
    }
}
