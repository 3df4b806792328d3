use beatlane::audio::{Band, Detection, OnsetEvent};
use beatlane::game::{
    Difficulty, DifficultyProfile, EventSink, GameEvent, HoldRange, HoldRelease, Judgment, NoteId, NoteState, Session,
};
use beatlane::GameConfig;

fn config() -> GameConfig {
    GameConfig {
        seed: Some(11),
        ..GameConfig::default()
    }
}

fn profile(hold_chance: f64, hold_ms: f64) -> DifficultyProfile {
    let mut profile = Difficulty::Normal.profile();
    profile.hold_chance = hold_chance;
    profile.hold_range = HoldRange {
        min_ms: hold_ms,
        max_ms: hold_ms,
    };
    profile
}

fn tap_session() -> Session {
    Session::with_profile(&config(), profile(0.0, 0.0), EventSink::disabled())
}

fn hold_session() -> Session {
    Session::with_profile(&config(), profile(1.0, 800.0), EventSink::disabled())
}

fn bass_onset(session: &mut Session, time_ms: f64) -> NoteId {
    session.apply_detection(&Detection {
        onsets: vec![OnsetEvent {
            band: Band::Bass,
            energy: 50.0,
            average: 10.0,
            time_ms,
        }],
        pattern: None,
    });
    session.spawn_due(time_ms)[0]
}

fn age_until(session: &mut Session, from_ms: f64, to_ms: f64) {
    let mut t = from_ms;
    while t <= to_ms {
        session.age(t);
        t += 16.0;
    }
}

#[test]
fn test_bass_onset_spawns_two_seconds_ahead() {
    let mut session = tap_session();
    let id = bass_onset(&mut session, 0.0);
    let note = session.live_notes().get(id).expect("note");
    assert_eq!(note.lane, 0);
    assert!(!note.is_hold());
    assert_eq!(note.expected_hit_ms, 2000.0);
    assert_eq!(session.total_notes(), 1);
}

#[test]
fn test_great_hit_adds_500() {
    let mut session = tap_session();
    bass_onset(&mut session, 0.0);
    let judgment = session.on_key_down(0, 2090.0).unwrap();
    assert_eq!(judgment, Some(Judgment::Great));
    assert_eq!(session.score().score, 500);
    assert_eq!(session.tally().great, 1);
    assert!(session.live_notes().is_empty());
}

#[test]
fn test_five_ms_late_is_perfect() {
    let mut session = tap_session();
    bass_onset(&mut session, 0.0);
    assert_eq!(session.on_key_down(0, 2005.0).unwrap(), Some(Judgment::Perfect));
    assert_eq!(session.score().score, 1000);
}

#[test]
fn test_hold_to_tail_earns_bonus() {
    let mut session = hold_session();
    let id = bass_onset(&mut session, 0.0);
    assert_eq!(session.live_notes().get(id).and_then(|n| n.expected_end_ms), Some(2800.0));

    age_until(&mut session, 1000.0, 1989.0);
    assert_eq!(session.on_key_down(0, 1990.0).unwrap(), Some(Judgment::Perfect));
    assert_eq!(session.score().score, 1000);
    assert_eq!(session.tally().total(), 0);
    assert!(session.active_hold(0).is_some());

    age_until(&mut session, 1990.0, 2810.0);
    assert!(session.live_notes().is_empty());
    assert_eq!(session.score().score, 1500);
    assert_eq!(session.tally().perfect, 1);
    assert_eq!(session.score().combo, 1);

    // The tail already completed; the late release changes nothing.
    assert_eq!(session.on_key_up(0, 2810.0).unwrap(), None);
    assert_eq!(session.score().score, 1500);
}

#[test]
fn test_release_near_tail_completes() {
    let mut session = hold_session();
    bass_onset(&mut session, 0.0);
    session.on_key_down(0, 2000.0).unwrap();
    match session.on_key_up(0, 2750.0).unwrap() {
        Some(HoldRelease::Completed(resolution)) => {
            assert!(resolution.hold_completed);
            assert_eq!(resolution.judgment, Judgment::Perfect);
        }
        other => panic!("expected completion, got {other:?}"),
    }
    assert_eq!(session.score().score, 1500);
}

#[test]
fn test_early_release_fails_on_next_tick() {
    let mut session = hold_session();
    let id = bass_onset(&mut session, 0.0);
    session.on_key_down(0, 2000.0).unwrap();
    assert_eq!(session.score().combo, 1);

    assert_eq!(session.on_key_up(0, 2400.0).unwrap(), Some(HoldRelease::Early(id)));
    assert_eq!(session.live_notes().get(id).map(|n| n.state), Some(NoteState::HeadHit));
    assert_eq!(session.tally().miss, 0);

    let resolved = session.age(2416.0);
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].judgment, Judgment::Miss);
    assert_eq!(session.tally().miss, 1);
    assert_eq!(session.score().combo, 0);
    assert!(session.live_notes().is_empty());
}

#[test]
fn test_released_hold_can_be_regrabbed_inside_grace() {
    let mut session = hold_session();
    let id = bass_onset(&mut session, 0.0);
    session.on_key_down(0, 2000.0).unwrap();
    session.on_key_up(0, 2050.0).unwrap();
    assert_eq!(session.on_key_down(0, 2100.0).unwrap(), None);
    assert_eq!(session.live_notes().get(id).map(|n| n.state), Some(NoteState::Holding));

    age_until(&mut session, 2100.0, 2820.0);
    assert_eq!(session.tally().perfect, 1);
    assert_eq!(session.tally().miss, 0);
}

#[test]
fn test_pending_note_beats_released_hold() {
    let mut session = hold_session();
    let first = bass_onset(&mut session, 0.0);
    let second = bass_onset(&mut session, 150.0);
    session.on_key_down(0, 2000.0).unwrap();
    assert_eq!(session.on_key_up(0, 2050.0).unwrap(), Some(HoldRelease::Early(first)));

    // Still inside the first hold's grace period, but the second note is on time.
    assert_eq!(session.on_key_down(0, 2150.0).unwrap(), Some(Judgment::Perfect));
    assert_eq!(session.live_notes().get(second).map(|n| n.state), Some(NoteState::Holding));
    assert_eq!(session.live_notes().get(first).map(|n| n.state), Some(NoteState::HeadHit));
    assert_eq!(session.active_hold(0).map(|n| n.id), Some(second));
    assert_eq!(session.score().combo, 2);

    let failed = session.age(2216.0);
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].id, first);
    assert_eq!(session.tally().miss, 1);
}

#[test]
fn test_unplayed_tap_missed_exactly_once() {
    let mut session = tap_session();
    bass_onset(&mut session, 0.0);
    assert!(session.age(2180.0).is_empty());
    assert_eq!(session.age(2180.5).len(), 1);
    for t in [2181.0, 2500.0, 5000.0] {
        assert!(session.age(t).is_empty());
    }
    assert_eq!(session.tally().miss, 1);
    assert_eq!(session.tally().total(), session.total_notes());
}

#[test]
fn test_key_up_without_hold_is_noop() {
    let mut session = tap_session();
    bass_onset(&mut session, 0.0);
    let before = session.snapshot();
    assert_eq!(session.on_key_up(0, 1500.0).unwrap(), None);
    assert_eq!(session.on_key_up(3, 1500.0).unwrap(), None);
    assert_eq!(session.snapshot(), before);
    assert_eq!(session.live_notes().len(), 1);
}

#[test]
fn test_press_without_candidate_is_silent() {
    let mut session = tap_session();
    bass_onset(&mut session, 0.0);
    session.on_key_down(0, 2000.0).unwrap();
    let before = session.snapshot();
    assert_eq!(session.on_key_down(0, 2300.0).unwrap(), None);
    assert_eq!(session.on_key_down(1, 2300.0).unwrap(), None);
    assert_eq!(session.snapshot(), before);
}

#[test]
fn test_out_of_range_lane_is_an_error() {
    let mut session = tap_session();
    assert!(session.on_key_down(4, 0.0).is_err());
    assert!(session.on_key_up(9, 0.0).is_err());
}

#[test]
fn test_nearest_note_wins_over_oldest() {
    let mut session = tap_session();
    let first = bass_onset(&mut session, 0.0);
    let second = bass_onset(&mut session, 200.0);
    // 2180 is 180ms after the first note and 20ms before the second.
    assert_eq!(session.on_key_down(0, 2180.0).unwrap(), Some(Judgment::Perfect));
    assert!(session.live_notes().get(first).is_some());
    assert!(session.live_notes().get(second).is_none());
}

#[test]
fn test_combo_bonus_every_ten_hits() {
    let mut session = tap_session();
    for i in 0..10 {
        bass_onset(&mut session, i as f64 * 300.0);
    }
    for i in 0..10 {
        session.on_key_down(0, 2000.0 + i as f64 * 300.0).unwrap();
    }
    assert_eq!(session.score().combo, 10);
    assert_eq!(session.score().score, 10 * 1000 + 100);
    assert!((session.score().accuracy - 100.0).abs() < 1e-9);
}

#[test]
fn test_auto_calibration_on_perfect_hits() {
    let config = GameConfig {
        auto_calibrate: true,
        ..config()
    };
    let (events, receiver) = EventSink::channel();
    let mut session = Session::with_profile(&config, profile(0.0, 0.0), events);
    bass_onset(&mut session, 0.0);
    assert_eq!(session.on_key_down(0, 2030.0).unwrap(), Some(Judgment::Perfect));
    assert_eq!(session.sync_offset(), -3);
    assert!(receiver
        .try_iter()
        .any(|event| event == GameEvent::SyncOffsetChanged(-3)));

    // Great hits leave the offset alone.
    bass_onset(&mut session, 1000.0);
    session.on_key_down(0, 3100.0).unwrap();
    assert_eq!(session.sync_offset(), -3);
}

#[test]
fn test_reset_round_trip() {
    let mut session = Session::new(&config(), EventSink::disabled());
    let spawn = |session: &mut Session| {
        (0..20)
            .map(|i| {
                let id = bass_onset(session, i as f64 * 250.0);
                let note = session.live_notes().get(id).cloned().expect("note");
                (note.lane, note.kind, note.expected_hit_ms)
            })
            .collect::<Vec<_>>()
    };

    let first = spawn(&mut session);
    session.on_key_down(0, 2000.0).unwrap();
    session.age(10_000.0);
    session.reset();

    assert_eq!(session.snapshot().score, 0);
    assert_eq!(session.tally().total(), 0);
    assert_eq!(session.total_notes(), 0);
    assert!(session.live_notes().is_empty());
    assert!(session.active_hold(0).is_none());

    let second = spawn(&mut session);
    assert_eq!(first, second);
}

#[test]
fn test_end_balances_tally_with_total() {
    let mut session = hold_session();
    bass_onset(&mut session, 0.0);
    bass_onset(&mut session, 500.0);
    bass_onset(&mut session, 1000.0);
    session.on_key_down(0, 2000.0).unwrap();
    session.age(2700.0);
    assert_eq!(session.tally().miss, 1);

    let result = session.end();
    assert_eq!(result.tally.total(), result.total_notes);
    assert_eq!(result.total_notes, 1);
    assert_eq!(session.discarded_notes(), 2);
    assert!(session.live_notes().is_empty());
    assert!(session.active_hold(0).is_none());
}
