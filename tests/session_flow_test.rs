use std::sync::Arc;

use beatlane::audio::{SpectrumError, SpectrumFrame, SpectrumSource};
use beatlane::game::{EventSink, GameEvent, HoldRelease, Key, ManualClock, NoteId, NoteState, TimeProvider};
use beatlane::session::{MediaEvent, SessionController, SessionState, SimulatedPlayer};
use beatlane::{GameConfig, GameError, Judgment};

const TICK_MS: f64 = 16.0;

/// Flat spectrum with a loud bass burst every `period_ms`.
struct BassPulses {
    period_ms: f64,
}

impl SpectrumSource for BassPulses {
    fn frame(&mut self, now_ms: f64) -> Result<SpectrumFrame, SpectrumError> {
        let mut magnitudes = vec![10.0; 1024];
        if now_ms > 0.0 && now_ms % self.period_ms < 20.0 {
            // Bins 0..=8 sit wholly inside the bass band.
            for bin in &mut magnitudes[..9] {
                *bin = 200.0;
            }
        }
        Ok(SpectrumFrame {
            magnitudes,
            nyquist_hz: 22050.0,
        })
    }

    fn source_type(&self) -> &'static str {
        "bass-pulses"
    }
}

struct Broken;

impl SpectrumSource for Broken {
    fn frame(&mut self, _now_ms: f64) -> Result<SpectrumFrame, SpectrumError> {
        Err(SpectrumError::Unavailable("no capture device".into()))
    }

    fn source_type(&self) -> &'static str {
        "broken"
    }
}

fn controller_with(
    clock: &ManualClock,
    track_secs: f64,
    spectrum: Box<dyn SpectrumSource>,
    events: EventSink,
) -> SessionController {
    let config = GameConfig {
        seed: Some(21),
        ..GameConfig::default()
    };
    configured_controller(clock, config, track_secs, spectrum, events)
}

fn configured_controller(
    clock: &ManualClock,
    config: GameConfig,
    track_secs: f64,
    spectrum: Box<dyn SpectrumSource>,
    events: EventSink,
) -> SessionController {
    let wall: Arc<dyn TimeProvider> = Arc::new(clock.clone());
    let player = SimulatedPlayer::new(wall.clone(), track_secs);
    let mut controller = SessionController::new(config, wall, Box::new(player), spectrum, events).unwrap();
    controller.load("https://www.youtube.com/watch?v=flowtest").unwrap();
    controller.handle_media(MediaEvent::Ready);
    controller
}

fn step(controller: &mut SessionController, clock: &ManualClock) {
    clock.advance_ms(TICK_MS);
    controller.tick().unwrap();
}

fn run_until(controller: &mut SessionController, clock: &ManualClock, state: SessionState) {
    for _ in 0..10_000 {
        if controller.state() == state {
            return;
        }
        step(controller, clock);
    }
    panic!("never reached {state:?}, stuck in {:?}", controller.state());
}

/// Presses every lane whose oldest pending note has arrived.
fn press_arrived(controller: &mut SessionController) {
    let now = controller.playback_ms();
    let lanes: Vec<usize> = controller
        .session()
        .map(|session| {
            session
                .live_notes()
                .iter()
                .filter(|note| note.state == NoteState::Pending && note.expected_hit_ms <= now)
                .map(|note| note.lane)
                .collect()
        })
        .unwrap_or_default();
    for lane in lanes {
        controller.press_lane(lane).unwrap();
    }
}

#[test]
fn test_full_game_balances_tally() {
    let clock = ManualClock::new();
    // Pulses a second apart so no hold overlaps the next note in its lane.
    let mut controller = controller_with(&clock, 12.0, Box::new(BassPulses { period_ms: 1000.0 }), EventSink::disabled());
    controller.start().unwrap();
    run_until(&mut controller, &clock, SessionState::Playing);

    while controller.state() == SessionState::Playing {
        step(&mut controller, &clock);
        press_arrived(&mut controller);
    }

    assert_eq!(controller.state(), SessionState::Result);
    let result = *controller.last_result().expect("result");
    assert!(result.total_notes >= 8, "only {} notes", result.total_notes);
    assert_eq!(result.tally.total(), result.total_notes);
    assert_eq!(result.tally.miss, 0);
    assert_eq!(result.accuracy_percent(), 100);
    let session = controller.session().expect("session");
    assert!(session.live_notes().is_empty());
    assert!(session.discarded_notes() > 0);
}

#[test]
fn test_events_follow_the_state_machine() {
    let clock = ManualClock::new();
    let (events, receiver) = EventSink::channel();
    let mut controller = controller_with(&clock, 3.0, Box::new(BassPulses { period_ms: 500.0 }), events);
    controller.start().unwrap();
    run_until(&mut controller, &clock, SessionState::Result);

    let mut countdown = Vec::new();
    let mut transitions = Vec::new();
    let mut spawned = 0;
    for event in receiver.try_iter() {
        match event {
            GameEvent::Countdown(n) => countdown.push(n),
            GameEvent::StateChanged { from, to } => transitions.push((from, to)),
            GameEvent::NoteSpawned { travel_ms, .. } => {
                assert_eq!(travel_ms, 2000.0);
                spawned += 1;
            }
            _ => {}
        }
    }
    assert_eq!(countdown, vec![3, 2, 1]);
    assert_eq!(
        transitions,
        vec![
            (SessionState::Waiting, SessionState::Countdown),
            (SessionState::Countdown, SessionState::Playing),
            (SessionState::Playing, SessionState::Result),
        ]
    );
    assert!(spawned > 0);
}

#[test]
fn test_pause_does_not_expire_notes() {
    let clock = ManualClock::new();
    let mut controller = controller_with(&clock, 60.0, Box::new(BassPulses { period_ms: 500.0 }), EventSink::disabled());
    controller.start().unwrap();
    run_until(&mut controller, &clock, SessionState::Playing);
    while controller.session().map_or(0, |s| s.live_notes().len()) == 0 {
        step(&mut controller, &clock);
    }
    let live_before = controller.session().map_or(0, |s| s.live_notes().len());

    controller.key_down(Key::Escape).unwrap();
    assert_eq!(controller.state(), SessionState::Paused);
    let paused_at = controller.playback_ms();
    clock.advance_ms(120_000.0);
    controller.tick().unwrap();
    controller.resume().unwrap();
    step(&mut controller, &clock);

    assert!((controller.playback_ms() - paused_at - TICK_MS).abs() < 1e-6);
    let session = controller.session().expect("session");
    assert_eq!(session.tally().miss, 0);
    assert!(session.live_notes().len() >= live_before);
}

#[test]
fn test_broken_spectrum_falls_back_to_simulation() {
    let clock = ManualClock::new();
    let (events, receiver) = EventSink::channel();
    let mut controller = controller_with(&clock, 30.0, Box::new(Broken), events);
    controller.start().unwrap();
    run_until(&mut controller, &clock, SessionState::Playing);
    step(&mut controller, &clock);

    assert!(controller.using_fallback_spectrum());
    assert!(receiver
        .try_iter()
        .any(|event| matches!(event, GameEvent::Alert(message) if message.contains("simulated"))));

    for _ in 0..300 {
        step(&mut controller, &clock);
    }
    assert!(controller.session().is_some_and(|s| s.total_notes() > 0));
}

#[test]
fn test_restart_resets_but_keeps_sync_offset() {
    let clock = ManualClock::new();
    let mut controller = controller_with(&clock, 4.0, Box::new(BassPulses { period_ms: 500.0 }), EventSink::disabled());
    controller.start().unwrap();
    controller.step_sync_offset(true);
    controller.step_sync_offset(true);
    run_until(&mut controller, &clock, SessionState::Result);
    assert!(controller.last_result().is_some());

    assert!(matches!(
        controller.start(),
        Err(GameError::InvalidTransition {
            from: SessionState::Result,
            ..
        })
    ));
    controller.restart().unwrap();
    controller.start().unwrap();

    let session = controller.session().expect("session");
    assert_eq!(session.sync_offset(), 20);
    assert_eq!(session.total_notes(), 0);
    assert_eq!(session.tally().total(), 0);
    assert_eq!(session.snapshot().score, 0);
    assert!(controller.last_result().is_none());
}

#[test]
fn test_quit_while_playing_discards_everything() {
    let clock = ManualClock::new();
    let mut controller = controller_with(&clock, 30.0, Box::new(BassPulses { period_ms: 500.0 }), EventSink::disabled());
    controller.start().unwrap();
    run_until(&mut controller, &clock, SessionState::Playing);
    for _ in 0..100 {
        step(&mut controller, &clock);
    }
    controller.quit().unwrap();
    assert_eq!(controller.state(), SessionState::Waiting);
    assert!(controller.session().is_none());
    assert!(controller.press_lane(0).unwrap().is_none());
}

#[test]
fn test_keys_are_ignored_outside_play() {
    let clock = ManualClock::new();
    let mut controller = controller_with(&clock, 30.0, Box::new(BassPulses { period_ms: 500.0 }), EventSink::disabled());
    assert_eq!(controller.key_down(Key::Char('d')).unwrap(), None);
    assert!(matches!(controller.pause(), Err(GameError::InvalidTransition { .. })));
    controller.start().unwrap();
    assert_eq!(controller.key_down(Key::Escape).unwrap(), None);
    assert_eq!(controller.state(), SessionState::Countdown);
}

/// Plays taps on time until the first hold in lane 0 reaches the judgment
/// line. Returns its id and hit time.
fn play_until_first_hold(controller: &mut SessionController, clock: &ManualClock) -> (NoteId, f64) {
    for _ in 0..10_000 {
        step(controller, clock);
        let now = controller.playback_ms();
        let arrived: Vec<_> = controller
            .session()
            .map(|session| {
                session
                    .live_notes()
                    .iter()
                    .filter(|note| note.state == NoteState::Pending && note.expected_hit_ms <= now)
                    .map(|note| (note.id, note.lane, note.is_hold(), note.expected_hit_ms))
                    .collect()
            })
            .unwrap_or_default();
        let mut first_hold = None;
        for (id, lane, is_hold, hit_ms) in arrived {
            if is_hold && lane == 0 {
                first_hold = Some((id, hit_ms));
            } else {
                controller.press_lane(lane).unwrap();
            }
        }
        if let Some(found) = first_hold {
            return found;
        }
    }
    panic!("no hold note reached lane 0");
}

#[test]
fn test_release_while_paused_fails_the_hold() {
    let clock = ManualClock::new();
    let mut controller = controller_with(&clock, 120.0, Box::new(BassPulses { period_ms: 1000.0 }), EventSink::disabled());
    controller.start().unwrap();
    run_until(&mut controller, &clock, SessionState::Playing);
    let (hold, hit_ms) = play_until_first_hold(&mut controller, &clock);
    let misses_before = controller.session().map_or(0, |s| s.tally().miss);

    assert!(controller.key_down(Key::Char('d')).unwrap().is_some());
    controller.key_down(Key::Escape).unwrap();
    assert_eq!(controller.state(), SessionState::Paused);
    clock.advance_ms(5_000.0);
    assert_eq!(controller.key_up(Key::Char('d')).unwrap(), Some(HoldRelease::Early(hold)));
    assert!(controller.session().is_some_and(|s| s.active_hold(0).is_none()));

    controller.resume().unwrap();
    while controller.playback_ms() <= hit_ms + 250.0 {
        step(&mut controller, &clock);
        // Lane 0 stays untouched so the released hold cannot be re-grabbed.
        let now = controller.playback_ms();
        let lanes: Vec<usize> = controller
            .session()
            .map(|session| {
                session
                    .live_notes()
                    .iter()
                    .filter(|note| note.state == NoteState::Pending && note.expected_hit_ms <= now && note.lane != 0)
                    .map(|note| note.lane)
                    .collect()
            })
            .unwrap_or_default();
        for lane in lanes {
            controller.press_lane(lane).unwrap();
        }
    }

    let session = controller.session().expect("session");
    assert!(session.live_notes().get(hold).is_none());
    assert_eq!(session.tally().miss, misses_before + 1);
}

#[test]
fn test_calibrated_offset_survives_quit() {
    let clock = ManualClock::new();
    let config = GameConfig {
        seed: Some(21),
        auto_calibrate: true,
        ..GameConfig::default()
    };
    let mut controller =
        configured_controller(&clock, config, 60.0, Box::new(BassPulses { period_ms: 1000.0 }), EventSink::disabled());
    controller.start().unwrap();
    run_until(&mut controller, &clock, SessionState::Playing);

    let (lane, hit_ms) = loop {
        step(&mut controller, &clock);
        let first = controller
            .session()
            .and_then(|session| session.live_notes().iter().next().map(|n| (n.lane, n.expected_hit_ms)));
        if let Some(first) = first {
            break first;
        }
    };
    // 32ms late is still perfect and teaches the offset -3.
    while controller.playback_ms() + TICK_MS < hit_ms + 32.0 {
        step(&mut controller, &clock);
    }
    clock.advance_ms(hit_ms + 32.0 - controller.playback_ms());
    assert_eq!(controller.press_lane(lane).unwrap(), Some(Judgment::Perfect));
    assert_eq!(controller.session().map(|s| s.sync_offset()), Some(-3));

    controller.quit().unwrap();
    assert!(controller.session().is_none());
    assert_eq!(controller.config().sync_offset_ms, -3);

    controller.start().unwrap();
    assert_eq!(controller.session().map(|s| s.sync_offset()), Some(-3));
}
