use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use beatlane::audio::{SimulatedSpectrum, SpectrumSource, WavSpectrumSource};
use beatlane::game::{
    Difficulty, EventSink, GameEvent, LaneLayout, ManualClock, NoteId, NoteState, ScoreSnapshot, SystemTimeProvider,
    TimeProvider,
};
use beatlane::session::{GameDriver, MediaEvent, SessionController, SessionState, SimulatedPlayer};
use beatlane::GameConfig;

#[derive(Parser)]
#[command(name = "beatlane")]
#[command(about = "Plays a headless beatlane session with an autoplay bot and prints the result")]
struct Args {
    /// WAV file to derive notes from (simulated energy when omitted)
    #[arg(long)]
    wav: Option<PathBuf>,

    /// Video URL cued on the simulated player
    #[arg(long, default_value = "https://youtu.be/beatlane-demo")]
    url: String,

    /// JSON config file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// easy, normal or hard (overrides the config file)
    #[arg(long)]
    difficulty: Option<Difficulty>,

    /// Use the six-lane layout (s d f j k l)
    #[arg(long)]
    six_lanes: bool,

    /// Note speed multiplier
    #[arg(long)]
    speed: Option<f32>,

    /// Seed for note placement and the bot
    #[arg(long)]
    seed: Option<u64>,

    /// Track length in seconds when no WAV is given
    #[arg(long, default_value = "30")]
    duration: f64,

    /// Tempo of the simulated energy
    #[arg(long, default_value = "120")]
    bpm: f32,

    /// Maximum timing error of the bot, in ms either side
    #[arg(long, default_value = "40")]
    jitter_ms: f64,

    /// Chance that the bot ignores a note entirely
    #[arg(long, default_value = "0.05")]
    miss_rate: f64,

    /// Nudge the sync offset on perfect hits
    #[arg(long)]
    auto_calibrate: bool,

    /// Run against the wall clock on the tokio runtime instead of stepping time
    #[arg(long)]
    realtime: bool,

    /// Write the effective config to this path before playing
    #[arg(long)]
    save_config: Option<PathBuf>,
}

/// Presses lanes near each note's hit time with random error, and holds
/// hold notes to their tail.
struct Autoplay {
    rng: StdRng,
    jitter_ms: f64,
    miss_rate: f64,
    planned: HashMap<NoteId, Option<f64>>,
    releases: Vec<(f64, usize)>,
}

impl Autoplay {
    fn new(seed: u64, jitter_ms: f64, miss_rate: f64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            jitter_ms: jitter_ms.abs(),
            miss_rate: miss_rate.clamp(0.0, 1.0),
            planned: HashMap::new(),
            releases: Vec::new(),
        }
    }

    fn offset(&mut self) -> f64 {
        if self.jitter_ms == 0.0 {
            return 0.0;
        }
        self.rng.gen_range(-self.jitter_ms..=self.jitter_ms)
    }

    fn step(&mut self, controller: &mut SessionController) -> Result<()> {
        if controller.state() != SessionState::Playing {
            return Ok(());
        }
        let now = controller.playback_ms();

        let mut presses = Vec::new();
        if let Some(session) = controller.session() {
            for note in session.live_notes().iter() {
                if note.state != NoteState::Pending {
                    continue;
                }
                let plan = match self.planned.get(&note.id) {
                    Some(plan) => *plan,
                    None => {
                        let plan = if self.rng.gen_bool(self.miss_rate) {
                            None
                        } else {
                            Some(note.expected_hit_ms + self.offset())
                        };
                        self.planned.insert(note.id, plan);
                        plan
                    }
                };
                if plan.is_some_and(|at| now >= at) {
                    presses.push((note.id, note.lane, note.expected_end_ms));
                }
            }
        }

        let (due, later): (Vec<_>, Vec<_>) = self.releases.drain(..).partition(|(at, _)| *at <= now);
        self.releases = later;
        for (_, lane) in due {
            controller.release_lane(lane)?;
        }

        for (id, lane, end) in presses {
            if self.releases.iter().any(|(_, held)| *held == lane) {
                continue;
            }
            self.planned.remove(&id);
            controller.press_lane(lane)?;
            let release_at = match end {
                Some(end) => end + self.offset().abs() * 0.5,
                None => now + 30.0,
            };
            self.releases.push((release_at, lane));
        }
        Ok(())
    }
}

fn build_config(args: &Args) -> Result<GameConfig> {
    let mut config = match &args.config {
        Some(path) => GameConfig::load(path).with_context(|| format!("loading config {}", path.display()))?,
        None => GameConfig::default(),
    };
    if let Some(difficulty) = args.difficulty {
        config.difficulty = difficulty;
    }
    if args.six_lanes {
        config.lanes = LaneLayout::Six;
    }
    if let Some(speed) = args.speed {
        config.note_speed = speed;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    config.auto_calibrate |= args.auto_calibrate;
    config.validate()?;
    Ok(config)
}

fn spectrum_source(args: &Args, seed: u64) -> Result<(Box<dyn SpectrumSource>, f64)> {
    match &args.wav {
        Some(path) => {
            let source = WavSpectrumSource::open(path).with_context(|| format!("opening {}", path.display()))?;
            let duration = source.duration_secs();
            info!("Loaded {} ({:.1}s at {}Hz)", path.display(), duration, source.sample_rate());
            Ok((Box::new(source), duration))
        }
        None => Ok((Box::new(SimulatedSpectrum::new(seed, args.bpm)), args.duration)),
    }
}

fn stepped_run(args: &Args, config: GameConfig, seed: u64, events: EventSink) -> Result<Option<ScoreSnapshot>> {
    let clock = ManualClock::new();
    let wall: Arc<dyn TimeProvider> = Arc::new(clock.clone());
    let (spectrum, duration) = spectrum_source(args, seed)?;
    let tick_ms = config.tick_interval_ms as f64;
    let player = SimulatedPlayer::new(wall.clone(), duration);
    let mut controller = SessionController::new(config, wall, Box::new(player), spectrum, events)?;
    let mut bot = Autoplay::new(seed, args.jitter_ms, args.miss_rate);

    let video = controller.load(&args.url)?;
    info!("Cued video {}", video);
    controller.handle_media(MediaEvent::Ready);
    controller.start()?;

    let max_ticks = ((duration + 10.0) * 1000.0 / tick_ms).ceil() as u64;
    for _ in 0..max_ticks {
        clock.advance_ms(tick_ms);
        controller.tick()?;
        bot.step(&mut controller)?;
        if controller.state() == SessionState::Result {
            break;
        }
    }
    if controller.state() != SessionState::Result {
        bail!("session did not finish (state {:?})", controller.state());
    }
    Ok(controller.last_result().copied())
}

async fn realtime_run(args: &Args, config: GameConfig, seed: u64, events: EventSink) -> Result<Option<ScoreSnapshot>> {
    let wall: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider::new());
    let (spectrum, duration) = spectrum_source(args, seed)?;
    let player = SimulatedPlayer::new(wall.clone(), duration);
    let controller = SessionController::new(config, wall, Box::new(player), spectrum, events)?;
    let mut driver = GameDriver::new(controller);
    let mut bot = Autoplay::new(seed, args.jitter_ms, args.miss_rate);

    driver.load(&args.url)?;
    driver.media(MediaEvent::Ready);
    driver.start()?;
    info!("Playing in real time for {:.1}s", duration);

    let shared = driver.controller();
    let mut poll = tokio::time::interval(Duration::from_millis(4));
    loop {
        poll.tick().await;
        let mut controller = shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        bot.step(&mut controller)?;
        if matches!(controller.state(), SessionState::Result | SessionState::Waiting) {
            break;
        }
    }
    Ok(driver.finished(Duration::from_millis(10)).await)
}

fn print_result(result: &ScoreSnapshot, events: &crossbeam_channel::Receiver<GameEvent>) {
    let mut spawned = 0u32;
    let mut alerts = Vec::new();
    for event in events.try_iter() {
        match event {
            GameEvent::NoteSpawned { .. } => spawned += 1,
            GameEvent::Alert(message) => alerts.push(message),
            _ => {}
        }
    }

    println!("=== RESULT ===");
    println!("Score:     {}", result.score);
    println!("Max combo: {}", result.max_combo);
    println!("Accuracy:  {}%", result.accuracy_percent());
    println!(
        "Perfect {}  Great {}  Good {}  Miss {}",
        result.tally.perfect, result.tally.great, result.tally.good, result.tally.miss
    );
    println!("Notes judged: {} of {} spawned", result.total_notes, spawned);
    for alert in alerts {
        println!("Alert: {alert}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = build_config(&args)?;
    if let Some(path) = &args.save_config {
        config.save(path).with_context(|| format!("saving config {}", path.display()))?;
        info!("Saved config to {}", path.display());
    }
    let seed = config.seed.unwrap_or_else(rand::random);
    info!(
        "beatlane: {} difficulty, {} lanes, speed {:.2}, seed {}",
        config.difficulty.name(),
        config.lanes.lane_count(),
        config.note_speed,
        seed
    );

    let (events, receiver) = EventSink::channel();
    let result = if args.realtime {
        realtime_run(&args, config, seed, events).await?
    } else {
        stepped_run(&args, config, seed, events)?
    };

    match result {
        Some(result) => print_result(&result, &receiver),
        None => bail!("session ended without a result"),
    }
    Ok(())
}
