use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use serde::{Deserialize, Serialize};

use beatlane::audio::{Band, EnergyExtractor, OnsetDetector, SpectrumSource, WavSpectrumSource};
use beatlane::game::{Difficulty, LaneLayout, NoteKind, NoteScheduler, PatternShape};
use beatlane::GameConfig;

#[derive(Parser)]
#[command(name = "chart-scan")]
#[command(about = "Runs note detection over a WAV file offline and writes the resulting chart as JSON")]
struct Args {
    /// WAV file to scan
    #[arg()]
    input_file: PathBuf,

    /// Output JSON file
    #[arg(short, long, default_value = "chart.json")]
    output: PathBuf,

    /// easy, normal or hard
    #[arg(long, default_value = "normal")]
    difficulty: Difficulty,

    /// Use the six-lane layout
    #[arg(long)]
    six_lanes: bool,

    /// Note speed multiplier
    #[arg(long, default_value = "1.0")]
    speed: f32,

    /// Seed for lane and hold choices
    #[arg(long, default_value = "0")]
    seed: u64,

    /// Scan step in ms
    #[arg(long, default_value = "16")]
    tick_ms: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChartNote {
    /// When the note should be hit, in ms of playback.
    hit_ms: f64,
    lane: usize,
    #[serde(flatten)]
    kind: NoteKind,
    band: Option<Band>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ChartStatistics {
    duration_seconds: f64,
    ticks: u64,
    onsets_per_band: [u32; Band::COUNT],
    patterns: u32,
    pattern_shapes: Vec<PatternShape>,
    taps: u32,
    holds: u32,
    notes_per_minute: f64,
    notes_per_lane: Vec<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Chart {
    source: String,
    config: GameConfig,
    notes: Vec<ChartNote>,
    statistics: ChartStatistics,
}

fn scan(args: &Args, config: &GameConfig) -> Result<Chart> {
    let mut source = WavSpectrumSource::open(&args.input_file)
        .with_context(|| format!("opening {}", args.input_file.display()))?;
    let duration_ms = source.duration_secs() * 1000.0;
    info!("Scanning {:.1}s of audio at {}ms steps", duration_ms / 1000.0, args.tick_ms);

    let profile = config.difficulty.profile();
    let lane_count = config.lanes.lane_count();
    let extractor = EnergyExtractor::new(config.energy_weighting);
    let mut detector = OnsetDetector::new(profile.onset_settings(config.min_energy));
    let mut scheduler = NoteScheduler::new(lane_count, &profile, config.travel_ms(), config.seed);

    let mut notes = Vec::new();
    let mut statistics = ChartStatistics {
        duration_seconds: duration_ms / 1000.0,
        notes_per_lane: vec![0; lane_count],
        ..ChartStatistics::default()
    };

    let step = args.tick_ms.max(1) as f64;
    let mut now = 0.0;
    while now <= duration_ms {
        let frame = source.frame(now)?;
        let detection = detector.observe_all(&extractor.extract(&frame), now);
        if let Some(pattern) = &detection.pattern {
            statistics.patterns += 1;
            statistics.pattern_shapes.push(scheduler.plan_pattern(pattern));
        }
        for onset in &detection.onsets {
            statistics.onsets_per_band[onset.band.index()] += 1;
            scheduler.plan_onset(onset);
        }

        for planned in scheduler.take_due(now) {
            let note = scheduler.instantiate(planned, now);
            match note.kind {
                NoteKind::Tap => statistics.taps += 1,
                NoteKind::Hold { .. } => statistics.holds += 1,
            }
            statistics.notes_per_lane[note.lane] += 1;
            notes.push(ChartNote {
                hit_ms: note.expected_hit_ms,
                lane: note.lane,
                kind: note.kind,
                band: note.band,
            });
        }

        statistics.ticks += 1;
        if statistics.ticks % 1000 == 0 {
            info!("Scanned {:.1}s of {:.1}s", now / 1000.0, duration_ms / 1000.0);
        }
        now += step;
    }

    let dropped = scheduler.flush();
    if dropped > 0 {
        info!("{} staggered notes fell past the end of the track", dropped);
    }
    if statistics.duration_seconds > 0.0 {
        statistics.notes_per_minute = notes.len() as f64 / statistics.duration_seconds * 60.0;
    }

    Ok(Chart {
        source: args.input_file.display().to_string(),
        config: config.clone(),
        notes,
        statistics,
    })
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = GameConfig {
        difficulty: args.difficulty,
        lanes: if args.six_lanes { LaneLayout::Six } else { LaneLayout::Four },
        note_speed: args.speed,
        tick_interval_ms: args.tick_ms,
        seed: Some(args.seed),
        ..GameConfig::default()
    };
    config.validate()?;

    info!("beatlane chart scan");
    info!("Input file: {}", args.input_file.display());
    info!("Difficulty: {}, lanes: {}", config.difficulty.name(), config.lanes.lane_count());

    let chart = scan(&args, &config)?;

    info!("=== CHART ===");
    info!("Notes: {} ({} taps, {} holds)", chart.notes.len(), chart.statistics.taps, chart.statistics.holds);
    for band in Band::ALL {
        info!("  {} onsets: {}", band.name(), chart.statistics.onsets_per_band[band.index()]);
    }
    info!("Patterns: {}", chart.statistics.patterns);
    info!("Density: {:.1} notes/min", chart.statistics.notes_per_minute);

    let json = serde_json::to_string_pretty(&chart)?;
    std::fs::write(&args.output, json).with_context(|| format!("writing {}", args.output.display()))?;
    info!("Chart saved to {}", args.output.display());

    Ok(())
}
