//! Lab bridge binary.
//!
//! Serves one turn-engine session over JSON lines on stdin/stdout, and
//! hosts the replay and determinism tools.
//!
//! # Usage
//!
//! ```bash
//! # Serve a session (default)
//! cargo run -p lab_bridge
//!
//! # Serve with custom tuning, recording a replay
//! cargo run -p lab_bridge -- serve --tuning tuning/default.ron --record session.replay
//!
//! # Re-run a replay and check its final hash
//! cargo run -p lab_bridge -- replay --file session.replay --verify
//!
//! # Scripted determinism check
//! cargo run -p lab_bridge -- verify --seed s1 --turns 50 --runs 8
//! ```
//!
//! Logs go to stderr; stdout carries the protocol.

use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use lab_bridge::{autopilot, Bridge, BridgeCollaborator, BridgeConfig};
use lab_core::replay::{Replay, ReplayPlayer};
use lab_core::tuning::Tuning;

#[derive(Parser)]
#[command(name = "lab_bridge")]
#[command(about = "JSON-lines bridge for the frontier lab turn engine")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve one session on stdin/stdout
    Serve {
        /// Seed for init_game requests without one
        #[arg(long, default_value = lab_bridge::bridge::DEFAULT_SEED)]
        seed: String,

        /// Tuning file (RON)
        #[arg(long)]
        tuning: Option<PathBuf>,

        /// Write a replay of the session to this file (later sessions
        /// started by another init_game get FILE-stem.N.ext)
        #[arg(long)]
        record: Option<PathBuf>,
    },

    /// Re-run a recorded session
    Replay {
        /// Replay file path
        #[arg(short, long)]
        file: PathBuf,

        /// Verify replay produces identical hash
        #[arg(long)]
        verify: bool,
    },

    /// Verify determinism by playing the same seed several times
    Verify {
        /// Seed to verify
        #[arg(long, default_value = "12345")]
        seed: String,

        /// Turns per run
        #[arg(short, long, default_value = "50")]
        turns: u64,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: usize,

        /// Tuning file (RON)
        #[arg(long)]
        tuning: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging to stderr (stdout is for protocol)
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(false),
        )
        .with(filter)
        .init();

    let result = match cli.command {
        Some(Commands::Serve {
            seed,
            tuning,
            record,
        }) => cmd_serve(seed, tuning, record),
        Some(Commands::Replay { file, verify }) => cmd_replay(&file, verify),
        Some(Commands::Verify {
            seed,
            turns,
            runs,
            tuning,
        }) => cmd_verify(&seed, turns, runs, tuning),
        None => cmd_serve(lab_bridge::bridge::DEFAULT_SEED.to_string(), None, None),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            tracing::error!("{message}");
            eprintln!("FAIL: {message}");
            ExitCode::FAILURE
        }
    }
}

fn load_tuning(path: Option<PathBuf>) -> Result<Tuning, String> {
    match path {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading tuning");
            Tuning::load(&path).map_err(|e| e.to_string())
        }
        None => Ok(Tuning::default()),
    }
}

/// Serve one session
fn cmd_serve(seed: String, tuning: Option<PathBuf>, record: Option<PathBuf>) -> Result<(), String> {
    let config = BridgeConfig {
        default_seed: seed,
        tuning: load_tuning(tuning)?,
        record,
    };
    let mut bridge = Bridge::new(config, BridgeCollaborator::default());

    let stdin = io::stdin();
    let stdout = io::stdout();
    bridge
        .serve(stdin.lock(), BufWriter::new(stdout.lock()))
        .map_err(|e| e.to_string())
}

/// Replay a recorded session
fn cmd_replay(file: &Path, verify: bool) -> Result<(), String> {
    let replay = Replay::load(file).map_err(|e| format!("Failed to load replay: {e}"))?;

    eprintln!("Loaded replay:");
    eprintln!("  Seed: {}", replay.seed);
    eprintln!("  Inputs: {}", replay.input_count());
    eprintln!("  Final turn: {}", replay.final_turn);

    if verify {
        eprintln!("Verifying replay...");
        let hash = replay.verify().map_err(|e| e.to_string())?;
        eprintln!("PASS: Replay verification successful");
        eprintln!("  Hash: {hash:016x}");
        return Ok(());
    }

    let mut player = ReplayPlayer::new(&replay);
    let mut last_turn = 0;
    while player.step().is_some() {
        let turn = player.controller().simulation().state().turn;
        if turn != last_turn {
            let snapshot = player.controller().simulation().snapshot();
            eprintln!(
                "  turn {:>3}  money {:>10.0}  compute {:>6.0}  safety {:>5.0}",
                snapshot.turn, snapshot.money, snapshot.compute, snapshot.safety
            );
            last_turn = turn;
        }
    }

    let ctl = player.into_controller();
    let snapshot = ctl.simulation().snapshot();
    eprintln!(
        "Replay complete: turn {}, game_over={}, victory={}",
        snapshot.turn, snapshot.game_over, snapshot.victory
    );
    Ok(())
}

/// Scripted determinism check
fn cmd_verify(seed: &str, turns: u64, runs: usize, tuning: Option<PathBuf>) -> Result<(), String> {
    let tuning = load_tuning(tuning)?;
    tracing::info!(seed, turns, runs, "Verifying determinism");

    let report = autopilot::verify_determinism(seed, &tuning, turns, runs);

    if report.passed() {
        eprintln!(
            "PASS: All {} runs produced identical results ({:016x})",
            report.runs, report.hashes[0]
        );
        Ok(())
    } else {
        Err(format!(
            "Non-determinism detected! hashes={:?} replay_verified={}",
            report.hashes, report.replay_verified
        ))
    }
}
