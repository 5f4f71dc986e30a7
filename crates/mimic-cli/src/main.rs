//! `mimic` – plays a reference motion clip through the mimic behavior.
//!
//! 1. Loads the TOML config from the first argument or
//!    `~/.mimic/config.toml` (defaults when absent).
//! 2. Loads the clip into a shared [`MotionLibrary`] and sizes the simulated
//!    robot from it.
//! 3. Registers the available states, then drives the mimic state from a
//!    fixed-rate dispatcher loop until it requests a transition, the
//!    configured run time elapses, or **Ctrl-C** is pressed.

mod config;
mod dispatch;

use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{error, info, warn};

use mimic_motion::MotionLibrary;
use mimic_runtime::sim::SimArticulation;
use mimic_runtime::telemetry::init_tracing;

use dispatch::{MIMIC_MODE, Outcome};

fn main() -> ExitCode {
    // Hold the guard until exit so pending spans are flushed.
    let telemetry = init_tracing("mimic");
    info!(otlp = telemetry.is_exporting(), "tracing initialised");

    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(config::config_path);
    let cfg = match config::load(&path) {
        Ok(cfg) => {
            if path.exists() {
                println!("  Config loaded from {}", path.display().to_string().bold());
            }
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            return ExitCode::FAILURE;
        }
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = Arc::clone(&shutdown);
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping playback …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; playback can only end on its own");
    }

    let library = Arc::new(MotionLibrary::new());
    let clip = match library.get_or_load(&cfg.mimic.motion_file, cfg.mimic.clip_dt) {
        Ok(clip) => clip,
        Err(e) => {
            error!(error = %e, "cannot load motion clip");
            println!("{}: {}", "Motion error".red(), e);
            return ExitCode::FAILURE;
        }
    };
    println!(
        "  Clip {}: {} frames, {} joints, {:.2} s",
        cfg.mimic.motion_file.display().to_string().bold(),
        clip.num_frames(),
        clip.num_dof(),
        clip.duration()
    );

    let robot = SimArticulation::new(clip.num_dof());
    let outcome = dispatch::register_default_states(&cfg.mimic, &library, &robot)
        .and_then(|registry| registry.create_by_mode(MIMIC_MODE))
        .and_then(|mut state| {
            dispatch::drive(
                state.as_mut(),
                Duration::from_secs_f64(1.0 / f64::from(cfg.dispatcher_hz)),
                cfg.run_seconds.map(Duration::from_secs_f32),
                &shutdown,
            )
        });

    match outcome {
        Ok(outcome) => {
            let reason = match outcome {
                Outcome::Transition(target) => format!("handed over to {target}"),
                Outcome::TimeUp => "run time elapsed".to_string(),
                Outcome::Interrupted => "interrupted".to_string(),
            };
            println!(
                "  {} Playback finished ({}), {} joint commands sent.",
                "✓".green().bold(),
                reason,
                robot.command_count()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "playback failed");
            println!("{}: {}", "Playback error".red(), e);
            ExitCode::FAILURE
        }
    }
}
