//! Term Physics headless driver
//!
//! Runs the playground at a fixed rate without a terminal front end. A scripted
//! input thread feeds commands through a channel and samples the shared
//! registry while the loop mutates it.
//!
//! Usage: `term-physics [settings.json] [ticks]`

use std::env;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use term_physics::Settings;
use term_physics::sim::{Command, EntityKind, EntityRegistry, Simulation};

const DEFAULT_SETTINGS_PATH: &str = "term-physics.json";
const DEFAULT_TICKS: u64 = 600;

/// Demo input, one step per slot of the run
const SCRIPT: &[Command] = &[
    Command::Resize {
        width: 100.0,
        height: 30.0,
    },
    Command::AddSphere,
    Command::CycleSize,
    Command::CycleColor,
    Command::AddSprite,
    Command::StressTest,
    Command::CycleBounce,
    Command::TogglePause,
    Command::TogglePause,
    Command::CycleGravity,
    Command::Resize {
        width: 60.0,
        height: 20.0,
    },
    Command::StressTest,
];

fn main() {
    env_logger::init();

    let mut args = env::args().skip(1);
    let settings_path = args
        .next()
        .unwrap_or_else(|| DEFAULT_SETTINGS_PATH.to_string());
    let ticks = match args.next().map(|arg| arg.parse::<u64>()) {
        Some(Ok(ticks)) => ticks,
        Some(Err(e)) => {
            log::warn!("Invalid tick count ({}), running {}", e, DEFAULT_TICKS);
            DEFAULT_TICKS
        }
        None => DEFAULT_TICKS,
    };

    let settings = Settings::load(&settings_path);
    let tick_rate = settings.effective_tick_rate();
    let tick_duration = Duration::from_nanos(1_000_000_000 / u64::from(tick_rate));
    log::info!(
        "Term Physics (headless) starting: {} ticks at {} Hz",
        ticks,
        tick_rate
    );

    let mut sim = Simulation::new(&settings);
    let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();

    let input = thread::Builder::new()
        .name("term-physics-input".into())
        .spawn({
            let registry = sim.registry();
            let step = script_step(tick_duration, ticks);
            move || run_script(cmd_tx, &registry, step)
        });
    if let Err(e) = &input {
        log::error!("Failed to spawn input thread: {}", e);
    }

    let started = Instant::now();
    run_loop(&mut sim, &cmd_rx, ticks, tick_duration);
    // Unblocks the script if it is still running
    drop(cmd_rx);

    if let Ok(handle) = input {
        if handle.join().is_err() {
            log::error!("Input thread panicked");
        }
    }

    let registry = sim.registry();
    log::info!(
        "Ran {} ticks in {:.2?}: {} spheres, {} sprites, gravity {}, restitution {}, paused {}",
        sim.tick_count(),
        started.elapsed(),
        registry.count_by_kind(EntityKind::Sphere),
        registry.count_by_kind(EntityKind::Sprite),
        sim.engine().gravity(),
        sim.engine().restitution(),
        sim.is_paused()
    );
}

/// Time between script commands, spreading the script over the run
fn script_step(tick_duration: Duration, ticks: u64) -> Duration {
    let ticks_per_step = (ticks / SCRIPT.len() as u64).max(1);
    tick_duration.saturating_mul(u32::try_from(ticks_per_step).unwrap_or(u32::MAX))
}

/// Fixed-rate loop: drain commands, tick, sleep until the next deadline
fn run_loop(
    sim: &mut Simulation,
    cmd_rx: &mpsc::Receiver<Command>,
    ticks: u64,
    tick_duration: Duration,
) {
    let mut next_tick_time = Instant::now();

    while sim.tick_count() < ticks {
        loop {
            match cmd_rx.try_recv() {
                Ok(command) => {
                    log::debug!("Applying {:?}", command);
                    sim.apply(command);
                }
                Err(mpsc::TryRecvError::Empty) | Err(mpsc::TryRecvError::Disconnected) => break,
            }
        }

        sim.tick();

        next_tick_time += tick_duration;
        let now = Instant::now();
        if next_tick_time > now {
            thread::sleep(next_tick_time - now);
        } else {
            // Fell behind; don't try to catch up with a burst
            next_tick_time = now;
        }
    }
}

/// Send the demo script, sampling the registry between steps
fn run_script(cmd_tx: mpsc::Sender<Command>, registry: &Arc<EntityRegistry>, step: Duration) {
    for &command in SCRIPT {
        if cmd_tx.send(command).is_err() {
            return;
        }
        thread::sleep(step);

        let snapshot = registry.all();
        let moving = snapshot
            .iter()
            .filter(|entity| entity.animation().is_animating())
            .count();
        log::info!(
            "After {:?}: {} entities, {} still animating",
            command,
            snapshot.len(),
            moving
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_step_spreads_over_run() {
        let tick = Duration::from_millis(10);
        assert_eq!(script_step(tick, 120), tick * 10);
        assert_eq!(script_step(tick, 0), tick);
    }

    #[test]
    fn test_script_step_saturates_on_huge_runs() {
        let tick = Duration::from_millis(10);
        let step = script_step(tick, u64::MAX);
        assert_eq!(step, tick * u32::MAX);
        assert!(step > script_step(tick, 1_000_000));
    }
}
