use std::path::Path;

use anyhow::Context;
use chrono::Local;
use tracing::{info, warn};

use beamswarm::config::Config;
use beamswarm::report::{self, RunRecorder, RunReport};
use beamswarm::shutdown::ShutdownSignal;
use beamswarm::swarm::{Swarm, TickReport};

/// Run the simulation for the configured number of ticks.
///
/// Output lands in a fresh timestamped directory below `output_dir`. The run
/// report is written even when the run stops early on Ctrl+C.
pub fn cmd_run(config: &Config) -> anyhow::Result<()> {
    let started = Local::now();
    let dir = report::run_dir(Path::new(&config.output_dir), &started);
    let label = started.format("%Y%m%d-%H%M%S").to_string();

    println!(
        "Running beamswarm (agents={}, walkers={}, timesteps={}, oracle={})...",
        config.agents_count,
        config.agents_walkers,
        config.timesteps,
        config.oracle.as_str()
    );

    let recorder = RunRecorder::create(&dir, config.report_every, &label)
        .with_context(|| format!("failed to create run directory {}", dir.display()))?;
    let mut run_report = RunReport::new(config, &started);
    let mut swarm = Swarm::new(config.clone());
    let signal = ShutdownSignal::global();

    let mut last: Option<TickReport> = None;
    let outcome = swarm.run(config.timesteps, &signal, |swarm, tick| {
        if let Err(e) = recorder.record(&swarm.snapshot()) {
            warn!(tick = tick.tick, error = %e, "failed to record tick");
        }
        last = Some(tick.clone());
        Ok::<(), anyhow::Error>(())
    });

    // Write whatever was reached before reporting a failure.
    let (ticks_run, interrupted) = match &outcome {
        Ok(summary) => (summary.ticks_run, summary.interrupted),
        Err(_) => (swarm.tick_count(), false),
    };
    run_report.finish(ticks_run, interrupted, last.as_ref());
    let path = run_report
        .write(recorder.dir())
        .with_context(|| format!("failed to write run report to {}", recorder.dir().display()))?;
    outcome.context("simulation aborted")?;

    info!(ticks = ticks_run, beams = run_report.beams, "run finished");
    if interrupted {
        println!("\nStopped after {} tick(s).", ticks_run);
    }
    println!(
        "Built {} beam(s), max height {:.2}, in {} tick(s).",
        run_report.beams, run_report.max_height, ticks_run
    );
    println!("Run data: {}", path.display());
    Ok(())
}
