//! The long-running control loop with a stdin console.

use std::io::{self, BufRead};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{self as xch, Receiver};
use eyre::{Result, WrapErr};
use feeder_core::command::{Command, parse};
use feeder_core::{FeedOutcome, Feeder, TickReport};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::rig::{Rig, TimeSource};

const CONSOLE_QUEUE: usize = 16;

pub struct RunOpts {
    pub ticks: Option<u64>,
    pub tick_ms: u64,
    pub console: bool,
    pub json: bool,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RunSummary {
    pub ticks: u64,
    pub dispensed: u64,
    pub denied: u64,
    pub failed: u64,
    pub rollovers: u64,
}

/// Forward stdin lines to the loop; the channel closes at EOF.
fn spawn_console() -> Receiver<String> {
    let (tx, rx) = xch::bounded(CONSOLE_QUEUE);
    thread::Builder::new()
        .name("console".into())
        .spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(l) => {
                        if tx.send(l).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "console read failed");
                        break;
                    }
                }
            }
            debug!("console closed");
        })
        .map(|_| ())
        .unwrap_or_else(|e| warn!(error = %e, "console thread not started"));
    rx
}

/// Run one console line, keeping the simulated world in step with commands
/// that describe physical actions.
pub fn handle_console_line(rig: &mut Rig, line: &str) -> String {
    if let (Ok(Command::FillTank), Some(world)) = (parse(line), rig.world.as_ref()) {
        world.pantry.fill_tank();
    }
    rig.feeder.handle_line(line)
}

fn report_tick(feeder: &Feeder, report: &TickReport, json: bool, summary: &mut RunSummary) {
    summary.rollovers += report.rollovers;
    let Some(outcome) = &report.feed else {
        return;
    };
    let line = match outcome {
        FeedOutcome::Dispensed(e) => {
            summary.dispensed += 1;
            if json {
                json!({
                    "event": "dispensed",
                    "t_ms": e.timestamp_ms,
                    "mode": e.mode,
                    "portion_g": e.requested_g,
                    "bowl_g": feeder.state().bowl_level_g,
                })
                .to_string()
            } else {
                format!(
                    "[{:>8.1}s] dispensed {} g ({})",
                    e.timestamp_ms as f64 / 1000.0,
                    e.requested_g,
                    e.mode
                )
            }
        }
        FeedOutcome::Denied(reason) => {
            summary.denied += 1;
            if json {
                json!({ "event": "denied", "reason": reason.code(), "message": reason.to_string() })
                    .to_string()
            } else {
                format!("feed denied: {reason}")
            }
        }
        FeedOutcome::Failed(err) => {
            summary.failed += 1;
            if json {
                json!({ "event": "failed", "message": err.to_string() }).to_string()
            } else {
                format!("feed failed: {err}")
            }
        }
    };
    println!("{line}");
}

pub fn run_loop(rig: &mut Rig, opts: &RunOpts) -> Result<RunSummary> {
    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))
            .wrap_err("install Ctrl-C handler")?;
    }
    let console = opts.console.then(spawn_console);
    let clock = rig.time.boxed();
    let epoch = clock.now();
    let tick = Duration::from_millis(opts.tick_ms.max(1));
    let mut summary = RunSummary::default();

    info!(tick_ms = opts.tick_ms, ticks = ?opts.ticks, "control loop started");
    while !stop.load(Ordering::SeqCst) && opts.ticks.is_none_or(|n| summary.ticks < n) {
        if let Some(rx) = &console {
            for line in rx.try_iter() {
                let reply = handle_console_line(rig, &line);
                println!("{reply}");
            }
        }

        let report = rig.feeder.tick();
        report_tick(&rig.feeder, &report, opts.json, &mut summary);
        if let Some(world) = rig.world.as_mut() {
            world.step(clock.ms_since(epoch));
        }
        summary.ticks += 1;

        match &rig.time {
            TimeSource::Virtual(c) => c.advance(tick),
            TimeSource::Wall(c) => feeder_traits::Clock::sleep(c, tick),
        }
    }
    info!(
        ticks = summary.ticks,
        dispensed = summary.dispensed,
        denied = summary.denied,
        "control loop stopped"
    );
    Ok(summary)
}
