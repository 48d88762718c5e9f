mod cli;
mod error_fmt;
mod logging;
mod rig;
mod run;
mod store;
mod telemetry;

use std::path::PathBuf;

use clap::Parser;
use eyre::Result;
use feeder_traits::{MonotonicClock, TestClock};
use serde_json::json;
use tracing::info;

use crate::cli::{Cli, Commands, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};
use crate::rig::{Options, Rig, TimeSource};
use crate::run::{RunOpts, handle_console_line, run_loop};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    if let Err(err) = real_main(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        std::process::exit(exit_code_for_error(&err));
    }
}

fn real_main(cli: Cli) -> Result<()> {
    // Pretty reports only; errors are printed through humanize().
    let _ = color_eyre::install();

    let cfg = rig::load_config(&cli.config)?;
    logging::init_tracing(cli.json, &cli.log_level, &cfg.logging)?;
    info!(config = %cli.config.display(), "configuration loaded");

    let state_dir = cli
        .state_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(&cfg.persistence.state_dir));
    let options = |time: TimeSource, show_display: bool| Options {
        state_dir: state_dir.clone(),
        bowl_calibration: cli.bowl_calibration.as_deref(),
        tank_calibration: cli.tank_calibration.as_deref(),
        time,
        show_display,
    };

    match &cli.cmd {
        Commands::Run {
            ticks,
            tick_ms,
            virtual_time,
            no_console,
        } => {
            let time = if *virtual_time {
                TimeSource::Virtual(TestClock::new())
            } else {
                TimeSource::Wall(MonotonicClock::new())
            };
            let mut rig = rig::build(&cfg, options(time, !cli.json))?;
            let summary = run_loop(
                &mut rig,
                &RunOpts {
                    ticks: *ticks,
                    tick_ms: *tick_ms,
                    console: !*no_console,
                    json: cli.json,
                },
            )?;
            let s = rig.feeder.state();
            if cli.json {
                println!(
                    "{}",
                    json!({
                        "ticks": summary.ticks,
                        "dispensed": summary.dispensed,
                        "denied": summary.denied,
                        "failed": summary.failed,
                        "rollovers": summary.rollovers,
                        "day_cycle": s.day_cycle,
                        "portion_g": s.portion_size_g,
                        "interval_ms": s.feed_interval_ms,
                        "events": rig.feeder.events().len(),
                        "emergency": rig.feeder.emergency_cause().map(|c| c.to_string()),
                    })
                );
            } else {
                println!(
                    "Stopped after {} ticks: {} dispensed, {} denied, {} failed, day {}.",
                    summary.ticks, summary.dispensed, summary.denied, summary.failed, s.day_cycle
                );
            }
            Ok(())
        }
        Commands::Exec { words } => {
            let mut rig = rig::build(&cfg, options(TimeSource::Virtual(TestClock::new()), false))?;
            // One pass so the first sensor readings are in.
            rig.feeder.tick();
            let line = words.join(" ");
            let reply = handle_console_line(&mut rig, &line);
            if cli.json {
                println!("{}", json!({ "command": line, "reply": reply }));
            } else {
                println!("{reply}");
            }
            Ok(())
        }
        Commands::SelfCheck => {
            let rig = rig::build(&cfg, options(TimeSource::Virtual(TestClock::new()), false))?;
            self_check(rig, cli.json)
        }
    }
}

fn self_check(mut rig: Rig, json_out: bool) -> Result<()> {
    rig.feeder.tick();
    let s = rig.feeder.state();
    let ok = s.sensors_valid && rig.feeder.emergency_cause().is_none();
    if json_out {
        println!(
            "{}",
            json!({
                "ok": ok,
                "sensors_valid": s.sensors_valid,
                "bowl_g": s.bowl_level_g,
                "tank_g": s.tank_level_g,
                "mode": s.mode,
                "state_dir": rig.store_dir.display().to_string(),
            })
        );
    } else {
        println!("{}", rig.feeder.handle_line("sensors"));
        println!("{}", if ok { "OK" } else { "NOT OK" });
    }
    if !ok {
        eyre::bail!("self-check failed: sensors did not produce valid readings");
    }
    Ok(())
}
