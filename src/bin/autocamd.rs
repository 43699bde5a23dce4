//! Daemon entry point: parse and validate configuration, run the one-shot
//! diagnostic modes, or hand everything to the control loop.

use anyhow::Result;
use autocam::audio::{sample_all, CpalProbe, SILENCE_FLOOR_DB};
use autocam::config::{AppConfig, SwitcherConfig};
use autocam::daemon::{install_signal_handlers, ControlLoop};
use autocam::telemetry;
use tracing::info;

fn main() -> Result<()> {
    let config = AppConfig::parse_args()?;
    telemetry::init_tracing(&config);

    if config.list_input_devices {
        list_input_devices();
        return Ok(());
    }

    let cfg = config.switcher_config()?;
    let probe = CpalProbe::new(cfg.vad_engine, cfg.silence_threshold_db);

    if config.probe_levels {
        return probe_levels(&cfg, &probe);
    }

    install_signal_handlers()?;
    info!(
        sources = cfg.sources.len(),
        policy = cfg.activity_policy.label(),
        topology = cfg.topology.label(),
        "autocam starting"
    );
    let mut control = ControlLoop::new(cfg, probe);
    control.run()
}

fn list_input_devices() {
    match CpalProbe::list_input_devices() {
        Ok(devices) if devices.is_empty() => println!("No audio input devices detected."),
        Ok(devices) => {
            println!("Detected audio input devices:");
            for name in devices {
                println!("  {name}");
            }
        }
        Err(err) => println!("Failed to list audio input devices: {err:#}"),
    }
}

/// One-shot meter: sample every configured source once, print what the
/// classifier would see, and suggest a threshold above the room's ambient.
fn probe_levels(cfg: &SwitcherConfig, probe: &CpalProbe) -> Result<()> {
    let measurements = sample_all(probe, &cfg.sources, cfg.probe_window);
    println!(
        "Per-source levels over one {}ms window:",
        cfg.probe_window.as_millis()
    );
    for measurement in &measurements {
        let label = &cfg.sources[measurement.source].label;
        println!(
            "  {:<3} {:<16} {:>8.1} dBFS  {}",
            measurement.source,
            label,
            measurement.level_db,
            measurement.decision.label()
        );
    }

    let loudest = measurements
        .iter()
        .map(|measurement| measurement.level_db)
        .fold(f32::MIN, f32::max);
    if loudest > SILENCE_FLOOR_DB {
        let suggested = (loudest + 10.0).min(-10.0);
        println!("Suggested --silence-threshold-db (run this in a quiet room): {suggested:.1}");
    } else {
        println!("All sources read as silence; check device names with --list-input-devices.");
    }
    Ok(())
}
