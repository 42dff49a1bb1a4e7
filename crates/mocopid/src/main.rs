//! mocopid: mocopi motion-stream receiver daemon.

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::time::MissedTickBehavior;

use mocopi_core::config::MocopiConfig;
use mocopi_receiver::{Receiver, ReceiverStats, UdpTransport};

mod cli;
mod status;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Args::parse(std::env::args().skip(1))?;
    if args.help {
        cli::print_usage();
        return Ok(());
    }

    // Load config
    if let Err(e) = MocopiConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let mut config = MocopiConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        MocopiConfig::default()
    });
    args.apply(&mut config);
    tracing::info!(
        port = config.network.port,
        tick_hz = config.network.tick_hz,
        scene_scale = config.skeleton.scene_scale,
        json = config.output.json,
        "mocopid starting"
    );

    let mut receiver = Receiver::<UdpTransport>::new(config.skeleton.scene_scale)
        .context("failed to build dispatch tree")?;
    receiver
        .setup(config.network.port)
        .with_context(|| format!("failed to listen on UDP port {}", config.network.port))?;

    // ── Timers ───────────────────────────────────────────────────────────────

    let tick_period = Duration::from_secs_f64(1.0 / f64::from(config.network.tick_hz.max(1)));
    let mut ticker = tokio::time::interval(tick_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // an interval of 0 disables status lines
    let status_secs = config.output.status_interval_secs;
    let mut status_timer = tokio::time::interval(Duration::from_secs(status_secs.max(1)));
    status_timer.tick().await;
    let mut last_status = ReceiverStats::default();

    // ── Main loop ────────────────────────────────────────────────────────────

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("shutdown signal received");
                break;
            }
            _ = ticker.tick() => {
                let tick = receiver.update();
                if config.output.json && tick.accepted > 0 {
                    match status::snapshot_line(&receiver) {
                        Ok(line) => println!("{line}"),
                        Err(e) => tracing::warn!(error = %e, "failed to serialize snapshot"),
                    }
                }
            }
            _ = status_timer.tick(), if status_secs > 0 => {
                status::log_status(&receiver, &mut last_status);
            }
        }
    }

    receiver.close();
    let stats = receiver.stats();
    tracing::info!(
        ticks = stats.ticks,
        accepted = stats.accepted,
        rejected = stats.rejected,
        bytes = stats.bytes,
        "mocopid stopped"
    );
    Ok(())
}
