//! mocopi-sim: sends a synthetic mocopi stream over UDP.
//!
//! One skeleton definition first, then frames at a fixed rate. The
//! definition is repeated periodically so a receiver started late still
//! learns the hierarchy.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::net::UdpSocket;

use mocopi_core::compose::{definition_datagram, frame_datagram, standard_topology, StreamHeader};
use mocopi_core::wire::DEFAULT_PORT;

mod motion;

struct Args {
    target: SocketAddr,
    frames: Option<u32>,
    hz: u32,
    redefine_every: u32,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        target: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
        frames: None,
        hz: 50,
        redefine_every: 100,
    };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        let mut value = |name: &str| it.next().with_context(|| format!("{name} requires a value"));
        match arg.as_str() {
            "--target" => args.target = value("--target")?.parse().context("--target must be ip:port")?,
            "--frames" => args.frames = Some(value("--frames")?.parse().context("--frames must be a number")?),
            "--hz" => args.hz = value("--hz")?.parse().context("--hz must be a number")?,
            "--redefine-every" => {
                args.redefine_every = value("--redefine-every")?
                    .parse()
                    .context("--redefine-every must be a number")?
            }
            "--help" | "-h" => {
                println!("Usage: mocopi-sim [--target ip:port] [--frames N] [--hz N] [--redefine-every N]");
                std::process::exit(0);
            }
            other => bail!("unknown argument: {other}"),
        }
    }
    if args.hz == 0 {
        bail!("--hz must be at least 1");
    }
    Ok(args)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = parse_args()?;
    let socket = UdpSocket::bind("0.0.0.0:0")
        .await
        .context("failed to bind sender socket")?;
    let local = socket.local_addr()?;

    let header = StreamHeader {
        sender_port: local.port(),
        ..StreamHeader::default()
    };
    let definition = definition_datagram(&header, &standard_topology())?;

    tracing::info!(target = %args.target, hz = args.hz, frames = ?args.frames, "mocopi-sim sending");

    let period = Duration::from_secs_f64(1.0 / f64::from(args.hz));
    let mut interval = tokio::time::interval(period);
    let mut frame: u32 = 0;

    loop {
        if args.frames.is_some_and(|n| frame >= n) {
            break;
        }
        interval.tick().await;

        if args.redefine_every > 0 && frame % args.redefine_every == 0 {
            socket.send_to(&definition, args.target).await?;
            tracing::debug!(len = definition.len(), "definition sent");
        }

        let t = frame as f32 / args.hz as f32;
        let timestamp = (t * 1000.0) as u32;
        let datagram = frame_datagram(&header, frame, timestamp, &motion::pose_at(t))?;
        socket.send_to(&datagram, args.target).await?;
        tracing::trace!(frame, len = datagram.len(), "frame sent");

        frame += 1;
    }

    tracing::info!(frames = frame, "mocopi-sim done");
    Ok(())
}
