//! Command-line options. Anything given here wins over the config file.

use anyhow::{bail, Context, Result};

use mocopi_core::config::MocopiConfig;

#[derive(Debug, Default, PartialEq)]
pub struct Args {
    pub port: Option<u16>,
    pub tick_hz: Option<u32>,
    pub json: bool,
    pub help: bool,
}

impl Args {
    pub fn parse<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut parsed = Self::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--port" | "-p" => {
                    parsed.port = Some(
                        args.next()
                            .context("--port requires a value")?
                            .parse()
                            .context("--port must be a number between 0 and 65535")?,
                    );
                }
                "--tick-hz" => {
                    let hz: u32 = args
                        .next()
                        .context("--tick-hz requires a value")?
                        .parse()
                        .context("--tick-hz must be a number")?;
                    if hz == 0 {
                        bail!("--tick-hz must be at least 1");
                    }
                    parsed.tick_hz = Some(hz);
                }
                "--json" => parsed.json = true,
                "--help" | "-h" | "help" => parsed.help = true,
                other => bail!("unknown argument: {other}"),
            }
        }
        Ok(parsed)
    }

    pub fn apply(&self, config: &mut MocopiConfig) {
        if let Some(port) = self.port {
            config.network.port = port;
        }
        if let Some(hz) = self.tick_hz {
            config.network.tick_hz = hz;
        }
        if self.json {
            config.output.json = true;
        }
    }
}

pub fn print_usage() {
    println!("mocopid: receive a mocopi motion stream and reconstruct the skeleton");
    println!();
    println!("Usage: mocopid [--port N] [--tick-hz N] [--json]");
    println!();
    println!("  -p, --port N     UDP port to listen on (default 12351, 0 = any)");
    println!("      --tick-hz N  ingestion ticks per second (default 60)");
    println!("      --json       print a JSON snapshot after every tick with data");
    println!();
    println!("Logging is controlled by RUST_LOG, e.g. RUST_LOG=mocopid=debug");
}
