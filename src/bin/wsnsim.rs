//! Wireless sensor network access protocol simulator.
//!
//! ```bash
//! # CSMA/CA with the default parameters
//! wsnsim csma --seed 42
//!
//! # Dual-beacon discovery, parameters from a YAML file
//! wsnsim dual-beacon scenario.yml --quiet
//! ```
//!
//! The protocol report is printed first, followed by `---` and a YAML dump of
//! the final shared environment. `RUST_LOG` controls the log output.

use clap::{Parser, ValueEnum};
use std::{error::Error, path::PathBuf, process::ExitCode};
use wsnsim::prelude::*;

/// Simulates a wireless sensor network access protocol.
#[derive(Debug, Parser)]
#[command(name = "wsnsim")]
#[command(version, about, long_about = None)]
struct Cli {
    /// The protocol to simulate.
    #[arg(value_enum)]
    protocol: Protocol,

    /// YAML parameter file (model defaults if not specified).
    config: Option<PathBuf>,

    /// Seed of the random generator (seeded from the OS if not specified).
    #[arg(short, long)]
    seed: Option<u64>,

    /// Suppress the runtime start and end banners.
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Protocol {
    /// Slotted CSMA/CA between sensor nodes and one sink.
    Csma,
    /// Mobile sink dual-beacon discovery with stop-and-wait ARQ.
    DualBeacon,
}

impl Cli {
    fn builder(&self) -> Builder {
        let builder = match self.seed {
            Some(seed) => Builder::seeded(seed),
            None => Builder::new(),
        };
        if self.quiet {
            builder.quiet()
        } else {
            builder
        }
    }

    fn run(&self) -> Result<(), Box<dyn Error>> {
        let env = match self.protocol {
            Protocol::Csma => {
                let config = match &self.config {
                    Some(path) => CsmaConfig::from_file(path)?,
                    None => CsmaConfig::default(),
                };
                let (app, time, profiler) = self.builder().build(CsmaApp::new(config)).run()?;
                tracing::info!(%time, events = profiler.event_count, "done");
                print!("{}", app.report());
                app.env
            }
            Protocol::DualBeacon => {
                let config = match &self.config {
                    Some(path) => DualBeaconConfig::from_file(path)?,
                    None => DualBeaconConfig::default(),
                };
                let (app, time, profiler) =
                    self.builder().build(DualBeaconApp::new(config)).run()?;
                tracing::info!(%time, events = profiler.event_count, "done");
                print!("{}", app.report());
                app.env
            }
        };

        println!("---");
        print!("{}", serde_yml::to_string(&env.snapshot())?);
        Ok(())
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    wsnsim::logger::init();

    match cli.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
