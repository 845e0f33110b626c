//! CLI entry point for rc-daq
//!
//! Drives the simulated chassis from the command line:
//! - relay control (`relays`, `relay`, `state`, `disable-enabled`, `disable-all`, `sync`)
//! - charge/discharge sequences (`charge`, `release`, `discharge`)
//! - acquisition (`read`, `acquire`, `stream`)
//!
//! # Usage
//!
//! ```bash
//! rc-daq relay zk2_1 on
//! rc-daq discharge cs1 rz2 --duration 0.5
//! rc-daq acquire --rate 1000 --time 2
//! ```

// Global allocator (Microsoft Rust Guidelines: M-MIMALLOC-APPS)
#[cfg(not(test))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use rc_core::error::RigResult;
use rc_daq::config::Settings;
use rc_daq::logging;
use rc_daq::requests::{DischargeRequest, FiniteReadRequest, StartRequest};
use rc_daq::rig::Rig;
use rc_daq::streaming::{StreamCommand, StreamEvent};
use tokio::sync::mpsc;
use tracing::info;

#[derive(Parser)]
#[command(name = "rc-daq")]
#[command(about = "Relay sequencing and transient acquisition for the RC rig", long_about = None)]
struct Cli {
    /// Configuration file (TOML); defaults to config/rc_daq.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Switch {
    On,
    Off,
}

#[derive(Subcommand)]
enum Commands {
    /// List every relay grouped by module
    Relays,

    /// Switch one relay
    Relay {
        /// Relay name (e.g. zk2_1)
        name: String,
        state: Switch,
    },

    /// Show the state of one relay
    State { name: String },

    /// Turn OFF every relay currently believed ON
    DisableEnabled,

    /// Turn OFF every relay
    DisableAll,

    /// Refresh cached relay states from the hardware
    Sync,

    /// Charge a capacitor and leave it charging
    Charge {
        /// Capacitor code (cs1..cs4)
        capacitor: String,
    },

    /// Turn main power and R2 OFF after a charge
    Release,

    /// Discharge a capacitor through a resistor
    Discharge {
        /// Capacitor code (cs1..cs4)
        capacitor: String,
        /// Discharge resistor code (rz1..rz4)
        resistor: String,
        /// Seconds
        #[arg(long, default_value_t = 1.0)]
        duration: f64,
    },

    /// One-shot finite read, optionally after charging
    Read {
        #[arg(long)]
        samples: Option<usize>,
        #[arg(long)]
        rate: Option<f64>,
        /// Capacitor to charge before reading
        #[arg(long)]
        charge: Option<String>,
    },

    /// Continuous acquisition: start, wait, stop
    Acquire {
        #[arg(long)]
        samples: Option<usize>,
        #[arg(long)]
        rate: Option<f64>,
        /// Measurement window in seconds
        #[arg(long)]
        time: Option<f64>,
    },

    /// Stream small reads as JSON lines
    Stream {
        #[arg(long)]
        rate: Option<f64>,
        #[arg(long)]
        interval_ms: Option<u64>,
        /// How long to stream, in seconds
        #[arg(long, default_value_t = 1.0)]
        duration: f64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    logging::init_from_settings(&settings)?;
    info!(app = %settings.application.name, "Starting");

    let rig = Arc::new(Rig::simulated(settings));
    run(cli.command, rig).await
}

async fn run(command: Commands, rig: Arc<Rig>) -> Result<()> {
    match command {
        Commands::Relays => {
            for (module, relays) in rig.gateway().relays_by_module() {
                let names: Vec<String> = relays.iter().map(|r| r.name()).collect();
                println!("{}: {}", module, names.join(" "));
            }
        }
        Commands::Relay { name, state } => {
            let on = matches!(state, Switch::On);
            blocking(&rig, move |rig| rig.gateway().set_relay(&name, on)).await?;
        }
        Commands::State { name } => {
            let label = name.clone();
            let on = blocking(&rig, move |rig| rig.gateway().get_relay_state(&name)).await?;
            println!("{}: {}", label, if on { "ON" } else { "OFF" });
        }
        Commands::DisableEnabled => {
            let disabled = blocking(&rig, |rig| rig.gateway().disable_enabled()).await?;
            println!("Disabled {} relay(s)", disabled.len());
        }
        Commands::DisableAll => {
            let disabled = blocking(&rig, |rig| rig.gateway().disable_all()).await?;
            println!("Disabled {} relay(s)", disabled.len());
        }
        Commands::Sync => {
            let states = blocking(&rig, |rig| rig.gateway().sync_with_hardware()).await?;
            println!("{}", serde_json::to_string_pretty(&states)?);
        }
        Commands::Charge { capacitor } => {
            blocking(&rig, move |rig| rig.charge(&capacitor)).await?;
        }
        Commands::Release => {
            blocking(&rig, |rig| rig.release()).await?;
        }
        Commands::Discharge {
            capacitor,
            resistor,
            duration,
        } => {
            let request = DischargeRequest {
                capacitor,
                resistor,
                duration,
            };
            let plan = blocking(&rig, move |rig| rig.discharge(&request)).await?;
            println!(
                "Discharged {} through {} for {:?}",
                plan.capacitor, plan.resistor, plan.duration
            );
        }
        Commands::Read {
            samples,
            rate,
            charge,
        } => {
            let request = FiniteReadRequest {
                samples,
                sample_rate: rate,
                charge,
            };
            let result = blocking(&rig, move |rig| rig.read(&request)).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Acquire {
            samples,
            rate,
            time,
        } => {
            let request = StartRequest {
                samples,
                sample_rate: rate,
                measurement_time: time,
            };
            let config = blocking(&rig, move |rig| rig.start(&request)).await?;
            let window = time.unwrap_or(config.samples_per_channel as f64 / config.sample_rate);
            tokio::time::sleep(Duration::from_secs_f64(window)).await;
            let result = blocking(&rig, |rig| rig.stop()).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Stream {
            rate,
            interval_ms,
            duration,
        } => stream(&rig, rate, interval_ms, duration).await?,
    }
    Ok(())
}

async fn stream(rig: &Rig, rate: Option<f64>, interval_ms: Option<u64>, duration: f64) -> Result<()> {
    let (command_tx, command_rx) = mpsc::channel(8);
    let (event_tx, mut event_rx) = mpsc::channel::<StreamEvent>(64);
    let handle = tokio::spawn(rig.stream_loop().run(command_rx, event_tx));

    command_tx
        .send(StreamCommand::Start {
            sample_rate: rate,
            interval_ms,
        })
        .await?;

    let deadline = tokio::time::sleep(Duration::from_secs_f64(duration.max(0.0)));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            event = event_rx.recv() => match event {
                Some(event) => println!("{}", serde_json::to_string(&event)?),
                None => break,
            },
        }
    }

    // The loop may already have exited; a closed channel is fine here
    let _ = command_tx.send(StreamCommand::Stop).await;
    drop(command_tx);
    while let Some(event) = event_rx.recv().await {
        println!("{}", serde_json::to_string(&event)?);
    }
    handle.await?;
    Ok(())
}

/// Run a blocking rig operation on the blocking pool.
async fn blocking<T, F>(rig: &Arc<Rig>, op: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&Rig) -> RigResult<T> + Send + 'static,
{
    let rig = Arc::clone(rig);
    Ok(tokio::task::spawn_blocking(move || op(&rig)).await??)
}
