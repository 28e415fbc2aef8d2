// src/main.rs - Command line front end for the block translation layer

use clap::{Parser, Subcommand};
use firmbridge::catalog::block_catalog;
use firmbridge::{BlockArgs, Dispatcher, SimulatedSession};
use firmbridge_shared::board_config::DEVICE_PROFILES;
use firmbridge_shared::config::{self, Config};
use firmbridge_shared::{ConnectionMode, DeviceProfile, Pin, PinRole, ToneRequest};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Firmbridge CLI
#[derive(Parser, Debug)]
#[command(name = "firmbridge", about = "Translate editor blocks into device commands.")]
struct Cli {
    /// Path to a TOML config file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log every command sent to the device
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the block catalog for the configured device as JSON
    Catalog,
    /// List known device profiles and their pin roles
    Devices,
    /// Print the steps of a tone sweep
    Bend {
        #[arg(long)]
        from: f64,
        #[arg(long)]
        to: f64,
        #[arg(long)]
        step: f64,
        #[arg(long, default_value_t = 100)]
        duration: u32,
        #[arg(long, default_value_t = 0)]
        silence: u32,
    },
    /// Run one block against a simulated device (e.g. exec setPwmOutput PIN=D3 OUT=128)
    Exec {
        /// interactive or upload
        #[arg(long)]
        mode: Option<ConnectionMode>,
        opcode: String,
        #[arg(value_parser = parse_key_val)]
        args: Vec<(String, String)>,
    },
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    match s.find('=') {
        Some(pos) => Ok((s[..pos].to_string(), s[pos + 1..].to_string())),
        None => Err(format!("Invalid KEY=VAL: no `=` found in '{}'.", s)),
    }
}

#[derive(Serialize)]
struct DeviceListing<'a> {
    #[serde(flatten)]
    profile: &'a DeviceProfile,
    board: &'static str,
    pins: Vec<(Pin, Vec<PinRole>)>,
}

fn listing(profile: &DeviceProfile) -> DeviceListing<'_> {
    let registry = profile.registry();
    let pins = registry
        .pins_with(PinRole::Digital)
        .into_iter()
        .map(|pin| {
            let mut roles: Vec<PinRole> = registry
                .roles(pin)
                .map(|r| r.iter().copied().collect())
                .unwrap_or_default();
            roles.sort();
            (pin, roles)
        })
        .collect();
    DeviceListing {
        profile,
        board: profile.board.name,
        pins,
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => {
            let path = path.to_string_lossy();
            tracing::info!("Loading configuration from: {}", path);
            config::load_config(&path)?
        }
        None => Config::default(),
    };

    match cli.command {
        Commands::Catalog => {
            let profile = config.device_profile()?;
            println!("{}", serde_json::to_string_pretty(&block_catalog(profile))?);
        }
        Commands::Devices => {
            let devices: Vec<DeviceListing> = DEVICE_PROFILES.iter().map(|p| listing(p)).collect();
            println!("{}", serde_json::to_string_pretty(&devices)?);
        }
        Commands::Bend {
            from,
            to,
            step,
            duration,
            silence,
        } => {
            let tone = ToneRequest::new(from, to, step, duration, silence)?;
            for tone_step in tone.steps() {
                println!("{:.2} Hz  {} ms", tone_step.frequency_hz, tone_step.duration_ms);
            }
            println!("silence {} ms", tone.trailing_silence_ms());
        }
        Commands::Exec { mode, opcode, args } => {
            let session = Arc::new(SimulatedSession::new());
            let dispatcher = Dispatcher::new(&config, session.clone())?;
            if let Some(mode) = mode {
                dispatcher.notify_mode_change(mode);
            }
            let args: BlockArgs = args.into_iter().collect();
            let result = dispatcher.dispatch_block(&opcode, &args).await;
            for line in session.lines().await {
                println!("> {}", line);
            }
            match result {
                Ok(payload) => println!("{}", serde_json::to_string(&payload)?),
                Err(e) => {
                    eprintln!("{}", e);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
