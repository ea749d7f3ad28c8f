use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sig8648::transport::Backend;
use sig8648::{GeneratorConfig, SignalGenerator};

#[derive(Parser)]
#[command(name = "sig8648")]
#[command(about = "Drive an Agilent 8648 signal generator over GPIB/VISA", long_about = None)]
struct Cli {
    /// TOML file with generator settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Resource string, e.g. GPIB0::19::INSTR or TCPIP0::host::5025::SOCKET
    #[arg(long)]
    resource: Option<String>,

    /// Communication backend: visa, tcp or simulated
    #[arg(long)]
    backend: Option<Backend>,

    /// Talk to a simulated generator instead of hardware
    #[arg(long, conflicts_with = "backend")]
    simulate: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the *IDN? identity string
    Idn,
    /// Send a raw SCPI command; commands containing '?' print the reply
    Send { command: String },
    /// 100 MHz, -40 dBm, RF on
    Defaults,
    /// Switch RF output on or off
    Rf { state: String },
    /// Set CW frequency, e.g. "250 MHZ"
    Freq { value: String },
    /// Set amplitude, must be below 0 dBm, e.g. "-30 DBM"
    Amp {
        #[arg(allow_hyphen_values = true)]
        value: String,
    },
    /// Read back frequency and amplitude
    Read,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => GeneratorConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => GeneratorConfig::default(),
    };
    if let Some(resource) = cli.resource {
        config.resource = Some(resource);
    }
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    if cli.simulate {
        config.backend = Backend::Simulated;
    }

    let manager = config.backend.manager()?;
    let mut sg = SignalGenerator::new(config, manager);
    sg.connect()?;

    match cli.command {
        Commands::Idn => println!("{}", sg.identify()?),
        Commands::Send { command } => {
            if let Some(response) = sg.send(&command)? {
                println!("{response}");
            }
        }
        Commands::Defaults => sg.set_defaults()?,
        Commands::Rf { state } => sg.set_rf_output(&state)?,
        Commands::Freq { value } => sg.set_frequency(&value)?,
        Commands::Amp { value } => sg.set_amplitude(&value)?,
        Commands::Read => {
            let (freq, amp) = sg.get_frequency_and_amplitude()?;
            println!("{freq}\n{amp}");
        }
    }

    sg.disconnect();
    Ok(())
}
