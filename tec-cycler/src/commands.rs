use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tec_core::RawRunFields;

#[derive(Parser)]
#[command(name = "tec-cycler", version, about = "TEC power cycling test bench")]
pub struct Cli {
    /// Bench settings file (TOML)
    #[arg(long, global = true)]
    pub bench: Option<PathBuf>,
    /// Use the simulated bench instead of the instruments
    #[arg(long, global = true)]
    pub dummy: bool,
    /// Print every snapshot as one JSON line
    #[arg(long, global = true)]
    pub json: bool,
    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a cycling test until the end cycle or until `stop` is typed
    Run(RunArgs),
    /// Copy a finished record file
    Export {
        record: PathBuf,
        dest: PathBuf,
        /// Overwrite without asking
        #[arg(long)]
        force: bool,
    },
}

/// Values are passed through as typed; the runtime validates them.
#[derive(Args)]
pub struct RunArgs {
    #[arg(long)]
    pub operator: String,
    /// Current setpoint in A (`.` or `,` decimal separator)
    #[arg(long)]
    pub current: String,
    /// Voltage setpoint in V
    #[arg(long)]
    pub voltage: String,
    /// Seconds the supply stays on per cycle
    #[arg(long, allow_hyphen_values = true)]
    pub power_on: String,
    /// Seconds the supply stays off per cycle
    #[arg(long, allow_hyphen_values = true)]
    pub power_off: String,
    /// Seconds between samples
    #[arg(long, allow_hyphen_values = true)]
    pub sample_rate: String,
    #[arg(long, allow_hyphen_values = true)]
    pub start_cycle: String,
    #[arg(long, allow_hyphen_values = true)]
    pub end_cycle: String,
    /// Comma separated channels, e.g. "ch1, ch3"
    #[arg(long)]
    pub channels: String,
    /// Display name override, repeatable
    #[arg(long = "name", value_name = "CHANNEL=NAME", value_parser = parse_name_override)]
    pub names: Vec<(String, String)>,
    /// Copy the record here once the test ends
    #[arg(long)]
    pub export: Option<PathBuf>,
    /// Overwrite the export destination without asking
    #[arg(long)]
    pub force: bool,
}

impl RunArgs {
    pub fn raw_fields(&self) -> RawRunFields {
        RawRunFields {
            operator: self.operator.clone(),
            current: self.current.clone(),
            voltage: self.voltage.clone(),
            power_on: self.power_on.clone(),
            power_off: self.power_off.clone(),
            sample_rate: self.sample_rate.clone(),
            start_cycle: self.start_cycle.clone(),
            end_cycle: self.end_cycle.clone(),
            channels: self.channels.clone(),
            channel_names: self.names.clone(),
        }
    }
}

fn parse_name_override(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((channel, name)) if !channel.trim().is_empty() => {
            Ok((channel.trim().to_string(), name.trim().to_string()))
        }
        _ => Err(format!("expected CHANNEL=NAME, got '{value}'")),
    }
}
