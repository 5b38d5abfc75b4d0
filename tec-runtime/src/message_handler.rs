use crate::state_manager::{PowerPhase, RunStatus};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::time::Duration;
use tec_core::settings::{DEFAULT_PLOT_CYCLES, DEFAULT_POWER_POLL_MS};
use tec_core::{BenchSettings, ChannelId, RawRunFields};

#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub power_poll: Duration,
    pub plot_cycles: usize,
    pub data_dir: PathBuf,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            power_poll: Duration::from_millis(DEFAULT_POWER_POLL_MS),
            plot_cycles: DEFAULT_PLOT_CYCLES,
            data_dir: PathBuf::from("test-data"),
        }
    }
}

impl From<&BenchSettings> for RuntimeSettings {
    fn from(settings: &BenchSettings) -> Self {
        Self {
            power_poll: settings.power_poll(),
            plot_cycles: settings.plot_cycles,
            data_dir: settings.data_dir.clone(),
        }
    }
}

#[derive(Debug)]
pub enum ControlMessage {
    StartTest(RawRunFields),
    StopTest,
    QueryRecordPath(Sender<Option<PathBuf>>),
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelSeries {
    pub channel: ChannelId,
    pub name: String,
    pub temperatures: Vec<f64>,
}

/// Read-only view of the controller, published after every tick and command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSnapshot {
    pub status: RunStatus,
    pub phase: PowerPhase,
    pub cycle: u32,
    pub voltage: f64,
    pub current: f64,
    pub elapsed: Vec<u64>,
    pub channels: Vec<ChannelSeries>,
    pub last_error: Option<String>,
    pub record_path: Option<PathBuf>,
}

impl RunSnapshot {
    pub fn idle() -> Self {
        Self {
            status: RunStatus::Idle,
            phase: PowerPhase::Off,
            cycle: 0,
            voltage: 0.0,
            current: 0.0,
            elapsed: Vec::new(),
            channels: Vec::new(),
            last_error: None,
            record_path: None,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
