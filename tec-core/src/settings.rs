use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const MIN_POWER_POLL_MS: u64 = 10;
pub const DEFAULT_POWER_POLL_MS: u64 = 500;
pub const DEFAULT_PLOT_CYCLES: usize = 5;

/// Fixed properties of the bench: where the instruments live and how often
/// the supply is polled. Read once at startup, never written back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchSettings {
    /// VISA-style resource string of the programmable supply.
    pub power_supply: String,
    /// VISA-style resource string of the scanning multimeter.
    pub thermometer: String,
    pub timeout_ms: u64,
    pub baud_rate: u32,
    pub power_poll_ms: u64,
    /// Number of duty cycles kept in the live series.
    pub plot_cycles: usize,
    pub data_dir: PathBuf,
}

impl Default for BenchSettings {
    fn default() -> Self {
        Self {
            power_supply: String::new(),
            thermometer: String::new(),
            timeout_ms: 1000,
            baud_rate: 9600,
            power_poll_ms: DEFAULT_POWER_POLL_MS,
            plot_cycles: DEFAULT_PLOT_CYCLES,
            data_dir: PathBuf::from("test-data"),
        }
    }
}

impl BenchSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn power_poll(&self) -> Duration {
        Duration::from_millis(self.power_poll_ms)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SettingsError {
    #[error("failed to read bench settings '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse bench settings '{path}': {source}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },
}

pub fn normalize_bench_settings(mut settings: BenchSettings) -> BenchSettings {
    if settings.power_poll_ms < MIN_POWER_POLL_MS {
        log::warn!(
            "power_poll_ms {} below minimum, using {MIN_POWER_POLL_MS}",
            settings.power_poll_ms
        );
        settings.power_poll_ms = MIN_POWER_POLL_MS;
    }
    settings.plot_cycles = settings.plot_cycles.max(1);
    settings.power_supply = settings.power_supply.trim().to_string();
    settings.thermometer = settings.thermometer.trim().to_string();
    settings
}

pub fn parse_bench_settings(text: &str) -> Result<BenchSettings, toml::de::Error> {
    let settings: BenchSettings = toml::from_str(text)?;
    Ok(normalize_bench_settings(settings))
}

pub fn load_bench_settings(path: &Path) -> Result<BenchSettings, SettingsError> {
    let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_bench_settings(&text).map_err(|source| SettingsError::Toml {
        path: path.to_path_buf(),
        source,
    })
}
