use crate::channels::ChannelId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Operator input exactly as typed, before any parsing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRunFields {
    pub operator: String,
    pub current: String,
    pub voltage: String,
    pub power_on: String,
    pub power_off: String,
    pub sample_rate: String,
    pub start_cycle: String,
    pub end_cycle: String,
    /// Comma separated selection, e.g. `"ch1, ch3"`.
    pub channels: String,
    /// `(channel, display name)` overrides. Empty names fall back to the default.
    #[serde(default)]
    pub channel_names: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSelection {
    pub channel: ChannelId,
    pub display_name: String,
}

/// Validated parameters of one run. Only [`crate::validate`] builds these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub(crate) operator: String,
    pub(crate) current_setpoint: f64,
    pub(crate) voltage_setpoint: f64,
    pub(crate) power_on_secs: u32,
    pub(crate) power_off_secs: u32,
    pub(crate) sample_period_secs: u32,
    pub(crate) start_cycle: u32,
    pub(crate) end_cycle: u32,
    pub(crate) channels: Vec<ChannelSelection>,
}

impl RunConfig {
    pub fn operator(&self) -> &str {
        &self.operator
    }

    pub fn current_setpoint(&self) -> f64 {
        self.current_setpoint
    }

    pub fn voltage_setpoint(&self) -> f64 {
        self.voltage_setpoint
    }

    pub fn power_on_secs(&self) -> u32 {
        self.power_on_secs
    }

    pub fn power_off_secs(&self) -> u32 {
        self.power_off_secs
    }

    pub fn sample_period_secs(&self) -> u32 {
        self.sample_period_secs
    }

    pub fn power_on(&self) -> Duration {
        Duration::from_secs(u64::from(self.power_on_secs))
    }

    pub fn power_off(&self) -> Duration {
        Duration::from_secs(u64::from(self.power_off_secs))
    }

    pub fn sample_period(&self) -> Duration {
        Duration::from_secs(u64::from(self.sample_period_secs))
    }

    pub fn start_cycle(&self) -> u32 {
        self.start_cycle
    }

    pub fn end_cycle(&self) -> u32 {
        self.end_cycle
    }

    pub fn channels(&self) -> &[ChannelSelection] {
        &self.channels
    }

    pub fn channel_ids(&self) -> Vec<ChannelId> {
        self.channels.iter().map(|sel| sel.channel).collect()
    }

    pub fn display_names(&self) -> Vec<String> {
        self.channels
            .iter()
            .map(|sel| sel.display_name.clone())
            .collect()
    }

    /// Live-plot window: enough sample points to cover `plot_cycles` full duty cycles.
    pub fn max_plot_points(&self, plot_cycles: usize) -> usize {
        let duty_cycle = (u64::from(self.power_on_secs) + u64::from(self.power_off_secs))
            / u64::from(self.sample_period_secs);
        (duty_cycle as usize).saturating_mul(plot_cycles).max(1)
    }
}
