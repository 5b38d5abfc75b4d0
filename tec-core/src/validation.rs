use crate::channels::{parse_selection, ChannelId};
use crate::config::{ChannelSelection, RawRunFields, RunConfig};
use std::fmt;

/// Input fields in the order they are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Operator,
    Current,
    Voltage,
    PowerOn,
    PowerOff,
    SampleRate,
    StartCycle,
    EndCycle,
    Channels,
    CycleRange,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Field::Operator => "Operator",
            Field::Current => "Current I (A)",
            Field::Voltage => "Voltage (V)",
            Field::PowerOn => "Power On (sec)",
            Field::PowerOff => "Power Off (sec)",
            Field::SampleRate => "Sample Rate (sec)",
            Field::StartCycle => "Start Cycle",
            Field::EndCycle => "End Cycle",
            Field::Channels => "Channels",
            Field::CycleRange => "Cycle Range",
        };
        f.write_str(label)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("enter the operator name")]
    MissingOperator,
    #[error("enter a valid current input (got '{0}')")]
    InvalidCurrent(String),
    #[error("enter a valid voltage input (got '{0}')")]
    InvalidVoltage(String),
    #[error("enter a valid power on time in whole seconds (got '{0}')")]
    InvalidPowerOn(String),
    #[error("enter a valid power off time in whole seconds (got '{0}')")]
    InvalidPowerOff(String),
    #[error("enter a valid sample rate in whole seconds (got '{0}')")]
    InvalidSampleRate(String),
    #[error("enter a valid start cycle (got '{0}')")]
    InvalidStartCycle(String),
    #[error("enter a valid end cycle (got '{0}')")]
    InvalidEndCycle(String),
    #[error("select at least one channel to use")]
    NoChannels,
    #[error("unknown channel '{0}'")]
    UnknownChannel(String),
    #[error("end cycle {end} must not be lower than start cycle {start}")]
    CycleRange { start: u32, end: u32 },
}

impl ValidationError {
    pub fn field(&self) -> Field {
        match self {
            ValidationError::MissingOperator => Field::Operator,
            ValidationError::InvalidCurrent(_) => Field::Current,
            ValidationError::InvalidVoltage(_) => Field::Voltage,
            ValidationError::InvalidPowerOn(_) => Field::PowerOn,
            ValidationError::InvalidPowerOff(_) => Field::PowerOff,
            ValidationError::InvalidSampleRate(_) => Field::SampleRate,
            ValidationError::InvalidStartCycle(_) => Field::StartCycle,
            ValidationError::InvalidEndCycle(_) => Field::EndCycle,
            ValidationError::NoChannels | ValidationError::UnknownChannel(_) => Field::Channels,
            ValidationError::CycleRange { .. } => Field::CycleRange,
        }
    }
}

/// Turns raw operator text into a [`RunConfig`], stopping at the first bad field.
pub fn validate(raw: &RawRunFields) -> Result<RunConfig, ValidationError> {
    let operator = raw.operator.trim();
    if operator.is_empty() {
        return Err(ValidationError::MissingOperator);
    }
    let current_setpoint = parse_setpoint(&raw.current)
        .ok_or_else(|| ValidationError::InvalidCurrent(raw.current.clone()))?;
    let voltage_setpoint = parse_setpoint(&raw.voltage)
        .ok_or_else(|| ValidationError::InvalidVoltage(raw.voltage.clone()))?;
    let power_on_secs = parse_positive_secs(&raw.power_on)
        .ok_or_else(|| ValidationError::InvalidPowerOn(raw.power_on.clone()))?;
    let power_off_secs = parse_positive_secs(&raw.power_off)
        .ok_or_else(|| ValidationError::InvalidPowerOff(raw.power_off.clone()))?;
    let sample_period_secs = parse_positive_secs(&raw.sample_rate)
        .ok_or_else(|| ValidationError::InvalidSampleRate(raw.sample_rate.clone()))?;
    let start_cycle = raw
        .start_cycle
        .trim()
        .parse::<u32>()
        .map_err(|_| ValidationError::InvalidStartCycle(raw.start_cycle.clone()))?;
    let end_cycle = raw
        .end_cycle
        .trim()
        .parse::<u32>()
        .map_err(|_| ValidationError::InvalidEndCycle(raw.end_cycle.clone()))?;
    let channels = parse_channels(raw)?;
    if end_cycle < start_cycle {
        return Err(ValidationError::CycleRange {
            start: start_cycle,
            end: end_cycle,
        });
    }

    Ok(RunConfig {
        operator: operator.to_string(),
        current_setpoint,
        voltage_setpoint,
        power_on_secs,
        power_off_secs,
        sample_period_secs,
        start_cycle,
        end_cycle,
        channels,
    })
}

/// Accepts both `1.5` and `1,5`.
pub fn parse_setpoint(text: &str) -> Option<f64> {
    let value = text.trim().replace(',', ".").parse::<f64>().ok()?;
    if value.is_finite() && value >= 0.0 {
        Some(value)
    } else {
        None
    }
}

fn parse_positive_secs(text: &str) -> Option<u32> {
    text.trim().parse::<u32>().ok().filter(|secs| *secs > 0)
}

fn parse_channels(raw: &RawRunFields) -> Result<Vec<ChannelSelection>, ValidationError> {
    let selected =
        parse_selection(&raw.channels).map_err(|err| ValidationError::UnknownChannel(err.0))?;
    if selected.is_empty() {
        return Err(ValidationError::NoChannels);
    }

    let mut overrides: Vec<(ChannelId, String)> = Vec::with_capacity(raw.channel_names.len());
    for (channel, name) in &raw.channel_names {
        let channel: ChannelId = channel
            .parse()
            .map_err(|_| ValidationError::UnknownChannel(channel.trim().to_string()))?;
        let name = name.trim();
        if !name.is_empty() {
            overrides.push((channel, name.to_string()));
        }
    }

    Ok(selected
        .into_iter()
        .map(|channel| {
            let display_name = overrides
                .iter()
                .rev()
                .find(|(id, _)| *id == channel)
                .map(|(_, name)| name.clone())
                .unwrap_or_else(|| channel.default_display_name());
            ChannelSelection {
                channel,
                display_name,
            }
        })
        .collect())
}
