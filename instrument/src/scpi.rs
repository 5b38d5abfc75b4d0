//! Rigol DP811A supply and Keithley DMM6500 with a 10-channel scanner card.

use crate::transport::ScpiTransport;
use crate::{extract_scan_channels, InstrumentError, InstrumentGateway};
use tec_core::{ChannelId, CHANNEL_COUNT};

const SCAN_LIST: &str = "(@101:110)";

const SUPPLY_SETUP: &[&str] = &["*RST", "SYST:REM", "OUTP OFF", "VOLT 0", "CURR 0"];

pub struct ScpiBench {
    supply: Box<dyn ScpiTransport>,
    meter: Box<dyn ScpiTransport>,
    closed: bool,
}

impl ScpiBench {
    /// Resets both instruments into a known state: supply off at 0 V / 0 A,
    /// meter measuring resistance over the full scan list.
    pub fn connect(
        supply: Box<dyn ScpiTransport>,
        meter: Box<dyn ScpiTransport>,
    ) -> Result<Self, InstrumentError> {
        let mut bench = Self {
            supply,
            meter,
            closed: false,
        };
        for command in SUPPLY_SETUP {
            bench.supply.write_line(command)?;
        }
        for command in meter_setup() {
            bench.meter.write_line(&command)?;
        }
        log::info!("instruments configured");
        Ok(bench)
    }

    fn query_float(
        transport: &mut dyn ScpiTransport,
        command: &str,
    ) -> Result<f64, InstrumentError> {
        let reply = transport.query(command)?;
        parse_reading(&reply).ok_or_else(|| {
            InstrumentError::MalformedResponse(format!("'{command}' returned '{reply}'"))
        })
    }

    fn ensure_open(&self) -> Result<(), InstrumentError> {
        if self.closed {
            Err(InstrumentError::Communication(
                "instruments already closed".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

fn meter_setup() -> Vec<String> {
    vec![
        "*RST".to_string(),
        "SYST:REM".to_string(),
        "TRIG:SOUR IMM".to_string(),
        "TRIG:COUN 1".to_string(),
        "TRIG:DEL 0".to_string(),
        format!("SENS:FUNC \"RES\", {SCAN_LIST}"),
        format!("ROUT:SCAN:CRE {SCAN_LIST}"),
    ]
}

fn parse_reading(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parses a `TRAC:DATA?` reply into one value per reading.
pub fn parse_scan_buffer(reply: &str) -> Result<Vec<f64>, InstrumentError> {
    let reply = reply.trim();
    if reply.is_empty() {
        return Err(InstrumentError::MalformedResponse(
            "empty scan buffer".to_string(),
        ));
    }
    reply
        .split(',')
        .map(|field| {
            parse_reading(field).ok_or_else(|| {
                InstrumentError::MalformedResponse(format!("non-numeric scan reading '{field}'"))
            })
        })
        .collect()
}

impl InstrumentGateway for ScpiBench {
    fn set_output(&mut self, on: bool) -> Result<(), InstrumentError> {
        self.ensure_open()?;
        self.supply
            .write_line(if on { "OUTP ON" } else { "OUTP OFF" })
    }

    fn set_current(&mut self, amps: f64) -> Result<(), InstrumentError> {
        self.ensure_open()?;
        self.supply.write_line(&format!("CURR {amps}"))
    }

    fn set_voltage(&mut self, volts: f64) -> Result<(), InstrumentError> {
        self.ensure_open()?;
        self.supply.write_line(&format!("VOLT {volts}"))
    }

    fn read_voltage(&mut self) -> Result<f64, InstrumentError> {
        self.ensure_open()?;
        Self::query_float(self.supply.as_mut(), "MEAS:VOLT?")
    }

    fn read_current(&mut self) -> Result<f64, InstrumentError> {
        self.ensure_open()?;
        Self::query_float(self.supply.as_mut(), "MEAS:CURR?")
    }

    fn scan_resistances(&mut self, channels: &[ChannelId]) -> Result<Vec<f64>, InstrumentError> {
        self.ensure_open()?;
        self.meter.write_line("TRAC:CLE")?;
        self.meter.write_line("INIT")?;
        self.meter.write_line("*WAI")?;
        let reply = self.meter.query(&format!(
            "TRAC:DATA? 1, {CHANNEL_COUNT}, \"defbuffer1\", READ"
        ))?;
        let buffer = parse_scan_buffer(&reply)?;
        extract_scan_channels(&buffer, channels)
    }

    fn close(&mut self) -> Result<(), InstrumentError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.meter.close();
        self.supply.close();
        log::info!("instrument links closed");
        Ok(())
    }
}

impl Drop for ScpiBench {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
