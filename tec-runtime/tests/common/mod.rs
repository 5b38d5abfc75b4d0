#![allow(dead_code)]

use instrument::{InstrumentError, InstrumentGateway};
use recorder::RecordSink;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use tec_core::{ChannelId, RawRunFields};

pub const RESISTANCE: f64 = 5000.0;

#[derive(Debug, Default)]
pub struct BenchScript {
    pub commands: Vec<String>,
    pub output_on: bool,
    pub current_setpoint: f64,
    pub voltage_setpoint: f64,
    /// Scan returns one value fewer than requested.
    pub short_scan: bool,
    pub fail_reads: bool,
    pub fail_writes: bool,
    pub closed: usize,
}

/// Scripted bench: records every command and reads back its setpoints.
#[derive(Clone, Default)]
pub struct MockBench {
    script: Arc<Mutex<BenchScript>>,
}

impl MockBench {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self) -> MutexGuard<'_, BenchScript> {
        self.script.lock().unwrap()
    }

    pub fn commands(&self) -> Vec<String> {
        self.script().commands.clone()
    }

    pub fn clear_commands(&self) {
        self.script().commands.clear();
    }

    fn write(&self, command: String) -> Result<MutexGuard<'_, BenchScript>, InstrumentError> {
        let mut script = self.script();
        script.commands.push(command);
        if script.fail_writes {
            return Err(InstrumentError::Communication("write timed out".to_string()));
        }
        Ok(script)
    }

    fn read(&self) -> Result<MutexGuard<'_, BenchScript>, InstrumentError> {
        let script = self.script();
        if script.fail_reads {
            return Err(InstrumentError::Communication("read timed out".to_string()));
        }
        Ok(script)
    }
}

impl InstrumentGateway for MockBench {
    fn set_output(&mut self, on: bool) -> Result<(), InstrumentError> {
        let label = if on { "OUTP ON" } else { "OUTP OFF" };
        self.write(label.to_string())?.output_on = on;
        Ok(())
    }

    fn set_current(&mut self, amps: f64) -> Result<(), InstrumentError> {
        self.write(format!("CURR {amps}"))?.current_setpoint = amps;
        Ok(())
    }

    fn set_voltage(&mut self, volts: f64) -> Result<(), InstrumentError> {
        self.write(format!("VOLT {volts}"))?.voltage_setpoint = volts;
        Ok(())
    }

    fn read_voltage(&mut self) -> Result<f64, InstrumentError> {
        let script = self.read()?;
        Ok(if script.output_on {
            script.voltage_setpoint
        } else {
            0.0
        })
    }

    fn read_current(&mut self) -> Result<f64, InstrumentError> {
        let script = self.read()?;
        Ok(if script.output_on {
            script.current_setpoint
        } else {
            0.0
        })
    }

    fn scan_resistances(&mut self, channels: &[ChannelId]) -> Result<Vec<f64>, InstrumentError> {
        let script = self.read()?;
        let count = if script.short_scan {
            channels.len().saturating_sub(1)
        } else {
            channels.len()
        };
        Ok(vec![RESISTANCE; count])
    }

    fn close(&mut self) -> Result<(), InstrumentError> {
        self.script().closed += 1;
        Ok(())
    }
}

pub fn fields(on: &str, off: &str, rate: &str, start: &str, end: &str) -> RawRunFields {
    RawRunFields {
        operator: "Alice".to_string(),
        current: "1.5".to_string(),
        voltage: "12".to_string(),
        power_on: on.to_string(),
        power_off: off.to_string(),
        sample_rate: rate.to_string(),
        start_cycle: start.to_string(),
        end_cycle: end.to_string(),
        channels: "ch1, ch3".to_string(),
        channel_names: vec![("ch3".to_string(), "Hot side".to_string())],
    }
}

pub fn safe_off_commands() -> Vec<String> {
    vec![
        "OUTP OFF".to_string(),
        "CURR 0".to_string(),
        "VOLT 0".to_string(),
    ]
}

/// Data rows of a record file, header excluded.
pub fn record_rows(path: &std::path::Path) -> Vec<Vec<String>> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    reader
        .records()
        .map(|record| record.unwrap().iter().map(str::to_string).collect())
        .collect()
}

/// In-memory record sink that accepts `accept` writes (the header counts as
/// one) and fails every write after that.
#[derive(Clone)]
pub struct FullDisk {
    bytes: Arc<Mutex<Vec<u8>>>,
    accept: usize,
    writes: Arc<Mutex<usize>>,
}

impl FullDisk {
    pub fn after(accept: usize) -> Self {
        Self {
            bytes: Arc::default(),
            accept,
            writes: Arc::default(),
        }
    }

    pub fn lines(&self) -> Vec<String> {
        String::from_utf8(self.bytes.lock().unwrap().clone())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl RecordSink for FullDisk {
    fn append_durable(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut writes = self.writes.lock().unwrap();
        if *writes >= self.accept {
            return Err(io::Error::new(io::ErrorKind::Other, "no space left on device"));
        }
        *writes += 1;
        self.bytes.lock().unwrap().extend_from_slice(bytes);
        Ok(())
    }
}
