use crate::{extract_scan_channels, InstrumentError, InstrumentGateway};
use std::time::Instant;
use tec_core::{temperature_to_resistance, ChannelId, CHANNEL_COUNT};

const AMBIENT_C: f64 = 25.0;
const TIME_CONSTANT_S: f64 = 20.0;
const DEGREES_PER_WATT: f64 = 1.5;

/// Stand-in bench for running without hardware.
///
/// The supply mirrors its setpoints while the output is on. Each thermal
/// channel relaxes towards `ambient + k * P` with a first-order lag, where `k`
/// differs per channel so curves are distinguishable.
pub struct SimulatedBench {
    output_on: bool,
    current_setpoint: f64,
    voltage_setpoint: f64,
    temperatures: [f64; CHANNEL_COUNT],
    last_update: Instant,
    is_open: bool,
}

impl Default for SimulatedBench {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedBench {
    pub fn new() -> Self {
        Self {
            output_on: false,
            current_setpoint: 0.0,
            voltage_setpoint: 0.0,
            temperatures: [AMBIENT_C; CHANNEL_COUNT],
            last_update: Instant::now(),
            is_open: true,
        }
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn output_on(&self) -> bool {
        self.output_on
    }

    fn power_watts(&self) -> f64 {
        if self.output_on {
            self.current_setpoint * self.voltage_setpoint
        } else {
            0.0
        }
    }

    fn advance(&mut self, now: Instant) {
        let dt = now.saturating_duration_since(self.last_update).as_secs_f64();
        self.last_update = now;
        let alpha = 1.0 - (-dt / TIME_CONSTANT_S).exp();
        let power = self.power_watts();
        for (idx, temp) in self.temperatures.iter_mut().enumerate() {
            let gain = DEGREES_PER_WATT * (1.0 + idx as f64 * 0.1);
            let target = AMBIENT_C + gain * power;
            *temp += (target - *temp) * alpha;
        }
    }

    fn check_open(&self) -> Result<(), InstrumentError> {
        if self.is_open {
            Ok(())
        } else {
            Err(InstrumentError::Communication(
                "simulated bench is closed".to_string(),
            ))
        }
    }
}

impl InstrumentGateway for SimulatedBench {
    fn set_output(&mut self, on: bool) -> Result<(), InstrumentError> {
        self.check_open()?;
        self.advance(Instant::now());
        self.output_on = on;
        Ok(())
    }

    fn set_current(&mut self, amps: f64) -> Result<(), InstrumentError> {
        self.check_open()?;
        self.advance(Instant::now());
        self.current_setpoint = amps;
        Ok(())
    }

    fn set_voltage(&mut self, volts: f64) -> Result<(), InstrumentError> {
        self.check_open()?;
        self.advance(Instant::now());
        self.voltage_setpoint = volts;
        Ok(())
    }

    fn read_voltage(&mut self) -> Result<f64, InstrumentError> {
        self.check_open()?;
        Ok(if self.output_on {
            self.voltage_setpoint
        } else {
            0.0
        })
    }

    fn read_current(&mut self) -> Result<f64, InstrumentError> {
        self.check_open()?;
        Ok(if self.output_on {
            self.current_setpoint
        } else {
            0.0
        })
    }

    fn scan_resistances(&mut self, channels: &[ChannelId]) -> Result<Vec<f64>, InstrumentError> {
        self.check_open()?;
        self.advance(Instant::now());
        let buffer = self
            .temperatures
            .iter()
            .map(|celsius| temperature_to_resistance(*celsius))
            .collect::<Result<Vec<f64>, _>>()?;
        extract_scan_channels(&buffer, channels)
    }

    fn close(&mut self) -> Result<(), InstrumentError> {
        self.is_open = false;
        Ok(())
    }
}
