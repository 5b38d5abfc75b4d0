use tec_core::{resistance_to_temperature, ChannelId, ConversionError, CHANNEL_COUNT};

pub mod scpi;
pub mod simulated;
pub mod transport;

pub use scpi::ScpiBench;
pub use simulated::SimulatedBench;
pub use transport::{open_resource, ResourceAddress, ScpiTransport, StreamTransport};

#[derive(thiserror::Error, Debug)]
pub enum InstrumentError {
    #[error("instrument communication failed: {0}")]
    Communication(String),
    #[error("malformed instrument response: {0}")]
    MalformedResponse(String),
    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

impl InstrumentError {
    pub fn io(context: &str, err: std::io::Error) -> Self {
        InstrumentError::Communication(format!("{context}: {err}"))
    }
}

/// Everything the cycle controller needs from the bench hardware.
///
/// Every call may block on the instrument link and may fail. Only one command
/// is in flight at a time because the caller holds `&mut self`.
pub trait InstrumentGateway: Send {
    fn set_output(&mut self, on: bool) -> Result<(), InstrumentError>;
    fn set_current(&mut self, amps: f64) -> Result<(), InstrumentError>;
    fn set_voltage(&mut self, volts: f64) -> Result<(), InstrumentError>;
    fn read_voltage(&mut self) -> Result<f64, InstrumentError>;
    fn read_current(&mut self) -> Result<f64, InstrumentError>;

    /// Runs one scan over all physical inputs and returns the resistance of
    /// each requested channel, in request order.
    fn scan_resistances(&mut self, channels: &[ChannelId]) -> Result<Vec<f64>, InstrumentError>;

    /// Releases the instrument link. Calling it again is a no-op.
    fn close(&mut self) -> Result<(), InstrumentError>;

    fn read_temperatures(&mut self, channels: &[ChannelId]) -> Result<Vec<f64>, InstrumentError> {
        let resistances = self.scan_resistances(channels)?;
        if resistances.len() != channels.len() {
            return Err(InstrumentError::MalformedResponse(format!(
                "expected {} channel readings, got {}",
                channels.len(),
                resistances.len()
            )));
        }
        resistances
            .into_iter()
            .map(|ohms| resistance_to_temperature(ohms).map_err(InstrumentError::from))
            .collect()
    }
}

impl<G: InstrumentGateway + ?Sized> InstrumentGateway for Box<G> {
    fn set_output(&mut self, on: bool) -> Result<(), InstrumentError> {
        (**self).set_output(on)
    }

    fn set_current(&mut self, amps: f64) -> Result<(), InstrumentError> {
        (**self).set_current(amps)
    }

    fn set_voltage(&mut self, volts: f64) -> Result<(), InstrumentError> {
        (**self).set_voltage(volts)
    }

    fn read_voltage(&mut self) -> Result<f64, InstrumentError> {
        (**self).read_voltage()
    }

    fn read_current(&mut self) -> Result<f64, InstrumentError> {
        (**self).read_current()
    }

    fn scan_resistances(&mut self, channels: &[ChannelId]) -> Result<Vec<f64>, InstrumentError> {
        (**self).scan_resistances(channels)
    }

    fn close(&mut self) -> Result<(), InstrumentError> {
        (**self).close()
    }

    fn read_temperatures(&mut self, channels: &[ChannelId]) -> Result<Vec<f64>, InstrumentError> {
        (**self).read_temperatures(channels)
    }
}

/// Picks the requested channels out of a full scan buffer.
///
/// The buffer must hold exactly one reading per physical input; `chN` is read
/// from index `N - 1`.
pub fn extract_scan_channels(
    buffer: &[f64],
    channels: &[ChannelId],
) -> Result<Vec<f64>, InstrumentError> {
    if buffer.len() != CHANNEL_COUNT {
        return Err(InstrumentError::MalformedResponse(format!(
            "scan buffer holds {} readings, expected {CHANNEL_COUNT}",
            buffer.len()
        )));
    }
    Ok(channels
        .iter()
        .map(|channel| buffer[channel.scan_index()])
        .collect())
}

#[derive(Debug, Clone)]
pub enum GatewayKind {
    Simulated,
    Scpi {
        power_supply: String,
        thermometer: String,
    },
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub kind: GatewayKind,
    pub timeout: std::time::Duration,
    pub baud_rate: u32,
}

pub struct GatewayFactory;

impl GatewayFactory {
    pub fn open(config: &GatewayConfig) -> Result<Box<dyn InstrumentGateway>, InstrumentError> {
        match &config.kind {
            GatewayKind::Simulated => Ok(Box::new(SimulatedBench::new())),
            GatewayKind::Scpi {
                power_supply,
                thermometer,
            } => {
                let supply = open_resource(power_supply, config.timeout, config.baud_rate)?;
                let meter = open_resource(thermometer, config.timeout, config.baud_rate)?;
                let bench = ScpiBench::connect(supply, meter)?;
                Ok(Box::new(bench))
            }
        }
    }
}
