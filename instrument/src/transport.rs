use crate::InstrumentError;
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Line oriented SCPI link to one instrument.
pub trait ScpiTransport: Send {
    fn write_line(&mut self, command: &str) -> Result<(), InstrumentError>;
    fn read_line(&mut self) -> Result<String, InstrumentError>;
    fn close(&mut self);

    fn query(&mut self, command: &str) -> Result<String, InstrumentError> {
        self.write_line(command)?;
        self.read_line()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceAddress {
    Socket { host: String, port: u16 },
    Serial { path: String },
}

impl ResourceAddress {
    /// Accepts `TCPIP[n]::<host>::<port>::SOCKET` and `ASRL<path>::INSTR`.
    pub fn parse(resource: &str) -> Result<Self, InstrumentError> {
        let resource = resource.trim();
        let parts: Vec<&str> = resource.split("::").collect();
        let unsupported =
            || InstrumentError::Communication(format!("unsupported resource '{resource}'"));
        let head = parts.first().copied().unwrap_or_default();
        let head_upper = head.to_ascii_uppercase();

        if head_upper.starts_with("TCPIP") {
            let [_, host, port, kind] = parts.as_slice() else {
                return Err(unsupported());
            };
            if !kind.eq_ignore_ascii_case("SOCKET") || host.is_empty() {
                return Err(unsupported());
            }
            let port = port.parse::<u16>().map_err(|_| unsupported())?;
            return Ok(ResourceAddress::Socket {
                host: host.to_string(),
                port,
            });
        }

        if head_upper.starts_with("ASRL") {
            if parts.len() != 2 || !parts[1].eq_ignore_ascii_case("INSTR") {
                return Err(unsupported());
            }
            let path = &head[4..];
            if path.is_empty() {
                return Err(unsupported());
            }
            let path = if path.chars().all(|c| c.is_ascii_digit()) {
                format!("COM{path}")
            } else {
                path.to_string()
            };
            return Ok(ResourceAddress::Serial { path });
        }

        Err(unsupported())
    }
}

/// Newline terminated SCPI over any byte stream.
pub struct StreamTransport<S> {
    label: String,
    stream: Option<S>,
    pending: Vec<u8>,
}

impl<S: Read + Write + Send> StreamTransport<S> {
    pub fn new(label: impl Into<String>, stream: S) -> Self {
        Self {
            label: label.into(),
            stream: Some(stream),
            pending: Vec::new(),
        }
    }

    fn stream(&mut self) -> Result<&mut S, InstrumentError> {
        let label = &self.label;
        self.stream
            .as_mut()
            .ok_or_else(|| InstrumentError::Communication(format!("{label}: link is closed")))
    }

    fn take_line(&mut self) -> Option<String> {
        let end = self.pending.iter().position(|b| *b == b'\n')?;
        let line: Vec<u8> = self.pending.drain(..=end).collect();
        Some(String::from_utf8_lossy(&line).trim().to_string())
    }
}

impl<S: Read + Write + Send> ScpiTransport for StreamTransport<S> {
    fn write_line(&mut self, command: &str) -> Result<(), InstrumentError> {
        log::debug!("{} <- {command}", self.label);
        let label = self.label.clone();
        let stream = self.stream()?;
        stream
            .write_all(format!("{command}\n").as_bytes())
            .and_then(|_| stream.flush())
            .map_err(|err| InstrumentError::io(&label, err))
    }

    fn read_line(&mut self) -> Result<String, InstrumentError> {
        let mut chunk = [0u8; 256];
        loop {
            if let Some(line) = self.take_line() {
                log::debug!("{} -> {line}", self.label);
                return Ok(line);
            }
            let label = self.label.clone();
            let stream = self.stream()?;
            match stream.read(&mut chunk) {
                Ok(0) => {
                    return Err(InstrumentError::Communication(format!(
                        "{label}: connection closed by instrument"
                    )))
                }
                Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(InstrumentError::io(&label, err)),
            }
        }
    }

    fn close(&mut self) {
        if self.stream.take().is_some() {
            log::debug!("{} closed", self.label);
        }
        self.pending.clear();
    }
}

/// Opens the link named by a resource string.
pub fn open_resource(
    resource: &str,
    timeout: Duration,
    baud_rate: u32,
) -> Result<Box<dyn ScpiTransport>, InstrumentError> {
    match ResourceAddress::parse(resource)? {
        ResourceAddress::Socket { host, port } => {
            let addr = (host.as_str(), port)
                .to_socket_addrs()
                .map_err(|err| InstrumentError::io(resource, err))?
                .next()
                .ok_or_else(|| {
                    InstrumentError::Communication(format!("{resource}: host did not resolve"))
                })?;
            let stream = TcpStream::connect_timeout(&addr, timeout)
                .map_err(|err| InstrumentError::io(resource, err))?;
            stream
                .set_read_timeout(Some(timeout))
                .and_then(|_| stream.set_write_timeout(Some(timeout)))
                .and_then(|_| stream.set_nodelay(true))
                .map_err(|err| InstrumentError::io(resource, err))?;
            Ok(Box::new(StreamTransport::new(resource, stream)))
        }
        ResourceAddress::Serial { path } => open_serial(resource, &path, timeout, baud_rate),
    }
}

#[cfg(feature = "serial")]
fn open_serial(
    resource: &str,
    path: &str,
    timeout: Duration,
    baud_rate: u32,
) -> Result<Box<dyn ScpiTransport>, InstrumentError> {
    let port = serialport::new(path, baud_rate)
        .timeout(timeout)
        .open()
        .map_err(|err| InstrumentError::Communication(format!("{resource}: {err}")))?;
    Ok(Box::new(StreamTransport::new(resource, port)))
}

#[cfg(not(feature = "serial"))]
fn open_serial(
    resource: &str,
    _path: &str,
    _timeout: Duration,
    _baud_rate: u32,
) -> Result<Box<dyn ScpiTransport>, InstrumentError> {
    Err(InstrumentError::Communication(format!(
        "{resource}: serial support is disabled in this build"
    )))
}
