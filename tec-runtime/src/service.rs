use crate::message_handler::{ControlMessage, RunSnapshot, RuntimeSettings};
use crate::runtime::spawn_runtime;
use crate::state_manager::RunStatus;
use instrument::{InstrumentError, InstrumentGateway};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;
use std::time::Duration;
use tec_core::RawRunFields;

const QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to a running bench runtime.
pub struct BenchService {
    control_tx: Sender<ControlMessage>,
    snapshot_rx: Receiver<RunSnapshot>,
    handle: Option<JoinHandle<()>>,
}

impl BenchService {
    pub fn new<G, F>(open_gateway: F, settings: RuntimeSettings) -> Result<Self, String>
    where
        G: InstrumentGateway + 'static,
        F: FnOnce() -> Result<G, InstrumentError> + Send + 'static,
    {
        let (control_tx, snapshot_rx, handle) = spawn_runtime(open_gateway, settings)?;
        Ok(Self {
            control_tx,
            snapshot_rx,
            handle: Some(handle),
        })
    }

    pub fn start_test(&self, fields: RawRunFields) {
        let _ = self.control_tx.send(ControlMessage::StartTest(fields));
    }

    pub fn stop_test(&self) {
        let _ = self.control_tx.send(ControlMessage::StopTest);
    }

    /// Extra sender for another thread, e.g. a console reading stop requests.
    pub fn control_sender(&self) -> Sender<ControlMessage> {
        self.control_tx.clone()
    }

    pub fn record_path(&self) -> Option<PathBuf> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.control_tx
            .send(ControlMessage::QueryRecordPath(reply_tx))
            .ok()?;
        reply_rx.recv_timeout(QUERY_TIMEOUT).ok().flatten()
    }

    pub fn poll_state(&self) -> Option<RunSnapshot> {
        self.snapshot_rx.try_recv().ok()
    }

    pub fn wait_state(&self, timeout: Duration) -> Option<RunSnapshot> {
        self.snapshot_rx.recv_timeout(timeout).ok()
    }

    /// Waits for snapshots until the run is no longer running (finished or
    /// rejected at start) or `timeout` passes without one.
    pub fn run_until_finished<F>(&self, timeout: Duration, mut on_state: F) -> Option<RunSnapshot>
    where
        F: FnMut(&RunSnapshot),
    {
        let mut last = None;
        while let Some(state) = self.wait_state(timeout) {
            on_state(&state);
            let finished = state.status != RunStatus::Running;
            last = Some(state);
            if finished {
                break;
            }
        }
        last
    }

    pub fn shutdown(mut self) -> Result<(), String> {
        self.join()
    }

    fn join(&mut self) -> Result<(), String> {
        let _ = self.control_tx.send(ControlMessage::Shutdown);
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| "Runtime thread panicked".to_string()),
            None => Ok(()),
        }
    }
}

impl Drop for BenchService {
    fn drop(&mut self) {
        let _ = self.join();
    }
}
