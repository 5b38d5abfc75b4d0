use crate::controller::{CycleController, TickTime};
use crate::message_handler::{ControlMessage, RunSnapshot, RuntimeSettings};
use crate::rt_thread::RuntimeThread;
use crate::scheduler::TickTimers;
use crate::state_manager::RunStatus;
use instrument::{InstrumentError, InstrumentGateway};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender, TrySendError};
use std::thread::JoinHandle;
use std::time::Instant;

/// Snapshots buffered for a reader that falls behind. Each snapshot carries
/// the whole plot window, so older ones are dropped rather than queued.
pub const SNAPSHOT_BACKLOG: usize = 16;

pub type RuntimeChannels = (Sender<ControlMessage>, Receiver<RunSnapshot>, JoinHandle<()>);

/// Starts the bench runtime thread.
///
/// `open_gateway` runs on the new thread; if it fails, no thread is left
/// behind and the error is returned here.
pub fn spawn_runtime<G, F>(open_gateway: F, settings: RuntimeSettings) -> Result<RuntimeChannels, String>
where
    G: InstrumentGateway + 'static,
    F: FnOnce() -> Result<G, InstrumentError> + Send + 'static,
{
    let (control_tx, control_rx) = mpsc::channel::<ControlMessage>();
    let (snapshot_tx, snapshot_rx) = mpsc::sync_channel::<RunSnapshot>(SNAPSHOT_BACKLOG);

    let handle = RuntimeThread::spawn("tec-runtime", move || {
        let gateway =
            open_gateway().map_err(|err| format!("Failed to open instruments: {err}"))?;
        log::info!("instruments ready");
        Ok(move || run_runtime(gateway, settings, control_rx, snapshot_tx))
    })?;
    Ok((control_tx, snapshot_rx, handle))
}

/// Runtime loop. Returns after `Shutdown` or once every control sender is gone,
/// leaving the supply safe and the gateway closed.
pub fn run_runtime<G: InstrumentGateway>(
    gateway: G,
    settings: RuntimeSettings,
    control_rx: Receiver<ControlMessage>,
    snapshot_tx: SyncSender<RunSnapshot>,
) {
    let mut controller = CycleController::new(gateway, &settings);
    let mut timers = TickTimers::new(settings.power_poll);
    let mut outbox = SnapshotOutbox::new(snapshot_tx);

    loop {
        outbox.retry();
        let mut wait = timers
            .next_deadline()
            .map(|deadline| deadline.saturating_duration_since(Instant::now()));
        if outbox.has_pending() {
            wait = Some(wait.map_or(settings.power_poll, |wait| wait.min(settings.power_poll)));
        }
        let received = match wait {
            Some(wait) => match control_rx.recv_timeout(wait) {
                Ok(message) => Some(message),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match control_rx.recv() {
                Ok(message) => Some(message),
                Err(_) => break,
            },
        };

        if let Some(message) = received {
            match message {
                ControlMessage::StartTest(raw) => {
                    let time = TickTime::now();
                    match controller.start_test(&raw, time) {
                        Ok(()) => {
                            if let Some(period) = controller.sample_period() {
                                timers.arm(time.instant, period);
                            }
                        }
                        Err(err) => log::error!("start failed: {err}"),
                    }
                }
                ControlMessage::StopTest => {
                    timers.disarm();
                    if let Err(err) = controller.stop() {
                        log::error!("stop failed: {err}");
                    }
                }
                ControlMessage::QueryRecordPath(reply) => {
                    let _ = reply.send(controller.record_path().map(|path| path.to_path_buf()));
                    continue;
                }
                ControlMessage::Shutdown => break,
            }
            if !controller.is_running() {
                timers.disarm();
            }
            outbox.publish(controller.snapshot());
            continue;
        }

        if timers.power_due(Instant::now()) {
            // errors are already recorded on the controller and end the run
            let _ = controller.power_tick(TickTime::now());
            timers.power_done(Instant::now());
            if !controller.is_running() {
                timers.disarm();
            }
            outbox.publish(controller.snapshot());
        }

        if timers.sample_due(Instant::now()) {
            let tick_start = Instant::now();
            let _ = controller.sample_tick(TickTime::now());
            timers.sample_done(tick_start, Instant::now());
            if !controller.is_running() {
                timers.disarm();
            }
            outbox.publish(controller.snapshot());
        }
    }

    log::info!("runtime shutting down");
    let was_running = controller.is_running();
    controller.shutdown();
    if was_running {
        outbox.publish(controller.snapshot());
    }
}

/// Publishes snapshots without ever blocking the runtime thread.
///
/// A full channel drops running snapshots. A snapshot that ends a run is kept
/// and retried until the reader makes room or a newer snapshot replaces it.
struct SnapshotOutbox {
    tx: SyncSender<RunSnapshot>,
    pending: Option<RunSnapshot>,
}

impl SnapshotOutbox {
    fn new(tx: SyncSender<RunSnapshot>) -> Self {
        Self { tx, pending: None }
    }

    fn publish(&mut self, snapshot: RunSnapshot) {
        self.pending = None;
        match self.tx.try_send(snapshot) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(snapshot)) => {
                if snapshot.status != RunStatus::Running {
                    self.pending = Some(snapshot);
                }
            }
        }
    }

    fn retry(&mut self) {
        if let Some(snapshot) = self.pending.take() {
            self.publish(snapshot);
        }
    }

    fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}
