use crate::message_handler::{ChannelSeries, RunSnapshot, RuntimeSettings};
use crate::state_manager::{PowerPhase, RunState, RunStatus};
use chrono::{DateTime, Local};
use instrument::{InstrumentError, InstrumentGateway};
use recorder::{RecordSchema, SampleRecorder, SampleRow, StorageError};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tec_core::{validate, ChannelId, RawRunFields, RunConfig, ValidationError};

/// Moment a tick runs at: monotonic for timing, wall clock for records.
#[derive(Debug, Clone, Copy)]
pub struct TickTime {
    pub instant: Instant,
    pub wall: DateTime<Local>,
}

impl TickTime {
    pub fn now() -> Self {
        Self {
            instant: Instant::now(),
            wall: Local::now(),
        }
    }

    pub fn after(self, delta: Duration) -> Self {
        Self {
            instant: self.instant + delta,
            wall: chrono::Duration::from_std(delta)
                .ok()
                .and_then(|delta| self.wall.checked_add_signed(delta))
                .unwrap_or(self.wall),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ControllerError {
    #[error("invalid run parameters: {0}")]
    Validation(#[from] ValidationError),
    #[error("instrument failure: {0}")]
    Instrument(#[from] InstrumentError),
    #[error("record storage failure: {0}")]
    Storage(#[from] StorageError),
    #[error("a test is already running")]
    AlreadyRunning,
}

struct ActiveRun {
    config: RunConfig,
    channels: Vec<ChannelId>,
    state: RunState,
    recorder: SampleRecorder,
}

/// Drives one bench through power cycles and records a sample per period.
///
/// Nothing here sleeps or spawns: the owner calls [`power_tick`] and
/// [`sample_tick`] when their deadlines expire, so every instrument call and
/// every state change happens on the caller's thread.
///
/// [`power_tick`]: CycleController::power_tick
/// [`sample_tick`]: CycleController::sample_tick
pub struct CycleController<G: InstrumentGateway> {
    gateway: G,
    plot_cycles: usize,
    data_dir: PathBuf,
    status: RunStatus,
    run: Option<ActiveRun>,
    final_snapshot: Option<RunSnapshot>,
    record_path: Option<PathBuf>,
    last_error: Option<String>,
}

impl<G: InstrumentGateway> CycleController<G> {
    pub fn new(gateway: G, settings: &RuntimeSettings) -> Self {
        Self {
            gateway,
            plot_cycles: settings.plot_cycles.max(1),
            data_dir: settings.data_dir.clone(),
            status: RunStatus::Idle,
            run: None,
            final_snapshot: None,
            record_path: None,
            last_error: None,
        }
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == RunStatus::Running
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Record of the current run, or of the last one once it has ended.
    pub fn record_path(&self) -> Option<&Path> {
        self.record_path.as_deref()
    }

    pub fn config(&self) -> Option<&RunConfig> {
        self.run.as_ref().map(|run| &run.config)
    }

    pub fn run_state(&self) -> Option<&RunState> {
        self.run.as_ref().map(|run| &run.state)
    }

    pub fn sample_period(&self) -> Option<Duration> {
        self.run.as_ref().map(|run| run.config.sample_period())
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Validates operator input and starts a run recorded under the data directory.
    pub fn start_test(&mut self, raw: &RawRunFields, time: TickTime) -> Result<(), ControllerError> {
        if self.is_running() {
            return Err(ControllerError::AlreadyRunning);
        }
        let config = match validate(raw) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("start rejected: {err}");
                self.last_error = Some(err.to_string());
                return Err(err.into());
            }
        };
        let columns = RecordSchema::for_config(&config).into_columns();
        let recorder = match SampleRecorder::create(&self.data_dir, time.wall, columns) {
            Ok(recorder) => recorder,
            Err(err) => {
                log::error!("cannot start test: {err}");
                self.run = None;
                self.final_snapshot = None;
                self.last_error = Some(err.to_string());
                return Err(err.into());
            }
        };
        self.start(config, recorder, time)
    }

    /// Starts a run appending to `recorder`, whose header must match `config`.
    pub fn start(
        &mut self,
        config: RunConfig,
        recorder: SampleRecorder,
        time: TickTime,
    ) -> Result<(), ControllerError> {
        if self.is_running() {
            return Err(ControllerError::AlreadyRunning);
        }
        self.run = None;
        self.final_snapshot = None;
        self.last_error = None;

        let max_points = config.max_plot_points(self.plot_cycles);
        let state = RunState::new(
            config.start_cycle(),
            config.channels().len(),
            Some(max_points),
            time.instant,
        );
        log::info!(
            "starting test for {}: cycles {}..={}, on {}s, off {}s, sample every {}s",
            config.operator(),
            config.start_cycle(),
            config.end_cycle(),
            config.power_on_secs(),
            config.power_off_secs(),
            config.sample_period_secs()
        );
        self.record_path = Some(recorder.path().to_path_buf());
        self.run = Some(ActiveRun {
            channels: config.channel_ids(),
            config,
            state,
            recorder,
        });
        self.status = RunStatus::Running;

        let result = self.prime_supply().and_then(|()| self.take_sample(time));
        if let Err(err) = result {
            self.abort(&err);
            return Err(err);
        }
        Ok(())
    }

    fn prime_supply(&mut self) -> Result<(), ControllerError> {
        let Some(run) = self.run.as_ref() else {
            return Ok(());
        };
        let (amps, volts) = (run.config.current_setpoint(), run.config.voltage_setpoint());
        self.gateway.set_output(false)?;
        self.gateway.set_current(amps)?;
        self.gateway.set_voltage(volts)?;
        Ok(())
    }

    /// Flips the supply when the current phase has lasted long enough,
    /// otherwise refreshes the live voltage and current.
    pub fn power_tick(&mut self, time: TickTime) -> Result<(), ControllerError> {
        if !self.is_running() {
            return Ok(());
        }
        let result = self.advance_power(time);
        if let Err(err) = &result {
            self.abort(err);
        }
        result
    }

    fn advance_power(&mut self, time: TickTime) -> Result<(), ControllerError> {
        let Some(run) = self.run.as_mut() else {
            return Ok(());
        };
        let in_phase = run.state.time_in_phase(time.instant);
        match run.state.phase {
            PowerPhase::On if in_phase >= run.config.power_on() => {
                run.state.transition(PowerPhase::Off, time.instant);
                if run.state.cycle >= run.config.end_cycle() {
                    return self.finish(time);
                }
                run.state.cycle += 1;
                log::info!("power off, cycle {}", run.state.cycle);
                self.gateway.set_output(false)?;
            }
            PowerPhase::Off if in_phase >= run.config.power_off() => {
                run.state.transition(PowerPhase::On, time.instant);
                log::info!("power on, cycle {}", run.state.cycle);
                self.gateway.set_output(true)?;
                self.gateway.set_current(run.config.current_setpoint())?;
                self.gateway.set_voltage(run.config.voltage_setpoint())?;
            }
            _ => {}
        }
        self.refresh_readings()
    }

    fn refresh_readings(&mut self) -> Result<(), ControllerError> {
        let voltage = self.gateway.read_voltage()?;
        let current = self.gateway.read_current()?;
        if let Some(run) = self.run.as_mut() {
            run.state.update_readings(voltage, current);
        }
        Ok(())
    }

    fn finish(&mut self, time: TickTime) -> Result<(), ControllerError> {
        self.take_sample(time)?;
        self.status = RunStatus::Complete;
        if let Err(err) = self.safe_off() {
            log::error!("supply did not acknowledge safe-off after completion: {err}");
            self.status = RunStatus::Stopped;
            self.last_error = Some(err.to_string());
        } else {
            log::info!("test complete");
        }
        self.end_run();
        Ok(())
    }

    /// Reads the bench once and appends the row; series grow only after the
    /// row is on disk.
    pub fn sample_tick(&mut self, time: TickTime) -> Result<(), ControllerError> {
        if !self.is_running() {
            return Ok(());
        }
        let result = self.take_sample(time);
        if let Err(err) = &result {
            self.abort(err);
        }
        result
    }

    fn take_sample(&mut self, time: TickTime) -> Result<(), ControllerError> {
        let Some(run) = self.run.as_mut() else {
            return Ok(());
        };
        let current = self.gateway.read_current()?;
        let voltage = self.gateway.read_voltage()?;
        let temperatures = self.gateway.read_temperatures(&run.channels)?;
        run.state.update_readings(voltage, current);

        let row = SampleRow {
            timestamp: time.wall,
            cycle: run.state.cycle,
            operator: run.config.operator().to_string(),
            current,
            voltage,
            temperatures,
        };
        run.recorder.append(&row)?;
        run.state
            .push_sample(run.config.sample_period_secs(), &row.temperatures);
        log::debug!(
            "sample cycle {} I={} V={} T={:?}",
            row.cycle,
            row.current,
            row.voltage,
            row.temperatures
        );
        Ok(())
    }

    /// Operator stop. A no-op unless a run is active.
    pub fn stop(&mut self) -> Result<(), ControllerError> {
        if !self.is_running() {
            return Ok(());
        }
        self.status = RunStatus::Stopped;
        log::info!("test stopped by operator");
        let result = self.safe_off();
        if let Err(err) = &result {
            log::error!("safe-off failed: {err}");
            self.last_error = Some(err.to_string());
        }
        self.end_run();
        result
    }

    fn abort(&mut self, err: &ControllerError) {
        log::error!("test aborted: {err}");
        self.status = RunStatus::Stopped;
        self.last_error = Some(err.to_string());
        if let Err(off_err) = self.safe_off() {
            log::warn!("safe-off after failure also failed: {off_err}");
        }
        self.end_run();
    }

    /// Output off, then both setpoints to zero. Every command is attempted;
    /// the first failure is returned.
    fn safe_off(&mut self) -> Result<(), ControllerError> {
        let output = self.gateway.set_output(false);
        let current = self.gateway.set_current(0.0);
        let voltage = self.gateway.set_voltage(0.0);
        output.and(current).and(voltage)?;
        Ok(())
    }

    fn end_run(&mut self) {
        let snapshot = self.snapshot();
        self.final_snapshot = Some(snapshot);
        self.run = None;
    }

    /// Stops any run and releases the instruments.
    pub fn shutdown(&mut self) {
        if let Err(err) = self.stop() {
            log::warn!("stop during shutdown failed: {err}");
        }
        if let Err(err) = self.gateway.close() {
            log::warn!("closing instruments failed: {err}");
        }
    }

    pub fn snapshot(&self) -> RunSnapshot {
        let mut snapshot = match (&self.run, &self.final_snapshot) {
            (Some(run), _) => RunSnapshot {
                status: self.status,
                phase: run.state.phase,
                cycle: run.state.cycle,
                voltage: run.state.voltage,
                current: run.state.current,
                elapsed: run.state.elapsed().iter().copied().collect(),
                channels: run
                    .config
                    .channels()
                    .iter()
                    .zip(run.state.temperatures())
                    .map(|(selection, series)| ChannelSeries {
                        channel: selection.channel,
                        name: selection.display_name.clone(),
                        temperatures: series.iter().copied().collect(),
                    })
                    .collect(),
                last_error: None,
                record_path: None,
            },
            (None, Some(last)) => last.clone(),
            (None, None) => RunSnapshot::idle(),
        };
        snapshot.status = self.status;
        snapshot.last_error = self.last_error.clone();
        snapshot.record_path = self.record_path.clone();
        snapshot
    }
}
