use serde::Serialize;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Idle,
    Running,
    Complete,
    Stopped,
}

impl RunStatus {
    pub fn is_finished(self) -> bool {
        matches!(self, RunStatus::Complete | RunStatus::Stopped)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerPhase {
    Off,
    On,
}

/// Live state of one run. Replaced wholesale by the next start.
///
/// The elapsed series and every channel series always have the same length;
/// eviction drops the oldest entry of all of them together.
#[derive(Debug, Clone)]
pub struct RunState {
    pub cycle: u32,
    pub phase: PowerPhase,
    pub last_transition: Instant,
    pub voltage: f64,
    pub current: f64,
    elapsed: VecDeque<u64>,
    temperatures: Vec<VecDeque<f64>>,
    max_points: Option<usize>,
    next_elapsed: u64,
}

impl RunState {
    pub fn new(
        start_cycle: u32,
        channel_count: usize,
        max_points: Option<usize>,
        now: Instant,
    ) -> Self {
        Self {
            cycle: start_cycle,
            phase: PowerPhase::Off,
            last_transition: now,
            voltage: 0.0,
            current: 0.0,
            elapsed: VecDeque::new(),
            temperatures: vec![VecDeque::new(); channel_count],
            max_points: max_points.map(|points| points.max(1)),
            next_elapsed: 0,
        }
    }

    pub fn time_in_phase(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_transition)
    }

    pub fn transition(&mut self, phase: PowerPhase, now: Instant) {
        self.phase = phase;
        self.last_transition = now;
    }

    pub fn update_readings(&mut self, voltage: f64, current: f64) {
        self.voltage = voltage;
        self.current = current;
    }

    /// Appends one point to every series. `temperatures` must hold one value
    /// per channel, in channel order.
    pub fn push_sample(&mut self, sample_period_secs: u32, temperatures: &[f64]) {
        debug_assert_eq!(temperatures.len(), self.temperatures.len());
        self.elapsed.push_back(self.next_elapsed);
        self.next_elapsed += u64::from(sample_period_secs);
        for (series, value) in self.temperatures.iter_mut().zip(temperatures) {
            series.push_back(*value);
        }
        self.evict_to_window();
    }

    fn evict_to_window(&mut self) {
        let Some(max_points) = self.max_points else {
            return;
        };
        while self.elapsed.len() > max_points {
            self.elapsed.pop_front();
            for series in &mut self.temperatures {
                series.pop_front();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.elapsed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elapsed.is_empty()
    }

    pub fn max_points(&self) -> Option<usize> {
        self.max_points
    }

    pub fn elapsed(&self) -> &VecDeque<u64> {
        &self.elapsed
    }

    pub fn temperatures(&self) -> &[VecDeque<f64>] {
        &self.temperatures
    }
}
