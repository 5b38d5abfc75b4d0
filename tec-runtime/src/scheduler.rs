use std::time::{Duration, Instant};

/// Delay until the next periodic tick, shortened by the time the last one took.
pub fn compensated_delay(period: Duration, latency: Duration) -> Duration {
    period.saturating_sub(latency)
}

/// Absolute deadlines of the two periodic actions of a run.
#[derive(Debug, Clone)]
pub struct TickTimers {
    power_poll: Duration,
    sample_period: Duration,
    next_power: Option<Instant>,
    next_sample: Option<Instant>,
}

impl TickTimers {
    pub fn new(power_poll: Duration) -> Self {
        Self {
            power_poll,
            sample_period: Duration::ZERO,
            next_power: None,
            next_sample: None,
        }
    }

    /// Arms both timers right after the baseline sample taken at `now`.
    pub fn arm(&mut self, now: Instant, sample_period: Duration) {
        self.sample_period = sample_period;
        self.next_power = Some(now + self.power_poll);
        self.next_sample = Some(now + sample_period);
    }

    pub fn disarm(&mut self) {
        self.next_power = None;
        self.next_sample = None;
    }

    pub fn is_armed(&self) -> bool {
        self.next_power.is_some() || self.next_sample.is_some()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.next_power, self.next_sample) {
            (Some(power), Some(sample)) => Some(power.min(sample)),
            (power, sample) => power.or(sample),
        }
    }

    pub fn power_due(&self, now: Instant) -> bool {
        self.next_power.is_some_and(|deadline| deadline <= now)
    }

    pub fn sample_due(&self, now: Instant) -> bool {
        self.next_sample.is_some_and(|deadline| deadline <= now)
    }

    pub fn power_done(&mut self, tick_end: Instant) {
        if self.next_power.is_some() {
            self.next_power = Some(tick_end + self.power_poll);
        }
    }

    pub fn sample_done(&mut self, tick_start: Instant, tick_end: Instant) {
        if self.next_sample.is_some() {
            let latency = tick_end.saturating_duration_since(tick_start);
            self.next_sample = Some(tick_end + compensated_delay(self.sample_period, latency));
        }
    }
}
