use tec_runtime::{PowerPhase, RunSnapshot};

pub fn print_info(message: &str) {
    println!("[TEC][INFO] {message}");
}

pub fn print_error(message: &str) {
    eprintln!("[TEC][ERROR]: {message}");
}

fn phase_label(phase: PowerPhase) -> &'static str {
    match phase {
        PowerPhase::Off => "OFF",
        PowerPhase::On => "ON",
    }
}

/// Prints snapshots as they arrive, skipping those that carry nothing new.
pub struct SnapshotPrinter {
    json: bool,
    last_sample: Option<u64>,
    last_phase: Option<(PowerPhase, u32)>,
}

impl SnapshotPrinter {
    pub fn new(json: bool) -> Self {
        Self {
            json,
            last_sample: None,
            last_phase: None,
        }
    }

    pub fn print(&mut self, state: &RunSnapshot) {
        if self.json {
            match state.to_json() {
                Ok(line) => println!("{line}"),
                Err(err) => print_error(&format!("Failed to encode snapshot: {err}")),
            }
            return;
        }

        let phase = (state.phase, state.cycle);
        if self.last_phase != Some(phase) && !state.elapsed.is_empty() {
            print_info(&format!(
                "Cycle {} power {}",
                state.cycle,
                phase_label(state.phase)
            ));
            self.last_phase = Some(phase);
        }

        let newest = state.elapsed.last().copied();
        if newest.is_some() && newest != self.last_sample {
            self.last_sample = newest;
            let temperatures = state
                .channels
                .iter()
                .map(|series| {
                    let value = series.temperatures.last().copied().unwrap_or(f64::NAN);
                    format!("{}={value:.2}", series.name)
                })
                .collect::<Vec<_>>()
                .join(", ");
            println!(
                "t={}s cycle={} {} I={:.3}A V={:.3}V {}",
                newest.unwrap_or_default(),
                state.cycle,
                phase_label(state.phase),
                state.current,
                state.voltage,
                temperatures
            );
        }
    }
}
