use crate::commands::*;
use crate::output::*;
use instrument::{GatewayConfig, GatewayFactory, GatewayKind};
use recorder::{export_record, ExportOutcome};
use std::error::Error;
use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;
use tec_core::{load_bench_settings, BenchSettings};
use tec_runtime::{BenchService, ControlMessage, RunStatus, RuntimeSettings};

const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(60);

pub fn handle_command(cli: Cli) -> Result<(), Box<dyn Error>> {
    match cli.command {
        Commands::Run(args) => {
            let bench = match &cli.bench {
                Some(path) => load_bench_settings(path)?,
                None => BenchSettings::default(),
            };
            handle_run(&args, &bench, cli.dummy, cli.json)
        }
        Commands::Export {
            record,
            dest,
            force,
        } => export(&record, &dest, force, &Input::Stdin),
    }
}

fn gateway_config(bench: &BenchSettings, dummy: bool) -> Result<GatewayConfig, String> {
    let kind = if dummy {
        GatewayKind::Simulated
    } else if bench.power_supply.is_empty() || bench.thermometer.is_empty() {
        return Err(
            "No instruments configured; set power_supply and thermometer in --bench or use --dummy"
                .to_string(),
        );
    } else {
        GatewayKind::Scpi {
            power_supply: bench.power_supply.clone(),
            thermometer: bench.thermometer.clone(),
        }
    };
    Ok(GatewayConfig {
        kind,
        timeout: bench.timeout(),
        baud_rate: bench.baud_rate,
    })
}

fn handle_run(
    args: &RunArgs,
    bench: &BenchSettings,
    dummy: bool,
    json: bool,
) -> Result<(), Box<dyn Error>> {
    let config = gateway_config(bench, dummy)?;
    log::debug!("opening instruments: {:?}", config.kind);
    let service = BenchService::new(
        move || GatewayFactory::open(&config),
        RuntimeSettings::from(bench),
    )?;
    let running = Arc::new(AtomicBool::new(true));
    let input = Input::Console(spawn_console(service.control_sender(), running.clone()));

    service.start_test(args.raw_fields());
    let mut printer = SnapshotPrinter::new(json);
    let mut announced = false;
    let last = service.run_until_finished(SNAPSHOT_TIMEOUT, |state| {
        if !announced && state.status == RunStatus::Running {
            announced = true;
            if let Some(path) = &state.record_path {
                print_info(&format!("Recording to {}", path.display()));
            }
            print_info("Type 'stop' and press Enter to stop the test");
        }
        printer.print(state);
    });
    running.store(false, Ordering::SeqCst);
    let record = service.record_path();
    service.shutdown()?;

    let last = last.ok_or("Runtime stopped without reporting a result")?;
    let failure = match last.status {
        RunStatus::Complete => {
            print_info("Test complete");
            None
        }
        RunStatus::Stopped => match &last.last_error {
            Some(err) => {
                print_error(&format!("Test stopped: {err}"));
                Some(err.clone())
            }
            None => {
                print_info("Test stopped");
                None
            }
        },
        RunStatus::Idle | RunStatus::Running => {
            let reason = last
                .last_error
                .clone()
                .unwrap_or_else(|| "Test did not finish".to_string());
            return Err(reason.into());
        }
    };

    if let Some(record) = &record {
        print_info(&format!("Data saved to {}", record.display()));
        if let Some(dest) = &args.export {
            if let Err(err) = export(record, dest, args.force, &input) {
                log::error!("export of {} failed: {err}", record.display());
                print_error(&err.to_string());
            }
        }
    }

    match failure {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

/// Reads the console on its own thread. While a run is active, `stop` is
/// forwarded to the runtime; afterwards lines are handed to prompts.
fn spawn_console(control_tx: Sender<ControlMessage>, running: Arc<AtomicBool>) -> Receiver<String> {
    let (line_tx, line_rx) = mpsc::channel();
    std::thread::spawn(move || {
        let stdin = io::stdin();
        let mut line = String::new();
        loop {
            line.clear();
            match stdin.read_line(&mut line) {
                Ok(0) | Err(_) => return,
                Ok(_) => {}
            }
            let text = line.trim().to_string();
            if !running.load(Ordering::SeqCst) {
                if line_tx.send(text).is_err() {
                    return;
                }
                continue;
            }
            match text.to_ascii_lowercase().as_str() {
                "stop" | "q" | "quit" => {
                    let _ = control_tx.send(ControlMessage::StopTest);
                }
                "" => {}
                other => print_info(&format!("Unknown input '{other}'; type 'stop' to stop")),
            }
        }
    });
    line_rx
}

/// Where prompts read their answers from.
enum Input {
    Stdin,
    Console(Receiver<String>),
}

impl Input {
    /// `None` once input is exhausted.
    fn read_line(&self) -> Result<Option<String>, String> {
        match self {
            Input::Stdin => {
                let mut line = String::new();
                let read = io::stdin()
                    .read_line(&mut line)
                    .map_err(|e| format!("Failed to read input: {e}"))?;
                Ok((read > 0).then_some(line))
            }
            Input::Console(lines) => Ok(lines.recv().ok()),
        }
    }
}

fn export(record: &Path, dest: &Path, force: bool, input: &Input) -> Result<(), Box<dyn Error>> {
    let outcome = export_record(record, dest, |path| {
        force
            || prompt_bool(
                &format!("{} already exists. Overwrite? [y/N]: ", path.display()),
                false,
                input,
            )
            .unwrap_or(false)
    })?;
    match outcome {
        ExportOutcome::Copied(bytes) => {
            print_info(&format!("Exported {bytes} bytes to {}", dest.display()))
        }
        ExportOutcome::Declined => print_info("Export cancelled"),
    }
    Ok(())
}

fn prompt_line(prompt: &str, default: Option<&str>, input: &Input) -> Result<String, String> {
    print!("{prompt}");
    io::stdout().flush().map_err(|e| e.to_string())?;
    let line = input.read_line()?.unwrap_or_default();
    let value = line.trim();
    if value.is_empty() {
        Ok(default.unwrap_or("").to_string())
    } else {
        Ok(value.to_string())
    }
}

fn prompt_bool(prompt: &str, default: bool, input: &Input) -> Result<bool, String> {
    loop {
        let default_text = if default { "y" } else { "n" };
        let value = prompt_line(prompt, Some(default_text), input)?;
        match value.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => print_info("Please answer y or n."),
        }
    }
}
