use serial_test::serial;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn write_bench(dir: &Path) -> PathBuf {
    let path = dir.join("bench.toml");
    let data_dir = dir.join("records");
    fs::write(
        &path,
        format!(
            "data_dir = '{}'\npower_poll_ms = 20\n",
            data_dir.display()
        ),
    )
    .unwrap();
    path
}

fn run_args<'a>(extra: &[&'a str]) -> Vec<&'a str> {
    let mut args = vec![
        "--dummy",
        "run",
        "--operator",
        "Alice",
        "--current",
        "0,5",
        "--voltage",
        "3",
        "--power-on",
        "1",
        "--power-off",
        "1",
        "--sample-rate",
        "1",
        "--start-cycle",
        "0",
        "--end-cycle",
        "0",
        "--channels",
        "ch1, ch3",
        "--name",
        "ch3=Hot side",
    ];
    args.extend_from_slice(extra);
    args
}

fn tec_cycler(bench: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tec-cycler"))
        .arg("--bench")
        .arg(bench)
        .args(args)
        .output()
        .expect("run tec-cycler")
}

fn records(dir: &Path) -> Vec<PathBuf> {
    match fs::read_dir(dir.join("records")) {
        Ok(entries) => entries.flatten().map(|entry| entry.path()).collect(),
        Err(_) => Vec::new(),
    }
}

#[test]
#[serial]
fn dummy_run_completes_and_writes_a_record() {
    let dir = tempfile::tempdir().unwrap();
    let bench = write_bench(dir.path());

    let output = tec_cycler(&bench, &run_args(&[]));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "stdout: {stdout}\nstderr: {stderr}");
    assert!(stdout.contains("[TEC][INFO] Test complete"), "{stdout}");

    let files = records(dir.path());
    assert_eq!(files.len(), 1);
    let name = files[0].file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("TEC cycling test "), "{name}");
    assert!(name.ends_with(".csv"), "{name}");

    let content = fs::read_to_string(&files[0]).unwrap();
    let mut lines = content.lines();
    assert_eq!(
        lines.next().unwrap(),
        "Datetime,Cycle No.,Operator,Current I (A),Voltage (V),Temp of ch1,Hot side"
    );
    let rows: Vec<&str> = lines.collect();
    assert!(rows.len() >= 2, "{content}");
    assert!(rows.iter().all(|row| row.split(',').count() == 7));
}

#[test]
#[serial]
fn json_mode_prints_one_snapshot_per_line() {
    let dir = tempfile::tempdir().unwrap();
    let bench = write_bench(dir.path());

    let mut args = vec!["--json"];
    args.extend(run_args(&[]));
    let output = tec_cycler(&bench, &args);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let snapshots: Vec<serde_json::Value> = stdout
        .lines()
        .filter(|line| line.starts_with('{'))
        .map(|line| serde_json::from_str(line).expect("snapshot json"))
        .collect();
    assert!(!snapshots.is_empty());
    let last = snapshots.last().unwrap();
    assert_eq!(last["status"], "complete");
    assert_eq!(last["channels"][1]["name"], "Hot side");
    assert_eq!(last["channels"][0]["channel"], "ch1");
    assert_eq!(
        last["elapsed"].as_array().unwrap().len(),
        last["channels"][0]["temperatures"].as_array().unwrap().len()
    );
}

#[test]
#[serial]
fn invalid_parameters_fail_without_a_record() {
    let dir = tempfile::tempdir().unwrap();
    let bench = write_bench(dir.path());

    let mut args = run_args(&[]);
    let rate = args.iter().position(|arg| *arg == "--sample-rate").unwrap();
    args[rate + 1] = "0";
    let output = tec_cycler(&bench, &args);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("sample rate"), "{stderr}");
    assert!(records(dir.path()).is_empty());

    let mut args = run_args(&[]);
    let start = args.iter().position(|arg| *arg == "--start-cycle").unwrap();
    args[start + 1] = "-1";
    let output = tec_cycler(&bench, &args);
    assert!(!output.status.success());
    assert!(records(dir.path()).is_empty());
}

#[test]
#[serial]
fn run_without_instruments_or_dummy_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let bench = write_bench(dir.path());
    let args: Vec<&str> = run_args(&[]).into_iter().skip(1).collect();

    let output = tec_cycler(&bench, &args);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("No instruments configured"), "{stderr}");
}

#[test]
#[serial]
fn run_exports_the_record_when_asked() {
    let dir = tempfile::tempdir().unwrap();
    let bench = write_bench(dir.path());
    let dest = dir.path().join("export.csv");
    let dest_arg = dest.to_string_lossy().to_string();

    let output = tec_cycler(&bench, &run_args(&["--export", &dest_arg]));
    assert!(output.status.success());
    let files = records(dir.path());
    assert_eq!(files.len(), 1);
    assert_eq!(
        fs::read_to_string(&dest).unwrap(),
        fs::read_to_string(&files[0]).unwrap()
    );
}

#[test]
#[serial]
fn export_subcommand_asks_before_overwriting() {
    let dir = tempfile::tempdir().unwrap();
    let bench = write_bench(dir.path());
    let record = dir.path().join("record.csv");
    let dest = dir.path().join("copy.csv");
    fs::write(&record, "Datetime,Cycle No.\n").unwrap();
    let record_arg = record.to_string_lossy().to_string();
    let dest_arg = dest.to_string_lossy().to_string();

    let output = tec_cycler(&bench, &["export", &record_arg, &dest_arg]);
    assert!(output.status.success());
    assert_eq!(fs::read_to_string(&dest).unwrap(), "Datetime,Cycle No.\n");

    fs::write(&dest, "keep me").unwrap();
    // no answer on stdin counts as "no"
    let output = tec_cycler(&bench, &["export", &record_arg, &dest_arg]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Export cancelled"));
    assert_eq!(fs::read_to_string(&dest).unwrap(), "keep me");

    let output = tec_cycler(&bench, &["export", &record_arg, &dest_arg, "--force"]);
    assert!(output.status.success());
    assert_eq!(fs::read_to_string(&dest).unwrap(), "Datetime,Cycle No.\n");

    let missing = dir.path().join("missing.csv").to_string_lossy().to_string();
    let output = tec_cycler(&bench, &["export", &missing, &dest_arg]);
    assert!(!output.status.success());
}

#[test]
#[serial]
fn failed_export_is_logged_but_the_run_still_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let bench = write_bench(dir.path());
    let dest_arg = dir.path().to_string_lossy().to_string();

    let output = tec_cycler(&bench, &run_args(&["--export", &dest_arg]));
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("[TEC][ERROR]: cannot export"), "{stderr}");
    assert!(stderr.contains("export of"), "{stderr}");
    assert_eq!(records(dir.path()).len(), 1);
}
