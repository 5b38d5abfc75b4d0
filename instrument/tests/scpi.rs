use instrument::scpi::parse_scan_buffer;
use instrument::{InstrumentError, InstrumentGateway, ScpiBench, ScpiTransport};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tec_core::ChannelId;

#[derive(Default)]
struct Script {
    sent: Vec<String>,
    replies: VecDeque<String>,
    closed: usize,
}

struct FakeTransport {
    script: Arc<Mutex<Script>>,
}

impl ScpiTransport for FakeTransport {
    fn write_line(&mut self, command: &str) -> Result<(), InstrumentError> {
        self.script.lock().unwrap().sent.push(command.to_string());
        Ok(())
    }

    fn read_line(&mut self) -> Result<String, InstrumentError> {
        self.script
            .lock()
            .unwrap()
            .replies
            .pop_front()
            .ok_or_else(|| InstrumentError::Communication("timeout".to_string()))
    }

    fn close(&mut self) {
        self.script.lock().unwrap().closed += 1;
    }
}

fn bench() -> (ScpiBench, Arc<Mutex<Script>>, Arc<Mutex<Script>>) {
    let supply = Arc::new(Mutex::new(Script::default()));
    let meter = Arc::new(Mutex::new(Script::default()));
    let bench = ScpiBench::connect(
        Box::new(FakeTransport {
            script: supply.clone(),
        }),
        Box::new(FakeTransport {
            script: meter.clone(),
        }),
    )
    .expect("connect");
    supply.lock().unwrap().sent.clear();
    meter.lock().unwrap().sent.clear();
    (bench, supply, meter)
}

fn channels(ids: &[u8]) -> Vec<ChannelId> {
    ids.iter().map(|n| ChannelId::new(*n).unwrap()).collect()
}

#[test]
fn connect_resets_supply_to_safe_state() {
    let supply = Arc::new(Mutex::new(Script::default()));
    let meter = Arc::new(Mutex::new(Script::default()));
    let _bench = ScpiBench::connect(
        Box::new(FakeTransport {
            script: supply.clone(),
        }),
        Box::new(FakeTransport {
            script: meter.clone(),
        }),
    )
    .unwrap();
    assert_eq!(
        supply.lock().unwrap().sent,
        vec!["*RST", "SYST:REM", "OUTP OFF", "VOLT 0", "CURR 0"]
    );
    let meter_sent = meter.lock().unwrap().sent.clone();
    assert_eq!(meter_sent[0], "*RST");
    assert!(meter_sent.contains(&"ROUT:SCAN:CRE (@101:110)".to_string()));
}

#[test]
fn supply_commands_and_queries() {
    let (mut bench, supply, _meter) = bench();
    supply
        .lock()
        .unwrap()
        .replies
        .extend(["12.001\n".to_string(), "1.499".to_string()]);

    bench.set_output(true).unwrap();
    bench.set_current(1.5).unwrap();
    bench.set_voltage(12.0).unwrap();
    assert_eq!(bench.read_voltage().unwrap(), 12.001);
    assert_eq!(bench.read_current().unwrap(), 1.499);
    bench.set_output(false).unwrap();

    assert_eq!(
        supply.lock().unwrap().sent,
        vec![
            "OUTP ON",
            "CURR 1.5",
            "VOLT 12",
            "MEAS:VOLT?",
            "MEAS:CURR?",
            "OUTP OFF"
        ]
    );
}

#[test]
fn non_numeric_reading_is_malformed() {
    let (mut bench, supply, _meter) = bench();
    supply.lock().unwrap().replies.push_back("ERR".to_string());
    assert!(matches!(
        bench.read_voltage(),
        Err(InstrumentError::MalformedResponse(_))
    ));
}

#[test]
fn missing_reply_is_communication_error() {
    let (mut bench, _supply, _meter) = bench();
    assert!(matches!(
        bench.read_current(),
        Err(InstrumentError::Communication(_))
    ));
}

#[test]
fn scan_extracts_requested_channels_in_order() {
    let (mut bench, _supply, meter) = bench();
    meter.lock().unwrap().replies.push_back(
        "1000,2000,3000,4000,5000,6000,7000,8000,9000,10000".to_string(),
    );
    let values = bench.scan_resistances(&channels(&[3, 1, 10])).unwrap();
    assert_eq!(values, vec![3000.0, 1000.0, 10000.0]);
    let sent = meter.lock().unwrap().sent.clone();
    assert_eq!(sent[0], "TRAC:CLE");
    assert_eq!(sent[1], "INIT");
    assert_eq!(
        sent.last().unwrap(),
        "TRAC:DATA? 1, 10, \"defbuffer1\", READ"
    );
}

#[test]
fn short_scan_buffer_is_malformed() {
    let (mut bench, _supply, meter) = bench();
    meter
        .lock()
        .unwrap()
        .replies
        .push_back("1000,2000,3000,4000,5000,6000,7000,8000,9000".to_string());
    let err = bench.scan_resistances(&channels(&[1])).unwrap_err();
    assert!(matches!(err, InstrumentError::MalformedResponse(_)));
}

#[test]
fn scan_buffer_parsing() {
    assert_eq!(
        parse_scan_buffer(" 1.5e3,2000\n").unwrap(),
        vec![1500.0, 2000.0]
    );
    assert!(parse_scan_buffer("").is_err());
    assert!(parse_scan_buffer("1000,,2000").is_err());
    assert!(parse_scan_buffer("1000,overflow").is_err());
}

#[test]
fn close_is_idempotent_and_blocks_further_commands() {
    let (mut bench, supply, meter) = bench();
    bench.close().unwrap();
    bench.close().unwrap();
    assert_eq!(supply.lock().unwrap().closed, 1);
    assert_eq!(meter.lock().unwrap().closed, 1);
    assert!(matches!(
        bench.set_output(false),
        Err(InstrumentError::Communication(_))
    ));
    drop(bench);
    assert_eq!(supply.lock().unwrap().closed, 1);
}
