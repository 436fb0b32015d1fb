//! Integration tests for the sidecar relay

use editor_pulse::host::DEFAULT_SOURCE_CAPACITY;
use editor_pulse::{relay, Config, EventSource, Session};
use std::io::Cursor;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

/// No ticks fire during a test run, so every message comes from an event.
fn quiet_config() -> Config {
    Config {
        tick_interval: Duration::from_secs(3600),
        ..Config::default()
    }
}

fn text_change_lines(count: usize) -> String {
    (0..count)
        .map(|line| {
            format!(
                "{{\"type\":\"textChange\",\"changes\":[{{\"insertedText\":\"x\",\"replacedLength\":0,\"startLine\":{line},\"startColumn\":0}}]}}\n"
            )
        })
        .collect()
}

#[test]
fn test_relay_writes_every_message() {
    // Well past the bounded subscriber capacity and the command queue.
    let events = 5000;
    let config = quiet_config();

    let mut session = Session::open(&config).expect("Failed to open session");
    let mut source = EventSource::new(DEFAULT_SOURCE_CAPACITY);
    source
        .start(Cursor::new(text_change_lines(events).into_bytes()))
        .expect("Failed to start source");

    let running = AtomicBool::new(true);
    let mut out = Vec::new();
    let report = relay(&mut session, &mut source, &mut out, &running).expect("relay failed");

    assert!(!session.is_open());
    assert_eq!(report.events_forwarded, events as u64);
    assert_eq!(report.messages_written, 2 * events as u64);
    assert!(!report.output_closed);

    let output = String::from_utf8(out).unwrap();
    let kinds: Vec<String> = output
        .lines()
        .map(|line| {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            value["kind"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(kinds.len(), 2 * events);
    assert_eq!(kinds.iter().filter(|k| *k == "keystroke").count(), events);
    assert_eq!(kinds.iter().filter(|k| *k == "activity").count(), events);
    assert_eq!(kinds[0], "keystroke");
    assert_eq!(kinds[1], "activity");

    let stats = session.stats().snapshot();
    assert_eq!(stats.text_changes, events as u64);
    assert_eq!(stats.messages_published, 2 * events as u64);
    assert_eq!(stats.messages_dropped, 0);
}

#[test]
fn test_relay_stops_when_not_running() {
    let mut session = Session::open(&quiet_config()).expect("Failed to open session");
    let mut source = EventSource::new(DEFAULT_SOURCE_CAPACITY);
    source
        .start(Cursor::new(text_change_lines(10).into_bytes()))
        .expect("Failed to start source");

    let running = AtomicBool::new(false);
    let mut out = Vec::new();
    let report = relay(&mut session, &mut source, &mut out, &running).expect("relay failed");

    assert_eq!(report.events_forwarded, 0);
    assert_eq!(report.messages_written, 0);
    assert!(out.is_empty());
    assert!(!session.is_open());
}
