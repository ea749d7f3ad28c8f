//! Simulated 8648 for tests and `--simulate` runs.
//!
//! The manager and every session it opens share one state, so a test can keep
//! a clone of the manager and inspect what went over the wire.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::info;

use super::{ResourceManager, Session};
use crate::command::SEQUENCE_SEPARATOR;
use crate::error::{Error, Result};

/// One transmission as seen by the simulated instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Open(String),
    Write(String),
    Query(String),
}

#[derive(Debug)]
struct SimState {
    calls: Vec<Call>,
    queued_responses: VecDeque<String>,
    fail_next_open: bool,
    fail_next_io: bool,
    frequency_hz: f64,
    amplitude_dbm: f64,
    rf_on: bool,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            queued_responses: VecDeque::new(),
            fail_next_open: false,
            fail_next_io: false,
            frequency_hz: 100.0e6,
            amplitude_dbm: -40.0,
            rf_on: false,
        }
    }
}

impl SimState {
    fn take_io_failure(&mut self) -> Result<()> {
        if std::mem::take(&mut self.fail_next_io) {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "mock I/O failure",
            )));
        }
        Ok(())
    }

    /// Apply each part of a (possibly compound) command, collecting query replies.
    fn execute(&mut self, text: &str) -> Vec<String> {
        let mut replies = Vec::new();
        for part in text.split(SEQUENCE_SEPARATOR) {
            let part = part.trim().trim_start_matches(':');
            let upper = part.to_ascii_uppercase();
            let mut words = upper.split_whitespace();
            let header = words.next().unwrap_or_default();
            let args: Vec<&str> = words.collect();

            match header {
                "*IDN?" => replies.push("HEWLETT-PACKARD,8648C,0,B.04.01".to_string()),
                "FREQ:CW?" => replies.push(format!("{:?}", self.frequency_hz)),
                "POW:AMPL?" => replies.push(format!("{:?}", self.amplitude_dbm)),
                "OUTP:STAT?" => replies.push(if self.rf_on { "1" } else { "0" }.to_string()),
                "FREQ:CW" => {
                    if let Some(hz) = parse_frequency(&args) {
                        self.frequency_hz = hz;
                    }
                }
                "POW:AMPL" => {
                    let level = args.first().map(|a| a.trim_end_matches("DBM"));
                    if let Some(Ok(dbm)) = level.map(str::parse::<f64>) {
                        self.amplitude_dbm = dbm;
                    }
                }
                "OUTP:STAT" => match args.first().copied() {
                    Some("ON") | Some("1") => self.rf_on = true,
                    Some("OFF") | Some("0") => self.rf_on = false,
                    _ => {}
                },
                _ => {}
            }
        }
        replies
    }
}

/// Frequency arguments as `["100", "MHZ"]` or `["100MHZ"]`, in Hz.
fn parse_frequency(args: &[&str]) -> Option<f64> {
    let joined = args.concat();
    let split = joined
        .find(|c: char| c.is_ascii_alphabetic() && c != 'E')
        .unwrap_or(joined.len());
    let (number, unit) = joined.split_at(split);
    let scale = match unit {
        "" | "HZ" => 1.0,
        "KHZ" => 1.0e3,
        "MHZ" => 1.0e6,
        "GHZ" => 1.0e9,
        _ => return None,
    };
    number.parse::<f64>().ok().map(|v| v * scale)
}

/// Shared handle to a simulated generator.
#[derive(Debug, Clone, Default)]
pub struct MockManager {
    state: Arc<Mutex<SimState>>,
}

impl MockManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        // A poisoned lock only means a test thread panicked mid-call.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Answer the next query with `response` instead of the simulated state.
    pub fn queue_response(&self, response: impl Into<String>) {
        self.state().queued_responses.push_back(response.into());
    }

    /// Make the next `open_resource` fail.
    pub fn fail_next_open(&self) {
        self.state().fail_next_open = true;
    }

    /// Make the next write or query fail.
    pub fn fail_next_io(&self) {
        self.state().fail_next_io = true;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Text of every write and query, in order, without the opens.
    pub fn transmissions(&self) -> Vec<String> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::Write(text) | Call::Query(text) => Some(text.clone()),
                Call::Open(_) => None,
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn rf_on(&self) -> bool {
        self.state().rf_on
    }
}

impl ResourceManager for MockManager {
    fn open_resource(&self, resource: &str, _timeout: Duration) -> Result<Box<dyn Session>> {
        let mut state = self.state();
        state.calls.push(Call::Open(resource.to_string()));
        if std::mem::take(&mut state.fail_next_open) {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no listener at address",
            )));
        }
        info!(resource, "simulated generator attached");
        Ok(Box::new(MockSession {
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockSession {
    state: Arc<Mutex<SimState>>,
}

impl MockSession {
    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Session for MockSession {
    fn write(&mut self, command: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::Write(command.to_string()));
        state.take_io_failure()?;
        state.execute(command);
        Ok(())
    }

    fn query(&mut self, command: &str) -> Result<String> {
        let mut state = self.state();
        state.calls.push(Call::Query(command.to_string()));
        state.take_io_failure()?;
        let replies = state.execute(command);
        Ok(state
            .queued_responses
            .pop_front()
            .unwrap_or_else(|| replies.join(";")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(manager: &MockManager) -> Box<dyn Session> {
        manager
            .open_resource("GPIB0::19::INSTR", Duration::from_secs(1))
            .unwrap()
    }

    #[test]
    fn tracks_settings() {
        let manager = MockManager::new();
        let mut s = session(&manager);

        s.write("FREQ:CW 250 MHZ;:POW:AMPL -12.5 DBM;:OUTP:STAT ON")
            .unwrap();
        assert_eq!(s.query("FREQ:CW?;:POW:AMPL?").unwrap(), "250000000.0;-12.5");
        assert!(manager.rf_on());

        s.write("OUTP:STAT OFF").unwrap();
        assert!(!manager.rf_on());
    }

    #[test]
    fn queued_response_wins() {
        let manager = MockManager::new();
        let mut s = session(&manager);
        manager.queue_response("garbage");
        assert_eq!(s.query("*IDN?").unwrap(), "garbage");
        assert!(s.query("*IDN?").unwrap().contains("8648C"));
    }

    #[test]
    fn failure_injection_is_one_shot() {
        let manager = MockManager::new();
        manager.fail_next_open();
        assert!(manager
            .open_resource("GPIB0::19::INSTR", Duration::from_secs(1))
            .is_err());

        let mut s = session(&manager);
        manager.fail_next_io();
        assert!(s.write("OUTP:STAT ON").is_err());
        assert!(s.write("OUTP:STAT ON").is_ok());
    }

    #[test]
    fn frequency_units() {
        assert_eq!(parse_frequency(&["100", "MHZ"]), Some(100.0e6));
        assert_eq!(parse_frequency(&["1.5GHZ"]), Some(1.5e9));
        assert_eq!(parse_frequency(&["2E3"]), Some(2000.0));
        assert_eq!(parse_frequency(&["10", "FURLONGS"]), None);
    }
}
