//! Agilent 8648A-D signal generator driver.

use tracing::{debug, info, warn};

use crate::command::{Command, DEFAULT_AMPLITUDE, DEFAULT_FREQUENCY};
use crate::config::GeneratorConfig;
use crate::error::{Error, Result};
use crate::transport::{ResourceManager, Session};
use crate::units::{Amplitude, Readback, RfState};

pub struct SignalGenerator {
    // dropped before `manager`, some backends tie sessions to their manager
    session: Option<Box<dyn Session>>,
    manager: Box<dyn ResourceManager>,
    config: GeneratorConfig,
    frequency: String,
    amplitude: String,
}

impl SignalGenerator {
    pub fn new(config: GeneratorConfig, manager: Box<dyn ResourceManager>) -> Self {
        Self {
            session: None,
            frequency: config.frequency.clone(),
            amplitude: config.amplitude.clone(),
            manager,
            config,
        }
    }

    /// A generator with default settings at `GPIB0::19::INSTR`.
    pub fn with_manager(manager: Box<dyn ResourceManager>) -> Self {
        Self::new(GeneratorConfig::default(), manager)
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub fn resource(&self) -> String {
        self.config.resource_string()
    }

    /// Last frequency successfully sent to the instrument.
    pub fn frequency(&self) -> &str {
        &self.frequency
    }

    /// Last amplitude successfully sent to the instrument.
    pub fn amplitude(&self) -> &str {
        &self.amplitude
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Open the session. An existing session is closed first.
    pub fn connect(&mut self) -> Result<()> {
        if self.session.take().is_some() {
            debug!(name = %self.config.name, "closing previous session before reconnect");
        }

        let resource = self.config.resource_string();
        let session = self
            .manager
            .open_resource(&resource, self.config.timeout())
            .map_err(|e| Error::Connection {
                resource: resource.clone(),
                source: Box::new(e),
            })?;
        self.session = Some(session);

        info!(name = %self.config.name, model = %self.config.model, %resource, "connected");
        Ok(())
    }

    /// Release the session. Disconnecting twice is harmless.
    pub fn disconnect(&mut self) {
        if self.session.take().is_some() {
            info!(name = %self.config.name, "disconnected");
        }
    }

    /// Send free-form text; it is a query iff it contains `?`.
    pub fn send(&mut self, command: &str) -> Result<Option<String>> {
        self.execute(&Command::raw(command))
    }

    /// Send a typed command. Queries return the reply, writes return `None`.
    pub fn execute(&mut self, command: &Command) -> Result<Option<String>> {
        let session = self.session.as_mut().ok_or(Error::NotConnected)?;

        match command {
            Command::Write(text) => {
                debug!(command = %text, "write");
                session.write(text)?;
                Ok(None)
            }
            Command::Query(text) => {
                debug!(command = %text, "query");
                let response = session.query(text)?;
                debug!(%response, "reply");
                Ok(Some(response))
            }
        }
    }

    fn query(&mut self, command: &Command) -> Result<String> {
        self.execute(command)?
            .ok_or_else(|| Error::MalformedResponse(String::new()))
    }

    /// Identity string from `*IDN?`.
    pub fn identify(&mut self) -> Result<String> {
        self.query(&Command::identify())
    }

    /// 100 MHz, -40 dBm, RF on, in a single transmission.
    pub fn set_defaults(&mut self) -> Result<()> {
        let amplitude = Amplitude::parse_safe(DEFAULT_AMPLITUDE)?;
        let command = Command::sequence([
            Command::set_frequency(DEFAULT_FREQUENCY),
            Command::set_amplitude(&amplitude),
            Command::set_rf(RfState::On),
        ]);
        self.execute(&command)?;

        self.frequency = DEFAULT_FREQUENCY.to_string();
        self.amplitude = DEFAULT_AMPLITUDE.to_string();
        Ok(())
    }

    /// Switch RF output from a user token, `"on"` or `"off"` in any case.
    pub fn set_rf_output(&mut self, state: &str) -> Result<()> {
        let state = state.parse::<RfState>().inspect_err(|_| {
            warn!(state, "unrecognized RF state, nothing sent");
        })?;
        self.set_rf(state)
    }

    pub fn set_rf(&mut self, state: RfState) -> Result<()> {
        self.execute(&Command::set_rf(state))?;
        info!(%state, "RF output");
        Ok(())
    }

    /// Set the CW frequency, e.g. `"100 MHZ"`. The value is passed through as is.
    pub fn set_frequency(&mut self, value: &str) -> Result<()> {
        self.execute(&Command::set_frequency(value))?;
        self.frequency = value.to_string();
        Ok(())
    }

    /// Set the output level, e.g. `"-40 DBM"`.
    ///
    /// Only levels strictly below 0 dBm are sent; anything else returns
    /// [`Error::AmplitudeTooHigh`] without touching the instrument.
    pub fn set_amplitude(&mut self, value: &str) -> Result<()> {
        let amplitude = Amplitude::parse_safe(value).inspect_err(|e| {
            warn!(value, error = %e, "amplitude rejected");
        })?;

        self.execute(&Command::set_amplitude(&amplitude))?;
        self.amplitude = value.to_string();
        Ok(())
    }

    /// Numeric frequency (Hz) and amplitude (dBm) reported by the instrument.
    pub fn read_settings(&mut self) -> Result<Readback> {
        let response = self.query(&Command::readback())?;
        Readback::parse(&response)
    }

    /// Frequency and amplitude formatted as `("<f> Hz", "<a> dBm")`.
    pub fn get_frequency_and_amplitude(&mut self) -> Result<(String, String)> {
        let readback = self.read_settings()?;
        Ok((readback.frequency_string(), readback.amplitude_string()))
    }
}

impl Drop for SignalGenerator {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{Call, MockManager};

    fn connected() -> (SignalGenerator, MockManager) {
        let mock = MockManager::new();
        let mut sg = SignalGenerator::with_manager(Box::new(mock.clone()));
        sg.connect().unwrap();
        mock.clear_calls();
        (sg, mock)
    }

    #[test]
    fn connect_opens_configured_resource() {
        let mock = MockManager::new();
        let config = GeneratorConfig {
            address: "7".into(),
            ..GeneratorConfig::default()
        };
        let mut sg = SignalGenerator::new(config, Box::new(mock.clone()));
        assert!(!sg.is_connected());

        sg.connect().unwrap();
        assert!(sg.is_connected());
        assert_eq!(mock.calls(), vec![Call::Open("GPIB0::7::INSTR".into())]);
    }

    #[test]
    fn connect_failure_names_resource() {
        let mock = MockManager::new();
        mock.fail_next_open();
        let mut sg = SignalGenerator::with_manager(Box::new(mock));

        let err = sg.connect().unwrap_err();
        assert!(matches!(&err, Error::Connection { resource, .. } if resource == "GPIB0::19::INSTR"));
        assert!(!sg.is_connected());
    }

    #[test]
    fn reconnect_replaces_session() {
        let (mut sg, mock) = connected();
        sg.connect().unwrap();
        assert!(sg.is_connected());
        assert_eq!(mock.calls(), vec![Call::Open("GPIB0::19::INSTR".into())]);
    }

    #[test]
    fn disconnect_is_idempotent() {
        let (mut sg, _mock) = connected();
        sg.disconnect();
        sg.disconnect();
        assert!(matches!(sg.send("*IDN?"), Err(Error::NotConnected)));
    }

    #[test]
    fn settings_track_successful_writes() {
        let (mut sg, _mock) = connected();
        sg.set_frequency("250 MHZ").unwrap();
        sg.set_amplitude("-20 DBM").unwrap();
        assert_eq!(sg.frequency(), "250 MHZ");
        assert_eq!(sg.amplitude(), "-20 DBM");

        assert!(sg.set_amplitude("3 DBM").is_err());
        assert_eq!(sg.amplitude(), "-20 DBM");
    }

    #[test]
    fn transport_errors_propagate() {
        let (mut sg, mock) = connected();
        mock.fail_next_io();
        assert!(matches!(sg.set_frequency("1 MHZ"), Err(Error::Io(_))));
        assert_eq!(sg.frequency(), "100 MHZ");
    }

    #[test]
    fn identify_reads_idn() {
        let (mut sg, mock) = connected();
        assert!(sg.identify().unwrap().contains("8648C"));
        assert_eq!(mock.calls(), vec![Call::Query("*IDN?".into())]);
    }

    #[test]
    fn readback_from_simulated_state() {
        let (mut sg, _mock) = connected();
        sg.set_frequency("1.5 GHZ").unwrap();
        sg.set_amplitude("-7.5 dBm").unwrap();
        let rb = sg.read_settings().unwrap();
        assert_eq!(rb.frequency_hz, 1.5e9);
        assert_eq!(rb.amplitude_dbm, -7.5);
    }
}
