//! SCPI command construction for the 8648 family.

use std::fmt;

use crate::units::{Amplitude, RfState};

/// Separator that makes the instrument run compound commands in order.
pub const SEQUENCE_SEPARATOR: &str = ";:";

/// Marker distinguishing a query from a one-way command.
pub const QUERY_MARKER: char = '?';

/// Identity probe.
pub const IDN_QUERY: &str = "*IDN?";

/// Compound readback of frequency and amplitude, answered as `"<freq>;<amp>"`.
pub const READBACK_QUERY: &str = "FREQ:CW?;:POW:AMPL?";

pub const DEFAULT_FREQUENCY: &str = "100 MHZ";
pub const DEFAULT_AMPLITUDE: &str = "-40 DBM";

/// A request to the instrument, either fire-and-forget or expecting a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Write(String),
    Query(String),
}

impl Command {
    /// Classify free-form text: anything containing `?` is a query.
    pub fn raw(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.contains(QUERY_MARKER) {
            Command::Query(text)
        } else {
            Command::Write(text)
        }
    }

    pub fn identify() -> Self {
        Command::Query(IDN_QUERY.to_string())
    }

    pub fn readback() -> Self {
        Command::Query(READBACK_QUERY.to_string())
    }

    pub fn set_frequency(value: &str) -> Self {
        Command::Write(format!("FREQ:CW {value}"))
    }

    pub fn set_amplitude(amplitude: &Amplitude) -> Self {
        Command::Write(format!("POW:AMPL {}", amplitude.as_str()))
    }

    pub fn set_rf(state: RfState) -> Self {
        Command::Write(format!("OUTP:STAT {}", state.to_command_value()))
    }

    /// Join several commands into one transmission. The result is a query if
    /// any part is.
    pub fn sequence<I>(parts: I) -> Self
    where
        I: IntoIterator<Item = Command>,
    {
        let mut is_query = false;
        let text = parts
            .into_iter()
            .map(|part| {
                is_query |= part.is_query();
                part.into_text()
            })
            .collect::<Vec<_>>()
            .join(SEQUENCE_SEPARATOR);

        if is_query {
            Command::Query(text)
        } else {
            Command::Write(text)
        }
    }

    pub fn is_query(&self) -> bool {
        matches!(self, Command::Query(_))
    }

    pub fn text(&self) -> &str {
        match self {
            Command::Write(text) | Command::Query(text) => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Command::Write(text) | Command::Query(text) => text,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}
