//! Unit-qualified values exchanged with the generator.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Unit suffix accepted on amplitude strings, matched case-insensitively.
const DBM_UNIT: &str = "dbm";

/// An amplitude request such as `"-40 DBM"`.
///
/// The original text is kept so it can be forwarded to the instrument as
/// written; `level_dbm` is only used for the safety check.
#[derive(Debug, Clone, PartialEq)]
pub struct Amplitude {
    text: String,
    level_dbm: f64,
}

impl Amplitude {
    /// Parse the magnitude out of a number with an optional `dBm` suffix.
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        let magnitude = match trimmed.len().checked_sub(DBM_UNIT.len()) {
            Some(split)
                if trimmed.is_char_boundary(split)
                    && trimmed[split..].eq_ignore_ascii_case(DBM_UNIT) =>
            {
                trimmed[..split].trim_end()
            }
            _ => trimmed,
        };
        let level_dbm = magnitude
            .parse::<f64>()
            .map_err(|_| Error::InvalidAmplitude(text.to_string()))?;
        if !level_dbm.is_finite() {
            return Err(Error::InvalidAmplitude(text.to_string()));
        }
        Ok(Self {
            text: text.to_string(),
            level_dbm,
        })
    }

    /// Parse and reject anything that is not strictly below 0 dBm.
    pub fn parse_safe(text: &str) -> Result<Self> {
        let amplitude = Self::parse(text)?;
        if amplitude.level_dbm >= 0.0 {
            return Err(Error::AmplitudeTooHigh(text.to_string()));
        }
        Ok(amplitude)
    }

    pub fn level_dbm(&self) -> f64 {
        self.level_dbm
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

/// RF output switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RfState {
    On,
    Off,
}

impl RfState {
    pub fn to_command_value(&self) -> &'static str {
        match self {
            RfState::On => "ON",
            RfState::Off => "OFF",
        }
    }
}

impl FromStr for RfState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "on" => Ok(RfState::On),
            "off" => Ok(RfState::Off),
            _ => Err(Error::UnknownRfState(s.to_string())),
        }
    }
}

impl fmt::Display for RfState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_command_value())
    }
}

/// Frequency and amplitude as reported by the instrument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Readback {
    pub frequency_hz: f64,
    pub amplitude_dbm: f64,
}

impl Readback {
    /// Parse a `"<freq>;<amp>"` reply to the compound readback query.
    pub fn parse(response: &str) -> Result<Self> {
        let malformed = || Error::MalformedResponse(response.to_string());

        let mut fields = response.trim().split(';');
        let (Some(freq), Some(amp), None) = (fields.next(), fields.next(), fields.next()) else {
            return Err(malformed());
        };
        let frequency_hz = freq.trim().parse::<f64>().map_err(|_| malformed())?;
        let amplitude_dbm = amp.trim().parse::<f64>().map_err(|_| malformed())?;

        Ok(Self {
            frequency_hz,
            amplitude_dbm,
        })
    }

    /// Frequency as `"<value> Hz"`, always printed with a decimal part.
    pub fn frequency_string(&self) -> String {
        format!("{:?} Hz", self.frequency_hz)
    }

    /// Amplitude as `"<value> dBm"`, always printed with a decimal part.
    pub fn amplitude_string(&self) -> String {
        format!("{:?} dBm", self.amplitude_dbm)
    }
}
