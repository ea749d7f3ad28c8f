//! Error type shared by the driver, transports and configuration.

use std::io;
use thiserror::Error;

/// Crate result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A command was issued before `connect()` or after `disconnect()`.
    #[error("not connected")]
    NotConnected,
    /// The transport could not open the resource.
    #[error("could not open {resource}")]
    Connection {
        resource: String,
        #[source]
        source: Box<Error>,
    },
    #[error("invalid resource string: {0}")]
    InvalidResource(String),
    #[error("I/O error on instrument link: {0}")]
    Io(#[from] io::Error),
    #[cfg(feature = "visa")]
    #[error("VISA error: {0:?}")]
    Visa(visa_rs::Error),
    /// Amplitude at or above 0 dBm, refused to protect the device under test.
    #[error("value too high: {0}")]
    AmplitudeTooHigh(String),
    #[error("cannot parse amplitude: {0}")]
    InvalidAmplitude(String),
    #[error("unknown RF output state '{0}', expected 'on' or 'off'")]
    UnknownRfState(String),
    /// The instrument answered with something the driver cannot parse.
    #[error("malformed response from instrument: {0:?}")]
    MalformedResponse(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("backend '{0}' is not available in this build")]
    BackendUnavailable(String),
}

#[cfg(feature = "visa")]
impl From<visa_rs::Error> for Error {
    fn from(err: visa_rs::Error) -> Self {
        Error::Visa(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}
