//! Instrument links.
//!
//! A [`ResourceManager`] resolves a resource string such as
//! `"GPIB0::19::INSTR"` into an open [`Session`]. Sessions carry bare command
//! text; line termination is the backend's business.

use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

pub mod mock;
pub mod tcp;
#[cfg(feature = "visa")]
pub mod visa;

pub use mock::MockManager;
pub use tcp::TcpManager;
#[cfg(feature = "visa")]
pub use visa::VisaManager;

/// Opens sessions to addressed instruments.
pub trait ResourceManager {
    fn open_resource(&self, resource: &str, timeout: Duration) -> Result<Box<dyn Session>>;
}

/// An open link to one instrument.
pub trait Session {
    /// Send a command that produces no reply.
    fn write(&mut self, command: &str) -> Result<()>;

    /// Send a command and block until one reply line arrives.
    fn query(&mut self, command: &str) -> Result<String>;
}

/// Which [`ResourceManager`] to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Visa,
    Tcp,
    #[serde(alias = "sim")]
    Simulated,
}

impl Backend {
    pub fn manager(self) -> Result<Box<dyn ResourceManager>> {
        match self {
            #[cfg(feature = "visa")]
            Backend::Visa => Ok(Box::new(VisaManager::new()?)),
            #[cfg(not(feature = "visa"))]
            Backend::Visa => Err(Error::BackendUnavailable("visa".into())),
            Backend::Tcp => Ok(Box::new(TcpManager)),
            Backend::Simulated => Ok(Box::new(MockManager::new())),
        }
    }
}

impl FromStr for Backend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "visa" => Ok(Backend::Visa),
            "tcp" => Ok(Backend::Tcp),
            "simulated" | "sim" => Ok(Backend::Simulated),
            other => Err(Error::Config(format!("unknown backend '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_names() {
        assert_eq!("VISA".parse::<Backend>().unwrap(), Backend::Visa);
        assert_eq!("sim".parse::<Backend>().unwrap(), Backend::Simulated);
        assert!("serial".parse::<Backend>().is_err());
    }

    #[cfg(not(feature = "visa"))]
    #[test]
    fn visa_backend_requires_feature() {
        assert!(matches!(
            Backend::Visa.manager(),
            Err(Error::BackendUnavailable(_))
        ));
    }
}
