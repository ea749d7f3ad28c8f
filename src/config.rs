//! Generator configuration, loadable from TOML.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::command::{DEFAULT_AMPLITUDE, DEFAULT_FREQUENCY};
use crate::error::{Error, Result};
use crate::transport::Backend;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorConfig {
    pub name: String,
    pub model: String,
    /// GPIB board index, the `0` in `GPIB0::19::INSTR`.
    pub board: u8,
    /// Primary bus address.
    pub address: String,
    /// Full resource string; overrides `board` and `address` when set.
    pub resource: Option<String>,
    pub frequency: String,
    pub amplitude: String,
    pub timeout_ms: u64,
    pub backend: Backend,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            name: "Signal Generator".to_string(),
            model: "8648C".to_string(),
            board: 0,
            address: "19".to_string(),
            resource: None,
            frequency: DEFAULT_FREQUENCY.to_string(),
            amplitude: DEFAULT_AMPLITUDE.to_string(),
            timeout_ms: 1000,
            backend: Backend::default(),
        }
    }
}

impl GeneratorConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(Error::Config("timeout_ms must be positive".into()));
        }
        if self.resource.is_none() && self.address.trim().is_empty() {
            return Err(Error::Config("address must not be empty".into()));
        }
        Ok(())
    }

    /// The VISA resource string the generator is opened with.
    pub fn resource_string(&self) -> String {
        match &self.resource {
            Some(resource) => resource.clone(),
            None => format!("GPIB{}::{}::INSTR", self.board, self.address.trim()),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
