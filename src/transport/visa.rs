//! VISA backend for GPIB, USB and LAN instruments. Needs the `visa` feature
//! and a VISA runtime on the host.

use std::ffi::CString;
use std::io::{BufRead, BufReader, Write};
use std::time::Duration;

use tracing::debug;
use visa_rs::prelude::*;

use super::{ResourceManager, Session};
use crate::error::{Error, Result};

/// Sessions opened through the system VISA library.
pub struct VisaManager {
    rm: DefaultRM,
}

impl VisaManager {
    pub fn new() -> Result<Self> {
        Ok(Self {
            rm: DefaultRM::new()?,
        })
    }
}

impl ResourceManager for VisaManager {
    fn open_resource(&self, resource: &str, timeout: Duration) -> Result<Box<dyn Session>> {
        let resource_string =
            CString::new(resource).map_err(|_| Error::InvalidResource(resource.to_string()))?;

        let instr = self
            .rm
            .open(&resource_string.into(), AccessMode::NO_LOCK, timeout)?;
        debug!(resource, "VISA session open");

        Ok(Box::new(VisaSession { instr }))
    }
}

struct VisaSession {
    instr: Instrument,
}

impl Session for VisaSession {
    fn write(&mut self, command: &str) -> Result<()> {
        let cmd_with_term = format!("{command}\n");
        self.instr
            .write_all(cmd_with_term.as_bytes())
            .map_err(visa_rs::io_to_vs_err)?;
        Ok(())
    }

    fn query(&mut self, command: &str) -> Result<String> {
        self.write(command)?;

        let mut response = String::new();
        {
            // BufReader must be dropped before the instrument is written again
            let mut reader = BufReader::new(&self.instr);
            reader.read_line(&mut response).map_err(visa_rs::io_to_vs_err)?;
        }
        Ok(response.trim_end().to_string())
    }
}
