//! Control an Agilent 8648A-D RF signal generator with SCPI over GPIB/VISA.
//!
//! ```no_run
//! use sig8648::transport::Backend;
//! use sig8648::SignalGenerator;
//!
//! # fn main() -> sig8648::Result<()> {
//! let mut sg = SignalGenerator::with_manager(Backend::Visa.manager()?);
//! sg.connect()?;
//! sg.set_defaults()?;
//! let (freq, amp) = sg.get_frequency_and_amplitude()?;
//! println!("{freq}, {amp}");
//! sg.disconnect();
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod config;
pub mod error;
pub mod generator;
pub mod transport;
pub mod units;

pub use command::Command;
pub use config::GeneratorConfig;
pub use error::{Error, Result};
pub use generator::SignalGenerator;
pub use units::{Amplitude, Readback, RfState};
