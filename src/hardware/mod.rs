pub mod buttons;
pub mod gpio;
pub mod log_driver;
pub mod shift_register;

use anyhow::Result;
use std::fmt;

use crate::config::{DriverKind, OutputConfig};
use crate::error::PlaybackError;
use crate::profile::LightCode;

pub use buttons::{Button, TransportController};
pub use log_driver::LogDriver;
pub use shift_register::{BankPins, ShiftRegisterDriver};

/// Address of one LED bank, as numbered in the configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BankId(pub usize);

impl fmt::Display for BankId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bank {}", self.0)
    }
}

/// Write-only LED output. A pattern stays lit until the next `write` or
/// `clear` of the same bank.
pub trait OutputDriver: Send {
    fn write(&mut self, bank: BankId, pattern: LightCode) -> Result<()>;
    fn clear(&mut self, bank: BankId) -> Result<()>;
}

/// Build the configured driver. Failure here is fatal at startup.
pub fn open_driver(config: &OutputConfig) -> Result<Box<dyn OutputDriver>, PlaybackError> {
    match config.driver {
        DriverKind::Log => {
            log::info!("Output: logging driver with {} bank(s)", config.bank_count);
            Ok(Box::new(LogDriver::new(config.bank_count)))
        }
        DriverKind::ShiftRegister => Ok(Box::new(ShiftRegisterDriver::open(
            &config.gpio_root,
            &config.banks,
        )?)),
    }
}

pub fn bank_ids(count: usize) -> Vec<BankId> {
    (0..count).map(BankId).collect()
}
