use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use super::gpio::{OutputLine, SysfsOutput};
use super::{BankId, OutputDriver};
use crate::error::PlaybackError;
use crate::profile::LightCode;

/// GPIO numbers wiring one 74HC595-style register.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct BankPins {
    pub data: u32,
    pub clock: u32,
    pub latch: u32,
    /// Output enable, active low.
    pub enable: u32,
}

/// One serial-in, parallel-out register driving an 8-LED bank.
pub struct ShiftRegister<L: OutputLine> {
    data: L,
    clock: L,
    latch: L,
    enable: L,
}

impl<L: OutputLine> ShiftRegister<L> {
    pub fn new(data: L, clock: L, latch: L, enable: L) -> Result<Self> {
        let mut register = Self {
            data,
            clock,
            latch,
            enable,
        };
        register.data.set(false)?;
        register.clock.set(false)?;
        register.latch.set(false)?;
        register.enable.set(false)?;
        register.clear()?;
        Ok(register)
    }

    fn pulse_clock(&mut self) -> Result<()> {
        self.clock.set(false)?;
        self.clock.set(true)?;
        self.clock.set(false)
    }

    /// Move the shift register into the storage register (the outputs).
    fn latch(&mut self) -> Result<()> {
        self.latch.set(false)?;
        self.latch.set(true)?;
        self.latch.set(false)
    }

    pub fn write(&mut self, code: LightCode) -> Result<()> {
        for bit in code.shift_order() {
            self.data.set(bit)?;
            self.pulse_clock()?;
        }
        self.latch()
    }

    pub fn clear(&mut self) -> Result<()> {
        self.data.set(false)?;
        for _ in 0..8 {
            self.pulse_clock()?;
        }
        self.latch()
    }
}

/// Output driver with one shift register per bank.
pub struct ShiftRegisterDriver<L: OutputLine> {
    registers: Vec<ShiftRegister<L>>,
}

impl<L: OutputLine> ShiftRegisterDriver<L> {
    pub fn new(registers: Vec<ShiftRegister<L>>) -> Self {
        Self { registers }
    }

    fn register(&mut self, bank: BankId) -> Result<&mut ShiftRegister<L>> {
        let count = self.registers.len();
        self.registers
            .get_mut(bank.0)
            .with_context(|| format!("{} out of range ({} registers)", bank, count))
    }
}

impl ShiftRegisterDriver<SysfsOutput> {
    /// Export and initialise every bank's pins. Any failure means the
    /// hardware is absent.
    pub fn open(root: &Path, banks: &[BankPins]) -> Result<Self, PlaybackError> {
        let mut registers = Vec::with_capacity(banks.len());
        for (i, pins) in banks.iter().enumerate() {
            let register = (|| -> Result<_> {
                ShiftRegister::new(
                    SysfsOutput::open(root, pins.data)?,
                    SysfsOutput::open(root, pins.clock)?,
                    SysfsOutput::open(root, pins.latch)?,
                    SysfsOutput::open(root, pins.enable)?,
                )
            })()
            .map_err(|e| PlaybackError::OutputDriverUnavailable(format!("bank {}: {:#}", i, e)))?;
            registers.push(register);
        }
        log::info!("Shift-register driver ready with {} bank(s)", registers.len());
        Ok(Self::new(registers))
    }
}

impl<L: OutputLine> OutputDriver for ShiftRegisterDriver<L> {
    fn write(&mut self, bank: BankId, pattern: LightCode) -> Result<()> {
        self.register(bank)?.write(pattern)
    }

    fn clear(&mut self, bank: BankId) -> Result<()> {
        self.register(bank)?.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::gpio::tests::fake_sysfs;
    use std::sync::{Arc, Mutex};

    type Trace = Arc<Mutex<Vec<(&'static str, bool)>>>;

    struct Line {
        name: &'static str,
        trace: Trace,
    }

    impl OutputLine for Line {
        fn set(&mut self, high: bool) -> Result<()> {
            self.trace.lock().unwrap().push((self.name, high));
            Ok(())
        }
    }

    fn register(trace: &Trace) -> ShiftRegister<Line> {
        let line = |name| Line {
            name,
            trace: trace.clone(),
        };
        ShiftRegister::new(line("data"), line("clock"), line("latch"), line("enable")).unwrap()
    }

    /// Data level at each rising clock edge, and the number of latch pulses.
    fn decode(trace: &[(&'static str, bool)]) -> (Vec<bool>, usize) {
        let mut data = false;
        let mut clock = false;
        let mut latch = false;
        let mut shifted = Vec::new();
        let mut latches = 0;
        for &(name, high) in trace {
            match name {
                "data" => data = high,
                "clock" => {
                    if high && !clock {
                        shifted.push(data);
                    }
                    clock = high;
                }
                "latch" => {
                    if high && !latch {
                        latches += 1;
                    }
                    latch = high;
                }
                _ => {}
            }
        }
        (shifted, latches)
    }

    #[test]
    fn write_shifts_msb_first_then_latches() {
        let trace: Trace = Arc::default();
        let mut reg = register(&trace);
        trace.lock().unwrap().clear();

        reg.write(LightCode::from_level(3)).unwrap();
        let (bits, latches) = decode(&trace.lock().unwrap());
        assert_eq!(bits, vec![true, true, true, false, false, false, false, false]);
        assert_eq!(latches, 1);
    }

    #[test]
    fn setup_enables_outputs_and_clears() {
        let trace: Trace = Arc::default();
        let _reg = register(&trace);
        let trace = trace.lock().unwrap();
        assert!(trace.contains(&("enable", false)));
        let (bits, latches) = decode(&trace);
        assert_eq!(bits, vec![false; 8]);
        assert_eq!(latches, 1);
    }

    #[test]
    fn driver_rejects_unknown_bank() {
        let trace: Trace = Arc::default();
        let mut driver = ShiftRegisterDriver::new(vec![register(&trace)]);
        assert!(driver.write(BankId(0), LightCode::ALL_SET).is_ok());
        assert!(driver.write(BankId(1), LightCode::ALL_SET).is_err());
    }

    #[test]
    fn open_over_sysfs() {
        let root = fake_sysfs("shift-open", &[1, 2, 3, 4]);
        let pins = BankPins {
            data: 1,
            clock: 2,
            latch: 3,
            enable: 4,
        };
        let mut driver = ShiftRegisterDriver::open(&root, &[pins]).unwrap();
        driver.write(BankId(0), LightCode::ALL_SET).unwrap();
        assert_eq!(std::fs::read_to_string(root.join("gpio1/value")).unwrap(), "1");

        let missing = ShiftRegisterDriver::open(&root.join("absent"), &[pins]).err();
        assert!(matches!(missing, Some(PlaybackError::OutputDriverUnavailable(_))));
    }
}
