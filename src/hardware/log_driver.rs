use anyhow::Result;

use super::{BankId, OutputDriver};
use crate::profile::LightCode;

/// Stand-in for the LED banks: renders each bank as a bar in the log.
pub struct LogDriver {
    banks: Vec<LightCode>,
}

impl LogDriver {
    pub fn new(bank_count: usize) -> Self {
        Self {
            banks: vec![LightCode::ALL_CLEAR; bank_count],
        }
    }

    #[cfg(test)]
    pub fn patterns(&self) -> &[LightCode] {
        &self.banks
    }

    fn set(&mut self, bank: BankId, pattern: LightCode) -> Result<()> {
        let count = self.banks.len();
        let slot = self
            .banks
            .get_mut(bank.0)
            .ok_or_else(|| anyhow::anyhow!("{} out of range ({} banks)", bank, count))?;
        *slot = pattern;
        log::debug!("{} {}", render(&self.banks), bank);
        Ok(())
    }
}

fn render(banks: &[LightCode]) -> String {
    banks
        .iter()
        .map(|code| {
            code.shift_order()
                .map(|on| if on { '#' } else { '.' })
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

impl OutputDriver for LogDriver {
    fn write(&mut self, bank: BankId, pattern: LightCode) -> Result<()> {
        self.set(bank, pattern)
    }

    fn clear(&mut self, bank: BankId) -> Result<()> {
        self.set(bank, LightCode::ALL_CLEAR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_bank_patterns() {
        let mut driver = LogDriver::new(2);
        driver.write(BankId(1), LightCode::from_level(2)).unwrap();
        assert_eq!(driver.patterns(), &[LightCode::ALL_CLEAR, LightCode::from_level(2)]);
        driver.clear(BankId(1)).unwrap();
        assert_eq!(driver.patterns()[1], LightCode::ALL_CLEAR);
        assert!(driver.write(BankId(2), LightCode::ALL_SET).is_err());
    }

    #[test]
    fn renders_bars() {
        assert_eq!(
            render(&[LightCode::from_level(2), LightCode::ALL_SET]),
            "##...... | ########"
        );
    }
}
