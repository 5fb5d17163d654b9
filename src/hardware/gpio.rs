//! Linux sysfs GPIO (`/sys/class/gpio`).

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A single digital output.
pub trait OutputLine: Send {
    fn set(&mut self, high: bool) -> Result<()>;
}

fn export(root: &Path, number: u32, direction: &str) -> Result<PathBuf> {
    let dir = root.join(format!("gpio{}", number));
    if !dir.exists() {
        std::fs::write(root.join("export"), number.to_string())
            .with_context(|| format!("Failed to export GPIO {} under {}", number, root.display()))?;
        // udev may need a moment to create the attribute files.
        for _ in 0..50 {
            if dir.join("direction").exists() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }
    std::fs::write(dir.join("direction"), direction)
        .with_context(|| format!("Failed to set GPIO {} direction to {}", number, direction))?;
    Ok(dir)
}

pub struct SysfsOutput {
    number: u32,
    value: File,
}

impl SysfsOutput {
    pub fn open(root: &Path, number: u32) -> Result<Self> {
        let dir = export(root, number, "out")?;
        let value = OpenOptions::new()
            .write(true)
            .open(dir.join("value"))
            .with_context(|| format!("Failed to open GPIO {} value", number))?;
        Ok(Self { number, value })
    }
}

impl OutputLine for SysfsOutput {
    fn set(&mut self, high: bool) -> Result<()> {
        self.value.seek(SeekFrom::Start(0))?;
        self.value
            .write_all(if high { b"1" } else { b"0" })
            .with_context(|| format!("Failed to write GPIO {}", self.number))
    }
}

pub struct SysfsInput {
    number: u32,
    value: PathBuf,
}

impl SysfsInput {
    pub fn open(root: &Path, number: u32) -> Result<Self> {
        let dir = export(root, number, "in")?;
        Ok(Self {
            number,
            value: dir.join("value"),
        })
    }

    pub fn is_high(&self) -> Result<bool> {
        let mut buf = String::new();
        File::open(&self.value)
            .and_then(|mut f| f.read_to_string(&mut buf))
            .with_context(|| format!("Failed to read GPIO {}", self.number))?;
        Ok(buf.trim() != "0")
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::test_util::temp_dir;

    /// Fake sysfs tree with pre-exported pins.
    pub(crate) fn fake_sysfs(name: &str, pins: &[u32]) -> PathBuf {
        let root = temp_dir(name);
        std::fs::write(root.join("export"), b"").unwrap();
        for pin in pins {
            let dir = root.join(format!("gpio{}", pin));
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join("direction"), b"in").unwrap();
            std::fs::write(dir.join("value"), b"0").unwrap();
        }
        root
    }

    #[test]
    fn output_writes_value_file() {
        let root = fake_sysfs("gpio-out", &[17]);
        let mut pin = SysfsOutput::open(&root, 17).unwrap();
        assert_eq!(std::fs::read_to_string(root.join("gpio17/direction")).unwrap(), "out");
        pin.set(true).unwrap();
        assert_eq!(std::fs::read_to_string(root.join("gpio17/value")).unwrap(), "1");
        pin.set(false).unwrap();
        assert_eq!(std::fs::read_to_string(root.join("gpio17/value")).unwrap(), "0");
    }

    #[test]
    fn input_reads_level() {
        let root = fake_sysfs("gpio-in", &[5]);
        let pin = SysfsInput::open(&root, 5).unwrap();
        assert!(!pin.is_high().unwrap());
        std::fs::write(root.join("gpio5/value"), b"1\n").unwrap();
        assert!(pin.is_high().unwrap());
    }

    #[test]
    fn unexported_pin_without_sysfs_fails() {
        let root = temp_dir("gpio-missing");
        assert!(SysfsOutput::open(&root.join("nope"), 3).is_err());
    }
}
