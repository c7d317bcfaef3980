use std::fs;
use std::io;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

// The modem's power key: holding it low for a few seconds toggles the module.
pub trait PowerControl: Send {
    // Drive the line low and keep it there for `hold`.
    fn assert_low(&mut self, hold: Duration) -> io::Result<()>;

    fn release(&mut self) -> io::Result<()>;

    fn pulse(&mut self, hold: Duration) -> io::Result<()> {
        self.assert_low(hold)?;
        self.release()
    }
}

// Power key wired to a Linux GPIO line, driven through the sysfs interface.
pub struct SysfsGpioPower {
    line: u32,
    root: PathBuf,
}

impl SysfsGpioPower {
    pub fn new(line: u32) -> Self {
        Self::with_root(line, "/sys/class/gpio")
    }

    pub fn with_root(line: u32, root: impl Into<PathBuf>) -> Self {
        Self {
            line,
            root: root.into(),
        }
    }

    fn line_dir(&self) -> PathBuf {
        self.root.join(format!("gpio{}", self.line))
    }

    fn export(&self) -> io::Result<()> {
        if !self.line_dir().exists() {
            fs::write(self.root.join("export"), self.line.to_string())?;
        }
        fs::write(self.line_dir().join("direction"), "out")
    }

    fn set_level(&self, high: bool) -> io::Result<()> {
        fs::write(self.line_dir().join("value"), if high { "1" } else { "0" })
    }
}

impl PowerControl for SysfsGpioPower {
    fn assert_low(&mut self, hold: Duration) -> io::Result<()> {
        self.export()?;
        self.set_level(false)?;
        thread::sleep(hold);
        Ok(())
    }

    fn release(&mut self) -> io::Result<()> {
        self.set_level(true)?;
        fs::write(self.root.join("unexport"), self.line.to_string())
    }
}
