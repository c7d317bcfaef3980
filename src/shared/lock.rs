use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::process;

// Exclusive claim on a serial port, backed by an OS file lock.
pub struct PortLock {
    file: File,
}

impl PortLock {
    pub fn acquire(path: &Path, port: &str) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).with_context(|| {
                format!("creating lock directory failed: {}", parent.display())
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("opening lock file failed: {}", path.display()))?;

        file.try_lock_exclusive().with_context(|| {
            format!(
                "another session already owns {port} (lock: {})",
                path.display()
            )
        })?;

        // Record the owner for whoever hits the lock next.
        file.set_len(0)
            .and_then(|_| writeln!(file, "{} {}", process::id(), port))
            .with_context(|| format!("writing lock file failed: {}", path.display()))?;

        Ok(Self { file })
    }
}

impl Drop for PortLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}
