use anyhow::{Context, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

const WAKE_STEP: Duration = Duration::from_millis(100);

// Run flag cleared by Ctrl-C. Long-running commands pace themselves with
// `sleep`, which wakes early once the flag drops.
pub struct ShutdownFlag {
    running: Arc<AtomicBool>,
}

impl ShutdownFlag {
    pub fn install() -> Result<Self> {
        let flag = Self::armed();
        let running_for_signal = Arc::clone(&flag.running);
        ctrlc::set_handler(move || {
            running_for_signal.store(false, Ordering::SeqCst);
        })
        .context("installing Ctrl-C handler failed")?;
        Ok(flag)
    }

    fn armed() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    #[cfg(test)]
    pub fn unhooked() -> Self {
        Self::armed()
    }

    #[cfg(test)]
    pub fn trigger(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    // Sleep for `period`; returns false if interrupted.
    pub fn sleep(&self, period: Duration) -> bool {
        let deadline = Instant::now() + period;
        while self.is_running() {
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep(WAKE_STEP.min(deadline - now));
        }
        false
    }
}
