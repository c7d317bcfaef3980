//! The modem session: one background loop owning the serial link, plus the
//! caller-facing [`Modem`] handle.
//!
//! Callers only touch the shared queues and result slots; everything that
//! talks to the transport or the power line runs on the session thread.

mod dispatch;
mod health;
mod http;
mod queue;
mod session;
mod setup;

pub use http::{HttpMethod, HttpRequest, HttpResult, RequestState};
pub use setup::NetworkConfig;

use crate::config::SessionConfig;
use crate::error::{ModemError, ModemResult};
use crate::gnss::GpsFix;
use crate::power::{PowerControl, SysfsGpioPower};
use crate::transport::{LineTransport, SerialTransport};
use dispatch::IDENTITY_QUERY;
use http::HttpBook;
use queue::CommandQueue;
use session::Session;
use setup::Intent;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{error, info};

// State reachable from both caller threads and the session loop.
pub(crate) struct Shared {
    pub(crate) config: SessionConfig,
    pub(crate) commands: Mutex<CommandQueue>,
    pub(crate) http: Mutex<HttpBook>,
    pub(crate) intent: Mutex<Intent>,
    pub(crate) fix: Mutex<GpsFix>,
    pub(crate) identity: Mutex<Option<String>>,
    pub(crate) gnss_powered: AtomicBool,
    pub(crate) power_cycle_requested: AtomicBool,
    pub(crate) running: AtomicBool,
}

impl Shared {
    pub(crate) fn new(config: SessionConfig) -> Self {
        Self {
            commands: Mutex::new(CommandQueue::new(config.max_queued_commands)),
            http: Mutex::new(HttpBook::default()),
            intent: Mutex::new(Intent::default()),
            fix: Mutex::new(GpsFix::default()),
            identity: Mutex::new(None),
            gnss_powered: AtomicBool::new(false),
            power_cycle_requested: AtomicBool::new(false),
            running: AtomicBool::new(true),
            config,
        }
    }

    pub(crate) fn enqueue(&self, command: impl Into<String>) -> ModemResult<()> {
        guard(&self.commands).push(command.into())
    }

    pub(crate) fn enqueue_all(&self, commands: Vec<String>) -> ModemResult<()> {
        guard(&self.commands).push_all(commands)
    }

    // Cooperative wait used by every blocking caller operation. `check` is
    // polled at the configured interval; `give_up` runs on timeout or shutdown.
    pub(crate) fn wait_for<T>(
        &self,
        what: &'static str,
        mut check: impl FnMut() -> Option<T>,
        give_up: impl FnOnce(),
    ) -> ModemResult<T> {
        let started = Instant::now();
        loop {
            if let Some(value) = check() {
                return Ok(value);
            }
            if !self.running.load(Ordering::SeqCst) {
                give_up();
                return Err(ModemError::SessionClosed);
            }
            if let Some(limit) = self.config.request_timeout
                && started.elapsed() >= limit
            {
                give_up();
                return Err(ModemError::WaitTimeout {
                    waited: started.elapsed(),
                    what,
                });
            }
            thread::sleep(self.config.poll_interval);
        }
    }

    fn wait_identity(&self) -> ModemResult<String> {
        if let Some(identity) = guard(&self.identity).clone() {
            return Ok(identity);
        }
        self.enqueue(IDENTITY_QUERY)?;
        self.wait_for("modem identity", || guard(&self.identity).clone(), || {})
    }
}

// Lock a shared structure, recovering the data if a holder panicked.
pub(crate) fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to a running modem session.
///
/// Dropping the handle stops the session loop and closes the serial port.
pub struct Modem {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl Modem {
    /// Open the configured serial port and GPIO power line and start the session.
    pub fn open(config: SessionConfig) -> ModemResult<Self> {
        let transport =
            SerialTransport::open(&config.serial_port, config.baud_rate, config.read_timeout)
                .map_err(|err| ModemError::transport("opening serial port", err))?;
        let power = SysfsGpioPower::new(config.power_gpio);
        Self::start(config, Box::new(transport), Box::new(power))
    }

    /// Start a session over caller-supplied collaborators.
    pub fn start(
        config: SessionConfig,
        transport: Box<dyn LineTransport>,
        power: Box<dyn PowerControl>,
    ) -> ModemResult<Self> {
        let shared = Arc::new(Shared::new(config));
        shared.enqueue(IDENTITY_QUERY)?;

        let session = Session::new(Arc::clone(&shared), transport, power);
        let worker = thread::Builder::new()
            .name("modem-session".to_string())
            .spawn(move || session.run())
            .map_err(ModemError::WorkerSpawn)?;

        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    /// Queue a raw AT command for the session loop to send.
    pub fn enqueue_raw_command(&self, command: impl Into<String>) -> ModemResult<()> {
        self.shared.enqueue(command)
    }

    pub fn configure_apn(&self, apn: &str, username: &str, password: &str) -> ModemResult<()> {
        self.shared.configure_network(NetworkConfig {
            apn: apn.to_string(),
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    pub fn start_network(&self) -> ModemResult<()> {
        self.shared.start_network()
    }

    pub fn stop_network(&self) -> ModemResult<()> {
        self.shared.stop_network()
    }

    /// Power the GNSS engine and ask for a `+UGNSINF` report every `rate` fixes.
    pub fn start_gnss(&self, rate: u8) -> ModemResult<()> {
        self.shared.start_gnss(rate)
    }

    pub fn stop_gnss(&self) -> ModemResult<()> {
        self.shared.stop_gnss()
    }

    /// Latest successfully parsed positioning report.
    pub fn latest_fix(&self) -> GpsFix {
        *guard(&self.shared.fix)
    }

    /// GNSS power state as last reported by the modem.
    pub fn gnss_powered(&self) -> bool {
        self.shared.gnss_powered.load(Ordering::SeqCst)
    }

    /// Modem IMEI; blocks until the modem has answered `AT+GSN`.
    pub fn identity(&self) -> ModemResult<String> {
        self.shared.wait_identity()
    }

    /// Modem IMEI if it has already been reported; never blocks.
    pub fn known_identity(&self) -> Option<String> {
        guard(&self.shared.identity).clone()
    }

    pub fn http_get(&self, url: &str) -> ModemResult<HttpResult> {
        self.shared.submit(HttpMethod::Get, url)
    }

    pub fn http_post(&self, url: &str) -> ModemResult<HttpResult> {
        self.shared.submit(HttpMethod::Post, url)
    }

    /// Ask the session loop to power-cycle the modem on its next tick.
    pub fn force_power_cycle(&self) {
        self.shared.power_cycle_requested.store(true, Ordering::SeqCst);
    }

    /// Commands waiting to be written to the modem.
    pub fn queued_commands(&self) -> usize {
        guard(&self.shared.commands).len()
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.shared.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("modem session worker panicked");
            } else {
                info!("modem session shut down");
            }
        }
    }
}

impl Drop for Modem {
    fn drop(&mut self) {
        self.stop();
    }
}
