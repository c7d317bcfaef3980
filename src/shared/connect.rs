use crate::args::SessionArgs;
use crate::shared::lock::PortLock;
use crate::shared::signal::ShutdownFlag;
use anyhow::{Context, Result, bail};
use sim868_modem::Modem;
use sim868_modem::sim::SimHandle;
use std::thread;
use std::time::{Duration, Instant};

const IDENTITY_POLL: Duration = Duration::from_millis(200);
use tracing::{info, warn};

// A running session plus the port lock it was opened under.
// Field order matters: the session must stop before the lock is released.
pub struct Connection {
    pub modem: Modem,
    _lock: PortLock,
}

pub fn connect(args: &SessionArgs) -> Result<Connection> {
    let lock = PortLock::acquire(&args.lock_file, &args.serial_port)?;
    let config = args.to_session_config();

    let modem = if args.simulate {
        info!("using simulated modem");
        let sim = SimHandle::new();
        sim.report_gnss_every(Duration::from_secs(1));
        Modem::start(config, Box::new(sim.transport()), Box::new(sim.power()))
            .context("starting simulated modem session failed")?
    } else {
        Modem::open(config).with_context(|| {
            format!(
                "opening modem failed: {} @ {}",
                args.serial_port, args.baud_rate
            )
        })?
    };

    Ok(Connection { modem, _lock: lock })
}

impl Connection {
    // Give queued commands a chance to reach the modem before shutting down.
    pub fn flush(&self, limit: Duration) {
        let deadline = Instant::now() + limit;
        while self.modem.queued_commands() > 0 && self.modem.is_running() {
            if Instant::now() >= deadline {
                warn!(
                    pending = self.modem.queued_commands(),
                    "closing with commands still queued"
                );
                return;
            }
            thread::sleep(Duration::from_millis(50));
        }
    }
}

// Wait for the modem to report its IMEI. Returns None when interrupted first.
// The AT+GSN query is already queued by session start.
pub fn wait_identity(modem: &Modem, shutdown: &ShutdownFlag) -> Result<Option<String>> {
    loop {
        if let Some(identity) = modem.known_identity() {
            return Ok(Some(identity));
        }
        if !modem.is_running() {
            bail!("modem session stopped before the modem identified itself");
        }
        if !shutdown.sleep(IDENTITY_POLL) {
            return Ok(None);
        }
    }
}
