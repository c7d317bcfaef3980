use crate::args::RunArgs;
use crate::shared::connect::{connect, wait_identity};
use crate::shared::report::log_fix;
use crate::shared::signal::ShutdownFlag;
use anyhow::{Context, Result, bail};
use std::time::{Duration, Instant};
use tracing::{info, warn};

// Long-running mode: keep the bearer and GNSS up, log fixes, and let the
// session watchdog ride out modem hangs.
pub fn run_mode(args: RunArgs) -> Result<()> {
    let shutdown = ShutdownFlag::install()?;
    let connection = connect(&args.session)?;
    let modem = &connection.modem;

    match &args.network.apn {
        Some(apn) => {
            modem
                .configure_apn(apn, &args.network.username, &args.network.password)
                .context("configuring APN failed")?;
            modem.start_network().context("starting network failed")?;
        }
        None => warn!("no APN given; bearer left unconfigured"),
    }
    modem
        .start_gnss(args.gnss_rate)
        .context("queueing GNSS start failed")?;

    let Some(identity) = wait_identity(modem, &shutdown)? else {
        info!("interrupted before the modem identified itself");
        return Ok(());
    };
    info!(identity = %identity, port = %args.session.serial_port, "run mode started");

    let started = Instant::now();
    let mut drill = args.power_cycle_after_secs.map(Duration::from_secs);
    let interval = Duration::from_secs(args.log_interval_secs.max(1));

    while shutdown.sleep(interval) {
        if !modem.is_running() {
            bail!("modem session stopped after a transport fault");
        }
        if let Some(after) = drill
            && started.elapsed() >= after
        {
            warn!("recovery drill: forcing modem power cycle");
            modem.force_power_cycle();
            drill = None;
        }
        log_fix(&modem.latest_fix());
    }

    modem.stop_gnss().context("queueing GNSS stop failed")?;
    if args.network.apn.is_some() {
        modem.stop_network().context("queueing network stop failed")?;
    }
    connection.flush(Duration::from_secs(5));
    info!("run mode stopped");
    Ok(())
}
