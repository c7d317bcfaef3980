use crate::args::GnssArgs;
use crate::shared::connect::connect;
use crate::shared::report::log_fix;
use crate::shared::signal::ShutdownFlag;
use anyhow::{Context, Result, bail};
use std::time::Duration;
use tracing::info;

// Power the GNSS engine and log the latest fix until Ctrl-C.
pub fn run_gnss(args: GnssArgs) -> Result<()> {
    let shutdown = ShutdownFlag::install()?;
    let connection = connect(&args.session)?;
    let modem = &connection.modem;

    modem
        .start_gnss(args.rate)
        .context("queueing GNSS start failed")?;
    info!(rate = args.rate, "GNSS started; waiting for position reports");

    let interval = Duration::from_secs(args.log_interval_secs.max(1));
    while shutdown.sleep(interval) {
        if !modem.is_running() {
            bail!("modem session stopped; see earlier errors");
        }
        log_fix(&modem.latest_fix());
    }

    modem.stop_gnss().context("queueing GNSS stop failed")?;
    connection.flush(Duration::from_secs(5));
    info!("GNSS logging stopped");
    Ok(())
}
