use crate::args::{HttpArgs, MethodArg};
use crate::shared::connect::connect;
use anyhow::{Context, Result};
use tracing::info;

// Perform one HTTP request through the modem and print the response.
pub fn run_http(args: HttpArgs) -> Result<()> {
    let connection = connect(&args.session)?;
    let modem = &connection.modem;

    if let Some(apn) = &args.network.apn {
        modem
            .configure_apn(apn, &args.network.username, &args.network.password)
            .context("configuring APN failed")?;
        modem.start_network().context("starting network failed")?;
        info!(apn = %apn, "bearer start queued");
    }

    let result = match args.method {
        MethodArg::Get => modem.http_get(&args.url),
        MethodArg::Post => modem.http_post(&args.url),
    }
    .with_context(|| format!("HTTP request failed: {}", args.url))?;

    println!(
        "status={} size={} cid={}",
        result.http_status, result.data_size, result.cid
    );
    if let Some(body) = result.data {
        println!("{body}");
    }
    Ok(())
}
