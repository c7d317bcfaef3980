use crate::args::IdentityArgs;
use crate::shared::connect::connect;
use anyhow::{Context, Result};

// Print the modem IMEI once the modem has answered the identity query.
pub fn run_identity(args: IdentityArgs) -> Result<()> {
    let connection = connect(&args.session)?;
    let identity = connection
        .modem
        .identity()
        .context("reading modem identity failed")?;
    println!("{identity}");
    Ok(())
}
