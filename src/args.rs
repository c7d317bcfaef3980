use clap::{Args, Parser, Subcommand, ValueEnum};
use sim868_modem::SessionConfig;
use std::path::PathBuf;
use std::time::Duration;

// CLI root definition. Every subcommand drives one modem session.
#[derive(Parser, Debug)]
#[command(name = "sim868-modem", version)]
#[command(about = "SIM868 session driver: GNSS fixes, bearer bring-up and HTTP over AT commands")]
pub struct Cli {
    #[command(subcommand)]
    pub command: AppCommand,
}

#[derive(Subcommand, Debug)]
pub enum AppCommand {
    /// Power the GNSS engine and log position reports
    Gnss(GnssArgs),
    /// Bring up the bearer and perform one HTTP request
    Http(HttpArgs),
    /// Print the modem IMEI
    Identity(IdentityArgs),
    /// Keep network and GNSS up and log fixes until interrupted
    Run(RunArgs),
}

// Link and watchdog settings shared by all subcommands.
#[derive(Args, Debug, Clone)]
pub struct SessionArgs {
    #[arg(long, env = "SIM868_PORT", default_value = "/dev/ttyS0")]
    pub serial_port: String,
    #[arg(long, env = "SIM868_BAUD", default_value_t = 115_200)]
    pub baud_rate: u32,
    #[arg(long, default_value_t = 250)]
    pub read_timeout_ms: u64,
    #[arg(long, default_value_t = 100)]
    pub tick_ms: u64,
    #[arg(long, default_value_t = 30)]
    pub health_timeout_secs: u64,
    #[arg(long, default_value_t = 4_000)]
    pub power_pulse_ms: u64,
    #[arg(long, default_value_t = 5)]
    pub settle_secs: u64,
    #[arg(long, default_value_t = 4)]
    pub power_gpio: u32,
    #[arg(long)]
    pub request_timeout_secs: Option<u64>,
    #[arg(long)]
    pub data_read_timeout_secs: Option<u64>,
    #[arg(long)]
    pub max_queued_commands: Option<usize>,
    #[arg(long, default_value = "sim868.lock")]
    pub lock_file: PathBuf,
    /// Talk to an in-process simulated modem instead of hardware
    #[arg(long, default_value_t = false)]
    pub simulate: bool,
}

impl SessionArgs {
    pub fn to_session_config(&self) -> SessionConfig {
        let tick = Duration::from_millis(self.tick_ms.max(1));
        SessionConfig {
            serial_port: self.serial_port.clone(),
            baud_rate: self.baud_rate,
            read_timeout: Duration::from_millis(self.read_timeout_ms.max(1)),
            tick_interval: tick,
            poll_interval: tick,
            health_timeout: Duration::from_secs(self.health_timeout_secs.max(1)),
            power_pulse: Duration::from_millis(self.power_pulse_ms),
            settle_delay: Duration::from_secs(self.settle_secs),
            power_gpio: self.power_gpio,
            request_timeout: self.request_timeout_secs.map(Duration::from_secs),
            data_read_timeout: self.data_read_timeout_secs.map(Duration::from_secs),
            max_queued_commands: self.max_queued_commands,
        }
    }
}

// Bearer credentials. Without an APN the bearer is left as the modem has it.
#[derive(Args, Debug, Clone)]
pub struct NetworkArgs {
    #[arg(long)]
    pub apn: Option<String>,
    #[arg(long, default_value = "")]
    pub username: String,
    #[arg(long, default_value = "")]
    pub password: String,
}

#[derive(Args, Debug, Clone)]
pub struct GnssArgs {
    #[command(flatten)]
    pub session: SessionArgs,
    /// Report every N fixes
    #[arg(long, default_value_t = 1)]
    pub rate: u8,
    #[arg(long, default_value_t = 3)]
    pub log_interval_secs: u64,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum MethodArg {
    Get,
    Post,
}

#[derive(Args, Debug, Clone)]
pub struct HttpArgs {
    #[command(flatten)]
    pub session: SessionArgs,
    #[command(flatten)]
    pub network: NetworkArgs,
    #[arg(long, value_enum, default_value_t = MethodArg::Get)]
    pub method: MethodArg,
    pub url: String,
}

#[derive(Args, Debug, Clone)]
pub struct IdentityArgs {
    #[command(flatten)]
    pub session: SessionArgs,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub session: SessionArgs,
    #[command(flatten)]
    pub network: NetworkArgs,
    #[arg(long, default_value_t = 1)]
    pub gnss_rate: u8,
    #[arg(long, default_value_t = 3)]
    pub log_interval_secs: u64,
    /// Force one power cycle after this many seconds (recovery drill)
    #[arg(long)]
    pub power_cycle_after_secs: Option<u64>,
}
