use std::time::Duration;

// Runtime settings for one modem session. The CLI builds this from its
// arguments; library users usually start from `SessionConfig::default()`.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub serial_port: String,
    pub baud_rate: u32,
    /// Serial read timeout used while assembling a line.
    pub read_timeout: Duration,
    /// Session loop period.
    pub tick_interval: Duration,
    /// Period at which blocked callers re-check for their result.
    pub poll_interval: Duration,
    /// Silence after which the watchdog probes or power-cycles.
    pub health_timeout: Duration,
    /// How long the power key is held low.
    pub power_pulse: Duration,
    /// Pause before and after reopening the serial port.
    pub settle_delay: Duration,
    /// Sysfs GPIO line wired to the modem power key.
    pub power_gpio: u32,
    /// Upper bound for `http_get`/`http_post`/`identity`; `None` waits forever.
    pub request_timeout: Option<Duration>,
    /// Upper bound for the data line after `+HTTPREAD`; `None` waits forever.
    pub data_read_timeout: Option<Duration>,
    /// Maximum queued commands; `None` is unbounded.
    pub max_queued_commands: Option<usize>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            serial_port: "/dev/ttyS0".to_string(),
            baud_rate: 115_200,
            read_timeout: Duration::from_millis(250),
            tick_interval: Duration::from_millis(100),
            poll_interval: Duration::from_millis(100),
            health_timeout: Duration::from_secs(30),
            power_pulse: Duration::from_secs(4),
            settle_delay: Duration::from_secs(5),
            power_gpio: 4,
            request_timeout: None,
            data_read_timeout: None,
            max_queued_commands: None,
        }
    }
}
