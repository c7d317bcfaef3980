//! Session driver for SIM868-class cellular/GNSS modems spoken to over a
//! serial AT command link.
//!
//! A [`Modem`] owns one background session loop that multiplexes solicited
//! replies, unsolicited GNSS reports and the HTTP read sub-protocol over the
//! single half-duplex serial channel, and power-cycles the module when it
//! stops answering.

pub mod config;
pub mod error;
pub mod gnss;
pub mod modem;
pub mod power;
pub mod sim;
pub mod transport;

pub use config::SessionConfig;
pub use error::{ModemError, ModemResult};
pub use gnss::GpsFix;
pub use modem::{HttpMethod, HttpResult, Modem, NetworkConfig};
pub use power::{PowerControl, SysfsGpioPower};
pub use transport::{LineTransport, SerialTransport};
