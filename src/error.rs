use std::io;
use std::time::Duration;

// Every failure the session can report. Most protocol anomalies never leave
// the session loop; they are logged with these variants and absorbed.
#[derive(thiserror::Error, Debug)]
pub enum ModemError {
    /// A `+UGNSINF` payload had too few fields or a non-numeric value.
    #[error("malformed GNSS fix data: {0}")]
    MalformedFixData(String),

    /// A tagged reply line could not be parsed.
    #[error("malformed modem reply: {0}")]
    MalformedReply(String),

    /// An exchange stayed unanswered past the health threshold.
    #[error("no reply from modem for {waited:?} while an exchange was outstanding")]
    ExchangeTimeout { waited: Duration },

    /// The serial link could not be written, closed or reopened.
    #[error("transport fault while {context}: {source}")]
    TransportFault {
        context: &'static str,
        #[source]
        source: io::Error,
    },

    /// The power-control line could not be driven.
    #[error("power control failed: {0}")]
    PowerControl(#[source] io::Error),

    #[error("network is not configured; set the APN first")]
    NetworkNotConfigured,

    #[error("network configuration cannot change while the bearer is active")]
    NetworkActive,

    #[error("command queue is full ({0} pending)")]
    QueueFull(usize),

    /// A caller-side wait exceeded its configured bound.
    #[error("timed out after {waited:?} waiting for {what}")]
    WaitTimeout { waited: Duration, what: &'static str },

    #[error("failed to start session worker: {0}")]
    WorkerSpawn(#[source] io::Error),

    #[error("modem session has stopped")]
    SessionClosed,
}

impl ModemError {
    pub(crate) fn transport(context: &'static str, source: io::Error) -> Self {
        Self::TransportFault { context, source }
    }
}

pub type ModemResult<T> = Result<T, ModemError>;
