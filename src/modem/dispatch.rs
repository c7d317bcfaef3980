use super::guard;
use super::session::Session;
use crate::gnss::GpsFix;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

pub(crate) const OK_TOKEN: &str = "OK";
pub(crate) const ERROR_TOKEN: &str = "ERROR";
pub(crate) const GNSS_POWER_TAG: &str = "+CGNSPWR";
pub(crate) const GNSS_INFO_TAG: &str = "+UGNSINF";
pub(crate) const HTTP_ACTION_TAG: &str = "+HTTPACTION";
pub(crate) const HTTP_READ_TAG: &str = "+HTTPREAD";
pub(crate) const IDENTITY_QUERY: &str = "AT+GSN";

// What a received line means for the session. Produced by `classify`,
// first matching rule wins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Reply<'a> {
    Ack,
    Failure,
    GnssPower(bool),
    GnssInfo(&'a str),
    HttpAction(&'a str),
    HttpRead,
    Identity(&'a str),
    Unhandled,
}

// Rule order matters: `OK`/`ERROR` are substring matches and take
// precedence over every tagged line.
pub(crate) fn classify<'a>(line: &'a str, last_command: &str, identity_known: bool) -> Reply<'a> {
    if line.contains(OK_TOKEN) {
        Reply::Ack
    } else if line.contains(ERROR_TOKEN) {
        Reply::Failure
    } else if line.contains(GNSS_POWER_TAG) && !line.contains("AT") {
        let powered = line
            .split_once(':')
            .is_some_and(|(_, state)| state.contains('1'));
        Reply::GnssPower(powered)
    } else if let Some(rest) = line.strip_prefix(GNSS_INFO_TAG) {
        Reply::GnssInfo(tag_payload(rest))
    } else if let Some(rest) = line.strip_prefix(HTTP_ACTION_TAG) {
        Reply::HttpAction(tag_payload(rest))
    } else if line.starts_with(HTTP_READ_TAG) {
        Reply::HttpRead
    } else if last_command == IDENTITY_QUERY && !identity_known && line.trim() != IDENTITY_QUERY {
        Reply::Identity(line.trim())
    } else {
        Reply::Unhandled
    }
}

fn tag_payload(rest: &str) -> &str {
    rest.strip_prefix(':').unwrap_or(rest).trim()
}

impl Session {
    // Handle every line the transport has buffered, in arrival order.
    pub(crate) fn drain_input(&mut self) {
        loop {
            match self.transport.has_input() {
                Ok(true) => {}
                Ok(false) => return,
                Err(err) => {
                    warn!(error = %err, "polling modem input failed");
                    return;
                }
            }
            match self.transport.read_line() {
                Ok(raw) => self.dispatch_line(&raw),
                Err(err) => {
                    warn!(error = %err, "reading modem line failed");
                    return;
                }
            }
        }
    }

    pub(crate) fn dispatch_line(&mut self, raw: &str) {
        let line = raw.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            trace!("skipping blank line");
            return;
        }
        debug!(line, "received");

        let identity_known = guard(&self.shared.identity).is_some();
        match classify(line, &self.last_command, identity_known) {
            Reply::Ack => {
                self.outstanding = None;
                self.last_health = Instant::now();
            }
            Reply::Failure => {
                if let Some(exchange) = self.outstanding.take() {
                    debug!(command = %exchange.command, "modem rejected command");
                }
            }
            Reply::GnssPower(powered) => {
                self.shared.gnss_powered.store(powered, Ordering::SeqCst);
                self.outstanding = None;
                info!(powered, "GNSS power state changed");
            }
            Reply::GnssInfo(payload) => match GpsFix::parse(payload) {
                Ok(fix) => *guard(&self.shared.fix) = fix,
                Err(err) => warn!(error = %err, "keeping previous fix"),
            },
            Reply::HttpAction(payload) => {
                self.outstanding = None;
                self.on_http_action(payload);
            }
            Reply::HttpRead => {
                let data = self.read_data_line();
                self.on_http_data(data);
            }
            Reply::Identity(identity) => {
                info!(identity, "modem identity received");
                *guard(&self.shared.identity) = Some(identity.to_string());
                self.outstanding = None;
            }
            Reply::Unhandled => debug!(line, "discarding line"),
        }
    }

    // Block the loop until the single payload line after `+HTTPREAD` arrives.
    fn read_data_line(&mut self) -> Option<String> {
        let started = Instant::now();
        loop {
            match self.transport.has_input() {
                Ok(true) => {
                    return match self.transport.read_line() {
                        Ok(raw) => Some(raw.trim_end_matches(['\r', '\n']).to_string()),
                        Err(err) => {
                            warn!(error = %err, "reading HTTP data line failed");
                            None
                        }
                    };
                }
                Ok(false) => {}
                Err(err) => {
                    warn!(error = %err, "polling for HTTP data failed");
                    return None;
                }
            }

            if !self.shared.running.load(Ordering::SeqCst) {
                return None;
            }
            if let Some(limit) = self.shared.config.data_read_timeout
                && started.elapsed() >= limit
            {
                warn!(waited_ms = limit.as_millis() as u64, "HTTP data line never arrived");
                return None;
            }
            thread::sleep(self.shared.config.poll_interval);
        }
    }
}
