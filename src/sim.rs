//! In-process SIM868 stand-in for tests and `--simulate` runs.
//!
//! [`SimHandle`] owns the simulated module's state; [`SimulatedModem`] and
//! [`SimPower`] are the transport and power-line views handed to a session.
//! The simulator answers the command subset the session uses, echoes
//! commands like a module with `ATE1`, and counts every command written
//! while a previous one was still unanswered.

use crate::power::PowerControl;
use crate::transport::LineTransport;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

const DEFAULT_IDENTITY: &str = "861234567890123";
const DEFAULT_BODY: &str = "hello from sim868";
const SAMPLE_FIX: &str = "1,1,20240101120000.000,45.000000,-93.000000,300.0,0.0,0.0,1,,1.0,1.5,2.0,,8,6,0,40.0,5.0,8.0";

struct SimState {
    echo: bool,
    identity: String,
    output: VecDeque<String>,
    written: Vec<String>,
    awaiting_ack: bool,
    violations: usize,
    hang_on: Option<String>,
    hung: bool,
    open: bool,
    fail_reopen: bool,
    power_cycles: usize,
    http_active: bool,
    url: String,
    responses: HashMap<String, (u16, String)>,
    body: Option<String>,
    gnss_on: bool,
    report_every: Option<Duration>,
    last_report: Instant,
}

impl SimState {
    fn new() -> Self {
        Self {
            echo: true,
            identity: DEFAULT_IDENTITY.to_string(),
            output: VecDeque::new(),
            written: Vec::new(),
            awaiting_ack: false,
            violations: 0,
            hang_on: None,
            hung: false,
            open: true,
            fail_reopen: false,
            power_cycles: 0,
            http_active: false,
            url: String::new(),
            responses: HashMap::new(),
            body: None,
            gnss_on: false,
            report_every: None,
            last_report: Instant::now(),
        }
    }

    fn accept(&mut self, command: String) {
        self.written.push(command.clone());
        if self.hung {
            return;
        }
        if self.awaiting_ack {
            self.violations += 1;
        }
        if let Some(prefix) = &self.hang_on
            && command.starts_with(prefix.as_str())
        {
            self.hang_on = None;
            self.hung = true;
            self.awaiting_ack = false;
            return;
        }

        if self.echo {
            self.output.push_back(command.clone());
        }
        self.awaiting_ack = true;
        let replies = self.respond(&command);
        self.output.extend(replies);
    }

    fn respond(&mut self, command: &str) -> Vec<String> {
        let ok = || vec!["OK".to_string()];
        match command {
            "AT+GSN" => vec![
                String::new(),
                self.identity.clone(),
                String::new(),
                "OK".to_string(),
            ],
            "AT+HTTPTERM" => {
                let was_active = std::mem::take(&mut self.http_active);
                if was_active { ok() } else { vec!["ERROR".to_string()] }
            }
            "AT+HTTPINIT" => {
                self.http_active = true;
                ok()
            }
            "AT+HTTPREAD" => match self.body.take() {
                Some(body) => vec![
                    format!("+HTTPREAD: {}", body.len()),
                    body,
                    "OK".to_string(),
                ],
                None => vec!["ERROR".to_string()],
            },
            "AT+CGNSPWR?" => vec![
                format!("+CGNSPWR: {}", u8::from(self.gnss_on)),
                "OK".to_string(),
            ],
            "AT+CGNSPWR=1" => {
                self.gnss_on = true;
                ok()
            }
            "AT+CGNSPWR=0" => {
                self.gnss_on = false;
                ok()
            }
            _ => {
                if let Some(url) = command
                    .strip_prefix("AT+HTTPPARA=\"URL\",\"")
                    .and_then(|rest| rest.strip_suffix('"'))
                {
                    self.url = url.to_string();
                } else if let Some(method) = command.strip_prefix("AT+HTTPACTION=") {
                    let (status, body) = self
                        .responses
                        .get(&self.url)
                        .cloned()
                        .unwrap_or_else(|| (200, DEFAULT_BODY.to_string()));
                    let action = format!("+HTTPACTION: {method},{status},{}", body.len());
                    self.body = Some(body);
                    return vec!["OK".to_string(), action];
                }
                ok()
            }
        }
    }

    fn emit_report(&mut self) {
        let Some(every) = self.report_every else {
            return;
        };
        if self.gnss_on && !self.hung && self.last_report.elapsed() >= every {
            self.output.push_back(format!("+UGNSINF: {SAMPLE_FIX}"));
            self.last_report = Instant::now();
        }
    }

    fn power_cycle(&mut self) {
        self.power_cycles += 1;
        self.hung = false;
        self.awaiting_ack = false;
        self.output.clear();
        self.http_active = false;
        self.body = None;
        self.gnss_on = false;
    }
}

/// Inspector and control surface for a simulated modem.
#[derive(Clone)]
pub struct SimHandle {
    state: Arc<Mutex<SimState>>,
}

impl Default for SimHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl SimHandle {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState::new())),
        }
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn transport(&self) -> SimulatedModem {
        SimulatedModem {
            state: Arc::clone(&self.state),
        }
    }

    pub fn power(&self) -> SimPower {
        SimPower {
            state: Arc::clone(&self.state),
        }
    }

    pub fn set_echo(&self, echo: bool) {
        self.state().echo = echo;
    }

    pub fn identity(&self) -> String {
        self.state().identity.clone()
    }

    /// Serve `status`/`body` for `AT+HTTPACTION` issued against `url`.
    pub fn respond(&self, url: &str, status: u16, body: &str) {
        self.state()
            .responses
            .insert(url.to_string(), (status, body.to_string()));
    }

    /// Stop answering once a command starting with `prefix` arrives, until
    /// the next power pulse.
    pub fn hang_on(&self, prefix: &str) {
        self.state().hang_on = Some(prefix.to_string());
    }

    /// Emit a positioning report every `every` while GNSS is powered.
    pub fn report_gnss_every(&self, every: Duration) {
        self.state().report_every = Some(every);
    }

    /// Queue an unsolicited line.
    pub fn inject(&self, line: &str) {
        self.state().output.push_back(line.to_string());
    }

    pub fn fail_reopen(&self, fail: bool) {
        self.state().fail_reopen = fail;
    }

    pub fn written(&self) -> Vec<String> {
        self.state().written.clone()
    }

    pub fn count_written(&self, prefix: &str) -> usize {
        self.state()
            .written
            .iter()
            .filter(|command| command.starts_with(prefix))
            .count()
    }

    /// Commands written while the previous one was still unanswered.
    pub fn violations(&self) -> usize {
        self.state().violations
    }

    pub fn power_cycles(&self) -> usize {
        self.state().power_cycles
    }

    pub fn is_open(&self) -> bool {
        self.state().open
    }
}

/// Transport end of a [`SimHandle`].
pub struct SimulatedModem {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedModem {
    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "simulated port is closed")
}

impl LineTransport for SimulatedModem {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut state = self.state();
        if !state.open {
            return Err(closed());
        }
        let text = String::from_utf8_lossy(bytes);
        for command in text.split(['\r', '\n']).filter(|part| !part.is_empty()) {
            state.accept(command.to_string());
        }
        Ok(())
    }

    fn has_input(&mut self) -> io::Result<bool> {
        let mut state = self.state();
        if !state.open {
            return Err(closed());
        }
        state.emit_report();
        Ok(!state.output.is_empty())
    }

    fn read_line(&mut self) -> io::Result<String> {
        let mut state = self.state();
        let line = state
            .output
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::TimedOut, "no simulated output"))?;
        if line.contains("OK") || line.contains("ERROR") {
            state.awaiting_ack = false;
        }
        Ok(format!("{line}\r\n"))
    }

    fn close(&mut self) {
        self.state().open = false;
    }

    fn reopen(&mut self, _port: &str, _baud_rate: u32) -> io::Result<()> {
        let mut state = self.state();
        if state.fail_reopen {
            return Err(io::Error::new(io::ErrorKind::NotFound, "simulated port vanished"));
        }
        state.open = true;
        Ok(())
    }
}

/// Power-line end of a [`SimHandle`]; a pulse restarts the simulated module.
pub struct SimPower {
    state: Arc<Mutex<SimState>>,
}

impl PowerControl for SimPower {
    fn assert_low(&mut self, hold: Duration) -> io::Result<()> {
        thread::sleep(hold);
        Ok(())
    }

    fn release(&mut self) -> io::Result<()> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .power_cycle();
        Ok(())
    }
}
