use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::time::Duration;

// Line-oriented duplex channel to the modem. Lines are newline-terminated;
// callers strip the trailing CR/LF themselves.
pub trait LineTransport: Send {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;

    // True when `read_line` can make progress without waiting for the peer.
    fn has_input(&mut self) -> io::Result<bool>;

    fn read_line(&mut self) -> io::Result<String>;

    fn close(&mut self);

    fn reopen(&mut self, port: &str, baud_rate: u32) -> io::Result<()>;
}

// Serial port transport with its own line assembly buffer.
pub struct SerialTransport {
    port: Option<Box<dyn SerialPort>>,
    read_timeout: Duration,
    pending: Vec<u8>,
}

impl SerialTransport {
    pub fn open(path: &str, baud_rate: u32, read_timeout: Duration) -> io::Result<Self> {
        let port = open_port(path, baud_rate, read_timeout)?;
        Ok(Self {
            port: Some(port),
            read_timeout,
            pending: Vec::with_capacity(256),
        })
    }

    fn port(&mut self) -> io::Result<&mut Box<dyn SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "serial port is closed"))
    }

    fn take_line(&mut self) -> Option<String> {
        let end = self.pending.iter().position(|&byte| byte == b'\n')?;
        let line: Vec<u8> = self.pending.drain(..=end).collect();
        Some(String::from_utf8_lossy(&line).into_owned())
    }
}

impl LineTransport for SerialTransport {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        let port = self.port()?;
        port.write_all(bytes)?;
        port.flush()
    }

    fn has_input(&mut self) -> io::Result<bool> {
        if self.pending.contains(&b'\n') {
            return Ok(true);
        }
        let waiting = self.port()?.bytes_to_read().map_err(io::Error::from)?;
        Ok(waiting > 0)
    }

    fn read_line(&mut self) -> io::Result<String> {
        let mut chunk = [0_u8; 256];
        loop {
            if let Some(line) = self.take_line() {
                return Ok(line);
            }

            let result = self.port()?.read(&mut chunk);
            match result {
                Ok(0) => {}
                Ok(size) => self.pending.extend_from_slice(&chunk[..size]),
                Err(err) if err.kind() == io::ErrorKind::TimedOut => {
                    if self.pending.is_empty() {
                        return Err(err);
                    }
                    // Hand back an unterminated tail rather than stall on it.
                    let line = String::from_utf8_lossy(&self.pending).into_owned();
                    self.pending.clear();
                    return Ok(line);
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn close(&mut self) {
        self.port = None;
        self.pending.clear();
    }

    fn reopen(&mut self, port: &str, baud_rate: u32) -> io::Result<()> {
        self.close();
        self.port = Some(open_port(port, baud_rate, self.read_timeout)?);
        Ok(())
    }
}

fn open_port(path: &str, baud_rate: u32, read_timeout: Duration) -> io::Result<Box<dyn SerialPort>> {
    serialport::new(path, baud_rate)
        .timeout(read_timeout)
        .open()
        .map_err(io::Error::from)
}
