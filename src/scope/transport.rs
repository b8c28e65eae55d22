use std::collections::VecDeque;
use std::io::{Read, Write};
use std::time::{Duration, Instant};

use serialport::{FlowControl, SerialPort};

use crate::scope::error::ScopeError;

/// Fixed line rate of the TDS 3034 RS-232 option.
pub const BAUD_RATE: u32 = 38_400;
/// A 10k-point ASCII curve takes a while at 38400 baud, so the ceiling is generous.
pub const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Line-oriented query/response transport to the instrument.
///
/// All protocol components talk to the scope exclusively through this trait;
/// nothing else touches the serial port.
pub trait CommandChannel {
    /// Writes one command terminated by a newline.
    fn send(&mut self, command: &str) -> Result<(), ScopeError>;
    /// Sends a command and reads exactly one response line, terminator stripped.
    fn query(&mut self, command: &str) -> Result<String, ScopeError>;
}

/// Serial-backed channel. The port is closed when the channel is dropped,
/// which covers every exit path of the session.
pub struct SerialChannel {
    port: Box<dyn SerialPort>,
    pending: Vec<u8>,
    timeout: Duration,
}

impl SerialChannel {
    /// Validates that `port_name` is among the enumerated ports, then opens it
    /// with the instrument's fixed settings (38400 baud, RTS/CTS, 30 s timeout).
    pub fn open(port_name: &str) -> Result<Self, ScopeError> {
        let available: Vec<String> = serialport::available_ports()
            .map(|ports| ports.into_iter().map(|p| p.port_name).collect())
            .unwrap_or_default();
        if !available.iter().any(|p| p == port_name) {
            return Err(ScopeError::PortNotFound {
                port: port_name.to_string(),
                available,
            });
        }
        let port = serialport::new(port_name, BAUD_RATE)
            .flow_control(FlowControl::Hardware)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|source| ScopeError::ConnectionFailed {
                port: port_name.to_string(),
                source,
            })?;
        Ok(Self {
            port,
            pending: Vec::new(),
            timeout: READ_TIMEOUT,
        })
    }

    fn read_line(&mut self, command: &str) -> Result<String, ScopeError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            if let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
                let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
                line.pop(); // the newline itself
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                return Ok(String::from_utf8_lossy(&line).into_owned());
            }
            if Instant::now() >= deadline {
                return Err(ScopeError::Timeout {
                    command: command.to_string(),
                    timeout: self.timeout,
                });
            }
            let mut chunk = [0u8; 4096];
            match self.port.read(&mut chunk) {
                Ok(n) if n > 0 => self.pending.extend_from_slice(&chunk[..n]),
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                    return Err(ScopeError::Timeout {
                        command: command.to_string(),
                        timeout: self.timeout,
                    });
                }
                Err(source) => {
                    return Err(ScopeError::Transport {
                        command: command.to_string(),
                        source,
                    });
                }
            }
        }
    }
}

impl CommandChannel for SerialChannel {
    fn send(&mut self, command: &str) -> Result<(), ScopeError> {
        let mut framed = Vec::with_capacity(command.len() + 1);
        framed.extend_from_slice(command.as_bytes());
        framed.push(b'\n');
        self.port
            .write_all(&framed)
            .map_err(|source| ScopeError::Transport {
                command: command.to_string(),
                source,
            })
    }

    fn query(&mut self, command: &str) -> Result<String, ScopeError> {
        self.send(command)?;
        self.read_line(command)
    }
}

/// In-memory channel useful for tests and deterministic playback.
///
/// The script is a list of (expected query, canned response) pairs consumed
/// in order; plain `send`s are only recorded.
pub struct ScriptedChannel {
    sent: Vec<String>,
    script: VecDeque<(String, String)>,
}

impl ScriptedChannel {
    pub fn new<'a>(script: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            sent: Vec::new(),
            script: script
                .into_iter()
                .map(|(q, r)| (q.to_string(), r.to_string()))
                .collect(),
        }
    }

    /// Every command written so far, queries included, in wire order.
    pub fn sent(&self) -> &[String] {
        &self.sent
    }
}

impl CommandChannel for ScriptedChannel {
    fn send(&mut self, command: &str) -> Result<(), ScopeError> {
        self.sent.push(command.to_string());
        Ok(())
    }

    fn query(&mut self, command: &str) -> Result<String, ScopeError> {
        self.sent.push(command.to_string());
        match self.script.pop_front() {
            Some((expected, response)) if expected == command => Ok(response),
            Some((expected, _)) => Err(ScopeError::Transport {
                command: command.to_string(),
                source: std::io::Error::other(format!(
                    "unscripted query; script expected {expected:?}"
                )),
            }),
            None => Err(ScopeError::Transport {
                command: command.to_string(),
                source: std::io::Error::other("script exhausted"),
            }),
        }
    }
}
