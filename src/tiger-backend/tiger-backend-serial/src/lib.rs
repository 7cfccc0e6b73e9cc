// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Serial transport for a Tiger controller hub.

use std::io::{ErrorKind, Read, Write};
use std::thread;
use std::time::{Duration, Instant};

use serialport::{ClearBuffer, SerialPort};
use tracing::{debug, trace};

use tiger_core::error::TransportError;
use tiger_core::transport::{Transport, COMMAND_TERMINATOR};

/// Answers end with "\r\n"; multi-line answers separate lines with '\r'.
const ANSWER_END: u8 = b'\n';

pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    path: String,
    baud: u32,
    timeout: Duration,
}

impl SerialTransport {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

    pub fn new(path: &str, baud: u32, timeout: Duration) -> Result<Self, TransportError> {
        let port = serialport::new(path, baud)
            .timeout(timeout)
            .open()
            .map_err(|e| TransportError::Io(e.into()))?;
        debug!("opened {} at {} baud", path, baud);
        Ok(Self {
            port,
            path: path.to_string(),
            baud,
            timeout,
        })
    }

    fn write_cmd(&mut self, command: &str) -> Result<(), TransportError> {
        // drop stale bytes left by an earlier timed-out exchange
        let _ = self.port.clear(ClearBuffer::Input);
        self.port.write_all(command.as_bytes())?;
        self.port.write_all(COMMAND_TERMINATOR.as_bytes())?;
        self.port.flush()?;
        Ok(())
    }

    fn read_answer(&mut self, command: &str) -> Result<String, TransportError> {
        let deadline = Instant::now() + self.timeout;
        let mut buf = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            if Instant::now() >= deadline {
                return Err(if buf.is_empty() {
                    TransportError::NoResponse(command.to_string())
                } else {
                    TransportError::Timeout(command.to_string())
                });
            }
            match self.port.read(&mut byte) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(_) if byte[0] == ANSWER_END => break,
                Ok(_) => buf.push(byte[0]),
                Err(e) if e.kind() == ErrorKind::TimedOut => continue,
                Err(e) => return Err(e.into()),
            }
        }
        let answer = String::from_utf8(buf)
            .map_err(|_| TransportError::Framing(format!("non-ASCII answer to '{}'", command)))?;
        let answer = answer.trim_end_matches('\r').to_string();
        trace!("{} -> {}", command, answer);
        Ok(answer)
    }
}

impl Transport for SerialTransport {
    fn send(&mut self, command: &str) -> Result<String, TransportError> {
        self.write_cmd(command)?;
        self.read_answer(command)
    }

    fn send_settled(&mut self, command: &str, delay: Duration) -> Result<String, TransportError> {
        self.write_cmd(command)?;
        thread::sleep(delay);
        self.read_answer(command)
    }

    fn describe(&self) -> String {
        format!("serial {} @ {}", self.path, self.baud)
    }
}
