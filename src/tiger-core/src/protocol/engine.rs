// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Query/verify/parse chokepoint.
//!
//! Every exchange with a card goes through [`ProtocolEngine`]. Commands are
//! sent in the order they are issued, one at a time, with no retries. The
//! most recent answer is kept in a single slot so that multi-step parsing
//! can inspect it without another round trip.

use std::time::Duration;

use tracing::trace;

use crate::error::DeviceResult;
use crate::protocol::answer::{AnswerValue, RawAnswer, ACK, STATUS_COLUMN};
use crate::protocol::command::{CardAddress, Command};
use crate::transport::Bus;

/// Protocol engine for one card on a bus.
#[derive(Debug)]
pub struct ProtocolEngine {
    bus: Bus,
    address: CardAddress,
    last_answer: Option<RawAnswer>,
    exchanges: u64,
}

impl ProtocolEngine {
    pub fn new(bus: Bus, address: CardAddress) -> Self {
        Self {
            bus,
            address,
            last_answer: None,
            exchanges: 0,
        }
    }

    pub fn address(&self) -> CardAddress {
        self.address
    }

    /// Number of commands sent through this engine.
    pub fn exchanges(&self) -> u64 {
        self.exchanges
    }

    /// Most recent answer, if any command has completed.
    pub fn last_answer(&self) -> Option<&RawAnswer> {
        self.last_answer.as_ref()
    }

    /// Send without verifying the answer.
    pub fn query(&mut self, command: &Command) -> DeviceResult<RawAnswer> {
        self.exchange(command, None)
    }

    /// Send, then check that the answer starts with `expected`.
    pub fn query_verify(&mut self, command: &Command, expected: &str) -> DeviceResult<RawAnswer> {
        let answer = self.exchange(command, None)?;
        answer.verify(expected)?;
        Ok(answer)
    }

    /// [`ProtocolEngine::query_verify`] with a settle delay before reading.
    pub fn query_verify_settled(
        &mut self,
        command: &Command,
        expected: &str,
        delay: Duration,
    ) -> DeviceResult<RawAnswer> {
        let answer = self.exchange(command, Some(delay))?;
        answer.verify(expected)?;
        Ok(answer)
    }

    /// Send a write command and require a plain acknowledgement.
    pub fn command(&mut self, command: &Command) -> DeviceResult<()> {
        self.query_verify(command, ACK).map(|_| ())
    }

    /// Query and parse the value after `=`.
    pub fn query_value<T: AnswerValue>(&mut self, command: &Command, expected: &str) -> DeviceResult<T> {
        let answer = self.query_verify(command, expected)?;
        Ok(answer.after_equals()?)
    }

    /// Query and return the status letter at the standard column.
    pub fn query_status(&mut self, command: &Command) -> DeviceResult<char> {
        let answer = self.query_verify(command, ACK)?;
        Ok(answer.char_at(STATUS_COLUMN)?)
    }

    fn exchange(&mut self, command: &Command, delay: Option<Duration>) -> DeviceResult<RawAnswer> {
        let line = command.render();
        trace!(card = %self.address, "-> {}", line);
        let result = match delay {
            Some(delay) => self.bus.send_settled(&line, delay),
            None => self.bus.send(&line),
        };
        self.exchanges += 1;
        let answer = RawAnswer::new(result?);
        trace!(card = %self.address, "<- {}", answer);
        self.last_answer = Some(answer.clone());
        Ok(answer)
    }
}
