// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Hardware ring buffer: playback mode, point delay and one-shot trigger.

use tracing::debug;

use crate::choice::Choice;
use crate::error::{DeviceResult, ProtocolError};
use crate::protocol::{AxisLetter, CardAddress, Command, Operand, ProtocolEngine};

const RING_VERB: &str = "RM";
const DELAY_VERB: &str = "RT";
const LOAD_VERB: &str = "LD";

/// Added to the mode code while playback is running.
pub const RUNNING_FLAG: i64 = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingBufferMode {
    OnePoint,
    PlayOnce,
    PlayRepeat,
}

impl Choice for RingBufferMode {
    const ALL: &'static [Self] = &[Self::OnePoint, Self::PlayOnce, Self::PlayRepeat];

    fn label(self) -> &'static str {
        match self {
            Self::OnePoint => "1 - One Point",
            Self::PlayOnce => "2 - Play Once",
            Self::PlayRepeat => "3 - Repeat",
        }
    }

    fn code(self) -> i64 {
        match self {
            Self::OnePoint => 1,
            Self::PlayOnce => 2,
            Self::PlayRepeat => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerState {
    #[default]
    Idle,
    Triggering,
    Done,
}

impl Choice for TriggerState {
    const ALL: &'static [Self] = &[Self::Idle, Self::Triggering, Self::Done];

    fn label(self) -> &'static str {
        match self {
            Self::Idle => "0 - Idle",
            Self::Triggering => "1 - Do it",
            Self::Done => "2 - Done",
        }
    }

    fn code(self) -> i64 {
        match self {
            Self::Idle => 0,
            Self::Triggering => 1,
            Self::Done => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerEvent {
    Fire,
    Sent,
    Failed,
    Observed,
}

/// Decoded `RM X?` answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingBufferStatus {
    pub mode: RingBufferMode,
    pub running: bool,
}

impl RingBufferStatus {
    pub fn decode(code: i64) -> Option<Self> {
        let running = code >= RUNNING_FLAG;
        let mode = RingBufferMode::from_code(if running { code - RUNNING_FLAG } else { code })?;
        Some(Self { mode, running })
    }
}

#[derive(Debug, Clone)]
pub struct RingBuffer {
    address: CardAddress,
    trigger: TriggerState,
}

impl RingBuffer {
    pub fn new(address: CardAddress) -> Self {
        Self {
            address,
            trigger: TriggerState::Idle,
        }
    }

    pub fn trigger_state(&self) -> TriggerState {
        self.trigger
    }

    pub fn process_event(&mut self, event: TriggerEvent) -> bool {
        let next = match (self.trigger, event) {
            (TriggerState::Idle, TriggerEvent::Fire) => TriggerState::Triggering,
            (TriggerState::Done, TriggerEvent::Fire) => TriggerState::Triggering,
            (TriggerState::Triggering, TriggerEvent::Sent) => TriggerState::Done,
            (TriggerState::Triggering, TriggerEvent::Failed) => TriggerState::Idle,
            (TriggerState::Done, TriggerEvent::Observed) => TriggerState::Idle,
            (state, _) => state,
        };
        if next == self.trigger {
            return false;
        }
        debug!("ring buffer trigger {:?} -> {:?}", self.trigger, next);
        self.trigger = next;
        true
    }

    /// Fire the one-shot trigger (`<addr>RM`).
    ///
    /// If playback is already running the same command stops it.
    pub fn fire(&mut self, engine: &mut ProtocolEngine) -> DeviceResult<TriggerState> {
        self.process_event(TriggerEvent::Fire);
        match engine.command(&Command::card(self.address, RING_VERB)) {
            Ok(()) => {
                self.process_event(TriggerEvent::Sent);
                Ok(self.trigger)
            }
            Err(e) => {
                self.process_event(TriggerEvent::Failed);
                Err(e)
            }
        }
    }

    /// Report the trigger for a host read; a completed fire reads as idle.
    pub fn observe(&mut self) -> TriggerState {
        self.process_event(TriggerEvent::Observed);
        self.trigger
    }

    pub fn status(&self, engine: &mut ProtocolEngine) -> DeviceResult<RingBufferStatus> {
        let cmd = Command::card(self.address, RING_VERB).query(AxisLetter::X);
        let code: i64 = engine.query_value(&cmd, ":A X=")?;
        RingBufferStatus::decode(code).ok_or_else(|| {
            ProtocolError::MalformedAnswer {
                answer: code.to_string(),
                reason: "unknown ring buffer mode".to_string(),
            }
            .into()
        })
    }

    pub fn set_mode(&self, engine: &mut ProtocolEngine, mode: RingBufferMode) -> DeviceResult<()> {
        let cmd = Command::card(self.address, RING_VERB).set(AxisLetter::X, mode.code());
        engine.command(&cmd)
    }

    pub fn delay(&self, engine: &mut ProtocolEngine) -> DeviceResult<i64> {
        let cmd = Command::card(self.address, DELAY_VERB).query(AxisLetter::Z);
        engine.query_value(&cmd, ":A Z=")
    }

    pub fn set_delay(&self, engine: &mut ProtocolEngine, ms: i64) -> DeviceResult<()> {
        let cmd = Command::card(self.address, DELAY_VERB).set(AxisLetter::Z, ms);
        engine.command(&cmd)
    }

    /// Empty the hardware buffer (`<addr>RM X=0`).
    pub fn clear(&self, engine: &mut ProtocolEngine) -> DeviceResult<()> {
        let cmd = Command::card(self.address, RING_VERB).set(AxisLetter::X, 0);
        engine.command(&cmd)
    }

    /// Append one point, already in native units.
    pub fn load_point(
        &self,
        engine: &mut ProtocolEngine,
        (ax, x): (AxisLetter, f64),
        (ay, y): (AxisLetter, f64),
    ) -> DeviceResult<()> {
        let cmd = Command::new(LOAD_VERB)
            .set(ax, Operand::Float(x))
            .set(ay, Operand::Float(y));
        engine.command(&cmd)
    }
}
