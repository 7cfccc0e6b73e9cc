// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! SPIM acquisition sequencer.
//!
//! Every transition starts by reading the sequencer's own status letter.
//! The actions to take are a pure function of that status and the target
//! state, which keeps the guards testable without a controller.

use tracing::debug;

use crate::choice::Choice;
use crate::error::DeviceResult;
use crate::protocol::{AxisLetter, CardAddress, Command, ProtocolEngine, ACK};

const SPIM_VERB: &str = "SN";

const CODE_IDLE: char = 'I';
const CODE_STOP: char = 'P';
const CODE_ARM: char = 'a';
const CODE_ARMED: char = 'A';

/// State requested by or reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpimState {
    #[default]
    Idle,
    Armed,
    Running,
}

impl Choice for SpimState {
    const ALL: &'static [Self] = &[Self::Idle, Self::Armed, Self::Running];

    fn label(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Armed => "Armed",
            Self::Running => "Running",
        }
    }

    fn code(self) -> i64 {
        match self {
            Self::Idle => 0,
            Self::Armed => 1,
            Self::Running => 2,
        }
    }
}

/// Which light-sheet side a SPIM sequence begins on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpimSide {
    #[default]
    A,
    B,
}

impl Choice for SpimSide {
    const ALL: &'static [Self] = &[Self::A, Self::B];

    fn label(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
        }
    }

    fn code(self) -> i64 {
        match self {
            Self::A => 0,
            Self::B => 1,
        }
    }
}

/// Pack side count and first side into the `NR Z` code.
///
/// Side A first is the plain count; side B first maps 1 to 0 and 2 to 3.
pub fn encode_sides(sides: i64, first: SpimSide) -> i64 {
    match (first, sides) {
        (SpimSide::B, 1) => 0,
        (SpimSide::B, 2) => 3,
        (_, n) => n,
    }
}

/// Inverse of [`encode_sides`].
pub fn decode_sides(code: i64) -> (i64, SpimSide) {
    match code {
        0 => (1, SpimSide::B),
        3 => (2, SpimSide::B),
        n => (n, SpimSide::A),
    }
}

/// Status letter reported by `SN X?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpimStatus {
    Idle,
    Arming,
    Armed,
    /// One of several letters used while a sequence runs.
    Running(char),
}

impl SpimStatus {
    pub fn from_code(c: char) -> Self {
        match c {
            CODE_IDLE => SpimStatus::Idle,
            CODE_ARM => SpimStatus::Arming,
            CODE_ARMED => SpimStatus::Armed,
            other => SpimStatus::Running(other),
        }
    }

    pub fn state(self) -> SpimState {
        match self {
            SpimStatus::Idle => SpimState::Idle,
            SpimStatus::Arming | SpimStatus::Armed => SpimState::Armed,
            SpimStatus::Running(_) => SpimState::Running,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpimAction {
    Stop,
    Arm,
    Start,
}

impl SpimAction {
    fn command(self, address: CardAddress) -> Command {
        let cmd = Command::card(address, SPIM_VERB);
        match self {
            SpimAction::Stop => cmd.set(AxisLetter::X, CODE_STOP as i64),
            SpimAction::Arm => cmd.set(AxisLetter::X, CODE_ARM as i64),
            SpimAction::Start => cmd,
        }
    }
}

/// Commands needed to move from `status` to `target`.
///
/// A stop is never sent to an idle sequencer on its way to idle, and a start
/// is only sent from idle or armed.
pub fn plan(status: SpimStatus, target: SpimState) -> Vec<SpimAction> {
    match (target, status) {
        (SpimState::Idle, SpimStatus::Idle) => vec![],
        (SpimState::Idle, _) => vec![SpimAction::Stop],
        (SpimState::Armed, SpimStatus::Idle) => vec![SpimAction::Stop, SpimAction::Arm],
        (SpimState::Armed, _) => vec![SpimAction::Arm],
        (SpimState::Running, SpimStatus::Idle | SpimStatus::Armed) => vec![SpimAction::Start],
        (SpimState::Running, _) => vec![],
    }
}

#[derive(Debug, Clone)]
pub struct SpimSequencer {
    address: CardAddress,
    last: SpimState,
}

impl SpimSequencer {
    pub fn new(address: CardAddress) -> Self {
        Self {
            address,
            last: SpimState::Idle,
        }
    }

    /// State seen on the last query or transition.
    pub fn last_state(&self) -> SpimState {
        self.last
    }

    pub fn status(&mut self, engine: &mut ProtocolEngine) -> DeviceResult<SpimStatus> {
        let cmd = Command::card(self.address, SPIM_VERB).query(AxisLetter::X);
        let status = SpimStatus::from_code(engine.query_status(&cmd)?);
        self.last = status.state();
        Ok(status)
    }

    /// Drive the sequencer towards `target`.
    pub fn transition(&mut self, engine: &mut ProtocolEngine, target: SpimState) -> DeviceResult<SpimState> {
        let status = self.status(engine)?;
        let actions = plan(status, target);
        debug!("SPIM {:?} -> {:?}: {:?}", status, target, actions);
        if actions.is_empty() {
            return Ok(self.last);
        }
        for action in actions {
            engine.query_verify(&action.command(self.address), ACK)?;
        }
        self.last = target;
        Ok(self.last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;

    fn setup() -> (ScriptedTransport, ProtocolEngine, SpimSequencer) {
        let script = ScriptedTransport::new();
        let addr = CardAddress::new('3').unwrap();
        let engine = ProtocolEngine::new(script.bus(), addr);
        (script, engine, SpimSequencer::new(addr))
    }

    #[test]
    fn test_side_code_table() {
        assert_eq!(encode_sides(1, SpimSide::A), 1);
        assert_eq!(encode_sides(2, SpimSide::A), 2);
        assert_eq!(encode_sides(1, SpimSide::B), 0);
        assert_eq!(encode_sides(2, SpimSide::B), 3);
        for code in 0..4 {
            let (sides, first) = decode_sides(code);
            assert_eq!(encode_sides(sides, first), code);
        }
    }

    #[test]
    fn test_plan_guards() {
        assert!(plan(SpimStatus::Idle, SpimState::Idle).is_empty());
        assert_eq!(plan(SpimStatus::Running('S'), SpimState::Idle), vec![SpimAction::Stop]);
        assert_eq!(plan(SpimStatus::Armed, SpimState::Armed), vec![SpimAction::Arm]);
        assert_eq!(plan(SpimStatus::Armed, SpimState::Running), vec![SpimAction::Start]);
        assert!(plan(SpimStatus::Running('D'), SpimState::Running).is_empty());
        assert!(plan(SpimStatus::Arming, SpimState::Running).is_empty());
    }

    #[test]
    fn test_idle_to_armed_sends_stop_then_arm() {
        let (script, mut engine, mut spim) = setup();
        script.reply(":A I").reply(":A").reply(":A");

        let state = spim.transition(&mut engine, SpimState::Armed).unwrap();

        assert_eq!(state, SpimState::Armed);
        let sent = script.sent();
        assert_eq!(sent[0], "3SN X?");
        assert_eq!(sent[1..].to_vec(), vec!["3SN X=80", "3SN X=97"]);
    }

    #[test]
    fn test_stop_not_sent_when_idle() {
        let (script, mut engine, mut spim) = setup();
        script.reply(":A I");
        spim.transition(&mut engine, SpimState::Idle).unwrap();
        assert_eq!(script.sent(), vec!["3SN X?"]);
    }

    #[test]
    fn test_start_from_armed() {
        let (script, mut engine, mut spim) = setup();
        script.reply(":A A").reply(":A");
        let state = spim.transition(&mut engine, SpimState::Running).unwrap();
        assert_eq!(state, SpimState::Running);
        assert_eq!(script.sent(), vec!["3SN X?", "3SN"]);
    }

    #[test]
    fn test_running_status_letters() {
        let (script, mut engine, mut spim) = setup();
        script.reply(":A D");
        assert_eq!(spim.status(&mut engine).unwrap(), SpimStatus::Running('D'));
        assert_eq!(spim.last_state(), SpimState::Running);
    }

    #[test]
    fn test_short_status_answer_is_error() {
        let (script, mut engine, mut spim) = setup();
        script.reply(":A");
        assert!(spim.transition(&mut engine, SpimState::Running).is_err());
        assert_eq!(script.sent_count(), 1);
    }
}
