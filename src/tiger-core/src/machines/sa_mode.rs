// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Single-axis waveform mode of one axis.
//!
//! The controller may end up in a different mode than requested, so every
//! set is followed by a read-back and the machine only ever records what
//! the hardware reports.

use tracing::debug;

use crate::choice::Choice;
use crate::error::{DeviceResult, ProtocolError};
use crate::protocol::{AxisLetter, Command, ProtocolEngine};

pub const SA_MODE_VERB: &str = "SAM";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaMode {
    #[default]
    Disabled,
    Enabled,
    Armed,
    Triggered,
}

impl Choice for SaMode {
    const ALL: &'static [Self] = &[Self::Disabled, Self::Enabled, Self::Armed, Self::Triggered];

    fn label(self) -> &'static str {
        match self {
            Self::Disabled => "0 - Disabled",
            Self::Enabled => "1 - Enabled",
            Self::Armed => "2 - Armed for TTL trigger",
            Self::Triggered => "3 - Enabled with axes synced",
        }
    }

    fn code(self) -> i64 {
        match self {
            Self::Disabled => 0,
            Self::Enabled => 1,
            Self::Armed => 2,
            Self::Triggered => 3,
        }
    }
}

/// Events driving the mode machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaModeEvent {
    /// Hardware reported its current mode.
    Reported(SaMode),
    /// The beam was blanked; firmware stops any waveform.
    BeamOff,
}

#[derive(Debug, Clone, Default)]
pub struct SaModeMachine {
    state: SaMode,
}

impl SaModeMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SaMode {
        self.state
    }

    /// True when the host may command static positions on this axis.
    pub fn allows_motion(&self) -> bool {
        self.state == SaMode::Disabled
    }

    /// Apply an event; returns whether the state changed.
    pub fn process_event(&mut self, event: SaModeEvent) -> bool {
        let next = match event {
            SaModeEvent::Reported(mode) => mode,
            SaModeEvent::BeamOff => SaMode::Disabled,
        };
        if next == self.state {
            return false;
        }
        debug!("SA mode {:?} -> {:?} ({:?})", self.state, next, event);
        self.state = next;
        true
    }

    /// Read the mode from hardware and record it.
    pub fn refresh(&mut self, engine: &mut ProtocolEngine, axis: AxisLetter) -> DeviceResult<SaMode> {
        let cmd = Command::new(SA_MODE_VERB).query(axis);
        let code: i64 = engine.query_value(&cmd, &format!(":A {}=", axis))?;
        let mode = SaMode::from_code(code).ok_or_else(|| ProtocolError::MalformedAnswer {
            answer: code.to_string(),
            reason: "unknown single-axis mode".to_string(),
        })?;
        self.process_event(SaModeEvent::Reported(mode));
        Ok(mode)
    }

    /// Request `mode`, then record what the hardware actually did.
    ///
    /// With the beam off no command is sent and the axis stays disabled.
    pub fn request(
        &mut self,
        engine: &mut ProtocolEngine,
        axis: AxisLetter,
        mode: SaMode,
        beam_on: bool,
    ) -> DeviceResult<SaMode> {
        if !beam_on {
            self.process_event(SaModeEvent::BeamOff);
            return Ok(self.state);
        }
        engine.command(&Command::new(SA_MODE_VERB).set(axis, mode.code()))?;
        self.refresh(engine, axis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::CardAddress;
    use crate::testing::ScriptedTransport;

    fn setup() -> (ScriptedTransport, ProtocolEngine, AxisLetter) {
        let script = ScriptedTransport::new();
        let engine = ProtocolEngine::new(script.bus(), CardAddress::new('3').unwrap());
        (script, engine, AxisLetter::new('X').unwrap())
    }

    #[test]
    fn test_request_records_reported_mode() {
        let (script, mut engine, x) = setup();
        // firmware refused the armed mode and stayed enabled
        script.reply(":A").reply(":A X=1");
        let mut machine = SaModeMachine::new();

        let mode = machine.request(&mut engine, x, SaMode::Armed, true).unwrap();

        assert_eq!(mode, SaMode::Enabled);
        assert_eq!(machine.state(), SaMode::Enabled);
        assert!(!machine.allows_motion());
        assert_eq!(script.sent(), vec!["SAM X=2", "SAM X?"]);
    }

    #[test]
    fn test_beam_off_forces_disabled_without_io() {
        let (script, mut engine, x) = setup();
        let mut machine = SaModeMachine::new();
        machine.process_event(SaModeEvent::Reported(SaMode::Enabled));

        let mode = machine.request(&mut engine, x, SaMode::Enabled, false).unwrap();

        assert_eq!(mode, SaMode::Disabled);
        assert_eq!(script.sent_count(), 0);
    }

    #[test]
    fn test_failed_set_keeps_state() {
        let (script, mut engine, x) = setup();
        script.reply(":N-4");
        let mut machine = SaModeMachine::new();

        assert!(machine.request(&mut engine, x, SaMode::Enabled, true).is_err());
        assert_eq!(machine.state(), SaMode::Disabled);
    }

    #[test]
    fn test_unknown_code_is_malformed() {
        let (script, mut engine, x) = setup();
        script.reply(":A X=7");
        let mut machine = SaModeMachine::new();
        assert!(machine.refresh(&mut engine, x).is_err());
    }

    #[test]
    fn test_process_event_reports_change() {
        let mut machine = SaModeMachine::new();
        assert!(!machine.process_event(SaModeEvent::BeamOff));
        assert!(machine.process_event(SaModeEvent::Reported(SaMode::Triggered)));
        assert!(machine.process_event(SaModeEvent::BeamOff));
        assert!(machine.allows_motion());
    }
}
