// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Read-modify-write access to packed register fields.
//!
//! One accessor type covers every sub-field of a register: it is
//! parameterised by the register verb, a bit mask and the value mapping of
//! the field. Writing always queries the current register first and only
//! replaces the bits under the mask.

use std::marker::PhantomData;

use tracing::debug;

use crate::choice::{
    Choice, ClockPolarity, ClockSource, SaPattern, TtlOutput, TtlPolarity,
};
use crate::error::{DeviceResult, ProtocolError};
use crate::protocol::{AxisLetter, Command, ProtocolEngine};

/// Register holding the single-axis waveform pattern and flags.
pub const SA_PATTERN_VERB: &str = "SAP";

/// Accessor for one field of a register.
#[derive(Debug, Clone, Copy)]
pub struct BitField<V> {
    verb: &'static str,
    mask: i64,
    shift: u32,
    _value: PhantomData<V>,
}

impl<V: Choice> BitField<V> {
    /// `mask` must be a contiguous run of bits.
    pub const fn new(verb: &'static str, mask: i64) -> Self {
        Self {
            verb,
            mask,
            shift: mask.trailing_zeros(),
            _value: PhantomData,
        }
    }

    pub fn mask(&self) -> i64 {
        self.mask
    }

    pub fn decode(&self, register: i64) -> Option<V> {
        V::from_code((register & self.mask) >> self.shift)
    }

    /// Replace the field in `register`, leaving other bits alone.
    pub fn encode(&self, register: i64, value: V) -> i64 {
        (register & !self.mask) | ((value.code() << self.shift) & self.mask)
    }

    pub fn read_register(&self, engine: &mut ProtocolEngine, axis: AxisLetter) -> DeviceResult<i64> {
        let cmd = Command::new(self.verb).query(axis);
        engine.query_value(&cmd, &format!(":A {}=", axis))
    }

    pub fn read(&self, engine: &mut ProtocolEngine, axis: AxisLetter) -> DeviceResult<V> {
        let register = self.read_register(engine, axis)?;
        self.decode(register).ok_or_else(|| {
            ProtocolError::MalformedAnswer {
                answer: register.to_string(),
                reason: format!("no {} field value for bits {:#x}", self.verb, register & self.mask),
            }
            .into()
        })
    }

    /// Write `value` into the field and return the new register value.
    pub fn write(&self, engine: &mut ProtocolEngine, axis: AxisLetter, value: V) -> DeviceResult<i64> {
        let current = self.read_register(engine, axis)?;
        let updated = self.encode(current, value);
        debug!(
            "{} {}: {:#010b} -> {:#010b}",
            self.verb, axis, current, updated
        );
        engine.command(&Command::new(self.verb).set(axis, updated))?;
        Ok(updated)
    }
}

/// A value type bound to one fixed field of its register.
pub trait RegisterField: Choice {
    const FIELD: BitField<Self>;
}

impl RegisterField for SaPattern {
    const FIELD: BitField<Self> = SA_PATTERN;
}

impl RegisterField for ClockSource {
    const FIELD: BitField<Self> = SA_CLOCK_SOURCE;
}

impl RegisterField for ClockPolarity {
    const FIELD: BitField<Self> = SA_CLOCK_POLARITY;
}

impl RegisterField for TtlOutput {
    const FIELD: BitField<Self> = SA_TTL_OUTPUT;
}

impl RegisterField for TtlPolarity {
    const FIELD: BitField<Self> = SA_TTL_POLARITY;
}

pub const SA_PATTERN: BitField<SaPattern> = BitField::new(SA_PATTERN_VERB, 0b0000_0111);
pub const SA_CLOCK_SOURCE: BitField<ClockSource> = BitField::new(SA_PATTERN_VERB, 1 << 7);
pub const SA_CLOCK_POLARITY: BitField<ClockPolarity> = BitField::new(SA_PATTERN_VERB, 1 << 6);
pub const SA_TTL_OUTPUT: BitField<TtlOutput> = BitField::new(SA_PATTERN_VERB, 1 << 5);
pub const SA_TTL_POLARITY: BitField<TtlPolarity> = BitField::new(SA_PATTERN_VERB, 1 << 4);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::CardAddress;
    use crate::testing::ScriptedTransport;

    fn engine(script: &ScriptedTransport) -> ProtocolEngine {
        ProtocolEngine::new(script.bus(), CardAddress::new('3').unwrap())
    }

    fn x() -> AxisLetter {
        AxisLetter::new('X').unwrap()
    }

    #[test]
    fn test_decode_fields() {
        let register = 0b1011_0010;
        assert_eq!(SA_PATTERN.decode(register), Some(SaPattern::Square));
        assert_eq!(SA_CLOCK_SOURCE.decode(register), Some(ClockSource::External));
        assert_eq!(SA_CLOCK_POLARITY.decode(register), Some(ClockPolarity::Rising));
        assert_eq!(SA_TTL_OUTPUT.decode(register), Some(TtlOutput::Enabled));
        assert_eq!(SA_TTL_POLARITY.decode(register), Some(TtlPolarity::ActiveLow));
        assert_eq!(SA_PATTERN.decode(0b0000_0111), None);
    }

    #[test]
    fn test_ttl_output_write_preserves_other_bits() {
        let script = ScriptedTransport::new();
        script.reply(":A X=178").reply(":A");
        let mut engine = engine(&script);

        let written = SA_TTL_OUTPUT
            .write(&mut engine, x(), TtlOutput::Enabled)
            .unwrap();

        assert_eq!(written, 0b1011_0010 | (1 << 5));
        assert_eq!(script.sent(), vec!["SAP X?", "SAP X=178"]);
    }

    #[test]
    fn test_clearing_a_bit_keeps_neighbours() {
        let script = ScriptedTransport::new();
        script.reply(":A X=178").reply(":A");
        let mut engine = engine(&script);

        let written = SA_CLOCK_SOURCE
            .write(&mut engine, x(), ClockSource::Internal)
            .unwrap();

        assert_eq!(written, 0b0011_0010);
        assert_eq!(script.sent()[1], "SAP X=50");
    }

    #[test]
    fn test_failed_read_sends_no_write() {
        let script = ScriptedTransport::new();
        script.reply(":N-1");
        let mut engine = engine(&script);

        assert!(SA_PATTERN.write(&mut engine, x(), SaPattern::Ramp).is_err());
        assert_eq!(script.sent_count(), 1);
    }
}
