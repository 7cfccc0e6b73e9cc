// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Firmware version and build descriptor of a card.
//!
//! Both are read exactly once during initialisation. The capability flags
//! decide which optional knob groups and state machines exist at all.

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::error::{DeviceResult, ProtocolError};
use crate::protocol::{Command, ProtocolEngine, RawAnswer, ACK};

/// Axis property bit: ring buffer present.
pub const PROP_RING_BUFFER: u32 = 1 << 1;
/// Axis property bit: SPIM sequencer present.
pub const PROP_SPIM: u32 = 1 << 4;

/// Firmware version as `major.minor` hundredths (`2.81` is 281).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FirmwareVersion(u32);

impl FirmwareVersion {
    pub const fn from_hundredths(v: u32) -> Self {
        Self(v)
    }

    /// Parse `"2.81"`, `"v2.81"` or `"2.8"`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let s = s.strip_prefix(['v', 'V']).unwrap_or(s);
        let (major, minor) = match s.split_once('.') {
            Some((major, minor)) => (major, minor),
            None => (s, "0"),
        };
        let major: u32 = major.parse().ok()?;
        if minor.is_empty() || !minor.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        // "2.8" is 2.80, "2.81" is 2.81; extra digits are ignored
        let mut digits: String = minor.chars().take(2).collect();
        while digits.len() < 2 {
            digits.push('0');
        }
        let minor: u32 = digits.parse().ok()?;
        Some(Self(major * 100 + minor))
    }

    /// Read with `<addr>V`; answer `:A v2.81`.
    pub fn query(engine: &mut ProtocolEngine) -> DeviceResult<Self> {
        let cmd = Command::card(engine.address(), "V");
        let answer = engine.query_verify(&cmd, ACK)?;
        Self::from_answer(&answer)
    }

    pub fn from_answer(answer: &RawAnswer) -> DeviceResult<Self> {
        let token = answer
            .as_str()
            .strip_prefix(ACK)
            .and_then(|rest| rest.split_whitespace().next())
            .unwrap_or("");
        Self::parse(token).ok_or_else(|| {
            ProtocolError::MalformedAnswer {
                answer: answer.to_string(),
                reason: "no firmware version".to_string(),
            }
            .into()
        })
    }

    pub fn at_least(self, other: FirmwareVersion) -> bool {
        self >= other
    }

    pub fn newer_than(self, other: FirmwareVersion) -> bool {
        self > other
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

pub const FW_2_7: FirmwareVersion = FirmwareVersion::from_hundredths(270);
pub const FW_2_8: FirmwareVersion = FirmwareVersion::from_hundredths(280);

/// Parsed `BU X` build descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildInfo {
    pub build_name: String,
    pub axis_letters: Vec<char>,
    pub axis_types: Vec<char>,
    pub axis_addresses: Vec<char>,
    pub hex_addresses: Vec<String>,
    pub axis_props: Vec<u32>,
}

impl BuildInfo {
    pub fn query(engine: &mut ProtocolEngine) -> DeviceResult<Self> {
        let cmd = Command::card(engine.address(), "BU").token("X");
        let answer = engine.query(&cmd)?;
        Self::parse(&answer)
    }

    pub fn parse(answer: &RawAnswer) -> DeviceResult<Self> {
        let mut info = BuildInfo::default();
        let mut saw_props = false;
        for line in answer.lines() {
            let Some((label, rest)) = line.split_once(':') else {
                if info.build_name.is_empty() {
                    info.build_name = line.to_string();
                }
                continue;
            };
            let fields = rest.split_whitespace();
            match label.trim() {
                "Motor Axes" => info.axis_letters = fields.filter_map(first_char).collect(),
                "Axis Types" => info.axis_types = fields.filter_map(first_char).collect(),
                "Axis Addr" => info.axis_addresses = fields.filter_map(first_char).collect(),
                "Hex Addr" => info.hex_addresses = fields.map(str::to_string).collect(),
                "Axis Props" => {
                    info.axis_props = fields
                        .map(|f| f.parse::<u32>())
                        .collect::<Result<_, _>>()
                        .map_err(|_| ProtocolError::MalformedAnswer {
                            answer: answer.to_string(),
                            reason: format!("bad axis properties '{}'", rest.trim()),
                        })?;
                    saw_props = true;
                }
                _ => {}
            }
        }
        if !saw_props {
            return Err(ProtocolError::MalformedAnswer {
                answer: answer.to_string(),
                reason: "build info has no 'Axis Props' line".to_string(),
            }
            .into());
        }
        Ok(info)
    }

    /// Properties of the card's first axis; zero when absent.
    pub fn first_axis_props(&self) -> u32 {
        self.axis_props.first().copied().unwrap_or(0)
    }
}

fn first_char(s: &str) -> Option<char> {
    s.chars().next()
}

/// Optional features of one card, fixed after initialisation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CardCapabilities {
    pub spim: bool,
    pub ring_buffer: bool,
}

impl CardCapabilities {
    pub fn from_build(firmware: FirmwareVersion, build: &BuildInfo) -> Self {
        let props = build.first_axis_props();
        Self {
            spim: props & PROP_SPIM != 0,
            ring_buffer: firmware.newer_than(FW_2_8) && props & PROP_RING_BUFFER != 0,
        }
    }

    /// Query the build descriptor if the firmware has one.
    pub fn discover(engine: &mut ProtocolEngine, firmware: FirmwareVersion) -> DeviceResult<Self> {
        if !firmware.at_least(FW_2_8) {
            debug!("firmware {} predates build info, no optional features", firmware);
            return Ok(Self::default());
        }
        let build = BuildInfo::query(engine)?;
        let caps = Self::from_build(firmware, &build);
        debug!(
            "card {} build '{}': props {:#x}, spim={}, ring_buffer={}",
            engine.address(),
            build.build_name,
            build.first_axis_props(),
            caps.spim,
            caps.ring_buffer
        );
        Ok(caps)
    }
}
