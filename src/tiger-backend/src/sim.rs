// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Simulated Tiger card and USB motor bus for development and testing.
//!
//! Holds controller state in memory and answers every command the scanner
//! issues with the same reply shapes as real firmware. No hardware or
//! serial port required.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::trace;

use tiger_core::error::{MotorError, TransportError};
use tiger_core::motion::{MotorBus, MotorHandle, MotorKind};
use tiger_core::protocol::format_decimal;
use tiger_core::transport::Transport;

const ACK: &str = ":A";
const UNKNOWN_COMMAND: &str = ":N-1";
const BAD_OPERAND: &str = ":N-2";

/// Verbs that carry the card address prefix.
const CARD_VERBS: &[&str] = &["V", "BU", "VB", "SS", "JS", "NR", "NV", "SN", "RM", "RT"];

/// Axis registers and their power-on values.
const AXIS_DEFAULTS: &[(&str, &str)] = &[
    ("UM", "1000"),
    ("HM", "8"),
    ("SL", "-4"),
    ("SU", "4"),
    ("PM", "0"),
    ("MA", "1"),
    ("B", "1.5"),
    ("D", "0"),
    ("J", "0"),
    ("SAA", "0"),
    ("SAO", "0"),
    ("SAF", "100"),
    ("SAM", "0"),
    ("SAP", "0"),
];

const CARD_DEFAULTS: &[(&str, char, &str)] = &[
    ("JS", 'X', "50"),
    ("JS", 'Y', "5"),
    ("NR", 'X', "1"),
    ("NR", 'Y', "10"),
    ("NR", 'F', "1"),
    ("NR", 'Z', "1"),
    ("NV", 'X', "0"),
    ("NV", 'Y', "0"),
    ("RT", 'Z', "0"),
];

const SPIM_IDLE: char = 'I';
const SPIM_ARMED: char = 'A';
const SPIM_RUNNING: char = 'S';
const RING_RUNNING_FLAG: i64 = 128;
const RING_PLAY_REPEAT: i64 = 3;

/// One scanner card with two axes.
#[derive(Debug, Clone)]
pub struct SimCard {
    address: char,
    firmware: String,
    axis_props: u32,
    axes: [char; 2],
    registers: HashMap<(String, char), String>,
    /// Native units.
    positions: HashMap<char, f64>,
    ring_points: Vec<(f64, f64)>,
    ring_mode: i64,
    ring_running: bool,
    spim_status: char,
}

impl SimCard {
    pub fn new() -> Self {
        let axes = ['X', 'Y'];
        let mut registers = HashMap::new();
        for axis in axes {
            for (verb, value) in AXIS_DEFAULTS {
                registers.insert((verb.to_string(), axis), value.to_string());
            }
        }
        for (verb, operand, value) in CARD_DEFAULTS {
            registers.insert((verb.to_string(), *operand), value.to_string());
        }
        Self {
            address: '3',
            firmware: "2.81".to_string(),
            // SPIM (bit 4) and ring buffer (bit 1)
            axis_props: 18,
            axes,
            registers,
            positions: axes.iter().map(|a| (*a, 0.0)).collect(),
            ring_points: Vec::new(),
            ring_mode: 2,
            ring_running: false,
            spim_status: SPIM_IDLE,
        }
    }

    pub fn with_address(mut self, address: char) -> Self {
        self.address = address;
        self
    }

    pub fn with_firmware(mut self, version: &str) -> Self {
        self.firmware = version.to_string();
        self
    }

    pub fn with_axis_props(mut self, props: u32) -> Self {
        self.axis_props = props;
        self
    }

    pub fn with_register(mut self, verb: &str, operand: char, value: &str) -> Self {
        self.registers
            .insert((verb.to_string(), operand), value.to_string());
        self
    }

    /// Scanner name matching this card, e.g. `Scanner:XY:33`.
    pub fn device_name(&self) -> String {
        format!(
            "Scanner:{}{}:{:02X}",
            self.axes[0], self.axes[1], self.address as u32
        )
    }

    fn register(&self, verb: &str, operand: char) -> Option<&String> {
        self.registers.get(&(verb.to_string(), operand))
    }

    fn register_f64(&self, verb: &str, axis: char) -> f64 {
        self.register(verb, axis)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.0)
    }

    fn position(&self, axis: char) -> f64 {
        self.positions.get(&axis).copied().unwrap_or(0.0)
    }

    fn limit_status(&self, axis: char) -> char {
        let um = self.register_f64("UM", axis);
        let pos = self.position(axis);
        if pos >= self.register_f64("SU", axis) * um {
            'U'
        } else if pos <= self.register_f64("SL", axis) * um {
            'L'
        } else {
            'N'
        }
    }

    fn build_info(&self) -> String {
        let [x, y] = self.axes;
        let hex = format!("{:02X}", self.address as u32);
        [
            "TIGER_COMM".to_string(),
            format!("Motor Axes: {} {}", x, y),
            "Axis Types: x x".to_string(),
            format!("Axis Addr: {} {}", self.address, self.address),
            format!("Hex Addr: {} {}", hex, hex),
            format!("Axis Props: {} {}", self.axis_props, self.axis_props),
        ]
        .join("\r")
    }

    fn handle(&mut self, line: &str) -> String {
        let line = line.trim();
        let (card, rest) = match line.strip_prefix(self.address) {
            Some(rest) if CARD_VERBS.contains(&verb_of(rest)) => (true, rest),
            _ => (false, line),
        };
        let verb = verb_of(rest);
        if card != CARD_VERBS.contains(&verb) {
            return UNKNOWN_COMMAND.to_string();
        }
        let operands: Vec<Operand> = match rest[verb.len()..]
            .split_whitespace()
            .map(Operand::parse)
            .collect::<Option<_>>()
        {
            Some(ops) => ops,
            None => return BAD_OPERAND.to_string(),
        };

        match verb {
            "V" => format!("{} v{}", ACK, self.firmware),
            "BU" => self.build_info(),
            "VB" | "SS" => ACK.to_string(),
            "W" => match operands.first() {
                Some(Operand::Bare(axis)) => {
                    format!("{} {}", ACK, format_decimal(self.position(*axis)))
                }
                _ => BAD_OPERAND.to_string(),
            },
            "M" => self.move_to(&operands),
            "!" => {
                for op in &operands {
                    if let Operand::Bare(axis) = op {
                        let home = self.register_f64("HM", *axis) * self.register_f64("UM", *axis);
                        self.positions.insert(*axis, home);
                    }
                }
                ACK.to_string()
            }
            "RS" => match operands.first() {
                Some(Operand::Query(_)) => format!("{} N", ACK),
                Some(Operand::Minus(axis)) => format!("{} {}", ACK, self.limit_status(*axis)),
                _ => BAD_OPERAND.to_string(),
            },
            "LD" => {
                let x = operands.iter().find_map(|op| op.value_for(self.axes[0]));
                let y = operands.iter().find_map(|op| op.value_for(self.axes[1]));
                match (x, y) {
                    (Some(x), Some(y)) => {
                        self.ring_points.push((x, y));
                        ACK.to_string()
                    }
                    _ => BAD_OPERAND.to_string(),
                }
            }
            "RM" => self.ring(&operands),
            "SN" => self.spim(&operands),
            "B" => match operands.first() {
                Some(Operand::Query(axis)) => match self.register("B", *axis) {
                    Some(v) => format!(":{}={}", axis, v),
                    None => BAD_OPERAND.to_string(),
                },
                _ => self.registers_op(verb, &operands),
            },
            _ => self.registers_op(verb, &operands),
        }
    }

    fn move_to(&mut self, operands: &[Operand]) -> String {
        for op in operands {
            match op {
                Operand::Set(axis, value) => match value.parse::<f64>() {
                    Ok(v) => {
                        self.positions.insert(*axis, v);
                    }
                    Err(_) => return BAD_OPERAND.to_string(),
                },
                _ => return BAD_OPERAND.to_string(),
            }
        }
        ACK.to_string()
    }

    fn ring(&mut self, operands: &[Operand]) -> String {
        match operands.first() {
            None => {
                if self.ring_running {
                    self.ring_running = false;
                } else if let Some(&(x, y)) = self.ring_points.last() {
                    self.positions.insert(self.axes[0], x);
                    self.positions.insert(self.axes[1], y);
                    self.ring_running = self.ring_mode == RING_PLAY_REPEAT;
                }
                ACK.to_string()
            }
            Some(Operand::Query(_)) => {
                let flag = if self.ring_running { RING_RUNNING_FLAG } else { 0 };
                format!("{} X={}", ACK, self.ring_mode + flag)
            }
            Some(Operand::Set(_, value)) => match value.parse::<i64>() {
                Ok(0) => {
                    self.ring_points.clear();
                    self.ring_running = false;
                    ACK.to_string()
                }
                Ok(mode @ 1..=3) => {
                    self.ring_mode = mode;
                    ACK.to_string()
                }
                _ => BAD_OPERAND.to_string(),
            },
            _ => BAD_OPERAND.to_string(),
        }
    }

    fn spim(&mut self, operands: &[Operand]) -> String {
        match operands.first() {
            None => {
                if self.spim_status == SPIM_RUNNING {
                    return BAD_OPERAND.to_string();
                }
                self.spim_status = SPIM_RUNNING;
            }
            Some(Operand::Query(_)) => return format!("{} {}", ACK, self.spim_status),
            Some(Operand::Set(_, value)) => {
                // the action letter travels as its ASCII code
                let letter = value.parse::<u8>().map(char::from);
                match letter {
                    Ok('P') => self.spim_status = SPIM_IDLE,
                    Ok('a') => self.spim_status = SPIM_ARMED,
                    _ => return BAD_OPERAND.to_string(),
                }
            }
            _ => return BAD_OPERAND.to_string(),
        }
        ACK.to_string()
    }

    /// Plain register read/write: `V X?` answers `:A X=v`, `V X=v Y=w` stores.
    fn registers_op(&mut self, verb: &str, operands: &[Operand]) -> String {
        if operands.is_empty() {
            return UNKNOWN_COMMAND.to_string();
        }
        if let [Operand::Query(axis)] = operands {
            return match self.register(verb, *axis) {
                Some(v) => format!("{} {}={}", ACK, axis, v),
                None => UNKNOWN_COMMAND.to_string(),
            };
        }
        for op in operands {
            let Operand::Set(axis, value) = op else {
                return BAD_OPERAND.to_string();
            };
            if self.register(verb, *axis).is_none() {
                return UNKNOWN_COMMAND.to_string();
            }
            self.registers
                .insert((verb.to_string(), *axis), value.clone());
        }
        ACK.to_string()
    }
}

impl Default for SimCard {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for SimCard {
    fn send(&mut self, command: &str) -> Result<String, TransportError> {
        let answer = self.handle(command);
        trace!("sim {} -> {}", command, answer);
        Ok(answer)
    }

    fn describe(&self) -> String {
        format!("sim card {}", self.address)
    }
}

fn verb_of(rest: &str) -> &str {
    rest.split_whitespace().next().unwrap_or("")
}

enum Operand {
    Query(char),
    Set(char, String),
    Minus(char),
    Bare(char),
}

impl Operand {
    fn parse(token: &str) -> Option<Self> {
        let mut chars = token.chars();
        let axis = chars.next()?.to_ascii_uppercase();
        let rest = chars.as_str();
        Some(match rest {
            "" => Operand::Bare(axis),
            "?" => Operand::Query(axis),
            "-" => Operand::Minus(axis),
            _ => Operand::Set(axis, rest.strip_prefix('=')?.to_string()),
        })
    }

    fn value_for(&self, axis: char) -> Option<f64> {
        match self {
            Operand::Set(a, v) if *a == axis => v.parse().ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct SimMotor {
    position: i32,
    velocity: i32,
}

struct SimMotorHandle(Rc<RefCell<SimMotor>>);

impl MotorHandle for SimMotorHandle {
    fn position(&mut self) -> Result<i32, MotorError> {
        Ok(self.0.borrow().position)
    }

    fn run_to(&mut self, target: i32, velocity: i32) -> Result<(), MotorError> {
        let mut motor = self.0.borrow_mut();
        motor.velocity = velocity;
        motor.position = target;
        Ok(())
    }

    fn is_moving(&mut self) -> Result<bool, MotorError> {
        Ok(false)
    }

    fn velocity(&mut self) -> Result<i32, MotorError> {
        Ok(self.0.borrow().velocity)
    }

    fn set_velocity(&mut self, velocity: i32) -> Result<(), MotorError> {
        self.0.borrow_mut().velocity = velocity;
        Ok(())
    }
}

/// Motors that arrive instantly. Unknown serials answer with driver code 1.
#[derive(Debug, Default)]
pub struct SimMotorBus {
    devices: HashMap<(MotorKind, i32), Rc<RefCell<SimMotor>>>,
}

impl SimMotorBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Three motors (X, Y, Z) and one twister.
    pub fn with_default_rig() -> Self {
        let mut bus = Self::new();
        for serial in [11, 12, 13] {
            bus.add(MotorKind::Motor, serial);
        }
        bus.add(MotorKind::Twister, 21);
        bus
    }

    pub fn add(&mut self, kind: MotorKind, serial: i32) {
        let motor = SimMotor {
            position: 0,
            velocity: 10,
        };
        self.devices
            .insert((kind, serial), Rc::new(RefCell::new(motor)));
    }
}

impl MotorBus for SimMotorBus {
    fn connect(&mut self, kind: MotorKind, serial: i32) -> Result<Box<dyn MotorHandle>, i32> {
        match self.devices.get(&(kind, serial)) {
            Some(motor) => Ok(Box::new(SimMotorHandle(motor.clone()))),
            None => Err(1),
        }
    }
}
