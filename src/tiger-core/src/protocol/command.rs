// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Outgoing command lines.
//!
//! A command is a verb, optionally prefixed by the card address, followed by
//! space-separated operands (`X?`, `X=12.5`, `X-`, bare `X`). The builder
//! guarantees syntax only; range checks belong to the device layer.

use std::fmt;

/// Maximum decimals transmitted for fractional operands.
pub const MAX_DECIMALS: usize = 4;

/// One-character address of a card on a shared bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CardAddress(char);

impl CardAddress {
    pub fn new(c: char) -> Option<Self> {
        c.is_ascii_alphanumeric().then_some(Self(c))
    }

    /// Address from a two-digit hex string such as `"33"` (ASCII `'3'`).
    pub fn from_hex(hex: &str) -> Option<Self> {
        let code = u8::from_str_radix(hex.trim(), 16).ok()?;
        Self::new(code as char)
    }

    pub fn as_char(self) -> char {
        self.0
    }

    pub fn hex(self) -> String {
        format!("{:02X}", self.0 as u32)
    }
}

impl fmt::Display for CardAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Letter naming one axis on a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AxisLetter(char);

impl AxisLetter {
    pub const X: AxisLetter = AxisLetter('X');
    pub const Y: AxisLetter = AxisLetter('Y');
    pub const Z: AxisLetter = AxisLetter('Z');
    /// Operand letter used by card-level verbs such as `NR F`.
    pub const F: AxisLetter = AxisLetter('F');

    pub fn new(c: char) -> Option<Self> {
        let c = c.to_ascii_uppercase();
        c.is_ascii_uppercase().then_some(Self(c))
    }

    pub fn as_char(self) -> char {
        self.0
    }
}

impl fmt::Display for AxisLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Numeric operand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    Int(i64),
    Float(f64),
}

impl From<i64> for Operand {
    fn from(v: i64) -> Self {
        Operand::Int(v)
    }
}

impl From<i32> for Operand {
    fn from(v: i32) -> Self {
        Operand::Int(v as i64)
    }
}

impl From<u8> for Operand {
    fn from(v: u8) -> Self {
        Operand::Int(v as i64)
    }
}

impl From<f64> for Operand {
    fn from(v: f64) -> Self {
        Operand::Float(v)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Int(v) => write!(f, "{}", v),
            Operand::Float(v) => f.write_str(&format_decimal(*v)),
        }
    }
}

/// Format with at most [`MAX_DECIMALS`] decimals and no trailing zeros.
pub fn format_decimal(value: f64) -> String {
    let mut s = format!("{:.*}", MAX_DECIMALS, value);
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    if s == "-0" {
        s = "0".to_string();
    }
    s
}

/// Builder for one command line.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    address: Option<CardAddress>,
    verb: String,
    operands: Vec<String>,
}

impl Command {
    /// Axis-level command; axis letters are unique on the bus so no prefix.
    pub fn new(verb: &str) -> Self {
        Self {
            address: None,
            verb: verb.to_string(),
            operands: Vec::new(),
        }
    }

    /// Card-level command, prefixed with the card address.
    pub fn card(address: CardAddress, verb: &str) -> Self {
        Self {
            address: Some(address),
            ..Self::new(verb)
        }
    }

    /// `X?`
    pub fn query(mut self, axis: AxisLetter) -> Self {
        self.operands.push(format!("{}?", axis));
        self
    }

    /// `X=value`
    pub fn set(mut self, axis: AxisLetter, value: impl Into<Operand>) -> Self {
        self.operands.push(format!("{}={}", axis, value.into()));
        self
    }

    /// Bare axis letter (`W X`, `! X Y`).
    pub fn axis(mut self, axis: AxisLetter) -> Self {
        self.operands.push(axis.to_string());
        self
    }

    /// `X-` (short status form).
    pub fn axis_minus(mut self, axis: AxisLetter) -> Self {
        self.operands.push(format!("{}-", axis));
        self
    }

    /// Free-form token, for operands that carry their own syntax.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.operands.push(token.into());
        self
    }

    pub fn verb(&self) -> &str {
        &self.verb
    }

    pub fn render(&self) -> String {
        let mut line = String::new();
        if let Some(address) = self.address {
            line.push(address.as_char());
        }
        line.push_str(&self.verb);
        for operand in &self.operands {
            line.push(' ');
            line.push_str(operand);
        }
        line
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
