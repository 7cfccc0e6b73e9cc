// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Answer parsing.
//!
//! Answers start with an acknowledgement token (`:A`), optionally echo
//! `AXIS=value` pairs, or carry a status letter at a fixed column. Error
//! answers start with `:N` followed by a negative code. Values are returned
//! in native units; conversion to engineering units happens in the device
//! layer.

use std::fmt;

use crate::error::ProtocolError;

/// Prefix shared by all positive acknowledgements.
pub const ACK: &str = ":A";

/// Prefix of controller error answers (`:N-1`).
pub const NAK: &str = ":N";

/// Column holding the status letter in short status answers (`:A B`).
pub const STATUS_COLUMN: usize = 3;

/// Values that can be read out of an answer.
pub trait AnswerValue: Sized {
    fn parse_token(token: &str) -> Option<Self>;
}

impl AnswerValue for f64 {
    fn parse_token(token: &str) -> Option<Self> {
        token.parse::<f64>().ok().filter(|v| v.is_finite())
    }
}

impl AnswerValue for i64 {
    fn parse_token(token: &str) -> Option<Self> {
        // fixed-point answers ("3.0") truncate toward zero
        token
            .parse::<i64>()
            .ok()
            .or_else(|| f64::parse_token(token).map(|v| v.trunc() as i64))
    }
}

/// One raw answer line, terminator stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAnswer(String);

impl RawAnswer {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check the leading bytes against `expected`.
    ///
    /// Error answers are reported as [`ProtocolError::ControllerError`] so
    /// callers can tell a refusal apart from garbage.
    pub fn verify(&self, expected: &str) -> Result<(), ProtocolError> {
        if self.0.starts_with(expected) {
            return Ok(());
        }
        if self.0.starts_with(NAK) {
            return Err(match self.error_code() {
                Some(code) => ProtocolError::ControllerError {
                    code,
                    answer: self.0.clone(),
                },
                None => self.malformed("unreadable error code"),
            });
        }
        Err(ProtocolError::PrefixMismatch {
            expected: expected.to_string(),
            answer: self.0.clone(),
        })
    }

    /// Error code of a `:N-<code>` answer; `None` when absent or garbled.
    pub fn error_code(&self) -> Option<i32> {
        let rest = self.0.strip_prefix(NAK)?;
        rest.split_whitespace().next()?.parse::<i32>().ok()
    }

    /// Value following the first `=`, up to the next whitespace.
    pub fn after_equals<T: AnswerValue>(&self) -> Result<T, ProtocolError> {
        let (_, rest) = self
            .0
            .split_once('=')
            .ok_or_else(|| self.malformed("missing '='"))?;
        self.parse_first_token(rest)
    }

    /// Value starting at a fixed column, leading whitespace skipped.
    pub fn after_position<T: AnswerValue>(&self, column: usize) -> Result<T, ProtocolError> {
        let rest = self
            .0
            .get(column..)
            .ok_or_else(|| self.malformed(format!("shorter than column {}", column)))?;
        self.parse_first_token(rest)
    }

    /// Text following the first colon-delimited label, trimmed.
    ///
    /// The leading `:` of the acknowledgement is not a label delimiter, so
    /// for `:A Version: 2.8` this yields `2.8`.
    pub fn after_colon(&self) -> Result<&str, ProtocolError> {
        let body = self.0.strip_prefix(':').unwrap_or(&self.0);
        let (_, rest) = body
            .split_once(':')
            .ok_or_else(|| self.malformed("missing ':' label"))?;
        Ok(rest.trim())
    }

    /// Single status character at `column`.
    pub fn char_at(&self, column: usize) -> Result<char, ProtocolError> {
        self.0
            .chars()
            .nth(column)
            .ok_or_else(|| self.malformed(format!("no character at column {}", column)))
    }

    /// Lines of a multi-line answer (`\r` separated), empty lines dropped.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.0
            .split(['\r', '\n'])
            .map(str::trim)
            .filter(|l| !l.is_empty())
    }

    fn parse_first_token<T: AnswerValue>(&self, rest: &str) -> Result<T, ProtocolError> {
        let token = rest
            .split_whitespace()
            .next()
            .ok_or_else(|| self.malformed("no value"))?;
        T::parse_token(token)
            .ok_or_else(|| self.malformed(format!("'{}' is not a number", token)))
    }

    fn malformed(&self, reason: impl Into<String>) -> ProtocolError {
        ProtocolError::MalformedAnswer {
            answer: self.0.clone(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for RawAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
