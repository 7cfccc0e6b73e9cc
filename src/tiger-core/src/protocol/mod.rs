// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! ASCII command protocol: builder, parser and the engine that ties them to
//! a bus.

pub mod answer;
pub mod command;
pub mod engine;

pub use answer::{AnswerValue, RawAnswer, ACK, NAK, STATUS_COLUMN};
pub use command::{format_decimal, AxisLetter, CardAddress, Command, Operand};
pub use engine::ProtocolEngine;
