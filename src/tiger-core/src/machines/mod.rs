// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Controller-side state machines layered on the protocol engine.

pub mod ring_buffer;
pub mod sa_mode;
pub mod spim;

pub use ring_buffer::{RingBuffer, RingBufferMode, RingBufferStatus, TriggerState};
pub use sa_mode::{SaMode, SaModeEvent, SaModeMachine};
pub use spim::{SpimSequencer, SpimSide, SpimState, SpimStatus};
