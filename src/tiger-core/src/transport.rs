// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Bus transport abstraction.
//!
//! A transport sends one command line and returns one answer line. It does
//! not retry, reorder or coalesce. Every card on a shared bus talks through
//! the same [`Bus`] handle; the bus has no internal locking, so callers must
//! serialise traffic (one request in flight at a time).

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use crate::error::TransportError;

/// Line terminator appended to outgoing commands.
pub const COMMAND_TERMINATOR: &str = "\r";

/// Separator between lines of a multi-line answer.
pub const ANSWER_LINE_SEPARATOR: char = '\r';

/// Sends a command line to a controller and returns the raw answer.
pub trait Transport {
    /// Send `command` (without terminator) and return the answer with the
    /// line terminator stripped.
    fn send(&mut self, command: &str) -> Result<String, TransportError>;

    /// Like [`Transport::send`], but let the controller settle for `delay`
    /// before reading. Used for slow commands such as flash writes.
    fn send_settled(&mut self, command: &str, delay: Duration) -> Result<String, TransportError> {
        let _ = delay;
        self.send(command)
    }

    /// Short human-readable description for logs.
    fn describe(&self) -> String {
        "transport".to_string()
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, command: &str) -> Result<String, TransportError> {
        (**self).send(command)
    }

    fn send_settled(&mut self, command: &str, delay: Duration) -> Result<String, TransportError> {
        (**self).send_settled(command, delay)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Shared handle to one physical bus.
///
/// Cloning is cheap; all clones talk to the same transport. The handle is
/// deliberately `!Send`: the protocol assumes single-threaded access.
#[derive(Clone)]
pub struct Bus {
    inner: Rc<RefCell<Box<dyn Transport>>>,
}

impl Bus {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(transport)),
        }
    }

    pub fn send(&self, command: &str) -> Result<String, TransportError> {
        self.inner.borrow_mut().send(command)
    }

    pub fn send_settled(&self, command: &str, delay: Duration) -> Result<String, TransportError> {
        self.inner.borrow_mut().send_settled(command, delay)
    }

    pub fn describe(&self) -> String {
        self.inner.borrow().describe()
    }
}

impl fmt::Debug for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bus")
            .field("transport", &self.describe())
            .finish()
    }
}
