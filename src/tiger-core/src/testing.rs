// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Scripted transport for unit tests.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use crate::error::TransportError;
use crate::transport::{Bus, Transport};

#[derive(Default)]
struct Script {
    queued: VecDeque<Option<String>>,
    fixed: HashMap<String, String>,
    sent: Vec<String>,
}

/// Replays canned answers and records every command.
///
/// Queued answers are consumed first, in order. When the queue is empty the
/// fixed table is consulted by exact command text. Anything else times out.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    script: Rc<RefCell<Script>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bus(&self) -> Bus {
        Bus::new(Box::new(self.clone()))
    }

    /// Queue the answer to the next command.
    pub fn reply(&self, answer: &str) -> &Self {
        self.script
            .borrow_mut()
            .queued
            .push_back(Some(answer.to_string()));
        self
    }

    /// Make the next command time out.
    pub fn fail_next(&self) -> &Self {
        self.script.borrow_mut().queued.push_back(None);
        self
    }

    /// Always answer `command` with `answer` once the queue is drained.
    pub fn on(&self, command: &str, answer: &str) -> &Self {
        self.script
            .borrow_mut()
            .fixed
            .insert(command.to_string(), answer.to_string());
        self
    }

    pub fn sent(&self) -> Vec<String> {
        self.script.borrow().sent.clone()
    }

    pub fn sent_count(&self) -> usize {
        self.script.borrow().sent.len()
    }

    pub fn clear_log(&self) {
        self.script.borrow_mut().sent.clear();
    }
}

impl Transport for ScriptedTransport {
    fn send(&mut self, command: &str) -> Result<String, TransportError> {
        let mut script = self.script.borrow_mut();
        script.sent.push(command.to_string());
        if let Some(next) = script.queued.pop_front() {
            return next.ok_or_else(|| TransportError::Timeout(command.to_string()));
        }
        script
            .fixed
            .get(command)
            .cloned()
            .ok_or_else(|| TransportError::Timeout(command.to_string()))
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}
