// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Serial-number discovery for motors and twisters on the USB bus.

use tracing::{debug, info, warn};

use crate::error::MotorError;

use super::{MotorBus, MotorKind, BENIGN_CODE_MAX};

/// Serial numbers probed on each scan.
pub const SCAN_RANGE: std::ops::Range<i32> = 0..250;
pub const MAX_MOTORS: usize = 16;
pub const MAX_TWISTERS: usize = 4;

/// Serial numbers found by the last scan, in probe order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryService {
    motors: Vec<i32>,
    twisters: Vec<i32>,
    scanned: bool,
}

impl DiscoveryService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_scanned(&self) -> bool {
        self.scanned
    }

    /// Probe the bus for motors, then twisters.
    ///
    /// A hard driver error stops probing that kind; devices found before it
    /// are kept and the first such error is returned after both passes.
    pub fn scan(&mut self, bus: &mut dyn MotorBus) -> Result<(), MotorError> {
        info!("pinging motors...");
        let (motors, motor_err) = probe(bus, MotorKind::Motor, MAX_MOTORS);
        let (twisters, twister_err) = probe(bus, MotorKind::Twister, MAX_TWISTERS);
        self.motors = motors;
        self.twisters = twisters;
        self.scanned = true;
        info!(
            "found {} motors and {} twisters",
            self.motors.len(),
            self.twisters.len()
        );
        match motor_err.or(twister_err) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Forget everything found so far.
    pub fn shutdown(&mut self) {
        self.motors.clear();
        self.twisters.clear();
        self.scanned = false;
    }

    pub fn motors(&self) -> &[i32] {
        &self.motors
    }

    pub fn twisters(&self) -> &[i32] {
        &self.twisters
    }

    pub fn motor_serial(&self, slot: usize) -> Result<i32, MotorError> {
        lookup(&self.motors, MotorKind::Motor, slot)
    }

    pub fn twister_serial(&self, slot: usize) -> Result<i32, MotorError> {
        lookup(&self.twisters, MotorKind::Twister, slot)
    }
}

fn lookup(found: &[i32], kind: MotorKind, slot: usize) -> Result<i32, MotorError> {
    found
        .get(slot)
        .copied()
        .ok_or(MotorError::NotDiscovered {
            kind: kind.as_str(),
            slot,
        })
}

fn probe(bus: &mut dyn MotorBus, kind: MotorKind, max: usize) -> (Vec<i32>, Option<MotorError>) {
    let mut found = Vec::new();
    for serial in SCAN_RANGE {
        if found.len() >= max {
            break;
        }
        match bus.connect(kind, serial) {
            // the handle disconnects when dropped
            Ok(_handle) => {
                debug!("{} {} present", kind, serial);
                found.push(serial);
            }
            Err(code) if code > BENIGN_CODE_MAX => {
                warn!("error scanning {} index {}: {}", kind, serial, code);
                return (
                    found,
                    Some(MotorError::Driver {
                        call: "connect",
                        code,
                    }),
                );
            }
            Err(_) => {}
        }
    }
    (found, None)
}
