// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! USB stepper motors and twisters driven through an opaque vendor driver.
//!
//! The driver is reached only through [`MotorBus`] and [`MotorHandle`].
//! Devices get their serial numbers from a [`DiscoveryService`] that the
//! caller scans and shuts down explicitly.

pub mod discovery;
pub mod stage;

use std::fmt;

use crate::error::MotorError;

pub use discovery::DiscoveryService;
pub use stage::{Twister, XyStage, ZStage};

/// Driver codes at or below this value are not errors.
pub const BENIGN_CODE_MAX: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotorKind {
    Motor,
    Twister,
}

impl MotorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MotorKind::Motor => "motor",
            MotorKind::Twister => "twister",
        }
    }
}

impl fmt::Display for MotorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One connected motor. Dropping the handle disconnects it.
pub trait MotorHandle {
    /// Position in steps.
    fn position(&mut self) -> Result<i32, MotorError>;

    fn run_to(&mut self, target: i32, velocity: i32) -> Result<(), MotorError>;

    fn is_moving(&mut self) -> Result<bool, MotorError>;

    fn velocity(&mut self) -> Result<i32, MotorError>;

    fn set_velocity(&mut self, velocity: i32) -> Result<(), MotorError>;
}

/// Entry point into the vendor driver.
pub trait MotorBus {
    /// Connect the device with `serial`; `Err` carries the driver code.
    fn connect(&mut self, kind: MotorKind, serial: i32) -> Result<Box<dyn MotorHandle>, i32>;
}

/// A motor slot owned by a device: serial, connection and velocity.
pub(crate) struct MotorSlot {
    kind: MotorKind,
    serial: i32,
    handle: Option<Box<dyn MotorHandle>>,
    velocity: i32,
}

impl MotorSlot {
    pub(crate) fn new(kind: MotorKind, serial: i32, velocity: i32) -> Self {
        Self {
            kind,
            serial,
            handle: None,
            velocity,
        }
    }

    pub(crate) fn serial(&self) -> i32 {
        self.serial
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.handle.is_some()
    }

    /// Connect and adopt the motor's current velocity.
    pub(crate) fn connect(&mut self, bus: &mut dyn MotorBus) -> Result<(), MotorError> {
        self.handle = None;
        let mut handle = bus
            .connect(self.kind, self.serial)
            .map_err(|code| MotorError::Connect {
                serial: self.serial,
                code,
            })?;
        self.velocity = handle.velocity()?;
        self.handle = Some(handle);
        Ok(())
    }

    pub(crate) fn disconnect(&mut self) {
        self.handle = None;
    }

    pub(crate) fn handle(&mut self) -> Result<&mut dyn MotorHandle, MotorError> {
        match self.handle.as_mut() {
            Some(handle) => Ok(handle.as_mut()),
            None => Err(MotorError::NotConnected),
        }
    }

    pub(crate) fn velocity(&self) -> i32 {
        self.velocity
    }

    pub(crate) fn set_velocity(&mut self, velocity: i32) -> Result<(), MotorError> {
        if let Some(handle) = self.handle.as_mut() {
            handle.set_velocity(velocity)?;
        }
        self.velocity = velocity;
        Ok(())
    }

    pub(crate) fn is_moving(&mut self) -> Result<bool, MotorError> {
        match self.handle.as_mut() {
            Some(handle) => handle.is_moving(),
            None => Ok(false),
        }
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory motors for the unit tests of this module.

    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    use super::*;

    #[derive(Debug, Default)]
    pub struct MotorState {
        pub position: i32,
        pub target: i32,
        pub velocity: i32,
        /// Polls of `is_moving` before the motor reports motion.
        pub start_lag: u32,
        pub moves: Vec<(i32, i32)>,
        pub connected: bool,
    }

    pub struct FakeHandle(Rc<RefCell<MotorState>>);

    impl MotorHandle for FakeHandle {
        fn position(&mut self) -> Result<i32, MotorError> {
            Ok(self.0.borrow().position)
        }

        fn run_to(&mut self, target: i32, velocity: i32) -> Result<(), MotorError> {
            let mut s = self.0.borrow_mut();
            s.target = target;
            s.moves.push((target, velocity));
            if s.start_lag == 0 {
                s.position = target;
            }
            Ok(())
        }

        fn is_moving(&mut self) -> Result<bool, MotorError> {
            let mut s = self.0.borrow_mut();
            if s.position == s.target {
                return Ok(false);
            }
            if s.start_lag > 0 {
                s.start_lag -= 1;
                return Ok(false);
            }
            Ok(true)
        }

        fn velocity(&mut self) -> Result<i32, MotorError> {
            Ok(self.0.borrow().velocity)
        }

        fn set_velocity(&mut self, velocity: i32) -> Result<(), MotorError> {
            self.0.borrow_mut().velocity = velocity;
            Ok(())
        }
    }

    impl Drop for FakeHandle {
        fn drop(&mut self) {
            self.0.borrow_mut().connected = false;
        }
    }

    #[derive(Default)]
    pub struct FakeBus {
        pub devices: HashMap<(MotorKind, i32), Rc<RefCell<MotorState>>>,
        /// Serial at which connecting fails hard, with its code.
        pub hard_error: Option<(MotorKind, i32, i32)>,
        pub probes: Vec<(MotorKind, i32)>,
    }

    impl FakeBus {
        pub fn add(&mut self, kind: MotorKind, serial: i32, velocity: i32) -> Rc<RefCell<MotorState>> {
            let state = Rc::new(RefCell::new(MotorState {
                velocity,
                ..MotorState::default()
            }));
            self.devices.insert((kind, serial), state.clone());
            state
        }
    }

    impl MotorBus for FakeBus {
        fn connect(&mut self, kind: MotorKind, serial: i32) -> Result<Box<dyn MotorHandle>, i32> {
            self.probes.push((kind, serial));
            if let Some((k, s, code)) = self.hard_error {
                if k == kind && s == serial {
                    return Err(code);
                }
            }
            let state = self.devices.get(&(kind, serial)).ok_or(1)?;
            state.borrow_mut().connected = true;
            Ok(Box::new(FakeHandle(state.clone())))
        }
    }
}
