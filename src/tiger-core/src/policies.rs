// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Device operational policies for busy checks and motion-start waits.
//!
//! The busy poll and the wait for a motor to start are the only places where
//! this crate departs from plain request/response. Both are configurable
//! here so the behaviour is visible at construction time.

use std::time::{Duration, Instant};

use crate::error::DeviceError;

/// What `is_busy` reports when the status query itself fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BusyFailure {
    /// Report "not busy" and log a warning. Keeps host poll loops alive at
    /// the cost of hiding a hardware fault.
    #[default]
    FailOpen,
    /// Surface the error to the caller.
    Propagate,
}

impl BusyFailure {
    /// Resolve a failed busy query.
    pub fn resolve(self, error: DeviceError) -> Result<bool, DeviceError> {
        match self {
            BusyFailure::FailOpen => Ok(false),
            BusyFailure::Propagate => Err(error),
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail-open" | "failopen" | "open" => Some(BusyFailure::FailOpen),
            "propagate" | "strict" => Some(BusyFailure::Propagate),
            _ => None,
        }
    }
}

/// Policy for waiting until a commanded motor has started moving.
pub trait MotionStartPolicy {
    /// Upper bound on the wait, measured on a monotonic clock.
    fn ceiling(&self) -> Duration;

    /// Pause between status polls.
    fn poll_interval(&self) -> Duration;

    /// Poll `started` until it returns true or the ceiling passes.
    ///
    /// Returns `Ok(true)` if motion started (or the target was reached)
    /// in time, `Ok(false)` if the ceiling expired first.
    fn wait<F>(&self, mut started: F) -> Result<bool, DeviceError>
    where
        F: FnMut() -> Result<bool, DeviceError>,
    {
        let deadline = Instant::now() + self.ceiling();
        loop {
            if started()? {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            let pause = self.poll_interval();
            if !pause.is_zero() {
                std::thread::sleep(pause);
            }
        }
    }
}

/// Bounded wait with a fixed ceiling.
#[derive(Debug, Clone)]
pub struct BoundedStartWait {
    ceiling: Duration,
    poll_interval: Duration,
}

impl BoundedStartWait {
    pub fn new(ceiling: Duration, poll_interval: Duration) -> Self {
        Self {
            ceiling,
            poll_interval,
        }
    }

    /// 50 ms ceiling, polling every millisecond.
    pub fn default_motor() -> Self {
        Self {
            ceiling: Duration::from_millis(50),
            poll_interval: Duration::from_millis(1),
        }
    }
}

impl Default for BoundedStartWait {
    fn default() -> Self {
        Self::default_motor()
    }
}

impl MotionStartPolicy for BoundedStartWait {
    fn ceiling(&self) -> Duration {
        self.ceiling
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

/// Skip the wait entirely.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoStartWait;

impl MotionStartPolicy for NoStartWait {
    fn ceiling(&self) -> Duration {
        Duration::ZERO
    }

    fn poll_interval(&self) -> Duration {
        Duration::ZERO
    }

    fn wait<F>(&self, _started: F) -> Result<bool, DeviceError>
    where
        F: FnMut() -> Result<bool, DeviceError>,
    {
        Ok(true)
    }
}
