// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Z stage, twister and XY stage built on USB motors.
//!
//! The driver's run-to-position call returns before the motor is under way,
//! so every move waits (bounded by the [`MotionStartPolicy`]) until the
//! motor reports motion or has already arrived. A wait that runs out is
//! logged and the move still counts as issued.

use std::ops::RangeInclusive;

use tracing::warn;

use crate::error::{ConfigError, DeviceResult, MotorError};
use crate::policies::{BoundedStartWait, MotionStartPolicy};

use super::{DiscoveryService, MotorBus, MotorKind, MotorSlot};

pub const DEFAULT_STEP_UM: f64 = 1.5;
pub const Z_LIMITS_UM: (f64, f64) = (1.0, 8000.0);
pub const TWISTER_LIMITS: (f64, f64) = (-32767.0, 32767.0);
pub const VELOCITY_RANGE: RangeInclusive<i32> = 1..=10;
pub const DEFAULT_VELOCITY: i32 = 10;

/// Discovery slot conventionally holding the Z motor.
pub const Z_MOTOR_SLOT: usize = 2;

fn check_velocity(name: &str, velocity: i32) -> Result<(), ConfigError> {
    if VELOCITY_RANGE.contains(&velocity) {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            name,
            velocity,
            format!(
                "must be within {}..={}",
                VELOCITY_RANGE.start(),
                VELOCITY_RANGE.end()
            ),
        ))
    }
}

fn check_step(step_um: f64) -> Result<(), ConfigError> {
    if step_um.is_finite() && step_um > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid("StepSize", step_um, "must be positive"))
    }
}

/// Issue every move, then wait for motion to begin.
fn run_and_wait<P: MotionStartPolicy>(
    policy: &P,
    label: &str,
    moves: &mut [(&mut MotorSlot, i32)],
) -> DeviceResult<()> {
    for (slot, target) in moves.iter_mut() {
        let velocity = slot.velocity();
        slot.handle()?.run_to(*target, velocity)?;
    }
    let mut arrived = true;
    for (slot, target) in moves.iter_mut() {
        arrived &= slot.handle()?.position()? == *target;
    }
    if arrived {
        return Ok(());
    }
    let started = policy.wait(|| -> DeviceResult<bool> {
        let mut all_there = true;
        for (slot, target) in moves.iter_mut() {
            let handle = slot.handle()?;
            if handle.is_moving()? {
                return Ok(true);
            }
            all_there &= handle.position()? == *target;
        }
        Ok(all_there)
    })?;
    if !started {
        let targets: Vec<i32> = moves.iter().map(|(_, t)| *t).collect();
        warn!(
            "long wait ({}): no motion within {:?} towards {:?}",
            label,
            policy.ceiling(),
            targets
        );
    }
    Ok(())
}

/// Single-axis focus stage in micrometres.
pub struct ZStage<P: MotionStartPolicy = BoundedStartWait> {
    motor: MotorSlot,
    step_um: f64,
    start: P,
}

impl ZStage<BoundedStartWait> {
    /// Stage on the motor found in the conventional Z slot.
    pub fn from_discovery(discovery: &DiscoveryService) -> Result<Self, MotorError> {
        Ok(Self::new(
            discovery.motor_serial(Z_MOTOR_SLOT)?,
            BoundedStartWait::default_motor(),
        ))
    }
}

impl<P: MotionStartPolicy> ZStage<P> {
    pub fn new(serial: i32, start: P) -> Self {
        Self {
            motor: MotorSlot::new(MotorKind::Motor, serial, DEFAULT_VELOCITY),
            step_um: DEFAULT_STEP_UM,
            start,
        }
    }

    pub fn serial(&self) -> i32 {
        self.motor.serial()
    }

    pub fn initialize(&mut self, bus: &mut dyn MotorBus) -> DeviceResult<()> {
        Ok(self.motor.connect(bus)?)
    }

    pub fn shutdown(&mut self) {
        self.motor.disconnect();
    }

    pub fn is_connected(&self) -> bool {
        self.motor.is_connected()
    }

    pub fn limits(&self) -> (f64, f64) {
        Z_LIMITS_UM
    }

    pub fn step_size(&self) -> f64 {
        self.step_um
    }

    pub fn set_step_size(&mut self, step_um: f64) -> DeviceResult<()> {
        check_step(step_um)?;
        self.step_um = step_um;
        Ok(())
    }

    pub fn velocity(&self) -> i32 {
        self.motor.velocity()
    }

    pub fn set_velocity(&mut self, velocity: i32) -> DeviceResult<()> {
        check_velocity("Velocity", velocity)?;
        Ok(self.motor.set_velocity(velocity)?)
    }

    pub fn is_busy(&mut self) -> DeviceResult<bool> {
        Ok(self.motor.is_moving()?)
    }

    pub fn position_um(&mut self) -> DeviceResult<f64> {
        let steps = self.motor.handle()?.position()?;
        Ok(steps as f64 * self.step_um)
    }

    pub fn set_position_um(&mut self, um: f64) -> DeviceResult<()> {
        let target = (um / self.step_um) as i32;
        run_and_wait(&self.start, "Z stage", &mut [(&mut self.motor, target)])
    }

    pub fn set_relative_position_um(&mut self, delta_um: f64) -> DeviceResult<()> {
        let here = self.position_um()?;
        self.set_position_um(here + delta_um)
    }
}

/// Rotation stage; positions are raw steps.
pub struct Twister<P: MotionStartPolicy = BoundedStartWait> {
    motor: MotorSlot,
    start: P,
}

impl Twister<BoundedStartWait> {
    /// Usually there is only one twister.
    pub fn from_discovery(discovery: &DiscoveryService) -> Result<Self, MotorError> {
        Ok(Self::new(
            discovery.twister_serial(0)?,
            BoundedStartWait::default_motor(),
        ))
    }
}

impl<P: MotionStartPolicy> Twister<P> {
    pub fn new(serial: i32, start: P) -> Self {
        Self {
            motor: MotorSlot::new(MotorKind::Twister, serial, DEFAULT_VELOCITY),
            start,
        }
    }

    pub fn serial(&self) -> i32 {
        self.motor.serial()
    }

    pub fn initialize(&mut self, bus: &mut dyn MotorBus) -> DeviceResult<()> {
        Ok(self.motor.connect(bus)?)
    }

    pub fn shutdown(&mut self) {
        self.motor.disconnect();
    }

    pub fn limits(&self) -> (f64, f64) {
        TWISTER_LIMITS
    }

    pub fn velocity(&self) -> i32 {
        self.motor.velocity()
    }

    pub fn set_velocity(&mut self, velocity: i32) -> DeviceResult<()> {
        check_velocity("Velocity", velocity)?;
        Ok(self.motor.set_velocity(velocity)?)
    }

    pub fn is_busy(&mut self) -> DeviceResult<bool> {
        Ok(self.motor.is_moving()?)
    }

    pub fn position(&mut self) -> DeviceResult<f64> {
        Ok(self.motor.handle()?.position()? as f64)
    }

    pub fn set_position(&mut self, steps: f64) -> DeviceResult<()> {
        let (lo, hi) = TWISTER_LIMITS;
        if !(lo..=hi).contains(&steps) {
            let reason = format!("must be within {}..={}", lo, hi);
            return Err(ConfigError::invalid("Position", steps, reason).into());
        }
        run_and_wait(&self.start, "twister", &mut [(&mut self.motor, steps as i32)])
    }
}

/// Travel range of one XY axis in micrometres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisRange {
    pub min: f64,
    pub max: f64,
    pub step_um: f64,
    /// Mirror positions within `min..=max`.
    pub flip: bool,
}

impl Default for AxisRange {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 8000.0,
            step_um: DEFAULT_STEP_UM,
            flip: false,
        }
    }
}

impl AxisRange {
    fn clamp(&self, um: f64) -> f64 {
        um.clamp(self.min, self.max)
    }

    fn mirror(&self, um: f64) -> f64 {
        if self.flip {
            (self.max - um) + self.min
        } else {
            um
        }
    }

    fn to_steps(&self, um: f64) -> i32 {
        (self.mirror(self.clamp(um)) / self.step_um) as i32
    }

    fn from_steps(&self, steps: i32) -> f64 {
        self.clamp(self.mirror(steps as f64 * self.step_um))
    }

    fn validate(&self, axis: &str) -> Result<(), ConfigError> {
        check_step(self.step_um)?;
        if self.min < self.max {
            Ok(())
        } else {
            Err(ConfigError::invalid(
                format!("{}-Min", axis),
                self.min,
                format!("must be below {}-Max ({})", axis, self.max),
            ))
        }
    }
}

/// Two motors forming an XY stage.
pub struct XyStage<P: MotionStartPolicy = BoundedStartWait> {
    x: MotorSlot,
    y: MotorSlot,
    range_x: AxisRange,
    range_y: AxisRange,
    start: P,
}

impl XyStage<BoundedStartWait> {
    /// X and Y are the first two motors found.
    pub fn from_discovery(discovery: &DiscoveryService) -> Result<Self, MotorError> {
        Ok(Self::new(
            discovery.motor_serial(0)?,
            discovery.motor_serial(1)?,
            BoundedStartWait::default_motor(),
        ))
    }
}

impl<P: MotionStartPolicy> XyStage<P> {
    pub fn new(serial_x: i32, serial_y: i32, start: P) -> Self {
        Self {
            x: MotorSlot::new(MotorKind::Motor, serial_x, DEFAULT_VELOCITY),
            y: MotorSlot::new(MotorKind::Motor, serial_y, DEFAULT_VELOCITY),
            range_x: AxisRange::default(),
            range_y: AxisRange::default(),
            start,
        }
    }

    pub fn serials(&self) -> (i32, i32) {
        (self.x.serial(), self.y.serial())
    }

    /// Connect both motors; a failure names the axis that failed.
    pub fn initialize(&mut self, bus: &mut dyn MotorBus) -> DeviceResult<()> {
        self.x.connect(bus)?;
        self.y.connect(bus)?;
        Ok(())
    }

    pub fn shutdown(&mut self) {
        self.x.disconnect();
        self.y.disconnect();
    }

    pub fn ranges(&self) -> (AxisRange, AxisRange) {
        (self.range_x, self.range_y)
    }

    pub fn set_ranges(&mut self, x: AxisRange, y: AxisRange) -> DeviceResult<()> {
        x.validate("X")?;
        y.validate("Y")?;
        self.range_x = x;
        self.range_y = y;
        Ok(())
    }

    pub fn velocities(&self) -> (i32, i32) {
        (self.x.velocity(), self.y.velocity())
    }

    pub fn set_velocities(&mut self, vx: i32, vy: i32) -> DeviceResult<()> {
        check_velocity("X-Velocity", vx)?;
        check_velocity("Y-Velocity", vy)?;
        self.x.set_velocity(vx)?;
        self.y.set_velocity(vy)?;
        Ok(())
    }

    pub fn is_busy(&mut self) -> DeviceResult<bool> {
        Ok(self.x.is_moving()? || self.y.is_moving()?)
    }

    /// Position in micrometres, clamped into the configured ranges.
    pub fn position_um(&mut self) -> DeviceResult<(f64, f64)> {
        let sx = self.x.handle()?.position()?;
        let sy = self.y.handle()?.position()?;
        Ok((self.range_x.from_steps(sx), self.range_y.from_steps(sy)))
    }

    pub fn set_position_um(&mut self, x: f64, y: f64) -> DeviceResult<()> {
        let tx = self.range_x.to_steps(x);
        let ty = self.range_y.to_steps(y);
        run_and_wait(
            &self.start,
            "XY",
            &mut [(&mut self.x, tx), (&mut self.y, ty)],
        )
    }

    pub fn set_relative_position_um(&mut self, dx: f64, dy: f64) -> DeviceResult<()> {
        let (x, y) = self.position_um()?;
        self.set_position_um(x + dx, y + dy)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::DeviceError;
    use crate::motion::fake::FakeBus;
    use crate::policies::NoStartWait;

    #[test]
    fn test_z_stage_converts_to_steps() {
        let mut bus = FakeBus::default();
        let motor = bus.add(MotorKind::Motor, 4, 6);
        let mut z = ZStage::new(4, NoStartWait);
        z.initialize(&mut bus).unwrap();

        assert_eq!(z.velocity(), 6);
        z.set_position_um(301.0).unwrap();

        assert_eq!(motor.borrow().moves, vec![(200, 6)]);
        assert_eq!(z.position_um().unwrap(), 300.0);
    }

    #[test]
    fn test_z_stage_from_discovery_uses_third_motor() {
        let mut bus = FakeBus::default();
        for serial in [10, 11, 12] {
            bus.add(MotorKind::Motor, serial, 1);
        }
        let mut discovery = DiscoveryService::new();
        discovery.scan(&mut bus).unwrap();
        assert_eq!(ZStage::from_discovery(&discovery).unwrap().serial(), 12);
    }

    #[test]
    fn test_velocity_range_enforced() {
        let mut bus = FakeBus::default();
        let motor = bus.add(MotorKind::Motor, 0, 5);
        let mut z = ZStage::new(0, NoStartWait);
        z.initialize(&mut bus).unwrap();

        assert!(matches!(
            z.set_velocity(11),
            Err(DeviceError::Config(ConfigError::InvalidValue { .. }))
        ));
        z.set_velocity(3).unwrap();
        assert_eq!(motor.borrow().velocity, 3);
    }

    #[test]
    fn test_not_connected() {
        let mut z = ZStage::new(0, NoStartWait);
        assert!(matches!(
            z.position_um(),
            Err(DeviceError::Motor(MotorError::NotConnected))
        ));
        assert!(!z.is_busy().unwrap());
    }

    #[test]
    fn test_connect_failure_reports_serial() {
        let mut bus = FakeBus::default();
        let mut z = ZStage::new(9, NoStartWait);
        assert!(matches!(
            z.initialize(&mut bus),
            Err(DeviceError::Motor(MotorError::Connect { serial: 9, .. }))
        ));
    }

    #[test]
    fn test_slow_start_waits_until_moving() {
        let mut bus = FakeBus::default();
        let motor = bus.add(MotorKind::Twister, 1, 2);
        motor.borrow_mut().start_lag = 3;
        let policy = BoundedStartWait::new(Duration::from_secs(5), Duration::ZERO);
        let mut twister = Twister::new(1, policy);
        twister.initialize(&mut bus).unwrap();

        twister.set_position(90.0).unwrap();

        assert_eq!(motor.borrow().start_lag, 0);
        assert!(twister.is_busy().unwrap());
    }

    #[test]
    fn test_wait_ceiling_still_succeeds() {
        let mut bus = FakeBus::default();
        let motor = bus.add(MotorKind::Twister, 1, 2);
        motor.borrow_mut().start_lag = u32::MAX;
        let policy = BoundedStartWait::new(Duration::from_millis(5), Duration::from_millis(1));
        let mut twister = Twister::new(1, policy);
        twister.initialize(&mut bus).unwrap();

        assert!(twister.set_position(-45.0).is_ok());
        assert!(twister.set_position(40000.0).is_err());
    }

    #[test]
    fn test_xy_flip_and_clamp() {
        let mut bus = FakeBus::default();
        let mx = bus.add(MotorKind::Motor, 0, 5);
        let my = bus.add(MotorKind::Motor, 1, 5);
        let mut xy = XyStage::new(0, 1, NoStartWait);
        xy.initialize(&mut bus).unwrap();
        let flipped = AxisRange {
            flip: true,
            ..AxisRange::default()
        };
        xy.set_ranges(AxisRange::default(), flipped).unwrap();

        xy.set_position_um(9000.0, 1500.0).unwrap();

        // X clamps to 8000 um; Y mirrors 1500 to 6500 um
        assert_eq!(mx.borrow().moves, vec![(5333, 5)]);
        assert_eq!(my.borrow().moves, vec![(4333, 5)]);
        let (x, y) = xy.position_um().unwrap();
        assert!((x - 7999.5).abs() < 1e-9);
        assert!((y - 1500.5).abs() < 1e-9);
    }

    #[test]
    fn test_xy_rejects_inverted_range() {
        let mut xy = XyStage::new(0, 1, NoStartWait);
        let bad = AxisRange {
            min: 10.0,
            max: 5.0,
            ..AxisRange::default()
        };
        assert!(xy.set_ranges(bad, AxisRange::default()).is_err());
    }
}
