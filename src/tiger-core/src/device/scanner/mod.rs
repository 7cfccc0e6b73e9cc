// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Two-axis galvo scanner on a Tiger card.
//!
//! The scanner owns one protocol engine for its card, the per-axis state
//! (unit multiplier, home, soft limits, single-axis mode), the beam flag,
//! the polygon list and the optional ring buffer and SPIM sequencer. Its
//! knobs live in a property registry filled in two phases during
//! [`Scanner::initialize`]: base knobs first, then the knobs gated on the
//! card's build capabilities.

mod props;

use std::fmt;

use tracing::{debug, info, warn};

use crate::capability::{CardCapabilities, FirmwareVersion, FW_2_7};
use crate::choice::YesNo;
use crate::device::polygon::{Playback, PolygonSequencer, Vertex};
use crate::device::property::{
    self, PropertyInfo, PropertyKind, PropertyRegistry, PropertyValue,
};
use crate::error::{CapabilityError, ConfigError, DeviceResult, ProtocolError};
use crate::machines::{RingBuffer, SaMode, SaModeEvent, SaModeMachine, SpimSequencer, TriggerState};
use crate::policies::BusyFailure;
use crate::protocol::{AxisLetter, CardAddress, Command, ProtocolEngine, ACK};
use crate::refresh::{RefreshMode, RefreshPolicy};
use crate::transport::Bus;

/// Status letter of `RS <axis>?` while the axis moves.
const STATUS_BUSY: char = 'B';
/// Status letter of `RS <axis>-` at the upper limit.
const STATUS_UPPER_LIMIT: char = 'U';
/// Native units kept between a clamped move and the upper limit.
const UPPER_LIMIT_MARGIN: f64 = 1.0;

/// One of the scanner's two axes; the argument of per-axis knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    pub const BOTH: [Axis; 2] = [Axis::X, Axis::Y];

    /// Suffix used in knob names.
    pub fn suffix(self) -> &'static str {
        match self {
            Axis::X => "X",
            Axis::Y => "Y",
        }
    }

    fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
        }
    }
}

/// Device name of the form `Scanner:XY:33`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtendedName {
    pub axis_x: AxisLetter,
    pub axis_y: AxisLetter,
    pub address: CardAddress,
}

impl ExtendedName {
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        let bad = |reason: &str| ConfigError::invalid("name", name, reason.to_string());
        let mut parts = name.split(':');
        let (Some(_), Some(letters), Some(hex), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(bad("expected <device>:<axes>:<hex address>"));
        };
        let mut chars = letters.chars();
        let (Some(x), Some(y), None) = (chars.next(), chars.next(), chars.next()) else {
            return Err(bad("expected two axis letters"));
        };
        let axis_x = AxisLetter::new(x).ok_or_else(|| bad("invalid X axis letter"))?;
        let axis_y = AxisLetter::new(y).ok_or_else(|| bad("invalid Y axis letter"))?;
        if axis_x == axis_y {
            return Err(bad("axis letters must differ"));
        }
        let address = CardAddress::from_hex(hex).ok_or_else(|| bad("invalid card address"))?;
        Ok(Self {
            axis_x,
            axis_y,
            address,
        })
    }
}

/// Construction-time options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScannerOptions {
    pub refresh: RefreshPolicy,
    pub busy_failure: BusyFailure,
}

#[derive(Debug, Clone)]
struct AxisState {
    letter: AxisLetter,
    unit_mult: f64,
    home: f64,
    lower: Option<f64>,
    upper: Option<f64>,
    sa_mode: SaModeMachine,
}

impl AxisState {
    fn new(letter: AxisLetter) -> Self {
        Self {
            letter,
            unit_mult: 1.0,
            home: 0.0,
            lower: None,
            upper: None,
            sa_mode: SaModeMachine::new(),
        }
    }

    /// Clamp into the soft limits once both are known and ordered.
    fn clamp(&self, value: f64) -> f64 {
        match (self.lower, self.upper) {
            (Some(lo), Some(hi)) if lo < hi => value.clamp(lo, hi),
            _ => value,
        }
    }

    /// Native move target for `value`.
    ///
    /// A move clamped onto the upper limit stops one native step short of
    /// it; both axes sitting at the upper limit read as beam off.
    fn native_target(&self, value: f64) -> f64 {
        let clamped = self.clamp(value);
        match (self.lower, self.upper) {
            (Some(lo), Some(hi)) if lo < hi && clamped >= hi => {
                hi * self.unit_mult - UPPER_LIMIT_MARGIN * self.unit_mult.signum()
            }
            _ => clamped * self.unit_mult,
        }
    }
}

pub struct Scanner {
    name: String,
    engine: ProtocolEngine,
    axes: [AxisState; 2],
    firmware: FirmwareVersion,
    capabilities: CardCapabilities,
    busy_failure: BusyFailure,
    beam_on: bool,
    last_position: Vertex,
    polygon: PolygonSequencer,
    ring_buffer: Option<RingBuffer>,
    spim: Option<SpimSequencer>,
    registry: PropertyRegistry<Scanner, Axis>,
    initialized: bool,
}

impl fmt::Debug for Scanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scanner")
            .field("name", &self.name)
            .field("address", &self.engine.address())
            .field("firmware", &self.firmware)
            .field("capabilities", &self.capabilities)
            .field("beam_on", &self.beam_on)
            .field("initialized", &self.initialized)
            .finish()
    }
}

fn registry_of(scanner: &mut Scanner) -> &mut PropertyRegistry<Scanner, Axis> {
    &mut scanner.registry
}

impl Scanner {
    /// Build a scanner from an extended name such as `Scanner:XY:33`.
    pub fn from_name(bus: Bus, name: &str, options: ScannerOptions) -> Result<Self, ConfigError> {
        let ext = ExtendedName::parse(name)?;
        Ok(Self::new(bus, name, ext, options))
    }

    pub fn new(bus: Bus, name: &str, ext: ExtendedName, options: ScannerOptions) -> Self {
        let mut registry = PropertyRegistry::new();
        registry.set_policy(options.refresh);
        Self {
            name: name.to_string(),
            engine: ProtocolEngine::new(bus, ext.address),
            axes: [AxisState::new(ext.axis_x), AxisState::new(ext.axis_y)],
            firmware: FirmwareVersion::from_hundredths(0),
            capabilities: CardCapabilities::default(),
            busy_failure: options.busy_failure,
            beam_on: true,
            last_position: (0.0, 0.0),
            polygon: PolygonSequencer::new(false),
            ring_buffer: None,
            spim: None,
            registry,
            initialized: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> CardAddress {
        self.engine.address()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn firmware(&self) -> FirmwareVersion {
        self.firmware
    }

    pub fn capabilities(&self) -> CardCapabilities {
        self.capabilities
    }

    pub fn axis_letter(&self, axis: Axis) -> AxisLetter {
        self.axis(axis).letter
    }

    /// Native units per engineering unit.
    pub fn unit_multiplier(&self, axis: Axis) -> f64 {
        self.axis(axis).unit_mult
    }

    /// Beam-off park position reported by `HM`.
    pub fn home(&self, axis: Axis) -> f64 {
        self.axis(axis).home
    }

    pub fn sa_mode(&self, axis: Axis) -> SaMode {
        self.axis(axis).sa_mode.state()
    }

    /// Cached beam flag, without inference.
    pub fn beam_on(&self) -> bool {
        self.beam_on
    }

    /// Host-visible channel name, e.g. `Axes_XY`.
    pub fn channel(&self) -> String {
        format!("Axes_{}{}", self.axes[0].letter, self.axes[1].letter)
    }

    fn axis(&self, axis: Axis) -> &AxisState {
        &self.axes[axis.index()]
    }

    fn axis_mut(&mut self, axis: Axis) -> &mut AxisState {
        &mut self.axes[axis.index()]
    }

    /// One-time handshake and capability discovery.
    pub fn initialize(&mut self) -> DeviceResult<()> {
        if self.initialized {
            return Ok(());
        }

        self.firmware = FirmwareVersion::query(&mut self.engine)?;
        for axis in Axis::BOTH {
            let letter = self.axis(axis).letter;
            let unit_mult: f64 = self
                .engine
                .query_value(&Command::new("UM").query(letter), ":")?;
            if unit_mult == 0.0 {
                return Err(ProtocolError::MalformedAnswer {
                    answer: unit_mult.to_string(),
                    reason: format!("zero unit multiplier on axis {}", letter),
                }
                .into());
            }
            let home: f64 = self
                .engine
                .query_value(&Command::new("HM").query(letter), ":")?;
            let state = self.axis_mut(axis);
            state.unit_mult = unit_mult;
            state.home = home;
        }
        // one decimal place in position answers
        self.engine
            .query(&Command::card(self.address(), "VB").set(AxisLetter::Z, 1))?;

        let base = self.registry.len();
        props::register_base(self);
        self.fill_cache(base)?;

        self.capabilities = CardCapabilities::discover(&mut self.engine, self.firmware)?;
        self.polygon = PolygonSequencer::new(self.capabilities.ring_buffer);
        let gated = self.registry.len();
        if self.capabilities.spim {
            self.spim = Some(SpimSequencer::new(self.address()));
            props::register_spim(self);
        }
        if self.capabilities.ring_buffer {
            self.ring_buffer = Some(RingBuffer::new(self.address()));
            props::register_ring_buffer(self);
        }
        self.fill_cache(gated)?;

        self.initialized = true;
        info!(
            "{} on card {}: firmware {}, {} knobs, spim={}, ring_buffer={}",
            self.name,
            self.address(),
            self.firmware,
            self.registry.len(),
            self.capabilities.spim,
            self.capabilities.ring_buffer
        );
        Ok(())
    }

    /// Read every knob registered at or after position `from`.
    fn fill_cache(&mut self, from: usize) -> DeviceResult<()> {
        let names = self.registry.names();
        for name in names.iter().skip(from) {
            if self.registry.needs_query(name, RefreshMode::Cached)? {
                let value = property::get_property(self, registry_of, name, RefreshMode::Cached)?;
                debug!("{} {} = {}", self.name, name, value);
            }
        }
        Ok(())
    }

    /// Whether either axis is moving.
    pub fn is_busy(&mut self) -> DeviceResult<bool> {
        match self.query_busy() {
            Ok(busy) => Ok(busy),
            Err(e) => {
                if self.busy_failure == BusyFailure::FailOpen {
                    warn!("{}: busy check failed, reporting idle: {}", self.name, e);
                }
                self.busy_failure.resolve(e)
            }
        }
    }

    fn query_busy(&mut self) -> DeviceResult<bool> {
        for axis in Axis::BOTH {
            let cmd = Command::new("RS").query(self.axis(axis).letter);
            if self.engine.query_status(&cmd)? == STATUS_BUSY {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Move the beam, in engineering units.
    ///
    /// Does nothing while the beam is off. Axes running a single-axis
    /// waveform are left alone.
    pub fn set_position(&mut self, x: f64, y: f64) -> DeviceResult<()> {
        if !self.beam_on {
            debug!("{}: beam off, position ({}, {}) ignored", self.name, x, y);
            return Ok(());
        }
        for (axis, value) in [(Axis::X, x), (Axis::Y, y)] {
            let state = self.axis(axis);
            if !state.sa_mode.allows_motion() {
                debug!(
                    "{}: axis {} in {:?}, not moved",
                    self.name,
                    state.letter,
                    state.sa_mode.state()
                );
                continue;
            }
            let native = state.native_target(value);
            let cmd = Command::new("M").set(state.letter, native);
            self.engine.command(&cmd)?;
        }
        Ok(())
    }

    /// Current beam position in engineering units.
    pub fn get_position(&mut self) -> DeviceResult<Vertex> {
        Ok((self.read_axis(Axis::X)?, self.read_axis(Axis::Y)?))
    }

    fn read_axis(&mut self, axis: Axis) -> DeviceResult<f64> {
        let state = self.axis(axis);
        let (letter, unit_mult) = (state.letter, state.unit_mult);
        let answer = self
            .engine
            .query_verify(&Command::new("W").axis(letter), ACK)?;
        let native: f64 = answer.after_position(2)?;
        Ok(native / unit_mult)
    }

    /// Infer the beam state from the limit status of both axes.
    ///
    /// Both axes parked at their upper limit means the beam is off. Older
    /// firmware cannot report this; communication failures keep the cached
    /// flag.
    pub fn update_illumination(&mut self) -> bool {
        if !self.firmware.newer_than(FW_2_7) {
            return self.beam_on;
        }
        match self.both_at_upper_limit() {
            Ok(parked) => self.beam_on = !parked,
            Err(e) => debug!("{}: illumination check failed: {}", self.name, e),
        }
        self.beam_on
    }

    fn both_at_upper_limit(&mut self) -> DeviceResult<bool> {
        for axis in Axis::BOTH {
            let cmd = Command::new("RS").axis_minus(self.axis(axis).letter);
            if self.engine.query_status(&cmd)? != STATUS_UPPER_LIMIT {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Switch the beam on or off.
    ///
    /// Turning it off remembers the position and parks both axes, which
    /// also stops any single-axis waveform. Turning it on returns to the
    /// remembered position. Asking for the cached state sends nothing.
    pub fn set_illumination(&mut self, on: bool) -> DeviceResult<()> {
        match (self.beam_on, on) {
            (false, true) => {
                self.beam_on = true;
                let (x, y) = self.last_position;
                info!("{}: beam on at ({}, {})", self.name, x, y);
                if let Err(e) = self.set_position(x, y) {
                    self.beam_on = false;
                    return Err(e);
                }
                Ok(())
            }
            (true, false) => {
                self.last_position = self.get_position()?;
                let cmd = Command::new("!")
                    .axis(self.axes[0].letter)
                    .axis(self.axes[1].letter);
                self.engine.command(&cmd)?;
                self.beam_on = false;
                for axis in Axis::BOTH {
                    self.axis_mut(axis).sa_mode.process_event(SaModeEvent::BeamOff);
                    let name = format!("SAMode{}", axis.suffix());
                    self.registry
                        .store(&name, PropertyValue::choice(SaMode::Disabled));
                }
                info!("{}: beam off", self.name);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    pub fn polygons(&self) -> &[Vertex] {
        self.polygon.vertices()
    }

    pub fn add_polygon_vertex(&mut self, index: usize, x: f64, y: f64) {
        self.polygon.add_vertex(index, x, y);
    }

    pub fn delete_polygons(&mut self) {
        self.polygon.clear();
    }

    pub fn set_polygon_repetitions(&mut self, repetitions: u32) -> DeviceResult<()> {
        Ok(self.polygon.set_repetitions(repetitions)?)
    }

    /// Download the vertex list into the ring buffer, if there is one.
    pub fn load_polygons(&mut self) -> DeviceResult<()> {
        let Some(ring_buffer) = self.ring_buffer.as_ref() else {
            return Ok(());
        };
        ring_buffer.clear(&mut self.engine)?;
        let [ax, ay] = &self.axes;
        for &(x, y) in self.polygon.load_plan() {
            ring_buffer.load_point(
                &mut self.engine,
                (ax.letter, x * ax.unit_mult),
                (ay.letter, y * ay.unit_mult),
            )?;
        }
        debug!("{}: loaded {} vertices", self.name, self.polygon.load_plan().len());
        Ok(())
    }

    pub fn run_polygons(&mut self) -> DeviceResult<()> {
        match self.polygon.playback() {
            Playback::Hardware => self.fire_ring_buffer().map(|_| ()),
            Playback::Software {
                repetitions,
                vertices,
            } => {
                for _ in 0..repetitions {
                    for &(x, y) in &vertices {
                        self.set_position(x, y)?;
                    }
                }
                Ok(())
            }
        }
    }

    /// Start the hardware sequence.
    pub fn run_sequence(&mut self) -> DeviceResult<()> {
        if self.ring_buffer.is_none() {
            return Err(CapabilityError::unsupported("run sequence without ring buffer").into());
        }
        let state = self.fire_ring_buffer()?;
        self.registry
            .store("RingBufferTrigger", PropertyValue::choice(state));
        Ok(())
    }

    fn fire_ring_buffer(&mut self) -> DeviceResult<TriggerState> {
        match self.ring_buffer.as_mut() {
            Some(ring_buffer) => ring_buffer.fire(&mut self.engine),
            None => Err(CapabilityError::unsupported("ring buffer trigger").into()),
        }
    }

    pub fn property_names(&self) -> Vec<String> {
        self.registry.names()
    }

    pub fn property_info(&self, name: &str) -> Result<PropertyInfo, ConfigError> {
        self.registry.info(name)
    }

    pub fn refresh_policy(&self) -> RefreshPolicy {
        self.registry.policy()
    }

    pub fn set_refresh_policy(&mut self, policy: RefreshPolicy) {
        self.registry.set_policy(policy);
        let always = policy == RefreshPolicy::Always;
        self.registry.store(
            "RefreshPropertyValues",
            PropertyValue::choice(YesNo::from(always)),
        );
    }

    pub fn get_property(&mut self, name: &str, mode: RefreshMode) -> DeviceResult<PropertyValue> {
        property::get_property(self, registry_of, name, mode)
    }

    pub fn set_property(&mut self, name: &str, value: PropertyValue) -> DeviceResult<PropertyValue> {
        property::set_property(self, registry_of, name, value)
    }

    /// Parse `raw` according to the knob's kind, then set it.
    pub fn set_property_str(&mut self, name: &str, raw: &str) -> DeviceResult<PropertyValue> {
        let kind = self.registry.kind(name)?;
        let value = PropertyValue::parse(kind, raw).ok_or_else(|| {
            let expected = match kind {
                PropertyKind::Float => "expected a number",
                PropertyKind::Integer => "expected an integer",
                PropertyKind::Text => "expected text",
            };
            ConfigError::invalid(name, raw, expected)
        })?;
        self.set_property(name, value)
    }

    /// Re-read every gettable knob from hardware.
    pub fn refresh_all(&mut self) -> DeviceResult<()> {
        for name in self.registry.names() {
            property::get_property(self, registry_of, &name, RefreshMode::ForceImmediate)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
