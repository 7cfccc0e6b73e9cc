// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Scanner knob table and handlers.

use std::time::Duration;

use crate::bitfield::{RegisterField, SA_PATTERN_VERB};
use crate::capability::FW_2_7;
use crate::choice::{
    Choice, ClockPolarity, ClockSource, InputMode, JoystickInput, SaPattern, SaveSettings,
    TtlOutput, TtlPolarity, YesNo,
};
use crate::device::property::{Constraint, PropertyKind, PropertySpec, PropertyValue};
use crate::error::{CapabilityError, ConfigError, DeviceResult, ProtocolError};
use crate::machines::spim::{decode_sides, encode_sides};
use crate::machines::{RingBufferMode, SaMode, SpimSide, SpimState, TriggerState};
use crate::protocol::{AnswerValue, AxisLetter, Command, Operand, ACK};
use crate::refresh::RefreshPolicy;

use super::{Axis, Scanner};

use PropertyKind::{Float, Integer, Text};

const SAVE_SETTLE: Duration = Duration::from_millis(200);

type Spec = PropertySpec<Scanner, Axis>;

fn per_axis(name: &str, kind: PropertyKind, build: impl Fn(Spec) -> Spec) -> [Spec; 2] {
    Axis::BOTH.map(|axis| build(Spec::new(format!("{}{}", name, axis.suffix()), kind, axis)))
}

pub(super) fn register_base(s: &mut Scanner) {
    let mut specs = vec![
        Spec::new("RefreshPropertyValues", Text, Axis::X)
            .constraint(Constraint::choices::<YesNo>())
            .initial(PropertyValue::choice(YesNo::from(
                s.registry.policy() == RefreshPolicy::Always,
            )))
            .setter(set_refresh),
        Spec::new("SaveCardSettings", Text, Axis::X)
            .constraint(Constraint::choices::<SaveSettings>())
            .initial(PropertyValue::choice(SaveSettings::NoAction))
            .setter(save_settings),
        Spec::new("InputMode", Text, Axis::X)
            .constraint(Constraint::choices::<InputMode>())
            .getter(get_input_mode)
            .setter(set_input_mode),
        Spec::new("JoystickFastSpeed", Float, Axis::X)
            .constraint(Constraint::range(0.0, 100.0))
            .getter(get_joystick_speed)
            .setter(set_joystick_speed),
        Spec::new("JoystickSlowSpeed", Float, Axis::Y)
            .constraint(Constraint::range(0.0, 100.0))
            .getter(get_joystick_speed)
            .setter(set_joystick_speed),
        Spec::new("JoystickReverse", Text, Axis::X)
            .constraint(Constraint::choices::<YesNo>())
            .getter(get_joystick_reverse)
            .setter(set_joystick_reverse),
        Spec::new("BeamEnabled", Text, Axis::X)
            .constraint(Constraint::choices::<YesNo>())
            .always_refresh()
            .getter(get_beam)
            .setter(set_beam),
    ];
    specs.extend(per_axis("LowerLimit", Float, |p| {
        p.getter(get_lower_limit).setter(set_lower_limit)
    }));
    specs.extend(per_axis("UpperLimit", Float, |p| {
        p.getter(get_upper_limit).setter(set_upper_limit)
    }));
    specs.extend(per_axis("FilterFreq", Float, |p| {
        p.constraint(Constraint::range(0.1, 650.0))
            .getter(get_filter)
            .setter(set_filter)
    }));
    specs.extend(per_axis("AttenuateTravel", Float, |p| {
        p.constraint(Constraint::range(0.0, 1.0))
            .getter(get_attenuate)
            .setter(set_attenuate)
    }));
    specs.extend(per_axis("JoystickInput", Text, |p| {
        p.constraint(Constraint::choices::<JoystickInput>())
            .getter(get_joystick_input)
            .setter(set_joystick_input)
    }));
    specs.extend(per_axis("SAAmplitude", Float, |p| {
        p.getter(get_sa_amplitude).setter(set_sa_amplitude)
    }));
    specs.extend(per_axis("SAOffset", Float, |p| {
        p.getter(get_sa_offset).setter(set_sa_offset)
    }));
    specs.extend(per_axis("SAPeriod", Integer, |p| {
        p.getter(get_sa_period).setter(set_sa_period)
    }));
    specs.extend(per_axis("SAMode", Text, |p| {
        p.constraint(Constraint::choices::<SaMode>())
            .getter(get_sa_mode)
            .setter(set_sa_mode)
    }));
    specs.extend(per_axis("SAPattern", Text, register_field::<SaPattern>));
    specs.extend(per_axis("SAClockSource", Text, register_field::<ClockSource>));
    specs.extend(per_axis("SAClockPolarity", Text, register_field::<ClockPolarity>));
    specs.extend(per_axis("SATTLOutput", Text, register_field::<TtlOutput>));
    specs.extend(per_axis("SATTLPolarity", Text, register_field::<TtlPolarity>));
    specs.extend(per_axis("SAPatternByte", Integer, |p| {
        p.constraint(Constraint::range(0.0, 255.0))
            .always_refresh()
            .getter(get_sa_pattern_byte)
            .setter(set_sa_pattern_byte)
    }));

    for spec in specs {
        s.registry.register(spec);
    }
}

pub(super) fn register_spim(s: &mut Scanner) {
    let specs = [
        Spec::new("SPIMScansPerSlice", Integer, Axis::X)
            .constraint(Constraint::range(1.0, 100.0))
            .getter(get_scans_per_slice)
            .setter(set_scans_per_slice),
        Spec::new("SPIMNumSlices", Integer, Axis::X)
            .constraint(Constraint::range(1.0, 100.0))
            .getter(get_num_slices)
            .setter(set_num_slices),
        Spec::new("SPIMNumRepeats", Integer, Axis::X)
            .constraint(Constraint::range(1.0, 100.0))
            .getter(get_num_repeats)
            .setter(set_num_repeats),
        Spec::new("SPIMNumSides", Integer, Axis::X)
            .constraint(Constraint::range(1.0, 2.0))
            .getter(get_num_sides)
            .setter(set_num_sides),
        Spec::new("SPIMFirstSide", Text, Axis::X)
            .constraint(Constraint::choices::<SpimSide>())
            .getter(get_first_side)
            .setter(set_first_side),
        // NV Y is the delay before each side, NV X before each slice
        Spec::new("SPIMDelayBeforeSide", Float, Axis::Y)
            .constraint(Constraint::range(0.0, 100.0))
            .getter(get_spim_delay)
            .setter(set_spim_delay),
        Spec::new("SPIMDelayBeforeSlice", Float, Axis::X)
            .constraint(Constraint::range(0.0, 100.0))
            .getter(get_spim_delay)
            .setter(set_spim_delay),
        Spec::new("SPIMState", Text, Axis::X)
            .constraint(Constraint::choices::<SpimState>())
            .getter(get_spim_state)
            .setter(set_spim_state),
    ];
    for spec in specs {
        s.registry.register(spec);
    }
}

pub(super) fn register_ring_buffer(s: &mut Scanner) {
    let specs = [
        Spec::new("RingBufferMode", Text, Axis::X)
            .constraint(Constraint::choices::<RingBufferMode>())
            .getter(get_ring_mode)
            .setter(set_ring_mode),
        Spec::new("RingBufferDelay", Integer, Axis::X)
            .getter(get_ring_delay)
            .setter(set_ring_delay),
        Spec::new("RingBufferTrigger", Text, Axis::X)
            .constraint(Constraint::choices::<TriggerState>())
            .always_refresh()
            .getter(get_ring_trigger)
            .setter(set_ring_trigger),
        Spec::new("RingBufferRunning", Text, Axis::X)
            .constraint(Constraint::choices::<YesNo>())
            .getter(get_ring_running)
            .setter(refresh_ring_running),
    ];
    for spec in specs {
        s.registry.register(spec);
    }
}

// helpers

fn letter(s: &Scanner, axis: Axis) -> AxisLetter {
    s.axis(axis).letter
}

fn expect_prefix(letter: AxisLetter) -> String {
    format!("{} {}=", ACK, letter)
}

fn query_axis<T: AnswerValue>(
    s: &mut Scanner,
    verb: &str,
    axis: Axis,
) -> DeviceResult<T> {
    let letter = letter(s, axis);
    s.engine
        .query_value(&Command::new(verb).query(letter), &expect_prefix(letter))
}

fn write_axis(s: &mut Scanner, verb: &str, axis: Axis, value: impl Into<Operand>) -> DeviceResult<()> {
    let letter = letter(s, axis);
    s.engine.command(&Command::new(verb).set(letter, value))
}

fn query_card<T: AnswerValue>(
    s: &mut Scanner,
    verb: &str,
    operand: AxisLetter,
) -> DeviceResult<T> {
    let cmd = Command::card(s.address(), verb).query(operand);
    s.engine.query_value(&cmd, &expect_prefix(operand))
}

fn write_card(s: &mut Scanner, verb: &str, operand: AxisLetter, value: impl Into<Operand>) -> DeviceResult<()> {
    let cmd = Command::card(s.address(), verb).set(operand, value);
    s.engine.command(&cmd)
}

fn float(value: &PropertyValue) -> f64 {
    value.as_f64().unwrap_or_default()
}

fn int(value: &PropertyValue) -> i64 {
    value.as_i64().unwrap_or_default()
}

/// Setter input has already been checked against the label list.
fn choice<C: Choice>(value: &PropertyValue) -> Result<C, ConfigError> {
    value
        .as_choice::<C>()
        .ok_or_else(|| ConfigError::invalid("choice", value, "not a known label"))
}

fn malformed(answer: impl ToString, reason: &str) -> ProtocolError {
    ProtocolError::MalformedAnswer {
        answer: answer.to_string(),
        reason: reason.to_string(),
    }
}

fn cached_choice<C: Choice>(s: &Scanner, name: &str) -> Option<C> {
    s.registry.cached(name).and_then(|v| v.as_choice::<C>())
}

// card-wide knobs

fn set_refresh(s: &mut Scanner, _: Axis, value: PropertyValue) -> DeviceResult<PropertyValue> {
    let always: bool = choice::<YesNo>(&value)?.into();
    s.registry.set_policy(RefreshPolicy::from(always));
    Ok(value)
}

fn save_settings(s: &mut Scanner, _: Axis, value: PropertyValue) -> DeviceResult<PropertyValue> {
    let Some(operand) = choice::<SaveSettings>(&value)?.operand() else {
        return Ok(value);
    };
    let operand = AxisLetter::new(operand).ok_or_else(|| malformed(operand, "bad operand"))?;
    let cmd = Command::card(s.address(), "SS").axis(operand);
    s.engine.query_verify_settled(&cmd, ACK, SAVE_SETTLE)?;
    Ok(PropertyValue::choice(SaveSettings::Done))
}

/// `PM` on newer firmware, inverted `MA` before that.
fn uses_pm(s: &Scanner) -> bool {
    s.firmware.newer_than(FW_2_7)
}

fn get_input_mode(s: &mut Scanner, _: Axis) -> DeviceResult<PropertyValue> {
    let verb = if uses_pm(s) { "PM" } else { "MA" };
    let code: i64 = query_axis(s, verb, Axis::X)?;
    let code = if uses_pm(s) { code } else { 1 - code };
    let mode = InputMode::from_code(code).ok_or_else(|| malformed(code, "unknown input mode"))?;
    Ok(PropertyValue::choice(mode))
}

fn set_input_mode(s: &mut Scanner, _: Axis, value: PropertyValue) -> DeviceResult<PropertyValue> {
    let mode = choice::<InputMode>(&value)?;
    let (verb, code) = if uses_pm(s) {
        ("PM", mode.code())
    } else {
        ("MA", 1 - mode.code())
    };
    let cmd = Command::new(verb)
        .set(letter(s, Axis::X), code)
        .set(letter(s, Axis::Y), code);
    s.engine.command(&cmd)?;
    Ok(value)
}

// JS X is the fast speed, JS Y the slow one; a negative sign mirrors both

fn joystick_operand(axis: Axis) -> AxisLetter {
    match axis {
        Axis::X => AxisLetter::X,
        Axis::Y => AxisLetter::Y,
    }
}

fn joystick_mirrored(s: &Scanner) -> bool {
    cached_choice::<YesNo>(s, "JoystickReverse").is_some_and(bool::from)
}

fn get_joystick_speed(s: &mut Scanner, axis: Axis) -> DeviceResult<PropertyValue> {
    let speed: f64 = query_card(s, "JS", joystick_operand(axis))?;
    Ok(PropertyValue::Float(speed.abs()))
}

fn set_joystick_speed(s: &mut Scanner, axis: Axis, value: PropertyValue) -> DeviceResult<PropertyValue> {
    let speed = float(&value);
    let signed = if joystick_mirrored(s) { -speed } else { speed };
    write_card(s, "JS", joystick_operand(axis), signed)?;
    Ok(value)
}

fn get_joystick_reverse(s: &mut Scanner, _: Axis) -> DeviceResult<PropertyValue> {
    let fast: f64 = query_card(s, "JS", AxisLetter::X)?;
    Ok(PropertyValue::choice(YesNo::from(fast < 0.0)))
}

fn set_joystick_reverse(s: &mut Scanner, _: Axis, value: PropertyValue) -> DeviceResult<PropertyValue> {
    let mirrored: bool = choice::<YesNo>(&value)?.into();
    let speed = |name: &str| s.registry.cached(name).and_then(|v| v.as_f64()).unwrap_or_default();
    let (fast, slow) = (speed("JoystickFastSpeed"), speed("JoystickSlowSpeed"));
    let sign = if mirrored { -1.0 } else { 1.0 };
    let cmd = Command::card(s.address(), "JS")
        .set(AxisLetter::X, sign * fast)
        .set(AxisLetter::Y, sign * slow);
    s.engine.command(&cmd)?;
    Ok(value)
}

fn get_beam(s: &mut Scanner, _: Axis) -> DeviceResult<PropertyValue> {
    Ok(PropertyValue::choice(YesNo::from(s.update_illumination())))
}

fn set_beam(s: &mut Scanner, _: Axis, value: PropertyValue) -> DeviceResult<PropertyValue> {
    s.set_illumination(choice::<YesNo>(&value)?.into())?;
    Ok(PropertyValue::choice(YesNo::from(s.beam_on)))
}

// per-axis knobs

fn get_lower_limit(s: &mut Scanner, axis: Axis) -> DeviceResult<PropertyValue> {
    let v: f64 = query_axis(s, "SL", axis)?;
    s.axis_mut(axis).lower = Some(v);
    Ok(PropertyValue::Float(v))
}

fn set_lower_limit(s: &mut Scanner, axis: Axis, value: PropertyValue) -> DeviceResult<PropertyValue> {
    write_axis(s, "SL", axis, float(&value))?;
    s.axis_mut(axis).lower = Some(float(&value));
    Ok(value)
}

fn get_upper_limit(s: &mut Scanner, axis: Axis) -> DeviceResult<PropertyValue> {
    let v: f64 = query_axis(s, "SU", axis)?;
    s.axis_mut(axis).upper = Some(v);
    Ok(PropertyValue::Float(v))
}

fn set_upper_limit(s: &mut Scanner, axis: Axis, value: PropertyValue) -> DeviceResult<PropertyValue> {
    write_axis(s, "SU", axis, float(&value))?;
    s.axis_mut(axis).upper = Some(float(&value));
    Ok(value)
}

/// The filter answer carries no ack, only `:<axis>=`.
fn get_filter(s: &mut Scanner, axis: Axis) -> DeviceResult<PropertyValue> {
    let letter = letter(s, axis);
    let v: f64 = s
        .engine
        .query_value(&Command::new("B").query(letter), &format!(":{}=", letter))?;
    Ok(PropertyValue::Float(v))
}

fn set_filter(s: &mut Scanner, axis: Axis, value: PropertyValue) -> DeviceResult<PropertyValue> {
    write_axis(s, "B", axis, float(&value))?;
    Ok(value)
}

fn get_attenuate(s: &mut Scanner, axis: Axis) -> DeviceResult<PropertyValue> {
    Ok(PropertyValue::Float(query_axis(s, "D", axis)?))
}

fn set_attenuate(s: &mut Scanner, axis: Axis, value: PropertyValue) -> DeviceResult<PropertyValue> {
    write_axis(s, "D", axis, float(&value))?;
    Ok(value)
}

/// Codes outside the table keep whatever was shown before.
fn get_joystick_input(s: &mut Scanner, axis: Axis) -> DeviceResult<PropertyValue> {
    let code: i64 = query_axis(s, "J", axis)?;
    let input = JoystickInput::from_code(code)
        .or_else(|| cached_choice(s, &format!("JoystickInput{}", axis.suffix())))
        .unwrap_or(JoystickInput::None);
    Ok(PropertyValue::choice(input))
}

fn set_joystick_input(s: &mut Scanner, axis: Axis, value: PropertyValue) -> DeviceResult<PropertyValue> {
    write_axis(s, "J", axis, choice::<JoystickInput>(&value)?.code())?;
    Ok(value)
}

fn get_scaled(s: &mut Scanner, verb: &str, axis: Axis) -> DeviceResult<PropertyValue> {
    let native: f64 = query_axis(s, verb, axis)?;
    Ok(PropertyValue::Float(native / s.axis(axis).unit_mult))
}

fn set_scaled(s: &mut Scanner, verb: &str, axis: Axis, value: PropertyValue) -> DeviceResult<PropertyValue> {
    let native = float(&value) * s.axis(axis).unit_mult;
    write_axis(s, verb, axis, native)?;
    Ok(value)
}

fn get_sa_amplitude(s: &mut Scanner, axis: Axis) -> DeviceResult<PropertyValue> {
    get_scaled(s, "SAA", axis)
}

fn set_sa_amplitude(s: &mut Scanner, axis: Axis, value: PropertyValue) -> DeviceResult<PropertyValue> {
    set_scaled(s, "SAA", axis, value)
}

fn get_sa_offset(s: &mut Scanner, axis: Axis) -> DeviceResult<PropertyValue> {
    get_scaled(s, "SAO", axis)
}

fn set_sa_offset(s: &mut Scanner, axis: Axis, value: PropertyValue) -> DeviceResult<PropertyValue> {
    set_scaled(s, "SAO", axis, value)
}

fn get_sa_period(s: &mut Scanner, axis: Axis) -> DeviceResult<PropertyValue> {
    Ok(PropertyValue::Integer(query_axis(s, "SAF", axis)?))
}

fn set_sa_period(s: &mut Scanner, axis: Axis, value: PropertyValue) -> DeviceResult<PropertyValue> {
    write_axis(s, "SAF", axis, int(&value))?;
    Ok(value)
}

fn get_sa_mode(s: &mut Scanner, axis: Axis) -> DeviceResult<PropertyValue> {
    let letter = letter(s, axis);
    let mode = s.axes[axis.index()].sa_mode.refresh(&mut s.engine, letter)?;
    Ok(PropertyValue::choice(mode))
}

fn set_sa_mode(s: &mut Scanner, axis: Axis, value: PropertyValue) -> DeviceResult<PropertyValue> {
    let requested = choice::<SaMode>(&value)?;
    let (letter, beam_on) = (letter(s, axis), s.beam_on);
    let mode = s.axes[axis.index()]
        .sa_mode
        .request(&mut s.engine, letter, requested, beam_on)?;
    Ok(PropertyValue::choice(mode))
}

fn register_field<V: RegisterField>(spec: Spec) -> Spec {
    spec.constraint(Constraint::choices::<V>())
        .getter(get_register_field::<V>)
        .setter(set_register_field::<V>)
}

fn get_register_field<V: RegisterField>(s: &mut Scanner, axis: Axis) -> DeviceResult<PropertyValue> {
    let letter = letter(s, axis);
    Ok(PropertyValue::choice(V::FIELD.read(&mut s.engine, letter)?))
}

fn set_register_field<V: RegisterField>(
    s: &mut Scanner,
    axis: Axis,
    value: PropertyValue,
) -> DeviceResult<PropertyValue> {
    let letter = letter(s, axis);
    let register = V::FIELD.write(&mut s.engine, letter, choice::<V>(&value)?)?;
    s.registry.store(
        &format!("SAPatternByte{}", axis.suffix()),
        PropertyValue::Integer(register),
    );
    Ok(value)
}

fn get_sa_pattern_byte(s: &mut Scanner, axis: Axis) -> DeviceResult<PropertyValue> {
    Ok(PropertyValue::Integer(query_axis(s, SA_PATTERN_VERB, axis)?))
}

fn set_sa_pattern_byte(s: &mut Scanner, axis: Axis, value: PropertyValue) -> DeviceResult<PropertyValue> {
    write_axis(s, SA_PATTERN_VERB, axis, int(&value))?;
    Ok(value)
}

// SPIM

fn get_scans_per_slice(s: &mut Scanner, _: Axis) -> DeviceResult<PropertyValue> {
    Ok(PropertyValue::Integer(query_card(s, "NR", AxisLetter::X)?))
}

fn set_scans_per_slice(s: &mut Scanner, _: Axis, value: PropertyValue) -> DeviceResult<PropertyValue> {
    write_card(s, "NR", AxisLetter::X, int(&value))?;
    Ok(value)
}

fn get_num_slices(s: &mut Scanner, _: Axis) -> DeviceResult<PropertyValue> {
    Ok(PropertyValue::Integer(query_card(s, "NR", AxisLetter::Y)?))
}

fn set_num_slices(s: &mut Scanner, _: Axis, value: PropertyValue) -> DeviceResult<PropertyValue> {
    write_card(s, "NR", AxisLetter::Y, int(&value))?;
    Ok(value)
}

fn get_num_repeats(s: &mut Scanner, _: Axis) -> DeviceResult<PropertyValue> {
    Ok(PropertyValue::Integer(query_card(s, "NR", AxisLetter::F)?))
}

fn set_num_repeats(s: &mut Scanner, _: Axis, value: PropertyValue) -> DeviceResult<PropertyValue> {
    write_card(s, "NR", AxisLetter::F, int(&value))?;
    Ok(value)
}

fn query_sides(s: &mut Scanner) -> DeviceResult<(i64, SpimSide)> {
    let code: i64 = query_card(s, "NR", AxisLetter::Z)?;
    Ok(decode_sides(code))
}

fn get_num_sides(s: &mut Scanner, _: Axis) -> DeviceResult<PropertyValue> {
    Ok(PropertyValue::Integer(query_sides(s)?.0))
}

fn set_num_sides(s: &mut Scanner, _: Axis, value: PropertyValue) -> DeviceResult<PropertyValue> {
    let first = cached_choice::<SpimSide>(s, "SPIMFirstSide").unwrap_or_default();
    write_card(s, "NR", AxisLetter::Z, encode_sides(int(&value), first))?;
    Ok(value)
}

fn get_first_side(s: &mut Scanner, _: Axis) -> DeviceResult<PropertyValue> {
    Ok(PropertyValue::choice(query_sides(s)?.1))
}

fn set_first_side(s: &mut Scanner, _: Axis, value: PropertyValue) -> DeviceResult<PropertyValue> {
    let sides = s
        .registry
        .cached("SPIMNumSides")
        .and_then(|v| v.as_i64())
        .unwrap_or(1);
    let first = choice::<SpimSide>(&value)?;
    write_card(s, "NR", AxisLetter::Z, encode_sides(sides, first))?;
    Ok(value)
}

fn get_spim_delay(s: &mut Scanner, axis: Axis) -> DeviceResult<PropertyValue> {
    Ok(PropertyValue::Float(query_card(s, "NV", joystick_operand(axis))?))
}

fn set_spim_delay(s: &mut Scanner, axis: Axis, value: PropertyValue) -> DeviceResult<PropertyValue> {
    write_card(s, "NV", joystick_operand(axis), float(&value))?;
    Ok(value)
}

fn spim_missing() -> CapabilityError {
    CapabilityError::unsupported("SPIM")
}

fn get_spim_state(s: &mut Scanner, _: Axis) -> DeviceResult<PropertyValue> {
    let spim = s.spim.as_mut().ok_or_else(spim_missing)?;
    let status = spim.status(&mut s.engine)?;
    Ok(PropertyValue::choice(status.state()))
}

fn set_spim_state(s: &mut Scanner, _: Axis, value: PropertyValue) -> DeviceResult<PropertyValue> {
    let target = choice::<SpimState>(&value)?;
    let spim = s.spim.as_mut().ok_or_else(spim_missing)?;
    Ok(PropertyValue::choice(spim.transition(&mut s.engine, target)?))
}

// ring buffer

fn ring_missing() -> CapabilityError {
    CapabilityError::unsupported("ring buffer")
}

fn get_ring_mode(s: &mut Scanner, _: Axis) -> DeviceResult<PropertyValue> {
    let rb = s.ring_buffer.as_ref().ok_or_else(ring_missing)?;
    Ok(PropertyValue::choice(rb.status(&mut s.engine)?.mode))
}

fn set_ring_mode(s: &mut Scanner, _: Axis, value: PropertyValue) -> DeviceResult<PropertyValue> {
    let mode = choice::<RingBufferMode>(&value)?;
    let rb = s.ring_buffer.as_ref().ok_or_else(ring_missing)?;
    rb.set_mode(&mut s.engine, mode)?;
    Ok(value)
}

fn get_ring_delay(s: &mut Scanner, _: Axis) -> DeviceResult<PropertyValue> {
    let rb = s.ring_buffer.as_ref().ok_or_else(ring_missing)?;
    Ok(PropertyValue::Integer(rb.delay(&mut s.engine)?))
}

fn set_ring_delay(s: &mut Scanner, _: Axis, value: PropertyValue) -> DeviceResult<PropertyValue> {
    let rb = s.ring_buffer.as_ref().ok_or_else(ring_missing)?;
    rb.set_delay(&mut s.engine, int(&value))?;
    Ok(value)
}

fn get_ring_trigger(s: &mut Scanner, _: Axis) -> DeviceResult<PropertyValue> {
    let rb = s.ring_buffer.as_mut().ok_or_else(ring_missing)?;
    Ok(PropertyValue::choice(rb.observe()))
}

/// Only "Do it" acts; other labels report the current trigger state.
fn set_ring_trigger(s: &mut Scanner, _: Axis, value: PropertyValue) -> DeviceResult<PropertyValue> {
    let rb = s.ring_buffer.as_mut().ok_or_else(ring_missing)?;
    let state = match choice::<TriggerState>(&value)? {
        TriggerState::Triggering => rb.fire(&mut s.engine)?,
        _ => rb.trigger_state(),
    };
    Ok(PropertyValue::choice(state))
}

fn get_ring_running(s: &mut Scanner, _: Axis) -> DeviceResult<PropertyValue> {
    let rb = s.ring_buffer.as_ref().ok_or_else(ring_missing)?;
    Ok(PropertyValue::choice(YesNo::from(rb.status(&mut s.engine)?.running)))
}

/// Read-only in effect: any write just re-reads the hardware flag.
fn refresh_ring_running(s: &mut Scanner, axis: Axis, _: PropertyValue) -> DeviceResult<PropertyValue> {
    get_ring_running(s, axis)
}
