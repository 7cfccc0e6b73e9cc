// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use super::*;
use crate::choice::{InputMode, SaveSettings, TtlOutput};
use crate::error::DeviceError;
use crate::machines::SpimState;
use crate::testing::ScriptedTransport;

const NAME: &str = "Scanner:XY:33";

/// Answers for a card with `version` firmware and build props `props`.
fn card(version: &str, props: u32) -> ScriptedTransport {
    let script = ScriptedTransport::new();
    let build = format!(
        "TIGER_COMM\rMotor Axes: X Y\rAxis Types: x x\rAxis Addr: 3 3\rHex Addr: 33 33\rAxis Props: {} {}",
        props, props
    );
    script
        .on("3V", &format!(":A {}", version))
        .on("3BU X", &build)
        .on("3VB Z=1", ":A")
        .on("3JS X?", ":A X=50")
        .on("3JS Y?", ":A Y=5")
        .on("RS X-", ":A N")
        .on("RS Y-", ":A N");
    for axis in ["X", "Y"] {
        let ok = |verb: &str, value: &str| (format!("{} {}?", verb, axis), format!(":A {}={}", axis, value));
        for (cmd, answer) in [
            ok("UM", "1000"),
            ok("HM", "8"),
            ok("SL", "-4"),
            ok("SU", "4"),
            ok("PM", "0"),
            ok("MA", "1"),
            ok("D", "0"),
            ok("J", "0"),
            ok("SAA", "500"),
            ok("SAO", "0"),
            ok("SAF", "100"),
            ok("SAM", "0"),
            ok("SAP", "0"),
        ] {
            script.on(&cmd, &answer);
        }
        script.on(&format!("B {}?", axis), &format!(":{}=1.5", axis));
    }
    script
}

fn card_with_spim_and_ring_buffer() -> ScriptedTransport {
    let script = card("v2.81", 18);
    script
        .on("3NR X?", ":A X=1")
        .on("3NR Y?", ":A Y=10")
        .on("3NR F?", ":A F=1")
        .on("3NR Z?", ":A Z=3")
        .on("3NV X?", ":A X=0")
        .on("3NV Y?", ":A Y=0")
        .on("3SN X?", ":A I")
        .on("3RM X?", ":A X=2")
        .on("3RT Z?", ":A Z=0");
    script
}

fn scanner(script: &ScriptedTransport) -> Scanner {
    let mut scanner = Scanner::from_name(script.bus(), NAME, ScannerOptions::default()).unwrap();
    scanner.initialize().unwrap();
    script.clear_log();
    scanner
}

#[test]
fn test_extended_name() {
    let ext = ExtendedName::parse(NAME).unwrap();
    assert_eq!(ext.axis_x.as_char(), 'X');
    assert_eq!(ext.axis_y.as_char(), 'Y');
    assert_eq!(ext.address.as_char(), '3');

    assert!(ExtendedName::parse("Scanner:XX:33").is_err());
    assert!(ExtendedName::parse("Scanner:XY").is_err());
    assert!(ExtendedName::parse("Scanner:XYZ:33").is_err());
}

#[test]
fn test_initialize_old_firmware_has_no_gated_knobs() {
    let script = card("v2.70", 0);
    let s = scanner(&script);

    assert!(s.is_initialized());
    assert_eq!(s.unit_multiplier(Axis::X), 1000.0);
    assert_eq!(s.home(Axis::Y), 8.0);
    assert_eq!(s.capabilities(), CardCapabilities::default());
    let names = s.property_names();
    assert!(names.contains(&"SAPatternByteY".to_string()));
    assert!(!names.iter().any(|n| n.starts_with("SPIM") || n.starts_with("RingBuffer")));
}

#[test]
fn test_initialize_registers_gated_knobs() {
    let script = card_with_spim_and_ring_buffer();
    let s = scanner(&script);

    assert!(s.capabilities().spim);
    assert!(s.capabilities().ring_buffer);
    let info = s.property_info("SPIMNumSides").unwrap();
    assert_eq!(info.cached, Some(PropertyValue::Integer(2)));
    let first = s.property_info("SPIMFirstSide").unwrap();
    assert_eq!(first.cached, Some(PropertyValue::text("B")));
}

#[test]
fn test_initialize_is_one_time() {
    let script = card("v2.70", 0);
    let mut s = scanner(&script);
    s.initialize().unwrap();
    assert_eq!(script.sent_count(), 0);
}

#[test]
fn test_set_position_converts_and_clamps() {
    let script = card("v2.70", 0);
    let mut s = scanner(&script);
    script.reply(":A").reply(":A");

    s.set_position(1.25, 9.0).unwrap();

    // soft limit on Y is 4 degrees, kept one native step inside
    assert_eq!(script.sent(), vec!["M X=1250", "M Y=3999"]);
}

#[test]
fn test_get_position() {
    let script = card("v2.70", 0);
    let mut s = scanner(&script);
    script.reply(":A 1250.0").reply(":A -500.0");

    assert_eq!(s.get_position().unwrap(), (1.25, -0.5));
    assert_eq!(script.sent(), vec!["W X", "W Y"]);
}

#[test]
fn test_position_skips_axis_in_waveform_mode() {
    let script = card("v2.70", 0);
    let mut s = scanner(&script);
    script.reply(":A").reply(":A X=1");
    s.set_property("SAModeX", PropertyValue::choice(SaMode::Enabled))
        .unwrap();
    script.clear_log();
    script.reply(":A");

    s.set_position(1.0, 1.0).unwrap();

    assert_eq!(script.sent(), vec!["M Y=1000"]);
}

#[test]
fn test_beam_off_then_on_restores_position() {
    let script = card("v2.70", 0);
    let mut s = scanner(&script);
    script
        .reply(":A 1250.0")
        .reply(":A 500.0")
        .reply(":A");

    s.set_illumination(false).unwrap();

    assert!(!s.beam_on());
    assert_eq!(script.sent(), vec!["W X", "W Y", "! X Y"]);

    script.clear_log();
    script.reply(":A").reply(":A");
    s.set_illumination(true).unwrap();
    assert_eq!(script.sent(), vec!["M X=1250", "M Y=500"]);
}

#[test]
fn test_beam_off_twice_sends_nothing() {
    for version in ["v2.70", "v2.81"] {
        let script = card(version, 0);
        let mut s = scanner(&script);
        script.reply(":A 0.0").reply(":A 0.0").reply(":A");
        s.set_illumination(false).unwrap();
        script.clear_log();

        s.set_illumination(false).unwrap();
        s.set_position(1.0, 1.0).unwrap();

        assert_eq!(script.sent_count(), 0, "firmware {}", version);
    }
}

#[test]
fn test_beam_setter_ignores_limit_status() {
    let script = card("v2.81", 0);
    let mut s = scanner(&script);
    script.on("RS X-", ":A U").on("RS Y-", ":A U");
    script
        .reply(":A 1250.0")
        .reply(":A 500.0")
        .reply(":A");

    s.set_illumination(false).unwrap();

    assert!(!s.beam_on());
    assert_eq!(script.sent(), vec!["W X", "W Y", "! X Y"]);
}

#[test]
fn test_beam_getter_infers_from_limit_status() {
    let script = card("v2.81", 0);
    let mut s = scanner(&script);
    script.on("RS X-", ":A U").on("RS Y-", ":A U");

    assert_eq!(
        s.get_property("BeamEnabled", RefreshMode::Cached).unwrap(),
        PropertyValue::text("No")
    );
    assert!(!s.beam_on());
    assert_eq!(script.sent(), vec!["RS X-", "RS Y-"]);
}

#[test]
fn test_failed_beam_on_keeps_beam_off() {
    let script = card("v2.70", 0);
    let mut s = scanner(&script);
    script.reply(":A 0.0").reply(":A 0.0").reply(":A");
    s.set_illumination(false).unwrap();

    script.reply(":N-3");
    assert!(s.set_illumination(true).is_err());
    assert!(!s.beam_on());
}

#[test]
fn test_beam_off_forces_sa_mode_disabled() {
    let script = card("v2.70", 0);
    let mut s = scanner(&script);
    script.reply(":A").reply(":A X=1");
    s.set_property("SAModeX", PropertyValue::choice(SaMode::Enabled))
        .unwrap();
    script.reply(":A 0.0").reply(":A 0.0").reply(":A");
    s.set_illumination(false).unwrap();
    script.clear_log();

    let mode = s
        .set_property("SAModeX", PropertyValue::choice(SaMode::Enabled))
        .unwrap();

    assert_eq!(mode, PropertyValue::choice(SaMode::Disabled));
    assert_eq!(s.sa_mode(Axis::X), SaMode::Disabled);
    assert_eq!(script.sent_count(), 0);
    assert_eq!(
        s.get_property("SAModeX", RefreshMode::Cached).unwrap(),
        PropertyValue::choice(SaMode::Disabled)
    );
}

#[test]
fn test_busy_reads_both_axes() {
    let script = card("v2.70", 0);
    let mut s = scanner(&script);
    script.reply(":A N").reply(":A B");
    assert!(s.is_busy().unwrap());
    assert_eq!(script.sent(), vec!["RS X?", "RS Y?"]);
}

#[test]
fn test_busy_failure_policies() {
    let script = card("v2.70", 0);
    let mut s = scanner(&script);
    script.fail_next();
    assert!(!s.is_busy().unwrap());

    let mut strict = Scanner::from_name(
        script.bus(),
        NAME,
        ScannerOptions {
            busy_failure: BusyFailure::Propagate,
            ..ScannerOptions::default()
        },
    )
    .unwrap();
    script.fail_next();
    assert!(matches!(strict.is_busy(), Err(DeviceError::Transport(_))));
}

#[test]
fn test_software_polygon_playback() {
    let script = card("v2.70", 0);
    let mut s = scanner(&script);
    s.add_polygon_vertex(1, 1.0, 2.0);
    s.set_polygon_repetitions(2).unwrap();
    s.load_polygons().unwrap();
    assert_eq!(script.sent_count(), 0);

    for _ in 0..4 {
        script.reply(":A").reply(":A");
    }
    s.run_polygons().unwrap();

    assert_eq!(
        script.sent(),
        vec![
            "M X=0", "M Y=0", "M X=1000", "M Y=2000", "M X=0", "M Y=0", "M X=1000", "M Y=2000"
        ]
    );
}

#[test]
fn test_ring_buffer_polygon_playback() {
    let script = card_with_spim_and_ring_buffer();
    let mut s = scanner(&script);
    s.add_polygon_vertex(0, 0.5, -0.25);
    assert!(matches!(
        s.set_polygon_repetitions(3),
        Err(DeviceError::Capability(_))
    ));
    script.reply(":A").reply(":A").reply(":A");

    s.load_polygons().unwrap();
    s.run_polygons().unwrap();

    assert_eq!(script.sent(), vec!["3RM X=0", "LD X=500 Y=-250", "3RM"]);
}

#[test]
fn test_run_sequence_requires_ring_buffer() {
    let script = card("v2.70", 0);
    let mut s = scanner(&script);
    assert!(matches!(
        s.run_sequence(),
        Err(DeviceError::Capability(_))
    ));
    assert_eq!(script.sent_count(), 0);
}

#[test]
fn test_channel_name() {
    let script = card("v2.70", 0);
    let s = scanner(&script);
    assert_eq!(s.channel(), "Axes_XY");
}

#[test]
fn test_cached_get_does_not_query() {
    let script = card("v2.70", 0);
    let mut s = scanner(&script);

    let v = s.get_property("FilterFreqX", RefreshMode::Cached).unwrap();
    assert_eq!(v, PropertyValue::Float(1.5));
    assert_eq!(script.sent_count(), 0);

    s.get_property("FilterFreqX", RefreshMode::ForceImmediate)
        .unwrap();
    assert_eq!(script.sent(), vec!["B X?"]);
}

#[test]
fn test_refresh_knob_switches_policy() {
    let script = card("v2.70", 0);
    let mut s = scanner(&script);
    s.set_property_str("RefreshPropertyValues", "Yes").unwrap();
    assert_eq!(s.refresh_policy(), RefreshPolicy::Always);

    s.get_property("AttenuateTravelY", RefreshMode::Cached)
        .unwrap();
    assert_eq!(script.sent(), vec!["D Y?"]);
}

#[test]
fn test_out_of_range_value_is_rejected() {
    let script = card("v2.70", 0);
    let mut s = scanner(&script);
    let err = s.set_property_str("FilterFreqX", "700").unwrap_err();
    assert!(matches!(err, DeviceError::Config(ConfigError::InvalidValue { .. })));
    assert_eq!(script.sent_count(), 0);
    assert_eq!(
        s.property_info("FilterFreqX").unwrap().cached,
        Some(PropertyValue::Float(1.5))
    );
}

#[test]
fn test_sa_amplitude_uses_unit_multiplier() {
    let script = card("v2.70", 0);
    let mut s = scanner(&script);
    assert_eq!(
        s.get_property("SAAmplitudeX", RefreshMode::Cached).unwrap(),
        PropertyValue::Float(0.5)
    );
    script.reply(":A");
    s.set_property_str("SAAmplitudeY", "0.25").unwrap();
    assert_eq!(script.sent(), vec!["SAA Y=250"]);
}

#[test]
fn test_ttl_output_knob_updates_pattern_byte() {
    let script = card("v2.70", 0);
    let mut s = scanner(&script);
    script.reply(":A X=146").reply(":A");

    s.set_property("SATTLOutputX", PropertyValue::choice(TtlOutput::Enabled))
        .unwrap();

    assert_eq!(script.sent(), vec!["SAP X?", "SAP X=178"]);
    assert_eq!(
        s.property_info("SAPatternByteX").unwrap().cached,
        Some(PropertyValue::Integer(178))
    );
}

#[test]
fn test_input_mode_verb_depends_on_firmware() {
    let old = card("v2.70", 0);
    let mut s = scanner(&old);
    assert_eq!(
        s.get_property("InputMode", RefreshMode::Cached).unwrap(),
        PropertyValue::choice(InputMode::Internal)
    );
    old.reply(":A");
    s.set_property_str("InputMode", "external input").unwrap();
    assert_eq!(old.sent(), vec!["MA X=0 Y=0"]);

    let new = card("v2.81", 0);
    let mut s = scanner(&new);
    new.reply(":A");
    s.set_property_str("InputMode", "external input").unwrap();
    assert_eq!(new.sent(), vec!["PM X=1 Y=1"]);
}

#[test]
fn test_joystick_reverse_signs_both_speeds() {
    let script = card("v2.70", 0);
    let mut s = scanner(&script);
    script.reply(":A").reply(":A");

    s.set_property_str("JoystickReverse", "Yes").unwrap();
    s.set_property_str("JoystickSlowSpeed", "7").unwrap();

    assert_eq!(script.sent(), vec!["3JS X=-50 Y=-5", "3JS Y=-7"]);
}

#[test]
fn test_save_settings_reports_done() {
    let script = card("v2.70", 0);
    let mut s = scanner(&script);
    script.reply(":A").reply(":A");

    let v = s
        .set_property("SaveCardSettings", PropertyValue::choice(SaveSettings::LastSaved))
        .unwrap();
    assert_eq!(v, PropertyValue::choice(SaveSettings::Done));
    s.set_property("SaveCardSettings", PropertyValue::choice(SaveSettings::Save))
        .unwrap();
    assert_eq!(script.sent(), vec!["3SS Y", "3SS Z"]);
}

#[test]
fn test_spim_sides_written_together() {
    let script = card_with_spim_and_ring_buffer();
    let mut s = scanner(&script);
    script.reply(":A");

    // currently two sides, B first
    s.set_property_str("SPIMFirstSide", "A").unwrap();

    assert_eq!(script.sent(), vec!["3NR Z=2"]);
}

#[test]
fn test_spim_state_knob() {
    let script = card_with_spim_and_ring_buffer();
    let mut s = scanner(&script);
    script.reply(":A I").reply(":A").reply(":A");

    let state = s
        .set_property("SPIMState", PropertyValue::choice(SpimState::Armed))
        .unwrap();

    assert_eq!(state, PropertyValue::choice(SpimState::Armed));
    assert_eq!(script.sent(), vec!["3SN X?", "3SN X=80", "3SN X=97"]);
}

#[test]
fn test_run_sequence_fires_trigger() {
    let script = card_with_spim_and_ring_buffer();
    let mut s = scanner(&script);
    script.reply(":A");

    s.run_sequence().unwrap();

    assert_eq!(script.sent(), vec!["3RM"]);
    assert_eq!(
        s.get_property("RingBufferTrigger", RefreshMode::Cached).unwrap(),
        PropertyValue::choice(TriggerState::Idle)
    );
}

#[test]
fn test_unknown_property() {
    let script = card("v2.70", 0);
    let mut s = scanner(&script);
    assert!(matches!(
        s.get_property("NoSuchKnob", RefreshMode::Cached),
        Err(DeviceError::Config(ConfigError::UnknownProperty(_)))
    ));
}
