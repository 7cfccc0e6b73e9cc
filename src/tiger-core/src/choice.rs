// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Enumerated knob values with a host-facing label and a native code.

/// A closed set of values, each with a label and a controller code.
pub trait Choice: Copy + PartialEq + Sized + 'static {
    const ALL: &'static [Self];

    fn label(self) -> &'static str;

    fn code(self) -> i64;

    fn from_label(label: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.label() == label)
    }

    fn from_code(code: i64) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.code() == code)
    }

    fn labels() -> Vec<String> {
        Self::ALL.iter().map(|c| c.label().to_string()).collect()
    }
}

/// Waveform shape (register bits 0-2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaPattern {
    Ramp,
    Triangle,
    Square,
}

impl Choice for SaPattern {
    const ALL: &'static [Self] = &[Self::Ramp, Self::Triangle, Self::Square];

    fn label(self) -> &'static str {
        match self {
            Self::Ramp => "0 - Ramp",
            Self::Triangle => "1 - Triangle",
            Self::Square => "2 - Square",
        }
    }

    fn code(self) -> i64 {
        match self {
            Self::Ramp => 0,
            Self::Triangle => 1,
            Self::Square => 2,
        }
    }
}

/// Waveform clock source (register bit 7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockSource {
    Internal,
    External,
}

impl Choice for ClockSource {
    const ALL: &'static [Self] = &[Self::Internal, Self::External];

    fn label(self) -> &'static str {
        match self {
            Self::Internal => "0 - Internal 4kHz",
            Self::External => "1 - External",
        }
    }

    fn code(self) -> i64 {
        match self {
            Self::Internal => 0,
            Self::External => 1,
        }
    }
}

/// Waveform clock edge (register bit 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockPolarity {
    Rising,
    Falling,
}

impl Choice for ClockPolarity {
    const ALL: &'static [Self] = &[Self::Rising, Self::Falling];

    fn label(self) -> &'static str {
        match self {
            Self::Rising => "0 - Positive edge",
            Self::Falling => "1 - Negative edge",
        }
    }

    fn code(self) -> i64 {
        match self {
            Self::Rising => 0,
            Self::Falling => 1,
        }
    }
}

/// TTL output enable (register bit 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlOutput {
    Disabled,
    Enabled,
}

impl Choice for TtlOutput {
    const ALL: &'static [Self] = &[Self::Disabled, Self::Enabled];

    fn label(self) -> &'static str {
        match self {
            Self::Disabled => "0 - Disabled",
            Self::Enabled => "1 - Enabled",
        }
    }

    fn code(self) -> i64 {
        match self {
            Self::Disabled => 0,
            Self::Enabled => 1,
        }
    }
}

/// TTL output polarity (register bit 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlPolarity {
    ActiveHigh,
    ActiveLow,
}

impl Choice for TtlPolarity {
    const ALL: &'static [Self] = &[Self::ActiveHigh, Self::ActiveLow];

    fn label(self) -> &'static str {
        match self {
            Self::ActiveHigh => "0 - Active high",
            Self::ActiveLow => "1 - Active low",
        }
    }

    fn code(self) -> i64 {
        match self {
            Self::ActiveHigh => 0,
            Self::ActiveLow => 1,
        }
    }
}

/// Source of the scanner position command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Internal,
    External,
}

impl Choice for InputMode {
    const ALL: &'static [Self] = &[Self::Internal, Self::External];

    fn label(self) -> &'static str {
        match self {
            Self::Internal => "internal input",
            Self::External => "external input",
        }
    }

    /// Code used by the `PM` verb. The legacy `MA` verb inverts it.
    fn code(self) -> i64 {
        match self {
            Self::Internal => 0,
            Self::External => 1,
        }
    }
}

/// Which joystick or wheel drives an axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoystickInput {
    None,
    JoystickX,
    JoystickY,
    RightWheel,
    LeftWheel,
}

impl Choice for JoystickInput {
    const ALL: &'static [Self] = &[
        Self::None,
        Self::JoystickX,
        Self::JoystickY,
        Self::RightWheel,
        Self::LeftWheel,
    ];

    fn label(self) -> &'static str {
        match self {
            Self::None => "0 - none",
            Self::JoystickX => "2 - joystick X",
            Self::JoystickY => "3 - joystick Y",
            Self::RightWheel => "22 - right wheel",
            Self::LeftWheel => "23 - left wheel",
        }
    }

    fn code(self) -> i64 {
        match self {
            Self::None => 0,
            Self::JoystickX => 2,
            Self::JoystickY => 3,
            Self::RightWheel => 22,
            Self::LeftWheel => 23,
        }
    }
}

/// Settings operation on the card's flash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveSettings {
    NoAction,
    FactoryDefaults,
    LastSaved,
    Save,
    Done,
}

impl SaveSettings {
    /// Operand letter for `SS`; `None` for the display-only states.
    pub fn operand(self) -> Option<char> {
        match self {
            Self::FactoryDefaults => Some('X'),
            Self::LastSaved => Some('Y'),
            Self::Save => Some('Z'),
            Self::NoAction | Self::Done => None,
        }
    }
}

impl Choice for SaveSettings {
    const ALL: &'static [Self] = &[
        Self::NoAction,
        Self::FactoryDefaults,
        Self::LastSaved,
        Self::Save,
        Self::Done,
    ];

    fn label(self) -> &'static str {
        match self {
            Self::NoAction => "no action",
            Self::FactoryDefaults => "restore defaults",
            Self::LastSaved => "restore last saved",
            Self::Save => "save settings",
            Self::Done => "done",
        }
    }

    fn code(self) -> i64 {
        match self {
            Self::NoAction => 0,
            Self::FactoryDefaults => 1,
            Self::LastSaved => 2,
            Self::Save => 3,
            Self::Done => 4,
        }
    }
}

/// Yes/No knob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YesNo {
    No,
    Yes,
}

impl From<bool> for YesNo {
    fn from(v: bool) -> Self {
        if v {
            YesNo::Yes
        } else {
            YesNo::No
        }
    }
}

impl From<YesNo> for bool {
    fn from(v: YesNo) -> Self {
        v == YesNo::Yes
    }
}

impl Choice for YesNo {
    const ALL: &'static [Self] = &[Self::No, Self::Yes];

    fn label(self) -> &'static str {
        match self {
            Self::No => "No",
            Self::Yes => "Yes",
        }
    }

    fn code(self) -> i64 {
        match self {
            Self::No => 0,
            Self::Yes => 1,
        }
    }
}
