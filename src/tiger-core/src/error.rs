// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Error taxonomy for controller communication and device state.
//!
//! Validation errors ([`ConfigError`], [`CapabilityError`]) are raised before
//! any bytes reach the bus. Transport and protocol errors are surfaced to the
//! caller as-is; nothing in this crate retries them.

use thiserror::Error;

/// Failure of the underlying bus.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no response from controller to '{0}'")]
    NoResponse(String),

    #[error("timed out waiting for answer to '{0}'")]
    Timeout(String),

    #[error("answer framing error: {0}")]
    Framing(String),

    #[error("transport closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The controller answered, but not with the expected shape.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtocolError {
    #[error("expected answer starting with '{expected}', got '{answer}'")]
    PrefixMismatch { expected: String, answer: String },

    #[error("malformed answer '{answer}': {reason}")]
    MalformedAnswer { answer: String, reason: String },

    #[error("controller reported error {code} ('{answer}')")]
    ControllerError { code: i32, answer: String },
}

/// A requested value is outside what the knob accepts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {property}: {reason}")]
    InvalidValue {
        property: String,
        value: String,
        reason: String,
    },

    #[error("unknown property '{0}'")]
    UnknownProperty(String),

    #[error("property '{0}' is read-only")]
    ReadOnly(String),
}

impl ConfigError {
    pub fn invalid(
        property: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        ConfigError::InvalidValue {
            property: property.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// The card/firmware combination lacks the requested feature.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CapabilityError {
    #[error("operation not supported by this card: {operation}")]
    Unsupported { operation: String },
}

impl CapabilityError {
    pub fn unsupported(operation: impl Into<String>) -> Self {
        CapabilityError::Unsupported {
            operation: operation.into(),
        }
    }
}

/// Failure reported by a USB motor or twister driver.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MotorError {
    #[error("no {kind} discovered at slot {slot}")]
    NotDiscovered { kind: &'static str, slot: usize },

    #[error("could not connect to device {serial} (driver code {code})")]
    Connect { serial: i32, code: i32 },

    #[error("driver call '{call}' failed with code {code}")]
    Driver { call: &'static str, code: i32 },

    #[error("device is not connected")]
    NotConnected,
}

/// Umbrella error for every device operation.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Capability(#[from] CapabilityError),

    #[error(transparent)]
    Motor(#[from] MotorError),
}

impl DeviceError {
    /// True when the failure happened on the wire rather than in validation.
    pub fn is_comms(&self) -> bool {
        matches!(self, DeviceError::Transport(_) | DeviceError::Protocol(_))
    }
}

pub type DeviceResult<T> = Result<T, DeviceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comms_classification() {
        let transport: DeviceError = TransportError::Timeout("W X".into()).into();
        assert!(transport.is_comms());

        let config: DeviceError = ConfigError::invalid("SAModeX", "9", "unknown mode").into();
        assert!(!config.is_comms());

        let capability: DeviceError = CapabilityError::unsupported("repetitions").into();
        assert!(matches!(
            capability,
            DeviceError::Capability(CapabilityError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_invalid_value_message() {
        let err = ConfigError::invalid("FilterFreqX", 900.0, "must be within 0.1..=650");
        assert_eq!(
            err.to_string(),
            "invalid value '900' for FilterFreqX: must be within 0.1..=650"
        );
    }
}
