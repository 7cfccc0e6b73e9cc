// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

pub mod bitfield;
pub mod capability;
pub mod choice;
pub mod device;
pub mod error;
pub mod machines;
pub mod motion;
pub mod policies;
pub mod protocol;
pub mod refresh;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub type DynResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

pub use capability::{CardCapabilities, FirmwareVersion};
pub use device::{Axis, PropertyInfo, PropertyKind, PropertyValue, Scanner, ScannerOptions};
pub use error::{
    CapabilityError, ConfigError, DeviceError, DeviceResult, MotorError, ProtocolError,
    TransportError,
};
pub use policies::BusyFailure;
pub use refresh::{RefreshMode, RefreshPolicy};
pub use transport::{Bus, Transport};
