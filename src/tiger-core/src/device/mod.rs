// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Device state models built on the protocol engine.

pub mod polygon;
pub mod property;
pub mod scanner;

pub use polygon::{Playback, PolygonSequencer, Vertex};
pub use property::{
    Constraint, PropertyInfo, PropertyKind, PropertyRegistry, PropertySpec, PropertyValue,
};
pub use scanner::{Axis, ExtendedName, Scanner, ScannerOptions};
