// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::collections::HashMap;

use tiger_core::transport::Transport;
use tiger_core::DynResult;

pub mod sim;

pub use sim::{SimCard, SimMotorBus};
#[cfg(feature = "serial")]
pub use tiger_backend_serial::SerialTransport;

/// Connection details for instantiating a transport.
#[derive(Debug, Clone)]
pub enum TransportAccess {
    Serial {
        path: String,
        baud: u32,
        timeout_ms: u64,
    },
    Sim,
}

pub type TransportFactory = fn(TransportAccess) -> DynResult<Box<dyn Transport>>;

/// Context for registering and instantiating bus transports.
#[derive(Clone)]
pub struct RegistrationContext {
    factories: HashMap<String, TransportFactory>,
}

impl RegistrationContext {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a transport factory under a stable name (e.g. "serial").
    pub fn register_transport(&mut self, name: &str, factory: TransportFactory) {
        self.factories.insert(normalize_name(name), factory);
    }

    pub fn is_transport_registered(&self, name: &str) -> bool {
        self.factories.contains_key(&normalize_name(name))
    }

    /// Registered names, sorted.
    pub fn registered_transports(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn build_transport(
        &self,
        name: &str,
        access: TransportAccess,
    ) -> DynResult<Box<dyn Transport>> {
        let factory = self
            .factories
            .get(&normalize_name(name))
            .ok_or_else(|| format!("Unknown transport backend: {}", name))?;
        factory(access)
    }

    /// Merge another registration context into this one.
    pub fn extend_from(&mut self, other: &RegistrationContext) {
        for (name, factory) in &other.factories {
            self.factories.insert(name.clone(), *factory);
        }
    }
}

impl Default for RegistrationContext {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_name(name: &str) -> String {
    name.to_ascii_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Register all built-in transports enabled by features on a context.
pub fn register_builtin_backends_on(context: &mut RegistrationContext) {
    context.register_transport("sim", sim_factory);
    #[cfg(feature = "serial")]
    context.register_transport("serial", serial_factory);
}

fn sim_factory(_access: TransportAccess) -> DynResult<Box<dyn Transport>> {
    Ok(Box::new(SimCard::new()))
}

#[cfg(feature = "serial")]
fn serial_factory(access: TransportAccess) -> DynResult<Box<dyn Transport>> {
    match access {
        TransportAccess::Serial {
            path,
            baud,
            timeout_ms,
        } => Ok(Box::new(SerialTransport::new(
            &path,
            baud,
            std::time::Duration::from_millis(timeout_ms),
        )?)),
        TransportAccess::Sim => Err("serial backend requires a serial port".into()),
    }
}
