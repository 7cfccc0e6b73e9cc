// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Configuration file support for tigerctl.
//!
//! Config is loaded from the `[tigerctl]` section of `tiger-rs.toml`.
//! Default search order:
//! 1. Path specified via `--config` CLI argument
//! 2. `./tiger-rs.toml`
//! 3. `~/.config/tiger-rs/tiger-rs.toml`
//! 4. `/etc/tiger-rs/tiger-rs.toml`

use serde::{Deserialize, Serialize};
use tiger_app::{normalize_name, ConfigFile};

use tiger_core::protocol::{AxisLetter, CardAddress};
use tiger_core::{BusyFailure, RefreshPolicy};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TigerctlConfig {
    pub general: GeneralConfig,
    pub transport: TransportConfig,
    pub scanner: ScannerConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: Option<String>,
}

/// How to reach the controller hub.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Backend name: "serial" or "sim"
    pub backend: String,
    /// Serial port path
    pub port: Option<String>,
    pub baud: u32,
    /// Answer timeout per command
    pub timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            backend: "serial".to_string(),
            port: None,
            baud: 115200,
            timeout_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BusyFailureSetting {
    #[default]
    FailOpen,
    Propagate,
}

impl From<BusyFailureSetting> for BusyFailure {
    fn from(setting: BusyFailureSetting) -> Self {
        match setting {
            BusyFailureSetting::FailOpen => BusyFailure::FailOpen,
            BusyFailureSetting::Propagate => BusyFailure::Propagate,
        }
    }
}

/// Which scanner card to drive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Card address as two hex digits ("33" is card '3')
    pub address: String,
    pub axis_x: String,
    pub axis_y: String,
    /// Re-query hardware on every property read
    pub refresh_always: bool,
    /// What a failed busy query reports
    pub busy_failure: BusyFailureSetting,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            address: "33".to_string(),
            axis_x: "X".to_string(),
            axis_y: "Y".to_string(),
            refresh_always: false,
            busy_failure: BusyFailureSetting::FailOpen,
        }
    }
}

impl ScannerConfig {
    /// Extended device name, e.g. `Scanner:XY:33`.
    pub fn device_name(&self) -> String {
        format!(
            "Scanner:{}{}:{}",
            self.axis_x.trim().to_ascii_uppercase(),
            self.axis_y.trim().to_ascii_uppercase(),
            self.address.trim()
        )
    }

    pub fn refresh_policy(&self) -> RefreshPolicy {
        if self.refresh_always {
            RefreshPolicy::Always
        } else {
            RefreshPolicy::CachedAfterInit
        }
    }
}

impl TigerctlConfig {
    pub fn validate(&self) -> Result<(), String> {
        validate_log_level(self.general.log_level.as_deref())?;
        validate_transport(&self.transport)?;
        validate_scanner(&self.scanner)
    }

    /// Example configuration under the `[tigerctl]` header.
    pub fn example_combined_toml() -> String {
        #[derive(serde::Serialize)]
        struct Wrapper {
            tigerctl: TigerctlConfig,
        }
        let example = TigerctlConfig {
            general: GeneralConfig {
                log_level: Some("info".to_string()),
            },
            transport: TransportConfig {
                port: Some("/dev/ttyUSB0".to_string()),
                ..TransportConfig::default()
            },
            scanner: ScannerConfig::default(),
        };
        toml::to_string_pretty(&Wrapper { tigerctl: example }).unwrap_or_default()
    }
}

fn validate_log_level(level: Option<&str>) -> Result<(), String> {
    match level {
        None | Some("trace" | "debug" | "info" | "warn" | "error") => Ok(()),
        Some(level) => Err(format!(
            "[general].log_level '{}' is invalid (expected one of: trace, debug, info, warn, error)",
            level
        )),
    }
}

fn validate_transport(transport: &TransportConfig) -> Result<(), String> {
    match normalize_name(&transport.backend).as_str() {
        "serial" => {
            if transport.baud == 0 {
                return Err("[transport].baud must be > 0".to_string());
            }
            if transport.timeout_ms == 0 {
                return Err("[transport].timeout_ms must be > 0".to_string());
            }
            if transport
                .port
                .as_deref()
                .is_some_and(|p| p.trim().is_empty())
            {
                return Err("[transport].port must not be empty".to_string());
            }
            Ok(())
        }
        "sim" => Ok(()),
        _ => Err(format!(
            "[transport].backend '{}' is invalid (expected 'serial' or 'sim')",
            transport.backend
        )),
    }
}

fn validate_scanner(scanner: &ScannerConfig) -> Result<(), String> {
    if CardAddress::from_hex(&scanner.address).is_none() {
        return Err(format!(
            "[scanner].address '{}' must be two hex digits naming an alphanumeric card address",
            scanner.address
        ));
    }
    let letter = |name: &str, value: &str| {
        let mut chars = value.trim().chars();
        match (chars.next().and_then(AxisLetter::new), chars.next()) {
            (Some(letter), None) => Ok(letter),
            _ => Err(format!("[scanner].{} '{}' must be a single letter", name, value)),
        }
    };
    let x = letter("axis_x", &scanner.axis_x)?;
    let y = letter("axis_y", &scanner.axis_y)?;
    if x == y {
        return Err("[scanner].axis_x and [scanner].axis_y must differ".to_string());
    }
    Ok(())
}

impl ConfigFile for TigerctlConfig {
    fn section_key() -> &'static str {
        "tigerctl"
    }
}
