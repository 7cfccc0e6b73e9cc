// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing::info;

use tiger_app::{init_logging, normalize_name, ConfigFile};
use tiger_backend::{register_builtin_backends_on, RegistrationContext, TransportAccess};
use tiger_core::{Bus, DynResult, RefreshMode, Scanner, ScannerOptions, Transport};

use config::TigerctlConfig;

const PKG_DESCRIPTION: &str = concat!(env!("CARGO_PKG_NAME"), " - Tiger scanner card tool");

#[derive(Debug, Parser)]
#[command(
    author = env!("CARGO_PKG_AUTHORS"),
    version = env!("CARGO_PKG_VERSION"),
    about = PKG_DESCRIPTION,
)]
struct Cli {
    /// Path to configuration file
    #[arg(long = "config", short = 'C', value_name = "FILE")]
    config: Option<PathBuf>,
    /// Print example configuration and exit
    #[arg(long = "print-config")]
    print_config: bool,
    /// Transport backend (serial, sim)
    #[arg(short = 'b', long = "backend")]
    backend: Option<String>,
    /// Serial address: <path> <baud>
    #[arg(short = 'a', long = "addr", value_name = "SERIAL_ADDR")]
    serial_addr: Option<String>,
    /// Scanner device name, e.g. Scanner:XY:33
    #[arg(short = 'd', long = "device")]
    device: Option<String>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Firmware, capabilities and beam state
    Info,
    /// Print the current position in degrees
    Position,
    /// Move both axes, in degrees
    Move {
        #[arg(allow_hyphen_values = true)]
        x: f64,
        #[arg(allow_hyphen_values = true)]
        y: f64,
    },
    /// Switch the beam, or report it when no state is given
    Beam { state: Option<Switch> },
    /// Whether either axis is moving
    Busy,
    /// Read one property
    Get {
        name: String,
        /// Query the card instead of the cache
        #[arg(long)]
        refresh: bool,
    },
    /// Write one property
    Set {
        name: String,
        #[arg(allow_hyphen_values = true)]
        value: String,
    },
    /// List properties as JSON
    Props,
    /// Load and run a polygon given as x,y pairs
    Polygon {
        #[arg(value_parser = parse_vertex, allow_hyphen_values = true, required = true)]
        vertices: Vec<(f64, f64)>,
        #[arg(short = 'n', long, default_value_t = 1)]
        repetitions: u32,
    },
    /// Fire the ring-buffer sequence
    Sequence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Switch {
    On,
    Off,
}

/// Parse a serial address of the form "<path> <baud>".
fn parse_serial_addr(addr: &str) -> DynResult<(String, u32)> {
    let mut parts = addr.split_whitespace();
    let path = parts
        .next()
        .ok_or("Serial address must be '<path> <baud>'")?;
    let baud_str = parts
        .next()
        .ok_or("Serial address must be '<path> <baud>'")?;
    if parts.next().is_some() {
        return Err("Serial address must be '<path> <baud>' (got extra data)".into());
    }
    let baud: u32 = baud_str
        .parse()
        .map_err(|e| format!("Invalid baud '{}': {}", baud_str, e))?;
    Ok((path.to_string(), baud))
}

fn parse_vertex(s: &str) -> Result<(f64, f64), String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("vertex '{}' must be x,y", s))?;
    let coord = |v: &str| {
        v.trim()
            .parse::<f64>()
            .map_err(|e| format!("vertex '{}': {}", s, e))
    };
    Ok((coord(x)?, coord(y)?))
}

/// Configuration after merging the config file and CLI arguments.
#[derive(Debug)]
struct ResolvedConfig {
    backend: String,
    access: TransportAccess,
    device: String,
}

fn resolve_config(cli: &Cli, cfg: &TigerctlConfig) -> DynResult<ResolvedConfig> {
    let backend = normalize_name(cli.backend.as_deref().unwrap_or(&cfg.transport.backend));
    let access = match backend.as_str() {
        "sim" => TransportAccess::Sim,
        _ => {
            let (path, baud) = if let Some(ref addr) = cli.serial_addr {
                parse_serial_addr(addr)?
            } else if let Some(ref port) = cfg.transport.port {
                (port.clone(), cfg.transport.baud)
            } else {
                return Err("Serial access requires a port. Use --addr '<path> <baud>' or set [transport].port in config.".into());
            };
            TransportAccess::Serial {
                path,
                baud,
                timeout_ms: cfg.transport.timeout_ms,
            }
        }
    };
    let device = cli
        .device
        .clone()
        .unwrap_or_else(|| cfg.scanner.device_name());
    Ok(ResolvedConfig {
        backend,
        access,
        device,
    })
}

fn run(scanner: &mut Scanner, command: Command) -> DynResult<()> {
    match command {
        Command::Info => {
            let summary = json!({
                "name": scanner.name(),
                "channel": scanner.channel(),
                "firmware": scanner.firmware().to_string(),
                "capabilities": scanner.capabilities(),
                "beam_on": scanner.update_illumination(),
                "properties": scanner.property_names().len(),
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Position => {
            let (x, y) = scanner.get_position()?;
            println!("{} {}", x, y);
        }
        Command::Move { x, y } => scanner.set_position(x, y)?,
        Command::Beam { state: None } => {
            let on = scanner.update_illumination();
            println!("{}", if on { "on" } else { "off" });
        }
        Command::Beam { state: Some(state) } => scanner.set_illumination(state == Switch::On)?,
        Command::Busy => println!("{}", scanner.is_busy()?),
        Command::Get { name, refresh } => {
            let mode = if refresh {
                RefreshMode::ForceImmediate
            } else {
                RefreshMode::Cached
            };
            println!("{}", scanner.get_property(&name, mode)?);
        }
        Command::Set { name, value } => {
            let effective = scanner.set_property_str(&name, &value)?;
            println!("{} = {}", name, effective);
        }
        Command::Props => {
            let infos = scanner
                .property_names()
                .iter()
                .map(|name| scanner.property_info(name))
                .collect::<Result<Vec<_>, _>>()?;
            println!("{}", serde_json::to_string_pretty(&infos)?);
        }
        Command::Polygon {
            vertices,
            repetitions,
        } => {
            scanner.delete_polygons();
            for (index, (x, y)) in vertices.into_iter().enumerate() {
                scanner.add_polygon_vertex(index, x, y);
            }
            // the ring buffer plays each vertex once per trigger
            if repetitions != 1 || !scanner.capabilities().ring_buffer {
                scanner.set_polygon_repetitions(repetitions)?;
            }
            scanner.load_polygons()?;
            scanner.run_polygons()?;
        }
        Command::Sequence => scanner.run_sequence()?,
    }
    Ok(())
}

fn main() -> DynResult<()> {
    let cli = Cli::parse();

    if cli.print_config {
        println!("{}", TigerctlConfig::example_combined_toml());
        return Ok(());
    }

    let (cfg, config_path) = TigerctlConfig::load(cli.config.as_deref())?;
    cfg.validate()?;
    init_logging(cfg.general.log_level.as_deref());
    if let Some(ref path) = config_path {
        info!("Loaded configuration from {}", path.display());
    }

    let resolved = resolve_config(&cli, &cfg)?;
    let mut context = RegistrationContext::new();
    register_builtin_backends_on(&mut context);
    let transport = context.build_transport(&resolved.backend, resolved.access)?;
    info!("Using {}", transport.describe());

    let options = ScannerOptions {
        refresh: cfg.scanner.refresh_policy(),
        busy_failure: cfg.scanner.busy_failure.into(),
    };
    let mut scanner = Scanner::from_name(Bus::new(transport), &resolved.device, options)?;
    scanner.initialize()?;

    match cli.command {
        Some(command) => run(&mut scanner, command),
        None => run(&mut scanner, Command::Info),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serial_addr() {
        let (path, baud) = parse_serial_addr("/dev/ttyUSB0 115200").unwrap();
        assert_eq!(path, "/dev/ttyUSB0");
        assert_eq!(baud, 115200);
        assert!(parse_serial_addr("/dev/ttyUSB0").is_err());
        assert!(parse_serial_addr("/dev/ttyUSB0 fast").is_err());
        assert!(parse_serial_addr("/dev/ttyUSB0 9600 extra").is_err());
    }

    #[test]
    fn test_parse_vertex() {
        assert_eq!(parse_vertex("0.5,-1.25").unwrap(), (0.5, -1.25));
        assert!(parse_vertex("0.5").is_err());
        assert!(parse_vertex("a,b").is_err());
    }

    #[test]
    fn test_resolve_prefers_cli() {
        let cli = Cli::parse_from(["tigerctl", "-b", "SIM", "-d", "Scanner:AB:32", "busy"]);
        let resolved = resolve_config(&cli, &TigerctlConfig::default()).unwrap();
        assert_eq!(resolved.backend, "sim");
        assert!(matches!(resolved.access, TransportAccess::Sim));
        assert_eq!(resolved.device, "Scanner:AB:32");

        let cli = Cli::parse_from(["tigerctl", "-a", "/dev/ttyS1 9600", "position"]);
        let resolved = resolve_config(&cli, &TigerctlConfig::default()).unwrap();
        assert!(matches!(
            resolved.access,
            TransportAccess::Serial { ref path, baud: 9600, timeout_ms: 500 } if path == "/dev/ttyS1"
        ));
    }

    #[test]
    fn test_serial_without_port_is_an_error() {
        let cli = Cli::parse_from(["tigerctl", "info"]);
        assert!(resolve_config(&cli, &TigerctlConfig::default()).is_err());
    }

    #[test]
    fn test_commands_against_sim() {
        let mut context = RegistrationContext::new();
        register_builtin_backends_on(&mut context);
        let transport = context.build_transport("sim", TransportAccess::Sim).unwrap();
        let mut scanner =
            Scanner::from_name(Bus::new(transport), "Scanner:XY:33", ScannerOptions::default())
                .unwrap();
        scanner.initialize().unwrap();

        run(&mut scanner, Command::Move { x: 1.0, y: -1.0 }).unwrap();
        assert_eq!(scanner.get_position().unwrap(), (1.0, -1.0));
        run(
            &mut scanner,
            Command::Polygon {
                vertices: vec![(0.0, 0.0), (0.5, 0.5)],
                repetitions: 1,
            },
        )
        .unwrap();
        assert_eq!(scanner.get_position().unwrap(), (0.5, 0.5));
        run(&mut scanner, Command::Props).unwrap();
        assert!(run(
            &mut scanner,
            Command::Set {
                name: "NoSuchKnob".to_string(),
                value: "1".to_string(),
            },
        )
        .is_err());
    }
}
