/*
 * This file is part of raphael-biometrics.
 *
 * Copyright (C) 2026 raphael-biometrics contributors
 *
 * raphael-biometrics is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * raphael-biometrics is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with raphael-biometrics. If not, see <https://www.gnu.org/licenses/>.
 */

//! fingerprintd - fingerprint HAL bridge service

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};

use raphael_biometrics::boost::BoostNotifier;
use raphael_biometrics::config::load_config;
use raphael_biometrics::hal::HardwareModuleRegistry;
use raphael_biometrics::logger::{init_logging, log_level, LOG_ENV};
use raphael_biometrics::power_client::SocketPowerConnector;
use raphael_biometrics::{registry, server, BiometricsFingerprint};
use rp_props::{PropertyStore, SystemProperties};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_help() {
    eprintln!("fingerprintd {} - fingerprint HAL bridge", VERSION);
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    fingerprintd [OPTIONS]");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    -c, --config PATH   Configuration file (default /vendor/etc/fingerprintd.json)");
    eprintln!("    -s, --socket PATH   Override the client socket path");
    eprintln!("    -v, --version       Print version");
    eprintln!("    -h, --help          Print this help");
    eprintln!();
    eprintln!("ENVIRONMENT:");
    eprintln!("    {}      Log filter (trace, debug, info, warn, error)", LOG_ENV);
}

struct Args {
    config: Option<PathBuf>,
    socket: Option<PathBuf>,
}

/// Hand-parsed flags; `None` means the process should exit successfully.
fn parse_args() -> Option<Args> {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args { config: None, socket: None };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                return None;
            }
            "-v" | "--version" => {
                println!("fingerprintd {}", VERSION);
                return None;
            }
            flag @ ("-c" | "--config" | "-s" | "--socket") => {
                i += 1;
                let Some(value) = args.get(i) else {
                    eprintln!("Error: {} requires a path argument", flag);
                    std::process::exit(1);
                };
                if matches!(flag, "-c" | "--config") {
                    parsed.config = Some(PathBuf::from(value));
                } else {
                    parsed.socket = Some(PathBuf::from(value));
                }
            }
            arg => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }
    Some(parsed)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    std::panic::set_hook(Box::new(|panic_info| {
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string());
        error!("PANIC at {}: {}", location, panic_info);
        eprintln!("PANIC at {}: {}", location, panic_info);
    }));

    let Some(args) = parse_args() else {
        return Ok(());
    };

    let log_level = log_level();
    let sink = init_logging(&log_level);
    info!("STARTUP: fingerprintd {} starting", VERSION);
    info!("STARTUP: Logging to {} (level {})", sink.describe(), log_level);

    let mut cfg = load_config(args.config.as_deref()).context("loading configuration")?;
    if let Some(socket) = args.socket {
        cfg.socket_path = socket;
    }

    let props: Arc<dyn PropertyStore> = Arc::new(SystemProperties::new());
    let modules = HardwareModuleRegistry::new(cfg.hal_search_paths.clone(), props.clone(), registry::notify_trampoline);
    let boost = BoostNotifier::new(Box::new(SocketPowerConnector::new(cfg.power_socket_path.clone())));

    let bridge = Arc::new(BiometricsFingerprint::open(&modules, props, boost));
    match bridge.class_name() {
        Some(class) => info!("STARTUP: Fingerprint module {} ready", class),
        None => warn!("STARTUP: No fingerprint module opened, serving requests without a device"),
    }
    registry::register(bridge.clone());

    // Runs for the lifetime of the process
    let _fod_watcher = bridge.start_fod_watcher(&cfg.fod_ui_path);

    let result = server::run_server(&cfg.socket_path, bridge)
        .await
        .with_context(|| format!("serving on {}", cfg.socket_path.display()));

    registry::unregister();
    info!("SHUTDOWN: fingerprintd terminated");
    result
}
