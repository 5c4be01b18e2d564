//! init_raphael - one-shot early-boot property setup

use std::path::Path;

use rp_props::SystemProperties;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter
const LOG_ENV: &str = "RAPHAEL_INIT_LOG";

fn init_logging() {
    let log_level = std::env::var(LOG_ENV).unwrap_or_else(|_| "info".to_string());

    if Path::new("/run/systemd/journal/socket").exists() {
        match tracing_journald::layer() {
            Ok(journald_layer) => {
                tracing_subscriber::registry()
                    .with(journald_layer)
                    .with(EnvFilter::new(&log_level))
                    .init();
                return;
            }
            Err(e) => eprintln!("Failed to create journald layer: {}, falling back to stderr", e),
        }
    }

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(log_level)
        .init();
}

fn main() -> anyhow::Result<()> {
    init_logging();

    let props = SystemProperties::new();
    let recovery = rp_init::in_recovery();
    if recovery {
        info!("Recovery boot, keeping build fingerprint");
    }

    let total_ram = match rp_init::dalvik_heap::total_ram() {
        Ok(ram) => ram,
        Err(e) => {
            warn!("sysinfo failed: {}, assuming the smallest heap profile", e);
            0
        }
    };

    let failed = rp_init::vendor_load_properties(&props, recovery, total_ram);
    if failed > 0 {
        anyhow::bail!("{} vendor property writes failed", failed);
    }
    info!("Vendor properties loaded");
    Ok(())
}
