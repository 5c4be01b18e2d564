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

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rp_error::{RaphaelError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::paths;

fn default_socket_path() -> PathBuf { PathBuf::from(paths::SERVICE_SOCKET) }
fn default_power_socket_path() -> PathBuf { PathBuf::from(paths::POWER_EXT_SOCKET) }
fn default_fod_ui_path() -> PathBuf { PathBuf::from(paths::FOD_UI) }
fn default_hal_search_paths() -> Vec<PathBuf> { paths::HAL_SEARCH_DIRS.iter().map(PathBuf::from).collect() }

/// Settings of the `fingerprintd` service. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,
    #[serde(default = "default_power_socket_path")]
    pub power_socket_path: PathBuf,
    #[serde(default = "default_fod_ui_path")]
    pub fod_ui_path: PathBuf,
    #[serde(default = "default_hal_search_paths")]
    pub hal_search_paths: Vec<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            power_socket_path: default_power_socket_path(),
            fod_ui_path: default_fod_ui_path(),
            hal_search_paths: default_hal_search_paths(),
        }
    }
}

pub fn config_path() -> PathBuf { PathBuf::from(paths::CONFIG_FILE) }

pub fn validate_config(cfg: &ServiceConfig) -> Result<()> {
    let named = [
        ("socket_path", &cfg.socket_path),
        ("power_socket_path", &cfg.power_socket_path),
        ("fod_ui_path", &cfg.fod_ui_path),
    ];
    for (name, path) in named {
        if !path.is_absolute() {
            return Err(RaphaelError::config(format!("{} must be absolute: {}", name, path.display())));
        }
    }
    if cfg.hal_search_paths.is_empty() {
        return Err(RaphaelError::config("hal_search_paths must not be empty"));
    }
    if let Some(p) = cfg.hal_search_paths.iter().find(|p| !p.is_absolute()) {
        return Err(RaphaelError::config(format!("hal search path must be absolute: {}", p.display())));
    }
    Ok(())
}

pub fn parse_config(data: &str) -> Result<ServiceConfig> {
    let cfg: ServiceConfig = serde_json::from_str(data)?;
    validate_config(&cfg)?;
    Ok(cfg)
}

/// Load the service configuration.
///
/// An explicitly given file must exist. Without one the default location is
/// tried and a missing file means built-in defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<ServiceConfig> {
    let path = explicit.map(Path::to_path_buf).unwrap_or_else(config_path);
    match fs::read_to_string(&path) {
        Ok(data) => {
            debug!("Loading configuration from {}", path.display());
            parse_config(&data)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound && explicit.is_none() => {
            debug!("No configuration at {}, using defaults", path.display());
            Ok(ServiceConfig::default())
        }
        Err(e) => Err(RaphaelError::FileRead { path, source: e }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_object_gives_defaults() {
        assert_eq!(parse_config("{}").unwrap(), ServiceConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let cfg = parse_config(r#"{"socket_path": "/dev/socket/fp_test", "hal_search_paths": ["/odm/lib64/hw"]}"#).unwrap();
        assert_eq!(cfg.socket_path, PathBuf::from("/dev/socket/fp_test"));
        assert_eq!(cfg.hal_search_paths, vec![PathBuf::from("/odm/lib64/hw")]);
        assert_eq!(cfg.fod_ui_path, PathBuf::from(paths::FOD_UI));
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(matches!(parse_config(r#"{"sockt_path": "/x"}"#), Err(RaphaelError::JsonParse(_))));
    }

    #[test]
    fn test_relative_paths_rejected() {
        assert!(matches!(parse_config(r#"{"fod_ui_path": "fod_ui"}"#), Err(RaphaelError::Config(_))));
        assert!(matches!(parse_config(r#"{"hal_search_paths": []}"#), Err(RaphaelError::Config(_))));
        assert!(matches!(parse_config(r#"{"hal_search_paths": ["lib/hw"]}"#), Err(RaphaelError::Config(_))));
    }

    #[test]
    fn test_load_explicit_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"power_socket_path": "/tmp/power"}}"#).unwrap();
        let cfg = load_config(Some(file.path())).unwrap();
        assert_eq!(cfg.power_socket_path, PathBuf::from("/tmp/power"));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("fingerprintd.json");
        assert!(matches!(load_config(Some(&missing)), Err(RaphaelError::FileRead { .. })));
    }
}
