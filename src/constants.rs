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

//! Constants for the fingerprint bridge
//!
//! Paths, property names, driver command ids and defaults live here so the
//! rest of the crate does not carry magic numbers.

/// Filesystem locations
pub mod paths {
    /// Display panel attribute that reports whether the FOD overlay is shown
    pub const FOD_UI: &str = "/sys/devices/platform/soc/soc:qcom,dsi-display-primary/fod_ui";

    /// Directories probed for `fingerprint.<class>.<variant>.so`, in order
    #[cfg(target_pointer_width = "64")]
    pub const HAL_SEARCH_DIRS: &[&str] = &["/odm/lib64/hw", "/vendor/lib64/hw", "/system/lib64/hw"];

    #[cfg(not(target_pointer_width = "64"))]
    pub const HAL_SEARCH_DIRS: &[&str] = &["/odm/lib/hw", "/vendor/lib/hw", "/system/lib/hw"];

    /// Optional service configuration
    pub const CONFIG_FILE: &str = "/vendor/etc/fingerprintd.json";

    /// Host-facing socket
    pub const SERVICE_SOCKET: &str = "/dev/socket/fingerprintd";

    /// Power HAL extension socket
    pub const POWER_EXT_SOCKET: &str = "/dev/socket/power_ext";

    /// Longest store path the driver accepts (PATH_MAX, including the NUL)
    pub const PATH_MAX: usize = 4096;
}

/// System properties written by the bridge
pub mod props {
    /// Class name of the module that opened, for diagnostics
    pub const FP_VENDOR: &str = "persist.vendor.sys.fp.vendor";

    /// Set to "true" when the opened module is under-display
    pub const FP_FOD: &str = "ro.hardware.fp.fod";

    /// Keys consulted, in order, to pick a HAL library variant
    pub const HAL_VARIANT_KEYS: &[&str] = &["ro.hardware", "ro.product.board", "ro.board.platform", "ro.arch"];
}

/// Vendor driver ABI values
pub mod hal {
    /// `FINGERPRINT_HARDWARE_MODULE_ID`
    pub const MODULE_ID: &str = "fingerprint";

    /// Symbol every HAL library exports its `hw_module_t` under
    pub const HAL_MODULE_INFO_SYM: &str = "HMI";

    /// `HARDWARE_MODULE_API_VERSION(2, 1)`; the only device version the bridge speaks
    pub const DEVICE_API_VERSION: u32 = (2 << 8) | 1;

    /// Extended command toggling the panel brightness mode for FOD
    pub const COMMAND_NIT: i32 = 10;
    pub const PARAM_NIT_FOD: i32 = 1;
    pub const PARAM_NIT_NONE: i32 = 0;

    /// First code the driver uses for vendor specific errors
    pub const ERROR_VENDOR_BASE: i32 = 1000;

    /// First code the driver uses for vendor specific acquisition messages
    pub const ACQUIRED_VENDOR_BASE: i32 = 1000;
}

/// Power hint settings
pub mod boost {
    /// Power service instance the extension hangs off
    pub const POWER_INSTANCE: &str = "android.hardware.power.IPower/default";

    /// Boost requested after a successful match
    pub const AUTHENTICATED_BOOST: &str = "LAUNCH";

    pub const AUTHENTICATED_BOOST_DURATION_MS: i32 = 2000;
}

/// FOD watcher settings
pub mod fod {
    /// Overlay transitions buffered between the watcher and the dispatcher
    pub const EVENT_QUEUE_DEPTH: usize = 8;
}

/// Socket server limits
pub mod server {
    use std::time::Duration;

    pub const MAX_CONNECTIONS: usize = 8;

    /// Pending driver events per subscribed connection
    pub const EVENT_QUEUE_DEPTH: usize = 64;

    pub const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Socket permissions: owner and group (system) only
    pub const SOCKET_MODE: u32 = 0o660;
}
