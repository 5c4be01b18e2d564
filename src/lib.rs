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

//! raphael-biometrics - fingerprint HAL bridge for the Xiaomi raphael family
//!
//! Opens the vendor fingerprint module, forwards client requests to it and
//! relays driver callbacks back, with the FOD overlay watcher and the
//! post-authentication power boost on the side.

pub mod boost;
pub mod bridge;
pub mod callback;
pub mod config;
pub mod constants;
pub mod ffi;
pub mod fod;
pub mod hal;
pub mod logger;
pub mod message;
pub mod power_client;
pub mod registry;
pub mod server;
pub mod status;

pub use bridge::BiometricsFingerprint;
pub use callback::{CallbackError, ClientCallback};
