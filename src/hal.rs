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

//! Vendor fingerprint modules
//!
//! Locating and opening `fingerprint.<class>` HAL libraries the way
//! libhardware does, plus the safe [`VendorDevice`] facade the bridge calls.
//!
//! # Module discovery
//!
//! For a class such as `goodix_fod` the library name is
//! `fingerprint.goodix_fod.<variant>.so`. Variants are tried in order:
//! - `ro.hardware.fingerprint.goodix_fod`
//! - `ro.hardware`, `ro.product.board`, `ro.board.platform`, `ro.arch`
//! - `default`
//!
//! and for each variant every search directory is probed before moving on.

use std::ffi::{CStr, CString};
use std::path::{Path, PathBuf};
use std::ptr::{self, NonNull};
use std::sync::Arc;

use rp_error::{RaphaelError, Result};
use rp_props::PropertyStore;
use tracing::{debug, error, info};

use crate::constants::{hal, props};
use crate::ffi::*;

/// A named vendor module and whether it drives an under-display sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleDescriptor {
    pub class_name: &'static str,
    pub fod: bool,
}

/// Modules probed at startup, first to open wins
pub const MODULES: &[ModuleDescriptor] = &[
    ModuleDescriptor { class_name: "fpc", fod: false },
    ModuleDescriptor { class_name: "fpc_fod", fod: true },
    ModuleDescriptor { class_name: "goodix", fod: false },
    ModuleDescriptor { class_name: "goodix_fod", fod: true },
    ModuleDescriptor { class_name: "goodix_fod6", fod: true },
    ModuleDescriptor { class_name: "silead", fod: false },
    ModuleDescriptor { class_name: "syna", fod: true },
];

/// Operations of an opened fingerprint device.
///
/// Status-returning calls hand back the raw driver code (0 or negative errno).
#[cfg_attr(test, mockall::automock)]
pub trait VendorDevice: Send + Sync {
    /// Stable per-process handle reported to clients
    fn device_id(&self) -> u64;
    fn pre_enroll(&self) -> u64;
    fn enroll(&self, hat: &HwAuthToken, gid: u32, timeout_sec: u32) -> i32;
    fn post_enroll(&self) -> i32;
    fn get_authenticator_id(&self) -> u64;
    fn cancel(&self) -> i32;
    fn enumerate(&self) -> i32;
    fn remove(&self, gid: u32, fid: u32) -> i32;
    fn set_active_group(&self, gid: u32, store_path: &CStr) -> i32;
    fn authenticate(&self, operation_id: u64, gid: u32) -> i32;
    fn ext_cmd(&self, cmd: i32, param: i32) -> i32;
}

/// Something that can open a module by class name
#[cfg_attr(test, mockall::automock)]
pub trait ModuleOpener {
    fn open(&self, class_name: &str) -> Result<Box<dyn VendorDevice>>;
}

/// Walk [`MODULES`] in order and return the first device that opens.
pub fn open_first(opener: &dyn ModuleOpener) -> Option<(Box<dyn VendorDevice>, ModuleDescriptor)> {
    for module in MODULES {
        match opener.open(module.class_name) {
            Ok(device) => {
                info!("Opened fingerprint HAL, class {}", module.class_name);
                return Some((device, *module));
            }
            Err(e) => {
                error!("Can't open HAL module, class {}: {}", module.class_name, e);
            }
        }
    }
    error!("Can't open any HAL module");
    None
}

// ============================================================================
// libhardware-style registry
// ============================================================================

/// Loads HAL libraries from disk and opens them
pub struct HardwareModuleRegistry {
    search_dirs: Vec<PathBuf>,
    props: Arc<dyn PropertyStore>,
    notify: unsafe extern "C" fn(*const FingerprintMsg),
}

impl HardwareModuleRegistry {
    /// `notify` is registered with every device this registry opens.
    pub fn new(
        search_dirs: Vec<PathBuf>,
        props: Arc<dyn PropertyStore>,
        notify: unsafe extern "C" fn(*const FingerprintMsg),
    ) -> Self {
        Self { search_dirs, props, notify }
    }

    /// Resolve the library for `fingerprint.<class_name>`, if any is installed.
    pub fn find_library(&self, class_name: &str) -> Option<PathBuf> {
        let name = format!("{}.{}", hal::MODULE_ID, class_name);

        let mut variants: Vec<String> = Vec::new();
        if let Some(v) = self.props.get(&format!("ro.hardware.{}", name)).filter(|v| !v.is_empty()) {
            variants.push(v);
        }
        for key in props::HAL_VARIANT_KEYS {
            if let Some(v) = self.props.get(key).filter(|v| !v.is_empty()) {
                variants.push(v);
            }
        }
        variants.push("default".to_string());

        for variant in &variants {
            for dir in &self.search_dirs {
                let candidate = dir.join(format!("{}.{}.so", name, variant));
                if candidate.exists() {
                    debug!("Found {} at {}", name, candidate.display());
                    return Some(candidate);
                }
            }
        }
        None
    }

    fn load_module(&self, class_name: &str, path: &Path) -> Result<*const HwModule> {
        let c_path = CString::new(path.as_os_str().to_string_lossy().as_bytes())
            .map_err(|e| RaphaelError::module_load(class_name, e.to_string()))?;

        // SAFETY: c_path is a valid NUL terminated string.
        let handle = unsafe { libc::dlopen(c_path.as_ptr(), libc::RTLD_NOW) };
        if handle.is_null() {
            return Err(RaphaelError::module_load(class_name, dl_error()));
        }

        let sym = CString::new(hal::HAL_MODULE_INFO_SYM).map_err(|e| RaphaelError::module_load(class_name, e.to_string()))?;
        // SAFETY: handle came from a successful dlopen, sym is NUL terminated.
        let hmi = unsafe { libc::dlsym(handle, sym.as_ptr()) } as *mut HwModule;
        if hmi.is_null() {
            let reason = dl_error();
            // SAFETY: handle is a live dlopen handle that nothing else references yet.
            unsafe { libc::dlclose(handle) };
            return Err(RaphaelError::module_load(class_name, format!("no {} symbol: {}", hal::HAL_MODULE_INFO_SYM, reason)));
        }

        // SAFETY: HMI points at the library's static hw_module_t, which lives until dlclose.
        let id = unsafe {
            let module = &mut *hmi;
            if module.id.is_null() {
                None
            } else {
                module.dso = handle;
                Some(CStr::from_ptr(module.id).to_string_lossy().into_owned())
            }
        };
        if id.as_deref() != Some(hal::MODULE_ID) {
            // SAFETY: as above; the module is discarded.
            unsafe { libc::dlclose(handle) };
            return Err(RaphaelError::module_load(
                class_name,
                format!("module id mismatch: {:?} != {}", id, hal::MODULE_ID),
            ));
        }

        debug!("Loaded {} from {}", class_name, path.display());
        Ok(hmi)
    }

    fn open_device(&self, class_name: &str, module: *const HwModule) -> Result<NativeDevice> {
        // SAFETY: module was validated by load_module and stays mapped.
        let open = unsafe {
            let methods = (*module).methods;
            if methods.is_null() {
                None
            } else {
                (*methods).open
            }
        };
        let open = open.ok_or_else(|| RaphaelError::module_load(class_name, "No valid open method"))?;

        let mut raw: *mut HwDevice = ptr::null_mut();
        // SAFETY: open follows the hw_module_methods_t contract; raw receives the device.
        let rc = unsafe { open(module, ptr::null(), &mut raw) };
        if rc != 0 {
            return Err(RaphaelError::ModuleOpen { module: class_name.to_string(), code: rc });
        }
        let dev = NonNull::new(raw as *mut XiaomiFingerprintDevice)
            .ok_or_else(|| RaphaelError::module_load(class_name, "open returned no device"))?;

        // From here on NativeDevice owns the device and closes it on failure.
        let device = NativeDevice { dev, class_name: class_name.to_string() };

        // SAFETY: dev points at a live device returned by open.
        let version = unsafe { (*raw).version };
        if version != hal::DEVICE_API_VERSION {
            return Err(RaphaelError::VersionMismatch { expected: hal::DEVICE_API_VERSION, actual: version });
        }

        let rc = match device.table().set_notify {
            // SAFETY: registering a 'static extern "C" function with a live device.
            Some(set_notify) => unsafe { set_notify(dev.as_ptr(), Some(self.notify)) },
            None => -libc::ENOSYS,
        };
        if rc != 0 {
            return Err(RaphaelError::NotifyRegistration(rc));
        }

        Ok(device)
    }
}

impl ModuleOpener for HardwareModuleRegistry {
    fn open(&self, class_name: &str) -> Result<Box<dyn VendorDevice>> {
        debug!("Opening fingerprint hal library...");
        let path = self
            .find_library(class_name)
            .ok_or_else(|| RaphaelError::ModuleNotFound(format!("{}.{}", hal::MODULE_ID, class_name)))?;
        let module = self.load_module(class_name, &path)?;
        let device = self.open_device(class_name, module)?;
        Ok(Box::new(device))
    }
}

fn dl_error() -> String {
    // SAFETY: dlerror returns NULL or a thread-local NUL terminated string.
    unsafe {
        let msg = libc::dlerror();
        if msg.is_null() {
            "unknown dl error".to_string()
        } else {
            CStr::from_ptr(msg).to_string_lossy().into_owned()
        }
    }
}

// ============================================================================
// Native device
// ============================================================================

/// An opened `xiaomi_fingerprint_device_t`, closed on drop
pub struct NativeDevice {
    dev: NonNull<XiaomiFingerprintDevice>,
    class_name: String,
}

// SAFETY: the HAL contract has the framework call the device from arbitrary
// binder threads and the driver from its own thread; the vendor library
// serializes internally.
unsafe impl Send for NativeDevice {}
unsafe impl Sync for NativeDevice {}

impl NativeDevice {
    fn table(&self) -> &XiaomiFingerprintDevice {
        // SAFETY: dev is live until Drop.
        unsafe { self.dev.as_ref() }
    }

    fn ptr(&self) -> *mut XiaomiFingerprintDevice {
        self.dev.as_ptr()
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }
}

// Each call below passes the live device pointer to the vendor function of
// the same name; a missing entry reports ENOSYS (or 0 for id calls).
impl VendorDevice for NativeDevice {
    fn device_id(&self) -> u64 {
        self.ptr() as usize as u64
    }

    fn pre_enroll(&self) -> u64 {
        match self.table().pre_enroll {
            // SAFETY: see impl comment.
            Some(f) => unsafe { f(self.ptr()) },
            None => 0,
        }
    }

    fn enroll(&self, hat: &HwAuthToken, gid: u32, timeout_sec: u32) -> i32 {
        match self.table().enroll {
            // SAFETY: hat outlives the call; the driver copies it.
            Some(f) => unsafe { f(self.ptr(), hat as *const HwAuthToken, gid, timeout_sec) },
            None => -libc::ENOSYS,
        }
    }

    fn post_enroll(&self) -> i32 {
        match self.table().post_enroll {
            // SAFETY: see impl comment.
            Some(f) => unsafe { f(self.ptr()) },
            None => -libc::ENOSYS,
        }
    }

    fn get_authenticator_id(&self) -> u64 {
        match self.table().get_authenticator_id {
            // SAFETY: see impl comment.
            Some(f) => unsafe { f(self.ptr()) },
            None => 0,
        }
    }

    fn cancel(&self) -> i32 {
        match self.table().cancel {
            // SAFETY: see impl comment.
            Some(f) => unsafe { f(self.ptr()) },
            None => -libc::ENOSYS,
        }
    }

    fn enumerate(&self) -> i32 {
        match self.table().enumerate {
            // SAFETY: see impl comment.
            Some(f) => unsafe { f(self.ptr()) },
            None => -libc::ENOSYS,
        }
    }

    fn remove(&self, gid: u32, fid: u32) -> i32 {
        match self.table().remove {
            // SAFETY: see impl comment.
            Some(f) => unsafe { f(self.ptr(), gid, fid) },
            None => -libc::ENOSYS,
        }
    }

    fn set_active_group(&self, gid: u32, store_path: &CStr) -> i32 {
        match self.table().set_active_group {
            // SAFETY: store_path is NUL terminated and outlives the call.
            Some(f) => unsafe { f(self.ptr(), gid, store_path.as_ptr()) },
            None => -libc::ENOSYS,
        }
    }

    fn authenticate(&self, operation_id: u64, gid: u32) -> i32 {
        match self.table().authenticate {
            // SAFETY: see impl comment.
            Some(f) => unsafe { f(self.ptr(), operation_id, gid) },
            None => -libc::ENOSYS,
        }
    }

    fn ext_cmd(&self, cmd: i32, param: i32) -> i32 {
        match self.table().ext_cmd {
            // SAFETY: see impl comment.
            Some(f) => unsafe { f(self.ptr(), cmd, param) },
            None => -libc::ENOSYS,
        }
    }
}

impl Drop for NativeDevice {
    fn drop(&mut self) {
        debug!("Closing fingerprint module {}", self.class_name);
        if let Some(close) = self.table().common.close {
            // SAFETY: the device is not used after close.
            let err = unsafe { close(self.ptr() as *mut HwDevice) };
            if err != 0 {
                error!("Can't close fingerprint module, error: {}", err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rp_props::MemoryProperties;
    use std::fs;
    use tempfile::TempDir;

    unsafe extern "C" fn noop_notify(_msg: *const FingerprintMsg) {}

    fn registry(dirs: &[&Path], props: MemoryProperties) -> HardwareModuleRegistry {
        HardwareModuleRegistry::new(
            dirs.iter().map(|d| d.to_path_buf()).collect(),
            Arc::new(props),
            noop_notify,
        )
    }

    #[test]
    fn test_module_table_order() {
        let names: Vec<&str> = MODULES.iter().map(|m| m.class_name).collect();
        assert_eq!(names, ["fpc", "fpc_fod", "goodix", "goodix_fod", "goodix_fod6", "silead", "syna"]);
        let fod: Vec<bool> = MODULES.iter().map(|m| m.fod).collect();
        assert_eq!(fod, [false, true, false, true, true, false, true]);
    }

    #[test]
    fn test_open_first_stops_at_first_success() {
        let mut opener = MockModuleOpener::new();
        opener
            .expect_open()
            .withf(|c| c == "fpc" || c == "fpc_fod" || c == "goodix")
            .times(3)
            .returning(|c| {
                if c == "goodix" {
                    Ok(Box::new(MockVendorDevice::new()) as Box<dyn VendorDevice>)
                } else {
                    Err(RaphaelError::ModuleNotFound(c.to_string()))
                }
            });

        let (_, module) = open_first(&opener).expect("goodix should open");
        assert_eq!(module.class_name, "goodix");
        assert!(!module.fod);
    }

    #[test]
    fn test_open_first_none_opens() {
        let mut opener = MockModuleOpener::new();
        opener
            .expect_open()
            .times(MODULES.len())
            .returning(|c| Err(RaphaelError::ModuleNotFound(c.to_string())));
        assert!(open_first(&opener).is_none());
    }

    #[test]
    fn test_find_library_uses_board_platform() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("fingerprint.goodix_fod.default.so"), b"").unwrap();
        fs::write(tmp.path().join("fingerprint.goodix_fod.msmnile.so"), b"").unwrap();

        let props = MemoryProperties::with_values([("ro.board.platform", "msmnile")]);
        let reg = registry(&[tmp.path()], props);
        assert_eq!(
            reg.find_library("goodix_fod"),
            Some(tmp.path().join("fingerprint.goodix_fod.msmnile.so"))
        );
    }

    #[test]
    fn test_find_library_class_property_wins() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("fingerprint.goodix_fod.qcom.so"), b"").unwrap();
        fs::write(tmp.path().join("fingerprint.goodix_fod.raphael.so"), b"").unwrap();
        fs::write(tmp.path().join("fingerprint.goodix_fod.default.so"), b"").unwrap();

        let props = MemoryProperties::with_values([
            ("ro.hardware.fingerprint.goodix_fod", "raphael"),
            ("ro.hardware", "qcom"),
        ]);
        let reg = registry(&[tmp.path()], props);
        assert_eq!(
            reg.find_library("goodix_fod"),
            Some(tmp.path().join("fingerprint.goodix_fod.raphael.so"))
        );
        // the class property only applies to its own class
        fs::write(tmp.path().join("fingerprint.fpc.qcom.so"), b"").unwrap();
        assert_eq!(reg.find_library("fpc"), Some(tmp.path().join("fingerprint.fpc.qcom.so")));
    }

    #[test]
    fn test_find_library_falls_back_to_default() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("fingerprint.fpc.default.so"), b"").unwrap();

        let reg = registry(&[tmp.path()], MemoryProperties::with_values([("ro.hardware", "qcom")]));
        assert_eq!(reg.find_library("fpc"), Some(tmp.path().join("fingerprint.fpc.default.so")));
        assert_eq!(reg.find_library("syna"), None);
    }

    #[test]
    fn test_find_library_searches_dirs_in_order() {
        let odm = TempDir::new().unwrap();
        let vendor = TempDir::new().unwrap();
        fs::write(odm.path().join("fingerprint.silead.default.so"), b"").unwrap();
        fs::write(vendor.path().join("fingerprint.silead.default.so"), b"").unwrap();

        let reg = registry(&[odm.path(), vendor.path()], MemoryProperties::new());
        assert_eq!(reg.find_library("silead"), Some(odm.path().join("fingerprint.silead.default.so")));
    }

    #[test]
    fn test_open_missing_library_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let reg = registry(&[tmp.path()], MemoryProperties::new());
        assert!(matches!(reg.open("fpc"), Err(RaphaelError::ModuleNotFound(_))));
    }

    #[test]
    fn test_open_garbage_library_fails_cleanly() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("fingerprint.fpc.default.so"), b"not an elf").unwrap();
        let reg = registry(&[tmp.path()], MemoryProperties::new());
        assert!(matches!(reg.open("fpc"), Err(RaphaelError::ModuleLoad { .. })));
    }
}
