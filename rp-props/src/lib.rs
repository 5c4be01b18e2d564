//! System property access
//!
//! Android keeps a process-wide key/value store that other system components
//! read at boot. This crate puts a small trait in front of it so the
//! fingerprint bridge and the variant selector can be exercised against an
//! in-memory store.
//!
//! - Android targets talk to bionic directly (`__system_property_*`).
//! - Other targets shell out to `getprop` / `setprop`, which is what a
//!   development host with the platform tools installed provides.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use rp_error::{RaphaelError, Result};

/// Longest value bionic accepts for a mutable property (including the NUL)
pub const PROP_VALUE_MAX: usize = 92;

/// Process-wide key/value property store
pub trait PropertyStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Overwrite a property even if it is read-only. When the property does
    /// not exist yet it is only created if `add` is set.
    fn override_value(&self, key: &str, value: &str, add: bool) -> Result<()>;
}

/// Reject keys and values bionic would refuse anyway
pub fn validate(key: &str, value: &str) -> Result<()> {
    if key.is_empty() {
        return Err(RaphaelError::InvalidProperty {
            key: key.to_string(),
            reason: "empty key".into(),
        });
    }
    if key.contains(|c: char| c == '\0' || c.is_whitespace()) {
        return Err(RaphaelError::InvalidProperty {
            key: key.to_string(),
            reason: "key contains whitespace or NUL".into(),
        });
    }
    if value.contains('\0') {
        return Err(RaphaelError::InvalidProperty {
            key: key.to_string(),
            reason: "value contains NUL".into(),
        });
    }
    // ro.* values may be long; everything else is capped by the property area layout
    if !key.starts_with("ro.") && value.len() >= PROP_VALUE_MAX {
        return Err(RaphaelError::InvalidProperty {
            key: key.to_string(),
            reason: format!("value is {} bytes (max {})", value.len(), PROP_VALUE_MAX - 1),
        });
    }
    Ok(())
}

// ============================================================================
// Platform store
// ============================================================================

/// The real system property store of the running device
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProperties;

impl SystemProperties {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(target_os = "android")]
mod bionic {
    use std::ffi::{CStr, CString};

    use libc::{c_char, c_int, c_uint};

    use rp_error::{RaphaelError, Result};

    use super::PROP_VALUE_MAX;

    #[repr(C)]
    pub struct PropInfo {
        _private: [u8; 0],
    }

    extern "C" {
        fn __system_property_get(name: *const c_char, value: *mut c_char) -> c_int;
        fn __system_property_set(name: *const c_char, value: *const c_char) -> c_int;
        fn __system_property_find(name: *const c_char) -> *const PropInfo;
        fn __system_property_update(pi: *mut PropInfo, value: *const c_char, len: c_uint) -> c_int;
        fn __system_property_add(
            name: *const c_char,
            namelen: c_uint,
            value: *const c_char,
            valuelen: c_uint,
        ) -> c_int;
    }

    fn c_strings(key: &str, value: &str) -> Result<(CString, CString)> {
        let k = CString::new(key).map_err(|e| RaphaelError::property_write(key, e.to_string()))?;
        let v = CString::new(value).map_err(|e| RaphaelError::property_write(key, e.to_string()))?;
        Ok((k, v))
    }

    pub fn get(key: &str) -> Option<String> {
        let k = CString::new(key).ok()?;
        let mut buf = [0 as c_char; PROP_VALUE_MAX];
        // SAFETY: `k` is NUL terminated and `buf` has the PROP_VALUE_MAX bytes bionic writes at most.
        let len = unsafe { __system_property_get(k.as_ptr(), buf.as_mut_ptr()) };
        if len <= 0 {
            return None;
        }
        // SAFETY: bionic NUL terminates the value it copied into `buf`.
        let value = unsafe { CStr::from_ptr(buf.as_ptr()) };
        Some(value.to_string_lossy().into_owned())
    }

    pub fn set(key: &str, value: &str) -> Result<()> {
        let (k, v) = c_strings(key, value)?;
        // SAFETY: both pointers are valid NUL terminated strings for the duration of the call.
        let rc = unsafe { __system_property_set(k.as_ptr(), v.as_ptr()) };
        if rc != 0 {
            return Err(RaphaelError::property_write(key, format!("__system_property_set returned {}", rc)));
        }
        Ok(())
    }

    pub fn override_value(key: &str, value: &str, add: bool) -> Result<()> {
        let (k, v) = c_strings(key, value)?;
        // SAFETY: `k` is a valid NUL terminated string.
        let pi = unsafe { __system_property_find(k.as_ptr()) };
        let rc = if !pi.is_null() {
            // SAFETY: `pi` came from __system_property_find and the value length matches `v`.
            unsafe { __system_property_update(pi as *mut PropInfo, v.as_ptr(), value.len() as c_uint) }
        } else if add {
            // SAFETY: lengths match the NUL terminated buffers passed alongside them.
            unsafe {
                __system_property_add(k.as_ptr(), key.len() as c_uint, v.as_ptr(), value.len() as c_uint)
            }
        } else {
            return Ok(());
        };
        if rc != 0 {
            return Err(RaphaelError::property_write(key, format!("property area update returned {}", rc)));
        }
        Ok(())
    }
}

#[cfg(target_os = "android")]
impl PropertyStore for SystemProperties {
    fn get(&self, key: &str) -> Option<String> {
        bionic::get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        validate(key, value)?;
        bionic::set(key, value)
    }

    fn override_value(&self, key: &str, value: &str, add: bool) -> Result<()> {
        validate(key, value)?;
        bionic::override_value(key, value, add)
    }
}

#[cfg(not(target_os = "android"))]
impl PropertyStore for SystemProperties {
    fn get(&self, key: &str) -> Option<String> {
        use std::process::Command;

        let output = Command::new("getprop").arg(key).output().ok()?;
        if !output.status.success() {
            return None;
        }
        let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        use std::process::Command;

        validate(key, value)?;
        let output = Command::new("setprop")
            .args([key, value])
            .output()
            .map_err(|e| RaphaelError::property_write(key, format!("could not run setprop: {}", e)))?;
        if !output.status.success() {
            return Err(RaphaelError::property_write(
                key,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        tracing::debug!("setprop {}={}", key, value);
        Ok(())
    }

    /// `setprop` can't tell a new property from an existing one, so a missing
    /// property is only written when `add` is set.
    fn override_value(&self, key: &str, value: &str, add: bool) -> Result<()> {
        validate(key, value)?;
        if !add && self.get(key).is_none() {
            tracing::debug!("{} not set, leaving it alone", key);
            return Ok(());
        }
        self.set(key, value)
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Property store backed by a map; used by tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryProperties {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values<'a>(values: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let map = values
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self { values: Mutex::new(map) }
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.values.lock().clone()
    }
}

impl PropertyStore for MemoryProperties {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        validate(key, value)?;
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn override_value(&self, key: &str, value: &str, add: bool) -> Result<()> {
        validate(key, value)?;
        let mut values = self.values.lock();
        if add || values.contains_key(key) {
            values.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }
}
