//! Early-boot property setup for the raphael family: variant identity and
//! Dalvik heap sizing.

pub mod dalvik_heap;
pub mod variant;

use std::path::Path;

use rp_props::PropertyStore;
use tracing::warn;

/// Present only when booted into recovery
pub const RECOVERY_BINARY: &str = "/system/bin/recovery";

pub fn in_recovery() -> bool {
    Path::new(RECOVERY_BINARY).exists()
}

/// Override one property. A failed write is logged and reported as `false`;
/// callers keep going with the remaining properties.
pub fn property_override(props: &dyn PropertyStore, key: &str, value: &str, add: bool) -> bool {
    match props.override_value(key, value, add) {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to override {}: {}", key, e);
            false
        }
    }
}

/// Apply the selected variant, then size the Dalvik heap for `total_ram` bytes.
///
/// Returns the number of property writes that failed.
pub fn vendor_load_properties(props: &dyn PropertyStore, in_recovery: bool, total_ram: u64) -> usize {
    let (_, failed) = variant::search_variant(props, variant::VARIANTS, in_recovery);
    failed + dalvik_heap::set_dalvik_heap(props, total_ram)
}
