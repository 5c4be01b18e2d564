//! Dalvik heap sizing by installed memory

use std::io;

use rp_props::PropertyStore;
use tracing::info;

use crate::property_override;

const GIB: u64 = 1024 * 1024 * 1024;

pub const HEAPSTARTSIZE_PROP: &str = "dalvik.vm.heapstartsize";
pub const HEAPGROWTHLIMIT_PROP: &str = "dalvik.vm.heapgrowthlimit";
pub const HEAPSIZE_PROP: &str = "dalvik.vm.heapsize";
pub const HEAPTARGETUTILIZATION_PROP: &str = "dalvik.vm.heaptargetutilization";
pub const HEAPMINFREE_PROP: &str = "dalvik.vm.heapminfree";
pub const HEAPMAXFREE_PROP: &str = "dalvik.vm.heapmaxfree";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DalvikHeapInfo {
    pub heapstartsize: &'static str,
    pub heapgrowthlimit: &'static str,
    pub heapsize: &'static str,
    pub heaptargetutilization: &'static str,
    pub heapminfree: &'static str,
    pub heapmaxfree: &'static str,
}

pub const DALVIK_HEAP_INFO_8192: DalvikHeapInfo = DalvikHeapInfo {
    heapstartsize: "24m",
    heapgrowthlimit: "256m",
    heapsize: "512m",
    heaptargetutilization: "0.46",
    heapminfree: "8m",
    heapmaxfree: "48m",
};

pub const DALVIK_HEAP_INFO_6144: DalvikHeapInfo = DalvikHeapInfo {
    heapstartsize: "16m",
    heapgrowthlimit: "256m",
    heapsize: "512m",
    heaptargetutilization: "0.5",
    heapminfree: "8m",
    heapmaxfree: "32m",
};

pub const DALVIK_HEAP_INFO_4096: DalvikHeapInfo = DalvikHeapInfo {
    heapstartsize: "8m",
    heapgrowthlimit: "256m",
    heapsize: "512m",
    heaptargetutilization: "0.6",
    heapminfree: "8m",
    heapmaxfree: "16m",
};

pub const DALVIK_HEAP_INFO_2048: DalvikHeapInfo = DalvikHeapInfo {
    heapstartsize: "8m",
    heapgrowthlimit: "192m",
    heapsize: "512m",
    heaptargetutilization: "0.75",
    heapminfree: "512k",
    heapmaxfree: "8m",
};

/// Profile for a device with `total_ram` bytes of memory
pub fn heap_info_for(total_ram: u64) -> &'static DalvikHeapInfo {
    if total_ram > 7 * GIB {
        &DALVIK_HEAP_INFO_8192
    } else if total_ram > 5 * GIB {
        &DALVIK_HEAP_INFO_6144
    } else if total_ram > 3 * GIB {
        &DALVIK_HEAP_INFO_4096
    } else {
        &DALVIK_HEAP_INFO_2048
    }
}

/// Installed memory as reported by the kernel
pub fn total_ram() -> io::Result<u64> {
    // SAFETY: sysinfo is plain old data; all-zero is a valid value.
    let mut info: libc::sysinfo = unsafe { std::mem::zeroed() };
    // SAFETY: info is a valid, writable sysinfo struct.
    if unsafe { libc::sysinfo(&mut info) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(info.totalram as u64 * info.mem_unit as u64)
}

/// Write the heap profile for `total_ram` bytes. Returns the number of failed writes.
pub fn set_dalvik_heap(props: &dyn PropertyStore, total_ram: u64) -> usize {
    let heap = heap_info_for(total_ram);
    info!("Dalvik heap profile {} for {} MiB", heap.heapgrowthlimit, total_ram / (1024 * 1024));

    [
        (HEAPSTARTSIZE_PROP, heap.heapstartsize),
        (HEAPGROWTHLIMIT_PROP, heap.heapgrowthlimit),
        (HEAPSIZE_PROP, heap.heapsize),
        (HEAPTARGETUTILIZATION_PROP, heap.heaptargetutilization),
        (HEAPMINFREE_PROP, heap.heapminfree),
        (HEAPMAXFREE_PROP, heap.heapmaxfree),
    ]
    .into_iter()
    .filter(|(key, value)| !property_override(props, key, value, true))
    .count()
}
