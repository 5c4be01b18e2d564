//! Device variant selection
//!
//! The raphael board ships as several retail variants that share one build.
//! At boot the hardware country code and SKU pick a record from a fixed
//! table, and the record's identity is written over the build properties.

use rp_props::PropertyStore;
use tracing::{debug, info, warn};

use crate::property_override;

pub const HWC_PROP: &str = "ro.boot.hwc";
pub const SKU_PROP: &str = "ro.boot.product.hardware.sku";

/// Partitions whose build properties are rewritten
pub const RO_PROP_SOURCES: &[&str] = &[
    "",
    "bootimage.",
    "odm.",
    "product.",
    "system.",
    "system_ext.",
    "vendor.",
    "vendor_dlkm.",
];

/// One retail variant. Empty match fields match anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantInfo {
    pub hwc_value: &'static str,
    pub sku_value: &'static str,

    pub brand: &'static str,
    pub device: &'static str,
    pub marketname: &'static str,
    pub model: &'static str,
    pub build_fingerprint: &'static str,

    pub nfc: bool,
}

impl VariantInfo {
    pub fn matches(&self, hwc: &str, sku: &str) -> bool {
        (self.hwc_value.is_empty() || self.hwc_value == hwc) && (self.sku_value.is_empty() || self.sku_value == sku)
    }
}

pub const RAPHAELIN_INFO: VariantInfo = VariantInfo {
    hwc_value: "INDIA",
    sku_value: "",

    brand: "Xiaomi",
    device: "raphaelin",
    marketname: "Redmi K20 Pro",
    model: "MZB7751IN",
    build_fingerprint: "Xiaomi/raphaelin/raphaelin:11/RKQ1.200826.002/V12.5.1.0.RFKINXM:user/release-keys",

    nfc: false,
};

pub const RAPHAEL_GLOBAL_INFO: VariantInfo = VariantInfo {
    hwc_value: "GLOBAL",
    sku_value: "",

    brand: "Xiaomi",
    device: "raphael",
    marketname: "Mi 9T Pro",
    model: "M1903F11G",
    build_fingerprint: "Xiaomi/raphael/raphael:11/RKQ1.200826.002/V12.5.2.0.RFKMIXM:user/release-keys",

    nfc: true,
};

pub const RAPHAEL_INFO: VariantInfo = VariantInfo {
    hwc_value: "",
    sku_value: "",

    brand: "Xiaomi",
    device: "raphael",
    marketname: "Redmi K20 Pro",
    model: "M1903F11A",
    build_fingerprint: "Xiaomi/raphael/raphael:11/RKQ1.200826.002/V12.5.6.0.RFKCNXM:user/release-keys",

    nfc: true,
};

/// Checked in order, first match wins
pub const VARIANTS: &[VariantInfo] = &[RAPHAELIN_INFO, RAPHAEL_GLOBAL_INFO, RAPHAEL_INFO];

/// Pick the record for the given hardware country code and SKU.
pub fn find_variant<'a>(variants: &'a [VariantInfo], hwc: &str, sku: &str) -> Option<&'a VariantInfo> {
    variants.iter().find(|v| v.matches(hwc, sku))
}

/// Override `ro.product.<src><prop>` (or `ro.<src>build.<prop>`) for every
/// source. Properties that don't exist are left alone. Returns the number of
/// failed writes.
pub fn set_ro_build_prop(props: &dyn PropertyStore, prop: &str, value: &str, product: bool) -> usize {
    RO_PROP_SOURCES
        .iter()
        .map(|source| {
            if product {
                format!("ro.product.{}{}", source, prop)
            } else {
                format!("ro.{}build.{}", source, prop)
            }
        })
        .filter(|name| !property_override(props, name, value, false))
        .count()
}

/// Derive `ro.build.description` from a build fingerprint.
///
/// `brand/product/device:version/id/number:variant/tags` becomes
/// `product-variant version id number tags`.
pub fn fingerprint_to_description(fingerprint: &str) -> Option<String> {
    let mut parts = fingerprint.splitn(3, ':');
    let (head, release, build) = (parts.next()?, parts.next()?, parts.next()?);

    let product = head.split('/').nth(1)?;
    let mut release = release.splitn(3, '/');
    let (version, id, number) = (release.next()?, release.next()?, release.next()?);
    let (variant, tags) = build.split_once('/')?;

    if [product, version, id, number, variant, tags].iter().any(|s| s.is_empty()) {
        return None;
    }
    Some(format!("{}-{} {} {} {} {}", product, variant, version, id, number, tags))
}

/// Write the identity of `variant`. The fingerprint props are skipped in
/// recovery, which reports the real build. Every property is attempted;
/// returns the number of failed writes.
pub fn set_variant_props(props: &dyn PropertyStore, variant: &VariantInfo, in_recovery: bool) -> usize {
    let mut failed = set_ro_build_prop(props, "brand", variant.brand, true)
        + set_ro_build_prop(props, "device", variant.device, true)
        + set_ro_build_prop(props, "marketname", variant.marketname, true)
        + set_ro_build_prop(props, "model", variant.model, true);

    if !in_recovery {
        failed += set_ro_build_prop(props, "fingerprint", variant.build_fingerprint, false);
        if !property_override(props, "ro.bootimage.build.fingerprint", variant.build_fingerprint, true) {
            failed += 1;
        }
        match fingerprint_to_description(variant.build_fingerprint) {
            Some(description) => {
                if !property_override(props, "ro.build.description", &description, true) {
                    failed += 1;
                }
            }
            None => warn!("Malformed build fingerprint {}", variant.build_fingerprint),
        }
    }

    if variant.nfc && !property_override(props, SKU_PROP, "nfc", true) {
        failed += 1;
    }
    failed
}

/// Read the board identifiers, select a variant and apply it. Returns the
/// selected variant and the number of failed property writes.
pub fn search_variant(props: &dyn PropertyStore, variants: &[VariantInfo], in_recovery: bool) -> (Option<VariantInfo>, usize) {
    let hwc = props.get(HWC_PROP).unwrap_or_default();
    let sku = props.get(SKU_PROP).unwrap_or_default();
    debug!("Board identifiers: hwc={:?} sku={:?}", hwc, sku);

    match find_variant(variants, &hwc, &sku) {
        Some(variant) => {
            info!("Selected variant {} ({})", variant.device, variant.model);
            let failed = set_variant_props(props, variant, in_recovery);
            (Some(*variant), failed)
        }
        None => {
            warn!("No variant matches hwc={:?} sku={:?}", hwc, sku);
            (None, 0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rp_props::MemoryProperties;

    /// Properties a stock build already defines, so the non-adding overrides apply
    fn stock_props(hwc: &str) -> MemoryProperties {
        let props = MemoryProperties::with_values([(HWC_PROP, hwc)]);
        for source in RO_PROP_SOURCES {
            for prop in ["brand", "device", "marketname", "model"] {
                props.set(&format!("ro.product.{}{}", source, prop), "stock").unwrap();
            }
            props.set(&format!("ro.{}build.fingerprint", source), "stock").unwrap();
        }
        props
    }

    #[test]
    fn test_india_selects_raphaelin() {
        assert_eq!(find_variant(VARIANTS, "INDIA", ""), Some(&RAPHAELIN_INFO));
    }

    #[test]
    fn test_global_selects_global_record() {
        assert_eq!(find_variant(VARIANTS, "GLOBAL", "whatever"), Some(&RAPHAEL_GLOBAL_INFO));
    }

    #[test]
    fn test_unknown_hwc_falls_back_to_default() {
        assert_eq!(find_variant(VARIANTS, "CN", ""), Some(&RAPHAEL_INFO));
        assert_eq!(find_variant(VARIANTS, "", ""), Some(&RAPHAEL_INFO));
        assert_eq!(find_variant(VARIANTS, "india", ""), Some(&RAPHAEL_INFO));
    }

    #[test]
    fn test_sku_field_must_match_when_set() {
        let only_pro = VariantInfo { sku_value: "pro", ..RAPHAEL_INFO };
        let table = [only_pro];
        assert!(find_variant(&table, "", "lite").is_none());
        assert_eq!(find_variant(&table, "", "pro"), Some(&only_pro));
    }

    #[test]
    fn test_description_from_fingerprint() {
        assert_eq!(
            fingerprint_to_description(RAPHAEL_INFO.build_fingerprint).as_deref(),
            Some("raphael-user 11 RKQ1.200826.002 V12.5.6.0.RFKCNXM release-keys")
        );
        assert_eq!(
            fingerprint_to_description(RAPHAELIN_INFO.build_fingerprint).as_deref(),
            Some("raphaelin-user 11 RKQ1.200826.002 V12.5.1.0.RFKINXM release-keys")
        );
        assert!(fingerprint_to_description("garbage").is_none());
        assert!(fingerprint_to_description("a/b/c:11/ID:user").is_none());
    }

    #[test]
    fn test_india_variant_props() {
        let props = stock_props("INDIA");
        let (selected, failed) = search_variant(&props, VARIANTS, false);
        assert_eq!(selected, Some(RAPHAELIN_INFO));
        assert_eq!(failed, 0);

        let values = props.snapshot();
        for source in RO_PROP_SOURCES {
            assert_eq!(values[&format!("ro.product.{}device", source)], "raphaelin");
            assert_eq!(values[&format!("ro.product.{}model", source)], "MZB7751IN");
            assert_eq!(values[&format!("ro.{}build.fingerprint", source)], RAPHAELIN_INFO.build_fingerprint);
        }
        assert_eq!(values["ro.bootimage.build.fingerprint"], RAPHAELIN_INFO.build_fingerprint);
        assert_eq!(
            values["ro.build.description"],
            "raphaelin-user 11 RKQ1.200826.002 V12.5.1.0.RFKINXM release-keys"
        );
        // no NFC on the Indian model
        assert!(!values.contains_key(SKU_PROP));
    }

    #[test]
    fn test_nfc_variant_sets_sku() {
        let props = stock_props("GLOBAL");
        search_variant(&props, VARIANTS, false);
        let values = props.snapshot();
        assert_eq!(values[SKU_PROP], "nfc");
        assert_eq!(values["ro.product.marketname"], "Mi 9T Pro");
    }

    #[test]
    fn test_missing_props_are_not_created() {
        let props = MemoryProperties::new();
        search_variant(&props, VARIANTS, false);
        let values = props.snapshot();
        assert!(!values.contains_key("ro.product.vendor_dlkm.brand"));
        assert!(!values.contains_key("ro.build.fingerprint"));
        assert_eq!(values["ro.bootimage.build.fingerprint"], RAPHAEL_INFO.build_fingerprint);
    }

    #[test]
    fn test_recovery_keeps_fingerprint() {
        let props = stock_props("");
        search_variant(&props, VARIANTS, true);
        let values = props.snapshot();
        assert_eq!(values["ro.product.model"], "M1903F11A");
        assert_eq!(values["ro.build.fingerprint"], "stock");
        assert!(!values.contains_key("ro.build.description"));
        assert_eq!(values["ro.bootimage.build.fingerprint"], "stock");
    }
}
