//! MAC OUI (Organizationally Unique Identifier) vendor lookup
//!
//! Neighbor records carry the adjacent device's MAC address; the IEEE OUI
//! database turns it into a manufacturer name for reports.

/// Lookup the vendor/manufacturer name for a MAC address.
///
/// # Arguments
/// * `mac` - MAC address in any common format (e.g., "4C:5E:0C:11:22:33", "4C-5E-0C-11-22-33")
///
/// # Returns
/// * `Some(vendor_name)` if found in the OUI database
/// * `None` if the MAC address is invalid or not found
pub fn lookup_vendor(mac: &str) -> Option<String> {
    let normalized = normalize_mac(mac)?;

    match oui_data::lookup(&normalized) {
        Some(record) => {
            let vendor_name = record.organization().to_string();
            tracing::debug!("OUI lookup for {}: found {}", mac, vendor_name);
            Some(vendor_name)
        }
        None => {
            tracing::debug!("OUI lookup for {}: not found in database", mac);
            None
        }
    }
}

/// Normalize a MAC address to the format XX:XX:XX:XX:XX:XX.
///
/// Accepts colon, dash and dot separated forms. Anything that is not exactly
/// twelve hex digits is rejected.
pub fn normalize_mac(mac: &str) -> Option<String> {
    let cleaned: String = mac.trim().replace([':', '-', '.'], "").to_uppercase();

    if cleaned.len() != 12 || !cleaned.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    Some(format!(
        "{}:{}:{}:{}:{}:{}",
        &cleaned[0..2],
        &cleaned[2..4],
        &cleaned[4..6],
        &cleaned[6..8],
        &cleaned[8..10],
        &cleaned[10..12]
    ))
}

/// Short family name for well-known fleet equipment vendors.
pub fn vendor_family(vendor: &str) -> Option<&'static str> {
    let vendor_lower = vendor.to_lowercase();

    if vendor_lower.contains("mikrotik") || vendor_lower.contains("routerboard") {
        return Some("mikrotik");
    }
    if vendor_lower.contains("ubiquiti") {
        return Some("ubiquiti");
    }
    if vendor_lower.contains("cambium") {
        return Some("cambium");
    }
    if vendor_lower.contains("tp-link") {
        return Some("tp-link");
    }
    if vendor_lower.contains("cisco") || vendor_lower.contains("meraki") {
        return Some("cisco");
    }
    if vendor_lower.contains("juniper") {
        return Some("juniper");
    }
    if vendor_lower.contains("huawei") {
        return Some("huawei");
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_mac() {
        assert_eq!(
            normalize_mac("4c-5e-0c-11-22-33"),
            Some("4C:5E:0C:11:22:33".to_string())
        );
        assert_eq!(
            normalize_mac("4c5e.0c11.2233"),
            Some("4C:5E:0C:11:22:33".to_string())
        );
        assert_eq!(normalize_mac("4C:5E:0C"), None);
        assert_eq!(normalize_mac("ZZ:5E:0C:11:22:33"), None);
    }

    #[test]
    fn test_lookup_vendor_rejects_garbage() {
        assert_eq!(lookup_vendor("not-a-mac"), None);
    }

    #[test]
    fn test_vendor_family() {
        assert_eq!(vendor_family("Routerboard.com"), Some("mikrotik"));
        assert_eq!(vendor_family("Ubiquiti Inc"), Some("ubiquiti"));
        assert_eq!(vendor_family("Cisco Systems, Inc"), Some("cisco"));
        assert_eq!(vendor_family("Unknown Vendor"), None);
    }
}
