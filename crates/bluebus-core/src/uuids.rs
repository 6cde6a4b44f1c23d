//! UUID syntax checks and the advertised-UUID predicate

use tracing::warn;
use uuid::Uuid;

/// Suffix of the Bluetooth base UUID that 16-bit UUIDs expand into
const BASE_UUID_SUFFIX: &str = "-0000-1000-8000-00805f9b34fb";

/// Whether `u` is a 16-bit short UUID (`180d`) or a full 128-bit UUID in
/// the lowercase hyphenated form the daemon reports.
pub fn valid_uuid(u: &str) -> bool {
    match u.len() {
        4 => u.bytes().all(is_lower_hex),
        36 => {
            u.bytes().all(|b| b == b'-' || is_lower_hex(b))
                && Uuid::try_parse(u)
                    .map(|parsed| parsed.hyphenated().to_string() == u)
                    .unwrap_or(false)
        }
        _ => false,
    }
}

fn is_lower_hex(b: u8) -> bool {
    b.is_ascii_digit() || (b'a'..=b'f').contains(&b)
}

/// Expand a 16-bit UUID into its 128-bit form; other input is returned unchanged
pub fn long_uuid(u: &str) -> String {
    if u.len() == 4 && valid_uuid(u) {
        format!("0000{}{}", u, BASE_UUID_SUFFIX)
    } else {
        u.to_string()
    }
}

/// Whether every requested UUID is valid and present in `advertised`.
///
/// Membership is exact and case-sensitive; order does not matter. An invalid
/// UUID is logged and fails the match.
pub fn uuids_include(advertised: &[String], requested: &[&str]) -> bool {
    for u in requested {
        if !valid_uuid(u) {
            warn!("invalid UUID {}", u);
            return false;
        }
        if !advertised.iter().any(|a| a == u) {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEART_RATE: &str = "0000180d-0000-1000-8000-00805f9b34fb";
    const BATTERY: &str = "0000180f-0000-1000-8000-00805f9b34fb";

    fn advertised(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_valid_uuid_forms() {
        assert!(valid_uuid("180d"));
        assert!(valid_uuid(HEART_RATE));
        assert!(!valid_uuid("180D"));
        assert!(!valid_uuid("0000180D-0000-1000-8000-00805F9B34FB"));
        assert!(!valid_uuid("0000180d00001000800000805f9b34fb"));
        assert!(!valid_uuid("0000180d-0000-1000-8000-00805f9b34fx"));
        assert!(!valid_uuid(""));
    }

    #[test]
    fn test_long_uuid() {
        assert_eq!(long_uuid("180d"), HEART_RATE);
        assert_eq!(long_uuid(BATTERY), BATTERY);
    }

    #[test]
    fn test_subset_is_order_independent() {
        let adv = advertised(&[BATTERY, HEART_RATE]);
        assert!(uuids_include(&adv, &[HEART_RATE, BATTERY]));
        assert!(uuids_include(&adv, &[BATTERY]));
        assert!(uuids_include(&adv, &[]));
    }

    #[test]
    fn test_missing_member_fails() {
        let adv = advertised(&[BATTERY]);
        assert!(!uuids_include(&adv, &[HEART_RATE]));
    }

    #[test]
    fn test_case_sensitive_membership() {
        let adv = advertised(&["0000180D-0000-1000-8000-00805F9B34FB"]);
        assert!(!uuids_include(&adv, &[HEART_RATE]));
    }

    #[test]
    fn test_invalid_uuid_fails_even_when_advertised_empty() {
        assert!(!uuids_include(&[], &["not-a-uuid"]));
        let adv = advertised(&[HEART_RATE]);
        assert!(!uuids_include(&adv, &[HEART_RATE, "xyz"]));
    }

    #[test]
    fn test_no_substring_matching() {
        let adv = advertised(&[HEART_RATE]);
        assert!(!uuids_include(&adv, &["180d"]));
    }
}
