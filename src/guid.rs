//! Deterministic GUID derivation used for the MSI `UpgradeCode`.
//!
//! Derives a stable, reproducible GUID from a seed string using the same
//! SHA-256 machinery used elsewhere for checksums, so the same bundle
//! identifier always produces the same `UpgradeCode` across rebuilds,
//! letting MSI upgrades detect the product family correctly.

use sha2::{Digest, Sha256};

/// Derive a GUID-shaped string (`XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX`,
/// uppercase hex) from `seed` by hashing it with SHA-256 and reinterpreting
/// the first 16 bytes of the digest as two little-endian `u64`s.
///
/// This is a pure function: the same seed always yields the same GUID,
/// unlike a randomly generated UUID.
pub fn deterministic_guid(seed: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    let digest = hasher.finalize();

    let high = u64::from_le_bytes(digest[0..8].try_into().unwrap());
    let low = u64::from_le_bytes(digest[8..16].try_into().unwrap());

    let hex = format!("{high:016X}{low:016X}");
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_yields_same_guid() {
        assert_eq!(
            deterministic_guid("com.example.app"),
            deterministic_guid("com.example.app")
        );
    }

    #[test]
    fn different_seeds_yield_different_guids() {
        assert_ne!(
            deterministic_guid("com.example.app"),
            deterministic_guid("com.example.other")
        );
    }

    #[test]
    fn guid_has_canonical_shape() {
        let guid = deterministic_guid("seed");
        let parts: Vec<&str> = guid.split('-').collect();
        assert_eq!(
            parts.iter().map(|p| p.len()).collect::<Vec<_>>(),
            vec![8, 4, 4, 4, 12]
        );
        assert!(guid.chars().all(|c| c.is_ascii_hexdigit() || c == '-'));
    }
}
