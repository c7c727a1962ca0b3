//! Optional updater marker patch: writes the package-format name after a
//! fixed marker string inside the main executable, so code built into the
//! app can detect its own install format at runtime (e.g. to choose an
//! update mechanism).
//!
//! Byte-pattern search via `windows().position(...)`; absence of the
//! marker is not an error, since not every binary opts into this.

use crate::error::{ErrorExt, Result};
use crate::platform::PackageFormat;

const MARKER: &[u8] = b"__APPBUNDLER_PACKAGE_FORMAT";

fn find_pattern(data: &[u8], pattern: &[u8]) -> Option<usize> {
    data.windows(pattern.len()).position(|w| w == pattern)
}

/// Search `binary_path` for [`MARKER`] and, if found, write `format`'s
/// short name into the bytes immediately following it. Absence of the
/// marker is not an error: the feature is opt-in, so a binary that never
/// declared the marker simply doesn't get patched.
pub async fn patch_binary(binary_path: &std::path::Path, format: PackageFormat) -> Result<()> {
    let mut data = tokio::fs::read(binary_path)
        .await
        .fs_context("reading binary for marker patch", binary_path)?;

    let Some(marker_pos) = find_pattern(&data, MARKER) else {
        log::debug!("no updater marker found in {binary_path:?}, skipping patch");
        return Ok(());
    };

    let value = format.short_name().as_bytes();
    let write_at = marker_pos + MARKER.len() + 1;
    if write_at + value.len() > data.len() {
        log::warn!("not enough space after marker in {binary_path:?} to write package format");
        return Ok(());
    }
    data[write_at..write_at + value.len()].copy_from_slice(value);

    tokio::fs::write(binary_path, &data)
        .await
        .fs_context("writing patched binary", binary_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_pattern_in_middle() {
        let data = b"xxxxMARKERyyyy";
        assert_eq!(find_pattern(data, b"MARKER"), Some(4));
    }

    #[test]
    fn returns_none_when_absent() {
        let data = b"no marker here";
        assert_eq!(find_pattern(data, b"MARKER"), None);
    }

    #[test]
    fn finds_pattern_at_start() {
        let data = b"MARKERxxxx";
        assert_eq!(find_pattern(data, b"MARKER"), Some(0));
    }
}
