//! `.bundle`/`.resources` directory handling: SwiftPM-style resource
//! bundles produced alongside the main product, merged or copied into
//! the output bundle.
//!
//! A build may emit resource bundles named `<packageName>_<target>` for
//! each target with resources; the bundle matching
//! `<packageName>_<productName>` is the *main* bundle and is merged
//! directly into the output root rather than nested under it. On
//! non-Apple platforms SwiftPM names these directories `*.resources`
//! instead of `*.bundle`; copying renames the extension to `.bundle` so
//! downstream code always finds a uniform name, except for a small
//! whitelist of names that are looked up by their original
//! `.resources` name at runtime and must keep it.

use std::path::{Path, PathBuf};

use crate::error::{ErrorExt, Result};

/// Resource bundle names that must keep their `.resources` extension
/// when copied, because the runtime that consumes them looks them up by
/// that exact name.
const KEEP_RESOURCES_EXTENSION: &[&str] = &["swift-windowsappsdk_CWinAppSDK"];

/// One `.bundle`/`.resources` directory discovered alongside the built
/// products.
pub struct DiscoveredBundle {
    /// Full path to the directory as built.
    pub path: PathBuf,
    /// File stem (name without the `.bundle`/`.resources` extension).
    pub stem: String,
}

/// Find every top-level `*.bundle` or `*.resources` directory directly
/// under `products_directory`.
pub fn discover(products_directory: &Path) -> Result<Vec<DiscoveredBundle>> {
    let mut found = Vec::new();
    let entries = match std::fs::read_dir(products_directory) {
        Ok(entries) => entries,
        Err(_) => return Ok(found),
    };
    for entry in entries {
        let entry = entry.fs_context("reading products directory entry", products_directory)?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(extension) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if extension != "bundle" && extension != "resources" {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        found.push(DiscoveredBundle {
            path: path.clone(),
            stem: stem.to_string(),
        });
    }
    found.sort_by(|a, b| a.stem.cmp(&b.stem));
    Ok(found)
}

/// Whether `stem` names the "main" bundle for `package_name`/`product_name`,
/// whose contents merge directly into the output root rather than into a
/// nested bundle of their own.
pub fn is_main_bundle(stem: &str, package_name: &str, product_name: &str) -> bool {
    stem == format!("{package_name}_{product_name}")
}

/// The destination directory name for a non-main bundle: `.bundle` unless
/// `stem` is in [`KEEP_RESOURCES_EXTENSION`], in which case `.resources`.
pub fn destination_name(stem: &str) -> String {
    if KEEP_RESOURCES_EXTENSION.contains(&stem) {
        format!("{stem}.resources")
    } else {
        format!("{stem}.bundle")
    }
}

/// Copy `bundle`'s tree verbatim into `destination`.
pub async fn copy_plain(bundle: &DiscoveredBundle, destination: &Path) -> Result<()> {
    crate::fsops::copy_dir(&bundle.path, destination).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_main_bundle_name() {
        assert!(is_main_bundle("Demo_Demo", "Demo", "Demo"));
        assert!(!is_main_bundle("Demo_OtherTarget", "Demo", "Demo"));
    }

    #[test]
    fn destination_name_renames_to_bundle_extension() {
        assert_eq!(destination_name("Demo_Assets"), "Demo_Assets.bundle");
    }

    #[test]
    fn destination_name_keeps_whitelisted_resources_extension() {
        assert_eq!(
            destination_name("swift-windowsappsdk_CWinAppSDK"),
            "swift-windowsappsdk_CWinAppSDK.resources"
        );
    }

    #[tokio::test]
    async fn discovers_top_level_bundle_and_resources_dirs() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir_all(dir.path().join("Demo_Assets.bundle"))
            .await
            .unwrap();
        tokio::fs::create_dir_all(dir.path().join("Demo_Other.resources"))
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("not_a_bundle.txt"), b"x")
            .await
            .unwrap();

        let found = discover(dir.path()).unwrap();
        let stems: Vec<_> = found.iter().map(|b| b.stem.as_str()).collect();
        assert_eq!(stems, vec!["Demo_Assets", "Demo_Other"]);
    }
}
