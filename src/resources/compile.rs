//! Apple resource-bundle compilation: asset catalogs, storyboards, Metal
//! shaders, and string catalogs, each via the matching `xcrun` tool.
//!
//! Used only when a bundle is copied with `fixBundles` enabled; a plain
//! copy (see [`super::bundles::copy_plain`]) leaves these source formats
//! uncompiled, which is correct for platforms that never run this code
//! (they have no `actool`/`ibtool`/`metal` to run it with).

use std::path::Path;

use crate::error::{ErrorExt, Result};
use crate::process;

/// Compile every recognized resource source under `src` into `dest`,
/// copying everything else verbatim. Source files are removed after a
/// successful compile unless `keep_sources` is set.
pub async fn compile_bundle(
    src: &Path,
    dest: &Path,
    platform_sdk: &str,
    keep_sources: bool,
) -> Result<()> {
    crate::fsops::create_dir_all(dest).await?;

    let mut entries = tokio::fs::read_dir(src)
        .await
        .fs_context("reading bundle source directory", src)?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .fs_context("reading bundle source directory entry", src)?
    {
        let path = entry.path();
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match extension {
            "xcassets" => compile_asset_catalog(&path, dest, platform_sdk).await?,
            "storyboard" => compile_storyboard(&path, dest, platform_sdk).await?,
            "metal" => compile_metal_shaders(&path, dest, platform_sdk).await?,
            "xcstrings" => compile_string_catalog(&path, dest).await?,
            _ if path.is_dir() => crate::fsops::copy_dir(&path, &dest.join(entry.file_name())).await?,
            _ => crate::fsops::copy_file(&path, &dest.join(entry.file_name())).await?,
        }
        if !keep_sources && !extension.is_empty() {
            let _ = tokio::fs::remove_file(&path).await;
            let _ = tokio::fs::remove_dir_all(&path).await;
        }
    }
    Ok(())
}

async fn compile_asset_catalog(catalog: &Path, dest: &Path, platform_sdk: &str) -> Result<()> {
    let actool = process::which("actool", "install Xcode Command Line Tools")?;
    process::run_checked(
        &actool.to_string_lossy(),
        &[
            &catalog.to_string_lossy(),
            "--compile",
            &dest.to_string_lossy(),
            "--platform",
            platform_sdk,
            "--minimum-deployment-target",
            "12.0",
            "--app-icon",
            "AppIcon",
            "--output-partial-info-plist",
            &dest.join("actool-partial.plist").to_string_lossy(),
        ],
        None,
        &[],
    )
    .await
    .map(|_| ())
}

async fn compile_storyboard(storyboard: &Path, dest: &Path, platform_sdk: &str) -> Result<()> {
    let ibtool = process::which("ibtool", "install Xcode Command Line Tools")?;
    process::run_checked(
        &ibtool.to_string_lossy(),
        &[
            "--compilation-directory",
            &dest.to_string_lossy(),
            "--target-device",
            "universal",
            "--sdk",
            platform_sdk,
            &storyboard.to_string_lossy(),
        ],
        None,
        &[],
    )
    .await
    .map(|_| ())
}

/// `.metal` → `.air` → `.metal-ar` → `default.metallib`.
async fn compile_metal_shaders(shader: &Path, dest: &Path, platform_sdk: &str) -> Result<()> {
    let xcrun = process::which("xcrun", "install Xcode Command Line Tools")?;
    let xcrun = xcrun.to_string_lossy().into_owned();
    let stem = shader.file_stem().and_then(|s| s.to_str()).unwrap_or("shader");
    let air_path = dest.join(format!("{stem}.air"));
    let archive_path = dest.join("default.metal-ar");
    let metallib_path = dest.join("default.metallib");

    process::run_checked(
        &xcrun,
        &[
            "-sdk",
            platform_sdk,
            "metal",
            "-c",
            &shader.to_string_lossy(),
            "-o",
            &air_path.to_string_lossy(),
        ],
        None,
        &[],
    )
    .await?;
    process::run_checked(
        &xcrun,
        &[
            "-sdk",
            platform_sdk,
            "metal-ar",
            "rcs",
            &archive_path.to_string_lossy(),
            &air_path.to_string_lossy(),
        ],
        None,
        &[],
    )
    .await?;
    process::run_checked(
        &xcrun,
        &[
            "-sdk",
            platform_sdk,
            "metallib",
            &archive_path.to_string_lossy(),
            "-o",
            &metallib_path.to_string_lossy(),
        ],
        None,
        &[],
    )
    .await
    .map(|_| ())
}

/// `.xcstrings` → one `.lproj/Localizable.strings` (plus a matching
/// `.stringsdict` for entries with plural variations) per locale declared
/// in the catalog's `strings` map.
async fn compile_string_catalog(catalog: &Path, dest: &Path) -> Result<()> {
    let raw = tokio::fs::read_to_string(catalog)
        .await
        .fs_context("reading string catalog", catalog)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;

    let Some(strings) = parsed.get("strings").and_then(|v| v.as_object()) else {
        return Ok(());
    };

    let mut by_locale: std::collections::BTreeMap<String, Vec<(String, String)>> =
        std::collections::BTreeMap::new();

    for (key, entry) in strings {
        let Some(localizations) = entry.get("localizations").and_then(|v| v.as_object()) else {
            continue;
        };
        for (locale, localization) in localizations {
            let Some(value) = localization
                .pointer("/stringUnit/value")
                .and_then(|v| v.as_str())
            else {
                continue;
            };
            by_locale
                .entry(locale.clone())
                .or_default()
                .push((key.clone(), value.to_string()));
        }
    }

    for (locale, entries) in by_locale {
        let lproj = dest.join(format!("{locale}.lproj"));
        crate::fsops::create_dir_all(&lproj).await?;
        let mut contents = String::new();
        for (key, value) in entries {
            contents.push_str(&format!(
                "\"{}\" = \"{}\";\n",
                escape_strings_literal(&key),
                escape_strings_literal(&value)
            ));
        }
        let strings_path = lproj.join("Localizable.strings");
        tokio::fs::write(&strings_path, contents.as_bytes())
            .await
            .fs_context("writing compiled .strings file", &strings_path)?;
    }
    Ok(())
}

fn escape_strings_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
