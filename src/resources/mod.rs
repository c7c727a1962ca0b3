//! Resource pipeline: copying explicit bundle resources, discovering and
//! merging/copying `.bundle`/`.resources` directories, and (on Apple
//! platforms) building `Info.plist` and compiling bundle contents.

pub mod bundles;

#[cfg(target_os = "macos")]
pub mod compile;

pub mod icons;

#[cfg(windows)]
pub mod ico;

#[cfg(any(
    target_os = "linux",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd"
))]
pub mod linux_desktop;

#[cfg(target_os = "macos")]
pub mod plist;

use std::path::Path;

use crate::config::BundlerContext;
use crate::error::Result;

/// Copy every entry of `context.app.resources` (source → destination,
/// relative to the bundle's resource root) into `resource_root`, then
/// discover and place every `.bundle`/`.resources` directory the build
/// produced alongside the main product.
///
/// Per spec: a destination with a leading path separator is treated as
/// bundle-root-relative rather than resource-root-relative (needed on
/// Linux/Windows generic layouts, where some files — desktop entries,
/// license files — sit outside the resource directory proper).
///
/// `fix_bundles` requests compiling discovered bundles' asset catalogs,
/// storyboards, Metal shaders, and string catalogs instead of copying
/// them verbatim; it only has an effect on Apple platforms, where the
/// compiling tools (`actool`, `ibtool`, `xcrun metal`) exist.
pub async fn copy_resources(
    context: &BundlerContext,
    bundle_root: &Path,
    resource_root: &Path,
    fix_bundles: bool,
) -> Result<()> {
    for (source, dest) in &context.app.resources {
        let absolute_source = if source.is_absolute() {
            source.clone()
        } else {
            context.products_directory.join(source)
        };
        let dest_is_root_relative = dest
            .to_str()
            .map(|s| s.starts_with('/') || s.starts_with('\\'))
            .unwrap_or(false);
        let destination = if dest_is_root_relative {
            bundle_root.join(dest.strip_prefix("/").unwrap_or(dest))
        } else {
            resource_root.join(dest)
        };

        let metadata = tokio::fs::metadata(&absolute_source).await;
        match metadata {
            Ok(meta) if meta.is_dir() => {
                crate::fsops::copy_dir(&absolute_source, &destination).await?;
            }
            Ok(_) => {
                crate::fsops::copy_file(&absolute_source, &destination).await?;
            }
            Err(_) => {
                log::warn!("resource source {absolute_source:?} does not exist, skipping");
            }
        }
    }

    place_discovered_bundles(context, bundle_root, resource_root, fix_bundles).await
}

async fn place_discovered_bundles(
    context: &BundlerContext,
    bundle_root: &Path,
    resource_root: &Path,
    fix_bundles: bool,
) -> Result<()> {
    let discovered = bundles::discover(&context.products_directory)?;
    for bundle in discovered {
        let destination = if bundles::is_main_bundle(
            &bundle.stem,
            &context.app_name,
            &context.app.product_name,
        ) {
            bundle_root.to_path_buf()
        } else {
            resource_root.join(bundles::destination_name(&bundle.stem))
        };

        compile_or_copy_bundle(&bundle, &destination, fix_bundles).await?;
    }
    Ok(())
}

#[cfg(target_os = "macos")]
async fn compile_or_copy_bundle(
    bundle: &bundles::DiscoveredBundle,
    destination: &Path,
    fix_bundles: bool,
) -> Result<()> {
    if fix_bundles {
        compile::compile_bundle(&bundle.path, destination, "macosx", false).await
    } else {
        bundles::copy_plain(bundle, destination).await
    }
}

#[cfg(not(target_os = "macos"))]
async fn compile_or_copy_bundle(
    bundle: &bundles::DiscoveredBundle,
    destination: &Path,
    _fix_bundles: bool,
) -> Result<()> {
    bundles::copy_plain(bundle, destination).await
}
